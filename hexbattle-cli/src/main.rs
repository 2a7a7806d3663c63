//! HEXBATTLE CLI - Command-line interface
//!
//! Games and maps live in JSON files; every command loads, acts and saves.
//!
//! Commands:
//! - new-map, place, paint, fill, map-info: build and inspect map files
//! - new: start a game from a map file
//! - status, options: inspect a saved game
//! - move, attack, end-turn, batch: play a saved game
//! - predict: show the damage distribution for a unit pairing

mod edit;
mod play;
mod predict;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hexbattle_core::RulesEngine;

#[derive(Parser)]
#[command(name = "hexbattle")]
#[command(about = "HEXBATTLE turn-based hex strategy engine")]
struct Cli {
    /// Rules catalog JSON (defaults to the built-in catalog)
    #[arg(long, global = true, value_name = "FILE")]
    rules: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a map filled with one terrain
    NewMap(edit::NewMapArgs),
    /// Place a unit on a map
    Place(edit::PlaceArgs),
    /// Paint terrain with a hex brush
    Paint(edit::PaintArgs),
    /// Flood fill a connected terrain region
    Fill(edit::FillArgs),
    /// Show map statistics and problems
    MapInfo(edit::MapInfoArgs),
    /// Start a game from a map
    New(play::NewArgs),
    /// Show a saved game
    Status(play::GameArgs),
    /// List moves and attacks for a unit
    Options(play::OptionsArgs),
    /// Move a unit
    Move(play::MoveArgs),
    /// Attack with a unit
    Attack(play::AttackArgs),
    /// End the current player's turn
    EndTurn(play::EndTurnArgs),
    /// Apply a JSON list of actions
    Batch(play::BatchArgs),
    /// Show the damage distribution for an attacker/defender pairing
    Predict(predict::PredictArgs),
}

/// Settings shared by every command
pub struct AppContext {
    pub rules: Arc<RulesEngine>,
    pub json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = AppContext {
        rules: load_rules(cli.rules.as_deref())?,
        json: cli.json,
    };

    match cli.command {
        Commands::NewMap(args) => edit::run_new_map(args, &ctx),
        Commands::Place(args) => edit::run_place(args, &ctx),
        Commands::Paint(args) => edit::run_paint(args, &ctx),
        Commands::Fill(args) => edit::run_fill(args, &ctx),
        Commands::MapInfo(args) => edit::run_map_info(args, &ctx),
        Commands::New(args) => play::run_new(args, &ctx),
        Commands::Status(args) => play::run_status(args, &ctx),
        Commands::Options(args) => play::run_options(args, &ctx),
        Commands::Move(args) => play::run_move(args, &ctx),
        Commands::Attack(args) => play::run_attack(args, &ctx),
        Commands::EndTurn(args) => play::run_end_turn(args, &ctx),
        Commands::Batch(args) => play::run_batch(args, &ctx),
        Commands::Predict(args) => predict::run(args, &ctx),
    }
}

/// `--verbose` forces debug; otherwise `RUST_LOG` applies, defaulting to info.
/// Logs go to stderr so JSON output stays clean.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_rules(path: Option<&Path>) -> Result<Arc<RulesEngine>> {
    let rules = match path {
        Some(path) => RulesEngine::load(path)
            .with_context(|| format!("Failed to load rules catalog: {}", path.display()))?,
        None => RulesEngine::embedded().context("Built-in rules catalog is invalid")?,
    };
    Ok(Arc::new(rules))
}
