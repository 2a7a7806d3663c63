//! Game commands - start, inspect and play saved games
//!
//! ## Architecture
//!
//! - Level 1: run_*() - orchestration per command
//! - Level 2: load_game(), save_game(), apply_one()
//! - Level 3: formatting

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use hexbattle_core::board::parse_direction_chain;
use hexbattle_core::moves::MoveOption;
use hexbattle_core::{
    Action, ActionOutcome, ActionResult, BatchPolicy, Game, GameSnapshot, GlyphAssets, Hex,
    MapFile, MoveProcessor,
};

use crate::render::draw_board;
use crate::AppContext;

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct NewArgs {
    /// Map file to start from
    #[arg(long, value_name = "FILE")]
    pub map: PathBuf,

    /// Game file to create
    #[arg(value_name = "GAME")]
    pub output: PathBuf,

    /// Random seed for combat rolls
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

#[derive(Args)]
pub struct GameArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,
}

#[derive(Args)]
pub struct OptionsArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// Unit coordinate as Q,R
    #[arg(long, allow_hyphen_values = true)]
    pub at: Hex,
}

#[derive(Args)]
pub struct MoveArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// Unit coordinate as Q,R
    #[arg(allow_hyphen_values = true)]
    pub from: Hex,

    /// Destination as Q,R
    #[arg(allow_hyphen_values = true)]
    pub to: Hex,

    /// Do not write the game back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct AttackArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// Attacking unit as Q,R
    #[arg(allow_hyphen_values = true)]
    pub attacker: Hex,

    /// Target as Q,R or a direction chain from the attacker such as TL,TR
    #[arg(allow_hyphen_values = true)]
    pub target: String,

    /// Do not write the game back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct EndTurnArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// Do not write the game back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    #[arg(value_name = "GAME")]
    pub game: PathBuf,

    /// JSON file holding a list of actions
    #[arg(value_name = "ACTIONS")]
    pub actions: PathBuf,

    /// Commit only if every action succeeds
    #[arg(long)]
    pub all_or_nothing: bool,

    /// Do not write the game back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct UnitView {
    label: String,
    unit_type: u32,
    name: String,
    coord: Hex,
    player: u32,
    health: i32,
    movement: f64,
}

#[derive(Serialize)]
struct StatusView {
    turn: u32,
    current_player: u32,
    status: hexbattle_core::GameStatus,
    winner: Option<u32>,
    units: Vec<UnitView>,
}

#[derive(Serialize)]
struct OptionsView {
    moves: Vec<MoveOption>,
    attacks: Vec<Hex>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run_new(args: NewArgs, ctx: &AppContext) -> Result<()> {
    let map = MapFile::load(&args.map)
        .with_context(|| format!("Failed to load map: {}", args.map.display()))?;
    let world = map.into_world()?;
    let game = Game::new(world, ctx.rules.clone(), args.seed)?;
    save_game(&args.output, &game)?;
    tracing::info!(
        "New game for {} players (seed {}): {}",
        game.world().player_count(),
        args.seed,
        args.output.display()
    );
    Ok(())
}

pub fn run_status(args: GameArgs, ctx: &AppContext) -> Result<()> {
    let game = load_game(&args.game, ctx)?;
    let view = status_view(&game);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "Turn {} - player {} to move - {:?}",
        view.turn, view.current_player, view.status
    );
    if let Some(winner) = view.winner {
        println!("Winner: player {winner}");
    }
    print!("{}", draw_board(game.world(), &GlyphAssets::from_rules(&ctx.rules)));
    for unit in &view.units {
        println!(
            "  {:<4} {:<10} {:<9} hp {:>3}  mv {}",
            unit.label,
            unit.name,
            unit.coord.to_string(),
            unit.health,
            unit.movement
        );
    }
    Ok(())
}

pub fn run_options(args: OptionsArgs, ctx: &AppContext) -> Result<()> {
    let game = load_game(&args.game, ctx)?;
    if game.world().unit_at(args.at).is_none() {
        bail!("No unit at {}", args.at);
    }
    let processor = MoveProcessor::default();
    let view = OptionsView {
        moves: processor.move_options(&game, args.at)?,
        attacks: processor.attack_options(&game, args.at)?,
    };

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    println!("Moves:");
    for option in &view.moves {
        println!("  {} (cost {})", option.to, option.cost);
    }
    println!("Attacks:");
    for target in &view.attacks {
        println!("  {target}");
    }
    Ok(())
}

pub fn run_move(args: MoveArgs, ctx: &AppContext) -> Result<()> {
    let action = Action::Move {
        from: args.from,
        to: args.to,
    };
    apply_one(&args.game, action, args.dry_run, ctx)
}

pub fn run_attack(args: AttackArgs, ctx: &AppContext) -> Result<()> {
    let target = resolve_target(args.attacker, &args.target)?;
    let action = Action::Attack {
        attacker: args.attacker,
        target,
    };
    apply_one(&args.game, action, args.dry_run, ctx)
}

pub fn run_end_turn(args: EndTurnArgs, ctx: &AppContext) -> Result<()> {
    apply_one(&args.game, Action::EndTurn, args.dry_run, ctx)
}

pub fn run_batch(args: BatchArgs, ctx: &AppContext) -> Result<()> {
    let content = std::fs::read_to_string(&args.actions)
        .with_context(|| format!("Failed to read actions: {}", args.actions.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse actions: {}", args.actions.display()))?;

    let policy = if args.all_or_nothing {
        BatchPolicy::AllOrNothing
    } else {
        BatchPolicy::Prefix
    };

    let mut game = load_game(&args.game, ctx)?;
    let report = MoveProcessor::default().apply_batch(&mut game, &actions, policy)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for result in &report.results {
            println!("{}", describe(result));
        }
        println!("{} of {} actions applied", report.applied, actions.len());
    }

    if report.applied > 0 && !args.dry_run {
        save_game(&args.game, &game)?;
    }
    if let Some(index) = report.stopped_at {
        bail!("Batch stopped at action {index}");
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - GAME FILES AND ACTIONS
// ============================================================================

fn load_game(path: &Path, ctx: &AppContext) -> Result<Game> {
    let snapshot = GameSnapshot::load(path)
        .with_context(|| format!("Failed to load game: {}", path.display()))?;
    Game::from_snapshot(snapshot, ctx.rules.clone())
        .with_context(|| format!("Saved game is not valid: {}", path.display()))
}

fn save_game(path: &Path, game: &Game) -> Result<()> {
    game.to_snapshot()
        .save(path)
        .with_context(|| format!("Failed to write game: {}", path.display()))
}

fn apply_one(path: &Path, action: Action, dry_run: bool, ctx: &AppContext) -> Result<()> {
    let mut game = load_game(path, ctx)?;
    let result = MoveProcessor::default().apply(&mut game, &action)?;

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", describe(&result));
    }

    if let Some(rejection) = &result.rejection {
        bail!("Action rejected: {rejection}");
    }
    if !dry_run {
        save_game(path, &game)?;
    }
    Ok(())
}

/// `Q,R` is taken literally; anything else is a direction chain walked from
/// the attacker
fn resolve_target(attacker: Hex, text: &str) -> Result<Hex> {
    if let Ok(hex) = text.parse::<Hex>() {
        return Ok(hex);
    }
    let path = parse_direction_chain(text)
        .with_context(|| format!("Target must be Q,R or a direction chain: {text:?}"))?;
    Ok(attacker.walk(&path))
}

// ============================================================================
// LEVEL 3 - FORMATTING
// ============================================================================

fn status_view(game: &Game) -> StatusView {
    let units = game
        .world()
        .units()
        .map(|unit| UnitView {
            label: game.unit_label(unit.coord).unwrap_or_default(),
            unit_type: unit.unit_type,
            name: game
                .rules()
                .unit_data(unit.unit_type)
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            coord: unit.coord,
            player: unit.player,
            health: unit.current_health,
            movement: unit.movement_remaining,
        })
        .collect();

    StatusView {
        turn: game.turn_counter(),
        current_player: game.current_player(),
        status: game.status(),
        winner: game.winner(),
        units,
    }
}

fn describe(result: &ActionResult) -> String {
    if let Some(rejection) = &result.rejection {
        return format!("rejected: {rejection}");
    }
    let mut line = match &result.outcome {
        Some(ActionOutcome::Moved { from, to, cost }) => {
            format!("moved {from} -> {to} (cost {cost})")
        }
        Some(ActionOutcome::Attacked {
            attacker,
            target,
            damage,
            counter_damage,
            target_destroyed,
            attacker_destroyed,
        }) => {
            let mut s = format!("{attacker} hit {target} for {damage}");
            if *target_destroyed {
                s.push_str(", target destroyed");
            }
            if let Some(counter) = counter_damage {
                s.push_str(&format!(", countered for {counter}"));
            }
            if *attacker_destroyed {
                s.push_str(", attacker destroyed");
            }
            s
        }
        Some(ActionOutcome::TurnEnded { next_player, turn }) => {
            format!("turn {turn}, player {next_player} to move")
        }
        None => String::from("no effect"),
    };
    if let Some(winner) = result.winner {
        line.push_str(&format!(" - player {winner} wins"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        let at = Hex::new(2, 2);
        assert_eq!(resolve_target(at, "3,2").unwrap(), Hex::new(3, 2));
        assert_eq!(resolve_target(at, "-1,0").unwrap(), Hex::new(-1, 0));
        assert_eq!(resolve_target(at, "TL,TR").unwrap(), Hex::new(3, 0));
        assert_eq!(resolve_target(at, "R").unwrap(), Hex::new(3, 2));
        assert!(resolve_target(at, "UP").is_err());
    }
}
