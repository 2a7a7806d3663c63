//! Map commands - create, edit and inspect map files
//!
//! ## Architecture
//!
//! - Level 1: run_*() - orchestration per command
//! - Level 2: open_editor(), save_editor()

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;

use hexbattle_core::board::{in_rect, row_col_to_hex};
use hexbattle_core::editor::MapInfo;
use hexbattle_core::{EditorConfig, EditorHistory, Hex, MapFile, TerrainTypeId, Unit, World};

use crate::AppContext;

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct NewMapArgs {
    /// Map file to create
    #[arg(value_name = "FILE")]
    pub output: PathBuf,

    #[arg(long, default_value = "8")]
    pub rows: i32,

    #[arg(long, default_value = "8")]
    pub cols: i32,

    #[arg(long, default_value = "2")]
    pub players: u32,

    /// Terrain type to fill the map with
    #[arg(long, default_value = "1")]
    pub terrain: TerrainTypeId,
}

#[derive(Args)]
pub struct PlaceArgs {
    #[arg(value_name = "MAP")]
    pub map: PathBuf,

    /// Unit type id
    #[arg(long)]
    pub unit: u32,

    /// Owning player (1-based)
    #[arg(long)]
    pub player: u32,

    /// Coordinate as Q,R
    #[arg(long, allow_hyphen_values = true)]
    pub at: Hex,
}

#[derive(Args)]
pub struct PaintArgs {
    #[arg(value_name = "MAP")]
    pub map: PathBuf,

    /// Brush center as Q,R
    #[arg(long, allow_hyphen_values = true)]
    pub at: Hex,

    #[arg(long)]
    pub terrain: TerrainTypeId,

    /// Brush radius
    #[arg(long, default_value = "0")]
    pub brush: i32,

    /// Do not write the map back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct FillArgs {
    #[arg(value_name = "MAP")]
    pub map: PathBuf,

    /// Start coordinate as Q,R
    #[arg(long, allow_hyphen_values = true)]
    pub at: Hex,

    #[arg(long)]
    pub terrain: TerrainTypeId,

    /// Do not write the map back
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct MapInfoArgs {
    #[arg(value_name = "MAP")]
    pub map: PathBuf,
}

#[derive(Serialize)]
struct EditReport {
    changed: usize,
    saved: bool,
}

#[derive(Serialize)]
struct MapReport {
    info: MapInfo,
    issues: Vec<String>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

pub fn run_new_map(args: NewMapArgs, ctx: &AppContext) -> Result<()> {
    if args.rows <= 0 || args.cols <= 0 {
        bail!("Map needs positive dimensions, got {}x{}", args.rows, args.cols);
    }
    ctx.rules.terrain_data(args.terrain)?;

    let mut world = World::new(args.players)?;
    for row in 0..args.rows {
        for col in 0..args.cols {
            world.set_tile_type(row_col_to_hex(row, col), args.terrain);
        }
    }

    MapFile::from_world(&world, args.rows, args.cols)
        .save(&args.output)
        .with_context(|| format!("Failed to write map: {}", args.output.display()))?;
    tracing::info!(
        "Created {}x{} map for {} players: {}",
        args.rows,
        args.cols,
        args.players,
        args.output.display()
    );
    Ok(())
}

pub fn run_place(args: PlaceArgs, ctx: &AppContext) -> Result<()> {
    ctx.rules.unit_data(args.unit)?;
    let map = load_map(&args.map)?;
    let (rows, cols) = (map.rows, map.cols);
    let mut world = map.into_world()?;

    if world.tile_at(args.at).is_none() {
        bail!("No tile at {}", args.at);
    }
    if let Some(old) = world.add_unit(Unit::new(args.unit, args.player, args.at))? {
        tracing::warn!(
            "Replaced unit type {} of player {} at {}",
            old.unit_type,
            old.player,
            args.at
        );
    }

    save_map(&args.map, &world, rows, cols)
}

pub fn run_paint(args: PaintArgs, ctx: &AppContext) -> Result<()> {
    ctx.rules.terrain_data(args.terrain)?;
    let mut editor = open_editor(&args.map)?;
    let changed = editor.paint_terrain(args.at, args.terrain, args.brush)?;
    finish_edit(&args.map, editor, changed, args.dry_run, ctx)
}

pub fn run_fill(args: FillArgs, ctx: &AppContext) -> Result<()> {
    ctx.rules.terrain_data(args.terrain)?;
    let mut editor = open_editor(&args.map)?;
    let (rows, cols) = editor.dimensions();
    if !in_rect(args.at, rows, cols) {
        bail!("{} is outside the {}x{} map", args.at, rows, cols);
    }
    let changed = editor.flood_fill(args.at, args.terrain)?;
    finish_edit(&args.map, editor, changed, args.dry_run, ctx)
}

pub fn run_map_info(args: MapInfoArgs, ctx: &AppContext) -> Result<()> {
    let editor = open_editor(&args.map)?;
    let report = MapReport {
        info: editor.map_info(),
        issues: editor.validate_map(&ctx.rules),
    };

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Map {}x{}, {} tiles",
        report.info.rows, report.info.cols, report.info.total_tiles
    );
    for (terrain, count) in &report.info.terrain_counts {
        let name = ctx
            .rules
            .terrain_data(*terrain)
            .map(|t| t.name.as_str())
            .unwrap_or("?");
        println!("  {:>3} {:<14} {}", terrain, name, count);
    }
    if report.issues.is_empty() {
        println!("No problems found");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - FILE HANDLING
// ============================================================================

fn load_map(path: &Path) -> Result<MapFile> {
    MapFile::load(path).with_context(|| format!("Failed to load map: {}", path.display()))
}

fn save_map(path: &Path, world: &World, rows: i32, cols: i32) -> Result<()> {
    MapFile::from_world(world, rows, cols)
        .save(path)
        .with_context(|| format!("Failed to write map: {}", path.display()))
}

fn open_editor(path: &Path) -> Result<EditorHistory> {
    let map = load_map(path)?;
    let (rows, cols) = (map.rows, map.cols);
    let world = map.into_world()?;
    Ok(EditorHistory::new(world, rows, cols, EditorConfig::default()))
}

fn finish_edit(
    path: &Path,
    editor: EditorHistory,
    changed: usize,
    dry_run: bool,
    ctx: &AppContext,
) -> Result<()> {
    let saved = !dry_run && editor.is_modified();
    if saved {
        let (rows, cols) = editor.dimensions();
        save_map(path, editor.world(), rows, cols)?;
    }

    let report = EditReport { changed, saved };
    if ctx.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "{} tiles changed{}",
            report.changed,
            if saved { "" } else { " (not saved)" }
        );
    }
    Ok(())
}
