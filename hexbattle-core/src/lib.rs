//! HEXBATTLE Core - Turn-based hex strategy engine
//!
//! This crate provides the rules and state for HEXBATTLE:
//! - Board geometry (hex grid with axial coordinates)
//! - World state (terrain tiles and per-player units)
//! - Data-driven rules catalog (movement costs, damage distributions)
//! - Turn flow and victory
//! - Move processing with batch policies
//! - Map editor history (paint, flood fill, undo/redo)
//! - Asset lookup interface for renderers

pub mod board;
pub mod world;
pub mod rules;
pub mod game;
pub mod moves;
pub mod editor;
pub mod snapshot;
pub mod config;
pub mod assets;

// Re-exports for convenient access
pub use board::{Direction, Hex, DIRECTIONS, hex_to_row_col, row_col_to_hex};
pub use world::{PlayerId, TerrainTypeId, Tile, Unit, UnitTypeId, World, WorldError};
pub use rules::{AttackCheck, AttackDenied, DamagePrediction, RulesEngine, RulesError};
pub use game::{Game, GameError, GameStatus};
pub use moves::{Action, ActionOutcome, ActionResult, BatchReport, MoveProcessor, Rejection};
pub use editor::{EditorError, EditorHistory, SnapshotRing};
pub use snapshot::{GameSnapshot, MapFile, SnapshotError};
pub use config::{BatchPolicy, EditorConfig, ProcessorConfig};
pub use assets::{AssetProvider, GlyphAssets};
