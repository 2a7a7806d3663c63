//! Save file schema
//!
//! Tiles and units are stored in maps keyed by `"q,r"`. Older files kept
//! them as plain lists; `migrate` folds those into the maps on load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Hex;
use crate::game::GameStatus;
use crate::world::{PlayerId, Tile, Unit, World, WorldError};

/// Current schema version. Version 1 files carry list-based world data.
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("bad coordinate key {0:?}")]
    BadKey(String),
    #[error("key {key} does not match coordinate {coord}")]
    KeyMismatch { key: String, coord: Hex },
    #[error(transparent)]
    World(#[from] WorldError),
}

// ============================================================================
// WORLD DATA
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldData {
    #[serde(default)]
    pub tiles_map: BTreeMap<String, Tile>,
    #[serde(default)]
    pub units_map: BTreeMap<String, Unit>,
    /// Unit keys in per-player creation order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit_order: Vec<String>,
    /// Legacy list storage, emptied by `migrate`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiles: Vec<Tile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub units: Vec<Unit>,
}

impl WorldData {
    pub fn from_world(world: &World) -> Self {
        let tiles_map = world.tiles().map(|t| (t.coord.key(), *t)).collect();
        let units_map = world.units().map(|u| (u.coord.key(), u.clone())).collect();
        let unit_order = world.units().map(|u| u.coord.key()).collect();
        Self {
            tiles_map,
            units_map,
            unit_order,
            tiles: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Fold legacy lists into the maps. Lists only fill maps that are still
    /// empty, so running this twice is harmless.
    pub fn migrate(&mut self) {
        if !self.tiles.is_empty() && self.tiles_map.is_empty() {
            for tile in &self.tiles {
                self.tiles_map.insert(tile.coord.key(), *tile);
            }
        }
        if !self.units.is_empty() && self.units_map.is_empty() {
            for unit in &self.units {
                self.unit_order.push(unit.coord.key());
                self.units_map.insert(unit.coord.key(), unit.clone());
            }
        }
        self.tiles.clear();
        self.units.clear();
    }

    /// Build a `World`, checking every key against the record it holds.
    /// Units listed in `unit_order` come first, the rest in key order.
    pub fn into_world(mut self, player_count: u32) -> Result<World, SnapshotError> {
        self.migrate();

        let mut tiles = Vec::with_capacity(self.tiles_map.len());
        for (key, tile) in self.tiles_map {
            check_key(&key, tile.coord)?;
            tiles.push(tile);
        }

        let mut units = Vec::with_capacity(self.units_map.len());
        for key in &self.unit_order {
            if let Some(unit) = self.units_map.remove(key) {
                check_key(key, unit.coord)?;
                units.push(unit);
            }
        }
        for (key, unit) in self.units_map {
            check_key(&key, unit.coord)?;
            units.push(unit);
        }

        Ok(World::from_parts(player_count, tiles, units)?)
    }
}

fn check_key(key: &str, coord: Hex) -> Result<(), SnapshotError> {
    let parsed: Hex = key
        .parse()
        .map_err(|_| SnapshotError::BadKey(key.to_string()))?;
    if parsed != coord {
        return Err(SnapshotError::KeyMismatch {
            key: key.to_string(),
            coord,
        });
    }
    Ok(())
}

// ============================================================================
// GAME SNAPSHOT
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    pub player_count: u32,
    pub current_player: PlayerId,
    pub turn_counter: u32,
    pub status: GameStatus,
    pub seed: u64,
    /// Position in the RNG stream, in 32-bit words
    #[serde(default)]
    pub rng_word_pos: u64,
    #[serde(default)]
    pub winner: Option<PlayerId>,
    pub world: WorldData,
}

impl GameSnapshot {
    /// Bring an older snapshot up to the current version
    pub fn migrate(mut self) -> Result<Self, SnapshotError> {
        match self.version {
            1 | SNAPSHOT_VERSION => {
                self.world.migrate();
                self.version = SNAPSHOT_VERSION;
                Ok(self)
            }
            other => Err(SnapshotError::UnsupportedVersion(other)),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ============================================================================
// MAP FILE
// ============================================================================

/// A world without game state: what the editor reads and writes and what
/// new games start from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapFile {
    #[serde(default = "default_map_version")]
    pub version: u32,
    pub player_count: u32,
    pub rows: i32,
    pub cols: i32,
    pub world: WorldData,
}

fn default_map_version() -> u32 {
    SNAPSHOT_VERSION
}

impl MapFile {
    pub fn from_world(world: &World, rows: i32, cols: i32) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            player_count: world.player_count(),
            rows,
            cols,
            world: WorldData::from_world(world),
        }
    }

    pub fn into_world(self) -> Result<World, SnapshotError> {
        if self.version > SNAPSHOT_VERSION || self.version == 0 {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        self.world.into_world(self.player_count)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
