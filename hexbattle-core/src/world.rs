//! World state: terrain tiles and units
//!
//! Units are owned by the coordinate index. Each player additionally keeps an
//! ordered list of the coordinates their units stand on, so per-player
//! iteration is stable (creation order) without scanning the whole board.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::Hex;

/// Player identifier. Players are numbered from 1; 0 means "neutral".
pub type PlayerId = u32;

/// Index into the rules catalog's unit table
pub type UnitTypeId = u32;

/// Index into the rules catalog's terrain table
pub type TerrainTypeId = u32;

pub const NEUTRAL: PlayerId = 0;

/// Bounds on the number of players a world may be created with
pub const MIN_PLAYERS: u32 = 2;
pub const MAX_PLAYERS: u32 = 16;

/// Terrain storage, one tile per coordinate
pub type TerrainMap = FxHashMap<Hex, Tile>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    #[error("invalid player count: {0} (must be 2-16)")]
    InvalidPlayerCount(u32),
    #[error("invalid player {player} (world has {player_count} players)")]
    InvalidPlayer { player: PlayerId, player_count: u32 },
    #[error("no tile at {0}")]
    NoTile(Hex),
    #[error("no unit at {0}")]
    NoUnit(Hex),
    #[error("two units placed at {0}")]
    Overlap(Hex),
    #[error("unit at {0} has no tile")]
    UnitWithoutTile(Hex),
    #[error("unit index out of sync: {0}")]
    IndexDesync(String),
}

/// A single terrain tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: Hex,
    pub terrain_type: TerrainTypeId,
    /// Owning player for capturable structures, otherwise `NEUTRAL`
    #[serde(default)]
    pub owner: PlayerId,
}

impl Tile {
    pub fn new(coord: Hex, terrain_type: TerrainTypeId) -> Self {
        Self {
            coord,
            terrain_type,
            owner: NEUTRAL,
        }
    }
}

/// A unit on the board
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_type: UnitTypeId,
    pub coord: Hex,
    pub player: PlayerId,
    #[serde(default)]
    pub current_health: i32,
    #[serde(default)]
    pub movement_remaining: f64,
    #[serde(default)]
    pub turn_last_acted: u32,
    /// Set once the unit has attacked; cleared when its owner's turn starts
    #[serde(default)]
    pub has_attacked: bool,
}

impl Unit {
    /// New unit with empty stats; `Game::new` fills them from the catalog
    pub fn new(unit_type: UnitTypeId, player: PlayerId, coord: Hex) -> Self {
        Self {
            unit_type,
            coord,
            player,
            current_health: 0,
            movement_remaining: 0.0,
            turn_last_acted: 0,
            has_attacked: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.current_health > 0
    }
}

// ============================================================================
// WORLD
// ============================================================================

#[derive(Debug)]
pub struct World {
    tiles: TerrainMap,
    units: FxHashMap<Hex, Unit>,
    /// `by_player[p - 1]` lists the coordinates of player `p`'s units
    by_player: Vec<Vec<Hex>>,
    player_count: u32,
}

impl World {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    pub fn new(player_count: u32) -> Result<Self, WorldError> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&player_count) {
            return Err(WorldError::InvalidPlayerCount(player_count));
        }
        Ok(Self {
            tiles: TerrainMap::default(),
            units: FxHashMap::default(),
            by_player: vec![Vec::new(); player_count as usize],
            player_count,
        })
    }

    /// Build a world from tiles and units, rebuilding both unit indices.
    /// Units keep the order they are given in within each player's list.
    pub fn from_parts(
        player_count: u32,
        tiles: impl IntoIterator<Item = Tile>,
        units: impl IntoIterator<Item = Unit>,
    ) -> Result<Self, WorldError> {
        let mut world = Self::new(player_count)?;
        for tile in tiles {
            world.tiles.insert(tile.coord, tile);
        }
        for unit in units {
            let coord = unit.coord;
            if world.add_unit(unit)?.is_some() {
                return Err(WorldError::Overlap(coord));
            }
        }
        Ok(world)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn player_count(&self) -> u32 {
        self.player_count
    }

    pub fn tile_at(&self, coord: Hex) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn tile_at_mut(&mut self, coord: Hex) -> Option<&mut Tile> {
        self.tiles.get_mut(&coord)
    }

    pub fn unit_at(&self, coord: Hex) -> Option<&Unit> {
        self.units.get(&coord)
    }

    pub fn unit_at_mut(&mut self, coord: Hex) -> Option<&mut Unit> {
        self.units.get_mut(&coord)
    }

    /// Iterate tiles (unordered)
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.values()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Iterate all units, player by player, in per-player order
    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.by_player
            .iter()
            .flatten()
            .filter_map(move |coord| self.units.get(coord))
    }

    /// Units of one player in creation order. Unknown players yield nothing.
    pub fn units_for_player(&self, player: PlayerId) -> impl Iterator<Item = &Unit> + '_ {
        self.player_slot(player)
            .map(|idx| self.by_player[idx].as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(move |coord| self.units.get(coord))
    }

    pub fn unit_count(&self, player: PlayerId) -> usize {
        self.player_slot(player)
            .map(|idx| self.by_player[idx].len())
            .unwrap_or(0)
    }

    /// Number of per-player unit lists (always equals `player_count`)
    pub fn player_list_count(&self) -> usize {
        self.by_player.len()
    }

    /// Coordinates of one player's units, in order
    pub fn player_unit_coords(&self, player: PlayerId) -> Vec<Hex> {
        self.player_slot(player)
            .map(|idx| self.by_player[idx].clone())
            .unwrap_or_default()
    }

    /// Copy of the terrain, for editor snapshots
    pub fn terrain(&self) -> TerrainMap {
        self.tiles.clone()
    }

    /// Replace the terrain wholesale (editor undo/redo)
    pub fn restore_terrain(&mut self, tiles: TerrainMap) {
        self.tiles = tiles;
    }

    fn player_slot(&self, player: PlayerId) -> Option<usize> {
        if player >= 1 && player <= self.player_count {
            Some(player as usize - 1)
        } else {
            None
        }
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Upsert a tile's terrain type
    pub fn set_tile_type(&mut self, coord: Hex, terrain_type: TerrainTypeId) {
        self.tiles
            .entry(coord)
            .and_modify(|t| t.terrain_type = terrain_type)
            .or_insert_with(|| Tile::new(coord, terrain_type));
    }

    pub fn add_tile(&mut self, tile: Tile) -> Option<Tile> {
        self.tiles.insert(tile.coord, tile)
    }

    pub fn remove_tile(&mut self, coord: Hex) -> Option<Tile> {
        self.tiles.remove(&coord)
    }

    /// Place a unit. Returns the unit that previously stood on the
    /// coordinate, which has been taken out of both indices.
    pub fn add_unit(&mut self, unit: Unit) -> Result<Option<Unit>, WorldError> {
        let slot = self
            .player_slot(unit.player)
            .ok_or(WorldError::InvalidPlayer {
                player: unit.player,
                player_count: self.player_count,
            })?;

        let coord = unit.coord;
        let displaced = match self.units.remove(&coord) {
            Some(old) => {
                self.unlist(old.player, coord);
                Some(old)
            }
            None => None,
        };

        self.by_player[slot].push(coord);
        self.units.insert(coord, unit);
        Ok(displaced)
    }

    /// Remove the unit at `coord` from both indices
    pub fn remove_unit(&mut self, coord: Hex) -> Result<Unit, WorldError> {
        if !self.tiles.contains_key(&coord) {
            return Err(WorldError::NoTile(coord));
        }
        let unit = self.units.remove(&coord).ok_or(WorldError::NoUnit(coord))?;
        self.unlist(unit.player, coord);
        Ok(unit)
    }

    /// Relocate a unit. No path or terrain validation happens here.
    /// Moving onto an occupied coordinate is refused to keep one unit per hex.
    pub fn move_unit(&mut self, from: Hex, to: Hex) -> Result<(), WorldError> {
        if from == to {
            return if self.units.contains_key(&from) {
                Ok(())
            } else {
                Err(WorldError::NoUnit(from))
            };
        }
        if self.units.contains_key(&to) {
            return Err(WorldError::Overlap(to));
        }
        let mut unit = self.units.remove(&from).ok_or(WorldError::NoUnit(from))?;
        unit.coord = to;

        if let Some(slot) = self.player_slot(unit.player) {
            if let Some(entry) = self.by_player[slot].iter_mut().find(|c| **c == from) {
                *entry = to;
            }
        }
        self.units.insert(to, unit);
        Ok(())
    }

    fn unlist(&mut self, player: PlayerId, coord: Hex) {
        if let Some(slot) = self.player_slot(player) {
            self.by_player[slot].retain(|c| *c != coord);
        }
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Audit that the coordinate index and per-player lists agree
    pub fn check_consistency(&self) -> Result<(), WorldError> {
        if self.by_player.len() != self.player_count as usize {
            return Err(WorldError::IndexDesync(format!(
                "{} player lists for {} players",
                self.by_player.len(),
                self.player_count
            )));
        }

        let mut seen = rustc_hash::FxHashSet::default();
        for (idx, coords) in self.by_player.iter().enumerate() {
            let player = idx as PlayerId + 1;
            for coord in coords {
                if !seen.insert(*coord) {
                    return Err(WorldError::IndexDesync(format!("{coord} listed twice")));
                }
                if !self.tiles.contains_key(coord) {
                    return Err(WorldError::UnitWithoutTile(*coord));
                }
                match self.units.get(coord) {
                    Some(unit) if unit.player == player && unit.coord == *coord => {}
                    Some(unit) => {
                        return Err(WorldError::IndexDesync(format!(
                            "{coord} listed for player {player} but holds player {}'s unit at {}",
                            unit.player, unit.coord
                        )))
                    }
                    None => {
                        return Err(WorldError::IndexDesync(format!(
                            "{coord} listed for player {player} but empty"
                        )))
                    }
                }
            }
        }

        if seen.len() != self.units.len() {
            return Err(WorldError::IndexDesync(format!(
                "{} units indexed by coordinate, {} by player",
                self.units.len(),
                seen.len()
            )));
        }
        Ok(())
    }
}

impl Clone for World {
    /// Deep copy. The unit indices are rebuilt from the per-player lists
    /// rather than copied.
    fn clone(&self) -> Self {
        let mut units = FxHashMap::default();
        let mut by_player = Vec::with_capacity(self.by_player.len());
        for coords in &self.by_player {
            let mut list = Vec::with_capacity(coords.len());
            for coord in coords {
                if let Some(unit) = self.units.get(coord) {
                    units.insert(*coord, unit.clone());
                    list.push(*coord);
                }
            }
            by_player.push(list);
        }
        Self {
            tiles: self.tiles.clone(),
            units,
            by_player,
            player_count: self.player_count,
        }
    }
}
