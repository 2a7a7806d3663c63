//! Map editor: brush painting, flood fill and bounded undo/redo
//!
//! The editor owns a `World` and a rectangular display area. Every edit
//! pushes a copy of the terrain onto a snapshot ring; units are not part of
//! the history.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashSet;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::board::{hex_to_row_col, in_rect, Hex};
use crate::config::EditorConfig;
use crate::rules::RulesEngine;
use crate::world::{TerrainMap, TerrainTypeId, World};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("invalid brush size: {size} (must be 0-{max})")]
    InvalidBrushSize { size: i32, max: i32 },
    #[error("no tile at {0}")]
    NoTile(Hex),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

// ============================================================================
// SNAPSHOT RING
// ============================================================================

/// Fixed-capacity history with a cursor. Pushing drops anything ahead of
/// the cursor; at capacity the oldest entry is evicted.
#[derive(Clone, Debug)]
pub struct SnapshotRing<T> {
    entries: VecDeque<T>,
    cursor: usize,
    capacity: usize,
}

impl<T> SnapshotRing<T> {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize, initial: T) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(item);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back and return the entry now under the cursor
    pub fn undo(&mut self) -> Option<&T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

// ============================================================================
// EDITOR
// ============================================================================

/// Summary of the map being edited
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MapInfo {
    pub rows: i32,
    pub cols: i32,
    pub total_tiles: usize,
    pub terrain_counts: BTreeMap<TerrainTypeId, usize>,
    pub modified: bool,
}

#[derive(Clone, Debug)]
pub struct EditorHistory {
    world: World,
    rows: i32,
    cols: i32,
    config: EditorConfig,
    history: SnapshotRing<TerrainMap>,
    modified: bool,
}

impl EditorHistory {
    /// Start editing `world`; its current terrain is the first snapshot
    pub fn new(world: World, rows: i32, cols: i32, config: EditorConfig) -> Self {
        let history = SnapshotRing::new(config.max_history, world.terrain());
        Self {
            world,
            rows,
            cols,
            config,
            history,
            modified: false,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn into_world(self) -> World {
        self.world
    }

    pub fn dimensions(&self) -> (i32, i32) {
        (self.rows, self.cols)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn commit(&mut self) {
        self.history.push(self.world.terrain());
        self.modified = true;
    }

    // ========================================================================
    // EDITS
    // ========================================================================

    /// Set every tile within `brush_size` of `center` to `terrain`, skipping
    /// positions outside the map rectangle. Returns the number of tiles
    /// painted.
    pub fn paint_terrain(
        &mut self,
        center: Hex,
        terrain: TerrainTypeId,
        brush_size: i32,
    ) -> Result<usize, EditorError> {
        if brush_size < 0 || brush_size > self.config.max_brush_size {
            return Err(EditorError::InvalidBrushSize {
                size: brush_size,
                max: self.config.max_brush_size,
            });
        }

        let mut painted = 0;
        for coord in center.range(brush_size) {
            if !in_rect(coord, self.rows, self.cols) {
                continue;
            }
            self.world.set_tile_type(coord, terrain);
            painted += 1;
        }
        self.commit();
        debug!(%center, terrain, brush_size, painted, "painted terrain");
        Ok(painted)
    }

    /// Delete the tile at `coord`. Removing an empty position still records
    /// a history entry.
    pub fn remove_terrain(&mut self, coord: Hex) -> bool {
        let removed = self.world.remove_tile(coord).is_some();
        self.commit();
        removed
    }

    /// Replace the connected region of same-terrain tiles containing
    /// `start`. Returns how many tiles changed; filling with the terrain
    /// already there changes nothing and records no history.
    pub fn flood_fill(&mut self, start: Hex, terrain: TerrainTypeId) -> Result<usize, EditorError> {
        let original = self
            .world
            .tile_at(start)
            .ok_or(EditorError::NoTile(start))?
            .terrain_type;
        if original == terrain {
            return Ok(0);
        }

        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::from([start]);
        let mut changed = 0;

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            match self.world.tile_at_mut(current) {
                Some(tile) if tile.terrain_type == original => tile.terrain_type = terrain,
                _ => continue,
            }
            changed += 1;

            for next in current.neighbors() {
                if !visited.contains(&next) && in_rect(next, self.rows, self.cols) {
                    queue.push_back(next);
                }
            }
        }

        self.commit();
        debug!(%start, terrain, changed, "flood fill");
        Ok(changed)
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn undo(&mut self) -> Result<(), EditorError> {
        let terrain = self.history.undo().ok_or(EditorError::NothingToUndo)?.clone();
        self.world.restore_terrain(terrain);
        self.modified = true;
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EditorError> {
        let terrain = self.history.redo().ok_or(EditorError::NothingToRedo)?.clone();
        self.world.restore_terrain(terrain);
        self.modified = true;
        Ok(())
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    pub fn map_info(&self) -> MapInfo {
        let mut terrain_counts = BTreeMap::new();
        for tile in self.world.tiles() {
            *terrain_counts.entry(tile.terrain_type).or_insert(0) += 1;
        }
        MapInfo {
            rows: self.rows,
            cols: self.cols,
            total_tiles: self.world.tile_count(),
            terrain_counts,
            modified: self.modified,
        }
    }

    /// Human-readable problems with the map: holes in the rectangle,
    /// terrain missing from the catalog, odd dimensions
    pub fn validate_map(&self, rules: &RulesEngine) -> Vec<String> {
        let mut issues = Vec::new();

        let expected = (self.rows.max(0) * self.cols.max(0)) as usize;
        let inside = self
            .world
            .tiles()
            .filter(|t| in_rect(t.coord, self.rows, self.cols))
            .count();
        if inside < expected {
            issues.push(format!("map has holes: {} tiles missing", expected - inside));
        }

        let mut unknown: Vec<_> = self
            .world
            .tiles()
            .filter(|t| rules.terrain_data(t.terrain_type).is_err())
            .map(|t| (hex_to_row_col(t.coord), t.terrain_type))
            .collect();
        unknown.sort_unstable();
        for ((row, col), terrain) in unknown {
            issues.push(format!("unknown terrain type {terrain} at row {row}, col {col}"));
        }

        if self.rows < 3 || self.cols < 3 {
            issues.push("map is very small (recommended minimum 3x3)".to_string());
        }
        if self.rows > 50 || self.cols > 50 {
            issues.push("map is very large (over 50 rows or columns)".to_string());
        }
        issues
    }
}
