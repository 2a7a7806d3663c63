//! Asset lookup for renderers
//!
//! Renderers only see the `AssetProvider` trait. `GlyphAssets` is the
//! terminal provider: one character per terrain and unit type.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::rules::RulesEngine;
use crate::world::{PlayerId, TerrainTypeId, UnitTypeId};

/// Source of tile and unit artwork, keyed by catalog ids
pub trait AssetProvider {
    type Asset;

    fn has_tile_asset(&self, terrain: TerrainTypeId) -> bool;

    fn tile_asset(&self, terrain: TerrainTypeId) -> Option<Self::Asset>;

    fn has_unit_asset(&self, unit_type: UnitTypeId, player: PlayerId) -> bool;

    fn unit_asset(&self, unit_type: UnitTypeId, player: PlayerId) -> Option<Self::Asset>;
}

/// Single-character assets. Terrain glyphs are lowercase, unit glyphs
/// uppercase; the player is not encoded in the glyph.
#[derive(Clone, Debug, Default)]
pub struct GlyphAssets {
    tiles: FxHashMap<TerrainTypeId, char>,
    units: FxHashMap<UnitTypeId, char>,
}

impl GlyphAssets {
    /// Derive glyphs from catalog names: the first letter of the name not
    /// already taken, falling back to the last digit of the id
    pub fn from_rules(rules: &RulesEngine) -> Self {
        let mut assets = Self::default();

        let mut taken = FxHashSet::default();
        for id in rules.terrain_types() {
            if let Ok(data) = rules.terrain_data(id) {
                let glyph = pick_glyph(&data.name, id, &mut taken).to_ascii_lowercase();
                assets.tiles.insert(id, glyph);
            }
        }

        let mut taken = FxHashSet::default();
        for id in rules.unit_types() {
            if let Ok(data) = rules.unit_data(id) {
                let glyph = pick_glyph(&data.name, id, &mut taken).to_ascii_uppercase();
                assets.units.insert(id, glyph);
            }
        }
        assets
    }

    pub fn with_tile_glyph(mut self, terrain: TerrainTypeId, glyph: char) -> Self {
        self.tiles.insert(terrain, glyph);
        self
    }

    pub fn with_unit_glyph(mut self, unit_type: UnitTypeId, glyph: char) -> Self {
        self.units.insert(unit_type, glyph);
        self
    }
}

fn pick_glyph(name: &str, id: u32, taken: &mut FxHashSet<char>) -> char {
    let glyph = name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .find(|c| !taken.contains(c))
        .or_else(|| char::from_digit(id % 10, 10))
        .unwrap_or('?');
    taken.insert(glyph);
    glyph
}

impl AssetProvider for GlyphAssets {
    type Asset = char;

    fn has_tile_asset(&self, terrain: TerrainTypeId) -> bool {
        self.tiles.contains_key(&terrain)
    }

    fn tile_asset(&self, terrain: TerrainTypeId) -> Option<char> {
        self.tiles.get(&terrain).copied()
    }

    fn has_unit_asset(&self, unit_type: UnitTypeId, _player: PlayerId) -> bool {
        self.units.contains_key(&unit_type)
    }

    fn unit_asset(&self, unit_type: UnitTypeId, _player: PlayerId) -> Option<char> {
        self.units.get(&unit_type).copied()
    }
}
