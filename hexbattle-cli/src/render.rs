//! Text board rendering for terminal output

use hexbattle_core::board::{hex_to_row_col, row_col_to_hex};
use hexbattle_core::{AssetProvider, World};

const CELL: usize = 4;

/// Draw the world in odd-r layout, odd rows shifted half a cell right.
/// Units print as glyph plus player number, tiles as their glyph, missing
/// tiles as blanks.
pub fn draw_board<P>(world: &World, assets: &P) -> String
where
    P: AssetProvider<Asset = char>,
{
    let mut bounds: Option<(i32, i32, i32, i32)> = None;
    for tile in world.tiles() {
        let (row, col) = hex_to_row_col(tile.coord);
        bounds = Some(match bounds {
            None => (row, row, col, col),
            Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
        });
    }
    let Some((min_row, max_row, min_col, max_col)) = bounds else {
        return String::new();
    };

    let mut out = String::new();
    for row in min_row..=max_row {
        let mut line = String::new();
        if row & 1 == 1 {
            line.push_str(&" ".repeat(CELL / 2));
        }
        for col in min_col..=max_col {
            let coord = row_col_to_hex(row, col);
            let cell = match (world.unit_at(coord), world.tile_at(coord)) {
                (Some(unit), _) => {
                    let glyph = assets.unit_asset(unit.unit_type, unit.player).unwrap_or('?');
                    format!("{glyph}{}", unit.player)
                }
                (None, Some(tile)) => assets
                    .tile_asset(tile.terrain_type)
                    .unwrap_or('?')
                    .to_string(),
                (None, None) => String::new(),
            };
            line.push_str(&format!("{cell:<CELL$}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexbattle_core::{GlyphAssets, Unit};

    #[test]
    fn test_draw_small_board() {
        let mut world = World::new(2).unwrap();
        for row in 0..2 {
            for col in 0..3 {
                world.set_tile_type(row_col_to_hex(row, col), 1);
            }
        }
        world.set_tile_type(row_col_to_hex(1, 2), 2);
        world.add_unit(Unit::new(1, 2, row_col_to_hex(0, 1))).unwrap();

        let assets = GlyphAssets::default()
            .with_tile_glyph(1, 'g')
            .with_tile_glyph(2, 'f')
            .with_unit_glyph(1, 'S');
        let board = draw_board(&world, &assets);
        let lines: Vec<&str> = board.lines().collect();
        assert_eq!(lines, vec!["g   S2  g", "  g   g   f"]);
    }

    #[test]
    fn test_draw_empty_world() {
        let world = World::new(2).unwrap();
        assert_eq!(draw_board(&world, &GlyphAssets::default()), "");
    }
}
