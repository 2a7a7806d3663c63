//! Hex grid geometry with axial coordinates
//!
//! The grid is unbounded. Anything that needs a rectangle (the editor, map
//! files) goes through the odd-r row/column conversion at the bottom of this
//! module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Axial hex coordinates. The third cube coordinate is `s = -q - r`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

/// The six neighbor directions. Order matters: `Hex::ring` and
/// `Hex::neighbors` walk this table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left = 0,
    TopLeft = 1,
    TopRight = 2,
    Right = 3,
    BottomRight = 4,
    BottomLeft = 5,
}

/// Direction vectors in axial coordinates (dq, dr), indexed by `Direction`
pub const DIRECTIONS: [(i32, i32); 6] = [
    (-1, 0), // Left
    (0, -1), // TopLeft
    (1, -1), // TopRight
    (1, 0),  // Right
    (0, 1),  // BottomRight
    (-1, 1), // BottomLeft
];

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Left,
        Direction::TopLeft,
        Direction::TopRight,
        Direction::Right,
        Direction::BottomRight,
        Direction::BottomLeft,
    ];

    pub fn vector(self) -> (i32, i32) {
        DIRECTIONS[self as usize]
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Direction::Left => "L",
            Direction::TopLeft => "TL",
            Direction::TopRight => "TR",
            Direction::Right => "R",
            Direction::BottomRight => "BR",
            Direction::BottomLeft => "BL",
        }
    }
}

impl FromStr for Direction {
    type Err = ParseHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LEFT" => Ok(Direction::Left),
            "TL" | "TOP-LEFT" | "TOPLEFT" => Ok(Direction::TopLeft),
            "TR" | "TOP-RIGHT" | "TOPRIGHT" => Ok(Direction::TopRight),
            "R" | "RIGHT" => Ok(Direction::Right),
            "BR" | "BOTTOM-RIGHT" | "BOTTOMRIGHT" => Ok(Direction::BottomRight),
            "BL" | "BOTTOM-LEFT" | "BOTTOMLEFT" => Ok(Direction::BottomLeft),
            _ => Err(ParseHexError(s.to_string())),
        }
    }
}

/// Failed to parse a coordinate key or direction name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse hex coordinate or direction: {0:?}")]
pub struct ParseHexError(pub String);

impl Hex {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Derived cube coordinate
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: Hex) -> i32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        (dq + dr + ds) / 2
    }

    /// Get neighbor in direction
    pub fn neighbor(&self, direction: Direction) -> Hex {
        let (dq, dr) = direction.vector();
        Hex::new(self.q + dq, self.r + dr)
    }

    /// All six neighbors, in `Direction` order
    pub fn neighbors(&self) -> [Hex; 6] {
        Direction::ALL.map(|d| self.neighbor(d))
    }

    /// Every hex within `radius` of this one (inclusive).
    /// Returns `3r² + 3r + 1` hexes; a negative radius yields nothing.
    pub fn range(&self, radius: i32) -> Vec<Hex> {
        if radius < 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((3 * radius * radius + 3 * radius + 1) as usize);
        for dq in -radius..=radius {
            let r1 = (-radius).max(-dq - radius);
            let r2 = radius.min(-dq + radius);
            for dr in r1..=r2 {
                out.push(Hex::new(self.q + dq, self.r + dr));
            }
        }
        out
    }

    /// Hexes at exactly `radius`, in walk order (not sorted).
    ///
    /// Starts `radius` steps Left of center, then walks `radius` steps along
    /// each side: TopRight, Right, BottomRight, BottomLeft, Left, TopLeft.
    pub fn ring(&self, radius: i32) -> Vec<Hex> {
        if radius <= 0 {
            return if radius == 0 { vec![*self] } else { Vec::new() };
        }

        const WALK: [Direction; 6] = [
            Direction::TopRight,
            Direction::Right,
            Direction::BottomRight,
            Direction::BottomLeft,
            Direction::Left,
            Direction::TopLeft,
        ];

        let (lq, lr) = Direction::Left.vector();
        let mut current = Hex::new(self.q + lq * radius, self.r + lr * radius);
        let mut out = Vec::with_capacity(6 * radius as usize);
        for dir in WALK {
            for _ in 0..radius {
                out.push(current);
                current = current.neighbor(dir);
            }
        }
        out
    }

    /// Follow a chain of directions from this hex
    pub fn walk(&self, path: &[Direction]) -> Hex {
        path.iter().fold(*self, |at, &d| at.neighbor(d))
    }

    /// Persistence key form, `"q,r"`
    pub fn key(&self) -> String {
        format!("{},{}", self.q, self.r)
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.q, self.r)
    }
}

impl FromStr for Hex {
    type Err = ParseHexError;

    /// Accepts `"q,r"` with optional surrounding parentheses
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (q, r) = trimmed
            .split_once(',')
            .ok_or_else(|| ParseHexError(s.to_string()))?;
        let q = q.trim().parse().map_err(|_| ParseHexError(s.to_string()))?;
        let r = r.trim().parse().map_err(|_| ParseHexError(s.to_string()))?;
        Ok(Hex::new(q, r))
    }
}

/// Parse a comma-separated direction chain such as `"TL,TL,TR"`
pub fn parse_direction_chain(s: &str) -> Result<Vec<Direction>, ParseHexError> {
    s.split(',').map(str::parse).collect()
}

// ============================================================================
// ROW / COLUMN (odd-r offset layout)
// ============================================================================

/// Display grid position to axial coordinate
pub fn row_col_to_hex(row: i32, col: i32) -> Hex {
    let q = col - (row - (row & 1)) / 2;
    Hex::new(q, row)
}

/// Axial coordinate to display grid position `(row, col)`
pub fn hex_to_row_col(hex: Hex) -> (i32, i32) {
    let col = hex.q + (hex.r - (hex.r & 1)) / 2;
    (hex.r, col)
}

/// True when `hex` falls inside a `rows × cols` display rectangle
pub fn in_rect(hex: Hex, rows: i32, cols: i32) -> bool {
    let (row, col) = hex_to_row_col(hex);
    row >= 0 && row < rows && col >= 0 && col < cols
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_neighbor_order() {
        let c = Hex::new(0, 0);
        assert_eq!(c.neighbor(Direction::Left), Hex::new(-1, 0));
        assert_eq!(c.neighbor(Direction::TopRight), Hex::new(1, -1));
        assert_eq!(c.neighbor(Direction::BottomLeft), Hex::new(-1, 1));
        assert_eq!(c.neighbors()[3], Hex::new(1, 0));
    }

    #[test]
    fn test_distance() {
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(0, 0)), 0);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(1, 0)), 1);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(2, 2)), 4);
        assert_eq!(Hex::new(-3, 1).distance_to(Hex::new(2, -1)), 5);
    }

    #[test]
    fn test_range_size() {
        let c = Hex::new(3, -2);
        for k in 0..=3 {
            assert_eq!(c.range(k).len() as i32, 3 * k * k + 3 * k + 1);
        }
        assert_eq!(c.range(0), vec![c]);
    }

    #[test]
    fn test_ring_cardinality() {
        let c = Hex::new(-1, 4);
        assert_eq!(c.ring(0), vec![c]);
        for k in 1..=4 {
            let ring = c.ring(k);
            assert_eq!(ring.len() as i32, 6 * k);
            assert!(ring.iter().all(|h| h.distance_to(c) == k));
        }
    }

    #[test]
    fn test_ring_starts_left() {
        let ring = Hex::new(0, 0).ring(2);
        assert_eq!(ring[0], Hex::new(-2, 0));
        assert_eq!(ring[1], Hex::new(-1, -1));
    }

    #[test]
    fn test_parse() {
        assert_eq!("3,-4".parse::<Hex>().unwrap(), Hex::new(3, -4));
        assert_eq!("(1, 2)".parse::<Hex>().unwrap(), Hex::new(1, 2));
        assert!("1;2".parse::<Hex>().is_err());
        assert_eq!(
            parse_direction_chain("TL,tr,R").unwrap(),
            vec![Direction::TopLeft, Direction::TopRight, Direction::Right]
        );
        assert!(parse_direction_chain("TL,UP").is_err());
        assert_eq!(Hex::new(7, -2).key(), "7,-2");
    }

    #[test]
    fn test_walk() {
        let end = Hex::new(0, 0).walk(&[Direction::TopLeft, Direction::TopLeft]);
        assert_eq!(end, Hex::new(0, -2));
    }

    #[test]
    fn test_rect_bounds() {
        assert!(in_rect(row_col_to_hex(0, 0), 5, 5));
        assert!(in_rect(row_col_to_hex(4, 4), 5, 5));
        assert!(!in_rect(row_col_to_hex(5, 0), 5, 5));
        assert!(!in_rect(row_col_to_hex(2, -1), 5, 5));
    }

    proptest! {
        #[test]
        fn prop_row_col_round_trip(row in -200i32..200, col in -200i32..200) {
            prop_assert_eq!(hex_to_row_col(row_col_to_hex(row, col)), (row, col));
        }

        #[test]
        fn prop_distance_symmetric(
            aq in -50i32..50, ar in -50i32..50,
            bq in -50i32..50, br in -50i32..50,
        ) {
            let a = Hex::new(aq, ar);
            let b = Hex::new(bq, br);
            prop_assert_eq!(a.distance_to(b), b.distance_to(a));
            prop_assert!(a.distance_to(b) >= 0);
        }

        #[test]
        fn prop_triangle_inequality(
            aq in -50i32..50, ar in -50i32..50,
            bq in -50i32..50, br in -50i32..50,
            cq in -50i32..50, cr in -50i32..50,
        ) {
            let (a, b, c) = (Hex::new(aq, ar), Hex::new(bq, br), Hex::new(cq, cr));
            prop_assert!(a.distance_to(c) <= a.distance_to(b) + b.distance_to(c));
        }

        #[test]
        fn prop_cube_invariant(q in -1000i32..1000, r in -1000i32..1000) {
            let h = Hex::new(q, r);
            prop_assert_eq!(h.q + h.r + h.s(), 0);
        }
    }
}
