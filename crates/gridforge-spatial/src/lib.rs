//! Grid geometry for building placement, facing, ports and adjacency.
//!
//! Provides a 2D spatial index that maps grid cells to arena keys,
//! supporting multi-tile buildings whose footprint rotates with their
//! facing, and the facing-relative port projection every IO-capable
//! building uses to find its neighbors.

use gridforge_core::id::BuildingId;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the 2D grid. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent cell in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Cardinal directions. Buildings face one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, clockwise from north.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Self {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }

    /// East and west facings swap a footprint's width and height.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = SpatialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::all()
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| SpatialError::UnknownDirection(s.to_string()))
    }
}

/// A port side expressed relative to a building's facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
    Left,
    Right,
}

impl Side {
    pub fn all() -> [Side; 4] {
        [Side::Front, Side::Back, Side::Left, Side::Right]
    }

    /// Resolve to an absolute direction for a building facing `facing`.
    pub fn to_direction(self, facing: Direction) -> Direction {
        match self {
            Side::Front => facing,
            Side::Back => facing.opposite(),
            Side::Left => facing.rotate_ccw(),
            Side::Right => facing.rotate_cw(),
        }
    }
}

/// The unrotated size of a building (as placed facing north).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Default for Footprint {
    fn default() -> Self {
        Self::single()
    }
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 1x1 building.
    pub fn single() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }

    /// The footprint as laid out on the grid for `facing`.
    pub fn oriented(&self, facing: Direction) -> Self {
        if facing.is_horizontal() {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            *self
        }
    }

    /// Iterate over all tiles occupied by this footprint at the given origin.
    /// Origin is the top-left corner.
    pub fn tiles(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        let ox = origin.x;
        let oy = origin.y;
        (0..h).flat_map(move |dy| (0..w).map(move |dx| GridPosition::new(ox + dx, oy + dy)))
    }

    pub fn contains(&self, origin: GridPosition, pos: GridPosition) -> bool {
        pos.x >= origin.x
            && pos.y >= origin.y
            && pos.x < origin.x + self.width as i32
            && pos.y < origin.y + self.height as i32
    }
}

/// Project a port in absolute direction `dir` across an already oriented
/// footprint anchored at `anchor`.
///
/// East and south ports land one cell past the far edge, west and north
/// ports one cell before the anchor.
pub fn port_cell(anchor: GridPosition, oriented: Footprint, dir: Direction) -> GridPosition {
    match dir {
        Direction::East => GridPosition::new(anchor.x + oriented.width as i32, anchor.y),
        Direction::West => GridPosition::new(anchor.x - 1, anchor.y),
        Direction::South => GridPosition::new(anchor.x, anchor.y + oriented.height as i32),
        Direction::North => GridPosition::new(anchor.x, anchor.y - 1),
    }
}

/// Errors from spatial operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("position {0:?} is occupied")]
    Occupied(GridPosition),
    #[error("key is not placed on the grid")]
    NotPlaced,
    #[error("key is already placed on the grid")]
    AlreadyPlaced,
    #[error("unknown direction: {0}")]
    UnknownDirection(String),
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// A spatial index mapping grid cells to arena keys.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: cell -> key (which building occupies each cell)
/// - `positions`: key -> anchor cell
/// - `footprints`: key -> oriented footprint
#[derive(Debug)]
pub struct SpatialIndex<K: Key = BuildingId> {
    tiles: BTreeMap<GridPosition, K>,
    positions: SecondaryMap<K, GridPosition>,
    footprints: SecondaryMap<K, Footprint>,
}

impl<K: Key> Default for SpatialIndex<K> {
    fn default() -> Self {
        Self {
            tiles: BTreeMap::new(),
            positions: SecondaryMap::new(),
            footprints: SecondaryMap::new(),
        }
    }
}

impl<K: Key> SpatialIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Placement --

    /// Register `key` under every cell of `footprint` at `position`.
    /// The footprint must already be oriented.
    pub fn place(
        &mut self,
        key: K,
        position: GridPosition,
        footprint: Footprint,
    ) -> Result<(), SpatialError> {
        if self.positions.contains_key(key) {
            return Err(SpatialError::AlreadyPlaced);
        }

        if let Some(taken) = footprint.tiles(position).find(|t| self.tiles.contains_key(t)) {
            return Err(SpatialError::Occupied(taken));
        }

        for tile in footprint.tiles(position) {
            self.tiles.insert(tile, key);
        }
        self.positions.insert(key, position);
        self.footprints.insert(key, footprint);

        Ok(())
    }

    /// Remove every cell registration for `key`. Returns its anchor.
    pub fn remove(&mut self, key: K) -> Result<GridPosition, SpatialError> {
        let position = self.positions.remove(key).ok_or(SpatialError::NotPlaced)?;
        let footprint = self.footprints.remove(key).ok_or(SpatialError::NotPlaced)?;

        for tile in footprint.tiles(position) {
            self.tiles.remove(&tile);
        }

        Ok(position)
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.positions.clear();
        self.footprints.clear();
    }

    // -- Point queries --

    pub fn key_at(&self, pos: GridPosition) -> Option<K> {
        self.tiles.get(&pos).copied()
    }

    pub fn get_position(&self, key: K) -> Option<GridPosition> {
        self.positions.get(key).copied()
    }

    pub fn get_footprint(&self, key: K) -> Option<Footprint> {
        self.footprints.get(key).copied()
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    /// All cells registered for `key`, in row-major order.
    pub fn cells_of(&self, key: K) -> Vec<GridPosition> {
        match (self.get_position(key), self.get_footprint(key)) {
            (Some(pos), Some(fp)) => fp.tiles(pos).collect(),
            _ => Vec::new(),
        }
    }

    // -- Adjacency --

    /// Unique keys touching any edge cell of `key`, in N/E/S/W order.
    pub fn neighbors_4(&self, key: K) -> Vec<K> {
        let own: BTreeSet<GridPosition> = self.cells_of(key).into_iter().collect();
        let mut result = Vec::new();

        for dir in Direction::all() {
            for tile in &own {
                let next = tile.step(dir);
                if own.contains(&next) {
                    continue;
                }
                if let Some(&other) = self.tiles.get(&next) {
                    if !result.contains(&other) {
                        result.push(other);
                    }
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use slotmap::SlotMap;

    fn make_keys(count: usize) -> (SlotMap<BuildingId, ()>, Vec<BuildingId>) {
        let mut sm = SlotMap::with_key();
        let ids: Vec<BuildingId> = (0..count).map(|_| sm.insert(())).collect();
        (sm, ids)
    }

    // -----------------------------------------------------------------------
    // Direction / Side
    // -----------------------------------------------------------------------

    #[test]
    fn rotations_are_inverse() {
        for d in Direction::all() {
            assert_eq!(d.rotate_cw().rotate_ccw(), d);
            assert_eq!(d.rotate_cw().rotate_cw(), d.opposite());
        }
    }

    #[test]
    fn direction_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Direction::East).unwrap(), "\"east\"");
        assert_eq!("west".parse::<Direction>().unwrap(), Direction::West);
        assert!(matches!(
            "up".parse::<Direction>(),
            Err(SpatialError::UnknownDirection(_))
        ));
    }

    #[test]
    fn side_resolution_for_east_facing() {
        let facing = Direction::East;
        assert_eq!(Side::Front.to_direction(facing), Direction::East);
        assert_eq!(Side::Back.to_direction(facing), Direction::West);
        assert_eq!(Side::Left.to_direction(facing), Direction::North);
        assert_eq!(Side::Right.to_direction(facing), Direction::South);
    }

    #[test]
    fn step_moves_one_cell() {
        let p = GridPosition::new(4, 4);
        assert_eq!(p.step(Direction::North), GridPosition::new(4, 3));
        assert_eq!(p.step(Direction::East).step(Direction::West), p);
    }

    // -----------------------------------------------------------------------
    // Footprint / ports
    // -----------------------------------------------------------------------

    #[test]
    fn footprint_orientation_swaps_on_horizontal_facing() {
        let fp = Footprint::new(1, 2);
        assert_eq!(fp.oriented(Direction::North), fp);
        assert_eq!(fp.oriented(Direction::South), fp);
        assert_eq!(fp.oriented(Direction::East), Footprint::new(2, 1));
        assert_eq!(fp.oriented(Direction::West), Footprint::new(2, 1));
    }

    #[test]
    fn footprint_tiles_row_major() {
        let tiles: Vec<_> = Footprint::new(2, 2).tiles(GridPosition::new(3, 5)).collect();
        assert_eq!(
            tiles,
            vec![
                GridPosition::new(3, 5),
                GridPosition::new(4, 5),
                GridPosition::new(3, 6),
                GridPosition::new(4, 6),
            ]
        );
    }

    #[test]
    fn port_projection_uses_rotated_dimensions() {
        let anchor = GridPosition::new(10, 10);
        // A 1x2 building facing east occupies (10,10)-(11,10).
        let fp = Footprint::new(1, 2).oriented(Direction::East);
        assert_eq!(port_cell(anchor, fp, Direction::East), GridPosition::new(12, 10));
        assert_eq!(port_cell(anchor, fp, Direction::West), GridPosition::new(9, 10));
        // Facing south it occupies (10,10)-(10,11).
        let fp = Footprint::new(1, 2).oriented(Direction::South);
        assert_eq!(port_cell(anchor, fp, Direction::South), GridPosition::new(10, 12));
        assert_eq!(port_cell(anchor, fp, Direction::North), GridPosition::new(10, 9));
    }

    // -----------------------------------------------------------------------
    // SpatialIndex
    // -----------------------------------------------------------------------

    #[test]
    fn place_2x2_registers_every_cell() {
        let (_sm, ids) = make_keys(1);
        let mut index = SpatialIndex::new();
        index
            .place(ids[0], GridPosition::new(5, 5), Footprint::new(2, 2))
            .unwrap();

        for (x, y) in [(5, 5), (6, 5), (5, 6), (6, 6)] {
            assert_eq!(index.key_at(GridPosition::new(x, y)), Some(ids[0]));
        }
        assert_eq!(index.key_at(GridPosition::new(7, 5)), None);
        assert_eq!(index.cells_of(ids[0]).len(), 4);
    }

    #[test]
    fn partial_overlap_is_rejected_without_mutation() {
        let (_sm, ids) = make_keys(2);
        let mut index = SpatialIndex::new();
        index
            .place(ids[0], GridPosition::new(1, 1), Footprint::single())
            .unwrap();

        let result = index.place(ids[1], GridPosition::new(0, 0), Footprint::new(2, 2));
        assert_eq!(result, Err(SpatialError::Occupied(GridPosition::new(1, 1))));
        assert!(index.is_occupied(GridPosition::new(1, 1)));
        assert!(!index.is_occupied(GridPosition::new(0, 0)));
        assert!(index.get_position(ids[1]).is_none());
    }

    #[test]
    fn double_place_same_key_is_rejected() {
        let (_sm, ids) = make_keys(1);
        let mut index = SpatialIndex::new();
        index
            .place(ids[0], GridPosition::new(0, 0), Footprint::single())
            .unwrap();
        assert_eq!(
            index.place(ids[0], GridPosition::new(3, 3), Footprint::single()),
            Err(SpatialError::AlreadyPlaced)
        );
    }

    #[test]
    fn remove_frees_all_cells() {
        let (_sm, ids) = make_keys(2);
        let mut index = SpatialIndex::new();
        let pos = GridPosition::new(3, 3);
        index.place(ids[0], pos, Footprint::new(2, 2)).unwrap();
        assert_eq!(index.remove(ids[0]), Ok(pos));
        assert!(Footprint::new(2, 2).tiles(pos).all(|c| !index.is_occupied(c)));
        assert_eq!(index.remove(ids[0]), Err(SpatialError::NotPlaced));
        index.place(ids[1], pos, Footprint::new(2, 2)).unwrap();
    }

    #[test]
    fn neighbors_4_are_unique() {
        let (_sm, ids) = make_keys(3);
        let mut index = SpatialIndex::new();
        index
            .place(ids[0], GridPosition::new(0, 0), Footprint::new(2, 2))
            .unwrap();
        // A 1x2 column east of the 2x2 touches it along two cells.
        index
            .place(ids[1], GridPosition::new(2, 0), Footprint::new(1, 2))
            .unwrap();
        index
            .place(ids[2], GridPosition::new(0, 2), Footprint::single())
            .unwrap();

        let n = index.neighbors_4(ids[0]);
        assert_eq!(n, vec![ids[1], ids[2]]);
        assert_eq!(index.neighbors_4(ids[2]), vec![ids[0]]);
    }

    proptest! {
        #[test]
        fn occupied_cells_match_oriented_rectangle(
            x in -20i32..20,
            y in -20i32..20,
            w in 1u32..4,
            h in 1u32..4,
            facing in 0usize..4,
        ) {
            let (_sm, ids) = make_keys(1);
            let mut index = SpatialIndex::new();
            let facing = Direction::all()[facing];
            let fp = Footprint::new(w, h).oriented(facing);
            let anchor = GridPosition::new(x, y);
            index.place(ids[0], anchor, fp).unwrap();

            let cells = index.cells_of(ids[0]);
            prop_assert_eq!(cells.len() as u32, w * h);
            for cell in cells {
                prop_assert!(fp.contains(anchor, cell));
                prop_assert_eq!(index.key_at(cell), Some(ids[0]));
            }
        }
    }
}
