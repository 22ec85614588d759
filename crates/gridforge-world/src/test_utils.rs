//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use gridforge_core::fixed::Fixed64;
use gridforge_core::id::BuildingId;
use gridforge_core::item::ItemKind;
use gridforge_spatial::Direction;

use crate::catalog::{BuildingKind, Catalog};
use crate::conveyor::BeltItem;
use crate::tile::{Tile, TileKind};
use crate::world::World;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// World builders
// ===========================================================================

/// The built-in catalog with a custom world size.
pub fn catalog_sized(width: u32, height: u32) -> Catalog {
    let mut catalog = Catalog::default();
    catalog.settings.width = width;
    catalog.settings.height = height;
    catalog
}

/// An all-grass world with the built-in catalog.
pub fn grass_world(width: u32, height: u32) -> World {
    World::new(catalog_sized(width, height))
}

/// Like [`grass_world`] with the extractor's rate overridden.
pub fn world_with_extraction_rate(width: u32, height: u32, rate: f64) -> World {
    let mut catalog = catalog_sized(width, height);
    if let Some(def) = catalog.building_mut(BuildingKind::Extractor) {
        def.extraction_rate = fixed(rate);
    }
    World::new(catalog)
}

// ===========================================================================
// Tiles
// ===========================================================================

pub fn set_tile(world: &mut World, x: i32, y: i32, kind: TileKind, amount: u32) {
    assert!(world.set_tile(x, y, Tile::with_amount(kind, amount)));
}

pub fn stone_at(world: &mut World, x: i32, y: i32, amount: u32) {
    set_tile(world, x, y, TileKind::Stone, amount);
}

// ===========================================================================
// Buildings
// ===========================================================================

/// Place a building or panic with the refusal reason.
pub fn place(world: &mut World, x: i32, y: i32, type_name: &str, direction: Direction) -> BuildingId {
    world
        .try_place_building(x, y, type_name, direction)
        .unwrap_or_else(|err| panic!("placing {type_name} at ({x},{y}): {err}"))
}

/// Put an item on a conveyor at `progress`, minting a fresh uid.
pub fn set_belt_item(world: &mut World, id: BuildingId, item: ItemKind, progress: Fixed64) {
    let uid = world.mint_uid();
    let belt = world
        .building_mut(id)
        .and_then(|b| b.conveyor_mut())
        .unwrap();
    belt.slot = Some(BeltItem { item, uid });
    belt.progress = progress;
}

pub fn chest_quantity(world: &World, id: BuildingId, item: ItemKind) -> u32 {
    world
        .building(id)
        .and_then(|b| b.chest())
        .map_or(0, |c| c.quantity(item))
}

pub fn belt_item(world: &World, id: BuildingId) -> Option<ItemKind> {
    world
        .building(id)
        .and_then(|b| b.conveyor())
        .and_then(|c| c.slot)
        .map(|s| s.item)
}

// ===========================================================================
// Factory builders
// ===========================================================================

/// A stone line: extractor on the left edge, `belts` conveyors heading
/// east, then a chest. Returns the extractor and chest ids.
pub fn build_stone_line(world: &mut World, y: i32, belts: i32) -> (BuildingId, BuildingId) {
    stone_at(world, 0, y, 10_000);
    let extractor = place(world, 0, y, "extractor", Direction::East);
    for x in 1..=belts {
        place(world, x, y, "conveyor", Direction::East);
    }
    let chest = place(world, belts + 1, y, "chest", Direction::North);
    (extractor, chest)
}

/// Several parallel stone lines for benchmarks.
pub fn build_line_factory(rows: i32, belts: i32) -> World {
    let mut world = grass_world((belts + 2) as u32, (rows * 2) as u32);
    for row in 0..rows {
        build_stone_line(&mut world, row * 2, belts);
    }
    world
}
