//! Power grid scenarios across the power solver and the world.

use gridforge_core::fixed::Fixed64;
use gridforge_core::item::ItemKind;
use gridforge_power::PowerNode;
use gridforge_spatial::{Direction, GridPosition};
use gridforge_world::test_utils::*;
use gridforge_world::tile::TileKind;
use gridforge_world::{OperationStatus, World};

fn cell(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

/// A hub at (0,0) wired in a chain to `furnaces` furnaces along y = 0.
fn hub_with_furnaces(furnaces: i32) -> World {
    let mut world = grass_world(16, 4);
    place(&mut world, 0, 0, "hub", Direction::North);
    let mut previous = cell(1, 0);
    for i in 0..furnaces {
        let x = 3 + i;
        place(&mut world, x, 0, "furnace", Direction::North);
        assert!(world.add_cable(previous, cell(x, 0)));
        previous = cell(x, 0);
    }
    world
}

fn furnace_satisfactions(world: &World) -> Vec<Fixed64> {
    world
        .buildings()
        .filter(|(_, b)| b.furnace().is_some())
        .map(|(id, _)| world.power_satisfaction(id).unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

#[test]
fn enough_generation_fully_satisfies_every_consumer() {
    let mut world = hub_with_furnaces(5);
    world.tick_seconds(0.1);

    assert_eq!(world.power_grids().len(), 1);
    let grid = &world.power_grids()[0];
    assert_eq!(grid.generation, Fixed64::from_num(50));
    assert_eq!(grid.demand, Fixed64::from_num(50));
    assert!(furnace_satisfactions(&world).iter().all(|s| *s == Fixed64::ONE));
}

#[test]
fn shortfall_scales_satisfaction_exactly() {
    let mut world = hub_with_furnaces(6);
    world.tick_seconds(0.1);

    let expected = Fixed64::from_num(50) / Fixed64::from_num(60);
    let sats = furnace_satisfactions(&world);
    assert_eq!(sats.len(), 6);
    assert!(sats.iter().all(|s| *s == expected));

    // The hub itself reports the same grid-wide value.
    let hub = world.building_id_at(0, 0).unwrap();
    assert_eq!(world.power_satisfaction(hub), Some(expected));
}

#[test]
fn cutting_a_cable_splits_the_grid() {
    let mut world = hub_with_furnaces(3);
    assert!(world.remove_cable(cell(3, 0), cell(4, 0)));
    world.tick_seconds(0.1);

    assert_eq!(world.power_grids().len(), 2);
    let far = world.building_id_at(5, 0).unwrap();
    let grid = world.power_grid_of(far).unwrap();
    assert_eq!(grid.nodes.len(), 2);
    assert!(!grid.has_source);
    assert_eq!(world.power_satisfaction(far), Some(Fixed64::ZERO));
}

// ---------------------------------------------------------------------------
// Batteries
// ---------------------------------------------------------------------------

#[test]
fn surplus_charges_then_battery_carries_the_load() {
    let mut world = grass_world(12, 4);
    place(&mut world, 0, 0, "hub", Direction::North);
    let battery = place(&mut world, 4, 0, "battery", Direction::North);
    let furnace = place(&mut world, 6, 0, "furnace", Direction::North);
    assert!(world.add_cable(cell(1, 0), cell(4, 0)));
    assert!(world.add_cable(cell(4, 0), cell(6, 0)));

    // 40 surplus, capped at the 20/s charge rate.
    world.tick_seconds(1.0);
    let charge = world.building(battery).unwrap().battery().unwrap().charge;
    assert_eq!(charge, Fixed64::from_num(20));

    // Without the hub the battery covers the furnace's 10 demand.
    assert!(world.remove_cable(cell(1, 0), cell(4, 0)));
    world.tick_seconds(1.0);
    assert_eq!(world.power_satisfaction(furnace), Some(Fixed64::ONE));
    let grid = world.power_grid_of(furnace).unwrap();
    assert!(grid.has_source);
    let charge = world.building(battery).unwrap().battery().unwrap().charge;
    assert_eq!(charge, Fixed64::from_num(10));
}

#[test]
fn open_breaker_isolates_the_battery() {
    let mut world = grass_world(12, 4);
    place(&mut world, 0, 0, "hub", Direction::North);
    let battery = place(&mut world, 4, 0, "battery", Direction::North);
    assert!(world.add_cable(cell(1, 0), cell(4, 0)));
    assert!(world.set_battery_enabled(4, 0, false));

    world.tick_seconds(1.0);
    let charge = world.building(battery).unwrap().battery().unwrap().charge;
    assert_eq!(charge, Fixed64::ZERO);
}

// ---------------------------------------------------------------------------
// Production under power
// ---------------------------------------------------------------------------

/// Sand extractor -> two belts -> furnace (facing east, cells (3,0)-(4,0))
/// -> chest at (5,0). The hub sits at (8,2).
fn glass_line(wired: bool) -> World {
    let mut world = grass_world(12, 6);
    set_tile(&mut world, 0, 0, TileKind::Sand, 500);
    place(&mut world, 0, 0, "extractor", Direction::East);
    place(&mut world, 1, 0, "conveyor", Direction::East);
    place(&mut world, 2, 0, "conveyor", Direction::East);
    place(&mut world, 3, 0, "furnace", Direction::East);
    place(&mut world, 5, 0, "chest", Direction::North);
    place(&mut world, 8, 2, "hub", Direction::North);
    if wired {
        assert!(world.add_cable(cell(4, 0), cell(8, 2)));
    }
    world
}

#[test]
fn powered_furnace_smelts_into_the_chest() {
    let mut world = glass_line(true);
    for _ in 0..100 {
        world.tick_seconds(0.1);
    }
    let chest = world.building_id_at(5, 0).unwrap();
    assert!(chest_quantity(&world, chest, ItemKind::Glass) >= 1);
    assert_eq!(chest_quantity(&world, chest, ItemKind::Sand), 0);
}

#[test]
fn unpowered_furnace_reports_no_power() {
    let mut world = glass_line(false);
    for _ in 0..50 {
        world.tick_seconds(0.1);
    }
    let furnace = world.building_at(3, 0).unwrap();
    assert_eq!(furnace.status, OperationStatus::NoPower);
    assert!(!furnace.furnace().unwrap().input_queue.is_empty());
    let chest = world.building_id_at(5, 0).unwrap();
    assert_eq!(chest_quantity(&world, chest, ItemKind::Glass), 0);
}
