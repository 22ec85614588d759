//! Headless run of a small factory.
//!
//! Builds an extractor line, a sand line into a powered furnace and a
//! hub, runs a minute of simulated time and prints what ended up where.
//!
//! ```text
//! RUST_LOG=gridforge_world=debug cargo run -p gridforge-world --example headless
//! ```

use gridforge_spatial::{Direction, GridPosition};
use gridforge_world::event::EventKind;
use gridforge_world::{Catalog, Event, OperationStatus, Tile, TileKind, World};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut catalog = Catalog::default();
    catalog.settings.width = 16;
    catalog.settings.height = 8;
    let mut world = World::new(catalog);

    world.events_mut().on_passive(
        EventKind::ItemCrafted,
        Box::new(|event| {
            if let Event::ItemCrafted { item, tick, .. } = event {
                tracing::info!(%item, tick, "crafted");
            }
        }),
    );

    // Stone line: extractor -> 4 belts -> chest.
    world.set_tile(0, 1, Tile::new(TileKind::Stone));
    world.place_building(0, 1, "extractor", Direction::East);
    for x in 1..=4 {
        world.place_building(x, 1, "conveyor", Direction::East);
    }
    world.place_building(5, 1, "chest", Direction::North);

    // Sand line into a furnace, output into a chest, powered by the hub.
    world.set_tile(0, 4, Tile::new(TileKind::Sand));
    world.place_building(0, 4, "extractor", Direction::East);
    world.place_building(1, 4, "conveyor", Direction::East);
    world.place_building(2, 4, "conveyor", Direction::East);
    world.place_building(3, 4, "furnace", Direction::East);
    world.place_building(5, 4, "chest", Direction::North);
    world.place_building(10, 4, "hub", Direction::North);
    world.add_cable(GridPosition::new(4, 4), GridPosition::new(10, 4));

    for _ in 0..600 {
        world.tick_seconds(0.1);
    }

    for (_, building) in world.buildings() {
        if building.status != OperationStatus::Idle {
            println!("{} at {:?}: {:?}", building.kind, building.position, building.status);
        }
        if let Some(chest) = building.chest() {
            println!("chest at {:?} holds {} items", building.position, chest.total());
        }
    }
    println!(
        "stone left: {}, sand left: {}",
        world.tile(0, 1).resource_amount(),
        world.tile(0, 4).resource_amount()
    );
}
