//! Gridforge World -- the tile and building simulation.
//!
//! A [`world::World`] owns a rectangular tile grid, the buildings placed on
//! it, the power cables between them and an [`event::EventBus`]. Callers
//! mutate it through placement, removal and cable operations and advance
//! it with [`world::World::tick`].
//!
//! # Per-Tick Pipeline
//!
//! 1. **Power** -- refresh demand/generation and balance every grid.
//! 2. **Buildings** -- in insertion order: refresh port connectivity, then
//!    mine, craft, move belt items or merge/split.
//! 3. **Tiles** -- depleted resource tiles decay to grass.
//! 4. **Bookkeeping** -- advance the tick counter and deliver events.
//!
//! # Key Types
//!
//! - [`world::World`] -- grid, buildings, cables and the tick loop.
//! - [`building::Building`] -- a placed building and its kind-specific
//!   [`building::BuildingState`].
//! - [`catalog::Catalog`] -- building definitions, recipes and world
//!   settings; the built-in balance is `Catalog::default()`.
//! - [`transfer::Offer`] -- the single item hand-off protocol.
//! - [`save::WorldSave`] -- the JSON snapshot format.
//! - [`upgrade::Upgrades`] / [`limits::PlacementLimits`] -- collaborators
//!   supplied by the progression layer.

pub mod building;
pub mod catalog;
pub mod conveyor;
pub mod error;
pub mod event;
pub mod io;
pub mod limits;
pub mod network;
pub mod production;
pub mod save;
pub mod storage;
pub mod tile;
pub mod transfer;
pub mod upgrade;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use building::{Building, BuildingState, OperationStatus};
pub use catalog::{BuildingDef, BuildingKind, Catalog, Recipe, WorldSettings};
pub use error::{PlacementError, SaveError};
pub use event::{Event, EventKind};
pub use tile::{Tile, TileKind};
pub use upgrade::{NoUpgrades, SimContext, Stat, UpgradeTable, Upgrades};
pub use world::World;
