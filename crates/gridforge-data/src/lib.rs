//! Data-driven configuration for the world simulation.
//!
//! A data directory may hold up to four files, each in RON, TOML or JSON:
//!
//! - `buildings` -- partial overrides of building definitions
//! - `recipes` -- furnace recipes, replacing or extending the built-ins
//! - `world` -- [`gridforge_world::WorldSettings`]
//! - `upgrades` -- an [`gridforge_world::UpgradeTable`]
//!
//! Every file is optional. [`load_catalog`] merges whatever is present over
//! `Catalog::default()`.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, load_catalog};
