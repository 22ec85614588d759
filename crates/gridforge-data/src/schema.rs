//! Serde structs for the on-disk data format.
//!
//! Building entries are partial: every field except `kind` is optional
//! and only the fields present replace the built-in definition. Recipes,
//! world settings and upgrades reuse the world crate's own serde types.

use gridforge_core::fixed::f64_to_fixed64;
use gridforge_core::item::ItemKind;
use gridforge_power::PowerConfig;
use gridforge_spatial::Footprint;
use gridforge_world::{BuildingDef, BuildingKind, Recipe};
use serde::Deserialize;

// ===========================================================================
// Buildings
// ===========================================================================

/// Override for one building kind.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildingData {
    pub kind: BuildingKind,
    #[serde(default)]
    pub footprint: Option<Footprint>,
    #[serde(default)]
    pub max_count: Option<u32>,
    /// Replaces the whole power description.
    #[serde(default)]
    pub power: Option<PowerConfig>,
    #[serde(default)]
    pub extraction_rate: Option<f64>,
    #[serde(default)]
    pub buffer_capacity: Option<u32>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub slots: Option<u32>,
    #[serde(default)]
    pub stack_size: Option<u32>,
    #[serde(default)]
    pub queue_capacity: Option<u32>,
    #[serde(default)]
    pub output_capacity: Option<u32>,
    #[serde(default)]
    pub parallel_jobs: Option<u32>,
    #[serde(default)]
    pub allowed_resources: Option<Vec<ItemKind>>,
}

impl BuildingData {
    /// Write the fields present in this entry over `def`.
    pub fn apply_to(&self, def: &mut BuildingDef) {
        if let Some(footprint) = self.footprint {
            def.footprint = footprint;
        }
        if let Some(max) = self.max_count {
            def.max_count = Some(max);
        }
        if let Some(power) = &self.power {
            def.power = Some(power.clone());
        }
        if let Some(rate) = self.extraction_rate {
            def.extraction_rate = f64_to_fixed64(rate);
        }
        if let Some(speed) = self.speed {
            def.speed = f64_to_fixed64(speed);
        }
        if let Some(allowed) = &self.allowed_resources {
            def.placement.allowed_resources = allowed.clone();
        }

        let counts = [
            (self.buffer_capacity, &mut def.buffer_capacity),
            (self.slots, &mut def.slots),
            (self.stack_size, &mut def.stack_size),
            (self.queue_capacity, &mut def.queue_capacity),
            (self.output_capacity, &mut def.output_capacity),
            (self.parallel_jobs, &mut def.parallel_jobs),
        ];
        for (value, field) in counts {
            if let Some(v) = value {
                *field = v;
            }
        }
    }
}

/// TOML wrapper: `[[buildings]]` array of tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlBuildings {
    pub buildings: Vec<BuildingData>,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// TOML wrapper: `[[recipes]]` array of tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlRecipes {
    pub recipes: Vec<Recipe>,
}
