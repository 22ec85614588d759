//! Building kinds, their static definitions, recipes and world settings.
//!
//! [`Catalog::default`] is the built-in game balance. Every definition
//! field is `serde(default)` so data files only need to name what they
//! change.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use gridforge_core::fixed::{Fixed64, as_f64, f64_to_fixed64};
use gridforge_core::item::ItemKind;
use gridforge_power::PowerConfig;
use gridforge_spatial::{Footprint, GridPosition, Side};
use serde::{Deserialize, Serialize};

use crate::error::PlacementError;
use crate::tile::{Tile, TileKind};

// ---------------------------------------------------------------------------
// Building kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Extractor,
    Sawmill,
    Furnace,
    Conveyor,
    ConveyorMerger,
    ConveyorSplitter,
    Chest,
    ElectricPole,
    Battery,
    Hub,
}

/// Which facing-relative sides a kind takes items in from and pushes
/// items out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoSpec {
    pub inputs: &'static [Side],
    pub outputs: &'static [Side],
    /// Side-aware kinds match inputs by port identity; the rest use the
    /// facing-only check.
    pub side_aware: bool,
}

impl IoSpec {
    const NONE: IoSpec = IoSpec {
        inputs: &[],
        outputs: &[],
        side_aware: false,
    };

    pub fn has_input(&self) -> bool {
        !self.inputs.is_empty()
    }

    pub fn has_output(&self) -> bool {
        !self.outputs.is_empty()
    }
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 10] = [
        BuildingKind::Extractor,
        BuildingKind::Sawmill,
        BuildingKind::Furnace,
        BuildingKind::Conveyor,
        BuildingKind::ConveyorMerger,
        BuildingKind::ConveyorSplitter,
        BuildingKind::Chest,
        BuildingKind::ElectricPole,
        BuildingKind::Battery,
        BuildingKind::Hub,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuildingKind::Extractor => "extractor",
            BuildingKind::Sawmill => "sawmill",
            BuildingKind::Furnace => "furnace",
            BuildingKind::Conveyor => "conveyor",
            BuildingKind::ConveyorMerger => "conveyor_merger",
            BuildingKind::ConveyorSplitter => "conveyor_splitter",
            BuildingKind::Chest => "chest",
            BuildingKind::ElectricPole => "electric_pole",
            BuildingKind::Battery => "battery",
            BuildingKind::Hub => "hub",
        }
    }

    /// Buildings that mine the tile they stand on.
    pub fn is_source(self) -> bool {
        matches!(self, BuildingKind::Extractor | BuildingKind::Sawmill)
    }

    /// Buildings conveyor chains resolve toward.
    pub fn is_sink(self) -> bool {
        matches!(self, BuildingKind::Chest | BuildingKind::Furnace)
    }

    /// Conveyor, merger or splitter.
    pub fn is_belt(self) -> bool {
        matches!(
            self,
            BuildingKind::Conveyor | BuildingKind::ConveyorMerger | BuildingKind::ConveyorSplitter
        )
    }

    pub fn io_spec(self) -> IoSpec {
        const FRONT: &[Side] = &[Side::Front];
        const BACK: &[Side] = &[Side::Back];
        const BELT_IN: &[Side] = &[Side::Back, Side::Left, Side::Right];
        const FAN_OUT: &[Side] = &[Side::Front, Side::Left, Side::Right];
        const ALL: &[Side] = &[Side::Front, Side::Back, Side::Left, Side::Right];

        match self {
            BuildingKind::Extractor | BuildingKind::Sawmill => IoSpec {
                inputs: &[],
                outputs: FRONT,
                side_aware: false,
            },
            BuildingKind::Furnace => IoSpec {
                inputs: BACK,
                outputs: FRONT,
                side_aware: false,
            },
            BuildingKind::Conveyor | BuildingKind::ConveyorMerger => IoSpec {
                inputs: BELT_IN,
                outputs: FRONT,
                side_aware: true,
            },
            BuildingKind::ConveyorSplitter => IoSpec {
                inputs: BACK,
                outputs: FAN_OUT,
                side_aware: true,
            },
            BuildingKind::Chest => IoSpec {
                inputs: ALL,
                outputs: &[],
                side_aware: true,
            },
            BuildingKind::ElectricPole | BuildingKind::Battery | BuildingKind::Hub => IoSpec::NONE,
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildingKind {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| PlacementError::UnknownType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Placement rules
// ---------------------------------------------------------------------------

/// Per-cell terrain rules for one building kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    pub allow_water: bool,
    /// Resource tiles refuse every building without this permission.
    pub allow_on_resources: bool,
    /// When non-empty, only these resources are accepted.
    pub allowed_resources: Vec<ItemKind>,
    /// Non-resource tiles refuse buildings that set this.
    pub requires_resource: bool,
}

impl PlacementRules {
    pub fn miner(allowed: &[ItemKind]) -> Self {
        Self {
            allow_water: false,
            allow_on_resources: true,
            allowed_resources: allowed.to_vec(),
            requires_resource: true,
        }
    }

    /// Check a single footprint cell.
    pub fn check(&self, tile: &Tile, position: GridPosition) -> Result<(), PlacementError> {
        if tile.kind() == TileKind::Water && !self.allow_water {
            return Err(PlacementError::WaterTile(position));
        }
        match tile.resource() {
            Some(resource) => {
                if !self.allow_on_resources {
                    return Err(PlacementError::ResourceTile(position));
                }
                if !self.allowed_resources.is_empty() && !self.allowed_resources.contains(&resource) {
                    return Err(PlacementError::ResourceNotAllowed { position, resource });
                }
            }
            None if self.requires_resource => {
                return Err(PlacementError::RequiresResource(position));
            }
            None => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Static parameters of a building kind. Fields a kind does not use stay
/// at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingDef {
    /// Size when facing north. East/west facings swap it.
    pub footprint: Footprint,
    pub max_count: Option<u32>,
    pub placement: PlacementRules,
    pub power: Option<PowerConfig>,
    /// Units per second (extractor, sawmill).
    #[serde(with = "as_f64")]
    pub extraction_rate: Fixed64,
    /// Internal buffer size (extractor, sawmill).
    pub buffer_capacity: u32,
    /// Tiles per second (conveyors).
    #[serde(with = "as_f64")]
    pub speed: Fixed64,
    pub slots: u32,
    pub stack_size: u32,
    pub queue_capacity: u32,
    pub output_capacity: u32,
    pub parallel_jobs: u32,
}

impl Default for BuildingDef {
    fn default() -> Self {
        Self {
            footprint: Footprint::single(),
            max_count: None,
            placement: PlacementRules::default(),
            power: None,
            extraction_rate: Fixed64::ZERO,
            buffer_capacity: 0,
            speed: Fixed64::ZERO,
            slots: 0,
            stack_size: 0,
            queue_capacity: 0,
            output_capacity: 0,
            parallel_jobs: 0,
        }
    }
}

impl BuildingDef {
    /// Built-in balance for `kind`.
    pub fn builtin(kind: BuildingKind) -> Self {
        let base = BuildingDef::default();
        match kind {
            BuildingKind::Extractor => BuildingDef {
                placement: PlacementRules::miner(&[ItemKind::Stone, ItemKind::Sand]),
                extraction_rate: Fixed64::ONE,
                buffer_capacity: 10,
                ..base
            },
            BuildingKind::Sawmill => BuildingDef {
                placement: PlacementRules::miner(&[ItemKind::Wood]),
                power: Some(PowerConfig::consumer(Fixed64::from_num(4))),
                extraction_rate: f64_to_fixed64(0.5),
                buffer_capacity: 20,
                ..base
            },
            BuildingKind::Furnace => BuildingDef {
                footprint: Footprint::new(1, 2),
                power: Some(PowerConfig::consumer(Fixed64::from_num(10))),
                queue_capacity: 10,
                output_capacity: 20,
                parallel_jobs: 1,
                ..base
            },
            BuildingKind::Conveyor
            | BuildingKind::ConveyorMerger
            | BuildingKind::ConveyorSplitter => BuildingDef {
                speed: Fixed64::ONE,
                ..base
            },
            BuildingKind::Chest => BuildingDef {
                slots: 8,
                stack_size: 50,
                ..base
            },
            BuildingKind::ElectricPole => BuildingDef {
                power: Some(PowerConfig::relay()),
                ..base
            },
            BuildingKind::Battery => BuildingDef {
                power: Some(PowerConfig::battery(
                    Fixed64::from_num(500),
                    Fixed64::from_num(20),
                    Fixed64::from_num(20),
                )),
                ..base
            },
            BuildingKind::Hub => BuildingDef {
                footprint: Footprint::new(2, 2),
                max_count: Some(1),
                power: Some(PowerConfig::producer(Fixed64::from_num(50))),
                ..base
            },
        }
    }
}

/// A furnace recipe: `input_count` of `input` become `output_count` of
/// `output` after `duration` seconds at full speed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub input: ItemKind,
    #[serde(default = "one")]
    pub input_count: u32,
    pub output: ItemKind,
    #[serde(default = "one")]
    pub output_count: u32,
    #[serde(with = "as_f64")]
    pub duration: Fixed64,
}

fn one() -> u32 {
    1
}

impl Recipe {
    pub fn new(id: &str, input: (ItemKind, u32), output: (ItemKind, u32), duration: Fixed64) -> Self {
        Self {
            id: id.to_string(),
            input: input.0,
            input_count: input.1,
            output: output.0,
            output_count: output.1,
            duration,
        }
    }

    pub fn builtin() -> Vec<Recipe> {
        vec![
            Recipe::new("brick", (ItemKind::Stone, 1), (ItemKind::Brick, 1), Fixed64::from_num(2)),
            Recipe::new("glass", (ItemKind::Sand, 1), (ItemKind::Glass, 1), Fixed64::from_num(3)),
            Recipe::new("charcoal", (ItemKind::Wood, 2), (ItemKind::Charcoal, 1), Fixed64::from_num(2)),
        ]
    }
}

/// World-wide tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    pub width: u32,
    pub height: u32,
    /// Seconds an output stall must persist before a building reports
    /// `blocked`.
    #[serde(with = "as_f64")]
    pub blocked_debounce: Fixed64,
    /// Ring buffer capacity of each event kind's delivered history.
    pub event_history: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            blocked_debounce: f64_to_fixed64(1.5),
            event_history: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub buildings: BTreeMap<BuildingKind, BuildingDef>,
    pub recipes: Vec<Recipe>,
    pub settings: WorldSettings,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            buildings: BuildingKind::ALL
                .into_iter()
                .map(|k| (k, BuildingDef::builtin(k)))
                .collect(),
            recipes: Recipe::builtin(),
            settings: WorldSettings::default(),
        }
    }
}

impl Catalog {
    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingDef> {
        self.buildings.get(&kind)
    }

    pub fn building_mut(&mut self, kind: BuildingKind) -> Option<&mut BuildingDef> {
        self.buildings.get_mut(&kind)
    }

    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// First recipe consuming `item`.
    pub fn recipe_for_input(&self, item: ItemKind) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.input == item)
    }
}
