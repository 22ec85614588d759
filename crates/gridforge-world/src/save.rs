//! JSON world snapshots.
//!
//! A save is one record: the tile grid (row-major), one record per
//! building with its kind-specific fields, the cable list and the next
//! visual item id. Loading replays every building without placement
//! validation, restores its fields and then recomputes the conveyor
//! network and power grids once. Fields missing from a record fall back to
//! the building's fresh state.

use gridforge_core::fixed::{Fixed64, clamp_unit, fixed64_to_f64, f64_to_fixed64};
use gridforge_core::id::{BuildingId, ItemUid};
use gridforge_core::item::{ItemKind, ItemStack};
use gridforge_power::Cable;
use gridforge_spatial::{Direction, GridPosition, Side};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::building::{Building, BuildingState};
use crate::catalog::{BuildingKind, Catalog};
use crate::conveyor::BeltItem;
use crate::error::SaveError;
use crate::production::FurnaceJob;
use crate::tile::{Tile, TileKind};
use crate::world::World;

/// Format version written by this build.
pub const SAVE_VERSION: u32 = 1;

/// Largest grid a save may declare.
pub const MAX_GRID_CELLS: usize = 1 << 22;

fn current_version() -> u32 {
    SAVE_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSave {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub grid: Vec<TileRecord>,
    #[serde(default)]
    pub buildings: Vec<BuildingRecord>,
    #[serde(default)]
    pub cables: Vec<Cable>,
    #[serde(default)]
    pub next_item_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRecord {
    #[serde(rename = "type")]
    pub kind: TileKind,
    #[serde(default)]
    pub resource_amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_resource_amount: Option<u32>,
}

impl TileRecord {
    fn from_tile(tile: &Tile) -> Self {
        Self {
            kind: tile.kind(),
            resource_amount: tile.resource_amount(),
            initial_resource_amount: tile
                .kind()
                .is_resource()
                .then(|| tile.initial_resource_amount()),
        }
    }

    fn to_tile(&self) -> Tile {
        let initial = self.initial_resource_amount.unwrap_or(self.resource_amount);
        Tile::restored(self.kind, self.resource_amount, initial)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub recipe_id: String,
    pub progress: f64,
}

/// One building. Only the fields its kind uses are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingRecord {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub direction: Direction,

    // Conveyors, mergers and splitters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item: Option<ItemKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_side: Option<Side>,

    // Chests, extractors and sawmills.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<Option<ItemStack>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_slots: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_multiplier: Option<f64>,

    // Furnaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_recipe_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_queue: Option<Vec<ItemKind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_slot: Option<ItemStack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_jobs: Option<Vec<JobRecord>>,

    // Batteries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_charge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
}

impl BuildingRecord {
    pub fn new(x: i32, y: i32, kind: BuildingKind, direction: Direction) -> Self {
        Self {
            x,
            y,
            kind: kind.name().to_string(),
            direction,
            ..Default::default()
        }
    }

    fn from_building(b: &Building) -> Self {
        let mut r = Self::new(b.position.x, b.position.y, b.kind, b.direction);
        match &b.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => {
                r.speed_multiplier = Some(fixed64_to_f64(s.speed_multiplier));
                r.slots = Some(s.buffer.stacks.iter().copied().map(Some).collect());
            }
            BuildingState::Furnace(f) => {
                r.selected_recipe_id = f.selected_recipe.clone();
                r.input_queue = Some(f.input_queue.iter().copied().collect());
                r.output_slot = f.output;
                r.active_jobs = Some(
                    f.jobs
                        .iter()
                        .map(|j| JobRecord {
                            recipe_id: j.recipe.clone(),
                            progress: fixed64_to_f64(j.progress),
                        })
                        .collect(),
                );
            }
            BuildingState::Conveyor(c) => {
                r.current_item = c.slot.map(|s| s.item);
                r.item_id = c.slot.map(|s| s.uid.0);
                r.transport_progress = Some(fixed64_to_f64(c.progress));
            }
            BuildingState::Merger(m) => {
                r.current_item = m.slot.map(|s| s.item);
                r.item_id = m.slot.map(|s| s.uid.0);
                r.last_side = Some(m.last_input_side);
            }
            BuildingState::Splitter(s) => {
                r.current_item = s.slot.map(|s| s.item);
                r.item_id = s.slot.map(|s| s.uid.0);
                r.last_side = Some(s.last_output_side);
            }
            BuildingState::Chest(c) => {
                r.slots = Some(c.slots.clone());
                r.bonus_slots = Some(c.bonus_slots);
            }
            BuildingState::Battery(b) => {
                r.current_charge = Some(fixed64_to_f64(b.charge));
                r.is_enabled = Some(b.enabled);
            }
            BuildingState::ElectricPole | BuildingState::Hub => {}
        }
        r
    }
}

impl World {
    pub fn to_save(&self) -> WorldSave {
        WorldSave {
            version: SAVE_VERSION,
            width: self.width,
            height: self.height,
            grid: self.tiles.iter().map(TileRecord::from_tile).collect(),
            buildings: self
                .buildings()
                .map(|(_, b)| BuildingRecord::from_building(b))
                .collect(),
            cables: self.cables.clone(),
            next_item_id: self.next_item_uid.0,
        }
    }

    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string(&self.to_save())?)
    }

    /// Build a fresh world from a JSON save.
    pub fn from_json(catalog: Catalog, json: &str) -> Result<World, SaveError> {
        let mut world = World::new(catalog);
        world.load_json(json)?;
        Ok(world)
    }

    /// Replace this world's contents with a JSON save. Listeners, the
    /// catalog and the limit authority are kept.
    pub fn load_json(&mut self, json: &str) -> Result<(), SaveError> {
        let save: WorldSave = serde_json::from_str(json)?;
        self.load(&save)
    }

    /// Replace this world's contents with `save`.
    pub fn load(&mut self, save: &WorldSave) -> Result<(), SaveError> {
        if save.version > SAVE_VERSION {
            return Err(SaveError::UnsupportedVersion {
                found: save.version,
                supported: SAVE_VERSION,
            });
        }

        let (width, height) = if save.width > 0 && save.height > 0 {
            (save.width, save.height)
        } else {
            (self.width, self.height)
        };
        let expected = (width as usize)
            .checked_mul(height as usize)
            .filter(|cells| *cells <= MAX_GRID_CELLS)
            .ok_or(SaveError::GridTooLarge {
                width,
                height,
                max: MAX_GRID_CELLS,
            })?;

        self.limits.reset();
        self.buildings.clear();
        self.order.clear();
        self.index.clear();
        self.cables.clear();
        self.power.clear();
        self.events.clear_all();

        self.width = width;
        self.height = height;
        if save.grid.len() != expected {
            warn!(expected, found = save.grid.len(), "grid size mismatch, padding with grass");
        }
        self.tiles = (0..expected)
            .map(|i| save.grid.get(i).map_or(Tile::new(TileKind::Grass), TileRecord::to_tile))
            .collect();
        self.next_item_uid = ItemUid(save.next_item_id);

        for record in &save.buildings {
            let kind = match record.kind.parse::<BuildingKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    warn!(building_type = %record.kind, "unknown building type in save, skipped");
                    continue;
                }
            };
            let position = GridPosition::new(record.x, record.y);
            let Some(id) = self.insert_building(kind, position, record.direction) else {
                warn!(%kind, ?position, "overlapping building in save, skipped");
                continue;
            };
            self.restore_fields(id, record);
        }
        self.cables = save.cables.clone();

        self.recompute_conveyor_network();
        self.rebuild_power();
        for id in self.order.clone() {
            self.reorient(id);
        }
        debug!(
            buildings = self.buildings.len(),
            cables = self.cables.len(),
            "world loaded"
        );
        Ok(())
    }

    /// Belt item from a record, keeping the uid counter ahead of every
    /// restored id.
    fn restore_belt_item(&mut self, record: &BuildingRecord) -> Option<BeltItem> {
        let item = record.current_item?;
        let uid = match record.item_id {
            Some(raw) => {
                let uid = ItemUid(raw);
                if uid >= self.next_item_uid {
                    self.next_item_uid = uid.next();
                }
                uid
            }
            None => self.mint_uid(),
        };
        Some(BeltItem { item, uid })
    }

    fn restore_fields(&mut self, id: BuildingId, record: &BuildingRecord) {
        let belt_item = self.restore_belt_item(record);
        let catalog = &self.catalog;
        let Some(building) = self.buildings.get_mut(id) else {
            return;
        };

        match &mut building.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => {
                if let Some(m) = record.speed_multiplier {
                    s.speed_multiplier = f64_to_fixed64(m);
                }
                if let Some(slots) = &record.slots {
                    s.buffer.stacks = slots.iter().flatten().copied().collect();
                }
            }
            BuildingState::Furnace(f) => {
                f.selected_recipe = record
                    .selected_recipe_id
                    .as_ref()
                    .filter(|r| known_recipe(catalog, r))
                    .cloned();
                if let Some(queue) = &record.input_queue {
                    f.input_queue = queue.iter().copied().collect();
                }
                f.output = record.output_slot.filter(|s| s.quantity > 0);
                if let Some(jobs) = &record.active_jobs {
                    f.jobs = jobs
                        .iter()
                        .filter(|j| known_recipe(catalog, &j.recipe_id))
                        .map(|j| FurnaceJob {
                            recipe: j.recipe_id.clone(),
                            progress: clamp_unit(f64_to_fixed64(j.progress)),
                        })
                        .collect();
                }
            }
            BuildingState::Conveyor(c) => {
                c.slot = belt_item;
                c.progress = clamp_unit(
                    record
                        .transport_progress
                        .map_or(Fixed64::ZERO, f64_to_fixed64),
                );
            }
            BuildingState::Merger(m) => {
                m.slot = belt_item;
                if let Some(side) = record.last_side {
                    m.last_input_side = side;
                }
            }
            BuildingState::Splitter(s) => {
                s.slot = belt_item;
                if let Some(side) = record.last_side {
                    s.last_output_side = side;
                }
            }
            BuildingState::Chest(c) => {
                if let Some(slots) = &record.slots {
                    c.slots = slots.clone();
                }
                if let Some(bonus) = record.bonus_slots {
                    c.bonus_slots = bonus;
                }
            }
            BuildingState::Battery(b) => {
                if let Some(charge) = record.current_charge {
                    b.charge = f64_to_fixed64(charge).max(Fixed64::ZERO);
                }
                if let Some(enabled) = record.is_enabled {
                    b.enabled = enabled;
                }
            }
            BuildingState::ElectricPole | BuildingState::Hub => {}
        }
    }
}

fn known_recipe(catalog: &Catalog, id: &str) -> bool {
    let known = catalog.recipe(id).is_some();
    if !known {
        warn!(recipe = id, "unknown recipe id in save, dropped");
    }
    known
}
