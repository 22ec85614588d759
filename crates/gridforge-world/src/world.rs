//! The world: tile grid, placed buildings, cables and the tick loop.
//!
//! # Tick order
//!
//! 1. Refresh each powered building's demand and (upgraded) generation.
//! 2. Balance every power grid for `delta`.
//! 3. Visit buildings in insertion order. Each refreshes its port
//!    connectivity, then runs its own state machine. Pulls and pushes
//!    mutate neighbors immediately, so later buildings see the result.
//! 4. Decay tiles (depleted resource tiles turn to grass).
//! 5. Advance the tick counter and deliver queued events.
//!
//! Placement, removal and cable edits recompute the conveyor network and
//! the power grids before returning.

use gridforge_core::fixed::{Fixed64, Ticks, f64_to_fixed64};
use gridforge_core::id::{BuildingId, ItemUid};
use gridforge_power::{Cable, PowerGrid, PowerNetworks, PowerNode};
use gridforge_spatial::{Direction, GridPosition, SpatialIndex};
use slotmap::SlotMap;
use tracing::{debug, trace, warn};

use crate::building::Building;
use crate::catalog::{BuildingKind, Catalog};
use crate::error::PlacementError;
use crate::event::{Event, EventBus};
use crate::limits::{CountingLimits, PlacementLimits};
use crate::tile::{Tile, TileKind};
use crate::upgrade::{SimContext, Stat};

#[derive(Debug)]
pub struct World {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Row-major, `width * height` cells.
    pub(crate) tiles: Vec<Tile>,
    pub(crate) buildings: SlotMap<BuildingId, Building>,
    /// Insertion order. Drives the tick loop and grid discovery.
    pub(crate) order: Vec<BuildingId>,
    pub(crate) index: SpatialIndex,
    pub(crate) cables: Vec<Cable>,
    pub(crate) power: PowerNetworks<BuildingId>,
    pub(crate) catalog: Catalog,
    pub(crate) limits: Box<dyn PlacementLimits>,
    pub(crate) events: EventBus,
    pub(crate) next_item_uid: ItemUid,
    pub(crate) tick_count: Ticks,
}

impl Default for World {
    fn default() -> Self {
        Self::new(Catalog::default())
    }
}

impl World {
    /// An all-grass world sized by the catalog's settings.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_limits(catalog, Box::new(CountingLimits::default()))
    }

    /// Like [`World::new`] with a custom placement-limit authority.
    pub fn with_limits(catalog: Catalog, limits: Box<dyn PlacementLimits>) -> Self {
        let width = catalog.settings.width;
        let height = catalog.settings.height;
        let events = EventBus::new(catalog.settings.event_history);
        Self {
            width,
            height,
            tiles: vec![Tile::new(TileKind::Grass); (width as usize) * (height as usize)],
            buildings: SlotMap::with_key(),
            order: Vec::new(),
            index: SpatialIndex::new(),
            cables: Vec::new(),
            power: PowerNetworks::new(),
            catalog,
            limits,
            events,
            next_item_uid: ItemUid(0),
            tick_count: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Tiles
    // -----------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    pub(crate) fn cell_index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(GridPosition::new(x, y))
            .then(|| (y as usize) * (self.width as usize) + x as usize)
    }

    /// The tile at `(x, y)`, or a synthetic empty tile out of bounds.
    pub fn tile(&self, x: i32, y: i32) -> Tile {
        self.cell_index(x, y)
            .and_then(|i| self.tiles.get(i).copied())
            .unwrap_or_else(Tile::empty)
    }

    pub(crate) fn tile_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        let i = self.cell_index(x, y)?;
        self.tiles.get_mut(i)
    }

    /// Overwrite one tile. Returns false out of bounds.
    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) -> bool {
        match self.tile_mut(x, y) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Check every placement rule for `kind` at `(x, y)` without mutating.
    pub fn check_placement(
        &self,
        kind: BuildingKind,
        x: i32,
        y: i32,
        direction: Direction,
    ) -> Result<(), PlacementError> {
        let def = self
            .catalog
            .building(kind)
            .ok_or(PlacementError::MissingDefinition(kind))?;
        let anchor = GridPosition::new(x, y);
        let footprint = def.footprint.oriented(direction);

        if let Some(outside) = footprint.tiles(anchor).find(|c| !self.in_bounds(*c)) {
            return Err(PlacementError::OutOfBounds(outside));
        }
        if !self.limits.allows(kind, def.max_count) {
            return Err(PlacementError::LimitReached {
                kind,
                max: def.max_count.unwrap_or(0),
            });
        }
        if let Some(taken) = footprint.tiles(anchor).find(|c| self.index.is_occupied(*c)) {
            return Err(PlacementError::Occupied(taken));
        }
        for cell in footprint.tiles(anchor) {
            def.placement.check(&self.tile(cell.x, cell.y), cell)?;
        }
        Ok(())
    }

    pub fn can_place_building(&self, x: i32, y: i32, type_name: &str, direction: Direction) -> bool {
        type_name
            .parse::<BuildingKind>()
            .and_then(|kind| self.check_placement(kind, x, y, direction))
            .is_ok()
    }

    /// Validate and place a building. A refusal leaves the world untouched.
    pub fn try_place_building(
        &mut self,
        x: i32,
        y: i32,
        type_name: &str,
        direction: Direction,
    ) -> Result<BuildingId, PlacementError> {
        let result = type_name.parse::<BuildingKind>().and_then(|kind| {
            self.check_placement(kind, x, y, direction)?;
            self.insert_building(kind, GridPosition::new(x, y), direction)
                .ok_or(PlacementError::Occupied(GridPosition::new(x, y)))
        });
        let id = match result {
            Ok(id) => id,
            Err(err) => {
                debug!(x, y, type_name, %err, "placement refused");
                return Err(err);
            }
        };

        if let Some(b) = self.buildings.get(id) {
            self.events.emit(Event::BuildingPlaced {
                building: id,
                kind: b.kind,
                position: b.position,
                tick: self.tick_count,
            });
        }
        let mut touched = self.index.neighbors_4(id);
        touched.insert(0, id);
        self.after_topology_change(&touched);
        self.events.deliver();
        Ok(id)
    }

    /// Place a building, reporting only success.
    pub fn place_building(&mut self, x: i32, y: i32, type_name: &str, direction: Direction) -> bool {
        self.try_place_building(x, y, type_name, direction).is_ok()
    }

    /// Register a building without validation. Returns `None` when the
    /// footprint overlaps another building.
    pub(crate) fn insert_building(
        &mut self,
        kind: BuildingKind,
        position: GridPosition,
        direction: Direction,
    ) -> Option<BuildingId> {
        let def = self.catalog.building(kind)?;
        let building = Building::new(kind, position, direction, def);
        let footprint = building.footprint;
        let id = self.buildings.insert(building);
        if let Err(err) = self.index.place(id, position, footprint) {
            debug!(%kind, ?position, %err, "footprint overlaps");
            self.buildings.remove(id);
            return None;
        }
        self.order.push(id);
        self.limits.record_placed(kind);
        Some(id)
    }

    /// Remove whatever building covers `(x, y)` and every cable touching
    /// its cells. Returns false when the cell is empty.
    pub fn remove_building(&mut self, x: i32, y: i32) -> bool {
        let Some(id) = self.index.key_at(GridPosition::new(x, y)) else {
            return false;
        };
        let neighbors = self.index.neighbors_4(id);
        let cells = self.index.cells_of(id);
        if let Err(err) = self.index.remove(id) {
            warn!(?id, %err, "building missing from spatial index");
        }
        self.order.retain(|other| *other != id);
        let Some(building) = self.buildings.remove(id) else {
            warn!(?id, "indexed cell had no building");
            return false;
        };
        self.limits.record_removed(building.kind);

        let tick = self.tick_count;
        let (pruned, kept): (Vec<Cable>, Vec<Cable>) = self
            .cables
            .drain(..)
            .partition(|c| cells.iter().any(|cell| c.touches(*cell)));
        self.cables = kept;
        for cable in pruned {
            self.events.emit(Event::CableRemoved { cable, tick });
        }
        self.events.emit(Event::BuildingRemoved {
            building: id,
            kind: building.kind,
            position: building.position,
            tick,
        });

        self.after_topology_change(&neighbors);
        self.events.deliver();
        true
    }

    /// Recompute belts and grids, then refresh ports around `touched`.
    fn after_topology_change(&mut self, touched: &[BuildingId]) {
        self.recompute_conveyor_network();
        self.rebuild_power();
        for id in touched {
            self.reorient(*id);
        }
    }

    /// Refresh the port state (and belt shape) of one building.
    pub(crate) fn reorient(&mut self, id: BuildingId) {
        self.refresh_io(id);
        if self.buildings.get(id).is_some_and(|b| b.kind == BuildingKind::Conveyor)
            && !self.refresh_turn(id)
        {
            warn!(?id, "conveyor fed from its front, drawing straight");
        }
    }

    /// Pick the recipe a furnace is restricted to, or clear the choice.
    pub fn select_recipe(&mut self, x: i32, y: i32, recipe: Option<&str>) -> bool {
        if let Some(id) = recipe {
            if self.catalog.recipe(id).is_none() {
                warn!(recipe = id, "unknown recipe");
                return false;
            }
        }
        let Some(furnace) = self
            .index
            .key_at(GridPosition::new(x, y))
            .and_then(|id| self.buildings.get_mut(id))
            .and_then(|b| b.furnace_mut())
        else {
            return false;
        };
        furnace.selected_recipe = recipe.map(str::to_string);
        true
    }

    // -----------------------------------------------------------------------
    // Power wiring
    // -----------------------------------------------------------------------

    fn power_capable_at(&self, pos: GridPosition) -> Option<BuildingId> {
        self.index
            .key_at(pos)
            .filter(|id| self.buildings.get(*id).is_some_and(|b| b.power_config.is_some()))
    }

    /// Connect two power-capable buildings. Refused when either end has no
    /// such building, both ends are the same building, or the link exists.
    pub fn add_cable(&mut self, a: GridPosition, b: GridPosition) -> bool {
        let cable = Cable::new(a, b);
        let ends = (self.power_capable_at(a), self.power_capable_at(b));
        let valid = matches!(ends, (Some(x), Some(y)) if x != y);
        if !valid || self.cables.iter().any(|c| c.same_link(&cable)) {
            debug!(?a, ?b, "cable refused");
            return false;
        }
        self.cables.push(cable);
        self.events.emit(Event::CableAdded {
            cable,
            tick: self.tick_count,
        });
        self.rebuild_power();
        self.events.deliver();
        true
    }

    /// Remove the cable between `a` and `b`, in either orientation.
    pub fn remove_cable(&mut self, a: GridPosition, b: GridPosition) -> bool {
        let target = Cable::new(a, b);
        let Some(i) = self.cables.iter().position(|c| c.same_link(&target)) else {
            return false;
        };
        let cable = self.cables.remove(i);
        self.events.emit(Event::CableRemoved {
            cable,
            tick: self.tick_count,
        });
        self.rebuild_power();
        self.events.deliver();
        true
    }

    /// Open or close a battery's breaker.
    pub fn set_battery_enabled(&mut self, x: i32, y: i32, enabled: bool) -> bool {
        let Some(battery) = self
            .index
            .key_at(GridPosition::new(x, y))
            .and_then(|id| self.buildings.get_mut(id))
            .and_then(|b| b.battery_mut())
        else {
            return false;
        };
        battery.enabled = enabled;
        self.rebuild_power();
        true
    }

    pub(crate) fn rebuild_power(&mut self) {
        let index = &self.index;
        self.power
            .rebuild(&self.buildings, &self.order, |cell| index.key_at(cell), &self.cables);
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance by `delta` seconds with no upgrades.
    pub fn tick(&mut self, delta: Fixed64) {
        self.tick_with(delta, &SimContext::default());
    }

    pub fn tick_seconds(&mut self, seconds: f64) {
        self.tick(f64_to_fixed64(seconds));
    }

    pub fn tick_with(&mut self, delta: Fixed64, ctx: &SimContext<'_>) {
        self.refresh_power_figures(ctx);
        self.power.recalculate(&mut self.buildings, delta);

        let order = self.order.clone();
        for id in order {
            self.tick_building(id, delta, ctx);
        }

        self.tick_tiles();
        self.tick_count += 1;
        self.events.deliver();
    }

    fn refresh_power_figures(&mut self, ctx: &SimContext<'_>) {
        for b in self.buildings.values_mut() {
            let Some(config) = &b.power_config else {
                continue;
            };
            b.power.demand = config.demand;
            b.power.generation = ctx
                .upgrades
                .apply(b.kind, Stat::PowerGeneration, config.generation);
        }
    }

    fn tick_building(&mut self, id: BuildingId, delta: Fixed64, ctx: &SimContext<'_>) {
        let Some(kind) = self.buildings.get(id).map(|b| b.kind) else {
            return;
        };
        self.refresh_io(id);
        let previous = self.buildings.get(id).map(|b| b.status);

        match kind {
            BuildingKind::Extractor | BuildingKind::Sawmill => self.tick_source(id, delta, ctx),
            BuildingKind::Furnace => self.tick_furnace(id, delta, ctx),
            BuildingKind::Conveyor => self.tick_conveyor(id, delta, ctx),
            BuildingKind::ConveyorMerger => self.tick_merger(id),
            BuildingKind::ConveyorSplitter => self.tick_splitter(id),
            BuildingKind::Chest => self.sync_chest(id, ctx),
            BuildingKind::ElectricPole | BuildingKind::Battery | BuildingKind::Hub => {}
        }

        let current = self.buildings.get(id).map(|b| b.status);
        if let (Some(from), Some(to)) = (previous, current) {
            if from != to {
                trace!(building = ?id, ?from, ?to, "status changed");
                self.events.emit(Event::StatusChanged {
                    building: id,
                    from,
                    to,
                    tick: self.tick_count,
                });
            }
        }
    }

    fn sync_chest(&mut self, id: BuildingId, ctx: &SimContext<'_>) {
        let base = self.catalog.building(BuildingKind::Chest).map_or(0, |d| d.slots);
        let bonus = ctx
            .upgrades
            .bonus(BuildingKind::Chest, Stat::StorageSlots)
            .max(Fixed64::ZERO)
            .to_num::<u32>();
        if let Some(chest) = self.buildings.get_mut(id).and_then(|b| b.chest_mut()) {
            chest.sync_bonus(base, bonus);
        }
    }

    fn tick_tiles(&mut self) {
        let width = self.width as usize;
        let tick = self.tick_count;
        for (i, tile) in self.tiles.iter_mut().enumerate() {
            if let Some(next) = tile.tick() {
                *tile = next;
                let position = GridPosition::new((i % width) as i32, (i / width) as i32);
                self.events.emit(Event::TileDepleted { position, tick });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn building_id_at(&self, x: i32, y: i32) -> Option<BuildingId> {
        self.index.key_at(GridPosition::new(x, y))
    }

    pub fn building_at(&self, x: i32, y: i32) -> Option<&Building> {
        self.building_id_at(x, y).and_then(|id| self.buildings.get(id))
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    /// Every building, in placement order.
    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, &Building)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.buildings.get(*id).map(|b| (*id, b)))
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn occupied_cells(&self, id: BuildingId) -> Vec<GridPosition> {
        self.index.cells_of(id)
    }

    pub fn cables(&self) -> &[Cable] {
        &self.cables
    }

    pub fn power_grids(&self) -> &[PowerGrid<BuildingId>] {
        self.power.grids()
    }

    pub fn power_grid_of(&self, id: BuildingId) -> Option<&PowerGrid<BuildingId>> {
        self.power.grid_of(id).and_then(|g| self.power.grid(g))
    }

    pub fn tick_count(&self) -> Ticks {
        self.tick_count
    }

    pub fn next_item_uid(&self) -> ItemUid {
        self.next_item_uid
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn limits(&self) -> &dyn PlacementLimits {
        self.limits.as_ref()
    }

    /// Satisfaction the building's grid last reported.
    pub fn power_satisfaction(&self, id: BuildingId) -> Option<Fixed64> {
        let b = self.buildings.get(id)?;
        b.power_config().map(|_| b.power.satisfaction)
    }
}
