//! Placed building instances.

use gridforge_core::fixed::Fixed64;
use gridforge_core::id::PowerGridId;
use gridforge_power::{BatteryCharge, PowerConfig, PowerNode, PowerStatus};
use gridforge_spatial::{Direction, Footprint, GridPosition, Side, port_cell};
use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingDef, BuildingKind, IoSpec};
use crate::conveyor::{ConveyorState, MergerState, SplitterState};
use crate::production::{FurnaceState, SourceState};
use crate::storage::Chest;

/// What a building reports to the UI about its operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Working,
    Blocked,
    NoResources,
    NoPower,
    #[default]
    Idle,
}

/// Power bookkeeping refreshed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerState {
    pub demand: Fixed64,
    pub generation: Fixed64,
    pub satisfaction: Fixed64,
    pub has_source: bool,
    pub grid: Option<PowerGridId>,
    pub grid_size: usize,
}

/// Which ports currently have a partner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IoState {
    pub input_connected: bool,
    pub output_connected: bool,
    pub input_sides: Vec<Side>,
    pub output_sides: Vec<Side>,
}

/// Kind-specific state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildingState {
    Extractor(SourceState),
    Sawmill(SourceState),
    Furnace(FurnaceState),
    Conveyor(ConveyorState),
    Merger(MergerState),
    Splitter(SplitterState),
    Chest(Chest),
    ElectricPole,
    Battery(BatteryCharge),
    Hub,
}

impl BuildingState {
    pub fn new(kind: BuildingKind, def: &BuildingDef) -> Self {
        match kind {
            BuildingKind::Extractor => BuildingState::Extractor(SourceState::new(def.buffer_capacity)),
            BuildingKind::Sawmill => BuildingState::Sawmill(SourceState::new(def.buffer_capacity)),
            BuildingKind::Furnace => BuildingState::Furnace(FurnaceState::new(
                def.queue_capacity,
                def.output_capacity,
                def.parallel_jobs,
            )),
            BuildingKind::Conveyor => BuildingState::Conveyor(ConveyorState::default()),
            BuildingKind::ConveyorMerger => BuildingState::Merger(MergerState::default()),
            BuildingKind::ConveyorSplitter => BuildingState::Splitter(SplitterState::default()),
            BuildingKind::Chest => BuildingState::Chest(Chest::new(def.slots, def.stack_size)),
            BuildingKind::ElectricPole => BuildingState::ElectricPole,
            BuildingKind::Battery => BuildingState::Battery(BatteryCharge::default()),
            BuildingKind::Hub => BuildingState::Hub,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Building {
    pub kind: BuildingKind,
    /// Top-left occupied cell.
    pub position: GridPosition,
    pub direction: Direction,
    /// Footprint as laid out for `direction`.
    pub footprint: Footprint,
    pub status: OperationStatus,
    pub power: PowerState,
    pub power_config: Option<PowerConfig>,
    pub io: IoState,
    pub state: BuildingState,
}

impl Building {
    pub fn new(kind: BuildingKind, position: GridPosition, direction: Direction, def: &BuildingDef) -> Self {
        Self {
            kind,
            position,
            direction,
            footprint: def.footprint.oriented(direction),
            status: OperationStatus::Idle,
            power: PowerState::default(),
            power_config: def.power.clone(),
            io: IoState::default(),
            state: BuildingState::new(kind, def),
        }
    }

    pub fn io_spec(&self) -> IoSpec {
        self.kind.io_spec()
    }

    pub fn occupies(&self, pos: GridPosition) -> bool {
        self.footprint.contains(self.position, pos)
    }

    /// The cell just outside `side`.
    pub fn port_cell(&self, side: Side) -> GridPosition {
        port_cell(self.position, self.footprint, side.to_direction(self.direction))
    }

    /// The occupied cell that hands items out through `side`.
    pub fn port_origin(&self, side: Side) -> GridPosition {
        self.port_cell(side).step(side.to_direction(self.direction).opposite())
    }

    /// Cells this building pushes items into, by side.
    pub fn output_cells(&self) -> impl Iterator<Item = (Side, GridPosition)> + '_ {
        self.io_spec().outputs.iter().map(move |s| (*s, self.port_cell(*s)))
    }

    /// True when one of this building's outputs lands on `other`.
    pub fn feeds(&self, other: &Building) -> bool {
        self.output_cells().any(|(_, cell)| other.occupies(cell))
    }

    /// Factor applied to work rates: 1 without a power config, otherwise
    /// the grid's satisfaction while it has a source.
    pub fn power_factor(&self) -> Fixed64 {
        match &self.power_config {
            None => Fixed64::ONE,
            Some(_) if self.power.has_source => self.power.satisfaction,
            Some(_) => Fixed64::ZERO,
        }
    }

    /// Point the building a new way, re-laying its footprint.
    pub(crate) fn set_direction(&mut self, direction: Direction, base: Footprint) {
        self.direction = direction;
        self.footprint = base.oriented(direction);
    }

    // -- State accessors --

    pub fn source(&self) -> Option<&SourceState> {
        match &self.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => Some(s),
            _ => None,
        }
    }

    pub fn source_mut(&mut self) -> Option<&mut SourceState> {
        match &mut self.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => Some(s),
            _ => None,
        }
    }

    pub fn furnace(&self) -> Option<&FurnaceState> {
        match &self.state {
            BuildingState::Furnace(f) => Some(f),
            _ => None,
        }
    }

    pub fn furnace_mut(&mut self) -> Option<&mut FurnaceState> {
        match &mut self.state {
            BuildingState::Furnace(f) => Some(f),
            _ => None,
        }
    }

    pub fn conveyor(&self) -> Option<&ConveyorState> {
        match &self.state {
            BuildingState::Conveyor(c) => Some(c),
            _ => None,
        }
    }

    pub fn conveyor_mut(&mut self) -> Option<&mut ConveyorState> {
        match &mut self.state {
            BuildingState::Conveyor(c) => Some(c),
            _ => None,
        }
    }

    pub fn merger(&self) -> Option<&MergerState> {
        match &self.state {
            BuildingState::Merger(m) => Some(m),
            _ => None,
        }
    }

    pub fn splitter(&self) -> Option<&SplitterState> {
        match &self.state {
            BuildingState::Splitter(s) => Some(s),
            _ => None,
        }
    }

    pub fn chest(&self) -> Option<&Chest> {
        match &self.state {
            BuildingState::Chest(c) => Some(c),
            _ => None,
        }
    }

    pub fn chest_mut(&mut self) -> Option<&mut Chest> {
        match &mut self.state {
            BuildingState::Chest(c) => Some(c),
            _ => None,
        }
    }
}

impl PowerNode for Building {
    fn power_config(&self) -> Option<&PowerConfig> {
        self.power_config.as_ref()
    }

    fn cells(&self) -> Vec<GridPosition> {
        self.footprint.tiles(self.position).collect()
    }

    fn demand(&self) -> Fixed64 {
        self.power.demand
    }

    fn generation(&self) -> Fixed64 {
        self.power.generation
    }

    fn battery(&self) -> Option<&BatteryCharge> {
        match &self.state {
            BuildingState::Battery(b) => Some(b),
            _ => None,
        }
    }

    fn battery_mut(&mut self) -> Option<&mut BatteryCharge> {
        match &mut self.state {
            BuildingState::Battery(b) => Some(b),
            _ => None,
        }
    }

    fn update_power_status(&mut self, status: PowerStatus) {
        self.power.satisfaction = status.satisfaction;
        self.power.has_source = status.has_source;
        self.power.grid = status.grid;
        self.power.grid_size = status.grid_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn build(kind: BuildingKind, x: i32, y: i32, dir: Direction) -> Building {
        let catalog = Catalog::default();
        Building::new(kind, GridPosition::new(x, y), dir, catalog.building(kind).unwrap())
    }

    #[test]
    fn furnace_footprint_rotates_with_facing() {
        let north = build(BuildingKind::Furnace, 4, 4, Direction::North);
        assert_eq!(north.footprint, Footprint::new(1, 2));
        let east = build(BuildingKind::Furnace, 4, 4, Direction::East);
        assert_eq!(east.footprint, Footprint::new(2, 1));
        assert_eq!(
            east.cells(),
            vec![GridPosition::new(4, 4), GridPosition::new(5, 4)]
        );
    }

    #[test]
    fn furnace_ports_project_across_rotated_size() {
        let east = build(BuildingKind::Furnace, 4, 4, Direction::East);
        assert_eq!(east.port_cell(Side::Front), GridPosition::new(6, 4));
        assert_eq!(east.port_cell(Side::Back), GridPosition::new(3, 4));
        let south = build(BuildingKind::Furnace, 4, 4, Direction::South);
        assert_eq!(south.port_cell(Side::Front), GridPosition::new(4, 6));
        assert_eq!(south.port_cell(Side::Back), GridPosition::new(4, 3));
    }

    #[test]
    fn port_origin_is_the_cell_behind_the_port() {
        let east = build(BuildingKind::Furnace, 4, 4, Direction::East);
        assert_eq!(east.port_origin(Side::Front), GridPosition::new(5, 4));
        assert_eq!(east.port_origin(Side::Back), GridPosition::new(4, 4));
        let south = build(BuildingKind::Furnace, 4, 4, Direction::South);
        assert_eq!(south.port_origin(Side::Front), GridPosition::new(4, 5));
        let north = build(BuildingKind::Furnace, 4, 4, Direction::North);
        assert_eq!(north.port_origin(Side::Front), GridPosition::new(4, 4));
        let belt = build(BuildingKind::Conveyor, 2, 2, Direction::West);
        assert_eq!(belt.port_origin(Side::Front), GridPosition::new(2, 2));
    }

    #[test]
    fn conveyor_feeds_what_it_faces() {
        let belt = build(BuildingKind::Conveyor, 0, 0, Direction::East);
        let chest = build(BuildingKind::Chest, 1, 0, Direction::North);
        let other = build(BuildingKind::Chest, 0, 1, Direction::North);
        assert!(belt.feeds(&chest));
        assert!(!belt.feeds(&other));
        assert!(!chest.feeds(&belt));
    }

    #[test]
    fn power_factor_rules() {
        let mut extractor = build(BuildingKind::Extractor, 0, 0, Direction::East);
        assert_eq!(extractor.power_factor(), Fixed64::ONE);
        extractor.power.has_source = false;
        assert_eq!(extractor.power_factor(), Fixed64::ONE);

        let mut sawmill = build(BuildingKind::Sawmill, 0, 0, Direction::East);
        assert_eq!(sawmill.power_factor(), Fixed64::ZERO);
        sawmill.update_power_status(PowerStatus {
            satisfaction: Fixed64::from_num(0.5),
            has_source: true,
            grid: Some(PowerGridId(0)),
            grid_size: 2,
        });
        assert_eq!(sawmill.power_factor(), Fixed64::from_num(0.5));
    }

    #[test]
    fn battery_state_is_exposed_to_solver() {
        let mut battery = build(BuildingKind::Battery, 0, 0, Direction::North);
        assert!(battery.battery().is_some_and(|b| b.enabled));
        battery.battery_mut().unwrap().enabled = false;
        assert!(!battery.battery().unwrap().enabled);
        assert!(build(BuildingKind::Hub, 0, 0, Direction::North).battery().is_none());
    }
}
