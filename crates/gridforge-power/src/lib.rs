//! Power grid solver for the gridforge world.
//!
//! Buildings with a [`PowerConfig`] are joined into grids by the cable
//! graph. Each grid balances generation against demand every tick,
//! charging batteries with surplus and draining them on deficit, and
//! hands every member the same satisfaction ratio.
//!
//! # Design
//!
//! - Grids are derived state: [`PowerNetworks::rebuild`] recomputes them
//!   wholesale after any placement, removal or cable change.
//! - Cable endpoints are cells, not buildings. A multi-tile building is
//!   reachable through a cable touching any of its cells.
//! - A disabled battery is an open breaker: it joins the first grid that
//!   reaches it but is never traversed through.
//! - [`PowerNetworks::recalculate`] runs every tick and only touches
//!   battery charge and member status.

use std::collections::{BTreeMap, VecDeque};

use gridforge_core::fixed::{Fixed64, as_f64, checked_div_64, clamp_unit, from_count};
use gridforge_core::id::PowerGridId;
use gridforge_spatial::GridPosition;
use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap, SlotMap};
use tracing::trace;

// ---------------------------------------------------------------------------
// Per-node configuration
// ---------------------------------------------------------------------------

/// How a node participates in its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerRole {
    Producer,
    #[default]
    Consumer,
    Relay,
    Battery,
}

/// Static power description of a building kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub role: PowerRole,
    /// Power drawn while connected (consumers).
    #[serde(with = "as_f64")]
    pub demand: Fixed64,
    /// Power supplied (producers).
    #[serde(with = "as_f64")]
    pub generation: Fixed64,
    /// Stored energy ceiling (batteries).
    #[serde(with = "as_f64")]
    pub capacity: Fixed64,
    #[serde(with = "as_f64")]
    pub max_charge_rate: Fixed64,
    #[serde(with = "as_f64")]
    pub max_discharge_rate: Fixed64,
}

impl PowerConfig {
    pub fn producer(generation: Fixed64) -> Self {
        Self {
            role: PowerRole::Producer,
            generation,
            ..Self::default()
        }
    }

    pub fn consumer(demand: Fixed64) -> Self {
        Self {
            role: PowerRole::Consumer,
            demand,
            ..Self::default()
        }
    }

    pub fn relay() -> Self {
        Self {
            role: PowerRole::Relay,
            ..Self::default()
        }
    }

    pub fn battery(capacity: Fixed64, charge_rate: Fixed64, discharge_rate: Fixed64) -> Self {
        Self {
            role: PowerRole::Battery,
            capacity,
            max_charge_rate: charge_rate,
            max_discharge_rate: discharge_rate,
            ..Self::default()
        }
    }
}

/// Mutable battery state owned by the battery building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryCharge {
    #[serde(with = "as_f64")]
    pub charge: Fixed64,
    pub enabled: bool,
}

impl Default for BatteryCharge {
    fn default() -> Self {
        Self {
            charge: Fixed64::ZERO,
            enabled: true,
        }
    }
}

/// What every grid member learns after a recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerStatus {
    pub satisfaction: Fixed64,
    pub has_source: bool,
    pub grid: Option<PowerGridId>,
    pub grid_size: usize,
}

/// The solver's view of a building.
pub trait PowerNode {
    /// `None` for buildings that never join a grid.
    fn power_config(&self) -> Option<&PowerConfig>;

    /// Every cell the building occupies.
    fn cells(&self) -> Vec<GridPosition>;

    /// Current draw. Defaults to the configured demand.
    fn demand(&self) -> Fixed64 {
        self.power_config().map_or(Fixed64::ZERO, |c| c.demand)
    }

    /// Current supply. Defaults to the configured generation.
    fn generation(&self) -> Fixed64 {
        self.power_config().map_or(Fixed64::ZERO, |c| c.generation)
    }

    fn battery(&self) -> Option<&BatteryCharge> {
        None
    }

    fn battery_mut(&mut self) -> Option<&mut BatteryCharge> {
        None
    }

    fn update_power_status(&mut self, status: PowerStatus);
}

fn is_open_breaker<N: PowerNode>(node: &N) -> bool {
    node.battery().is_some_and(|b| !b.enabled)
}

// ---------------------------------------------------------------------------
// Cables
// ---------------------------------------------------------------------------

/// An undirected cable between two building cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cable {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Cable {
    pub fn new(a: GridPosition, b: GridPosition) -> Self {
        Self {
            x1: a.x,
            y1: a.y,
            x2: b.x,
            y2: b.y,
        }
    }

    pub fn endpoints(&self) -> (GridPosition, GridPosition) {
        (
            GridPosition::new(self.x1, self.y1),
            GridPosition::new(self.x2, self.y2),
        )
    }

    pub fn touches(&self, pos: GridPosition) -> bool {
        let (a, b) = self.endpoints();
        a == pos || b == pos
    }

    /// True when both cables join the same two cells, in either orientation.
    pub fn same_link(&self, other: &Cable) -> bool {
        let (a, b) = self.endpoints();
        let (c, d) = other.endpoints();
        (a == c && b == d) || (a == d && b == c)
    }
}

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

/// One connected component of power-capable buildings.
#[derive(Debug, Clone)]
pub struct PowerGrid<K: Key> {
    pub id: PowerGridId,
    /// Every member, batteries and relays included, in discovery order.
    pub nodes: Vec<K>,
    pub producers: Vec<K>,
    pub consumers: Vec<K>,
    pub relays: Vec<K>,
    pub batteries: Vec<K>,
    pub generation: Fixed64,
    pub demand: Fixed64,
    /// Power supplied by batteries during the last recalculation.
    pub discharge: Fixed64,
    pub satisfaction: Fixed64,
    pub has_source: bool,
}

impl<K: Key> PowerGrid<K> {
    fn new(id: PowerGridId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            producers: Vec::new(),
            consumers: Vec::new(),
            relays: Vec::new(),
            batteries: Vec::new(),
            generation: Fixed64::ZERO,
            demand: Fixed64::ZERO,
            discharge: Fixed64::ZERO,
            satisfaction: Fixed64::ZERO,
            has_source: false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// All grids of a world plus the node -> grid lookup.
#[derive(Debug)]
pub struct PowerNetworks<K: Key> {
    grids: Vec<PowerGrid<K>>,
    membership: SecondaryMap<K, PowerGridId>,
}

impl<K: Key> Default for PowerNetworks<K> {
    fn default() -> Self {
        Self {
            grids: Vec::new(),
            membership: SecondaryMap::new(),
        }
    }
}

impl<K: Key> PowerNetworks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grids(&self) -> &[PowerGrid<K>] {
        &self.grids
    }

    pub fn grid(&self, id: PowerGridId) -> Option<&PowerGrid<K>> {
        self.grids.get(id.0 as usize)
    }

    pub fn grid_of(&self, key: K) -> Option<PowerGridId> {
        self.membership.get(key).copied()
    }

    pub fn clear(&mut self) {
        self.grids.clear();
        self.membership.clear();
    }

    /// Recompute every grid from scratch.
    ///
    /// `order` fixes discovery order (and therefore grid ids and battery
    /// drain order). `cell_owner` resolves a cable endpoint to the building
    /// covering that cell.
    pub fn rebuild<N: PowerNode>(
        &mut self,
        nodes: &SlotMap<K, N>,
        order: &[K],
        cell_owner: impl Fn(GridPosition) -> Option<K>,
        cables: &[Cable],
    ) {
        self.clear();

        let mut adjacency: BTreeMap<GridPosition, Vec<GridPosition>> = BTreeMap::new();
        for cable in cables {
            let (a, b) = cable.endpoints();
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }

        let mut visited: SecondaryMap<K, ()> = SecondaryMap::new();
        let powered = |key: K| nodes.get(key).is_some_and(|n| n.power_config().is_some());

        // Closed nodes seed grids first so an open breaker joins a real grid
        // when one reaches it. Unreached breakers then stand alone.
        for pass_open_breakers in [false, true] {
            for &start in order {
                if !powered(start) || visited.contains_key(start) {
                    continue;
                }
                let open = nodes.get(start).is_some_and(is_open_breaker);
                if open != pass_open_breakers {
                    continue;
                }

                let mut members = Vec::new();
                let mut queue = VecDeque::from([start]);
                visited.insert(start, ());

                while let Some(key) = queue.pop_front() {
                    members.push(key);
                    let Some(node) = nodes.get(key) else { continue };
                    if is_open_breaker(node) {
                        continue;
                    }
                    for cell in node.cells() {
                        let Some(links) = adjacency.get(&cell) else { continue };
                        for &far in links {
                            let Some(other) = cell_owner(far) else { continue };
                            if other != key && powered(other) && !visited.contains_key(other) {
                                visited.insert(other, ());
                                queue.push_back(other);
                            }
                        }
                    }
                }

                self.push_grid(nodes, members);
            }
        }

        trace!(
            grids = self.grids.len(),
            cables = cables.len(),
            "power networks rebuilt"
        );
    }

    fn push_grid<N: PowerNode>(&mut self, nodes: &SlotMap<K, N>, members: Vec<K>) {
        let id = PowerGridId(self.grids.len() as u32);
        let mut grid = PowerGrid::new(id);
        for key in members {
            let Some(config) = nodes.get(key).and_then(|n| n.power_config()) else {
                continue;
            };
            match config.role {
                PowerRole::Producer => grid.producers.push(key),
                PowerRole::Consumer => grid.consumers.push(key),
                PowerRole::Relay => grid.relays.push(key),
                PowerRole::Battery => grid.batteries.push(key),
            }
            grid.nodes.push(key);
            self.membership.insert(key, id);
        }
        self.grids.push(grid);
    }

    /// Balance every grid for a step of `delta` seconds and push the
    /// resulting status to each member.
    pub fn recalculate<N: PowerNode>(&mut self, nodes: &mut SlotMap<K, N>, delta: Fixed64) {
        for grid in &mut self.grids {
            let generation = grid
                .producers
                .iter()
                .filter_map(|k| nodes.get(*k))
                .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.generation()));
            let demand = grid
                .consumers
                .iter()
                .filter_map(|k| nodes.get(*k))
                .fold(Fixed64::ZERO, |acc, n| acc.saturating_add(n.demand()));

            let mut discharge = Fixed64::ZERO;
            if generation > demand {
                charge_batteries(nodes, &grid.batteries, generation - demand, delta);
            } else if demand > generation {
                discharge = discharge_batteries(nodes, &grid.batteries, demand - generation, delta);
            }

            let satisfaction = if demand == Fixed64::ZERO {
                Fixed64::ONE
            } else {
                checked_div_64(generation.saturating_add(discharge), demand)
                    .map_or(Fixed64::ONE, clamp_unit)
            };
            let has_source = !grid.producers.is_empty() || discharge > Fixed64::ZERO;

            grid.generation = generation;
            grid.demand = demand;
            grid.discharge = discharge;
            grid.satisfaction = satisfaction;
            grid.has_source = has_source;

            let status = PowerStatus {
                satisfaction,
                has_source,
                grid: Some(grid.id),
                grid_size: grid.nodes.len(),
            };
            for key in &grid.nodes {
                if let Some(node) = nodes.get_mut(*key) {
                    node.update_power_status(status);
                }
            }
        }
    }
}

/// Battery limits copied out before mutation.
fn battery_limits<N: PowerNode>(node: &N) -> Option<(Fixed64, Fixed64, Fixed64)> {
    let battery = node.battery()?;
    if !battery.enabled {
        return None;
    }
    let config = node.power_config()?;
    Some((config.capacity, config.max_charge_rate, config.max_discharge_rate))
}

/// Split `surplus` evenly across enabled, non-full batteries.
fn charge_batteries<K: Key, N: PowerNode>(
    nodes: &mut SlotMap<K, N>,
    batteries: &[K],
    surplus: Fixed64,
    delta: Fixed64,
) {
    let eligible: Vec<K> = batteries
        .iter()
        .copied()
        .filter(|k| {
            nodes.get(*k).is_some_and(|n| {
                battery_limits(n).is_some_and(|(capacity, _, _)| {
                    n.battery().is_some_and(|b| b.charge < capacity)
                })
            })
        })
        .collect();
    if eligible.is_empty() {
        return;
    }

    let share = surplus / from_count(u32::try_from(eligible.len()).unwrap_or(u32::MAX));
    for key in eligible {
        let Some(node) = nodes.get_mut(key) else { continue };
        let Some((capacity, charge_rate, _)) = battery_limits(node) else { continue };
        let Some(battery) = node.battery_mut() else { continue };
        let energy = share.min(charge_rate).saturating_mul(delta);
        let headroom = capacity - battery.charge;
        battery.charge += energy.min(headroom);
    }
}

/// Drain enabled batteries in list order until `deficit` is covered.
/// Returns the power supplied. A zero-length step moves no energy, so
/// batteries supply nothing.
fn discharge_batteries<K: Key, N: PowerNode>(
    nodes: &mut SlotMap<K, N>,
    batteries: &[K],
    deficit: Fixed64,
    delta: Fixed64,
) -> Fixed64 {
    if delta <= Fixed64::ZERO {
        return Fixed64::ZERO;
    }
    let mut remaining = deficit;
    let mut supplied = Fixed64::ZERO;
    for key in batteries {
        if remaining <= Fixed64::ZERO {
            break;
        }
        let Some(node) = nodes.get_mut(*key) else { continue };
        let Some((_, _, discharge_rate)) = battery_limits(node) else { continue };
        let Some(battery) = node.battery_mut() else { continue };
        if battery.charge <= Fixed64::ZERO {
            continue;
        }

        let mut power = remaining.min(discharge_rate);
        if let Some(sustainable) = checked_div_64(battery.charge, delta) {
            power = power.min(sustainable);
        }
        let energy = power.saturating_mul(delta).min(battery.charge);
        battery.charge -= energy;

        supplied += power;
        remaining -= power;
    }
    supplied
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gridforge_core::fixed::f64_to_fixed64;
    use gridforge_core::id::BuildingId;
    use proptest::prelude::*;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fixed(v: f64) -> Fixed64 {
        f64_to_fixed64(v)
    }

    #[derive(Debug)]
    struct Node {
        pos: GridPosition,
        width: i32,
        config: Option<PowerConfig>,
        battery: Option<BatteryCharge>,
        status: PowerStatus,
    }

    impl Node {
        fn at(x: i32, y: i32, config: Option<PowerConfig>) -> Self {
            let battery = config
                .as_ref()
                .filter(|c| c.role == PowerRole::Battery)
                .map(|_| BatteryCharge::default());
            Self {
                pos: GridPosition::new(x, y),
                width: 1,
                config,
                battery,
                status: PowerStatus::default(),
            }
        }
    }

    impl PowerNode for Node {
        fn power_config(&self) -> Option<&PowerConfig> {
            self.config.as_ref()
        }

        fn cells(&self) -> Vec<GridPosition> {
            (0..self.width)
                .map(|dx| GridPosition::new(self.pos.x + dx, self.pos.y))
                .collect()
        }

        fn battery(&self) -> Option<&BatteryCharge> {
            self.battery.as_ref()
        }

        fn battery_mut(&mut self) -> Option<&mut BatteryCharge> {
            self.battery.as_mut()
        }

        fn update_power_status(&mut self, status: PowerStatus) {
            self.status = status;
        }
    }

    struct Fixture {
        nodes: SlotMap<BuildingId, Node>,
        order: Vec<BuildingId>,
        cables: Vec<Cable>,
        networks: PowerNetworks<BuildingId>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                nodes: SlotMap::with_key(),
                order: Vec::new(),
                cables: Vec::new(),
                networks: PowerNetworks::new(),
            }
        }

        fn add(&mut self, node: Node) -> BuildingId {
            let id = self.nodes.insert(node);
            self.order.push(id);
            id
        }

        fn link(&mut self, a: (i32, i32), b: (i32, i32)) {
            self.cables.push(Cable::new(
                GridPosition::new(a.0, a.1),
                GridPosition::new(b.0, b.1),
            ));
        }

        fn rebuild(&mut self) {
            let nodes = &self.nodes;
            let owner = |p: GridPosition| {
                nodes
                    .iter()
                    .find(|(_, n)| n.cells().contains(&p))
                    .map(|(k, _)| k)
            };
            self.networks.rebuild(nodes, &self.order, owner, &self.cables);
        }

        fn step(&mut self, delta: f64) {
            self.networks.recalculate(&mut self.nodes, fixed(delta));
        }
    }

    // -----------------------------------------------------------------------
    // Cables
    // -----------------------------------------------------------------------

    #[test]
    fn cable_same_link_ignores_orientation() {
        let a = Cable::new(GridPosition::new(0, 0), GridPosition::new(3, 0));
        let b = Cable::new(GridPosition::new(3, 0), GridPosition::new(0, 0));
        let c = Cable::new(GridPosition::new(0, 0), GridPosition::new(4, 0));
        assert!(a.same_link(&b));
        assert!(!a.same_link(&c));
        assert!(a.touches(GridPosition::new(3, 0)));
        assert!(!a.touches(GridPosition::new(1, 0)));
    }

    #[test]
    fn cable_serializes_with_flat_fields() {
        let cable = Cable::new(GridPosition::new(1, 2), GridPosition::new(3, 4));
        let json = serde_json::to_string(&cable).unwrap();
        assert_eq!(json, r#"{"x1":1,"y1":2,"x2":3,"y2":4}"#);
    }

    #[test]
    fn power_config_defaults_missing_fields() {
        let config: PowerConfig =
            serde_json::from_str(r#"{"role":"producer","generation":50}"#).unwrap();
        assert_eq!(config, PowerConfig::producer(fixed(50.0)));
    }

    // -----------------------------------------------------------------------
    // Rebuild
    // -----------------------------------------------------------------------

    #[test]
    fn cables_join_components() {
        let mut fx = Fixture::new();
        let hub = fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0)))));
        let pole = fx.add(Node::at(3, 0, Some(PowerConfig::relay())));
        let furnace = fx.add(Node::at(6, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        let lonely = fx.add(Node::at(9, 9, Some(PowerConfig::consumer(fixed(10.0)))));
        let _unpowered = fx.add(Node::at(0, 5, None));
        fx.link((0, 0), (3, 0));
        fx.link((3, 0), (6, 0));
        fx.rebuild();

        assert_eq!(fx.networks.grids().len(), 2);
        let grid = &fx.networks.grids()[0];
        assert_eq!(grid.nodes, vec![hub, pole, furnace]);
        assert_eq!(grid.producers, vec![hub]);
        assert_eq!(grid.consumers, vec![furnace]);
        assert_eq!(grid.relays, vec![pole]);
        assert_eq!(fx.networks.grid_of(lonely), Some(PowerGridId(1)));
    }

    #[test]
    fn cable_reaches_any_cell_of_wide_building() {
        let mut fx = Fixture::new();
        let mut wide = Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0))));
        wide.width = 2;
        let hub = fx.add(wide);
        let consumer = fx.add(Node::at(4, 0, Some(PowerConfig::consumer(fixed(5.0)))));
        fx.link((1, 0), (4, 0));
        fx.rebuild();
        assert_eq!(fx.networks.grid_of(hub), fx.networks.grid_of(consumer));
    }

    #[test]
    fn disabled_battery_is_open_breaker() {
        let mut fx = Fixture::new();
        let hub = fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0)))));
        let battery = fx.add(Node::at(2, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let consumer = fx.add(Node::at(4, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.link((0, 0), (2, 0));
        fx.link((2, 0), (4, 0));

        fx.rebuild();
        assert_eq!(fx.networks.grids().len(), 1);

        fx.nodes[battery].battery.as_mut().unwrap().enabled = false;
        fx.rebuild();
        assert_eq!(fx.networks.grids().len(), 2);
        let first = &fx.networks.grids()[0];
        assert_eq!(first.nodes, vec![hub, battery]);
        assert_eq!(first.batteries, vec![battery]);
        assert_ne!(fx.networks.grid_of(consumer), fx.networks.grid_of(hub));
    }

    #[test]
    fn unreached_disabled_battery_stands_alone() {
        let mut fx = Fixture::new();
        let battery = fx.add(Node::at(2, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        fx.nodes[battery].battery.as_mut().unwrap().enabled = false;
        fx.rebuild();
        assert_eq!(fx.networks.grids().len(), 1);
        assert_eq!(fx.networks.grids()[0].nodes, vec![battery]);
    }

    // -----------------------------------------------------------------------
    // Recalculate
    // -----------------------------------------------------------------------

    #[test]
    fn surplus_gives_full_satisfaction_to_every_member() {
        let mut fx = Fixture::new();
        let hub = fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0)))));
        let pole = fx.add(Node::at(2, 0, Some(PowerConfig::relay())));
        let furnace = fx.add(Node::at(4, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.link((0, 0), (2, 0));
        fx.link((2, 0), (4, 0));
        fx.rebuild();
        fx.step(1.0);

        for key in [hub, pole, furnace] {
            let status = fx.nodes[key].status;
            assert_eq!(status.satisfaction, Fixed64::ONE);
            assert!(status.has_source);
            assert_eq!(status.grid, Some(PowerGridId(0)));
            assert_eq!(status.grid_size, 3);
        }
    }

    #[test]
    fn deficit_without_batteries_is_exact_ratio() {
        let mut fx = Fixture::new();
        fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(5.0)))));
        let furnace = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.link((0, 0), (2, 0));
        fx.rebuild();
        fx.step(1.0);
        assert_eq!(fx.nodes[furnace].status.satisfaction, fixed(0.5));
    }

    #[test]
    fn consumer_alone_has_no_source() {
        let mut fx = Fixture::new();
        let furnace = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.rebuild();
        fx.step(1.0);
        let status = fx.nodes[furnace].status;
        assert_eq!(status.satisfaction, Fixed64::ZERO);
        assert!(!status.has_source);
    }

    #[test]
    fn surplus_charges_batteries_evenly_up_to_rate() {
        let mut fx = Fixture::new();
        fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0)))));
        let b1 = fx.add(Node::at(2, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let b2 = fx.add(Node::at(4, 0, Some(PowerConfig::battery(fixed(500.0), fixed(10.0), fixed(20.0)))));
        fx.link((0, 0), (2, 0));
        fx.link((0, 0), (4, 0));
        fx.rebuild();
        // Surplus 50 split as 25 each, capped by each battery's rate.
        fx.step(0.5);
        assert_eq!(fx.nodes[b1].battery.unwrap().charge, fixed(10.0));
        assert_eq!(fx.nodes[b2].battery.unwrap().charge, fixed(5.0));
    }

    #[test]
    fn charge_stops_at_capacity() {
        let mut fx = Fixture::new();
        fx.add(Node::at(0, 0, Some(PowerConfig::producer(fixed(50.0)))));
        let b = fx.add(Node::at(2, 0, Some(PowerConfig::battery(fixed(15.0), fixed(20.0), fixed(20.0)))));
        fx.link((0, 0), (2, 0));
        fx.rebuild();
        fx.step(1.0);
        assert_eq!(fx.nodes[b].battery.unwrap().charge, fixed(15.0));
    }

    #[test]
    fn deficit_drains_batteries_in_order() {
        let mut fx = Fixture::new();
        let b1 = fx.add(Node::at(0, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let b2 = fx.add(Node::at(2, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let furnace = fx.add(Node::at(4, 0, Some(PowerConfig::consumer(fixed(30.0)))));
        fx.link((0, 0), (2, 0));
        fx.link((2, 0), (4, 0));
        fx.nodes[b1].battery.as_mut().unwrap().charge = fixed(100.0);
        fx.nodes[b2].battery.as_mut().unwrap().charge = fixed(100.0);
        fx.rebuild();
        fx.step(1.0);

        // b1 gives its full rate of 20, b2 covers the remaining 10.
        assert_eq!(fx.nodes[b1].battery.unwrap().charge, fixed(80.0));
        assert_eq!(fx.nodes[b2].battery.unwrap().charge, fixed(90.0));
        let status = fx.nodes[furnace].status;
        assert_eq!(status.satisfaction, Fixed64::ONE);
        assert!(status.has_source);
    }

    #[test]
    fn nearly_empty_battery_supplies_only_what_it_holds() {
        let mut fx = Fixture::new();
        let b = fx.add(Node::at(0, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let furnace = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.link((0, 0), (2, 0));
        fx.nodes[b].battery.as_mut().unwrap().charge = fixed(2.0);
        fx.rebuild();
        fx.step(1.0);
        assert_eq!(fx.nodes[b].battery.unwrap().charge, Fixed64::ZERO);
        assert_eq!(fx.nodes[furnace].status.satisfaction, fixed(0.2));
    }

    #[test]
    fn disabled_battery_neither_charges_nor_discharges() {
        let mut fx = Fixture::new();
        let b = fx.add(Node::at(0, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
        let furnace = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(fixed(10.0)))));
        fx.link((0, 0), (2, 0));
        {
            let battery = fx.nodes[b].battery.as_mut().unwrap();
            battery.charge = fixed(100.0);
            battery.enabled = false;
        }
        fx.rebuild();
        fx.step(1.0);
        assert_eq!(fx.nodes[b].battery.unwrap().charge, fixed(100.0));
        assert_eq!(fx.nodes[furnace].status.satisfaction, Fixed64::ZERO);
    }

    #[test]
    fn zero_demand_is_fully_satisfied() {
        let mut fx = Fixture::new();
        let pole = fx.add(Node::at(0, 0, Some(PowerConfig::relay())));
        fx.rebuild();
        fx.step(1.0);
        assert_eq!(fx.nodes[pole].status.satisfaction, Fixed64::ONE);
        assert!(!fx.nodes[pole].status.has_source);
    }

    proptest! {
        /// Battery supply never exceeds the energy it drains, including
        /// zero-length steps.
        #[test]
        fn battery_supply_matches_drained_energy(
            charge in 0u32..100,
            demand in 1u32..60,
            tenths in 0u32..20,
        ) {
            let mut fx = Fixture::new();
            let b = fx.add(Node::at(0, 0, Some(PowerConfig::battery(fixed(500.0), fixed(20.0), fixed(20.0)))));
            let consumer = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(Fixed64::from_num(demand)))));
            fx.link((0, 0), (2, 0));
            fx.nodes[b].battery.as_mut().unwrap().charge = Fixed64::from_num(charge);
            fx.rebuild();
            let delta = Fixed64::from_num(tenths) / Fixed64::from_num(10);
            fx.networks.recalculate(&mut fx.nodes, delta);

            let drained = Fixed64::from_num(charge) - fx.nodes[b].battery.unwrap().charge;
            let status = fx.nodes[consumer].status;
            let supplied = status.satisfaction * Fixed64::from_num(demand);
            prop_assert!(supplied * delta <= drained + Fixed64::from_bits(64));
            if tenths == 0 {
                prop_assert_eq!(drained, Fixed64::ZERO);
                prop_assert_eq!(status.satisfaction, Fixed64::ZERO);
                prop_assert!(!status.has_source);
            }
        }

        #[test]
        fn conservation_without_batteries(r#gen in 0u32..200, demand in 1u32..200) {
            let mut fx = Fixture::new();
            fx.add(Node::at(0, 0, Some(PowerConfig::producer(Fixed64::from_num(r#gen)))));
            let consumer = fx.add(Node::at(2, 0, Some(PowerConfig::consumer(Fixed64::from_num(demand)))));
            fx.link((0, 0), (2, 0));
            fx.rebuild();
            fx.step(1.0);

            let sat = fx.nodes[consumer].status.satisfaction;
            if r#gen >= demand {
                prop_assert_eq!(sat, Fixed64::ONE);
            } else {
                prop_assert_eq!(sat, Fixed64::from_num(r#gen) / Fixed64::from_num(demand));
            }
        }
    }
}
