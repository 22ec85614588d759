//! Belt transport: conveyors, mergers and splitters.
//!
//! A conveyor carries at most one item. Progress runs from 0 to 1 at the
//! belt's speed; on crossing 1 the item is offered to the building ahead
//! and any overshoot is carried into the next belt. A refused item waits
//! at 1.
//!
//! Mergers and splitters hold one item and move it with zero latency:
//! push, pull, push within the same tick. Both keep round-robin memory of
//! the side they served last.

use gridforge_core::fixed::Fixed64;
use gridforge_core::id::{BuildingId, ItemUid};
use gridforge_core::item::ItemKind;
use gridforge_spatial::{Direction, GridPosition, Side};
use serde::{Deserialize, Serialize};

use crate::building::BuildingState;
use crate::catalog::BuildingKind;
use crate::transfer::Offer;
use crate::upgrade::{SimContext, Stat};
use crate::world::World;

/// Merger inputs in round-robin order.
pub const MERGER_INPUTS: [Side; 3] = [Side::Back, Side::Left, Side::Right];
/// Splitter outputs in round-robin order.
pub const SPLITTER_OUTPUTS: [Side; 3] = [Side::Front, Side::Left, Side::Right];

/// An item on the belt layer together with its visual identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BeltItem {
    pub item: ItemKind,
    pub uid: ItemUid,
}

/// Visual shape of a belt segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    #[default]
    Straight,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConveyorState {
    pub slot: Option<BeltItem>,
    pub progress: Fixed64,
    /// Some sink is reachable downstream. Informational only.
    pub is_resolved: bool,
    pub turn: TurnKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergerState {
    pub slot: Option<BeltItem>,
    pub last_input_side: Side,
}

impl Default for MergerState {
    fn default() -> Self {
        Self {
            slot: None,
            last_input_side: Side::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterState {
    pub slot: Option<BeltItem>,
    pub last_output_side: Side,
}

impl Default for SplitterState {
    fn default() -> Self {
        Self {
            slot: None,
            last_output_side: Side::Right,
        }
    }
}

/// Sides of `ring` in order, starting after `last`.
pub(crate) fn round_robin(ring: &'static [Side], last: Side) -> impl Iterator<Item = Side> {
    let start = ring.iter().position(|s| *s == last).map_or(0, |i| i + 1);
    (0..ring.len()).map(move |i| ring[(start + i) % ring.len()])
}

/// Classify a belt from the direction items travel when they enter it.
///
/// A 180° relationship cannot be drawn and yields `None`.
pub fn classify_turn(flow_in: Direction, facing: Direction) -> Option<TurnKind> {
    if facing == flow_in {
        Some(TurnKind::Straight)
    } else if facing == flow_in.rotate_ccw() {
        Some(TurnKind::Left)
    } else if facing == flow_in.rotate_cw() {
        Some(TurnKind::Right)
    } else {
        None
    }
}

impl World {
    /// Re-derive a conveyor's turn from whichever neighbor feeds it.
    ///
    /// Returns false when the feeder sits at the belt's front; the belt is
    /// then drawn straight.
    pub(crate) fn refresh_turn(&mut self, id: BuildingId) -> bool {
        let Some(belt) = self.buildings.get(id) else {
            return true;
        };
        let facing = belt.direction;
        let feeder_side = [Side::Back, Side::Left, Side::Right, Side::Front]
            .into_iter()
            .find(|side| {
                self.neighbor_at(id, belt.port_cell(*side))
                    .and_then(|n| self.buildings.get(n))
                    .is_some_and(|n| n.feeds(belt))
            });
        let turn = match feeder_side {
            // Items arriving from `side` travel the opposite way.
            Some(side) => classify_turn(side.to_direction(facing).opposite(), facing),
            None => Some(TurnKind::Straight),
        };
        if let Some(c) = self.buildings.get_mut(id).and_then(|b| b.conveyor_mut()) {
            c.turn = turn.unwrap_or(TurnKind::Straight);
        }
        turn.is_some()
    }

    /// One tick of a conveyor.
    pub(crate) fn tick_conveyor(&mut self, id: BuildingId, delta: Fixed64, ctx: &SimContext<'_>) {
        let base = self
            .catalog
            .building(BuildingKind::Conveyor)
            .map_or(Fixed64::ONE, |d| d.speed);
        let speed = ctx.upgrades.apply(BuildingKind::Conveyor, Stat::ConveyorSpeed, base);
        self.refresh_turn(id);

        let Some(building) = self.buildings.get_mut(id) else {
            return;
        };
        let source = building.port_origin(Side::Front);
        let Some(c) = building.conveyor_mut() else {
            return;
        };
        let Some(held) = c.slot else {
            c.progress = Fixed64::ZERO;
            return;
        };
        c.progress = c.progress.saturating_add(speed.saturating_mul(delta));
        if c.progress < Fixed64::ONE {
            return;
        }
        let carry = (c.progress - Fixed64::ONE).min(Fixed64::ONE);

        let offer = Offer::new(held.item, source)
            .with_uid(held.uid)
            .with_carry(carry);
        let moved = self
            .front_target(id)
            .is_some_and(|target| self.offer_item(target, offer));

        if let Some(c) = self.buildings.get_mut(id).and_then(|b| b.conveyor_mut()) {
            if moved {
                c.slot = None;
                c.progress = Fixed64::ZERO;
            } else {
                c.progress = Fixed64::ONE;
            }
        }
    }

    /// One tick of a merger: push, pull, push.
    pub(crate) fn tick_merger(&mut self, id: BuildingId) {
        self.push_held(id);
        let empty = self
            .buildings
            .get(id)
            .and_then(|b| b.merger())
            .is_some_and(|m| m.slot.is_none());
        if empty {
            self.merger_pull(id);
        }
        self.push_held(id);
    }

    /// One tick of a splitter: push, pull, push.
    pub(crate) fn tick_splitter(&mut self, id: BuildingId) {
        self.splitter_push(id);
        let empty = self
            .buildings
            .get(id)
            .and_then(|b| b.splitter())
            .is_some_and(|s| s.slot.is_none());
        if empty {
            self.splitter_pull(id);
        }
        self.splitter_push(id);
    }

    /// Pull from the first ready input in round-robin order.
    fn merger_pull(&mut self, id: BuildingId) {
        let Some(side) = self.merger_ready_side(id) else {
            return;
        };
        let Some(cell) = self.buildings.get(id).map(|b| b.port_cell(side)) else {
            return;
        };
        let Some(feeder) = self.neighbor_at(id, cell) else {
            return;
        };
        let Some((item, uid)) = self.take_output(feeder) else {
            return;
        };
        let uid = uid.unwrap_or_else(|| self.mint_uid());
        if let Some(BuildingState::Merger(m)) = self.buildings.get_mut(id).map(|b| &mut b.state) {
            m.slot = Some(BeltItem { item, uid });
            m.last_input_side = side;
        }
    }

    /// Offer a merger's held item to the building ahead.
    fn push_held(&mut self, id: BuildingId) {
        let Some(building) = self.buildings.get(id) else {
            return;
        };
        let Some(held) = building.merger().and_then(|m| m.slot) else {
            return;
        };
        let offer = Offer::new(held.item, building.port_origin(Side::Front)).with_uid(held.uid);
        let moved = self
            .front_target(id)
            .is_some_and(|target| self.offer_item(target, offer));
        if moved {
            if let Some(BuildingState::Merger(m)) = self.buildings.get_mut(id).map(|b| &mut b.state) {
                m.slot = None;
            }
        }
    }

    fn splitter_pull(&mut self, id: BuildingId) {
        let Some(building) = self.buildings.get(id) else {
            return;
        };
        let Some(feeder) = self.neighbor_at(id, building.port_cell(Side::Back)) else {
            return;
        };
        let ready = self
            .buildings
            .get(feeder)
            .is_some_and(|n| n.feeds(building) && n.can_output());
        if !ready {
            return;
        }
        let Some((item, uid)) = self.take_output(feeder) else {
            return;
        };
        let uid = uid.unwrap_or_else(|| self.mint_uid());
        if let Some(BuildingState::Splitter(s)) = self.buildings.get_mut(id).map(|b| &mut b.state) {
            s.slot = Some(BeltItem { item, uid });
        }
    }

    /// Offer the held item to each output in round-robin order, skipping
    /// targets that refuse it.
    fn splitter_push(&mut self, id: BuildingId) {
        let Some(building) = self.buildings.get(id) else {
            return;
        };
        let Some(state) = building.splitter() else {
            return;
        };
        let Some(held) = state.slot else {
            return;
        };
        let candidates: Vec<(Side, BuildingId, GridPosition)> =
            round_robin(&SPLITTER_OUTPUTS, state.last_output_side)
                .filter_map(|side| {
                    self.neighbor_at(id, building.port_cell(side))
                        .map(|t| (side, t, building.port_origin(side)))
                })
                .collect();

        for (side, target, source) in candidates {
            let offer = Offer::new(held.item, source).with_uid(held.uid);
            if self.offer_item(target, offer) {
                if let Some(BuildingState::Splitter(s)) = self.buildings.get_mut(id).map(|b| &mut b.state) {
                    s.slot = None;
                    s.last_output_side = side;
                }
                return;
            }
        }
    }
}
