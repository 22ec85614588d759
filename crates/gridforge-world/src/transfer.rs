//! Item hand-off between neighboring buildings.
//!
//! Every push goes through [`World::offer_item`], which dispatches on the
//! target's kind. Pulls go through [`Building::can_output`] and
//! [`World::take_output`].

use gridforge_core::fixed::{Fixed64, clamp_unit};
use gridforge_core::id::{BuildingId, ItemUid};
use gridforge_core::item::ItemKind;
use gridforge_spatial::{GridPosition, Side};

use crate::building::{Building, BuildingState};
use crate::conveyor::{BeltItem, MERGER_INPUTS, round_robin};
use crate::world::World;

/// An item offered to a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offer {
    pub item: ItemKind,
    /// Visual identity when the item is already on the belt layer.
    pub uid: Option<ItemUid>,
    /// Cell the item comes from.
    pub source: GridPosition,
    /// Progress past 1.0 carried over from a belt hand-off.
    pub carry: Fixed64,
}

impl Offer {
    pub fn new(item: ItemKind, source: GridPosition) -> Self {
        Self {
            item,
            uid: None,
            source,
            carry: Fixed64::ZERO,
        }
    }

    pub fn with_uid(mut self, uid: ItemUid) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_carry(mut self, carry: Fixed64) -> Self {
        self.carry = carry;
        self
    }
}

impl Building {
    /// The side whose port cell is `cell`, if any.
    pub fn side_facing(&self, cell: GridPosition) -> Option<Side> {
        Side::all().into_iter().find(|s| self.port_cell(*s) == cell)
    }

    /// True when the building has an item ready to be pulled.
    pub fn can_output(&self) -> bool {
        match &self.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => !s.buffer.is_empty(),
            BuildingState::Furnace(f) => f.output.is_some(),
            BuildingState::Conveyor(c) => c.slot.is_some() && c.progress >= Fixed64::ONE,
            BuildingState::Merger(m) => m.slot.is_some(),
            BuildingState::Splitter(s) => s.slot.is_some(),
            BuildingState::Chest(_)
            | BuildingState::ElectricPole
            | BuildingState::Battery(_)
            | BuildingState::Hub => false,
        }
    }
}

impl World {
    /// The building covering `id`'s front port cell, other than itself.
    pub(crate) fn front_target(&self, id: BuildingId) -> Option<BuildingId> {
        let cell = self.buildings.get(id)?.port_cell(Side::Front);
        self.neighbor_at(id, cell)
    }

    /// The building at `cell` unless it is `id` itself.
    pub(crate) fn neighbor_at(&self, id: BuildingId, cell: GridPosition) -> Option<BuildingId> {
        self.index.key_at(cell).filter(|other| *other != id)
    }

    pub(crate) fn mint_uid(&mut self) -> ItemUid {
        let uid = self.next_item_uid;
        self.next_item_uid = uid.next();
        uid
    }

    /// Offer one item to `target`. Returns true when it was accepted;
    /// a refusal leaves the target untouched.
    pub fn offer_item(&mut self, target: BuildingId, offer: Offer) -> bool {
        let Some(building) = self.buildings.get(target) else {
            return false;
        };

        match &building.state {
            BuildingState::Conveyor(c) => {
                if c.slot.is_some() || building.port_cell(Side::Front) == offer.source {
                    return false;
                }
                let uid = offer.uid.unwrap_or_else(|| self.mint_uid());
                let Some(c) = self.buildings.get_mut(target).and_then(|b| b.conveyor_mut()) else {
                    return false;
                };
                c.slot = Some(BeltItem { item: offer.item, uid });
                c.progress = clamp_unit(offer.carry);
                true
            }
            BuildingState::Merger(m) => {
                if m.slot.is_some() {
                    return false;
                }
                let Some(side) = building
                    .side_facing(offer.source)
                    .filter(|s| MERGER_INPUTS.contains(s))
                else {
                    return false;
                };
                if self.merger_ready_side(target).is_some_and(|first| first != side) {
                    return false;
                }
                let uid = offer.uid.unwrap_or_else(|| self.mint_uid());
                let Some(BuildingState::Merger(m)) = self.buildings.get_mut(target).map(|b| &mut b.state) else {
                    return false;
                };
                m.slot = Some(BeltItem { item: offer.item, uid });
                m.last_input_side = side;
                true
            }
            BuildingState::Splitter(s) => {
                if s.slot.is_some() || building.port_cell(Side::Back) != offer.source {
                    return false;
                }
                let uid = offer.uid.unwrap_or_else(|| self.mint_uid());
                let Some(BuildingState::Splitter(s)) = self.buildings.get_mut(target).map(|b| &mut b.state) else {
                    return false;
                };
                s.slot = Some(BeltItem { item: offer.item, uid });
                true
            }
            BuildingState::Chest(c) => {
                if !c.can_insert(offer.item) {
                    return false;
                }
                self.buildings
                    .get_mut(target)
                    .and_then(|b| b.chest_mut())
                    .is_some_and(|c| c.insert(offer.item))
            }
            BuildingState::Furnace(_) => {
                if building.port_cell(Side::Back) != offer.source {
                    return false;
                }
                let recipes = &self.catalog.recipes;
                self.buildings
                    .get_mut(target)
                    .and_then(|b| b.furnace_mut())
                    .is_some_and(|f| f.enqueue(offer.item, recipes))
            }
            BuildingState::Extractor(_)
            | BuildingState::Sawmill(_)
            | BuildingState::ElectricPole
            | BuildingState::Battery(_)
            | BuildingState::Hub => false,
        }
    }

    /// Pull one ready item out of `id`.
    pub fn take_output(&mut self, id: BuildingId) -> Option<(ItemKind, Option<ItemUid>)> {
        let building = self.buildings.get_mut(id)?;
        if !building.can_output() {
            return None;
        }
        match &mut building.state {
            BuildingState::Extractor(s) | BuildingState::Sawmill(s) => {
                s.buffer.pop_one().map(|item| (item, None))
            }
            BuildingState::Furnace(f) => f.take_output().map(|item| (item, None)),
            BuildingState::Conveyor(c) => {
                c.progress = Fixed64::ZERO;
                c.slot.take().map(|b| (b.item, Some(b.uid)))
            }
            BuildingState::Merger(m) => m.slot.take().map(|b| (b.item, Some(b.uid))),
            BuildingState::Splitter(s) => s.slot.take().map(|b| (b.item, Some(b.uid))),
            BuildingState::Chest(_)
            | BuildingState::ElectricPole
            | BuildingState::Battery(_)
            | BuildingState::Hub => None,
        }
    }

    /// The first input side, in round-robin order after the last served
    /// one, whose neighbor feeds the merger and has an item ready.
    pub(crate) fn merger_ready_side(&self, merger: BuildingId) -> Option<Side> {
        let building = self.buildings.get(merger)?;
        let last = building.merger()?.last_input_side;
        round_robin(&MERGER_INPUTS, last).find(|side| {
            self.neighbor_at(merger, building.port_cell(*side))
                .and_then(|n| self.buildings.get(n))
                .is_some_and(|n| n.feeds(building) && n.can_output())
        })
    }
}
