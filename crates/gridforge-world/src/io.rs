//! Port connectivity.
//!
//! Outputs count as connected when any other building covers the port
//! cell, whether or not it would take an item. Inputs are stricter.
//! Side-aware buildings (belts, chests) require the neighbor to actually
//! feed one of their cells; plain single-port buildings only check that the
//! neighbor points its output toward them.

use gridforge_core::id::BuildingId;
use gridforge_spatial::{Side, SpatialIndex};
use slotmap::SlotMap;

use crate::building::{Building, IoState};
use crate::world::World;

/// Recompute the connected ports of `id`.
pub fn compute_connectivity(
    buildings: &SlotMap<BuildingId, Building>,
    index: &SpatialIndex,
    id: BuildingId,
) -> IoState {
    let Some(building) = buildings.get(id) else {
        return IoState::default();
    };
    let spec = building.io_spec();
    let neighbor = |side: Side| {
        index
            .key_at(building.port_cell(side))
            .filter(|other| *other != id)
            .and_then(|other| buildings.get(other))
    };

    let output_sides: Vec<Side> = spec
        .outputs
        .iter()
        .copied()
        .filter(|side| neighbor(*side).is_some())
        .collect();

    let input_sides: Vec<Side> = spec
        .inputs
        .iter()
        .copied()
        .filter(|side| {
            neighbor(*side).is_some_and(|n| {
                if spec.side_aware {
                    n.feeds(building)
                } else {
                    let toward_us = side.to_direction(building.direction).opposite();
                    n.io_spec()
                        .outputs
                        .iter()
                        .any(|out| out.to_direction(n.direction) == toward_us)
                }
            })
        })
        .collect();

    IoState {
        input_connected: !input_sides.is_empty(),
        output_connected: !output_sides.is_empty(),
        input_sides,
        output_sides,
    }
}

/// What the UI needs to decide which port arrows to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoArrows {
    pub has_inputs: bool,
    pub has_outputs: bool,
    pub input_connected: bool,
    pub output_connected: bool,
    pub input_sides: Vec<Side>,
    pub output_sides: Vec<Side>,
}

impl IoArrows {
    /// An unconnected input port gets an arrow.
    pub fn show_input_arrow(&self) -> bool {
        self.has_inputs && !self.input_connected
    }

    pub fn show_output_arrow(&self) -> bool {
        self.has_outputs && !self.output_connected
    }
}

impl World {
    pub(crate) fn refresh_io(&mut self, id: BuildingId) {
        let io = compute_connectivity(&self.buildings, &self.index, id);
        if let Some(b) = self.buildings.get_mut(id) {
            b.io = io;
        }
    }

    /// Arrow visibility for `id`, from its last refreshed connectivity.
    pub fn io_arrows(&self, id: BuildingId) -> Option<IoArrows> {
        let b = self.buildings.get(id)?;
        let spec = b.io_spec();
        Some(IoArrows {
            has_inputs: spec.has_input(),
            has_outputs: spec.has_output(),
            input_connected: b.io.input_connected,
            output_connected: b.io.output_connected,
            input_sides: b.io.input_sides.clone(),
            output_sides: b.io.output_sides.clone(),
        })
    }
}
