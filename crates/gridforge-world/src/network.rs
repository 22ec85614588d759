//! Conveyor network recompute.
//!
//! Runs after every topology change as a two-phase fixed point:
//!
//! 1. **Flow**: walk downstream from every source building. A conveyor
//!    facing back toward the cell its items come from is turned to the
//!    first usable neighbor direction (N, E, S, W, skipping the source).
//! 2. **Resolution**: walk upstream from every sink and mark conveyors that
//!    lead into it.
//!
//! Both phases run twice so the second flow pass can prefer conveyors the
//! first resolution pass marked. The second pass observes directions the
//! first one rewrote; collapsing the two would break that.

use std::collections::{BTreeSet, VecDeque};

use gridforge_core::id::BuildingId;
use gridforge_spatial::{Direction, Footprint};
use tracing::trace;

use crate::catalog::BuildingKind;
use crate::world::World;

impl World {
    pub(crate) fn recompute_conveyor_network(&mut self) {
        self.propagate_flow();
        self.resolve_conveyors();
        self.propagate_flow();
        self.resolve_conveyors();
    }

    /// Flow phase.
    fn propagate_flow(&mut self) {
        let sources: Vec<BuildingId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.buildings.get(*id).is_some_and(|b| b.kind.is_source()))
            .collect();

        let mut visited: BTreeSet<BuildingId> = BTreeSet::new();
        // (belt, direction pointing from the belt back to its feeder)
        let mut queue: VecDeque<(BuildingId, Direction)> = VecDeque::new();

        for source in sources {
            self.enqueue_downstream(source, &mut visited, &mut queue);
            while let Some((belt, from)) = queue.pop_front() {
                if self.buildings.get(belt).is_some_and(|b| b.kind == BuildingKind::Conveyor) {
                    self.unfold_conveyor(belt, from);
                }
                self.enqueue_downstream(belt, &mut visited, &mut queue);
            }
        }
    }

    /// Queue every unvisited belt that `id` outputs into.
    fn enqueue_downstream(
        &self,
        id: BuildingId,
        visited: &mut BTreeSet<BuildingId>,
        queue: &mut VecDeque<(BuildingId, Direction)>,
    ) {
        let Some(building) = self.buildings.get(id) else {
            return;
        };
        for (side, cell) in building.output_cells() {
            let Some(next) = self.neighbor_at(id, cell) else {
                continue;
            };
            let is_belt = self.buildings.get(next).is_some_and(|b| b.kind.is_belt());
            if is_belt && visited.insert(next) {
                let out = side.to_direction(building.direction);
                queue.push_back((next, out.opposite()));
            }
        }
    }

    /// Turn a conveyor that points back at its feeder.
    fn unfold_conveyor(&mut self, belt: BuildingId, from: Direction) {
        let Some(building) = self.buildings.get(belt) else {
            return;
        };
        if building.direction != from {
            return;
        }
        let position = building.position;

        let candidates: Vec<(Direction, Option<BuildingId>)> = Direction::all()
            .into_iter()
            .filter(|d| *d != from)
            .map(|d| (d, self.neighbor_at(belt, position.step(d))))
            .collect();

        let facing_back = |d: Direction, n: &crate::building::Building| {
            n.kind.is_belt() && n.direction == d.opposite()
        };
        let preferred = candidates.iter().find(|(d, n)| {
            n.and_then(|n| self.buildings.get(n)).is_some_and(|n| {
                n.kind.is_sink()
                    || (n.kind == BuildingKind::Conveyor
                        && !facing_back(*d, n)
                        && n.conveyor().is_some_and(|c| c.is_resolved))
            })
        });
        let fallback = || {
            candidates.iter().find(|(d, n)| {
                n.and_then(|n| self.buildings.get(n))
                    .is_some_and(|n| n.kind == BuildingKind::Conveyor && !facing_back(*d, n))
            })
        };
        let direction = preferred
            .or_else(fallback)
            .map_or(from.opposite(), |(d, _)| *d);

        trace!(building = ?belt, %from, to = %direction, "conveyor turned away from its feeder");
        if let Some(b) = self.buildings.get_mut(belt) {
            b.set_direction(direction, Footprint::single());
        }
    }

    /// Resolution phase.
    fn resolve_conveyors(&mut self) {
        for b in self.buildings.values_mut() {
            if let Some(c) = b.conveyor_mut() {
                c.is_resolved = false;
            }
        }

        let mut queue: VecDeque<BuildingId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.buildings.get(*id).is_some_and(|b| b.kind.is_sink()))
            .collect();
        let mut visited: BTreeSet<BuildingId> = queue.iter().copied().collect();
        let mut resolved = Vec::new();

        while let Some(target) = queue.pop_front() {
            let Some(target_building) = self.buildings.get(target) else {
                continue;
            };
            for n in self.index.neighbors_4(target) {
                let Some(neighbor) = self.buildings.get(n) else {
                    continue;
                };
                if !neighbor.kind.is_belt() || !neighbor.feeds(target_building) {
                    continue;
                }
                if visited.insert(n) {
                    resolved.push(n);
                    queue.push_back(n);
                }
            }
        }

        for id in resolved {
            if let Some(c) = self.buildings.get_mut(id).and_then(|b| b.conveyor_mut()) {
                c.is_resolved = true;
            }
        }
    }
}
