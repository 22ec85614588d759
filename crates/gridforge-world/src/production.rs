//! Extractor, sawmill and furnace state machines.
//!
//! Sources mine the tile under them into an internal buffer on a fixed
//! cadence and push one buffered unit per tick out of their front port.
//! Furnaces queue inputs, run a bounded number of parallel jobs and
//! accumulate a single kind of product. Both report a debounced
//! [`OperationStatus`].

use std::collections::VecDeque;

use gridforge_core::fixed::{Fixed64, checked_div_64};
use gridforge_core::id::BuildingId;
use gridforge_core::item::{ItemBuffer, ItemKind, ItemStack};
use gridforge_spatial::Side;
use tracing::trace;

use crate::building::{BuildingState, OperationStatus};
use crate::catalog::{BuildingKind, Recipe};
use crate::event::Event;
use crate::transfer::Offer;
use crate::upgrade::{SimContext, Stat};
use crate::world::World;

// ---------------------------------------------------------------------------
// Status debounce
// ---------------------------------------------------------------------------

/// Accumulates how long an output stall has lasted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockedTimer {
    pub elapsed: Fixed64,
}

impl BlockedTimer {
    /// Advance while blocked, reset otherwise. Returns true once the stall
    /// has lasted longer than `threshold`.
    pub fn update(&mut self, blocked: bool, delta: Fixed64, threshold: Fixed64) -> bool {
        if blocked {
            self.elapsed = self.elapsed.saturating_add(delta);
            self.elapsed > threshold
        } else {
            self.elapsed = Fixed64::ZERO;
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor / sawmill
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceState {
    /// Seconds accumulated toward the next extraction.
    pub timer: Fixed64,
    pub buffer: ItemBuffer,
    /// Per-building rate factor, persisted with the building.
    pub speed_multiplier: Fixed64,
    pub blocked: BlockedTimer,
}

impl SourceState {
    pub fn new(buffer_capacity: u32) -> Self {
        Self {
            timer: Fixed64::ZERO,
            buffer: ItemBuffer::new(buffer_capacity),
            speed_multiplier: Fixed64::ONE,
            blocked: BlockedTimer::default(),
        }
    }
}

/// Status precedence for sources.
fn source_status(
    previous: OperationStatus,
    no_power: bool,
    has_resource: bool,
    buffer_empty: bool,
    blocked: bool,
    debounced_blocked: bool,
    active: bool,
) -> OperationStatus {
    if no_power {
        OperationStatus::NoPower
    } else if !has_resource && buffer_empty {
        OperationStatus::NoResources
    } else if blocked {
        if debounced_blocked {
            OperationStatus::Blocked
        } else {
            previous
        }
    } else if active {
        OperationStatus::Working
    } else {
        OperationStatus::Idle
    }
}

// ---------------------------------------------------------------------------
// Furnace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FurnaceJob {
    pub recipe: String,
    /// 0..=1. Held at 1 while the product cannot be stored.
    pub progress: Fixed64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FurnaceState {
    /// Restricts accepted inputs to this recipe when set.
    pub selected_recipe: Option<String>,
    pub input_queue: VecDeque<ItemKind>,
    pub output: Option<ItemStack>,
    pub jobs: Vec<FurnaceJob>,
    pub queue_capacity: u32,
    pub output_capacity: u32,
    pub max_jobs: u32,
    pub blocked: BlockedTimer,
}

impl FurnaceState {
    pub fn new(queue_capacity: u32, output_capacity: u32, max_jobs: u32) -> Self {
        Self {
            selected_recipe: None,
            input_queue: VecDeque::new(),
            output: None,
            jobs: Vec::new(),
            queue_capacity,
            output_capacity,
            max_jobs,
            blocked: BlockedTimer::default(),
        }
    }

    fn recipe_for<'r>(&self, item: ItemKind, recipes: &'r [Recipe]) -> Option<&'r Recipe> {
        match &self.selected_recipe {
            Some(id) => recipes.iter().find(|r| &r.id == id && r.input == item),
            None => recipes.iter().find(|r| r.input == item),
        }
    }

    pub fn accepts(&self, item: ItemKind, recipes: &[Recipe]) -> bool {
        (self.input_queue.len() as u32) < self.queue_capacity
            && self.recipe_for(item, recipes).is_some()
    }

    /// Queue one input unit. Returns false when refused.
    pub fn enqueue(&mut self, item: ItemKind, recipes: &[Recipe]) -> bool {
        if !self.accepts(item, recipes) {
            return false;
        }
        self.input_queue.push_back(item);
        true
    }

    fn output_quantity(&self) -> u32 {
        self.output.map_or(0, |s| s.quantity)
    }

    pub fn output_full(&self) -> bool {
        self.output_quantity() >= self.output_capacity
    }

    fn output_accepts(&self, item: ItemKind, quantity: u32) -> bool {
        let same_kind = self.output.is_none_or(|s| s.item == item);
        same_kind && self.output_quantity() + quantity <= self.output_capacity
    }

    /// Units of `item` already promised to running jobs.
    fn reserved(&self, item: ItemKind, recipes: &[Recipe]) -> u32 {
        self.jobs
            .iter()
            .filter_map(|j| recipes.iter().find(|r| r.id == j.recipe))
            .filter(|r| r.output == item)
            .map(|r| r.output_count)
            .sum()
    }

    /// True while some job is still making progress.
    pub fn is_processing(&self) -> bool {
        self.jobs.iter().any(|j| j.progress < Fixed64::ONE)
    }

    pub fn is_empty(&self) -> bool {
        self.input_queue.is_empty() && self.jobs.is_empty() && self.output.is_none()
    }

    /// Advance every job by `step` seconds of full-speed work and store
    /// finished products. Returns what was crafted.
    pub fn advance(&mut self, step: Fixed64, recipes: &[Recipe]) -> Vec<ItemStack> {
        for job in &mut self.jobs {
            let Some(recipe) = recipes.iter().find(|r| r.id == job.recipe) else {
                continue;
            };
            let gained = if recipe.duration > Fixed64::ZERO {
                checked_div_64(step, recipe.duration).unwrap_or(Fixed64::ONE)
            } else {
                Fixed64::ONE
            };
            job.progress = job.progress.saturating_add(gained).min(Fixed64::ONE);
        }

        let mut crafted = Vec::new();
        let mut i = 0;
        while i < self.jobs.len() {
            let job = &self.jobs[i];
            let recipe = recipes.iter().find(|r| r.id == job.recipe);
            match recipe {
                Some(r) if job.progress >= Fixed64::ONE => {
                    if self.output_accepts(r.output, r.output_count) {
                        let quantity = self.output_quantity() + r.output_count;
                        self.output = Some(ItemStack::new(r.output, quantity));
                        crafted.push(ItemStack::new(r.output, r.output_count));
                        self.jobs.remove(i);
                        continue;
                    }
                }
                // A job whose recipe disappeared can never finish.
                None => {
                    self.jobs.remove(i);
                    continue;
                }
                Some(_) => {}
            }
            i += 1;
        }
        crafted
    }

    /// Start jobs from the queue while slots and output room remain.
    pub fn start_jobs(&mut self, recipes: &[Recipe]) {
        while (self.jobs.len() as u32) < self.max_jobs {
            let Some(recipe) = self.next_startable(recipes) else {
                break;
            };
            let mut needed = recipe.input_count;
            self.input_queue.retain(|item| {
                if needed > 0 && *item == recipe.input {
                    needed -= 1;
                    false
                } else {
                    true
                }
            });
            self.jobs.push(FurnaceJob {
                recipe: recipe.id.clone(),
                progress: Fixed64::ZERO,
            });
        }
    }

    fn next_startable<'r>(&self, recipes: &'r [Recipe]) -> Option<&'r Recipe> {
        let mut tried: Vec<ItemKind> = Vec::new();
        for &item in &self.input_queue {
            if tried.contains(&item) {
                continue;
            }
            tried.push(item);
            let Some(recipe) = self.recipe_for(item, recipes) else {
                continue;
            };
            let available = self.input_queue.iter().filter(|i| **i == item).count() as u32;
            let promised = self.reserved(recipe.output, recipes) + recipe.output_count;
            if available >= recipe.input_count && self.output_accepts(recipe.output, promised) {
                return Some(recipe);
            }
        }
        None
    }

    /// Take one unit of product.
    pub fn take_output(&mut self) -> Option<ItemKind> {
        let stack = self.output.as_mut()?;
        let item = stack.item;
        stack.quantity = stack.quantity.saturating_sub(1);
        if stack.quantity == 0 {
            self.output = None;
        }
        Some(item)
    }
}

// ---------------------------------------------------------------------------
// World integration
// ---------------------------------------------------------------------------

impl World {
    /// One tick of an extractor or sawmill.
    pub(crate) fn tick_source(&mut self, id: BuildingId, delta: Fixed64, ctx: &SimContext<'_>) {
        let Some(building) = self.buildings.get(id) else {
            return;
        };
        let kind = building.kind;
        let anchor = building.position;
        let factor = building.power_factor();
        let no_power = building.power_config.is_some() && factor == Fixed64::ZERO;
        let Some(def) = self.catalog.building(kind) else {
            return;
        };
        let base_rate = def.extraction_rate;
        let capacity = ctx.upgrades.apply_count(kind, Stat::BufferCapacity, def.buffer_capacity);
        let threshold = self.catalog.settings.blocked_debounce;
        let tick = self.tick_count;
        let resource = self.tile(anchor.x, anchor.y).resource();

        // Advance the extraction timer and count the units that came due.
        let mut due = 0u32;
        let mut advanced = false;
        if let Some(state) = self.buildings.get_mut(id).and_then(|b| b.source_mut()) {
            state.buffer.capacity = capacity;
            let rate = ctx.upgrades.apply(
                kind,
                Stat::ExtractionRate,
                base_rate.saturating_mul(state.speed_multiplier),
            );
            if resource.is_none() {
                state.timer = Fixed64::ZERO;
            } else if !no_power && !state.buffer.is_full() && rate > Fixed64::ZERO {
                let interval = checked_div_64(Fixed64::ONE, rate).unwrap_or(Fixed64::MAX);
                state.timer = state.timer.saturating_add(delta.saturating_mul(factor));
                advanced = true;
                while state.timer >= interval && state.buffer.has_space_for(due + 1) {
                    state.timer -= interval;
                    due += 1;
                }
            }
        }

        let mut mined = 0u32;
        if let (Some(item), true) = (resource, due > 0) {
            mined = self.tile_mut(anchor.x, anchor.y).map_or(0, |t| t.deplete(due));
            if let Some(state) = self.buildings.get_mut(id).and_then(|b| b.source_mut()) {
                let _ = state.buffer.add(item, mined);
                if mined < due {
                    state.timer = Fixed64::ZERO;
                }
            }
            for _ in 0..mined {
                self.events.emit(Event::ResourceMined {
                    building: id,
                    item,
                    tile: anchor,
                    tick,
                });
            }
        }

        let pushed = self.push_buffered(id);
        let has_resource = self.tile(anchor.x, anchor.y).resource().is_some();

        let Some(building) = self.buildings.get_mut(id) else {
            return;
        };
        let previous = building.status;
        let Some(state) = building.source_mut() else {
            return;
        };
        let blocked = state.buffer.is_full() && !pushed;
        let debounced = state.blocked.update(blocked, delta, threshold);
        building.status = source_status(
            previous,
            no_power,
            has_resource,
            state.buffer.is_empty(),
            blocked,
            debounced,
            advanced || mined > 0 || pushed,
        );
    }

    /// Push one buffered unit out of the front port.
    fn push_buffered(&mut self, id: BuildingId) -> bool {
        let Some(building) = self.buildings.get(id) else {
            return false;
        };
        let Some(item) = building.source().and_then(|s| s.buffer.peek()) else {
            return false;
        };
        let source = building.port_origin(Side::Front);
        let Some(target) = self.front_target(id) else {
            return false;
        };
        if !self.offer_item(target, Offer::new(item, source)) {
            return false;
        }
        if let Some(s) = self.buildings.get_mut(id).and_then(|b| b.source_mut()) {
            let _ = s.buffer.remove(item, 1);
        }
        true
    }

    /// One tick of a furnace.
    pub(crate) fn tick_furnace(&mut self, id: BuildingId, delta: Fixed64, ctx: &SimContext<'_>) {
        let Some(def) = self.catalog.building(BuildingKind::Furnace) else {
            return;
        };
        let kind = BuildingKind::Furnace;
        let queue_capacity = ctx.upgrades.apply_count(kind, Stat::QueueCapacity, def.queue_capacity);
        let max_jobs = ctx.upgrades.apply_count(kind, Stat::ParallelJobs, def.parallel_jobs);
        let output_capacity = def.output_capacity;
        let speed = ctx.upgrades.multiplier(kind, Stat::ProcessingSpeed);
        let threshold = self.catalog.settings.blocked_debounce;
        let tick = self.tick_count;
        let recipes = &self.catalog.recipes;

        let Some(building) = self.buildings.get_mut(id) else {
            return;
        };
        let factor = building.power_factor();
        let no_power = building.power_config.is_some() && factor == Fixed64::ZERO;
        let output_connected = building.io.output_connected;
        let source = building.port_origin(Side::Front);
        let BuildingState::Furnace(state) = &mut building.state else {
            return;
        };
        state.queue_capacity = queue_capacity;
        state.max_jobs = max_jobs;
        state.output_capacity = output_capacity;

        let step = delta.saturating_mul(speed).saturating_mul(factor);
        let crafted = state.advance(step, recipes);
        state.start_jobs(recipes);
        let product = state.output.map(|s| s.item);

        for stack in crafted {
            trace!(building = ?id, item = %stack.item, "furnace crafted");
            self.events.emit(Event::ItemCrafted {
                building: id,
                item: stack.item,
                quantity: stack.quantity,
                tick,
            });
        }

        let mut pushed = false;
        if let (true, Some(item)) = (output_connected, product) {
            if let Some(target) = self.front_target(id) {
                pushed = self.offer_item(target, Offer::new(item, source));
            }
        }

        let Some(building) = self.buildings.get_mut(id) else {
            return;
        };
        let previous = building.status;
        let BuildingState::Furnace(state) = &mut building.state else {
            return;
        };
        if pushed {
            let _ = state.take_output();
        }
        let blocked = state.output_full() && !pushed;
        let debounced = state.blocked.update(blocked, delta, threshold);
        let busy = !state.jobs.is_empty() || !state.input_queue.is_empty();

        building.status = if no_power && busy {
            OperationStatus::NoPower
        } else if state.is_processing() {
            OperationStatus::Working
        } else if blocked {
            if debounced {
                OperationStatus::Blocked
            } else {
                previous
            }
        } else if state.is_empty() {
            OperationStatus::NoResources
        } else {
            OperationStatus::Idle
        };
    }
}
