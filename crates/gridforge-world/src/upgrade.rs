//! Stat multipliers and bonuses supplied by the progression layer.
//!
//! The simulation treats upgrades as a pure lookup
//! `(building kind, stat) -> number`, passed in per tick through
//! [`SimContext`].

use std::collections::BTreeMap;

use gridforge_core::fixed::{Fixed64, f64_to_fixed64, from_count};
use serde::{Deserialize, Serialize};

use crate::catalog::BuildingKind;

/// A tunable building statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    ExtractionRate,
    ProcessingSpeed,
    ConveyorSpeed,
    QueueCapacity,
    ParallelJobs,
    StorageSlots,
    BufferCapacity,
    PowerGeneration,
}

pub trait Upgrades {
    /// Scale factor for `stat`. Defaults to 1.
    fn multiplier(&self, _kind: BuildingKind, _stat: Stat) -> Fixed64 {
        Fixed64::ONE
    }

    /// Additive bonus for `stat`. Defaults to 0.
    fn bonus(&self, _kind: BuildingKind, _stat: Stat) -> Fixed64 {
        Fixed64::ZERO
    }

    /// `base * multiplier + bonus`.
    fn apply(&self, kind: BuildingKind, stat: Stat, base: Fixed64) -> Fixed64 {
        base.saturating_mul(self.multiplier(kind, stat))
            .saturating_add(self.bonus(kind, stat))
    }

    /// [`Upgrades::apply`] for whole counts, rounded down and floored at 0.
    fn apply_count(&self, kind: BuildingKind, stat: Stat, base: u32) -> u32 {
        let value = self.apply(kind, stat, from_count(base));
        value.max(Fixed64::ZERO).saturating_to_num::<u32>()
    }
}

/// No upgrades unlocked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpgrades;

impl Upgrades for NoUpgrades {}

/// Config-loadable upgrade values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeTable {
    pub multipliers: BTreeMap<BuildingKind, BTreeMap<Stat, f64>>,
    pub bonuses: BTreeMap<BuildingKind, BTreeMap<Stat, f64>>,
}

impl UpgradeTable {
    pub fn set_multiplier(&mut self, kind: BuildingKind, stat: Stat, value: f64) {
        self.multipliers.entry(kind).or_default().insert(stat, value);
    }

    pub fn set_bonus(&mut self, kind: BuildingKind, stat: Stat, value: f64) {
        self.bonuses.entry(kind).or_default().insert(stat, value);
    }
}

impl Upgrades for UpgradeTable {
    fn multiplier(&self, kind: BuildingKind, stat: Stat) -> Fixed64 {
        self.multipliers
            .get(&kind)
            .and_then(|m| m.get(&stat))
            .map_or(Fixed64::ONE, |v| f64_to_fixed64(*v))
    }

    fn bonus(&self, kind: BuildingKind, stat: Stat) -> Fixed64 {
        self.bonuses
            .get(&kind)
            .and_then(|m| m.get(&stat))
            .map_or(Fixed64::ZERO, |v| f64_to_fixed64(*v))
    }
}

/// Read-only collaborators handed to one tick.
#[derive(Clone, Copy)]
pub struct SimContext<'a> {
    pub upgrades: &'a dyn Upgrades,
}

static NO_UPGRADES: NoUpgrades = NoUpgrades;

impl Default for SimContext<'static> {
    fn default() -> Self {
        Self {
            upgrades: &NO_UPGRADES,
        }
    }
}

impl<'a> SimContext<'a> {
    pub fn new(upgrades: &'a dyn Upgrades) -> Self {
        Self { upgrades }
    }
}

impl std::fmt::Debug for SimContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_upgrades_is_identity() {
        let up = NoUpgrades;
        let base = Fixed64::from_num(7);
        assert_eq!(up.apply(BuildingKind::Extractor, Stat::ExtractionRate, base), base);
        assert_eq!(up.apply_count(BuildingKind::Chest, Stat::StorageSlots, 8), 8);
    }

    #[test]
    fn table_applies_multiplier_then_bonus() {
        let mut table = UpgradeTable::default();
        table.set_multiplier(BuildingKind::Extractor, Stat::ExtractionRate, 1.5);
        table.set_bonus(BuildingKind::Furnace, Stat::QueueCapacity, 5.0);

        assert_eq!(
            table.apply(BuildingKind::Extractor, Stat::ExtractionRate, Fixed64::from_num(2)),
            Fixed64::from_num(3)
        );
        assert_eq!(table.apply_count(BuildingKind::Furnace, Stat::QueueCapacity, 10), 15);
        // Other kinds are untouched.
        assert_eq!(
            table.multiplier(BuildingKind::Sawmill, Stat::ExtractionRate),
            Fixed64::ONE
        );
    }

    #[test]
    fn apply_count_floors_negative_results() {
        let mut table = UpgradeTable::default();
        table.set_bonus(BuildingKind::Chest, Stat::StorageSlots, -20.0);
        assert_eq!(table.apply_count(BuildingKind::Chest, Stat::StorageSlots, 8), 0);
    }

    #[test]
    fn apply_count_saturates_huge_bases() {
        let up = NoUpgrades;
        let max = i32::MAX as u32;
        assert_eq!(up.apply_count(BuildingKind::Chest, Stat::StorageSlots, u32::MAX), max);
        let mut table = UpgradeTable::default();
        table.set_multiplier(BuildingKind::Furnace, Stat::QueueCapacity, 4.0);
        assert_eq!(table.apply_count(BuildingKind::Furnace, Stat::QueueCapacity, max), max);
    }

    #[test]
    fn table_deserializes_from_json() {
        let table: UpgradeTable = serde_json::from_str(
            r#"{"multipliers": {"conveyor": {"conveyor_speed": 2.0}}}"#,
        )
        .unwrap();
        assert_eq!(
            table.multiplier(BuildingKind::Conveyor, Stat::ConveyorSpeed),
            Fixed64::from_num(2)
        );
        assert!(table.bonuses.is_empty());
    }

    #[test]
    fn default_context_uses_no_upgrades() {
        let ctx = SimContext::default();
        assert_eq!(
            ctx.upgrades.multiplier(BuildingKind::Hub, Stat::PowerGeneration),
            Fixed64::ONE
        );
    }
}
