//! Per-kind building count authority.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::catalog::BuildingKind;

/// Decides whether another building of a kind may be placed and keeps the
/// counts in step with placements and removals.
pub trait PlacementLimits: Debug {
    fn count(&self, kind: BuildingKind) -> u32;

    fn allows(&self, kind: BuildingKind, max: Option<u32>) -> bool {
        max.is_none_or(|max| self.count(kind) < max)
    }

    fn record_placed(&mut self, kind: BuildingKind);

    fn record_removed(&mut self, kind: BuildingKind);

    /// Forget all counts. Called before a save is replayed.
    fn reset(&mut self);
}

/// In-memory counts, the default authority.
#[derive(Debug, Clone, Default)]
pub struct CountingLimits {
    counts: BTreeMap<BuildingKind, u32>,
}

impl PlacementLimits for CountingLimits {
    fn count(&self, kind: BuildingKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    fn record_placed(&mut self, kind: BuildingKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    fn record_removed(&mut self, kind: BuildingKind) {
        if let Some(n) = self.counts.get_mut(&kind) {
            *n = n.saturating_sub(1);
        }
    }

    fn reset(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_place_and_remove() {
        let mut limits = CountingLimits::default();
        assert!(limits.allows(BuildingKind::Hub, Some(1)));
        limits.record_placed(BuildingKind::Hub);
        assert!(!limits.allows(BuildingKind::Hub, Some(1)));
        limits.record_removed(BuildingKind::Hub);
        assert!(limits.allows(BuildingKind::Hub, Some(1)));
    }

    #[test]
    fn unlimited_kinds_always_allowed() {
        let mut limits = CountingLimits::default();
        for _ in 0..100 {
            limits.record_placed(BuildingKind::Conveyor);
        }
        assert!(limits.allows(BuildingKind::Conveyor, None));
        assert_eq!(limits.count(BuildingKind::Conveyor), 100);
    }

    #[test]
    fn remove_never_underflows() {
        let mut limits = CountingLimits::default();
        limits.record_removed(BuildingKind::Chest);
        assert_eq!(limits.count(BuildingKind::Chest), 0);
    }

    #[test]
    fn reset_clears_counts() {
        let mut limits = CountingLimits::default();
        limits.record_placed(BuildingKind::Hub);
        limits.reset();
        assert_eq!(limits.count(BuildingKind::Hub), 0);
    }
}
