use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed building in the world's arena. Every cell of a
    /// multi-tile footprint maps to the same id.
    pub struct BuildingId;
}

/// Identifies a power grid. Indexes are reassigned on every rebuild, so
/// ids are only meaningful until the next topology change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PowerGridId(pub u32);

/// Stable visual identity of an item travelling on the belt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemUid(pub u64);

impl ItemUid {
    /// The uid that follows this one.
    pub fn next(self) -> ItemUid {
        ItemUid(self.0.wrapping_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn building_ids_are_distinct_per_insert() {
        let mut arena: SlotMap<BuildingId, &str> = SlotMap::with_key();
        let a = arena.insert("extractor");
        let b = arena.insert("conveyor");
        assert_ne!(a, b);
        assert_eq!(arena[a], "extractor");
    }

    #[test]
    fn removed_building_id_goes_stale() {
        let mut arena: SlotMap<BuildingId, u8> = SlotMap::with_key();
        let a = arena.insert(1);
        arena.remove(a);
        let b = arena.insert(2);
        assert!(arena.get(a).is_none());
        assert_eq!(arena[b], 2);
    }

    #[test]
    fn item_uid_increments() {
        assert_eq!(ItemUid(7).next(), ItemUid(8));
    }

    #[test]
    fn item_uid_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ItemUid(42)).unwrap(), "42");
    }
}
