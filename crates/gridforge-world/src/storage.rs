//! Chest storage: a bounded array of single-kind stacks.

use gridforge_core::item::{ItemKind, ItemStack};

/// Upper bound on a chest's slot count, whatever the bonus.
pub const MAX_CHEST_SLOTS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chest {
    pub slots: Vec<Option<ItemStack>>,
    /// Slots granted on top of the base count.
    pub bonus_slots: u32,
    pub stack_size: u32,
}

impl Chest {
    pub fn new(slots: u32, stack_size: u32) -> Self {
        Self {
            slots: vec![None; slots as usize],
            bonus_slots: 0,
            stack_size,
        }
    }

    /// Grow to `base + bonus` slots, capped at [`MAX_CHEST_SLOTS`].
    /// Existing slots are never dropped.
    pub fn sync_bonus(&mut self, base: u32, bonus: u32) {
        self.bonus_slots = self.bonus_slots.max(bonus);
        let wanted = base.saturating_add(self.bonus_slots).min(MAX_CHEST_SLOTS) as usize;
        if self.slots.len() < wanted {
            self.slots.resize(wanted, None);
        }
    }

    pub fn can_insert(&self, item: ItemKind) -> bool {
        self.slots.iter().any(|slot| match slot {
            Some(stack) => stack.item == item && stack.quantity < self.stack_size,
            None => true,
        })
    }

    /// Top up a matching stack first, otherwise open a free slot.
    pub fn insert(&mut self, item: ItemKind) -> bool {
        let stack_size = self.stack_size;
        if let Some(stack) = self
            .slots
            .iter_mut()
            .flatten()
            .find(|s| s.item == item && s.quantity < stack_size)
        {
            stack.quantity += 1;
            return true;
        }
        if stack_size == 0 {
            return false;
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(ItemStack::new(item, 1));
                true
            }
            None => false,
        }
    }

    pub fn quantity(&self, item: ItemKind) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item == item)
            .map(|s| s.quantity)
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.slots.iter().flatten().map(|s| s.quantity).sum()
    }
}
