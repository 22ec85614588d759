use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every item that exists in the simulation. Raw resources come out of
/// tiles, products come out of furnaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Stone,
    Sand,
    Wood,
    Brick,
    Glass,
    Charcoal,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        ItemKind::Stone,
        ItemKind::Sand,
        ItemKind::Wood,
        ItemKind::Brick,
        ItemKind::Glass,
        ItemKind::Charcoal,
    ];

    /// The snake_case id used in saves and data files.
    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Stone => "stone",
            ItemKind::Sand => "sand",
            ItemKind::Wood => "wood",
            ItemKind::Brick => "brick",
            ItemKind::Glass => "glass",
            ItemKind::Charcoal => "charcoal",
        }
    }

    /// True for items that are mined directly from tiles.
    pub fn is_raw(self) -> bool {
        matches!(self, ItemKind::Stone | ItemKind::Sand | ItemKind::Wood)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown item id: {0}")]
pub struct UnknownItem(pub String);

impl FromStr for ItemKind {
    type Err = UnknownItem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownItem(s.to_string()))
    }
}

/// A counted pile of one item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemKind,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item: ItemKind, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Bounded multi-kind buffer. Capacity counts items across all kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBuffer {
    pub stacks: Vec<ItemStack>,
    pub capacity: u32,
}

impl ItemBuffer {
    pub fn new(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    /// Add items. Returns the amount that didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, item: ItemKind, quantity: u32) -> u32 {
        let space = self.capacity.saturating_sub(self.total());
        let to_add = quantity.min(space);
        let overflow = quantity - to_add;

        if to_add > 0 {
            if let Some(stack) = self.stacks.iter_mut().find(|s| s.item == item) {
                stack.quantity += to_add;
            } else {
                self.stacks.push(ItemStack::new(item, to_add));
            }
        }

        overflow
    }

    /// Remove items of one kind. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, item: ItemKind, quantity: u32) -> u32 {
        let Some(stack) = self.stacks.iter_mut().find(|s| s.item == item) else {
            return 0;
        };
        let to_remove = quantity.min(stack.quantity);
        stack.quantity -= to_remove;
        self.stacks.retain(|s| s.quantity > 0);
        to_remove
    }

    /// Take a single unit of the oldest stacked kind.
    pub fn pop_one(&mut self) -> Option<ItemKind> {
        let item = self.peek()?;
        (self.remove(item, 1) == 1).then_some(item)
    }

    /// The kind that `pop_one` would return.
    pub fn peek(&self) -> Option<ItemKind> {
        self.stacks.first().map(|s| s.item)
    }

    pub fn quantity(&self, item: ItemKind) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.item == item)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    /// Total items across all kinds.
    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn is_full(&self) -> bool {
        self.total() >= self.capacity
    }

    pub fn has_space_for(&self, quantity: u32) -> bool {
        self.total() + quantity <= self.capacity
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}
