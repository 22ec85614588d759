//! Per-cell terrain and resource depletion.

use std::fmt;
use std::str::FromStr;

use gridforge_core::fixed::{Fixed64, checked_div_64, from_count};
use gridforge_core::item::ItemKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    #[default]
    Grass,
    Stone,
    Water,
    Sand,
    Tree,
    Empty,
}

impl TileKind {
    pub const ALL: [TileKind; 6] = [
        TileKind::Grass,
        TileKind::Stone,
        TileKind::Water,
        TileKind::Sand,
        TileKind::Tree,
        TileKind::Empty,
    ];

    /// The item mined from this terrain, if any.
    pub fn resource(self) -> Option<ItemKind> {
        match self {
            TileKind::Stone => Some(ItemKind::Stone),
            TileKind::Sand => Some(ItemKind::Sand),
            TileKind::Tree => Some(ItemKind::Wood),
            TileKind::Grass | TileKind::Water | TileKind::Empty => None,
        }
    }

    pub fn is_resource(self) -> bool {
        self.resource().is_some()
    }

    /// Units a freshly generated tile of this kind holds.
    pub fn default_amount(self) -> u32 {
        match self {
            TileKind::Stone => 100,
            TileKind::Sand => 50,
            TileKind::Tree => 10,
            TileKind::Grass | TileKind::Water | TileKind::Empty => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TileKind::Grass => "grass",
            TileKind::Stone => "stone",
            TileKind::Water => "water",
            TileKind::Sand => "sand",
            TileKind::Tree => "tree",
            TileKind::Empty => "empty",
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TileKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown tile type: {s}"))
    }
}

/// One grid cell. Resource tiles carry a current and an initial amount;
/// `resource_amount <= initial_resource_amount` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tile {
    kind: TileKind,
    resource_amount: u32,
    initial_resource_amount: u32,
}

impl Tile {
    /// A tile seeded with its kind's default amount.
    pub fn new(kind: TileKind) -> Self {
        Self::with_amount(kind, kind.default_amount())
    }

    /// A tile seeded with `amount`. Non-resource kinds ignore the amount.
    pub fn with_amount(kind: TileKind, amount: u32) -> Self {
        let amount = if kind.is_resource() { amount } else { 0 };
        Self {
            kind,
            resource_amount: amount,
            initial_resource_amount: amount,
        }
    }

    /// Restore a partially depleted tile. The current amount is clamped
    /// to the initial amount.
    pub fn restored(kind: TileKind, amount: u32, initial: u32) -> Self {
        let mut tile = Self::with_amount(kind, initial.max(amount));
        tile.resource_amount = amount.min(tile.initial_resource_amount);
        tile
    }

    /// The synthetic tile returned for out-of-bounds queries.
    pub fn empty() -> Self {
        Self::new(TileKind::Empty)
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn resource_amount(&self) -> u32 {
        self.resource_amount
    }

    pub fn initial_resource_amount(&self) -> u32 {
        self.initial_resource_amount
    }

    /// The item this tile still yields, or `None` once exhausted.
    pub fn resource(&self) -> Option<ItemKind> {
        self.kind.resource().filter(|_| self.resource_amount > 0)
    }

    /// Remove up to `n` units. Returns how many were taken.
    pub fn deplete(&mut self, n: u32) -> u32 {
        let taken = n.min(self.resource_amount);
        self.resource_amount -= taken;
        taken
    }

    /// A resource tile with nothing left.
    pub fn is_depleted(&self) -> bool {
        self.kind.is_resource() && self.resource_amount == 0
    }

    /// Remaining share of the initial amount, for visual scaling.
    pub fn remaining_ratio(&self) -> Fixed64 {
        if self.initial_resource_amount == 0 {
            return Fixed64::ZERO;
        }
        checked_div_64(from_count(self.resource_amount), from_count(self.initial_resource_amount))
            .unwrap_or(Fixed64::ZERO)
    }

    /// The tile that replaces this one on the next world tick, if any.
    pub fn tick(&self) -> Option<Tile> {
        self.is_depleted().then(|| Tile::new(TileKind::Grass))
    }
}
