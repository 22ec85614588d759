use gridforge_core::item::ItemKind;
use gridforge_spatial::GridPosition;

use crate::catalog::BuildingKind;

/// Why a placement was refused. A refusal never mutates the world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("unknown building type: {0}")]
    UnknownType(String),
    #[error("no definition for {0} in the catalog")]
    MissingDefinition(BuildingKind),
    #[error("cell {0:?} is outside the world")]
    OutOfBounds(GridPosition),
    #[error("placement limit reached for {kind} (max {max})")]
    LimitReached { kind: BuildingKind, max: u32 },
    #[error("cell {0:?} is already occupied")]
    Occupied(GridPosition),
    #[error("cell {0:?} is water")]
    WaterTile(GridPosition),
    #[error("cell {0:?} holds a resource this building cannot be placed on")]
    ResourceTile(GridPosition),
    #[error("resource {resource} at {position:?} is not accepted")]
    ResourceNotAllowed {
        position: GridPosition,
        resource: ItemKind,
    },
    #[error("cell {0:?} has no resource to work")]
    RequiresResource(GridPosition),
}

/// Errors from encoding or decoding a saved world.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("grid {width}x{height} exceeds {max} cells")]
    GridTooLarge { width: u32, height: u32, max: usize },
}
