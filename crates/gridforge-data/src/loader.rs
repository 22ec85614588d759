//! Data directory loading: format detection, file discovery,
//! deserialization and merging over the built-in catalog.

use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use gridforge_world::{BuildingDef, BuildingKind, Catalog, Recipe, UpgradeTable, World, WorldSettings};
use tracing::debug;

use crate::schema::{BuildingData, TomlBuildings, TomlRecipes};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The same building kind or recipe id appears twice in one file.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// Values that parse but cannot be simulated.
    #[error("invalid value in {file}: {detail}")]
    Invalid { file: PathBuf, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so TOML files are
/// read as the wrapper table `W` and unpacked by `from_table`.
fn deserialize_list<T, W>(
    path: &Path,
    from_table: impl FnOnce(W) -> Vec<T>,
) -> Result<Vec<T>, DataLoadError>
where
    T: DeserializeOwned,
    W: DeserializeOwned,
{
    match detect_format(path)? {
        Format::Toml => deserialize_file::<W>(path).map(from_table),
        Format::Ron | Format::Json => deserialize_file(path),
    }
}

// ===========================================================================
// Catalog assembly
// ===========================================================================

/// Everything a data directory configures.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    pub catalog: Catalog,
    pub upgrades: UpgradeTable,
}

impl GameData {
    /// A fresh all-grass world using this catalog.
    pub fn new_world(&self) -> World {
        World::new(self.catalog.clone())
    }
}

/// Load every data file present in `dir` and merge it over the built-in
/// catalog. Missing files leave the defaults in place.
pub fn load_catalog(dir: &Path) -> Result<GameData, DataLoadError> {
    let mut data = GameData::default();

    if let Some(path) = find_data_file(dir, "buildings")? {
        let entries: Vec<BuildingData> = deserialize_list(&path, |w: TomlBuildings| w.buildings)?;
        merge_buildings(&mut data.catalog, &entries, &path)?;
        debug!(file = %path.display(), count = entries.len(), "building overrides loaded");
    }

    if let Some(path) = find_data_file(dir, "recipes")? {
        let recipes: Vec<Recipe> = deserialize_list(&path, |w: TomlRecipes| w.recipes)?;
        merge_recipes(&mut data.catalog, recipes, &path)?;
        debug!(file = %path.display(), total = data.catalog.recipes.len(), "recipes loaded");
    }

    if let Some(path) = find_data_file(dir, "world")? {
        let settings: WorldSettings = deserialize_file(&path)?;
        if settings.width == 0 || settings.height == 0 {
            return Err(DataLoadError::Invalid {
                file: path,
                detail: format!("world size {}x{}", settings.width, settings.height),
            });
        }
        data.catalog.settings = settings;
        debug!(file = %path.display(), "world settings loaded");
    }

    if let Some(path) = find_data_file(dir, "upgrades")? {
        data.upgrades = deserialize_file(&path)?;
        debug!(file = %path.display(), "upgrade table loaded");
    }

    Ok(data)
}

fn merge_buildings(
    catalog: &mut Catalog,
    entries: &[BuildingData],
    file: &Path,
) -> Result<(), DataLoadError> {
    let mut seen: BTreeSet<BuildingKind> = BTreeSet::new();
    for entry in entries {
        if !seen.insert(entry.kind) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: entry.kind.to_string(),
            });
        }
        let def = catalog
            .buildings
            .entry(entry.kind)
            .or_insert_with(|| BuildingDef::builtin(entry.kind));
        entry.apply_to(def);
        if def.footprint.width == 0 || def.footprint.height == 0 {
            return Err(DataLoadError::Invalid {
                file: file.to_path_buf(),
                detail: format!("{} has an empty footprint", entry.kind),
            });
        }
    }
    Ok(())
}

/// Recipes with a known id replace the built-in one; new ids are appended.
fn merge_recipes(
    catalog: &mut Catalog,
    recipes: Vec<Recipe>,
    file: &Path,
) -> Result<(), DataLoadError> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for recipe in recipes {
        if !seen.insert(recipe.id.clone()) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: recipe.id,
            });
        }
        if recipe.input_count == 0 || recipe.output_count == 0 {
            return Err(DataLoadError::Invalid {
                file: file.to_path_buf(),
                detail: format!("recipe '{}' has a zero count", recipe.id),
            });
        }
        match catalog.recipes.iter_mut().find(|r| r.id == recipe.id) {
            Some(existing) => *existing = recipe,
            None => catalog.recipes.push(recipe),
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
