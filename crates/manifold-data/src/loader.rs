//! Reads content files, checks every reference, and builds engine types.
//!
//! Two base names are recognized in a content directory:
//!
//! - `reactions` (optional): a list of [`GasReaction`]s. Load these first;
//!   pipe kinds need them when the group registry is built.
//! - `prototypes` (required): a list of [`PrototypeData`], resolved against
//!   a finished [`GroupRegistry`].
//!
//! Each may be `.ron`, `.toml` or `.json`. TOML files hold the list under a
//! top-level key of the same name.

use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use manifold_atmos::{GasReaction, ReactionSet};
use manifold_graph::{GroupRegistry, NodeSpec};

use crate::prototype::{EntityPrototype, PrototypeSet};
use crate::schema::PrototypeData;

pub const PROTOTYPES: &str = "prototypes";
pub const REACTIONS: &str = "reactions";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// Data that parses but describes something the engine cannot build.
    #[error("invalid definition '{name}' in {file}: {reason}")]
    Invalid {
        file: PathBuf,
        name: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

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

/// Find `{base_name}.ron`, `.toml` or `.json` in `dir`. More than one is an
/// error; none is `Ok(None)`.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
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

/// Deserialize a list. TOML files keep it under `toml_key`; RON and JSON
/// files are the bare list.
pub fn deserialize_list<T: DeserializeOwned>(path: &Path, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load and validate reactions. A missing file yields an empty set.
pub fn load_reactions(dir: &Path) -> Result<ReactionSet, DataLoadError> {
    let Some(path) = find_data_file(dir, REACTIONS)? else {
        tracing::debug!(dir = %dir.display(), "no reactions file");
        return Ok(ReactionSet::empty());
    };
    let reactions: Vec<GasReaction> = deserialize_list(&path, REACTIONS)?;

    let mut seen = BTreeSet::new();
    for reaction in &reactions {
        if !seen.insert(reaction.name.as_str()) {
            return Err(DataLoadError::DuplicateName {
                file: path.clone(),
                name: reaction.name.clone(),
            });
        }
        reaction.validate().map_err(|reason| DataLoadError::Invalid {
            file: path.clone(),
            name: reaction.name.clone(),
            reason: reason.to_string(),
        })?;
    }
    tracing::info!(count = reactions.len(), file = %path.display(), "loaded reactions");
    Ok(ReactionSet::new(reactions))
}

/// Load prototypes and resolve them against `registry`.
pub fn load_prototypes(dir: &Path, registry: &GroupRegistry) -> Result<PrototypeSet, DataLoadError> {
    let path = require_data_file(dir, PROTOTYPES)?;
    let raw: Vec<PrototypeData> = deserialize_list(&path, PROTOTYPES)?;

    let mut names: HashMap<String, ()> = HashMap::new();
    let mut set = PrototypeSet::default();
    for data in raw {
        check_duplicate(&names, &data.name, &path)?;
        names.insert(data.name.clone(), ());
        set.insert(resolve_prototype(data, registry, &path)?);
    }
    tracing::info!(count = set.len(), file = %path.display(), "loaded prototypes");
    Ok(set)
}

fn resolve_prototype(data: PrototypeData, registry: &GroupRegistry, file: &Path) -> Result<EntityPrototype, DataLoadError> {
    let invalid = |reason: String| DataLoadError::Invalid {
        file: file.to_path_buf(),
        name: data.name.clone(),
        reason,
    };

    let mut slots = BTreeSet::new();
    let mut nodes = Vec::with_capacity(data.nodes.len());
    for node in &data.nodes {
        if !slots.insert(node.slot.as_str()) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: format!("{}.{}", data.name, node.slot),
            });
        }
        let kind = registry
            .kind_id(&node.kind)
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: node.kind.clone(),
                expected_kind: "group kind",
            })?;
        if !node.volume.is_finite() || node.volume < 0.0 {
            return Err(invalid(format!("node '{}' has volume {}", node.slot, node.volume)));
        }

        let mut spec = NodeSpec::new(kind, node.volume);
        spec.tag = node.tag.clone();
        spec.need_anchored = node.need_anchored;
        for linker in &node.linkers {
            let linker = linker.to_spec();
            linker
                .validate()
                .map_err(|reason| invalid(format!("node '{}': {reason}", node.slot)))?;
            spec.linkers.push(linker);
        }
        nodes.push((node.slot.clone(), spec));
    }

    if let Some(appliance) = &data.appliance {
        for slot in appliance.slots() {
            if !slots.contains(slot) {
                return Err(DataLoadError::UnresolvedRef {
                    file: file.to_path_buf(),
                    name: format!("{}.{slot}", data.name),
                    expected_kind: "node slot",
                });
            }
        }
    }

    Ok(EntityPrototype {
        name: data.name.clone(),
        nodes,
        appliance: data.appliance.clone(),
    })
}

pub fn check_duplicate<V>(map: &HashMap<String, V>, name: &str, file: &Path) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
