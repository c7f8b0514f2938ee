//! Model registry.
//!
//! Layout on disk:
//!
//! ```text
//! models/
//!   basic_model/
//!     model.onnx      (or model.json)
//!     metadata.json   {"features": ["X", "Y", ...], ...}
//!   situation_model/
//!   ...
//! ```
//!
//! Built once at startup and shared read-only. A variant whose artifacts are
//! missing or unreadable is logged and skipped.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{XgError, XgResult};
use crate::features::FeatureSchema;
use crate::model::{JsonModel, OnnxModel, XgModel};
use crate::selector::ModelVariant;

pub const ONNX_FILE: &str = "model.onnx";
pub const JSON_MODEL_FILE: &str = "model.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Persisted model metadata. Only `features` is required.
#[derive(Debug, Deserialize)]
struct Metadata {
    features: Vec<String>,
}

/// A loaded variant: classifier plus the feature order it was trained on.
pub struct ModelEntry {
    pub model: Box<dyn XgModel>,
    pub schema: FeatureSchema,
}

/// Immutable map of variant name to loaded model.
#[derive(Default)]
pub struct ModelRegistry {
    dir: PathBuf,
    entries: BTreeMap<String, ModelEntry>,
}

pub type SharedRegistry = Arc<ModelRegistry>;

impl ModelRegistry {
    /// Load every variant under `dir`.
    ///
    /// Fails only when `dir` itself cannot be read.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut models = load_models(dir)?;
        let mut schemas = load_schemas(dir)?;

        let mut entries = BTreeMap::new();
        let names: Vec<String> = models.keys().cloned().collect();
        for name in names {
            let Some(schema) = schemas.remove(&name) else {
                tracing::warn!("Skipping model '{}': no usable {}", name, METADATA_FILE);
                continue;
            };
            if let Some(model) = models.remove(&name) {
                tracing::info!(
                    "Loaded model '{}' ({}, {} features)",
                    name,
                    model.kind(),
                    schema.len()
                );
                entries.insert(name, ModelEntry { model, schema });
            }
        }
        for name in schemas.keys() {
            tracing::warn!("Skipping model '{}': metadata present but no model artifact", name);
        }
        for name in entries.keys() {
            if ModelVariant::from_name(name).is_none() {
                tracing::debug!("Model '{}' is not a known variant and is never selected", name);
            }
        }
        for variant in ModelVariant::ALL {
            if !entries.contains_key(variant.name()) {
                tracing::warn!("Variant '{}' unavailable; requests routed to it will fail", variant);
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Build a registry from already loaded entries.
    #[cfg(test)]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ModelEntry)>,
    {
        Self {
            dir: PathBuf::new(),
            entries: entries.into_iter().collect(),
        }
    }

    /// Look up a variant by name.
    pub fn get(&self, name: &str) -> XgResult<&ModelEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| XgError::ModelNotAvailable(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Create a shared registry instance.
pub fn create_shared_registry<P: AsRef<Path>>(dir: P) -> Result<SharedRegistry> {
    Ok(Arc::new(ModelRegistry::load(dir)?))
}

/// Immediate subdirectories of `dir`, sorted by name.
fn variant_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let read = fs::read_dir(dir)
        .with_context(|| format!("Models directory '{}' not found", dir.display()))?;

    let mut dirs = Vec::new();
    for entry in read {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            dirs.push((name.to_string(), path.clone()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Load the classifier of every variant.
pub fn load_models(dir: &Path) -> Result<BTreeMap<String, Box<dyn XgModel>>> {
    let mut models = BTreeMap::new();

    for (name, path) in variant_dirs(dir)? {
        match load_model(&path) {
            Ok(Some(model)) => {
                models.insert(name, model);
            }
            Ok(None) => tracing::debug!("No model artifact in {}", path.display()),
            Err(e) => tracing::warn!("Error loading model from {}: {:#}", path.display(), e),
        }
    }

    Ok(models)
}

/// Load the feature schema of every variant.
pub fn load_schemas(dir: &Path) -> Result<BTreeMap<String, FeatureSchema>> {
    let mut schemas = BTreeMap::new();

    for (name, path) in variant_dirs(dir)? {
        let metadata_path = path.join(METADATA_FILE);
        if !metadata_path.exists() {
            continue;
        }
        match load_schema(&metadata_path) {
            Ok(schema) => {
                schemas.insert(name, schema);
            }
            Err(e) => tracing::warn!(
                "Error loading metadata from {}: {:#}",
                metadata_path.display(),
                e
            ),
        }
    }

    Ok(schemas)
}

fn load_model(variant_dir: &Path) -> Result<Option<Box<dyn XgModel>>> {
    let onnx_path = variant_dir.join(ONNX_FILE);
    if onnx_path.exists() {
        return Ok(Some(Box::new(OnnxModel::load(&onnx_path)?)));
    }

    let json_path = variant_dir.join(JSON_MODEL_FILE);
    if json_path.exists() {
        return Ok(Some(JsonModel::from_file(&json_path)?.into_model()));
    }

    Ok(None)
}

fn load_schema(metadata_path: &Path) -> Result<FeatureSchema> {
    let content = fs::read_to_string(metadata_path)?;
    let metadata: Metadata = serde_json::from_str(&content).context("Invalid metadata JSON")?;
    Ok(FeatureSchema::new(metadata.features)?)
}
