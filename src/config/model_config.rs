//! Model artifact configuration: directory, manifest and scaler location.

use super::{Lookup, var_or};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "models.toml";
const SCALER_FILE: &str = "scaler.json";

#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub model_dir: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub scaler_path: PathBuf,
}

impl ModelEnvConfig {
    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let model_dir = PathBuf::from(var_or(lookup, "MODEL_DIR", "ml/models"));
        Self::for_dir(
            model_dir,
            lookup("MODEL_MANIFEST").filter(|s| !s.trim().is_empty()).map(PathBuf::from),
            lookup("SCALER_PATH").filter(|s| !s.trim().is_empty()).map(PathBuf::from),
        )
    }

    pub fn for_dir(
        model_dir: PathBuf,
        manifest_path: Option<PathBuf>,
        scaler_path: Option<PathBuf>,
    ) -> Self {
        let scaler_path = scaler_path.unwrap_or_else(|| model_dir.join(SCALER_FILE));
        Self {
            model_dir,
            manifest_path,
            scaler_path,
        }
    }

    /// Point at another model directory. A scaler path that was derived from
    /// the old directory follows the move; an explicit `SCALER_PATH` is kept.
    pub fn with_model_dir(self, model_dir: PathBuf) -> Self {
        let derived = self.scaler_path == self.model_dir.join(SCALER_FILE);
        let scaler_path = if derived { None } else { Some(self.scaler_path) };
        Self::for_dir(model_dir, self.manifest_path, scaler_path)
    }

    /// Resolve the model manifest.
    ///
    /// An explicit `MODEL_MANIFEST` must parse; otherwise `models.toml` in the
    /// model directory is used when present, else the built-in model list.
    pub fn manifest(&self) -> Result<ModelManifest> {
        if let Some(path) = &self.manifest_path {
            return ModelManifest::load(path);
        }

        let implicit = self.model_dir.join(MANIFEST_FILE);
        if implicit.exists() {
            ModelManifest::load(&implicit)
        } else {
            Ok(ModelManifest::default())
        }
    }

    pub fn resolve(&self, spec: &ModelSpec) -> PathBuf {
        if spec.file.is_absolute() {
            spec.file.clone()
        } else {
            self.model_dir.join(&spec.file)
        }
    }
}

/// Ordered list of models to load at startup
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelManifest {
    #[serde(rename = "model", default)]
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub file: PathBuf,
    /// Window length used when the graph's time dimension is symbolic
    #[serde(default)]
    pub window: Option<usize>,
}

impl ModelSpec {
    fn new(name: &str, file: &str) -> Self {
        Self {
            name: name.to_string(),
            file: PathBuf::from(file),
            window: None,
        }
    }
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            models: vec![
                ModelSpec::new("lstm", "lstm_model.onnx"),
                ModelSpec::new("cnn_lstm", "cnn_lstm_model.onnx"),
                ModelSpec::new("transformer", "transformer_model.onnx"),
            ],
        }
    }
}

impl ModelManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model manifest {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse model manifest {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: ModelManifest = toml::from_str(content)?;
        let mut seen = std::collections::HashSet::new();
        for spec in &manifest.models {
            if !seen.insert(spec.name.as_str()) {
                anyhow::bail!("Duplicate model name in manifest: {}", spec.name);
            }
        }
        Ok(manifest)
    }
}
