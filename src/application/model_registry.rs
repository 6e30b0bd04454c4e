use crate::config::{ModelEnvConfig, ModelManifest};
use crate::domain::errors::PipelineError;
use crate::domain::ports::ForecastModel;
use crate::infrastructure::OnnxModel;
use std::sync::Arc;
use tracing::{error, info};

/// Load state of one named model
#[derive(Clone)]
pub enum ModelSlot {
    Loaded(Arc<dyn ForecastModel>),
    Unavailable { reason: String },
}

impl std::fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSlot::Loaded(model) => f
                .debug_struct("Loaded")
                .field("name", &model.name())
                .field("input_window", &model.input_window())
                .finish(),
            ModelSlot::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Immutable set of models built once at startup.
///
/// Entries keep manifest order. A model that failed to load stays listed as
/// unavailable, so lookups report it as not found instead of failing later.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: Vec<(String, ModelSlot)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every manifest entry through ONNX Runtime; failures are logged and recorded.
    pub fn load(config: &ModelEnvConfig, manifest: &ModelManifest) -> Self {
        let mut registry = Self::new();
        for spec in &manifest.models {
            let path = config.resolve(spec);
            match OnnxModel::load(spec.name.clone(), &path, spec.window) {
                Ok(model) => {
                    registry = registry.with_model(spec.name.clone(), Arc::new(model));
                }
                Err(e) => {
                    error!("Error loading model '{}': {}", spec.name, e);
                    registry = registry.with_unavailable(spec.name.clone(), e.to_string());
                }
            }
        }

        info!("Models loaded: {:?}", registry.loaded_names());
        registry
    }

    pub fn with_model(self, name: impl Into<String>, model: Arc<dyn ForecastModel>) -> Self {
        self.with_slot(name.into(), ModelSlot::Loaded(model))
    }

    pub fn with_unavailable(self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.with_slot(
            name.into(),
            ModelSlot::Unavailable {
                reason: reason.into(),
            },
        )
    }

    fn with_slot(mut self, name: String, slot: ModelSlot) -> Self {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = slot,
            None => self.entries.push((name, slot)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ForecastModel>, PipelineError> {
        match self.entries.iter().find(|(n, _)| n == name) {
            Some((_, ModelSlot::Loaded(model))) => Ok(model.clone()),
            _ => Err(PipelineError::ModelNotFound(name.to_string())),
        }
    }

    pub fn contains_loaded(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Names of successfully loaded models, in manifest order
    pub fn loaded_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, slot)| matches!(slot, ModelSlot::Loaded(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn unavailable(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, slot)| match slot {
                ModelSlot::Unavailable { reason } => Some((name.as_str(), reason.as_str())),
                ModelSlot::Loaded(_) => None,
            })
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &ModelSlot)> {
        self.entries.iter().map(|(name, slot)| (name.as_str(), slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::StepModel;
    use std::path::PathBuf;

    #[test]
    fn test_failed_loads_are_never_listed() {
        let config = ModelEnvConfig::for_dir(PathBuf::from("/nonexistent/models"), None, None);
        let registry = ModelRegistry::load(&config, &ModelManifest::default());

        assert!(registry.loaded_names().is_empty());
        assert_eq!(registry.unavailable().len(), 3);
        assert!(matches!(
            registry.get("lstm"),
            Err(PipelineError::ModelNotFound(name)) if name == "lstm"
        ));
    }

    #[test]
    fn test_loaded_names_keep_insertion_order() {
        let registry = ModelRegistry::new()
            .with_model("transformer", Arc::new(StepModel::new("transformer", None, 1.0)))
            .with_unavailable("cnn_lstm", "corrupt file")
            .with_model("lstm", Arc::new(StepModel::new("lstm", Some(3), 1.0)));

        assert_eq!(registry.loaded_names(), vec!["transformer", "lstm"]);
        assert_eq!(registry.unavailable(), vec![("cnn_lstm", "corrupt file")]);
        assert!(registry.contains_loaded("lstm"));
        assert!(!registry.contains_loaded("cnn_lstm"));
        assert!(!registry.contains_loaded("gru"));
    }

    #[test]
    fn test_replacing_an_entry_keeps_position() {
        let registry = ModelRegistry::new()
            .with_unavailable("lstm", "missing")
            .with_model("cnn_lstm", Arc::new(StepModel::new("cnn_lstm", None, 1.0)))
            .with_model("lstm", Arc::new(StepModel::new("lstm", None, 1.0)));

        assert_eq!(registry.loaded_names(), vec!["lstm", "cnn_lstm"]);
        assert_eq!(registry.get("lstm").unwrap().name(), "lstm");
    }
}
