use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::glob;

use crate::error::{CellqlError, Result};
use crate::metadata::MetadataProvider;
use crate::models::{Column, Model};

/// In-memory metadata store keyed by model id, with every column indexed by id.
#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    pub models: HashMap<String, Model>,
    pub columns: HashMap<String, Column>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: Vec<Model>) -> Result<Self> {
        let mut registry = MetadataRegistry::new();
        for model in models {
            registry.insert_model(model)?;
        }
        Ok(registry)
    }

    /// Load every `*.yml` / `*.yaml` file under `<root>/models`.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let mut registry = MetadataRegistry::new();
        registry.load_models(root.as_ref().join("models"))?;
        tracing::debug!(
            models = registry.models.len(),
            columns = registry.columns.len(),
            "loaded metadata registry"
        );
        Ok(registry)
    }

    pub fn insert_model(&mut self, model: Model) -> Result<()> {
        if self.models.contains_key(&model.id) {
            return Err(CellqlError::Metadata(format!(
                "duplicate model id {}",
                model.id
            )));
        }
        for column in &model.columns {
            if let Some(existing) = self.columns.get(&column.id) {
                return Err(CellqlError::Metadata(format!(
                    "column id {} declared by both {} and {}",
                    column.id, existing.model_id, model.id
                )));
            }
            self.columns.insert(column.id.clone(), column.clone());
        }
        self.models.insert(model.id.clone(), model);
        Ok(())
    }

    pub fn get_model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn get_column(&self, id: &str) -> Option<&Column> {
        self.columns.get(id)
    }

    fn load_models(&mut self, dir: PathBuf) -> Result<()> {
        if !dir.exists() {
            return Err(CellqlError::Validation(format!(
                "models directory not found: {}",
                dir.display()
            )));
        }
        let mut paths = Vec::new();
        for pattern in ["*.yml", "*.yaml"] {
            for entry in glob(&format!("{}/{pattern}", dir.display()))
                .map_err(|e| CellqlError::Other(e.into()))?
                .flatten()
            {
                paths.push(entry);
            }
        }
        paths.sort();
        for path in paths {
            self.load_model_file(&path)?;
        }
        Ok(())
    }

    fn load_model_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let model: Model = serde_yaml::from_str(&contents)?;
        tracing::trace!(model = %model.id, path = %path.display(), "loaded model file");
        self.insert_model(model)
    }
}

#[async_trait]
impl MetadataProvider for MetadataRegistry {
    async fn column(&self, id: &str) -> Result<Column> {
        self.get_column(id)
            .cloned()
            .ok_or_else(|| CellqlError::unknown_column(id))
    }

    async fn model(&self, id: &str) -> Result<Model> {
        self.get_model(id)
            .cloned()
            .ok_or_else(|| CellqlError::unknown_model(id))
    }
}
