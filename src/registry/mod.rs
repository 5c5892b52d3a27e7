//! Model registry
//!
//! Maps caller-facing model ids to upstream model ids and declares what each model can do. The
//! table is configuration data loaded once at startup and never mutated afterwards.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::error::{GatewayError, GatewayResult};

/// Catalog compiled into the binary, used when no `MODELS_FILE` is configured
const DEFAULT_CATALOG: &str = include_str!("../../config/models.json");

fn default_owner() -> String {
    "github-copilot".to_string()
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelDescriptor {
    /// Identifier callers send in `model`
    #[serde(rename = "id")]
    pub public_id: String,
    /// Identifier sent to the upstream
    pub upstream_id: String,
    #[serde(default = "default_owner")]
    pub owned_by: String,
    /// Whether the model draws from the account's premium request quota
    #[serde(rename = "premium", default)]
    pub is_premium: bool,
    #[serde(default)]
    pub supports_tools: bool,
    #[serde(default)]
    pub supports_vision: bool,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelTable {
    models: Vec<ModelDescriptor>,
}

/// Read-only model table
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    /// Unix timestamp reported as `created` in model listings
    loaded_at: i64,
}

impl ModelRegistry {
    /// Parse and validate a model table
    pub fn from_json(json: &str) -> Result<Self> {
        let table: ModelTable = serde_json::from_str(json).context("Invalid model table")?;
        Self::from_models(table.models)
    }

    /// Build a registry from already-parsed descriptors
    pub fn from_models(models: Vec<ModelDescriptor>) -> Result<Self> {
        if models.is_empty() {
            bail!("Model table is empty");
        }

        let mut seen = HashSet::new();
        for model in &models {
            if model.public_id.trim().is_empty() || model.upstream_id.trim().is_empty() {
                bail!("Model table entry has an empty id");
            }
            if !seen.insert(model.public_id.as_str()) {
                bail!("Duplicate model id '{}'", model.public_id);
            }
            if model.max_output_tokens == 0 {
                bail!("Model '{}' has max_output_tokens = 0", model.public_id);
            }
        }

        Ok(Self {
            models,
            loaded_at: chrono::Utc::now().timestamp(),
        })
    }

    /// The built-in catalog
    pub fn default_catalog() -> Result<Self> {
        Self::from_json(DEFAULT_CATALOG)
    }

    /// Load from `path` if given, otherwise the built-in catalog
    pub fn load(path: Option<&str>) -> Result<Self> {
        let registry = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(Path::new(path))
                    .with_context(|| format!("Failed to read model table {}", path))?;
                Self::from_json(&raw).with_context(|| format!("Failed to load {}", path))?
            }
            None => Self::default_catalog()?,
        };

        info!(
            models = registry.models.len(),
            source = path.unwrap_or("built-in"),
            "Model registry loaded"
        );
        Ok(registry)
    }

    /// Look up a caller-facing model id
    pub fn resolve(&self, public_id: &str) -> GatewayResult<&ModelDescriptor> {
        self.get(public_id)
            .ok_or_else(|| GatewayError::UnknownModel(public_id.to_string()))
    }

    pub fn get(&self, public_id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.public_id == public_id)
    }

    /// All models, in table order
    pub fn list_models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn loaded_at(&self) -> i64 {
        self.loaded_at
    }
}
