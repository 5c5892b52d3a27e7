//! Models endpoint
//!
//! Lists the models in the registry using OpenAI's model object shape.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{error::GatewayResult, registry::ModelDescriptor, AppState};

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl Model {
    fn from_descriptor(descriptor: &ModelDescriptor, created: i64) -> Self {
        Self {
            id: descriptor.public_id.clone(),
            object: "model".to_string(),
            created,
            owned_by: descriptor.owned_by.clone(),
        }
    }
}

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub object: String,
    pub data: Vec<Model>,
}

/// List available models, in registry order
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let created = state.registry.loaded_at();
    let data = state
        .registry
        .list_models()
        .iter()
        .map(|descriptor| Model::from_descriptor(descriptor, created))
        .collect();

    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}

/// Describe a single model
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(model_id): Path<String>,
) -> GatewayResult<Json<Model>> {
    let descriptor = state.registry.resolve(&model_id)?;
    Ok(Json(Model::from_descriptor(descriptor, state.registry.loaded_at())))
}
