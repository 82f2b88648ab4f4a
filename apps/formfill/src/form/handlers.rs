use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::form::classifier::classify;
use crate::form::models::{FieldDescriptor, FieldMetadata};

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub fields: Vec<FieldMetadata>,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub fields: Vec<FieldDescriptor>,
}

/// POST /api/v1/fields/classify
pub async fn handle_classify(
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, AppError> {
    if req.fields.iter().any(|f| f.id.trim().is_empty()) {
        return Err(AppError::Validation("every field needs an id".to_string()));
    }
    Ok(Json(ClassifyResponse {
        fields: req.fields.iter().map(classify).collect(),
    }))
}
