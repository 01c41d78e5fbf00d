pub mod admin;
pub mod agent;
pub mod auth;
pub mod config;
pub mod players;
pub mod transactions;
pub mod ws;

use crate::error::AppError;
use crate::health::check_health;
use crate::ports::UploadFile;
use crate::validation::ValidationError;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health = check_health(&state.health).await;
    let status_code = if health.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status_code, Json(health))
}

pub(crate) fn validated<T>(result: Result<T, Vec<ValidationError>>) -> Result<T, AppError> {
    result.map_err(AppError::Validation)
}

pub(crate) fn path_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::validation("id", "must be a positive integer"))
}

pub(crate) fn path_uuid(field: &'static str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(field, "must be a valid UUID"))
}

/// Text parts of a multipart body plus the single file part named `file_field`.
pub(crate) struct MultipartForm {
    pub fields: Map<String, Value>,
    pub file: Option<UploadFile>,
}

pub(crate) async fn read_multipart(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm {
        fields: Map::new(),
        file: None,
    };

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if name == file_field {
            let mime_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let original_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            // Browsers send an empty part when no file was picked.
            if bytes.is_empty() && original_name.is_empty() {
                continue;
            }
            form.file = Some(UploadFile {
                bytes: bytes.to_vec(),
                mime_type,
                original_name,
            });
        } else {
            let text = field.text().await?;
            form.fields.insert(name, Value::String(text));
        }
    }

    Ok(form)
}

pub(crate) fn from_fields<T: serde::de::DeserializeOwned>(
    fields: Map<String, Value>,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| AppError::validation("body", e.to_string()))
}
