// Settings endpoints

use axum::extract::{Request, State};
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::payload::{self, UploadTarget};
use crate::settings::SettingsService;
use crate::state::AppState;

/// GET /api/settings - every setting grouped for display
pub async fn get(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let settings = SettingsService::new(&state.pool, &state.store)
        .read_all()
        .await?;
    Ok(Json(settings))
}

/// PUT /api/settings - partial update; multipart bodies may carry image files
pub async fn put(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let req = payload::write_request(&state.store, UploadTarget::Settings, request).await?;
    let settings = SettingsService::new(&state.pool, &state.store)
        .update(req)
        .await?;
    Ok(Json(settings))
}
