// Comment endpoints
//
// Comments hang off articles and posts through (parent_kind, parent_id).
// Intake is public and always lands in the pending state; moderation moves
// a comment between states explicitly.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::{json, Value};
use sqlx::Row;
use tracing::info;

use crate::api;
use crate::error::ApiError;
use crate::handlers::entities::{parse_id, parse_list_params};
use crate::moderation::CommentStatus;
use crate::repository::command::WriteRequest;
use crate::repository::EntityRepository;
use crate::schema::registry::{self, COMMENTABLE_ENTITIES, COMMENTS};
use crate::state::AppState;

/// GET /api/comments - list with the same search/filter/paging machinery as
/// the entities; parent_kind, parent_id and status act as filters
pub async fn list(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<api::ListResponse>, ApiError> {
    let params = parse_list_params(&COMMENTS, &raw, &state.config.pagination)?;
    let (data, pagination) = EntityRepository::new(&COMMENTS, &state.pool, &state.store)
        .list(&params)
        .await?;
    Ok(api::list_response(data, pagination))
}

/// POST /api/comments - public intake, always created pending
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let Value::Object(mut fields) = body else {
        return Err(ApiError::validation("request body must be a JSON object"));
    };

    let parent_kind = match fields.get("parent_kind").and_then(Value::as_str) {
        Some(kind) if !kind.trim().is_empty() => kind.trim().to_string(),
        _ => return Err(ApiError::validation("field 'parent_kind' is required")),
    };
    if !COMMENTABLE_ENTITIES.contains(&parent_kind.as_str()) {
        return Err(ApiError::validation(format!(
            "comments are not enabled for '{}'",
            parent_kind
        )));
    }
    let parent = registry::lookup(&parent_kind).ok_or_else(|| {
        ApiError::validation(format!("comments are not enabled for '{}'", parent_kind))
    })?;

    let parent_id = match fields.get("parent_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::validation("field 'parent_id' must be an integer id"))?;

    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM \"{}\" WHERE \"id\" = $1) AS found",
        parent.table
    );
    let found: bool = sqlx::query(&sql)
        .bind(parent_id)
        .fetch_one(&state.pool)
        .await?
        .try_get("found")?;
    if !found {
        return Err(ApiError::not_found(format!(
            "record {} not found in {}",
            parent_id, parent.table
        )));
    }

    // clients do not pick their own moderation state
    fields.insert("parent_kind".to_string(), json!(parent_kind));
    fields.insert("parent_id".to_string(), json!(parent_id));
    fields.insert(
        "status".to_string(),
        json!(CommentStatus::default().as_str()),
    );

    let record = EntityRepository::new(&COMMENTS, &state.pool, &state.store)
        .create(WriteRequest::from_fields(fields))
        .await?;
    Ok(Json(record))
}

/// PUT /api/comments/:id/status - move a comment between moderation states
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let raw = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::validation("field 'status' is required"))?;
    let status = CommentStatus::parse(raw)?;

    let affected =
        sqlx::query("UPDATE \"comments\" SET \"status\" = $1, \"updated_at\" = now() WHERE \"id\" = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&state.pool)
            .await?
            .rows_affected();
    if affected == 0 {
        return Err(ApiError::not_found(format!(
            "record {} not found in comments",
            id
        )));
    }
    info!(id, status = %status, "moderated comment");

    let record = EntityRepository::new(&COMMENTS, &state.pool, &state.store)
        .get_by_id(id)
        .await?;
    Ok(Json(record))
}

/// DELETE /api/comments/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let affected = sqlx::query("DELETE FROM \"comments\" WHERE \"id\" = $1")
        .bind(id)
        .execute(&state.pool)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(ApiError::not_found(format!(
            "record {} not found in comments",
            id
        )));
    }
    info!(id, "deleted comment");
    Ok(api::deleted())
}
