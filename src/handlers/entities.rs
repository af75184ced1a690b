// Entity CRUD endpoints
//
// One set of handlers serves every registered entity; the first path segment
// picks the descriptor. Unknown segments 404 before any SQL runs.

use std::collections::HashMap;

use axum::extract::{Path, Query, Request, State};
use axum::Json;
use serde_json::Value;

use crate::api;
use crate::config::PaginationConfig;
use crate::error::ApiError;
use crate::handlers::payload::{self, UploadTarget};
use crate::query::ListParams;
use crate::repository::EntityRepository;
use crate::schema::{registry, EntityDescriptor, SortOrder};
use crate::state::AppState;

fn resolve(entity: &str) -> Result<&'static EntityDescriptor, ApiError> {
    registry::lookup(entity)
        .ok_or_else(|| ApiError::not_found(format!("unknown resource '{}'", entity)))
}

pub(super) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::validation(format!("invalid id '{}'", raw)))
}

/// Query-string intake for list reads. Declared filter columns are coerced
/// through their column spec so ids bind as integers; anything undeclared is
/// ignored.
pub(super) fn parse_list_params(
    desc: &EntityDescriptor,
    raw: &HashMap<String, String>,
    pagination: &PaginationConfig,
) -> Result<ListParams, ApiError> {
    let mut params = ListParams {
        page_index: 1,
        page_size: pagination.default_page_size,
        ..ListParams::default()
    };

    for (key, value) in raw {
        match key.as_str() {
            "q" => params.query = Some(value.clone()),
            "pageIndex" => params.page_index = parse_positive(key, value)?,
            "pageSize" => {
                params.page_size = parse_positive(key, value)?.min(pagination.max_page_size)
            }
            "sortKey" => params.sort_key = Some(value.clone()),
            "sortOrder" => {
                params.sort_order = Some(SortOrder::parse(value).ok_or_else(|| {
                    ApiError::validation("sortOrder must be 'asc' or 'desc'")
                })?)
            }
            _ if desc.has_filter(key) => {
                let Some(column) = desc.column(key) else {
                    continue;
                };
                let coerced = column
                    .coerce(Value::String(value.clone()))
                    .map_err(ApiError::validation)?;
                params.filters.push((key.clone(), coerced));
            }
            _ => {}
        }
    }
    Ok(params)
}

fn parse_positive(key: &str, value: &str) -> Result<i64, ApiError> {
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ApiError::validation(format!(
            "{} must be a positive integer",
            key
        ))),
    }
}

/// GET /api/:entity - list with search, filters and pagination
pub async fn list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<api::ListResponse>, ApiError> {
    let desc = resolve(&entity)?;
    let params = parse_list_params(desc, &raw, &state.config.pagination)?;
    let (data, pagination) = EntityRepository::new(desc, &state.pool, &state.store)
        .list(&params)
        .await?;
    Ok(api::list_response(data, pagination))
}

/// GET /api/:entity/:id - single record with joins and dependents
pub async fn get(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let id = parse_id(&id)?;
    let record = EntityRepository::new(desc, &state.pool, &state.store)
        .get_by_id(id)
        .await?;
    Ok(Json(record))
}

/// GET /api/:entity/slug/:slug - single record addressed by slug
pub async fn get_by_slug(
    State(state): State<AppState>,
    Path((entity, slug)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let record = EntityRepository::new(desc, &state.pool, &state.store)
        .get_by_slug(&slug)
        .await?;
    Ok(Json(record))
}

/// POST /api/:entity - create from a JSON or multipart body
pub async fn create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let req = payload::write_request(&state.store, UploadTarget::Entity(desc), request).await?;
    let record = EntityRepository::new(desc, &state.pool, &state.store)
        .create(req)
        .await?;
    Ok(Json(record))
}

/// PUT /api/:entity/:id - partial update; absent fields stay untouched
pub async fn update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    request: Request,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let id = parse_id(&id)?;
    let req = payload::write_request(&state.store, UploadTarget::Entity(desc), request).await?;
    let record = EntityRepository::new(desc, &state.pool, &state.store)
        .update(id, req)
        .await?;
    Ok(Json(record))
}

/// DELETE /api/:entity/:id - delete with referential guards and file cleanup
pub async fn delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let id = parse_id(&id)?;
    EntityRepository::new(desc, &state.pool, &state.store)
        .delete(id)
        .await?;
    Ok(api::deleted())
}

/// DELETE /api/:entity/:id/items/:item_id - remove one dependent row
pub async fn delete_item(
    State(state): State<AppState>,
    Path((entity, id, item_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let desc = resolve(&entity)?;
    let id = parse_id(&id)?;
    let item_id = parse_id(&item_id)?;
    EntityRepository::new(desc, &state.pool, &state.store)
        .delete_dependent_item(id, item_id)
        .await?;
    Ok(api::deleted())
}
