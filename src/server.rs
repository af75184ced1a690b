// Router assembly and server lifecycle

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::{comments, entities, settings};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    // multipart envelope overhead on top of the per-file cap
    let body_limit = state.config.uploads.max_file_size_bytes.saturating_mul(2);
    let uploads_dir = state.store.root().to_path_buf();

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(comment_routes())
        .merge(settings_routes())
        .merge(entity_routes())
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn entity_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/:entity",
            get(entities::list).post(entities::create),
        )
        .route(
            "/api/:entity/:id",
            get(entities::get)
                .put(entities::update)
                .delete(entities::delete),
        )
        .route("/api/:entity/slug/:slug", get(entities::get_by_slug))
        .route(
            "/api/:entity/:id/items/:item_id",
            delete(entities::delete_item),
        )
}

fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/comments",
            get(comments::list).post(comments::create),
        )
        .route("/api/comments/:id", delete(comments::delete))
        .route("/api/comments/:id/status", put(comments::set_status))
}

fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/api/settings",
        get(settings::get).put(settings::put),
    )
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("listening on http://{}", bind_addr);

    let pool = state.pool.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let in-flight queries finish before the process exits
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "kabar-api",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "entities": "/api/:entity[/:id] (articles, pages, posts, categories, tags, menus, banners, links, galleries, users)",
            "slugs": "/api/:entity/slug/:slug",
            "comments": "/api/comments[/:id][/status]",
            "settings": "/api/settings",
            "uploads": "/uploads/*",
            "health": "/health"
        }
    }))
}

async fn health(State(state): State<AppState>) -> (axum::http::StatusCode, Json<Value>) {
    let now = chrono::Utc::now();
    match crate::database::health_check(&state.pool).await {
        Ok(()) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "timestamp": now,
                "database_error": e.to_string()
            })),
        ),
    }
}
