use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::storage::FileAttachmentStore;

/// Shared handler state. Everything in here is cheap to clone; axum clones
/// it once per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub store: FileAttachmentStore,
}

impl AppState {
    pub fn new(config: AppConfig, pool: PgPool) -> Self {
        let store = FileAttachmentStore::from_config(&config.uploads);
        Self {
            config: Arc::new(config),
            pool,
            store,
        }
    }
}
