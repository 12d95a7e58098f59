use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::services::SyncOptions;
use crate::upstream::CatalogClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub catalog: Arc<dyn CatalogClient>,
    pub options: SyncOptions,
    /// Held by whichever refresh or orphan repair is currently writing.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db: SqlitePool, catalog: Arc<dyn CatalogClient>, options: SyncOptions) -> Self {
        Self {
            db,
            catalog,
            options,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
