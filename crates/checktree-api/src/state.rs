use std::sync::Arc;

use checktree_core::{ConfigManager, Result};
use checktree_store::TreeStore;
use tracing::info;

use crate::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub store: TreeStore,
    pub config: Arc<ConfigManager>,
}

impl AppState {
    /// Opens the configured database and seeds it when configured to and
    /// still empty.
    pub async fn new(config: Arc<ConfigManager>) -> Result<Self> {
        let database = config.settings().database.clone();
        let store = tokio::task::spawn_blocking(move || -> Result<TreeStore> {
            let store = TreeStore::open(&database.path)?;
            if let Some(seed) = &database.seed_path {
                if let Some(trees) = store.seed_if_empty(seed)? {
                    info!(seed = %seed, trees = trees.len(), "seeded empty database");
                }
            }
            Ok(store)
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;

        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: TreeStore, config: Arc<ConfigManager>) -> Self {
        Self { store, config }
    }

    /// Runs a store call on the blocking pool.
    pub async fn blocking<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&TreeStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
