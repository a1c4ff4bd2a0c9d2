//! Backend selection.

use std::path::PathBuf;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{JsonStore, Result, Store};

/// Where goals are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for the local JSON store
    pub data_dir: PathBuf,

    /// Database URL; when unset or unreachable the local store is used
    pub database_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".goalsync"),
            database_url: None,
        }
    }
}

/// Open the configured backend, falling back to the local JSON store when
/// the database cannot be reached.
///
/// Only a failure to create the local store itself is returned as an error.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    if let Some(url) = &config.database_url {
        match open_database(url).await {
            Ok(store) => {
                info!(backend = store.backend_name(), "using database store");
                return Ok(store);
            }
            Err(e) => {
                warn!(error = %e, "database store unavailable, falling back to local store");
            }
        }
    }

    let store = JsonStore::new(&config.data_dir).await?;
    info!(dir = %config.data_dir.display(), "using local json store");
    Ok(Arc::new(store))
}

#[cfg(feature = "sqlite")]
async fn open_database(url: &str) -> Result<Arc<dyn Store>> {
    let store = super::SqliteStore::new(url).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_database(url: &str) -> Result<Arc<dyn Store>> {
    Err(super::StoreError::Unavailable(format!(
        "no database driver compiled in for {url}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_opens_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            database_url: None,
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "json");
    }

    #[tokio::test]
    async fn test_unreachable_database_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            database_url: Some("postgres://nowhere.invalid/goals".to_string()),
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.backend_name(), "json");
    }
}
