//! Storage adapters for weather samples, reports and one-time codes
//!
//! Two backends implement the `wxr_core` store traits: [`DbClient`] on
//! MySQL and [`MemoryStore`] in process. [`Stores::open`] picks one from a
//! database URL.

pub mod client;
pub mod memory;
pub mod queries;
pub mod schema;

pub use client::*;
pub use memory::*;
pub use schema::*;

use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use wxr_core::{CodeStore, ReportStore, SampleStore, StoreError};

/// URL selecting the in-process store
pub const MEMORY_URL: &str = "memory://";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(e) => match &e {
                sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Conflict(db.message().to_string())
                }
                _ => StoreError::Query(e.to_string()),
            },
            DbError::Config(msg) => StoreError::Unavailable(msg),
        }
    }
}

/// The three store handles shared across the service
#[derive(Clone)]
pub struct Stores {
    pub samples: Arc<dyn SampleStore>,
    pub reports: Arc<dyn ReportStore>,
    pub codes: Arc<dyn CodeStore>,
    client: Option<DbClient>,
}

impl Stores {
    /// Open the backend named by `database_url`.
    ///
    /// `memory://` gives a fresh in-process store; `mysql://` connects,
    /// pings and ensures the schema.
    pub async fn open(database_url: &str) -> DbResult<Self> {
        if database_url == MEMORY_URL {
            info!("Using in-memory store");
            return Ok(Self::memory(MemoryStore::new()));
        }

        if !database_url.starts_with("mysql://") {
            return Err(DbError::Config(format!(
                "unsupported database url scheme: {database_url}"
            )));
        }

        let client = DbClient::new(database_url).await?;
        client.ping().await?;
        client.ensure_schema().await?;
        info!("Connected to MySQL store");
        Ok(Self::mysql(client))
    }

    pub fn memory(store: MemoryStore) -> Self {
        Self {
            samples: Arc::new(store.clone()),
            reports: Arc::new(store.clone()),
            codes: Arc::new(store),
            client: None,
        }
    }

    pub fn mysql(client: DbClient) -> Self {
        Self {
            samples: Arc::new(client.clone()),
            reports: Arc::new(client.clone()),
            codes: Arc::new(client.clone()),
            client: Some(client),
        }
    }

    /// Release backend connections; the memory store has none
    pub async fn close(&self) {
        if let Some(client) = &self.client {
            client.close().await;
            info!("MySQL pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        let err: StoreError = DbError::Sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err: StoreError = DbError::Sqlx(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, StoreError::Query(_)));
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_scheme() {
        let result = Stores::open("postgres://localhost/weather").await;
        assert!(matches!(result, Err(DbError::Config(_))));
    }

    #[tokio::test]
    async fn test_open_memory() {
        let stores = Stores::open(MEMORY_URL).await.unwrap();
        let range = wxr_core::TimeRange::new(chrono::Utc::now(), chrono::Utc::now());
        assert_eq!(stores.samples.count_samples(&range).await.unwrap(), 0);
        stores.close().await;
    }
}
