//! Scheme detail catalog
//!
//! Read-only keyed lookup of full scheme details. Production reads the SQLite
//! `schemes` table built by `setup-db`; tests use the in-memory store.

pub mod import;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::within;
use crate::models::SchemeDetail;
use crate::Result;

pub use import::{import_csv, ImportReport};

#[async_trait]
pub trait DetailStore: Send + Sync {
    /// `Ok(None)` when no row carries this identifier
    async fn get(&self, scheme_id: &str) -> Result<Option<SchemeDetail>>;
}

/// Bounded lookup; errors and timeouts are logged and read as "not found"
pub async fn fetch_detail(
    store: &dyn DetailStore,
    scheme_id: &str,
    limit: Duration,
) -> Option<SchemeDetail> {
    match within("detail lookup", limit, store.get(scheme_id)).await {
        Ok(Some(detail)) => Some(detail),
        Ok(None) => {
            warn!(scheme_id, "No catalog entry for scheme");
            None
        }
        Err(e) => {
            error!(scheme_id, "Detail lookup failed: {}", e);
            None
        }
    }
}

const DETAIL_QUERY: &str = r#"
    SELECT scheme_name, detailed_description, eligibility_criteria, application_process, documents_required
    FROM schemes
    WHERE scheme_id = ?
"#;

pub struct SqliteDetailStore {
    pool: SqlitePool,
}

impl SqliteDetailStore {
    /// Open `url` (e.g. `sqlite://new_schemes.db`). `create` makes the file if absent.
    pub async fn connect(url: &str, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(create);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(url, "Connected to scheme catalog");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DetailStore for SqliteDetailStore {
    async fn get(&self, scheme_id: &str) -> Result<Option<SchemeDetail>> {
        debug!(scheme_id, "Fetching scheme details");
        let row = sqlx::query(DETAIL_QUERY)
            .bind(scheme_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(SchemeDetail::from_columns(
            row.try_get(0)?,
            row.try_get(1)?,
            row.try_get(2)?,
            row.try_get(3)?,
            row.try_get(4)?,
        )))
    }
}

/// HashMap-backed store that records every lookup. Development & testing.
#[derive(Default)]
pub struct InMemoryDetailStore {
    details: HashMap<String, SchemeDetail>,
    lookups: Mutex<Vec<String>>,
    failing: bool,
}

impl InMemoryDetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every lookup errors
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn with_detail(mut self, scheme_id: impl Into<String>, detail: SchemeDetail) -> Self {
        self.details.insert(scheme_id.into(), detail);
        self
    }

    pub fn insert(&mut self, scheme_id: impl Into<String>, detail: SchemeDetail) {
        self.details.insert(scheme_id.into(), detail);
    }

    /// Identifiers looked up so far, in call order
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DetailStore for InMemoryDetailStore {
    async fn get(&self, scheme_id: &str) -> Result<Option<SchemeDetail>> {
        if let Ok(mut l) = self.lookups.lock() {
            l.push(scheme_id.to_string());
        }
        if self.failing {
            return Err(crate::error::SchemeError::Database(
                "catalog unavailable".to_string(),
            ));
        }
        Ok(self.details.get(scheme_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    async fn memory_store() -> SqliteDetailStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE schemes (
              scheme_id TEXT, scheme_name TEXT, detailed_description TEXT,
              eligibility_criteria TEXT, application_process TEXT, documents_required TEXT
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO schemes VALUES ('TS-1', 'Rythu Bandhu', 'Investment support', '', NULL, 'Pattadar passbook')")
            .execute(&pool)
            .await
            .unwrap();
        SqliteDetailStore::from_pool(pool)
    }

    #[tokio::test]
    async fn test_sqlite_lookup_fills_placeholders() {
        let store = memory_store().await;
        let detail = store.get("TS-1").await.unwrap().unwrap();
        assert_eq!(detail.scheme_name, "Rythu Bandhu");
        assert_eq!(detail.eligibility_criteria, NOT_AVAILABLE);
        assert_eq!(detail.application_process, NOT_AVAILABLE);
        assert_eq!(detail.documents_required, "Pattadar passbook");

        assert!(store.get("TS-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_detail_reads_errors_as_missing() {
        let failing = InMemoryDetailStore::failing();
        assert!(fetch_detail(&failing, "X", Duration::from_secs(1)).await.is_none());
        assert_eq!(failing.lookups(), vec!["X".to_string()]);

        let store = InMemoryDetailStore::new().with_detail(
            "KL-1",
            SchemeDetail::from_columns(Some("Karunya".into()), None, None, None, None),
        );
        let detail = fetch_detail(&store, "KL-1", Duration::from_secs(1)).await.unwrap();
        assert_eq!(detail.scheme_name, "Karunya");
    }
}
