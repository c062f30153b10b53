//! # SQLite Storage
//!
//! Durable implementation of both storage traits over a single SQLite
//! database file.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE integrations (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT NOT NULL,
//!     platform TEXT NOT NULL,          -- google_ads | facebook | custom
//!     webhook_token TEXT NOT NULL UNIQUE,
//!     status TEXT NOT NULL,            -- active | inactive
//!     leads_received INTEGER NOT NULL DEFAULT 0,
//!     last_used_at TEXT,
//!     created_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE leads (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     phone TEXT NOT NULL,
//!     source TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     assigned_to INTEGER,
//!     created_at TEXT NOT NULL
//! );
//! ```
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that they sort lexically.
//!
//! Access is serialized through one `Mutex<Connection>`; every call runs on
//! the blocking thread pool.

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::directory::{
    Integration, IntegrationDirectory, IntegrationStatus, NewIntegration, StorageError,
};
use crate::leads::{Lead, LeadStatus, LeadStore, NewLead};
use crate::{IntegrationId, LeadId, Timestamp, WebhookToken};

/// Attempts made to find an unused token when registering an integration
const TOKEN_ATTEMPTS: usize = 3;

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS integrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        platform TEXT NOT NULL CHECK (platform IN ('google_ads', 'facebook', 'custom')),
        webhook_token TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        leads_received INTEGER NOT NULL DEFAULT 0,
        last_used_at TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS leads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) > 0),
        email TEXT NOT NULL DEFAULT '',
        phone TEXT NOT NULL CHECK (length(phone) > 0),
        source TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'New'
            CHECK (status IN ('New', 'Contacted', 'Interested', 'Qualified', 'Lost', 'Converted')),
        assigned_to INTEGER,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_integrations_status ON integrations(status);
    CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
";

const INTEGRATION_COLUMNS: &str =
    "id, name, platform, webhook_token, status, leads_received, last_used_at, created_at";

const LEAD_COLUMNS: &str = "id, name, email, phone, source, status, assigned_to, created_at";

/// SQLite-backed integration directory and lead store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] when the file cannot be opened
    /// and [`StorageError::OperationFailed`] when the schema cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Unavailable {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StorageError::Unavailable {
            message: format!("cannot open {}: {e}", path.display()),
        })?;
        info!(path = %path.display(), "Opened SQLite database");
        Self::initialize(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Unavailable {
            message: e.to_string(),
        })?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self, StorageError> {
        configure_connection(&conn);
        conn.execute_batch(SCHEMA).map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `operation` against the connection on the blocking pool
    async fn with_connection<T, F>(&self, operation: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = acquire_lock(&conn);
            operation(&guard)
        })
        .await
        .map_err(|e| StorageError::OperationFailed {
            message: format!("storage task failed: {e}"),
        })?
    }
}

// ============================================================================
// Integration Directory
// ============================================================================

#[async_trait]
impl IntegrationDirectory for SqliteStore {
    async fn find_active_by_token(&self, token: &str) -> Result<Option<Integration>, StorageError> {
        let token = token.to_string();
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations \
                 WHERE webhook_token = ?1 AND status = 'active'"
            );
            conn.query_row(&sql, params![token], IntegrationRow::from_row)
                .optional()
                .map_err(map_sqlite_error)?
                .map(IntegrationRow::into_integration)
                .transpose()
        })
        .await
    }

    async fn record_usage(&self, id: IntegrationId) -> Result<(), StorageError> {
        self.with_connection(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE integrations \
                     SET leads_received = leads_received + 1, last_used_at = ?1 \
                     WHERE id = ?2",
                    params![format_timestamp(&Timestamp::now()), id.as_i64()],
                )
                .map_err(map_sqlite_error)?;

            if updated == 0 {
                return Err(StorageError::NotFound {
                    resource: "integration".to_string(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn create(&self, request: NewIntegration) -> Result<Integration, StorageError> {
        self.with_connection(move |conn| {
            let created_at = format_timestamp(&Timestamp::now());
            let mut last_error = None;

            for _ in 0..TOKEN_ATTEMPTS {
                let token = WebhookToken::generate();
                let result = conn.execute(
                    "INSERT INTO integrations (name, platform, webhook_token, status, created_at) \
                     VALUES (?1, ?2, ?3, 'active', ?4)",
                    params![
                        request.name(),
                        request.platform().as_str(),
                        token.expose(),
                        created_at
                    ],
                );

                match result.map_err(map_sqlite_error) {
                    Ok(_) => {
                        let id = IntegrationId::new(conn.last_insert_rowid());
                        return fetch_integration(conn, id)?.ok_or_else(|| {
                            StorageError::Corrupt {
                                message: format!("integration {id} vanished after insert"),
                            }
                        });
                    }
                    Err(e @ StorageError::ConstraintViolation { .. }) => {
                        debug!("Generated token collided, retrying");
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| StorageError::OperationFailed {
                message: "could not allocate a webhook token".to_string(),
            }))
        })
        .await
    }

    async fn get(&self, id: IntegrationId) -> Result<Option<Integration>, StorageError> {
        self.with_connection(move |conn| fetch_integration(conn, id))
            .await
    }

    async fn list(&self) -> Result<Vec<Integration>, StorageError> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
            let rows = stmt
                .query_map([], IntegrationRow::from_row)
                .map_err(map_sqlite_error)?;

            let mut integrations = Vec::new();
            for row in rows {
                integrations.push(row.map_err(map_sqlite_error)?.into_integration()?);
            }
            Ok(integrations)
        })
        .await
    }

    async fn set_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
    ) -> Result<bool, StorageError> {
        self.with_connection(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE integrations SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), id.as_i64()],
                )
                .map_err(map_sqlite_error)?;
            Ok(updated > 0)
        })
        .await
    }

    async fn delete(&self, id: IntegrationId) -> Result<bool, StorageError> {
        self.with_connection(move |conn| {
            let deleted = conn
                .execute("DELETE FROM integrations WHERE id = ?1", params![id.as_i64()])
                .map_err(map_sqlite_error)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(map_sqlite_error)?;
            Ok(())
        })
        .await
    }
}

// ============================================================================
// Lead Store
// ============================================================================

#[async_trait]
impl LeadStore for SqliteStore {
    async fn insert(&self, lead: NewLead) -> Result<LeadId, StorageError> {
        lead.check_constraints()?;

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO leads (name, email, phone, source, status, assigned_to, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    lead.name,
                    lead.email,
                    lead.phone,
                    lead.source,
                    lead.status.as_str(),
                    lead.assigned_to,
                    format_timestamp(&Timestamp::now())
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(LeadId::new(conn.last_insert_rowid()))
        })
        .await
    }

    async fn get(&self, id: LeadId) -> Result<Option<Lead>, StorageError> {
        self.with_connection(move |conn| {
            let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1");
            conn.query_row(&sql, params![id.as_i64()], LeadRow::from_row)
                .optional()
                .map_err(map_sqlite_error)?
                .map(LeadRow::into_lead)
                .transpose()
        })
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Lead>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_connection(move |conn| {
            let sql = format!(
                "SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC, id DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
            let rows = stmt
                .query_map(params![limit], LeadRow::from_row)
                .map_err(map_sqlite_error)?;

            let mut leads = Vec::new();
            for row in rows {
                leads.push(row.map_err(map_sqlite_error)?.into_lead()?);
            }
            Ok(leads)
        })
        .await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        self.with_connection(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))
                .map_err(map_sqlite_error)?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}

// ============================================================================
// Row mapping
// ============================================================================

struct IntegrationRow {
    id: i64,
    name: String,
    platform: String,
    webhook_token: String,
    status: String,
    leads_received: i64,
    last_used_at: Option<String>,
    created_at: String,
}

impl IntegrationRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            platform: row.get(2)?,
            webhook_token: row.get(3)?,
            status: row.get(4)?,
            leads_received: row.get(5)?,
            last_used_at: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_integration(self) -> Result<Integration, StorageError> {
        let id = self.id;
        let corrupt = |field: &str, detail: String| StorageError::Corrupt {
            message: format!("integration {id} has invalid {field}: {detail}"),
        };

        let webhook_token = WebhookToken::from_existing(self.webhook_token.clone())
            .map_err(|e| corrupt("webhook_token", e.to_string()))?;
        let status = self
            .status
            .parse::<IntegrationStatus>()
            .map_err(|e| corrupt("status", e.to_string()))?;
        let leads_received = u64::try_from(self.leads_received)
            .map_err(|e| corrupt("leads_received", e.to_string()))?;
        let last_used_at = self
            .last_used_at
            .as_deref()
            .map(Timestamp::from_rfc3339)
            .transpose()
            .map_err(|e| corrupt("last_used_at", e.to_string()))?;
        let created_at = Timestamp::from_rfc3339(&self.created_at)
            .map_err(|e| corrupt("created_at", e.to_string()))?;

        Ok(Integration {
            id: IntegrationId::new(id),
            name: self.name,
            platform: self.platform,
            webhook_token,
            status,
            leads_received,
            last_used_at,
            created_at,
        })
    }
}

struct LeadRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
    source: String,
    status: String,
    assigned_to: Option<i64>,
    created_at: String,
}

impl LeadRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            source: row.get(4)?,
            status: row.get(5)?,
            assigned_to: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_lead(self) -> Result<Lead, StorageError> {
        let status = self
            .status
            .parse::<LeadStatus>()
            .map_err(|e| StorageError::Corrupt {
                message: format!("lead {} has invalid status: {e}", self.id),
            })?;
        let created_at =
            Timestamp::from_rfc3339(&self.created_at).map_err(|e| StorageError::Corrupt {
                message: format!("lead {} has invalid created_at: {e}", self.id),
            })?;

        Ok(Lead {
            id: LeadId::new(self.id),
            name: self.name,
            email: self.email,
            phone: self.phone,
            source: self.source,
            status,
            assigned_to: self.assigned_to,
            created_at,
        })
    }
}

fn fetch_integration(
    conn: &Connection,
    id: IntegrationId,
) -> Result<Option<Integration>, StorageError> {
    let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1");
    conn.query_row(&sql, params![id.as_i64()], IntegrationRow::from_row)
        .optional()
        .map_err(map_sqlite_error)?
        .map(IntegrationRow::into_integration)
        .transpose()
}

// ============================================================================
// Connection helpers
// ============================================================================

/// Acquire the connection, recovering from a poisoned mutex
///
/// A panic inside a previous critical section leaves the connection itself
/// usable; SQLite rolls back any open statement.
fn acquire_lock(mutex: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("SQLite mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// WAL journaling, NORMAL sync and a 5 second busy timeout
fn configure_connection(conn: &Connection) {
    // journal_mode reports the resulting mode as a row; in-memory databases stay "memory".
    if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
        debug!(error = %e, "journal_mode pragma not applied");
    }
    if let Err(e) = conn.pragma_update(None, "synchronous", "NORMAL") {
        debug!(error = %e, "synchronous pragma not applied");
    }
    if let Err(e) = conn.pragma_update(None, "busy_timeout", 5000) {
        warn!(error = %e, "busy_timeout pragma not applied");
    }
}

fn format_timestamp(timestamp: &Timestamp) -> String {
    timestamp
        .as_datetime()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn map_sqlite_error(error: rusqlite::Error) -> StorageError {
    match error.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => StorageError::ConstraintViolation {
            message: error.to_string(),
        },
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            StorageError::Unavailable {
                message: error.to_string(),
            }
        }
        _ => StorageError::OperationFailed {
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
