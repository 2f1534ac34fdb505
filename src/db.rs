use crate::error::{PhishError, Result};
use crate::storage::Storage;
use crate::types::{NewReport, Principal, Report, ReportStatus, User};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;
PRAGMA foreign_keys=ON;
CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    oauth_provider  TEXT NOT NULL,
    external_id     TEXT NOT NULL UNIQUE,
    display_name    TEXT NOT NULL,
    email           TEXT,
    avatar_url      TEXT,
    reputation      INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS reports (
    id                TEXT PRIMARY KEY,
    reporter_id       TEXT NOT NULL REFERENCES users(id),
    target_type       TEXT NOT NULL,
    target_canonical  TEXT NOT NULL,
    redirect_chain    TEXT NOT NULL,
    description       TEXT,
    evidence_cid      TEXT,
    status            TEXT NOT NULL,
    created_at        INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS reports_reporter_created ON reports (reporter_id, created_at);
CREATE INDEX IF NOT EXISTS reports_created ON reports (created_at);
"#;

const USER_COLUMNS: &str =
    "id, oauth_provider, external_id, display_name, email, avatar_url, reputation, created_at";
const REPORT_COLUMNS: &str = "id, reporter_id, target_type, target_canonical, redirect_chain, description, evidence_cid, status, created_at";

/// SQLite-backed storage. Timestamps are stored as epoch milliseconds.
///
/// Every statement runs on the blocking pool so queries never stall the async
/// workers.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening report database at {}", path.as_ref().display());
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| {
                PhishError::Storage("database connection lock poisoned".to_string())
            })?;
            op(&mut guard)
        })
        .await
        .map_err(|e| PhishError::Storage(format!("database task failed: {}", e)))?
    }
}

struct UserRow {
    id: String,
    oauth_provider: String,
    external_id: String,
    display_name: String,
    email: Option<String>,
    avatar_url: Option<String>,
    reputation: i64,
    created_at: i64,
}

impl UserRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            oauth_provider: row.get(1)?,
            external_id: row.get(2)?,
            display_name: row.get(3)?,
            email: row.get(4)?,
            avatar_url: row.get(5)?,
            reputation: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = PhishError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            oauth_provider: row.oauth_provider,
            external_id: row.external_id,
            display_name: row.display_name,
            email: row.email,
            avatar_url: row.avatar_url,
            reputation: row.reputation,
            created_at: from_millis(row.created_at)?,
        })
    }
}

struct ReportRow {
    id: String,
    reporter_id: String,
    target_type: String,
    target_canonical: String,
    redirect_chain: String,
    description: Option<String>,
    evidence_cid: Option<String>,
    status: String,
    created_at: i64,
}

impl ReportRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            reporter_id: row.get(1)?,
            target_type: row.get(2)?,
            target_canonical: row.get(3)?,
            redirect_chain: row.get(4)?,
            description: row.get(5)?,
            evidence_cid: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl TryFrom<ReportRow> for Report {
    type Error = PhishError;

    fn try_from(row: ReportRow) -> Result<Self> {
        let status = ReportStatus::parse(&row.status)
            .ok_or_else(|| PhishError::Storage(format!("unknown report status '{}'", row.status)))?;
        Ok(Report {
            id: parse_uuid(&row.id)?,
            reporter_id: parse_uuid(&row.reporter_id)?,
            target_type: row.target_type,
            target_canonical: row.target_canonical,
            redirect_chain: serde_json::from_str(&row.redirect_chain)?,
            description: row.description,
            evidence_cid: row.evidence_cid,
            status,
            created_at: from_millis(row.created_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| PhishError::Storage(format!("invalid id '{}': {}", s, e)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| PhishError::Storage(format!("invalid timestamp {}", ms)))
}

fn insert_report(conn: &Connection, report: NewReport) -> Result<Report> {
    let mut report = report.into_pending();
    // Round-trip through the stored precision so the returned value matches later reads
    report.created_at = from_millis(report.created_at.timestamp_millis())?;
    conn.execute(
        &format!("INSERT INTO reports ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", REPORT_COLUMNS),
        params![
            report.id.to_string(),
            report.reporter_id.to_string(),
            report.target_type,
            report.target_canonical,
            serde_json::to_string(&report.redirect_chain)?,
            report.description,
            report.evidence_cid,
            report.status.as_str(),
            report.created_at.timestamp_millis(),
        ],
    )?;
    debug!("Created report {} for {}", report.id, report.target_canonical);
    Ok(report)
}

fn count_since(conn: &Connection, reporter_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM reports WHERE reporter_id = ?1 AND created_at >= ?2",
        params![reporter_id.to_string(), since.timestamp_millis()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn select_user(conn: &Connection, column: &str, value: &str) -> Result<Option<User>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE {} = ?1 LIMIT 1", USER_COLUMNS, column),
            params![value],
            UserRow::read,
        )
        .optional()?;
    row.map(User::try_from).transpose()
}

fn insert_user(conn: &Connection, user: &User, on_conflict: &str) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) ON CONFLICT(external_id) {}",
            USER_COLUMNS, on_conflict
        ),
        params![
            user.id.to_string(),
            user.oauth_provider,
            user.external_id,
            user.display_name,
            user.email,
            user.avatar_url,
            user.reputation,
            user.created_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn reselect_user(conn: &Connection, external_id: &str) -> Result<User> {
    select_user(conn, "external_id", external_id)?
        .ok_or_else(|| PhishError::Storage(format!("user {} missing after insert", external_id)))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_user(&self, principal: &Principal) -> Result<User> {
        let fresh = User::from_principal(principal, 0);
        self.with_conn(move |conn| {
            insert_user(
                conn,
                &fresh,
                "DO UPDATE SET
                    oauth_provider=excluded.oauth_provider,
                    display_name=excluded.display_name,
                    email=excluded.email,
                    avatar_url=excluded.avatar_url",
            )?;
            reselect_user(conn, &fresh.external_id)
        })
        .await
    }

    async fn create_user_if_absent(&self, principal: &Principal, reputation: i64) -> Result<User> {
        let fresh = User::from_principal(principal, reputation);
        self.with_conn(move |conn| {
            insert_user(conn, &fresh, "DO NOTHING")?;
            reselect_user(conn, &fresh.external_id)
        })
        .await
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let external_id = external_id.to_string();
        self.with_conn(move |conn| select_user(conn, "external_id", &external_id))
            .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.with_conn(move |conn| select_user(conn, "email", &email)).await
    }

    async fn create_report(&self, report: NewReport) -> Result<Report> {
        self.with_conn(move |conn| insert_report(conn, report)).await
    }

    async fn create_report_within_limit(
        &self,
        report: NewReport,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<Option<Report>> {
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if count_since(&tx, report.reporter_id, window_start)? >= limit {
                return Ok(None);
            }
            let report = insert_report(&tx, report)?;
            tx.commit()?;
            Ok(Some(report))
        })
        .await
    }

    async fn count_reports_since(&self, reporter_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.with_conn(move |conn| count_since(conn, reporter_id, since))
            .await
    }

    async fn set_evidence_cid(&self, report_id: Uuid, cid: &str) -> Result<()> {
        let cid = cid.to_string();
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE reports SET evidence_cid = ?1 WHERE id = ?2 AND evidence_cid IS NULL",
                params![cid, report_id.to_string()],
            )?;
            if updated == 0 {
                return Err(PhishError::Storage(format!(
                    "report {} not found or already has an evidence CID",
                    report_id
                )));
            }
            debug!("Recorded evidence {} on report {}", cid, report_id);
            Ok(())
        })
        .await
    }

    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>> {
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS),
                    params![report_id.to_string()],
                    ReportRow::read,
                )
                .optional()?;
            row.map(Report::try_from).transpose()
        })
        .await
    }

    async fn list_recent_reports(&self, limit: usize) -> Result<Vec<Report>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM reports ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                REPORT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit as i64], ReportRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(Report::try_from).collect()
        })
        .await
    }
}
