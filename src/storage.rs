use crate::error::{PhishError, Result};
use crate::types::{NewReport, Principal, Report, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Storage trait for persisting users and reports
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations
    async fn upsert_user(&self, principal: &Principal) -> Result<User>;
    /// Insert with the given reputation unless the external id is taken. An
    /// existing user is returned untouched.
    async fn create_user_if_absent(&self, principal: &Principal, reputation: i64) -> Result<User>;
    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // Report operations
    async fn create_report(&self, report: NewReport) -> Result<Report>;
    /// Count and insert as one step. Returns `None` when the reporter already has
    /// `limit` reports created at or after `window_start`.
    async fn create_report_within_limit(
        &self,
        report: NewReport,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<Option<Report>>;
    async fn count_reports_since(&self, reporter_id: Uuid, since: DateTime<Utc>) -> Result<u64>;
    /// Record the evidence CID. Fails if the report is missing or already has one.
    async fn set_evidence_cid(&self, report_id: Uuid, cid: &str) -> Result<()>;
    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>>;
    /// Most recent reports first.
    async fn list_recent_reports(&self, limit: usize) -> Result<Vec<Report>>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
    // Insertion order doubles as the tiebreak for equal timestamps
    reports: Arc<Mutex<Vec<Report>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            reports: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, User>>> {
        self.users
            .lock()
            .map_err(|_| PhishError::Storage("user table lock poisoned".to_string()))
    }

    fn reports(&self) -> Result<MutexGuard<'_, Vec<Report>>> {
        self.reports
            .lock()
            .map_err(|_| PhishError::Storage("report table lock poisoned".to_string()))
    }

    fn count_in(reports: &[Report], reporter_id: Uuid, since: DateTime<Utc>) -> u64 {
        reports
            .iter()
            .filter(|r| r.reporter_id == reporter_id && r.created_at >= since)
            .count() as u64
    }

    fn ensure_reporter_exists(&self, reporter_id: Uuid) -> Result<()> {
        if self.users()?.contains_key(&reporter_id) {
            Ok(())
        } else {
            Err(PhishError::Storage(format!("reporter {} does not exist", reporter_id)))
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_user(&self, principal: &Principal) -> Result<User> {
        let mut users = self.users()?;
        if let Some(existing) = users
            .values_mut()
            .find(|u| u.external_id == principal.external_id)
        {
            existing.refresh_from(principal);
            debug!("Refreshed user {} ({})", existing.external_id, existing.id);
            return Ok(existing.clone());
        }

        let user = User::from_principal(principal, 0);
        users.insert(user.id, user.clone());
        debug!("Created user {} with id {}", user.external_id, user.id);
        Ok(user)
    }

    async fn create_user_if_absent(&self, principal: &Principal, reputation: i64) -> Result<User> {
        let mut users = self.users()?;
        if let Some(existing) = users.values().find(|u| u.external_id == principal.external_id) {
            return Ok(existing.clone());
        }
        let user = User::from_principal(principal, reputation);
        users.insert(user.id, user.clone());
        debug!("Seeded user {} with reputation {}", user.external_id, reputation);
        Ok(user)
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> Result<Option<User>> {
        let users = self.users()?;
        Ok(users.values().find(|u| u.external_id == external_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users()?;
        Ok(users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_report(&self, report: NewReport) -> Result<Report> {
        self.ensure_reporter_exists(report.reporter_id)?;
        let report = report.into_pending();

        let mut reports = self.reports()?;
        reports.push(report.clone());

        debug!("Created report {} for {}", report.id, report.target_canonical);
        Ok(report)
    }

    async fn create_report_within_limit(
        &self,
        report: NewReport,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<Option<Report>> {
        self.ensure_reporter_exists(report.reporter_id)?;

        // Holding the table lock across count and insert closes the race
        let mut reports = self.reports()?;
        if Self::count_in(&reports, report.reporter_id, window_start) >= limit {
            return Ok(None);
        }
        let report = report.into_pending();
        reports.push(report.clone());

        debug!("Created report {} for {}", report.id, report.target_canonical);
        Ok(Some(report))
    }

    async fn count_reports_since(&self, reporter_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let reports = self.reports()?;
        Ok(Self::count_in(&reports, reporter_id, since))
    }

    async fn set_evidence_cid(&self, report_id: Uuid, cid: &str) -> Result<()> {
        let mut reports = self.reports()?;
        let report = reports
            .iter_mut()
            .find(|r| r.id == report_id)
            .ok_or_else(|| PhishError::Storage(format!("report {} not found", report_id)))?;

        if report.evidence_cid.is_some() {
            return Err(PhishError::Storage(format!(
                "report {} already has an evidence CID",
                report_id
            )));
        }
        report.evidence_cid = Some(cid.to_string());

        debug!("Recorded evidence {} on report {}", cid, report_id);
        Ok(())
    }

    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>> {
        let reports = self.reports()?;
        Ok(reports.iter().find(|r| r.id == report_id).cloned())
    }

    async fn list_recent_reports(&self, limit: usize) -> Result<Vec<Report>> {
        let reports = self.reports()?;
        let mut recent: Vec<Report> = reports.iter().rev().cloned().collect();
        // Stable sort keeps newer insertions first on equal timestamps
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(limit);
        Ok(recent)
    }
}
