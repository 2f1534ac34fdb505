use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::TARGET_TYPE_URL;

/// Build the stable user key from an identity provider and its user id, e.g. `github-1234567`.
pub fn external_identity_key(provider: &str, provider_user_id: &str) -> String {
    format!("{}-{}", provider, provider_user_id)
}

/// An authenticated caller as vouched for by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub provider: String,
    pub external_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

impl Principal {
    pub fn new(provider: &str, provider_user_id: &str, display_name: &str) -> Self {
        Self {
            provider: provider.to_string(),
            external_id: external_identity_key(provider, provider_user_id),
            display_name: display_name.to_string(),
            email: None,
            avatar_url: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }
}

/// Caller identity for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated(Principal),
    Anonymous,
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(p) => Some(p),
            Identity::Anonymous => None,
        }
    }
}

/// A registered reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub oauth_provider: String,
    pub external_id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub reputation: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First-sign-in record for a principal.
    pub fn from_principal(principal: &Principal, reputation: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            oauth_provider: principal.provider.clone(),
            external_id: principal.external_id.clone(),
            display_name: principal.display_name.clone(),
            email: principal.email.clone(),
            avatar_url: principal.avatar_url.clone(),
            reputation,
            created_at: Utc::now(),
        }
    }

    /// Refresh profile fields from a later sign-in; reputation is left alone.
    pub fn refresh_from(&mut self, principal: &Principal) {
        self.oauth_provider = principal.provider.clone();
        self.display_name = principal.display_name.clone();
        self.email = principal.email.clone();
        self.avatar_url = principal.avatar_url.clone();
    }
}

/// Report lifecycle. The intake pipeline only ever writes `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Confirmed => "confirmed",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReportStatus::Pending),
            "confirmed" => Some(ReportStatus::Confirmed),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

/// A submitted phishing report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_type: String,
    pub target_canonical: String,
    pub redirect_chain: Vec<String>,
    pub description: Option<String>,
    pub evidence_cid: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a report is first persisted
#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: Uuid,
    pub target_canonical: String,
    pub redirect_chain: Vec<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewReport {
    pub fn into_pending(self) -> Report {
        Report {
            id: Uuid::new_v4(),
            reporter_id: self.reporter_id,
            target_type: TARGET_TYPE_URL.to_string(),
            target_canonical: self.target_canonical,
            redirect_chain: self.redirect_chain,
            description: self.description,
            evidence_cid: None,
            status: ReportStatus::Pending,
            created_at: self.created_at,
        }
    }
}
