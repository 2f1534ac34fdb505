use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};

use crate::app::ports::EvidencePinner;
use crate::error::{PhishError, Result};
use crate::metrics::{RejectReason, SubmissionMetrics};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::resolver::{canonicalize, RedirectResolver};
use crate::storage::Storage;
use crate::types::{Identity, NewReport, Principal, Report, User};

/// Caller-supplied fields of a report submission
#[derive(Debug, Clone, Default)]
pub struct SubmitReportInput {
    pub target_url: Option<String>,
    pub description: Option<String>,
}

impl SubmitReportInput {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: Some(target_url.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Read `{ targetUrl, description }` from a request body. Fields of the
    /// wrong type are treated as absent; an empty description is dropped.
    pub fn from_json(body: &serde_json::Value) -> Self {
        let field = |name: &str| body.get(name).and_then(|v| v.as_str()).map(str::to_string);
        Self {
            target_url: field("targetUrl"),
            description: field("description").filter(|d| !d.is_empty()),
        }
    }
}

/// How a submission that got as far as persisting its report ended
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Report persisted with its evidence CID
    Committed(Report),
    /// Report persisted without evidence; `warning` says why
    CommittedDegraded { report: Report, warning: String },
}

impl SubmissionOutcome {
    pub fn report(&self) -> &Report {
        match self {
            SubmissionOutcome::Committed(report) => report,
            SubmissionOutcome::CommittedDegraded { report, .. } => report,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            SubmissionOutcome::Committed(_) => None,
            SubmissionOutcome::CommittedDegraded { warning, .. } => Some(warning),
        }
    }

    pub fn into_parts(self) -> (Report, Option<String>) {
        match self {
            SubmissionOutcome::Committed(report) => (report, None),
            SubmissionOutcome::CommittedDegraded { report, warning } => (report, Some(warning)),
        }
    }
}

/// Use case for accepting a phishing report.
///
/// Order: authenticate, find reporter, rate check, validate, resolve redirects,
/// persist the pending report, pin evidence, record the CID. Everything before
/// the insert can reject; nothing after it can make the submission fail.
pub struct SubmitReportUseCase {
    storage: Arc<dyn Storage>,
    resolver: RedirectResolver,
    pinner: Arc<dyn EvidencePinner>,
    rate_limiter: RateLimiter,
    source_tag: String,
}

impl SubmitReportUseCase {
    pub fn new(
        storage: Arc<dyn Storage>,
        resolver: RedirectResolver,
        pinner: Arc<dyn EvidencePinner>,
        rate_limit: RateLimitConfig,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            rate_limiter: RateLimiter::new(storage.clone(), rate_limit),
            storage,
            resolver,
            pinner,
            source_tag: source_tag.into(),
        }
    }

    pub async fn submit(
        &self,
        identity: &Identity,
        input: SubmitReportInput,
    ) -> Result<SubmissionOutcome> {
        SubmissionMetrics::record_received();
        let result = self.run(identity, input).await;
        if let Err(e) = &result {
            SubmissionMetrics::record_rejected(reject_reason(e));
        }
        result
    }

    async fn run(&self, identity: &Identity, input: SubmitReportInput) -> Result<SubmissionOutcome> {
        let principal = identity.principal().ok_or(PhishError::Unauthenticated)?;
        let reporter = self.find_reporter(principal).await?;

        let window_start = self.rate_limiter.window_start(Utc::now());
        let limit = self.rate_limiter.limit();
        if !self
            .rate_limiter
            .check_and_count(reporter.id, window_start, limit)
            .await?
        {
            info!(reporter = %reporter.external_id, "Submission rate limited");
            return Err(self.rate_limited());
        }

        let target_url = input
            .target_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PhishError::InvalidArgument("Missing targetUrl".to_string()))?;

        let resolution = self.resolver.resolve(&target_url).await;
        SubmissionMetrics::record_redirect_hops(resolution.chain.len());

        let new_report = NewReport {
            reporter_id: reporter.id,
            target_canonical: canonicalize(&resolution.final_url),
            redirect_chain: resolution.chain,
            description: input.description,
            created_at: Utc::now(),
        };
        let report = self.persist(new_report, window_start, limit).await?;

        let span = info_span!("report", report_id = %report.id);
        Ok(self.enrich(&reporter, report).instrument(span).await)
    }

    /// Look the reporter up by identity key. Accounts imported with the key in
    /// their email column also match. The principal's own email is never
    /// trusted for attribution.
    async fn find_reporter(&self, principal: &Principal) -> Result<User> {
        let key = principal.external_id.as_str();
        if let Some(user) = self.storage.find_user_by_external_id(key).await? {
            return Ok(user);
        }
        self.storage
            .find_user_by_email(key)
            .await?
            .ok_or_else(|| PhishError::Forbidden("User not found".to_string()))
    }

    async fn persist(
        &self,
        report: NewReport,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> Result<Report> {
        if self.rate_limiter.config().strict {
            return self
                .storage
                .create_report_within_limit(report, window_start, limit)
                .await
                .map_err(as_storage_error)?
                .ok_or_else(|| self.rate_limited());
        }
        self.storage
            .create_report(report)
            .await
            .map_err(as_storage_error)
    }

    /// Pin the evidence and attach the CID. Never fails: any problem leaves the
    /// report as created and comes back as a warning.
    async fn enrich(&self, reporter: &User, report: Report) -> SubmissionOutcome {
        let document = evidence_document(&report, reporter, &self.source_tag);

        let started = Instant::now();
        let pinned = self.pinner.pin(&document).await;
        SubmissionMetrics::record_pin_duration(started.elapsed().as_secs_f64(), pinned.is_ok());

        let cid = match pinned {
            Ok(cid) => cid,
            Err(e) => {
                warn!(error = %e, "Pinning failed, report kept without evidence");
                SubmissionMetrics::record_degraded();
                return SubmissionOutcome::CommittedDegraded {
                    report,
                    warning: format!("Pinning evidence failed: {}", e),
                };
            }
        };

        match self.attach_evidence(&report, &cid).await {
            Ok(updated) => {
                info!(%cid, "Report committed with evidence");
                SubmissionMetrics::record_committed();
                SubmissionOutcome::Committed(updated)
            }
            Err(e) => {
                error!(%cid, error = %e, "Recording evidence CID failed");
                SubmissionMetrics::record_degraded();
                SubmissionOutcome::CommittedDegraded {
                    report,
                    warning: format!("Evidence pinned as {} but recording it failed: {}", cid, e),
                }
            }
        }
    }

    async fn attach_evidence(&self, report: &Report, cid: &str) -> Result<Report> {
        self.storage.set_evidence_cid(report.id, cid).await?;
        self.storage
            .get_report(report.id)
            .await?
            .ok_or_else(|| PhishError::Storage(format!("report {} vanished after update", report.id)))
    }

    fn rate_limited(&self) -> PhishError {
        let config = self.rate_limiter.config();
        PhishError::RateLimited {
            limit: config.max_per_window,
            window_secs: config.window_duration_seconds,
        }
    }
}

/// Snapshot anchored in the content-addressed store
pub fn evidence_document(report: &Report, reporter: &User, source_tag: &str) -> serde_json::Value {
    json!({
        "reportId": report.id,
        "reporterExternalId": reporter.external_id,
        "reporterDisplayName": reporter.display_name,
        "targetCanonical": report.target_canonical,
        "redirectChain": report.redirect_chain,
        "description": report.description,
        "createdAt": report.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "sourceTag": source_tag,
    })
}

fn as_storage_error(e: PhishError) -> PhishError {
    match e {
        PhishError::Storage(_) => e,
        other => PhishError::Storage(other.to_string()),
    }
}

fn reject_reason(e: &PhishError) -> RejectReason {
    match e {
        PhishError::Unauthenticated => RejectReason::Unauthenticated,
        PhishError::Forbidden(_) => RejectReason::Forbidden,
        PhishError::RateLimited { .. } => RejectReason::RateLimited,
        PhishError::InvalidArgument(_) => RejectReason::InvalidArgument,
        _ => RejectReason::Storage,
    }
}
