//! Submission pipeline metrics
//!
//! Counters and histograms are recorded through the `metrics` facade. Nothing is
//! exported unless `init_metrics` installs the Prometheus listener.

use std::net::SocketAddr;
use tracing::{info, warn};

pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            info!("Prometheus exporter listening on http://{}/metrics", addr);
        }
        Err(e) => {
            warn!("Prometheus exporter install failed (possibly already installed): {}", e);
        }
    }
}

/// Why a submission was turned away before anything was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Unauthenticated,
    Forbidden,
    RateLimited,
    InvalidArgument,
    Storage,
}

impl RejectReason {
    fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Unauthenticated => "unauthenticated",
            RejectReason::Forbidden => "forbidden",
            RejectReason::RateLimited => "rate_limited",
            RejectReason::InvalidArgument => "invalid_argument",
            RejectReason::Storage => "storage",
        }
    }
}

pub struct SubmissionMetrics;

impl SubmissionMetrics {
    pub fn record_received() {
        ::metrics::counter!("phishblock_submissions_received_total").increment(1);
    }

    pub fn record_rejected(reason: RejectReason) {
        ::metrics::counter!("phishblock_submissions_rejected_total", "reason" => reason.as_str())
            .increment(1);
    }

    pub fn record_redirect_hops(hops: usize) {
        ::metrics::histogram!("phishblock_redirect_hops").record(hops as f64);
    }

    pub fn record_committed() {
        ::metrics::counter!("phishblock_reports_committed_total").increment(1);
    }

    pub fn record_degraded() {
        ::metrics::counter!("phishblock_reports_degraded_total").increment(1);
    }

    pub fn record_pin_duration(duration_secs: f64, success: bool) {
        let outcome = if success { "success" } else { "error" };
        ::metrics::histogram!("phishblock_pin_duration_seconds", "outcome" => outcome)
            .record(duration_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn test_submission_metrics_reach_prometheus() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            SubmissionMetrics::record_received();
            SubmissionMetrics::record_committed();
            SubmissionMetrics::record_rejected(RejectReason::RateLimited);
        });

        let rendered = handle.render();
        assert!(rendered.contains("phishblock_submissions_received_total 1"));
        assert!(rendered.contains("phishblock_reports_committed_total 1"));
        assert!(rendered.contains("reason=\"rate_limited\""));
    }
}
