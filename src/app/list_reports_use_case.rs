use std::sync::Arc;

use crate::constants::LIST_REPORTS_LIMIT;
use crate::error::Result;
use crate::storage::Storage;
use crate::types::Report;

/// Use case for the public feed of recent reports
pub struct ListReportsUseCase {
    storage: Arc<dyn Storage>,
    limit: usize,
}

impl ListReportsUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_limit(storage, LIST_REPORTS_LIMIT)
    }

    pub fn with_limit(storage: Arc<dyn Storage>, limit: usize) -> Self {
        Self { storage, limit }
    }

    /// Newest first, at most `limit` reports
    pub async fn list(&self) -> Result<Vec<Report>> {
        self.storage.list_recent_reports(self.limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::{NewReport, Principal};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_lists_fifty_newest_first() {
        let storage = Arc::new(InMemoryStorage::new());
        let user = storage
            .upsert_user(&Principal::new("github", "1", "one"))
            .await
            .unwrap();
        let base = Utc::now();
        for i in 0..60 {
            storage
                .create_report(NewReport {
                    reporter_id: user.id,
                    target_canonical: format!("https://phish.example/{}", i),
                    redirect_chain: vec![],
                    description: None,
                    created_at: base + Duration::seconds(i),
                })
                .await
                .unwrap();
        }

        let use_case = ListReportsUseCase::new(storage);
        let reports = use_case.list().await.unwrap();
        assert_eq!(reports.len(), 50);
        assert_eq!(reports[0].target_canonical, "https://phish.example/59");
        assert_eq!(reports[49].target_canonical, "https://phish.example/10");
        assert_eq!(reports, use_case.list().await.unwrap());
    }
}
