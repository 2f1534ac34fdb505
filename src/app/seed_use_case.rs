use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{Principal, User};

pub const ADMIN_SEED_REPUTATION: i64 = 100;

/// Demo accounts with their starting reputation.
pub fn demo_users() -> Vec<(Principal, i64)> {
    vec![
        (
            Principal::new("github", "admin-01", "phish-admin").with_email("admin@example.com"),
            ADMIN_SEED_REPUTATION,
        ),
        (
            Principal::new("github", "validator-01", "validator1")
                .with_email("validator1@example.com"),
            0,
        ),
        (
            Principal::new("github", "validator-02", "validator2")
                .with_email("validator2@example.com"),
            0,
        ),
    ]
}

/// Creates demo accounts that do not exist yet. Accounts already present keep
/// their profile and reputation, so seeding can be re-run.
pub struct SeedUseCase {
    storage: Arc<dyn Storage>,
}

impl SeedUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn seed(&self, users: Vec<(Principal, i64)>) -> Result<Vec<User>> {
        let mut seeded = Vec::with_capacity(users.len());
        for (principal, reputation) in users {
            let user = self
                .storage
                .create_user_if_absent(&principal, reputation)
                .await?;
            info!(user = %user.external_id, reputation = user.reputation, "Seed user ready");
            seeded.push(user);
        }
        Ok(seeded)
    }
}
