use std::sync::Arc;

use tracing::info;

use crate::error::{PhishError, Result};
use crate::storage::Storage;
use crate::types::{Identity, User};

/// Records a successful sign-in by upserting the user keyed on the external identity.
///
/// Report submission never creates users; they come from here or from seeding.
pub struct SignInUseCase {
    storage: Arc<dyn Storage>,
}

impl SignInUseCase {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn sign_in(&self, identity: &Identity) -> Result<User> {
        let principal = identity.principal().ok_or(PhishError::Unauthenticated)?;
        let user = self.storage.upsert_user(principal).await?;
        info!(user = %user.external_id, "Sign-in recorded");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::types::Principal;

    #[tokio::test]
    async fn test_sign_in_upserts() {
        let storage = Arc::new(InMemoryStorage::new());
        let use_case = SignInUseCase::new(storage.clone());

        let first = use_case
            .sign_in(&Identity::Authenticated(Principal::new("github", "3", "three")))
            .await
            .unwrap();
        let second = use_case
            .sign_in(&Identity::Authenticated(
                Principal::new("github", "3", "three-renamed").with_avatar_url("https://a/x.png"),
            ))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display_name, "three-renamed");
        assert_eq!(second.avatar_url.as_deref(), Some("https://a/x.png"));
    }

    #[tokio::test]
    async fn test_anonymous_sign_in_is_rejected() {
        let use_case = SignInUseCase::new(Arc::new(InMemoryStorage::new()));
        let err = use_case.sign_in(&Identity::Anonymous).await.unwrap_err();
        assert!(matches!(err, PhishError::Unauthenticated));
    }
}
