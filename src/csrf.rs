//! Single-use CSRF tokens stored in the session table.
//!
//! A CSRF token is a session row whose payload is [`CSRF_MARKER`] and whose
//! `user_id` is empty. Consuming one is a single conditional delete, so two
//! concurrent consumers of the same token cannot both succeed.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::error::CsrfError;
use crate::store::{SessionStore, CSRF_MARKER};
use crate::token;

#[derive(Debug, Clone)]
pub struct CsrfService {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
}

impl CsrfService {
    /// Tokens issued by this service expire `lifetime` after issue, the same
    /// lifetime sessions get.
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    /// Issues a token for a logged-in user.
    pub async fn issue(&self, user_id: Option<i64>) -> Result<String, CsrfError> {
        if user_id.is_none() {
            return Err(CsrfError::LoginRequired);
        }

        let token = token::new_token();
        self.store
            .commit(
                &token,
                CSRF_MARKER,
                OffsetDateTime::now_utc() + self.lifetime,
                None,
            )
            .await?;

        debug!("issued csrf token");
        Ok(token)
    }

    /// Checks that `token` is an active CSRF token without consuming it.
    ///
    /// Storage failures count as invalid.
    pub async fn validate(&self, token: &str) -> bool {
        match self.store.find(token).await {
            Ok(Some(data)) => data == CSRF_MARKER,
            Ok(None) => false,
            Err(e) => {
                warn!("csrf validation failed: {e}");
                false
            }
        }
    }

    /// Consumes `token`. Fails with [`CsrfError::NotFound`] when the token is
    /// unknown, expired, already used, or not a CSRF token at all.
    pub async fn validate_and_consume(&self, token: &str) -> Result<(), CsrfError> {
        if self.store.take_csrf(token).await? {
            Ok(())
        } else {
            Err(CsrfError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionManager, SUBJECT_KEY};
    use crate::testing::{insert_user, memory_store};

    async fn service() -> CsrfService {
        CsrfService::new(Arc::new(memory_store().await), Duration::hours(1))
    }

    #[tokio::test]
    async fn anonymous_users_get_no_token() {
        let csrf = service().await;
        assert!(matches!(csrf.issue(None).await, Err(CsrfError::LoginRequired)));
    }

    #[tokio::test]
    async fn validate_does_not_consume() {
        let csrf = service().await;
        let token = csrf.issue(Some(1)).await.unwrap();

        assert!(csrf.validate(&token).await);
        assert!(csrf.validate(&token).await);
        assert!(!csrf.validate("bogus").await);
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let csrf = service().await;
        let token = csrf.issue(Some(1)).await.unwrap();

        csrf.validate_and_consume(&token).await.unwrap();
        assert!(!csrf.validate(&token).await);
        assert!(matches!(
            csrf.validate_and_consume(&token).await,
            Err(CsrfError::NotFound)
        ));
    }

    #[tokio::test]
    async fn concurrent_consumers_see_one_success() {
        let csrf = service().await;
        let token = csrf.issue(Some(1)).await.unwrap();

        let (a, b) = tokio::join!(
            csrf.validate_and_consume(&token),
            csrf.validate_and_consume(&token)
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!([a, b]
            .into_iter()
            .any(|r| matches!(r, Err(CsrfError::NotFound))));
    }

    #[tokio::test]
    async fn expired_token_is_not_found() {
        let csrf = CsrfService::new(Arc::new(memory_store().await), Duration::seconds(-1));
        let token = csrf.issue(Some(1)).await.unwrap();

        assert!(!csrf.validate(&token).await);
        assert!(matches!(
            csrf.validate_and_consume(&token).await,
            Err(CsrfError::NotFound)
        ));
    }

    #[tokio::test]
    async fn session_token_is_not_a_csrf_token() {
        let store = Arc::new(memory_store().await);
        let user = insert_user(store.connection(), "a@x.com").await;
        let sessions = SessionManager::new(store.clone(), Duration::hours(1));
        let csrf = CsrfService::new(store, Duration::hours(1));

        let mut session = sessions.load(None).await.unwrap();
        session.insert(SUBJECT_KEY, user).unwrap();
        session.save().await.unwrap();
        let token = session.token().unwrap().to_owned();

        assert!(!csrf.validate(&token).await);
        assert!(matches!(
            csrf.validate_and_consume(&token).await,
            Err(CsrfError::NotFound)
        ));
        assert_eq!(sessions.authenticate(Some(&token)).await.unwrap(), Some(user));
    }
}
