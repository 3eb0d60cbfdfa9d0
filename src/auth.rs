//! Register, login, logout and related flows.
//!
//! [`AuthService`] knows nothing about HTTP. The transport loads a
//! [`Session`] for the request, passes it in, saves it afterwards, and maps
//! [`AuthError::kind`] to a status code.

use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::csrf::CsrfService;
use crate::error::AuthError;
use crate::password::CredentialHasher;
use crate::session::{Session, SessionManager, SUBJECT_KEY};
use crate::users::{CredentialRepository, NewUser};

#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub struct AuthService<R, H> {
    users: R,
    hasher: H,
    sessions: SessionManager,
    csrf: CsrfService,
    min_password_length: usize,
    super_admin_id: i64,
}

impl<R, H> AuthService<R, H>
where
    R: CredentialRepository,
    H: CredentialHasher,
{
    pub fn new(
        users: R,
        hasher: H,
        sessions: SessionManager,
        csrf: CsrfService,
        config: &AuthConfig,
    ) -> Self {
        Self {
            users,
            hasher,
            sessions,
            csrf,
            min_password_length: config.min_password_length,
            super_admin_id: config.super_admin_id,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn csrf(&self) -> &CsrfService {
        &self.csrf
    }

    /// Creates an account. Does not log the user in.
    pub async fn register(&self, req: RegisterRequest) -> Result<i64, AuthError> {
        let email = req.email.trim();
        if email.is_empty() {
            return Err(AuthError::EmailRequired);
        }

        if req.password.chars().count() < self.min_password_length {
            return Err(AuthError::PasswordTooShort(self.min_password_length));
        }

        let password_hash = self.hasher.hash(&req.password).map_err(|e| {
            warn!("{e}");
            AuthError::Internal
        })?;

        let id = self
            .users
            .create(NewUser {
                first_name: req.first_name,
                last_name: req.last_name,
                email: email.to_owned(),
                password_hash,
            })
            .await?;

        info!(user_id = id, "registered user");
        Ok(id)
    }

    /// Checks credentials and binds `session` to the user under a fresh token.
    ///
    /// Unknown email and wrong password both fail with
    /// [`AuthError::Unauthorized`].
    pub async fn login(&self, session: &mut Session, req: LoginRequest) -> Result<(), AuthError> {
        let principal = match self.users.find_by_email(req.email.trim()).await {
            Ok(Some(principal)) => principal,
            Ok(None) => return Err(AuthError::Unauthorized),
            Err(e) => {
                warn!("credential lookup failed: {e}");
                return Err(AuthError::Unauthorized);
            }
        };

        if !self.hasher.verify(&req.password, &principal.password_hash) {
            return Err(AuthError::Unauthorized);
        }

        session.renew().await?;
        session.insert(SUBJECT_KEY, principal.id)?;

        info!(user_id = principal.id, "user logged in");
        Ok(())
    }

    /// Ends the current session. Succeeds when there is none.
    pub async fn logout(&self, session: &mut Session) -> Result<(), AuthError> {
        let user_id = session.subject_id()?;
        session.destroy().await?;

        if let Some(user_id) = user_id {
            info!(user_id, "user logged out");
        }
        Ok(())
    }

    /// Revokes every session of `target`. Only the super admin may do this;
    /// anyone else gets [`AuthError::Internal`].
    pub async fn force_logout(&self, session: &Session, target: i64) -> Result<u64, AuthError> {
        if session.subject_id()? != Some(self.super_admin_id) {
            return Err(AuthError::Internal);
        }

        let revoked = self.sessions.force_destroy_by_subject(target).await?;
        info!(user_id = target, revoked, "forced logout");
        Ok(revoked)
    }

    /// The logged-in user's id.
    pub fn me(&self, session: &Session) -> Result<i64, AuthError> {
        session.subject_id()?.ok_or(AuthError::Unauthorized)
    }

    /// Issues a single-use CSRF token for the logged-in user.
    pub async fn issue_csrf(&self, session: &Session) -> Result<String, AuthError> {
        Ok(self.csrf.issue(session.subject_id()?).await?)
    }

    /// Consumes a CSRF token presented with a state-changing request.
    pub async fn consume_csrf(&self, token: &str) -> Result<(), AuthError> {
        Ok(self.csrf.validate_and_consume(token).await?)
    }
}
