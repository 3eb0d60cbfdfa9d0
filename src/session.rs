//! Per-request session handling on top of a [`SessionStore`].
//!
//! [`SessionManager`] is shared across requests. For each request the
//! transport calls [`SessionManager::load`] with the token from the cookie,
//! hands the resulting [`Session`] to the handlers, and calls
//! [`Session::save`] before sending the response.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::error::{SessionError, StoreError, StoreResult};
use crate::store::{PayloadKind, Revocation, SessionStore};
use crate::token;

/// Session key under which the logged-in user's id is stored.
pub const SUBJECT_KEY: &str = "user_id";

/// Serialized form of a session's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SessionData {
    deadline: Option<OffsetDateTime>,
    values: HashMap<String, Value>,
}

impl SessionData {
    fn encode(&self) -> StoreResult<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> StoreResult<Self> {
        rmp_serde::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unchanged,
    Modified,
    Destroyed,
}

/// What the transport should do with the cookie after [`Session::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed; leave the cookie alone.
    Unchanged,
    /// Values were written under `token`; set the cookie.
    Committed {
        token: String,
        expires_at: OffsetDateTime,
    },
    /// The session was destroyed, here or by a revocation that landed
    /// during the request; clear the cookie.
    Destroyed,
}

/// Shared entry point for loading sessions and revoking them in bulk.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager whose sessions live for `lifetime` after creation
    /// or rotation.
    pub fn new(store: Arc<dyn SessionStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Loads the session for `token`.
    ///
    /// An absent, expired, or unknown token yields an empty anonymous
    /// session, as does a token that belongs to a CSRF record.
    pub async fn load(&self, token: Option<&str>) -> StoreResult<Session> {
        let mut session = Session {
            store: Arc::clone(&self.store),
            lifetime: self.lifetime,
            token: None,
            data: SessionData::default(),
            status: Status::Unchanged,
        };

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(session);
        };

        match self.store.find(token).await? {
            Some(bytes) if PayloadKind::of(&bytes) == PayloadKind::Session => {
                session.data = SessionData::decode(&bytes)?;
                session.token = Some(token.to_owned());
            }
            _ => {}
        }

        Ok(session)
    }

    /// Returns the logged-in user for `token`, if the token maps to an
    /// active session that carries one.
    pub async fn authenticate(&self, token: Option<&str>) -> StoreResult<Option<i64>> {
        let session = self.load(token).await?;
        session.subject_id()
    }

    /// Revokes every active session owned by `user_id`.
    ///
    /// Returns the number of sessions removed, or
    /// [`SessionError::NotLoggedIn`] when the user had none.
    pub async fn force_destroy_by_subject(&self, user_id: i64) -> Result<u64, SessionError> {
        match self.store.delete_by_subject(user_id).await? {
            Revocation::NotLoggedIn => Err(SessionError::NotLoggedIn),
            Revocation::Revoked(count) => {
                debug!(user_id, count, "revoked sessions");
                Ok(count)
            }
        }
    }
}

/// The session of one request.
///
/// Reads and writes of values happen in memory; [`Session::renew`] and
/// [`Session::destroy`] hit the store immediately, and [`Session::save`]
/// flushes pending writes.
pub struct Session {
    store: Arc<dyn SessionStore>,
    lifetime: Duration,
    token: Option<String>,
    data: SessionData,
    status: Status,
}

impl fmt::Debug for Session {
    // The raw token is a credential; keep it out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_token", &self.token.is_some())
            .field("keys", &self.data.values.keys().collect::<Vec<_>>())
            .field("status", &self.status)
            .finish()
    }
}

impl Session {
    /// The raw token backing this session, if it has been stored.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.data.values.is_empty()
    }

    /// Reads the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        self.data
            .values
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| StoreError::Decode(e.to_string()))
            })
            .transpose()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> StoreResult<()> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.data.values.insert(key.to_owned(), value);
        self.status = Status::Modified;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.values.remove(key);
        if removed.is_some() {
            self.status = Status::Modified;
        }
        removed
    }

    /// The logged-in user's id, if any.
    pub fn subject_id(&self) -> StoreResult<Option<i64>> {
        self.get(SUBJECT_KEY)
    }

    /// Rotates the session token.
    ///
    /// The current values move to a fresh token with a fresh deadline and
    /// the old row is deleted, in one transaction. On success the old token
    /// no longer resolves; on error both the store and this session are
    /// left as they were. Call after every privilege change.
    pub async fn renew(&mut self) -> StoreResult<()> {
        let new_token = token::new_token();
        let deadline = OffsetDateTime::now_utc() + self.lifetime;

        let mut data = self.data.clone();
        data.deadline = Some(deadline);
        let bytes = data.encode()?;

        self.store
            .rotate(
                self.token.as_deref(),
                &new_token,
                &bytes,
                deadline,
                self.subject_id()?,
            )
            .await?;

        self.token = Some(new_token);
        self.data = data;
        self.status = Status::Modified;

        debug!("session token renewed");
        Ok(())
    }

    /// Deletes the session from the store and forgets its values.
    pub async fn destroy(&mut self) -> StoreResult<()> {
        if let Some(token) = self.token.take() {
            self.store.delete(&token).await?;
        }
        self.data = SessionData::default();
        self.status = Status::Destroyed;

        debug!("session destroyed");
        Ok(())
    }

    /// Flushes pending writes to the store.
    ///
    /// A session without a token gets one here. The owning user's id is
    /// copied from the values into the store's `user_id` column so that
    /// [`SessionManager::force_destroy_by_subject`] can find the row.
    ///
    /// A session that already has a token only overwrites its existing row.
    /// If that row is gone, because the user was logged out elsewhere or the
    /// session expired during the request, nothing is written and the
    /// session ends up destroyed.
    pub async fn save(&mut self) -> StoreResult<SaveOutcome> {
        match self.status {
            Status::Unchanged => return Ok(SaveOutcome::Unchanged),
            Status::Destroyed => return Ok(SaveOutcome::Destroyed),
            Status::Modified => {}
        }

        let deadline = match self.data.deadline {
            Some(deadline) => deadline,
            None => {
                let deadline = OffsetDateTime::now_utc() + self.lifetime;
                self.data.deadline = Some(deadline);
                deadline
            }
        };
        let bytes = self.data.encode()?;
        let user_id = self.subject_id()?;

        let token = match self.token.clone() {
            Some(token) => {
                if !self.store.update(&token, &bytes, deadline, user_id).await? {
                    debug!("session row gone before save, not recreating it");
                    self.token = None;
                    self.data = SessionData::default();
                    self.status = Status::Destroyed;
                    return Ok(SaveOutcome::Destroyed);
                }
                token
            }
            None => {
                let token = token::new_token();
                self.store
                    .commit(&token, &bytes, deadline, user_id)
                    .await?;
                self.token = Some(token.clone());
                token
            }
        };
        self.status = Status::Unchanged;

        Ok(SaveOutcome::Committed {
            token,
            expires_at: deadline,
        })
    }
}
