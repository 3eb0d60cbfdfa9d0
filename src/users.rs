//! Credential lookup and registration.

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr};

use crate::entity::user::{self, Entity as UserEntity};
use crate::error::{StoreError, UserError};

/// A user as seen by the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    /// Stored password hash.
    pub password_hash: String,
}

/// Data for a new user. The password is already hashed.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub password_hash: String,
}

/// Where user credentials live.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Looks a user up by email, ignoring case.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    /// Creates a user and returns its id. Fails with
    /// [`UserError::EmailTaken`] if the email is already registered.
    async fn create(&self, user: NewUser) -> Result<i64, UserError>;
}

/// [`CredentialRepository`] over the `users` table.
#[derive(Debug, Clone)]
pub struct SeaOrmCredentials {
    conn: DatabaseConnection,
}

impl SeaOrmCredentials {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CredentialRepository for SeaOrmCredentials {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let found = UserEntity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(email.to_lowercase()),
            )
            .one(&self.conn)
            .await?;

        Ok(found.map(|model| Principal {
            id: model.id,
            email: model.email,
            password_hash: model.password,
        }))
    }

    async fn create(&self, new_user: NewUser) -> Result<i64, UserError> {
        let model = user::ActiveModel {
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            email: Set(new_user.email),
            password: Set(new_user.password_hash),
            ..Default::default()
        };

        match model.insert(&self.conn).await {
            Ok(model) => Ok(model.id),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(UserError::EmailTaken)
            }
            Err(e) => Err(StoreError::from(e).into()),
        }
    }
}
