//! Session entity model for Sea-ORM database interaction.
//!
//! This module defines the database schema representation for session storage.
//! The same table stores regular sessions and single-use CSRF tokens; the two
//! are told apart by the payload in the `data` column.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one row of the `sessions` table.
///
/// # Database Schema
///
/// | Column  | Type                    | Description                                  |
/// |---------|-------------------------|----------------------------------------------|
/// | token   | TEXT (Primary Key)      | Digest of the raw token, never the token     |
/// | user_id | BIGINT NULL             | Owning user, cascades on user deletion       |
/// | data    | BYTEA                   | MessagePack session values or CSRF marker    |
/// | expiry  | TIMESTAMPTZ             | Absolute expiry; the row is active before it |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Hex digest of the raw token.
    ///
    /// Reads and writes compute the digest independently, so this column is
    /// the only link between a client-held token and its row.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub token: String,

    /// The user this session belongs to, if any.
    ///
    /// Anonymous sessions and CSRF tokens leave this empty.
    pub user_id: Option<i64>,

    /// Opaque payload bytes.
    pub data: Vec<u8>,

    /// Expiration timestamp. Rows at or past this instant are treated as
    /// absent by every read, whether or not the evictor has removed them yet.
    pub expiry: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
