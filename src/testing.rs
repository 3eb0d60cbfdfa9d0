//! Shared fixtures for unit tests: a migrated in-memory SQLite database.

use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use crate::entity::user;
use crate::migration::Migrator;
use crate::store::SeaOrmStore;

pub(crate) async fn memory_db() -> DatabaseConnection {
    // One long-lived connection: every SQLite in-memory connection is its own database.
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    conn
}

pub(crate) async fn memory_store() -> SeaOrmStore {
    SeaOrmStore::new(memory_db().await)
}

pub(crate) async fn insert_user(conn: &DatabaseConnection, email: &str) -> i64 {
    user::ActiveModel {
        email: Set(email.to_owned()),
        password: Set("not-a-real-hash".to_owned()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .unwrap()
    .id
}
