//! End-to-end flows through the public API against an in-memory SQLite
//! database.

use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use seaorm_session_auth::migration::{Migrator, MigratorTrait};
use seaorm_session_auth::{
    Argon2Hasher, AuthConfig, AuthError, AuthService, CsrfService, ErrorKind, LoginRequest,
    PayloadKind, RegisterRequest, SaveOutcome, SeaOrmCredentials, SeaOrmStore, Session,
    SessionManager, SessionStore,
};
use time::Duration;

type Auth = AuthService<SeaOrmCredentials, Argon2Hasher>;

async fn setup() -> (Auth, Arc<SeaOrmStore>) {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn: DatabaseConnection = Database::connect(opt).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();

    let store = Arc::new(SeaOrmStore::new(conn.clone()));
    let auth = AuthService::new(
        SeaOrmCredentials::new(conn),
        Argon2Hasher::new(1024, 1, 1).unwrap(),
        SessionManager::new(store.clone(), Duration::hours(24)),
        CsrfService::new(store.clone(), Duration::hours(24)),
        &AuthConfig::default(),
    );
    (auth, store)
}

async fn register(auth: &Auth, email: &str) -> i64 {
    auth.register(RegisterRequest {
        email: email.to_owned(),
        password: "longenoughpassword".to_owned(),
        ..Default::default()
    })
    .await
    .unwrap()
}

/// Logs in the way a transport would: load, run the flow, save, return the
/// cookie value.
async fn login(auth: &Auth, email: &str) -> String {
    let mut session = auth.sessions().load(None).await.unwrap();
    auth.login(
        &mut session,
        LoginRequest {
            email: email.to_owned(),
            password: "longenoughpassword".to_owned(),
        },
    )
    .await
    .unwrap();

    match session.save().await.unwrap() {
        SaveOutcome::Committed { token, .. } => token,
        other => panic!("expected a committed session, got {other:?}"),
    }
}

async fn request(auth: &Auth, cookie: &str) -> Session {
    auth.sessions().load(Some(cookie)).await.unwrap()
}

#[tokio::test]
async fn register_login_me_logout() {
    let (auth, _) = setup().await;

    let id = register(&auth, "a@x.com").await;
    let cookie = login(&auth, "a@x.com").await;

    let session = request(&auth, &cookie).await;
    assert_eq!(auth.me(&session).unwrap(), id);

    let mut session = request(&auth, &cookie).await;
    auth.logout(&mut session).await.unwrap();
    assert!(matches!(auth.me(&session), Err(AuthError::Unauthorized)));
    assert_eq!(session.save().await.unwrap(), SaveOutcome::Destroyed);

    // The old cookie is dead on the next request too.
    let session = request(&auth, &cookie).await;
    assert!(matches!(auth.me(&session), Err(AuthError::Unauthorized)));
}

#[tokio::test]
async fn register_does_not_log_in() {
    let (auth, store) = setup().await;
    register(&auth, "a@x.com").await;
    assert!(store.all_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn force_logout_by_super_admin() {
    let (auth, store) = setup().await;

    // The first registered user gets id 1, the super admin.
    let admin = register(&auth, "admin@x.com").await;
    assert_eq!(admin, 1);
    let alice = register(&auth, "alice@x.com").await;
    let bob = register(&auth, "bob@x.com").await;

    let admin_cookie = login(&auth, "admin@x.com").await;
    let alice_laptop = login(&auth, "alice@x.com").await;
    let alice_phone = login(&auth, "alice@x.com").await;
    let bob_cookie = login(&auth, "bob@x.com").await;

    let admin_session = request(&auth, &admin_cookie).await;
    assert_eq!(auth.force_logout(&admin_session, alice).await.unwrap(), 2);

    for cookie in [&alice_laptop, &alice_phone] {
        assert_eq!(auth.sessions().authenticate(Some(cookie)).await.unwrap(), None);
    }
    assert_eq!(
        auth.sessions().authenticate(Some(&bob_cookie)).await.unwrap(),
        Some(bob)
    );

    let err = auth.force_logout(&admin_session, alice).await.unwrap_err();
    assert!(matches!(err, AuthError::NotLoggedIn));

    let remaining: Vec<_> = store
        .all_active()
        .await
        .unwrap()
        .into_iter()
        .filter_map(|record| record.user_id)
        .collect();
    assert!(!remaining.contains(&alice));
}

#[tokio::test]
async fn force_logout_by_anyone_else_looks_internal() {
    let (auth, _) = setup().await;
    register(&auth, "admin@x.com").await;
    let bob = register(&auth, "bob@x.com").await;
    let eve = register(&auth, "eve@x.com").await;

    let bob_cookie = login(&auth, "bob@x.com").await;
    let eve_cookie = login(&auth, "eve@x.com").await;

    let eve_session = request(&auth, &eve_cookie).await;
    let err = auth.force_logout(&eve_session, bob).await.unwrap_err();
    assert!(matches!(err, AuthError::Internal));
    assert_eq!(err.kind(), ErrorKind::Internal);

    let anonymous = auth.sessions().load(None).await.unwrap();
    assert!(matches!(
        auth.force_logout(&anonymous, eve).await,
        Err(AuthError::Internal)
    ));

    assert_eq!(
        auth.sessions().authenticate(Some(&bob_cookie)).await.unwrap(),
        Some(bob)
    );
}

#[tokio::test]
async fn csrf_tokens_are_tagged_and_unowned() {
    let (auth, store) = setup().await;
    register(&auth, "a@x.com").await;
    let cookie = login(&auth, "a@x.com").await;

    let session = request(&auth, &cookie).await;
    let token = auth.issue_csrf(&session).await.unwrap();

    let records = store.all_active().await.unwrap();
    let csrf: Vec<_> = records
        .iter()
        .filter(|r| r.kind() == PayloadKind::Csrf)
        .collect();
    assert_eq!(csrf.len(), 1);
    assert_eq!(csrf[0].user_id, None);

    // A CSRF token presented as a session cookie is not a login.
    assert_eq!(auth.sessions().authenticate(Some(&token)).await.unwrap(), None);

    auth.consume_csrf(&token).await.unwrap();
    assert!(matches!(
        auth.consume_csrf(&token).await,
        Err(AuthError::CsrfNotFound)
    ));
}

#[tokio::test]
async fn concurrent_csrf_consumption_has_one_winner() {
    let (auth, _) = setup().await;
    register(&auth, "a@x.com").await;
    let cookie = login(&auth, "a@x.com").await;
    let token = auth
        .issue_csrf(&request(&auth, &cookie).await)
        .await
        .unwrap();

    let (first, second) = tokio::join!(auth.consume_csrf(&token), auth.consume_csrf(&token));
    let outcomes = [first, second];

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(AuthError::CsrfNotFound)))
            .count(),
        1
    );
}
