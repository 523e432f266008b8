//! Integration tests for the authentication engine, driven by the
//! in-memory SurrealDB store and the recording mock mailer.

use std::collections::HashMap;
use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

use keygate_auth::config::{AuthConfig, MailTemplate};
use keygate_auth::service::AuthService;
use keygate_auth::sweeper::MaintenanceSweeper;
use keygate_auth::token;
use keygate_core::{CredentialStore, KeygateError};
use keygate_db::SurrealCredentialStore;
use keygate_mail::MockMailer;

const ADMIN_KEY: &str = "admin-secret";
const TOKEN_KEY: &str = "signing-key-for-tests";

type Store = SurrealCredentialStore<Db>;
type Service = AuthService<Store, Arc<MockMailer>>;

fn mail_templates(kind: &str) -> HashMap<String, MailTemplate> {
    let mut map = HashMap::new();
    map.insert(
        "en".to_string(),
        MailTemplate {
            subject: format!("{kind} your account"),
            body: format!("<a href=\"https://example.com/{kind}?token={{token}}\">{kind}</a>"),
        },
    );
    map
}

fn test_config() -> AuthConfig {
    AuthConfig {
        admin_key: ADMIN_KEY.into(),
        token_key: TOKEN_KEY.into(),
        from_email: "noreply@example.com".into(),
        max_unconfirmed_age_secs: 7 * 24 * 3600,
        max_idle_session_age_secs: 30 * 24 * 3600,
        max_reset_key_age_secs: 3600,
        mail_timeout_secs: 5,
        confirmation_mail: mail_templates("confirm"),
        reset_mail: mail_templates("reset"),
    }
}

/// Spin up an in-memory store, run migrations, and wire up the engine
/// with a recording mailer.
async fn setup() -> (Service, Store, Arc<MockMailer>) {
    setup_with(test_config()).await
}

async fn setup_with(cfg: AuthConfig) -> (Service, Store, Arc<MockMailer>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    keygate_db::run_migrations(&db).await.unwrap();

    let store = SurrealCredentialStore::new(db);
    let mailer = Arc::new(MockMailer::new());
    let svc = AuthService::new(store.clone(), mailer.clone(), cfg);

    (svc, store, mailer)
}

// -----------------------------------------------------------------------
// Signup and confirmation
// -----------------------------------------------------------------------

#[tokio::test]
async fn signup_creates_unconfirmed_user_and_sends_mail() {
    let (svc, store, mailer) = setup().await;

    let token_str = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    assert!(!token_str.is_empty());

    let claims = token::verify_confirmation(TOKEN_KEY, &token_str).unwrap();
    assert_eq!(claims.app_id, "app1");
    assert_eq!(claims.email, "a@x.com");
    assert_eq!(claims.lang, "en");

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    assert_eq!(user.confirmation_key.as_deref(), Some(claims.key.as_str()));
    assert!(user.confirmed_at.is_none());

    assert_eq!(mailer.sent_count(), 1);
    let mail = &mailer.sent()[0];
    assert_eq!(mail.to, vec!["a@x.com".to_string()]);
    assert!(mail.body.contains(&token_str));
}

#[tokio::test]
async fn signup_fails_when_mail_delivery_fails() {
    let (svc, store, mailer) = setup().await;
    mailer.set_fail(true);

    let err = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap_err();
    assert!(matches!(err, KeygateError::Mail(_)));

    // The account exists; resend recovers the token once mail works.
    mailer.set_fail(false);
    let token_str = svc
        .resend_confirmation_mail("app1", "a@x.com", "en")
        .await
        .unwrap();
    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    let claims = token::verify_confirmation(TOKEN_KEY, &token_str).unwrap();
    assert_eq!(user.confirmation_key.as_deref(), Some(claims.key.as_str()));
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let (svc, _store, _mailer) = setup().await;

    svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    let err = svc
        .signup("app1", "a@x.com", "other", "en")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::Conflict { .. }));
}

#[tokio::test]
async fn same_email_in_another_app_is_not_a_conflict() {
    let (svc, _store, _mailer) = setup().await;

    svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    assert!(svc.signup("app2", "a@x.com", "pw", "en").await.is_ok());
}

#[tokio::test]
async fn concurrent_signups_resolve_to_one_success() {
    let (svc, _store, _mailer) = setup().await;

    let (r1, r2) = tokio::join!(
        svc.signup("app1", "a@x.com", "pw", "en"),
        svc.signup("app1", "a@x.com", "pw", "en"),
    );

    let successes = [&r1, &r2].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent signup may win");
    for r in [r1, r2] {
        if let Err(err) = r {
            assert!(matches!(err, KeygateError::Conflict { .. }));
        }
    }
}

#[tokio::test]
async fn resend_embeds_the_same_confirmation_key() {
    let (svc, _store, mailer) = setup().await;

    let t1 = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    let t2 = svc
        .resend_confirmation_mail("app1", "a@x.com", "en")
        .await
        .unwrap();

    let c1 = token::verify_confirmation(TOKEN_KEY, &t1).unwrap();
    let c2 = token::verify_confirmation(TOKEN_KEY, &t2).unwrap();
    assert_eq!(c1.key, c2.key, "the confirmation key is not rotated");
    assert_eq!(mailer.sent_count(), 2);
}

#[tokio::test]
async fn resend_for_unknown_user_is_not_found() {
    let (svc, _store, _mailer) = setup().await;

    let err = svc
        .resend_confirmation_mail("app1", "ghost@x.com", "en")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::NotFound { .. }));
}

#[tokio::test]
async fn confirm_signup_sets_confirmed_at_once() {
    let (svc, store, _mailer) = setup().await;

    let token_str = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.confirm_signup(&token_str).await.unwrap();

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    assert!(user.confirmed_at.is_some());
    assert!(user.confirmation_key.is_none(), "key consumed on confirm");

    // Replay after success: the stored key is gone.
    let err = svc.confirm_signup(&token_str).await.unwrap_err();
    assert!(matches!(err, KeygateError::KeyMismatch));
}

#[tokio::test]
async fn confirm_with_tampered_token_is_invalid() {
    let (svc, _store, _mailer) = setup().await;

    let mut token_str = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    token_str.push('x');

    let err = svc.confirm_signup(&token_str).await.unwrap_err();
    assert!(matches!(err, KeygateError::TokenInvalid(_)));
}

#[tokio::test]
async fn confirm_for_removed_user_is_not_found() {
    let (svc, store, _mailer) = setup().await;

    let token_str = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    store.remove_users(&[user.id]).await.unwrap();

    let err = svc.confirm_signup(&token_str).await.unwrap_err();
    assert!(matches!(err, KeygateError::NotFound { .. }));
}

// -----------------------------------------------------------------------
// Signin and signout
// -----------------------------------------------------------------------

#[tokio::test]
async fn signin_before_confirmation_is_rejected() {
    let (svc, _store, _mailer) = setup().await;

    svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    let err = svc.signin("app1", "a@x.com", "pw").await.unwrap_err();
    assert!(matches!(err, KeygateError::Unconfirmed));
}

#[tokio::test]
async fn signin_roundtrip_and_idempotent_signout() {
    let (svc, store, _mailer) = setup().await;

    let confirmation = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.confirm_signup(&confirmation).await.unwrap();

    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let claims = token::verify_session(TOKEN_KEY, &session_token).unwrap();

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    let session = store.get_session(claims.session_id).await.unwrap();
    assert_eq!(session.user_id, user.id);

    svc.signout(&session_token).await.unwrap();
    let err = store.get_session(claims.session_id).await.unwrap_err();
    assert!(matches!(err, KeygateError::NotFound { .. }));

    // Signing out again is still a success.
    svc.signout(&session_token).await.unwrap();
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let (svc, _store, _mailer) = setup().await;

    let confirmation = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.confirm_signup(&confirmation).await.unwrap();

    let wrong_pass = svc.signin("app1", "a@x.com", "nope").await.unwrap_err();
    let unknown = svc.signin("app1", "ghost@x.com", "pw").await.unwrap_err();

    assert!(matches!(wrong_pass, KeygateError::InvalidCredential));
    assert!(matches!(unknown, KeygateError::InvalidCredential));
}

#[tokio::test]
async fn a_user_may_hold_multiple_sessions() {
    let (svc, store, _mailer) = setup().await;

    let confirmation = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.confirm_signup(&confirmation).await.unwrap();

    let s1 = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let s2 = svc.signin("app1", "a@x.com", "pw").await.unwrap();

    let c1 = token::verify_session(TOKEN_KEY, &s1).unwrap();
    let c2 = token::verify_session(TOKEN_KEY, &s2).unwrap();
    assert_ne!(c1.session_id, c2.session_id);

    assert!(store.get_session(c1.session_id).await.is_ok());
    assert!(store.get_session(c2.session_id).await.is_ok());
}

// -----------------------------------------------------------------------
// Password reset
// -----------------------------------------------------------------------

async fn confirmed_user(svc: &Service) {
    let confirmation = svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.confirm_signup(&confirmation).await.unwrap();
}

#[tokio::test]
async fn forgot_password_requires_a_confirmed_account() {
    let (svc, _store, _mailer) = setup().await;

    svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    let err = svc
        .forgot_password("app1", "a@x.com", "en")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::Unconfirmed));
}

#[tokio::test]
async fn reset_password_consumes_the_key() {
    let (svc, store, mailer) = setup().await;
    confirmed_user(&svc).await;

    let reset_token = svc.forgot_password("app1", "a@x.com", "en").await.unwrap();
    assert_eq!(mailer.sent_count(), 2);

    let claims = token::verify_reset(TOKEN_KEY, &reset_token).unwrap();
    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    assert_eq!(user.reset_key.as_deref(), Some(claims.key.as_str()));

    svc.reset_password(&reset_token, "newpw").await.unwrap();

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    assert!(user.reset_key.is_none(), "reset key is single-use");

    // Old password dead, new one works.
    let err = svc.signin("app1", "a@x.com", "pw").await.unwrap_err();
    assert!(matches!(err, KeygateError::InvalidCredential));
    svc.signin("app1", "a@x.com", "newpw").await.unwrap();

    // Replaying the consumed token is a key mismatch.
    let err = svc.reset_password(&reset_token, "again").await.unwrap_err();
    assert!(matches!(err, KeygateError::KeyMismatch));
}

#[tokio::test]
async fn a_new_reset_request_supersedes_the_old_one() {
    let (svc, _store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let t1 = svc.forgot_password("app1", "a@x.com", "en").await.unwrap();
    let t2 = svc.forgot_password("app1", "a@x.com", "en").await.unwrap();

    let err = svc.reset_password(&t1, "newpw").await.unwrap_err();
    assert!(matches!(err, KeygateError::KeyMismatch));
    svc.reset_password(&t2, "newpw").await.unwrap();
}

#[tokio::test]
async fn stale_reset_key_expires_even_when_it_matches() {
    let mut cfg = test_config();
    cfg.max_reset_key_age_secs = 0;
    let (svc, _store, _mailer) = setup_with(cfg).await;
    confirmed_user(&svc).await;

    let reset_token = svc.forgot_password("app1", "a@x.com", "en").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let err = svc.reset_password(&reset_token, "newpw").await.unwrap_err();
    assert!(matches!(err, KeygateError::TokenExpired));
}

// -----------------------------------------------------------------------
// Credential changes
// -----------------------------------------------------------------------

#[tokio::test]
async fn change_password_invalidates_old_password_and_reset_key() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();

    // An in-flight reset must not survive a password change.
    svc.forgot_password("app1", "a@x.com", "en").await.unwrap();

    svc.change_password(&session_token, "pw", "newpw")
        .await
        .unwrap();

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    assert!(user.reset_key.is_none());

    let err = svc.signin("app1", "a@x.com", "pw").await.unwrap_err();
    assert!(matches!(err, KeygateError::InvalidCredential));
    svc.signin("app1", "a@x.com", "newpw").await.unwrap();
}

#[tokio::test]
async fn change_password_requires_the_old_password() {
    let (svc, _store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let err = svc
        .change_password(&session_token, "wrong", "newpw")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::InvalidCredential));
}

#[tokio::test]
async fn change_email_keeps_the_user_id() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let before = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();

    svc.change_email(&session_token, "pw", "b@x.com")
        .await
        .unwrap();

    let after = store.get_user_by_email("app1", "b@x.com").await.unwrap();
    assert_eq!(after.id, before.id);
    assert!(
        store.get_user_by_email("app1", "a@x.com").await.is_err(),
        "old address no longer resolves"
    );
}

#[tokio::test]
async fn change_email_to_a_taken_address_is_a_conflict() {
    let (svc, _store, _mailer) = setup().await;
    confirmed_user(&svc).await;
    svc.create_user(ADMIN_KEY, "app1", "b@x.com", "pw", "en")
        .await
        .unwrap();

    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let err = svc
        .change_email(&session_token, "pw", "b@x.com")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::Conflict { .. }));
}

#[tokio::test]
async fn a_signed_out_session_cannot_change_credentials() {
    let (svc, _store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let session_token = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    svc.signout(&session_token).await.unwrap();

    let err = svc
        .change_password(&session_token, "pw", "newpw")
        .await
        .unwrap_err();
    assert!(matches!(err, KeygateError::NotFound { .. }));
}

// -----------------------------------------------------------------------
// Admin operations
// -----------------------------------------------------------------------

#[tokio::test]
async fn admin_operations_require_the_admin_key() {
    let (svc, _store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    assert!(matches!(
        svc.get_users("wrong", None).await.unwrap_err(),
        KeygateError::Unauthorized
    ));
    assert!(matches!(
        svc.create_user("wrong", "app1", "b@x.com", "pw", "en")
            .await
            .unwrap_err(),
        KeygateError::Unauthorized
    ));
    assert!(matches!(
        svc.remove_users("wrong", &[Uuid::new_v4()]).await.unwrap_err(),
        KeygateError::Unauthorized
    ));
    assert!(matches!(
        svc.change_user_password("wrong", Uuid::new_v4(), "pw")
            .await
            .unwrap_err(),
        KeygateError::Unauthorized
    ));

    // Nothing was created behind the failed gate.
    let users = svc.get_users(ADMIN_KEY, None).await.unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn admin_created_users_skip_confirmation() {
    let (svc, _store, mailer) = setup().await;

    let user = svc
        .create_user(ADMIN_KEY, "app1", "b@x.com", "pw", "en")
        .await
        .unwrap();
    assert!(user.is_confirmed());
    assert!(user.confirmation_key.is_none());
    assert_eq!(mailer.sent_count(), 0, "no confirmation mail is sent");

    svc.signin("app1", "b@x.com", "pw").await.unwrap();
}

#[tokio::test]
async fn get_users_filters_by_app() {
    let (svc, _store, _mailer) = setup().await;

    svc.signup("app1", "a@x.com", "pw", "en").await.unwrap();
    svc.signup("app2", "b@x.com", "pw", "en").await.unwrap();

    let all = svc.get_users(ADMIN_KEY, None).await.unwrap();
    assert_eq!(all.len(), 2);

    let app1 = svc.get_users(ADMIN_KEY, Some("app1")).await.unwrap();
    assert_eq!(app1.len(), 1);
    assert_eq!(app1[0].email, "a@x.com");
    assert!(app1[0].confirmed_at.is_none());
}

#[tokio::test]
async fn admin_password_change_clears_reset_keys() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let reset_token = svc.forgot_password("app1", "a@x.com", "en").await.unwrap();
    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();

    svc.change_user_password(ADMIN_KEY, user.id, "newpw")
        .await
        .unwrap();

    let err = svc.reset_password(&reset_token, "again").await.unwrap_err();
    assert!(matches!(err, KeygateError::KeyMismatch));
    svc.signin("app1", "a@x.com", "newpw").await.unwrap();
}

#[tokio::test]
async fn admin_email_change_keeps_credentials_working() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    svc.change_user_email(ADMIN_KEY, user.id, "moved@x.com")
        .await
        .unwrap();

    let moved = store.get_user_by_email("app1", "moved@x.com").await.unwrap();
    assert_eq!(moved.id, user.id);
    assert!(store.get_user_by_email("app1", "a@x.com").await.is_err());

    // Password and confirmation state survive the address change.
    svc.signin("app1", "moved@x.com", "pw").await.unwrap();
}

#[tokio::test]
async fn remove_users_cascades_to_their_sessions() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    let s1 = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let s2 = svc.signin("app1", "a@x.com", "pw").await.unwrap();
    let c1 = token::verify_session(TOKEN_KEY, &s1).unwrap();
    let c2 = token::verify_session(TOKEN_KEY, &s2).unwrap();

    let user = store.get_user_by_email("app1", "a@x.com").await.unwrap();
    svc.remove_users(ADMIN_KEY, &[user.id]).await.unwrap();

    assert!(matches!(
        store.get_user_by_email("app1", "a@x.com").await.unwrap_err(),
        KeygateError::NotFound { .. }
    ));
    assert!(matches!(
        store.get_session(c1.session_id).await.unwrap_err(),
        KeygateError::NotFound { .. }
    ));
    assert!(matches!(
        store.get_session(c2.session_id).await.unwrap_err(),
        KeygateError::NotFound { .. }
    ));
}

// -----------------------------------------------------------------------
// Maintenance sweeper
// -----------------------------------------------------------------------

#[tokio::test]
async fn sweeper_purges_only_stale_unconfirmed_users() {
    let (svc, store, _mailer) = setup().await;

    svc.signup("app1", "stale@x.com", "pw", "en").await.unwrap();
    confirmed_user(&svc).await; // a@x.com, confirmed

    let sweeper = MaintenanceSweeper::new(store.clone(), test_config());
    let cutoff = chrono::Utc::now() + chrono::Duration::hours(1);

    let purged = sweeper
        .purge_unconfirmed_before(ADMIN_KEY, cutoff)
        .await
        .unwrap();
    assert_eq!(purged, 1);

    assert!(store.get_user_by_email("app1", "stale@x.com").await.is_err());
    assert!(store.get_user_by_email("app1", "a@x.com").await.is_ok());

    // Running it again finds nothing.
    let purged = sweeper
        .purge_unconfirmed_before(ADMIN_KEY, cutoff)
        .await
        .unwrap();
    assert_eq!(purged, 0);
}

#[tokio::test]
async fn sweeper_purges_idle_sessions() {
    let (svc, store, _mailer) = setup().await;
    confirmed_user(&svc).await;

    svc.signin("app1", "a@x.com", "pw").await.unwrap();
    svc.signin("app1", "a@x.com", "pw").await.unwrap();

    let sweeper = MaintenanceSweeper::new(store.clone(), test_config());
    let cutoff = chrono::Utc::now() + chrono::Duration::hours(1);

    let purged = sweeper
        .purge_idle_sessions_before(ADMIN_KEY, cutoff)
        .await
        .unwrap();
    assert_eq!(purged, 2);
}

#[tokio::test]
async fn sweeper_is_admin_gated() {
    let (_svc, store, _mailer) = setup().await;

    let sweeper = MaintenanceSweeper::new(store, test_config());
    assert!(matches!(
        sweeper.remove_unconfirmed_users("wrong").await.unwrap_err(),
        KeygateError::Unauthorized
    ));
    assert!(matches!(
        sweeper.remove_idle_sessions("wrong").await.unwrap_err(),
        KeygateError::Unauthorized
    ));
}
