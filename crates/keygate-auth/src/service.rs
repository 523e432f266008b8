//! Authentication engine — signup, confirmation, sessions, password
//! reset, credential changes, and admin account management.
//!
//! Every token-accepting operation is a verify-then-corroborate
//! two-step: the signature proves the token was minted here, the store
//! lookup proves the embedded key or id is still live. The engine
//! holds no mutable state and performs no locking; atomicity is the
//! store's contract.

use std::time::Duration as StdDuration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use keygate_core::models::{NewUser, Session, User, UserView};
use keygate_core::{CredentialStore, KeygateError, KeygateResult, Mail, MailDispatcher};

use crate::admin::AdminGate;
use crate::config::AuthConfig;
use crate::mail::build_mail;
use crate::password::{hash_password, verify_password};
use crate::token::{
    ConfirmationClaims, ResetClaims, SessionClaims, sign_confirmation, sign_reset, sign_session,
    verify_confirmation, verify_reset, verify_session,
};

/// The authentication engine.
///
/// Generic over the store and mail dispatcher so the engine has no
/// dependency on any backend crate. Only mail dispatch is bounded by
/// `mail_timeout_secs`; store calls inherit whatever I/O limits the
/// backend client is configured with.
pub struct AuthService<S: CredentialStore, M: MailDispatcher> {
    store: S,
    mailer: M,
    gate: AdminGate,
    cfg: AuthConfig,
}

impl<S: CredentialStore, M: MailDispatcher> AuthService<S, M> {
    pub fn new(store: S, mailer: M, cfg: AuthConfig) -> Self {
        let gate = AdminGate::new(cfg.admin_key.clone());
        Self {
            store,
            mailer,
            gate,
            cfg,
        }
    }

    // -------------------------------------------------------------------
    // Signup and confirmation
    // -------------------------------------------------------------------

    /// Create an unconfirmed account and mail its confirmation token.
    ///
    /// Fails with `Conflict` if `(app_id, email)` is taken. Mail
    /// delivery failure fails the whole call: the caller has no other
    /// way to recover the token, and `resend_confirmation_mail` can
    /// retry later.
    pub async fn signup(
        &self,
        app_id: &str,
        email: &str,
        password: &str,
        lang: &str,
    ) -> KeygateResult<String> {
        let hashed_pass = hash_password(password)?;
        let confirmation_key = Uuid::new_v4().to_string();

        let user = self
            .store
            .create_user(NewUser {
                app_id: app_id.to_string(),
                email: email.to_string(),
                hashed_pass,
                lang: lang.to_string(),
                confirmation_key: Some(confirmation_key.clone()),
                confirmed: false,
            })
            .await?;

        info!(app_id, user_id = %user.id, "user signed up");
        self.send_confirmation_mail(app_id, email, lang, &confirmation_key)
            .await
    }

    /// Re-sign a token around the *existing* confirmation key and
    /// re-send the mail. The key is not rotated, so tokens from
    /// earlier mails stay usable.
    pub async fn resend_confirmation_mail(
        &self,
        app_id: &str,
        email: &str,
        lang: &str,
    ) -> KeygateResult<String> {
        let user = self.store.get_user_by_email(app_id, email).await?;

        // A confirmed account has no key left to resend.
        let key = user.confirmation_key.ok_or(KeygateError::KeyMismatch)?;
        self.send_confirmation_mail(app_id, email, lang, &key).await
    }

    /// Transition `Unconfirmed -> Confirmed`. The token's embedded key
    /// must equal the stored one; confirmation clears the key, so a
    /// replay after success fails `KeyMismatch`.
    pub async fn confirm_signup(&self, confirmation_token: &str) -> KeygateResult<()> {
        let claims = verify_confirmation(&self.cfg.token_key, confirmation_token)?;

        let user = self
            .store
            .get_user_by_email(&claims.app_id, &claims.email)
            .await?;

        match &user.confirmation_key {
            Some(stored) if *stored == claims.key => {}
            _ => return Err(KeygateError::KeyMismatch),
        }

        self.store.set_confirmed_at(user.id, Utc::now()).await?;
        info!(app_id = %claims.app_id, user_id = %user.id, "signup confirmed");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------

    /// Authenticate and open a session.
    ///
    /// Unknown email and wrong password collapse into a single
    /// `InvalidCredential` so callers cannot enumerate accounts.
    pub async fn signin(&self, app_id: &str, email: &str, password: &str) -> KeygateResult<String> {
        let user = self
            .store
            .get_user_by_email(app_id, email)
            .await
            .map_err(hide_not_found)?;

        if !user.is_confirmed() {
            return Err(KeygateError::Unconfirmed);
        }

        if !verify_password(password, &user.hashed_pass)? {
            return Err(KeygateError::InvalidCredential);
        }

        let session = self.store.create_session(user.id).await?;
        info!(app_id, user_id = %user.id, session_id = %session.id, "signed in");

        sign_session(&self.cfg.token_key, &SessionClaims::new(session.id))
    }

    /// Delete the session record behind the token. Idempotent: a
    /// session that is already gone is a successful signout.
    pub async fn signout(&self, session_token: &str) -> KeygateResult<()> {
        let claims = verify_session(&self.cfg.token_key, session_token)?;
        self.store.remove_session(claims.session_id).await?;
        info!(session_id = %claims.session_id, "signed out");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Password reset
    // -------------------------------------------------------------------

    /// Issue a fresh reset key (overwriting any outstanding one) and
    /// mail the signed reset token. Requires a confirmed account.
    pub async fn forgot_password(
        &self,
        app_id: &str,
        email: &str,
        lang: &str,
    ) -> KeygateResult<String> {
        let user = self.store.get_user_by_email(app_id, email).await?;

        if !user.is_confirmed() {
            return Err(KeygateError::Unconfirmed);
        }

        let reset_key = Uuid::new_v4().to_string();
        let requested_at = Utc::now();
        self.store
            .set_reset_key(user.id, &reset_key, requested_at)
            .await?;

        let claims = ResetClaims::new(app_id, email, lang, &reset_key, requested_at.timestamp());
        let token = sign_reset(&self.cfg.token_key, &claims)?;

        let mail = build_mail(
            &self.cfg.reset_mail,
            &self.cfg.from_email,
            email,
            lang,
            &token,
        )?;
        self.dispatch(mail).await?;

        info!(app_id, user_id = %user.id, "password reset requested");
        Ok(token)
    }

    /// Consume a reset token: verify, corroborate the key, check its
    /// age against the stored request time, then store the new hash.
    /// The key is single-use — storing the hash clears it.
    pub async fn reset_password(&self, reset_token: &str, new_password: &str) -> KeygateResult<()> {
        let claims = verify_reset(&self.cfg.token_key, reset_token)?;

        let user = self
            .store
            .get_user_by_email(&claims.app_id, &claims.email)
            .await?;

        match &user.reset_key {
            Some(stored) if *stored == claims.key => {}
            _ => return Err(KeygateError::KeyMismatch),
        }

        // The stored request time is authoritative; the claim's
        // issued_at is informational only.
        let requested_at = user.reset_key_at.ok_or(KeygateError::KeyMismatch)?;
        if Utc::now() > requested_at + self.cfg.max_reset_key_age() {
            return Err(KeygateError::TokenExpired);
        }

        let hashed_pass = hash_password(new_password)?;
        self.store.set_hashed_pass(user.id, &hashed_pass).await?;
        info!(app_id = %claims.app_id, user_id = %user.id, "password reset");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Credential changes
    // -------------------------------------------------------------------

    /// Change the password of the signed-in user. Also invalidates any
    /// in-flight reset.
    pub async fn change_password(
        &self,
        session_token: &str,
        old_password: &str,
        new_password: &str,
    ) -> KeygateResult<()> {
        let user = self.resolve_session(session_token).await?;

        if !verify_password(old_password, &user.hashed_pass)? {
            return Err(KeygateError::InvalidCredential);
        }

        let hashed_pass = hash_password(new_password)?;
        self.store.set_hashed_pass(user.id, &hashed_pass).await?;
        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Change the email of the signed-in user. Fails with `Conflict`
    /// if the new address collides within the same app.
    pub async fn change_email(
        &self,
        session_token: &str,
        password: &str,
        new_email: &str,
    ) -> KeygateResult<()> {
        let user = self.resolve_session(session_token).await?;

        if !verify_password(password, &user.hashed_pass)? {
            return Err(KeygateError::InvalidCredential);
        }

        self.store.set_email(user.id, new_email).await?;
        info!(user_id = %user.id, "email changed");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Admin operations
    // -------------------------------------------------------------------

    /// List users, optionally restricted to one app.
    pub async fn get_users(
        &self,
        admin_key: &str,
        app_id: Option<&str>,
    ) -> KeygateResult<Vec<UserView>> {
        self.gate.authorize(admin_key)?;
        self.store.list_users(app_id).await
    }

    /// Create a pre-confirmed account, bypassing the mail flow.
    pub async fn create_user(
        &self,
        admin_key: &str,
        app_id: &str,
        email: &str,
        password: &str,
        lang: &str,
    ) -> KeygateResult<User> {
        self.gate.authorize(admin_key)?;

        let hashed_pass = hash_password(password)?;
        let user = self
            .store
            .create_user(NewUser {
                app_id: app_id.to_string(),
                email: email.to_string(),
                hashed_pass,
                lang: lang.to_string(),
                confirmation_key: None,
                confirmed: true,
            })
            .await?;

        info!(app_id, user_id = %user.id, "user created by admin");
        Ok(user)
    }

    /// Set a user's password directly. Clears any outstanding reset
    /// key, like every other password write.
    pub async fn change_user_password(
        &self,
        admin_key: &str,
        user_id: Uuid,
        new_password: &str,
    ) -> KeygateResult<()> {
        self.gate.authorize(admin_key)?;

        let hashed_pass = hash_password(new_password)?;
        self.store.set_hashed_pass(user_id, &hashed_pass).await
    }

    pub async fn change_user_email(
        &self,
        admin_key: &str,
        user_id: Uuid,
        new_email: &str,
    ) -> KeygateResult<()> {
        self.gate.authorize(admin_key)?;
        self.store.set_email(user_id, new_email).await
    }

    /// Remove users and, in the same store transaction, every session
    /// they own.
    pub async fn remove_users(&self, admin_key: &str, user_ids: &[Uuid]) -> KeygateResult<()> {
        self.gate.authorize(admin_key)?;

        self.store.remove_users(user_ids).await?;
        info!(count = user_ids.len(), "users removed");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Verify a session token and corroborate it against the live
    /// session record, then load the owning user.
    async fn resolve_session(&self, session_token: &str) -> KeygateResult<User> {
        let claims = verify_session(&self.cfg.token_key, session_token)?;
        let session: Session = self.store.get_session(claims.session_id).await?;
        self.store.get_user_by_id(session.user_id).await
    }

    async fn send_confirmation_mail(
        &self,
        app_id: &str,
        email: &str,
        lang: &str,
        confirmation_key: &str,
    ) -> KeygateResult<String> {
        let claims = ConfirmationClaims::new(app_id, email, lang, confirmation_key);
        let token = sign_confirmation(&self.cfg.token_key, &claims)?;

        let mail = build_mail(
            &self.cfg.confirmation_mail,
            &self.cfg.from_email,
            email,
            lang,
            &token,
        )?;
        self.dispatch(mail).await?;
        Ok(token)
    }

    /// Dispatch with a bounded timeout; expiry is a delivery failure.
    async fn dispatch(&self, mail: Mail) -> KeygateResult<()> {
        let timeout = StdDuration::from_secs(self.cfg.mail_timeout_secs);
        match tokio::time::timeout(timeout, self.mailer.send(mail)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("mail dispatch timed out");
                Err(KeygateError::Mail("mail dispatch timed out".into()))
            }
        }
    }
}

/// Collapse `NotFound` into `InvalidCredential` at the signin
/// boundary; everything else passes through.
fn hide_not_found(err: KeygateError) -> KeygateError {
    match err {
        KeygateError::NotFound { .. } => KeygateError::InvalidCredential,
        other => other,
    }
}
