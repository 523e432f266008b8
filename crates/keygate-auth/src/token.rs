//! Token codec: signed, stateless bearer tokens for the confirmation,
//! reset, and session flows.
//!
//! Tokens are compact JWS strings under a process-wide symmetric HS256
//! key. They carry no built-in expiry; only the reset token embeds its
//! issuance time. A token is a capability, not a proof — every engine
//! operation corroborates the embedded key/id against the live store
//! record before acting on it.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keygate_core::{KeygateError, KeygateResult};

/// Discriminant embedded in every token so one kind cannot be replayed
/// as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Confirmation,
    Reset,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationClaims {
    pub kind: TokenKind,
    pub app_id: String,
    pub email: String,
    pub lang: String,
    pub key: String,
}

impl ConfirmationClaims {
    pub fn new(app_id: &str, email: &str, lang: &str, key: &str) -> Self {
        Self {
            kind: TokenKind::Confirmation,
            app_id: app_id.into(),
            email: email.into(),
            lang: lang.into(),
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub kind: TokenKind,
    pub app_id: String,
    pub email: String,
    pub lang: String,
    pub key: String,
    /// Unix timestamp of the reset request, for link-side expiry
    /// display. The stored `reset_key_at` remains authoritative.
    pub issued_at: i64,
}

impl ResetClaims {
    pub fn new(app_id: &str, email: &str, lang: &str, key: &str, issued_at: i64) -> Self {
        Self {
            kind: TokenKind::Reset,
            app_id: app_id.into(),
            email: email.into(),
            lang: lang.into(),
            key: key.into(),
            issued_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub kind: TokenKind,
    pub session_id: Uuid,
}

impl SessionClaims {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            kind: TokenKind::Session,
            session_id,
        }
    }
}

pub fn sign_confirmation(signing_key: &str, claims: &ConfirmationClaims) -> KeygateResult<String> {
    encode_claims(signing_key, claims)
}

pub fn verify_confirmation(signing_key: &str, token: &str) -> KeygateResult<ConfirmationClaims> {
    let claims: ConfirmationClaims = decode_claims(signing_key, token)?;
    check_kind(claims.kind, TokenKind::Confirmation)?;
    Ok(claims)
}

pub fn sign_reset(signing_key: &str, claims: &ResetClaims) -> KeygateResult<String> {
    encode_claims(signing_key, claims)
}

pub fn verify_reset(signing_key: &str, token: &str) -> KeygateResult<ResetClaims> {
    let claims: ResetClaims = decode_claims(signing_key, token)?;
    check_kind(claims.kind, TokenKind::Reset)?;
    Ok(claims)
}

pub fn sign_session(signing_key: &str, claims: &SessionClaims) -> KeygateResult<String> {
    encode_claims(signing_key, claims)
}

pub fn verify_session(signing_key: &str, token: &str) -> KeygateResult<SessionClaims> {
    let claims: SessionClaims = decode_claims(signing_key, token)?;
    check_kind(claims.kind, TokenKind::Session)?;
    Ok(claims)
}

fn check_kind(got: TokenKind, expected: TokenKind) -> KeygateResult<()> {
    if got != expected {
        return Err(KeygateError::TokenInvalid(format!(
            "expected {expected:?} token, got {got:?}"
        )));
    }
    Ok(())
}

fn encode_claims<T: Serialize>(signing_key: &str, claims: &T) -> KeygateResult<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(signing_key.as_bytes()),
    )
    .map_err(|e| KeygateError::Crypto(format!("token encode: {e}")))
}

fn decode_claims<T: DeserializeOwned>(signing_key: &str, token: &str) -> KeygateResult<T> {
    // No registered claims are used, so nothing beyond the signature
    // is validated here.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<T>(
        token,
        &DecodingKey::from_secret(signing_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::Json(_) => KeygateError::TokenMalformed(e.to_string()),
        _ => KeygateError::TokenInvalid(e.to_string()),
    })
}
