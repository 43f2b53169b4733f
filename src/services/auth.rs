/**
 * Authentication Service
 *
 * Challenge/response handshake with HMAC-SHA256:
 * - The client fetches a challenge
 * - It returns HMAC-SHA256(key = public key bytes, message = challenge)
 * - A matching MAC opens a 24-hour session for that key
 *
 * The MAC key is the public key itself, so anyone who knows a key can
 * produce a valid signature for it. A successful verify only shows that the
 * caller answered a fresh, unexpired, single-use challenge for the key it
 * names. It does not prove possession of a secret. Treat the key as an
 * account label, not a credential.
 *
 * Sessions are held in memory only.
 */

use crate::types::{AuthChallenge, AuthRequest, Session};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Default session lifetime.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Authentication service for managing challenges and sessions.
#[derive(Clone)]
pub struct AuthService {
    /// Active challenges (challenge_string -> AuthChallenge)
    challenges: Arc<DashMap<String, AuthChallenge>>,
    /// Active sessions (session_token -> Session)
    sessions: Arc<DashMap<String, Session>>,
    session_ttl_hours: i64,
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthService {
    pub fn new() -> Self {
        Self::with_session_ttl(SESSION_TTL_HOURS)
    }

    pub fn with_session_ttl(session_ttl_hours: i64) -> Self {
        Self {
            challenges: Arc::new(DashMap::new()),
            sessions: Arc::new(DashMap::new()),
            session_ttl_hours,
        }
    }

    /// Generate a new authentication challenge.
    pub fn create_challenge(&self) -> AuthChallenge {
        let challenge = AuthChallenge::new();
        self.challenges
            .insert(challenge.challenge.clone(), challenge.clone());
        debug!("Created auth challenge: {}", &challenge.challenge[..16]);
        challenge
    }

    /// Verify a signed challenge and open a session.
    ///
    /// A challenge can be used once, whether or not verification succeeds.
    pub fn verify(&self, request: &AuthRequest) -> Result<Session, AuthError> {
        let challenge = self
            .challenges
            .remove(&request.challenge)
            .map(|(_, c)| c)
            .ok_or(AuthError::InvalidChallenge)?;

        if challenge.is_expired() {
            warn!("Expired challenge used by {}", short(&request.public_key));
            return Err(AuthError::ExpiredChallenge);
        }

        verify_hmac_signature(&request.public_key, &request.challenge, &request.signature)?;

        let session = Session::new(normalize_key(&request.public_key), self.session_ttl_hours);
        self.sessions.insert(session.token.clone(), session.clone());

        info!("Authenticated user: {}", short(&request.public_key));
        Ok(session)
    }

    /// Validate a session token, dropping it if it has expired.
    pub fn validate_session(&self, token: &str) -> Option<Session> {
        // Clone and release the ref before removing
        let session = self.sessions.get(token).map(|s| s.clone())?;

        if session.is_expired() {
            self.sessions.remove(token);
            return None;
        }
        Some(session)
    }

    /// Logout - invalidate session.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop expired challenges and sessions.
    pub fn purge_expired(&self) -> usize {
        let before = self.challenges.len() + self.sessions.len();
        self.challenges.retain(|_, c| !c.is_expired());
        self.sessions.retain(|_, s| !s.is_expired());
        let purged = before.saturating_sub(self.challenges.len() + self.sessions.len());
        if purged > 0 {
            debug!("Purged {} expired auth entries", purged);
        }
        purged
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Sign a challenge the way clients are expected to.
pub fn sign_challenge(public_key: &str, challenge: &str) -> Result<String, AuthError> {
    let key = decode_public_key(public_key)?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| AuthError::InvalidPublicKeyFormat)?;
    mac.update(challenge.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify `HMAC-SHA256(key = public key bytes, message = challenge)`.
fn verify_hmac_signature(public_key: &str, challenge: &str, signature: &str) -> Result<(), AuthError> {
    let sig_hex = signature.strip_prefix("0x").unwrap_or(signature);
    let signature_bytes = hex::decode(sig_hex).map_err(|_| AuthError::InvalidSignatureFormat)?;

    // HMAC-SHA256 output
    if signature_bytes.len() != 32 {
        return Err(AuthError::InvalidSignatureFormat);
    }

    let key = decode_public_key(public_key)?;
    let mut mac = HmacSha256::new_from_slice(&key).map_err(|_| AuthError::InvalidPublicKeyFormat)?;
    mac.update(challenge.as_bytes());

    mac.verify_slice(&signature_bytes).map_err(|_| {
        warn!("Invalid signature from {}", short(public_key));
        AuthError::InvalidSignature
    })
}

fn decode_public_key(public_key: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = hex::decode(normalize_key(public_key)).map_err(|_| AuthError::InvalidPublicKeyFormat)?;

    // 32-byte keys or 20-byte addresses
    if bytes.len() != 32 && bytes.len() != 20 {
        return Err(AuthError::InvalidPublicKeyFormat);
    }
    Ok(bytes)
}

fn normalize_key(public_key: &str) -> String {
    public_key
        .strip_prefix("0x")
        .unwrap_or(public_key)
        .to_lowercase()
}

fn short(key: &str) -> &str {
    key.get(..16).unwrap_or(key)
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid challenge")]
    InvalidChallenge,

    #[error("Challenge expired")]
    ExpiredChallenge,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid signature format")]
    InvalidSignatureFormat,

    #[error("Invalid public key format")]
    InvalidPublicKeyFormat,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Unauthorized")]
    Unauthorized,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidChallenge => "INVALID_CHALLENGE",
            AuthError::ExpiredChallenge => "EXPIRED_CHALLENGE",
            AuthError::InvalidSignature => "INVALID_SIGNATURE",
            AuthError::InvalidSignatureFormat => "INVALID_SIGNATURE_FORMAT",
            AuthError::InvalidPublicKeyFormat => "INVALID_PUBLIC_KEY",
            AuthError::SessionNotFound | AuthError::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            AuthError::InvalidChallenge
            | AuthError::ExpiredChallenge
            | AuthError::InvalidSignatureFormat
            | AuthError::InvalidPublicKeyFormat => axum::http::StatusCode::BAD_REQUEST,
            AuthError::InvalidSignature | AuthError::SessionNotFound | AuthError::Unauthorized => {
                axum::http::StatusCode::UNAUTHORIZED
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}
