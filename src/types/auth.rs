//! Authentication Types
//!
//! Types for challenge-based session authentication.
//! Clients sign the challenge with HMAC-SHA256 keyed by their public key.

use serde::{Deserialize, Serialize};

/// Challenge lifetime.
const CHALLENGE_TTL_MS: i64 = 5 * 60 * 1000;

/// Challenge issued to clients for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    /// Random challenge string to sign
    pub challenge: String,
    /// Timestamp when challenge was issued (ms)
    pub timestamp: i64,
    /// Expiration timestamp (ms)
    pub expires_at: i64,
}

/// Authentication request from client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Client's public key (hex-encoded)
    pub public_key: String,
    /// The challenge that was signed
    pub challenge: String,
    /// HMAC signature of the challenge (hex-encoded)
    pub signature: String,
}

/// Authentication response on successful verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub authenticated: bool,
    /// The authenticated public key, used as the user id
    pub public_key: String,
    /// Session token for subsequent requests
    pub session_token: String,
    /// When the session expires (ms)
    pub expires_at: i64,
}

/// Server-side session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub public_key: String,
    pub created_at: i64,
    pub expires_at: i64,
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub session_expires_at: i64,
}

impl Default for AuthChallenge {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthChallenge {
    /// Create a new challenge with 5-minute expiry.
    pub fn new() -> Self {
        use rand::Rng;
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let challenge: String = (0..32)
            .map(|_| format!("{:02x}", rng.gen::<u8>()))
            .collect();

        Self {
            challenge,
            timestamp,
            expires_at: timestamp + CHALLENGE_TTL_MS,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() > self.expires_at
    }
}

impl Session {
    /// Create a new session that lives for `ttl_hours`.
    pub fn new(public_key: String, ttl_hours: i64) -> Self {
        let now = chrono::Utc::now().timestamp_millis();

        Self {
            token: uuid::Uuid::new_v4().to_string(),
            public_key,
            created_at: now,
            expires_at: now + ttl_hours * 60 * 60 * 1000,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_creation() {
        let challenge = AuthChallenge::new();
        assert_eq!(challenge.challenge.len(), 64); // 32 bytes = 64 hex chars
        assert!(!challenge.is_expired());
        assert_eq!(challenge.expires_at, challenge.timestamp + CHALLENGE_TTL_MS);
    }

    #[test]
    fn test_challenges_are_unique() {
        let a = AuthChallenge::new();
        let b = AuthChallenge::new();
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn test_challenge_serialization() {
        let challenge = AuthChallenge {
            challenge: "abc123".to_string(),
            timestamp: 1704067200000,
            expires_at: 1704067500000,
        };

        let json = serde_json::to_string(&challenge).unwrap();
        assert!(json.contains("\"challenge\":\"abc123\""));
        assert!(json.contains("\"expiresAt\":1704067500000"));
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::new("pk".to_string(), 24);
        assert!(!session.is_expired());
        assert_eq!(session.expires_at - session.created_at, 24 * 60 * 60 * 1000);

        let expired = Session {
            expires_at: 0,
            ..session
        };
        assert!(expired.is_expired());
    }
}
