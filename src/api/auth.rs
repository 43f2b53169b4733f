/**
 * Authentication API
 *
 * Flow:
 * 1. GET /api/auth/challenge - Get a challenge to sign
 * 2. POST /api/auth/verify - Submit signed challenge to authenticate
 * 3. GET /api/auth/me - Get the current user (requires auth)
 * 4. POST /api/auth/logout - Logout and invalidate session
 */

use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::services::{AuthError, AuthService};
use crate::types::{AuthChallenge, AuthRequest, AuthResponse, AuthenticatedUser};
use crate::AppState;

/// Auth slice of the app state.
#[derive(Clone)]
pub struct AuthState {
    pub auth_service: Arc<AuthService>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(input: &AppState) -> Self {
        Self {
            auth_service: input.auth_service.clone(),
        }
    }
}

/// Create auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/challenge", get(get_challenge))
        .route("/verify", post(verify))
        .route("/me", get(get_me))
        .route("/logout", post(logout))
}

/// GET /api/auth/challenge
async fn get_challenge(State(state): State<AuthState>) -> Json<ApiResponse<AuthChallenge>> {
    Json(ApiResponse::new(state.auth_service.create_challenge()))
}

/// POST /api/auth/verify
///
/// Verify a signed challenge and create a session.
async fn verify(
    State(state): State<AuthState>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AuthError> {
    let session = state.auth_service.verify(&request)?;

    Ok(Json(ApiResponse::new(AuthResponse {
        authenticated: true,
        public_key: session.public_key,
        session_token: session.token,
        expires_at: session.expires_at,
    })))
}

/// GET /api/auth/me
async fn get_me(auth: Authenticated) -> Json<ApiResponse<AuthenticatedUser>> {
    Json(ApiResponse::new(auth.user))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AuthState>,
    auth: Authenticated,
) -> Json<ApiResponse<LogoutResponse>> {
    let success = state.auth_service.logout(&auth.token);
    Json(ApiResponse::new(LogoutResponse { success }))
}

/// Authenticated user extractor.
///
/// Use this in route handlers to require authentication:
/// ```ignore
/// async fn my_handler(auth: Authenticated) -> impl IntoResponse {
///     let user_id = auth.user.user_id;
///     // ...
/// }
/// ```
pub struct Authenticated {
    pub user: AuthenticatedUser,
    /// Session token the request carried
    pub token: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = bearer_token(parts).ok_or(AuthError::Unauthorized)?;

        let session = auth_state
            .auth_service
            .validate_session(token)
            .ok_or(AuthError::SessionNotFound)?;

        Ok(Authenticated {
            user: AuthenticatedUser {
                user_id: session.public_key,
                session_expires_at: session.expires_at,
            },
            token: token.to_string(),
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Logout response.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[tokio::test]
    async fn test_extractor_resolves_session() {
        let service = Arc::new(AuthService::new());
        let public_key = "ab".repeat(32);
        let challenge = service.create_challenge();
        let session = service
            .verify(&AuthRequest {
                signature: crate::services::auth::sign_challenge(&public_key, &challenge.challenge)
                    .unwrap(),
                public_key: public_key.clone(),
                challenge: challenge.challenge,
            })
            .unwrap();
        let state = AuthState {
            auth_service: service,
        };

        let mut parts = parts_with(Some(&format!("Bearer {}", session.token)));
        let auth = Authenticated::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(auth.user.user_id, public_key);
        assert_eq!(auth.token, session.token);

        let mut parts = parts_with(Some("Bearer unknown"));
        let err = Authenticated::from_request_parts(&mut parts, &state).await.err();
        assert!(matches!(err, Some(AuthError::SessionNotFound)));

        let mut parts = parts_with(None);
        let err = Authenticated::from_request_parts(&mut parts, &state).await.err();
        assert!(matches!(err, Some(AuthError::Unauthorized)));
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::new(LogoutResponse { success: true });
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"data":{"success":true}}"#);
    }
}
