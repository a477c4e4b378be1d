//! HMAC-signed session tokens.
//!
//! Token format: `base64(user_id|role|exp).base64(hmac_sha256(payload))`,
//! accepted as a `Bearer` header or a `session` cookie. The extractor
//! verifies the signature, then loads the actor snapshot so handlers get
//! an explicit [`Actor`] rather than ambient request-user state.

use crate::db;
use crate::domain::access::Actor;
use crate::domain::models::UserRole;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(user_id: Uuid, role: UserRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(24);
    let payload = format!("{}|{}|{}", user_id, role.as_str(), exp.timestamp());
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 2 {
        return Err(SessionError::Invalid);
    }
    let payload_bytes = general_purpose::STANDARD
        .decode(parts[0])
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(parts[1])
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let user_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let role = UserRole::try_from(pieces[1]).map_err(|_| SessionError::Role)?;
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { user_id, role, exp })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

/// Authenticated actor extractor. Rejects with 401 on any token problem;
/// authorization proper happens later against the loaded snapshot.
pub struct AuthActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthActor
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let claims = verify_session(&token, &shared.session_key).map_err(|e| {
            tracing::warn!("session verification failed: {e}");
            StatusCode::UNAUTHORIZED
        })?;

        let actor = db::load_actor(&shared.pool, claims.user_id)
            .await
            .map_err(|e| {
                tracing::error!("actor lookup failed: {e:#}");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(AuthActor(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test-session-key-0123456789abcdef";

    #[test]
    fn sign_verify_round_trip() {
        let user_id = Uuid::new_v4();
        let token = sign_session(user_id, UserRole::ExpertiseLeader, KEY).unwrap();
        let claims = verify_session(&token, KEY).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.role, UserRole::ExpertiseLeader);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = sign_session(Uuid::new_v4(), UserRole::Employee, KEY).unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = general_purpose::STANDARD.encode(format!(
            "{}|admin|{}",
            Uuid::new_v4(),
            (Utc::now() + Duration::hours(24)).timestamp()
        ));
        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(verify_session(&forged, KEY), Err(SessionError::Signature)));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign_session(Uuid::new_v4(), UserRole::Employee, KEY).unwrap();
        assert!(verify_session(&token, b"another-key-entirely-000000000000").is_err());
    }

    #[test]
    fn garbage_token_is_invalid() {
        assert!(matches!(verify_session("not-a-token", KEY), Err(SessionError::Invalid)));
    }

    #[test]
    fn token_from_bearer_and_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(extract_token(&headers), Some("abc123".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, "theme=dark; session=xyz".parse().unwrap());
        assert_eq!(extract_token(&headers), Some("xyz".to_string()));
    }
}
