// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caller identity middleware.
//!
//! Resolves the acting user for every API request, in order:
//! 1. `Authorization: Bearer <jwt>` (HS256, `sub` = user id), when a signing
//!    key is configured. A bad token is rejected, never downgraded.
//! 2. `X-User-ID` header holding a positive integer.
//! 3. The configured mock user.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Header carrying the user id when no bearer token is supplied.
pub const USER_ID_HEADER: &str = "x-user-id";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// The user a request acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
}

/// Middleware that attaches an `Identity` to the request.
pub async fn identify_user(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = resolve_user_id(
        request.headers(),
        state.config.jwt_signing_key.as_deref(),
        state.config.mock_user_id,
    )?;

    request.extensions_mut().insert(Identity { user_id });
    Ok(next.run(request).await)
}

fn resolve_user_id(
    headers: &HeaderMap,
    signing_key: Option<&[u8]>,
    mock_user_id: u64,
) -> Result<u64, AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if let Some(token) = bearer {
        let key = signing_key.ok_or(AppError::Unauthorized)?;
        return verify_jwt(token, key);
    }

    let from_header = headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|id| *id > 0);

    Ok(from_header.unwrap_or(mock_user_id))
}

fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<u64, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(token, &key, &validation).map_err(|_| AppError::InvalidToken)?;

    token_data
        .claims
        .sub
        .parse::<u64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::InvalidToken)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: u64, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const KEY: &[u8] = b"unit_test_signing_key_32_bytes!!";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_user_id_header() {
        let h = headers(&[(USER_ID_HEADER, "42")]);
        assert_eq!(resolve_user_id(&h, Some(KEY), 1).unwrap(), 42);
    }

    #[test]
    fn test_invalid_user_id_header_falls_back_to_mock() {
        for value in ["abc", "0", "-4", ""] {
            let h = headers(&[(USER_ID_HEADER, value)]);
            assert_eq!(resolve_user_id(&h, None, 7).unwrap(), 7, "value {:?}", value);
        }
        assert_eq!(resolve_user_id(&HeaderMap::new(), None, 7).unwrap(), 7);
    }

    #[test]
    fn test_bearer_token_wins_over_header() {
        let token = create_jwt(555, KEY).unwrap();
        let h = headers(&[
            ("authorization", &format!("Bearer {}", token)),
            (USER_ID_HEADER, "42"),
        ]);
        assert_eq!(resolve_user_id(&h, Some(KEY), 1).unwrap(), 555);
    }

    #[test]
    fn test_bad_bearer_token_rejected() {
        let h = headers(&[("authorization", "Bearer not.a.jwt")]);
        assert!(matches!(
            resolve_user_id(&h, Some(KEY), 1),
            Err(AppError::InvalidToken)
        ));

        let token = create_jwt(555, b"some_other_key_entirely_32_bytes").unwrap();
        let h = headers(&[("authorization", &format!("Bearer {}", token))]);
        assert!(matches!(
            resolve_user_id(&h, Some(KEY), 1),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_bearer_without_configured_key() {
        let token = create_jwt(555, KEY).unwrap();
        let h = headers(&[("authorization", &format!("Bearer {}", token))]);
        assert!(matches!(
            resolve_user_id(&h, None, 1),
            Err(AppError::Unauthorized)
        ));
    }
}
