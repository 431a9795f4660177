use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{
    auth::verify_access_token,
    error::AppError,
    models::{self, User},
    state::AppState,
};

const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// The authenticated caller, resolved from `Authorization: Bearer <jwt>`.
///
/// Rejects with 401 when the header is missing or malformed, the token does not
/// verify, or the user it names no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let (prefix, rest) = value.trim().split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || AppError::Unauthorized(CREDENTIALS_ERROR.to_string());

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_authorization_bearer)
            .ok_or_else(unauthorized)?;

        let claims = verify_access_token(token, &state.config.auth.jwt_secret).map_err(|e| {
            tracing::debug!("rejected access token: {}", e);
            unauthorized()
        })?;

        let user = models::find_user(&state.db, claims.user_id).await?.ok_or_else(unauthorized)?;
        Ok(CurrentUser(user))
    }
}
