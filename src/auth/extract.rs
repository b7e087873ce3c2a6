use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{error::AppError, state::SharedState};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Caller identity resolved from an `Authorization: Bearer` access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    /// Raw bearer token, kept so session checks can match its digest.
    pub token: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

        let claims = state
            .tokens()
            .verify(token)
            .map_err(|err| AppError::Unauthorized(err.to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.username,
            token: token.to_owned(),
        })
    }
}

/// Reject requests that do not carry the configured `x-admin-token`.
pub async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    match state.config().admin_token.as_deref() {
        Some(token) if bool::from(token.as_bytes().ct_eq(provided.as_bytes())) => {
            Ok(next.run(req).await)
        }
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin operations are disabled (ADMIN_TOKEN unset)".into(),
        )),
    }
}
