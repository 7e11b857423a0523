//! Bearer-token consumption.
//!
//! Tokens are issued elsewhere; this extractor only verifies the signature
//! and maps the claims to an [`Actor`]. Handlers that need a caller
//! identity take an [`AuthedActor`] parameter and never see the raw token.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::error::ResmanError;
use crate::model::{Actor, ActorRole};

/// Claims carried by the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (actor ID)
    pub sub: String,

    /// Actor role
    #[serde(default)]
    pub role: Option<String>,

    /// Expiry (seconds since epoch), validated by jsonwebtoken
    pub exp: u64,
}

/// An authenticated actor extracted from the request.
#[derive(Debug, Clone, Copy)]
pub struct AuthedActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthedActor {
    type Rejection = ResmanError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ResmanError::unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ResmanError::unauthorized("Expected a bearer token"))?;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            ResmanError::with_internal(
                crate::error::ErrorCode::InvalidToken,
                "The provided token is invalid",
                e.to_string(),
            )
        })?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ResmanError::unauthorized("Token subject is not a valid identifier"))?;

        let role = match data.claims.role.as_deref() {
            Some("admin") => ActorRole::Admin,
            _ => ActorRole::Member,
        };

        Ok(Self(Actor { id, role }))
    }
}
