use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::handlers::error::ApiError;
use crate::models::{Role, User};
use crate::repository::QuizRepository;
use crate::services::errors::ServiceError;
use crate::services::AppState;

/// Default lifetime of tokens issued by the seed tool
pub const TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtClaims {
    pub sub: String, // user id
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    pub fn for_user(user: &User, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            role: user.role(),
            exp: (now + ttl_secs) as usize,
            iat: now as usize,
        }
    }

    pub fn user_id(&self) -> Result<i64, ServiceError> {
        self.sub.parse().map_err(|_| {
            tracing::warn!("Token subject is not a user id: {}", self.sub);
            ServiceError::Unauthorized
        })
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidToken,
    ExpiredToken,
    MissingToken,
    InvalidSignature,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::ExpiredToken => write!(f, "Token expired"),
            AuthError::MissingToken => write!(f, "Missing authorization token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
        }
    }
}

impl std::error::Error for AuthError {}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::InvalidToken)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        use jsonwebtoken::errors::ErrorKind;

        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)
}

/// Resolves the bearer token into [`JwtClaims`] stored in request extensions.
pub async fn auth_middleware<R: QuizRepository>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let jwt_service = JwtService::new(&state.config.jwt_secret);
    let claims = bearer_token(&headers)
        .and_then(|token| jwt_service.validate_token(token))
        .map_err(|e| {
            tracing::warn!("JWT validation failed: {}", e);
            ApiError::unauthorized(e.to_string())
        })?;

    tracing::debug!(
        "Authenticated user: {} (role: {})",
        claims.sub,
        claims.role.as_str()
    );

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Lets only authors through. Must run after [`auth_middleware`].
pub async fn admin_guard_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<JwtClaims>()
        .map(|claims| (claims.role, claims.sub.clone()));

    match caller {
        Some((Role::Admin, _)) => Ok(next.run(request).await),
        Some((_, sub)) => {
            tracing::warn!("Access denied for user {}: admin role required", sub);
            Err(ApiError::forbidden("admin role required"))
        }
        None => Err(ApiError::unauthorized(AuthError::MissingToken.to_string())),
    }
}
