//! Token verification and request extractors.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use crate::api::ApiError;

use super::claims::{Claims, Role};
use super::config::AuthConfig;
use super::error::AuthError;

/// Shared authentication state.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    decoding_key: Option<Arc<DecodingKey>>,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        let decoding_key = config
            .jwt_secret
            .as_deref()
            .map(|secret| Arc::new(DecodingKey::from_secret(secret.as_bytes())));
        Self {
            config: Arc::new(config),
            decoding_key,
        }
    }

    pub fn dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    /// Verify a bearer token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if self.config.dev_mode {
            if let Some(rest) = token.strip_prefix("dev:") {
                return dev_claims(rest);
            }
        }

        let Some(key) = &self.decoding_key else {
            return Err(AuthError::InvalidToken("no verification key".to_string()));
        };

        let validation = Validation::new(Algorithm::HS256);
        match jsonwebtoken::decode::<Claims>(token, key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => Err(AuthError::InvalidToken(err.to_string())),
            },
        }
    }
}

/// Build synthetic claims for a `dev:<user>[:admin]` token.
fn dev_claims(spec: &str) -> Result<Claims, AuthError> {
    let (user, role) = match spec.split_once(':') {
        Some((user, "admin")) => (user, Some("admin".to_string())),
        Some((_, other)) => {
            return Err(AuthError::InvalidToken(format!("unknown dev role: {other}")))
        }
        None => (spec, None),
    };
    if user.is_empty() {
        return Err(AuthError::InvalidToken("empty dev user".to_string()));
    }
    Ok(Claims {
        sub: user.to_string(),
        exp: i64::MAX,
        iat: None,
        name: None,
        role,
    })
}

/// The authenticated caller.
///
/// Tokens are read from `Authorization: Bearer` or, because the
/// browser `EventSource` API cannot set headers, from an
/// `access_token` query parameter on stream endpoints.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }

    pub fn role(&self) -> Role {
        self.0.effective_role()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("access_token=")
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        Ok(CurrentUser(auth.verify(&token)?))
    }
}

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role() != Role::Admin {
            return Err(AuthError::InsufficientPermissions(
                "admin role required".to_string(),
            )
            .into());
        }
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_state() -> AuthState {
        AuthState::new(AuthConfig {
            dev_mode: true,
            jwt_secret: None,
        })
    }

    #[test]
    fn test_dev_token_accepted_in_dev_mode() {
        let claims = dev_state().verify("dev:usr_5").unwrap();
        assert_eq!(claims.sub, "usr_5");
        assert_eq!(claims.effective_role(), Role::User);

        let admin = dev_state().verify("dev:root:admin").unwrap();
        assert_eq!(admin.effective_role(), Role::Admin);
    }

    #[test]
    fn test_dev_token_rejected_in_production() {
        let state = AuthState::new(AuthConfig {
            dev_mode: false,
            jwt_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
        });
        assert!(state.verify("dev:usr_5").is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            dev_state().verify("not-a-token"),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            dev_state().verify("dev:"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_jwt_roundtrip() {
        let secret = "0123456789abcdef0123456789abcdef";
        let state = AuthState::new(AuthConfig {
            dev_mode: false,
            jwt_secret: Some(secret.to_string()),
        });

        let claims = Claims {
            sub: "usr_9".to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: None,
            name: Some("Sam".to_string()),
            role: None,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let verified = state.verify(&token).unwrap();
        assert_eq!(verified.sub, "usr_9");
        assert_eq!(verified.display_name(), "Sam");
    }
}
