//! Authentication configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accept `dev:<user>[:admin]` tokens instead of verifying JWTs.
    /// Never enable outside local development.
    pub dev_mode: bool,

    /// Shared HMAC secret for JWT verification. Required unless
    /// `dev_mode` is on.
    pub jwt_secret: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            jwt_secret: None,
        }
    }
}

/// Errors from validating an [`AuthConfig`].
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("auth.jwt_secret is required when dev_mode is disabled")]
    MissingSecret,

    #[error("auth.jwt_secret must be at least 32 bytes, got {0}")]
    WeakSecret(usize),
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.dev_mode {
            return Ok(());
        }
        match self.jwt_secret.as_deref() {
            None | Some("") => Err(ConfigValidationError::MissingSecret),
            Some(secret) if secret.len() < 32 => {
                Err(ConfigValidationError::WeakSecret(secret.len()))
            }
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_mode_needs_no_secret() {
        let config = AuthConfig {
            dev_mode: true,
            jwt_secret: None,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_strong_secret() {
        let config = AuthConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::MissingSecret)
        ));

        let weak = AuthConfig {
            dev_mode: false,
            jwt_secret: Some("short".to_string()),
        };
        assert!(matches!(
            weak.validate(),
            Err(ConfigValidationError::WeakSecret(5))
        ));

        let strong = AuthConfig {
            dev_mode: false,
            jwt_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
        };
        assert!(strong.validate().is_ok());
    }
}
