//! Bearer token identity.
//!
//! Identity and verification live in an external service that signs HS256
//! tokens. This module turns a token into an [`Actor`] once per request.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lgu_common::{ActorId, AppError, AppResult, config::AuthConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::{Actor, ActorRole, VerificationTier};

/// Claims carried by an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Actor id.
    pub sub: String,
    #[serde(default)]
    pub role: ActorRole,
    #[serde(default)]
    pub verification: VerificationTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangay_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_municipality_id: Option<i32>,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl Claims {
    /// Claims describing `actor`, valid until `exp`.
    #[must_use]
    pub fn for_actor(actor: &Actor, exp: i64) -> Self {
        Self {
            sub: actor.id.to_string(),
            role: actor.role,
            verification: actor.verification,
            municipality_id: actor.municipality_id,
            barangay_id: actor.barangay_id,
            admin_municipality_id: actor.admin_municipality_id,
            exp,
        }
    }

    fn into_actor(self) -> AppResult<Actor> {
        let id: ActorId = self.sub.parse().map_err(|_| AppError::Unauthorized)?;
        Ok(Actor {
            id,
            role: self.role,
            verification: self.verification,
            municipality_id: self.municipality_id,
            barangay_id: self.barangay_id,
            admin_municipality_id: self.admin_municipality_id,
        })
    }
}

/// Resolves bearer tokens into actors.
pub trait IdentityProvider: Send + Sync {
    /// Authenticate `token`. Any failure is [`AppError::Unauthorized`].
    fn authenticate(&self, token: &str) -> AppResult<Actor>;
}

pub type IdentityProviderService = Arc<dyn IdentityProvider>;

/// HS256 token verifier.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;
        Self {
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for `claims`. Used by tooling and tests.
    pub fn issue(&self, claims: &Claims) -> AppResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn authenticate(&self, token: &str) -> AppResult<Actor> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "Rejected bearer token");
                AppError::Unauthorized
            })?;
        data.claims.into_actor()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn provider(secret: &str) -> JwtIdentityProvider {
        JwtIdentityProvider::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            leeway_secs: 0,
        })
    }

    #[test]
    fn test_issue_then_authenticate() {
        let provider = provider("secret");
        let actor = Actor {
            role: ActorRole::MunicipalAdmin,
            admin_municipality_id: Some(4),
            ..Actor::resident(12, 4)
        };
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = provider.issue(&Claims::for_actor(&actor, exp)).unwrap();

        assert_eq!(provider.authenticate(&token).unwrap(), actor);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = provider("one")
            .issue(&Claims::for_actor(&Actor::resident(1, 1), exp))
            .unwrap();

        assert!(matches!(
            provider("two").authenticate(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let provider = provider("secret");
        let exp = (Utc::now() - Duration::hours(1)).timestamp();
        let token = provider
            .issue(&Claims::for_actor(&Actor::resident(1, 1), exp))
            .unwrap();

        assert!(provider.authenticate(&token).is_err());
    }

    #[test]
    fn test_non_numeric_subject_is_unauthorized() {
        let provider = provider("secret");
        let claims = Claims {
            sub: "alice".to_string(),
            ..Claims::for_actor(&Actor::resident(1, 1), (Utc::now() + Duration::hours(1)).timestamp())
        };
        let token = provider.issue(&claims).unwrap();

        assert!(matches!(
            provider.authenticate(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_missing_optional_claims_default_to_unverified_resident() {
        let claims: Claims = serde_json::from_str(r#"{"sub":"5","exp":0}"#).unwrap();
        assert_eq!(claims.role, ActorRole::Resident);
        assert_eq!(claims.verification, VerificationTier::Unverified);
        assert_eq!(claims.municipality_id, None);
    }
}
