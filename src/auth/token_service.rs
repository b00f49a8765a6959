//! PASETO v4.local bearer tokens.
//!
//! A token seals the id and secret of a bearer session row. Expiry and
//! revocation live on the row, so a revoked or banned principal's token stops
//! validating on its next use.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{local, Local};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use tracing::warn;
use zeroize::Zeroizing;

use crate::config::AuthConfig;
use crate::domain::SessionId;
use crate::errors::{AuthErrorType, LarderError, Result};

const SESSION_CLAIM: &str = "sid";
const SECRET_CLAIM: &str = "sec";
const EXPIRES_CLAIM: &str = "expiresAt";

/// Body returned by the bearer login and the API-client exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    key: Arc<SymmetricKey<V4>>,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService").field("key", &"<redacted>").finish()
    }
}

impl TokenService {
    /// Use the configured key, or a random per-process key when none is set.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let bytes = match config.local_key_bytes() {
            Some(bytes) => Zeroizing::new(bytes),
            None => {
                if config.paseto_local_key.is_some() {
                    return Err(LarderError::config("auth.paseto_local_key must be 32 hex-encoded bytes"));
                }
                warn!("no PASETO key configured; bearer tokens will not survive a restart");
                let mut bytes = Zeroizing::new([0u8; 32]);
                OsRng.fill_bytes(&mut bytes[..]);
                bytes
            }
        };
        Self::new(&bytes)
    }

    pub fn new(key: &[u8; 32]) -> Result<Self> {
        let key = SymmetricKey::<V4>::from(key)
            .map_err(|err| LarderError::config(format!("invalid PASETO key: {}", err)))?;
        Ok(Self { key: Arc::new(key) })
    }

    pub fn seal(&self, session_id: &SessionId, secret: &str, expires_at: DateTime<Utc>) -> Result<String> {
        let mut claims = Claims::new().map_err(token_error)?;
        claims.non_expiring();
        claims.add_additional(SESSION_CLAIM, session_id.as_str()).map_err(token_error)?;
        claims.add_additional(SECRET_CLAIM, secret).map_err(token_error)?;
        claims.add_additional(EXPIRES_CLAIM, expires_at.to_rfc3339()).map_err(token_error)?;
        local::encrypt(&self.key, &claims, None, None).map_err(token_error)
    }

    /// Decrypt a token into the session id and secret it carries.
    pub fn open(&self, token: &str) -> Result<(SessionId, String)> {
        let invalid = || LarderError::auth("invalid bearer token", AuthErrorType::InvalidToken);

        let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|_| invalid())?;
        let mut rules = ClaimsValidationRules::new();
        rules.allow_non_expiring();
        let trusted = local::decrypt(&self.key, &untrusted, &rules, None, None).map_err(|_| invalid())?;
        let claims = trusted.payload_claims().ok_or_else(invalid)?;

        let claim = |name: &str| claims.get_claim(name).and_then(|value| value.as_str()).map(str::to_string);
        let session_id = claim(SESSION_CLAIM).ok_or_else(invalid)?;
        let secret = claim(SECRET_CLAIM).ok_or_else(invalid)?;
        Ok((SessionId::from_string(session_id), secret))
    }
}

fn token_error(err: pasetors::errors::Error) -> LarderError {
    LarderError::internal(format!("token operation failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    fn service(byte: u8) -> TokenService {
        TokenService::new(&[byte; 32]).unwrap()
    }

    #[test]
    fn sealed_token_opens_with_same_key() {
        let tokens = service(7);
        let token = tokens.seal(&SessionId::from("s-1"), "secret", Utc::now()).unwrap();
        assert!(token.starts_with("v4.local."));

        let (session_id, secret) = tokens.open(&token).unwrap();
        assert_eq!(session_id.as_str(), "s-1");
        assert_eq!(secret, "secret");
    }

    #[test]
    fn foreign_or_garbage_tokens_are_unauthenticated() {
        let token = service(7).seal(&SessionId::from("s-1"), "secret", Utc::now()).unwrap();
        assert_eq!(service(8).open(&token).unwrap_err().code(), ErrorCode::Unauthenticated);
        assert_eq!(service(7).open("not-a-token").unwrap_err().code(), ErrorCode::Unauthenticated);
    }

    #[test]
    fn malformed_configured_key_is_rejected() {
        let config = AuthConfig { paseto_local_key: Some("abcd".to_string()), ..AuthConfig::default() };
        assert!(TokenService::from_config(&config).is_err());
    }
}
