//! API clients: user-minted `(clientID, clientSecret)` pairs that sign
//! requests for short-lived bearer tokens.
//!
//! Only the SHA-256 digest of the secret is stored. The digest doubles as the
//! HMAC key for the `/paseto` exchange, so the raw secret is never needed again.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::authorization::{Action, Owner};
use crate::auth::hashing;
use crate::auth::models::SessionContext;
use crate::auth::session::SessionService;
use crate::auth::token_service::TokenResponse;
use crate::auth::user::User;
use crate::domain::{new_record_id, HouseholdId, Page, PageQuery, Timestamps, UserId};
use crate::errors::{AuthErrorType, LarderError, Result};
use crate::kernel::{Kernel, Resource, Scope};
use crate::storage::{records, sessions, AuthKind, Column, Document, RecordIndex};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64url HMAC of a token request body.
pub const SIGNATURE_HEADER: &str = "X-Larder-Signature";

const CLIENT_ID_BYTES: usize = 16;
const CLIENT_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClient {
    pub id: String,
    pub name: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// HMAC key for `/paseto` requests: SHA-256 of the client secret.
    /// Signing is symmetric, so this is as sensitive as the secret itself;
    /// it is never rendered in a view.
    pub signing_key: String,
    pub belongs_to_user: UserId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for ApiClient {
    const KIND: &'static str = "apiClient";

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn index(&self) -> RecordIndex {
        RecordIndex {
            user_id: Some(self.belongs_to_user.to_string()),
            unique_key: Some(self.client_id.clone()),
            search_key: Some(self.name.to_lowercase()),
            ..Default::default()
        }
    }
}

impl Resource for ApiClient {
    const NOUN: &'static str = "apiClient";
    const SCOPE: Scope = Scope::User;

    fn owner(&self) -> Owner {
        Owner::User(self.belongs_to_user.clone())
    }
}

/// Client as shown after creation; the secret is never shown again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClientView {
    pub id: String,
    pub name: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub belongs_to_user: UserId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl From<ApiClient> for ApiClientView {
    fn from(client: ApiClient) -> Self {
        Self {
            id: client.id,
            name: client.name,
            client_id: client.client_id,
            belongs_to_user: client.belongs_to_user,
            timestamps: client.timestamps,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApiClientCreationInput {
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClientCreationResponse {
    pub id: String,
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_secret: String,
}

/// Signed body of a `/paseto` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequestInput {
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Unix time in nanoseconds.
    pub request_time: i64,
    #[serde(default, rename = "householdID")]
    pub household_id: Option<HouseholdId>,
}

/// base64url HMAC-SHA256 of `body`, keyed with SHA-256 of the client secret.
pub fn sign_request(client_secret: &str, body: &[u8]) -> Result<String> {
    let key = hashing::digest(client_secret.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|err| LarderError::internal(format!("invalid HMAC key: {}", err)))?;
    mac.update(body);
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

fn verify_signature(signing_key: &str, body: &[u8], signature: &str) -> bool {
    let Ok(key) = hex::decode(signing_key) else {
        return false;
    };
    let Ok(signature) = URL_SAFE_NO_PAD.decode(signature.trim().trim_end_matches('=')) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(&key) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[derive(Debug, Clone)]
pub struct ApiClientService {
    kernel: Kernel,
    sessions: SessionService,
}

impl ApiClientService {
    pub fn new(kernel: Kernel, sessions: SessionService) -> Self {
        Self { kernel, sessions }
    }

    /// Mint a client. Only cookie sessions may do so.
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: ApiClientCreationInput) -> Result<ApiClientCreationResponse> {
        input.validate()?;
        if session.auth_kind != AuthKind::Cookie {
            return Err(LarderError::forbidden("API clients can only be created from a cookie session"));
        }

        let client_secret = hashing::generate_secret(CLIENT_SECRET_BYTES);
        let client = ApiClient {
            id: new_record_id(),
            name: input.name.trim().to_string(),
            client_id: hashing::generate_secret(CLIENT_ID_BYTES),
            signing_key: hashing::digest_hex(&client_secret),
            belongs_to_user: session.user_id.clone(),
            timestamps: Timestamps::created(self.kernel.now()),
        };

        let mut tx = self.kernel.db().write().await?;
        self.kernel.insert_in(&mut tx, Some(&session.user_id), &client).await?;
        tx.commit().await?;

        info!(api_client_id = %client.id, "api client created");
        Ok(ApiClientCreationResponse { id: client.id, client_id: client.client_id, client_secret })
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<ApiClientView>> {
        Ok(self.kernel.list::<ApiClient>(session, query).await?.map(ApiClientView::from))
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<ApiClientView> {
        Ok(self.kernel.get::<ApiClient>(session, id).await?.into())
    }

    /// Archive a client and end every session minted from it.
    #[instrument(skip(self, session), fields(api_client_id = %id))]
    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<()> {
        let now = self.kernel.now();
        let mut tx = self.kernel.db().write().await?;
        let mut client: ApiClient = Kernel::load_for(&mut tx, session, id, Action::Archive).await?;
        self.kernel.archive_in(&mut tx, Some(&session.user_id), &mut client).await?;
        let revoked = sessions::revoke_client_sessions(&mut tx, &client.id, now).await?;
        tx.commit().await?;

        info!(api_client_id = %id, revoked_sessions = revoked, "api client archived");
        Ok(())
    }

    /// Exchange a signed `{clientID, requestTime, householdID?}` body for a
    /// bearer token.
    #[instrument(skip(self, body, signature))]
    pub async fn exchange(&self, body: &[u8], signature: Option<&str>) -> Result<TokenResponse> {
        let signature = signature.ok_or_else(|| {
            LarderError::auth(format!("missing {} header", SIGNATURE_HEADER), AuthErrorType::MissingCredentials)
        })?;
        let input: TokenRequestInput = serde_json::from_slice(body)
            .map_err(|err| LarderError::validation(format!("invalid token request: {}", err)))?;

        let now = self.kernel.now();
        let threshold = self.sessions.config().request_time_threshold();
        let requested_at = DateTime::<Utc>::from_timestamp_nanos(input.request_time);
        if (now - requested_at).abs() > threshold {
            return Err(LarderError::auth("request time is outside the allowed window", AuthErrorType::ExpiredToken));
        }

        let (client, user) = {
            let mut conn = self.kernel.db().read().await?;
            let client = records::find_by::<ApiClient>(&mut conn, Column::UniqueKey, &input.client_id)
                .await?
                .ok_or_else(LarderError::invalid_credentials)?;
            let user = records::fetch_live::<User>(&mut conn, client.belongs_to_user.as_str())
                .await?
                .ok_or_else(LarderError::invalid_credentials)?;
            (client, user)
        };

        if !verify_signature(&client.signing_key, body, signature) {
            warn!(client_id = %input.client_id, "token request signature mismatch");
            return Err(LarderError::invalid_credentials());
        }
        if !user.reputation.is_good() {
            return Err(LarderError::auth("account is not in good standing", AuthErrorType::AccountSuspended));
        }

        let issued = self.sessions.open_bearer_session(&user, Some(&client.id), input.household_id.as_ref()).await?;
        Ok(TokenResponse { token: issued.credential, expires_at: issued.expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_verify_against_stored_digest() {
        let secret = "client-secret";
        let body = br#"{"clientID":"abc","requestTime":1}"#;
        let signature = sign_request(secret, body).unwrap();
        let stored = hashing::digest_hex(secret);

        assert!(verify_signature(&stored, body, &signature));
        assert!(verify_signature(&stored, body, &format!("{signature}=")));
        assert!(!verify_signature(&stored, br#"{"clientID":"abc","requestTime":2}"#, &signature));
        assert!(!verify_signature(&hashing::digest_hex("other"), body, &signature));
        assert!(!verify_signature(&stored, body, "%%%"));
    }

    #[test]
    fn token_request_parses_wire_names() {
        let input: TokenRequestInput =
            serde_json::from_str(r#"{"clientID":"abc","requestTime":1700000000000000000,"householdID":"h1"}"#).unwrap();
        assert_eq!(input.client_id, "abc");
        assert_eq!(input.household_id, Some(HouseholdId::from("h1")));
    }

    #[test]
    fn view_omits_signing_key() {
        let client = ApiClient {
            id: "c1".to_string(),
            name: "ci".to_string(),
            client_id: "abc".to_string(),
            signing_key: "deadbeef".to_string(),
            belongs_to_user: UserId::from("u1"),
            timestamps: Timestamps::created(Utc::now()),
        };
        let json = serde_json::to_value(ApiClientView::from(client)).unwrap();
        assert!(json.get("signingKey").is_none());
        assert_eq!(json["clientID"], "abc");
    }
}
