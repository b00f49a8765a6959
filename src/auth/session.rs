//! Session layer: cookie and bearer sessions and per-request principal
//! resolution.
//!
//! Both kinds are rows in the `sessions` table holding a SHA-256 digest of a
//! random secret. Cookie values read `ses_{id}.{secret}`; bearer tokens seal
//! the same pair in a PASETO.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::auth::hashing;
use crate::auth::models::{HouseholdRole, SessionContext};
use crate::auth::token_service::TokenService;
use crate::auth::user::User;
use crate::config::AuthConfig;
use crate::domain::{HouseholdId, SessionId};
use crate::errors::{AuthErrorType, LarderError, Result};
use crate::households::{HouseholdMembership, HouseholdService};
use crate::kernel::Kernel;
use crate::storage::audit_log::{self, AuditEvent};
use crate::storage::{records, sessions, AuthKind, SessionRecord};

const COOKIE_PREFIX: &str = "ses_";
const SECRET_BYTES: usize = 32;

/// A freshly opened session and the credential that presents it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: SessionId,
    pub credential: String,
    pub expires_at: DateTime<Utc>,
    pub active_household_id: Option<HouseholdId>,
}

#[derive(Debug, Clone)]
pub struct SessionService {
    kernel: Kernel,
    tokens: TokenService,
    config: AuthConfig,
}

impl SessionService {
    pub fn new(kernel: Kernel, tokens: TokenService, config: AuthConfig) -> Self {
        Self { kernel, tokens, config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Household a new session starts in: the requested one if the user is a
    /// member, else the default membership, else the oldest.
    fn choose_active(memberships: &[HouseholdMembership], requested: Option<&HouseholdId>) -> Option<HouseholdId> {
        if let Some(requested) = requested {
            return memberships
                .iter()
                .find(|membership| &membership.belongs_to_household == requested)
                .map(|membership| membership.belongs_to_household.clone());
        }
        memberships
            .iter()
            .find(|membership| membership.default_household)
            .or_else(|| memberships.first())
            .map(|membership| membership.belongs_to_household.clone())
    }

    async fn open_in(
        &self,
        conn: &mut SqliteConnection,
        user: &User,
        auth_kind: AuthKind,
        lifetime: chrono::Duration,
        api_client_id: Option<&str>,
        requested_household: Option<&HouseholdId>,
    ) -> Result<(SessionRecord, String)> {
        let memberships = HouseholdService::memberships_in(conn, &user.id).await?;
        let active_household_id = Self::choose_active(&memberships, requested_household);
        if requested_household.is_some() && active_household_id.is_none() {
            return Err(LarderError::validation_field("requested household is not one of yours", "householdID"));
        }

        let now = self.kernel.now();
        let secret = hashing::generate_secret(SECRET_BYTES);
        let record = SessionRecord {
            id: SessionId::new(),
            user_id: user.id.clone(),
            active_household_id,
            auth_kind,
            secret_hash: hashing::digest_hex(&secret),
            api_client_id: api_client_id.map(str::to_string),
            created_at: now,
            expires_at: now + lifetime,
            revoked_at: None,
        };
        sessions::insert_session(conn, &record).await?;

        let mut event = AuditEvent::new("sessionOpened", Some(&user.id)).with("authKind", auth_kind.as_str());
        if let Some(client) = api_client_id {
            event = event.with("apiClientID", client);
        }
        audit_log::append(conn, event, now).await?;
        Ok((record, secret))
    }

    /// Open a cookie session for an authenticated user.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn open_cookie_session(&self, user: &User) -> Result<IssuedSession> {
        let mut tx = self.kernel.db().write().await?;
        let (record, secret) =
            self.open_in(&mut tx, user, AuthKind::Cookie, self.config.session_lifetime(), None, None).await?;
        tx.commit().await?;

        info!(session_id = %record.id, "cookie session opened");
        Ok(IssuedSession {
            credential: format!("{}{}.{}", COOKIE_PREFIX, record.id, secret),
            session_id: record.id,
            expires_at: record.expires_at,
            active_household_id: record.active_household_id,
        })
    }

    /// Open a bearer session, optionally minted from an API client.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn open_bearer_session(
        &self,
        user: &User,
        api_client_id: Option<&str>,
        requested_household: Option<&HouseholdId>,
    ) -> Result<IssuedSession> {
        let mut tx = self.kernel.db().write().await?;
        let (record, secret) = self
            .open_in(&mut tx, user, AuthKind::Bearer, self.config.token_lifetime(), api_client_id, requested_household)
            .await?;
        let token = self.tokens.seal(&record.id, &secret, record.expires_at)?;
        tx.commit().await?;

        info!(session_id = %record.id, "bearer session opened");
        Ok(IssuedSession {
            credential: token,
            session_id: record.id,
            expires_at: record.expires_at,
            active_household_id: record.active_household_id,
        })
    }

    pub async fn resolve_cookie(&self, value: &str) -> Result<SessionContext> {
        let (id, secret) = parse_cookie(value)?;
        self.resolve(&id, &secret, AuthKind::Cookie).await
    }

    pub async fn resolve_bearer(&self, token: &str) -> Result<SessionContext> {
        let (id, secret) = self.tokens.open(token)?;
        self.resolve(&id, &secret, AuthKind::Bearer).await
    }

    /// Resolve a presented session to the principal, re-reading the user and
    /// their memberships on every request.
    async fn resolve(&self, id: &SessionId, secret: &str, kind: AuthKind) -> Result<SessionContext> {
        let invalid = || LarderError::auth("session is invalid or has ended", AuthErrorType::InvalidToken);
        let mut conn = self.kernel.db().read().await?;

        let record = sessions::find_session(&mut conn, id).await?.ok_or_else(invalid)?;
        if record.auth_kind != kind || !hashing::constant_time_eq(&record.secret_hash, &hashing::digest_hex(secret)) {
            return Err(invalid());
        }
        if !record.is_live(self.kernel.now()) {
            return Err(LarderError::auth("session has expired", AuthErrorType::ExpiredToken));
        }

        let user = records::fetch_live::<User>(&mut conn, record.user_id.as_str()).await?.ok_or_else(invalid)?;
        if !user.reputation.is_good() {
            return Err(LarderError::auth("account is not in good standing", AuthErrorType::AccountSuspended));
        }

        let memberships = HouseholdService::memberships_in(&mut conn, &user.id).await?;
        let still_member = record
            .active_household_id
            .as_ref()
            .filter(|household| memberships.iter().any(|m| &m.belongs_to_household == *household))
            .cloned();
        let active_household_id = still_member.or_else(|| Self::choose_active(&memberships, None));

        debug!(session_id = %record.id, user_id = %user.id, "session resolved");
        Ok(SessionContext {
            session_id: record.id,
            user_id: user.id,
            username: user.username,
            email_address: user.email_address,
            service_role: user.service_role,
            reputation: user.reputation,
            auth_kind: record.auth_kind,
            active_household_id,
            memberships: memberships
                .into_iter()
                .map(|membership| (membership.belongs_to_household, membership.household_role))
                .collect::<std::collections::BTreeMap<HouseholdId, HouseholdRole>>(),
        })
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub async fn logout(&self, session: &SessionContext) -> Result<()> {
        let now = self.kernel.now();
        let mut tx = self.kernel.db().write().await?;
        sessions::revoke_session(&mut tx, &session.session_id, now).await?;
        audit_log::append(&mut tx, AuditEvent::new("sessionClosed", Some(&session.user_id)), now).await?;
        tx.commit().await?;

        info!(user_id = %session.user_id, "session closed");
        Ok(())
    }

    /// Drop sessions that expired more than a day ago.
    pub async fn purge_expired(&self) -> Result<u64> {
        let cutoff = self.kernel.now() - chrono::Duration::days(1);
        let mut tx = self.kernel.db().write().await?;
        let purged = sessions::purge_expired(&mut tx, cutoff).await?;
        tx.commit().await?;
        Ok(purged)
    }
}

fn parse_cookie(value: &str) -> Result<(SessionId, String)> {
    let invalid = || LarderError::auth("malformed session cookie", AuthErrorType::InvalidToken);
    let rest = value.strip_prefix(COOKIE_PREFIX).ok_or_else(invalid)?;
    let (id, secret) = rest.split_once('.').ok_or_else(invalid)?;
    if id.is_empty() || secret.is_empty() {
        return Err(invalid());
    }
    Ok((SessionId::from(id), secret.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::errors::ErrorCode;

    fn membership(household: &str, default_household: bool) -> HouseholdMembership {
        HouseholdMembership::new(
            UserId::from("u1"),
            HouseholdId::from(household),
            HouseholdRole::HouseholdMember,
            default_household,
            Utc::now(),
        )
    }

    #[test]
    fn cookie_values_parse() {
        let (id, secret) = parse_cookie("ses_abc.def").unwrap();
        assert_eq!(id.as_str(), "abc");
        assert_eq!(secret, "def");

        for bad in ["abc.def", "ses_abc", "ses_.def", "ses_abc."] {
            assert_eq!(parse_cookie(bad).unwrap_err().code(), ErrorCode::Unauthenticated, "{bad}");
        }
    }

    #[test]
    fn active_household_prefers_request_then_default_then_oldest() {
        let memberships = vec![membership("h1", false), membership("h2", true), membership("h3", false)];

        let requested = HouseholdId::from("h3");
        assert_eq!(SessionService::choose_active(&memberships, Some(&requested)), Some(requested));
        assert_eq!(SessionService::choose_active(&memberships, Some(&HouseholdId::from("hx"))), None);
        assert_eq!(SessionService::choose_active(&memberships, None), Some(HouseholdId::from("h2")));

        let no_default = vec![membership("h1", false), membership("h3", false)];
        assert_eq!(SessionService::choose_active(&no_default, None), Some(HouseholdId::from("h1")));
    }
}
