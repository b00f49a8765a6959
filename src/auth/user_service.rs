//! Identity store: registration, two-factor lifecycle, credential checks and
//! administrator actions on accounts.

use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::authorization::require_service_admin;
use crate::auth::hashing;
use crate::auth::models::{Reputation, ServiceRole, SessionContext};
use crate::auth::totp;
use crate::auth::user::{
    provisioning_uri, LoginInput, PasswordUpdateInput, TotpSecretRefreshInput, TotpSecretRefreshResponse,
    TotpSecretVerificationInput, User, UserCreationResponse, UserRegistrationInput, UserReputationUpdateInput,
    UserView,
};
use crate::config::AuthConfig;
use crate::domain::{Page, PageQuery, Timestamps, UserId};
use crate::errors::{AuthErrorType, LarderError, Result};
use crate::households::{Household, HouseholdService, InvitationService};
use crate::kernel::Kernel;
use crate::observability::metrics;
use crate::storage::audit_log::{self, AuditEvent};
use crate::storage::{records, sessions, Column, Document, RecordFilter};

/// Issuer shown in authenticator apps.
pub const TOTP_ISSUER: &str = "Larder";

/// Well-formed hash verified against when the username is unknown, so
/// response time does not reveal which accounts exist.
const DUMMY_HASH: &str = "$argon2id$v=19$m=768,t=1,p=1$dW5rbm93bnNhbHQ$Zm9vYmFyYmF6cXV4cXV1eGZvb2Jhcm5vdGFoYXNoISE";

#[derive(Debug, Clone)]
pub struct UserService {
    kernel: Kernel,
    households: HouseholdService,
    invitations: InvitationService,
    config: AuthConfig,
}

impl UserService {
    pub fn new(
        kernel: Kernel,
        households: HouseholdService,
        invitations: InvitationService,
        config: AuthConfig,
    ) -> Self {
        Self { kernel, households, invitations, config }
    }

    async fn journal(&self, conn: &mut SqliteConnection, event_type: &str, actor: Option<&UserId>, user: &User) -> Result<()> {
        let event = AuditEvent::new(event_type, actor).resource(User::KIND, user.id.as_str());
        audit_log::append(conn, event, self.kernel.now()).await?;
        Ok(())
    }

    async fn load_live(conn: &mut SqliteConnection, id: &UserId) -> Result<User> {
        records::fetch_live(conn, id.as_str())
            .await?
            .ok_or_else(|| LarderError::not_found(User::KIND, id.as_str()))
    }

    /// Register an account with its personal household, optionally consuming
    /// a household invitation.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: UserRegistrationInput) -> Result<UserCreationResponse> {
        input.validate()?;
        let invitation = match (&input.invitation_id, &input.invitation_token) {
            (Some(id), Some(token)) => Some((id.clone(), token.clone())),
            (None, None) => None,
            _ => {
                return Err(LarderError::validation_field(
                    "invitationID and invitationToken must be provided together",
                    "invitationToken",
                ))
            }
        };

        let hashed_password = hashing::hash_password(&input.password).await?;
        let now = self.kernel.now();
        let username = input.username.trim().to_string();
        let service_role = if self.config.is_service_admin(&username) {
            ServiceRole::ServiceAdmin
        } else {
            ServiceRole::ServiceUser
        };

        let user = User {
            id: UserId::new(),
            username: username.clone(),
            email_address: input.email_address.trim().to_string(),
            first_name: input.first_name,
            last_name: input.last_name,
            hashed_password,
            two_factor_secret: totp::generate_secret(),
            pending_two_factor_secret: None,
            two_factor_secret_verified_at: None,
            service_role,
            reputation: Reputation::Good,
            reputation_explanation: String::new(),
            password_last_changed_at: None,
            timestamps: Timestamps::created(now),
        };

        let mut tx = self.kernel.db().write().await?;
        if records::find_by::<User>(&mut tx, Column::UniqueKey, &user.username).await?.is_some() {
            return Err(LarderError::conflict("username is already taken", User::KIND));
        }
        if records::find_by::<User>(&mut tx, Column::SecondaryKey, &User::normalize_email(&user.email_address))
            .await?
            .is_some()
        {
            return Err(LarderError::conflict("email address is already registered", User::KIND));
        }

        records::insert(&mut tx, &user).await?;
        self.journal(&mut tx, "userCreated", Some(&user.id), &user).await?;

        let household = Household::named(format!("{}'s household", user.username), user.id.clone(), now);
        let mut events = self.households.create_household_in(&mut tx, &household, true, Some(&user.id)).await?;
        if let Some((invitation_id, token)) = invitation {
            events.extend(self.invitations.accept_for_registration_in(&mut tx, &invitation_id, &token, &user).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        metrics::record_registration();
        info!(user_id = %user.id, service_role = %user.service_role, "user registered");

        Ok(UserCreationResponse {
            created_user_id: user.id.clone(),
            username: user.username.clone(),
            email_address: user.email_address.clone(),
            account_status: user.reputation,
            two_factor_uri: provisioning_uri(TOTP_ISSUER, &user.username, &user.two_factor_secret),
            two_factor_secret: user.two_factor_secret,
            household_id: household.id,
            created_at: now,
        })
    }

    /// Confirm the initial secret, or swap in a pending replacement.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn verify_totp(&self, input: TotpSecretVerificationInput) -> Result<()> {
        input.validate()?;
        let now = self.kernel.now();

        let mut tx = self.kernel.db().write().await?;
        let mut user = Self::load_live(&mut tx, &UserId::from(input.user_id.as_str())).await?;

        let event_type = match user.pending_two_factor_secret.clone() {
            Some(pending) => {
                if !totp::verify(&pending, &input.totp_token, now)? {
                    return Err(LarderError::validation_field("TOTP code is invalid", "totpToken"));
                }
                user.two_factor_secret = pending;
                user.pending_two_factor_secret = None;
                "twoFactorSecretChanged"
            }
            None if user.two_factor_verified() => {
                return Err(LarderError::conflict("two factor secret is already verified", User::KIND));
            }
            None => {
                if !totp::verify(&user.two_factor_secret, &input.totp_token, now)? {
                    return Err(LarderError::validation_field("TOTP code is invalid", "totpToken"));
                }
                "twoFactorSecretVerified"
            }
        };
        user.two_factor_secret_verified_at = Some(now);
        user.timestamps.touch(now);
        records::save(&mut tx, &user).await?;
        self.journal(&mut tx, event_type, Some(&user.id), &user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, event_type, "two factor secret verified");
        Ok(())
    }

    /// Start a TOTP rotation; the new secret only takes effect once verified.
    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn request_new_totp(
        &self,
        session: &SessionContext,
        input: TotpSecretRefreshInput,
    ) -> Result<TotpSecretRefreshResponse> {
        input.validate()?;
        let user = {
            let mut conn = self.kernel.db().read().await?;
            Self::load_live(&mut conn, &session.user_id).await?
        };
        if !user.two_factor_verified() {
            return Err(LarderError::validation("two factor secret has not been verified yet"));
        }
        self.check_password_and_code(&user, &input.current_password, &input.totp_token).await?;

        let secret = totp::generate_secret();
        let mut tx = self.kernel.db().write().await?;
        let mut user = Self::load_live(&mut tx, &session.user_id).await?;
        user.pending_two_factor_secret = Some(secret.clone());
        user.timestamps.touch(self.kernel.now());
        records::save(&mut tx, &user).await?;
        self.journal(&mut tx, "twoFactorSecretRefreshRequested", Some(&user.id), &user).await?;
        tx.commit().await?;

        Ok(TotpSecretRefreshResponse {
            two_factor_uri: provisioning_uri(TOTP_ISSUER, &user.username, &secret),
            two_factor_secret: secret,
        })
    }

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn change_password(&self, session: &SessionContext, input: PasswordUpdateInput) -> Result<()> {
        input.validate()?;
        let user = {
            let mut conn = self.kernel.db().read().await?;
            Self::load_live(&mut conn, &session.user_id).await?
        };
        self.check_password_and_code(&user, &input.current_password, &input.totp_token).await?;
        if input.new_password == input.current_password {
            return Err(LarderError::validation_field("new password must differ from the current one", "newPassword"));
        }
        let hashed_password = hashing::hash_password(&input.new_password).await?;

        let now = self.kernel.now();
        let mut tx = self.kernel.db().write().await?;
        let mut user = Self::load_live(&mut tx, &session.user_id).await?;
        user.hashed_password = hashed_password;
        user.password_last_changed_at = Some(now);
        user.timestamps.touch(now);
        records::save(&mut tx, &user).await?;
        self.journal(&mut tx, "passwordChanged", Some(&user.id), &user).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    async fn check_password_and_code(&self, user: &User, password: &str, code: &str) -> Result<()> {
        if !hashing::verify_password(&user.hashed_password, password).await? {
            return Err(LarderError::invalid_credentials());
        }
        if !totp::verify(&user.two_factor_secret, code, self.kernel.now())? {
            return Err(LarderError::invalid_credentials());
        }
        Ok(())
    }

    /// Check login credentials. Every credential failure reads the same.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn authenticate(&self, input: &LoginInput) -> Result<User> {
        input.validate()?;
        let outcome = self.authenticate_inner(input).await;
        metrics::record_login(outcome.is_ok());
        if let Err(err) = &outcome {
            warn!(username = %input.username, error = %err, "login rejected");
        }
        outcome
    }

    async fn authenticate_inner(&self, input: &LoginInput) -> Result<User> {
        let user = {
            let mut conn = self.kernel.db().read().await?;
            records::find_by::<User>(&mut conn, Column::UniqueKey, &input.username).await?
        };

        let Some(user) = user else {
            let _ = hashing::verify_password(DUMMY_HASH, &input.password).await;
            return Err(LarderError::invalid_credentials());
        };
        if !hashing::verify_password(&user.hashed_password, &input.password).await? {
            return Err(LarderError::invalid_credentials());
        }
        if !user.two_factor_verified() {
            return Err(LarderError::invalid_credentials());
        }
        if !totp::verify(&user.two_factor_secret, &input.totp_token, self.kernel.now())? {
            return Err(LarderError::invalid_credentials());
        }
        if !user.reputation.is_good() {
            return Err(LarderError::auth("account is not in good standing", AuthErrorType::AccountSuspended));
        }
        Ok(user)
    }

    pub async fn get_self(&self, session: &SessionContext) -> Result<UserView> {
        let mut conn = self.kernel.db().read().await?;
        Ok(Self::load_live(&mut conn, &session.user_id).await?.view())
    }

    /// Users read themselves; service admins read anyone.
    pub async fn get(&self, session: &SessionContext, id: &UserId) -> Result<UserView> {
        if id != &session.user_id && !session.is_service_admin() {
            return Err(LarderError::not_found(User::KIND, id.as_str()));
        }
        let mut conn = self.kernel.db().read().await?;
        let user = if session.is_service_admin() {
            records::fetch::<User>(&mut conn, id.as_str()).await?
        } else {
            records::fetch_live::<User>(&mut conn, id.as_str()).await?
        };
        user.map(|user| user.view()).ok_or_else(|| LarderError::not_found(User::KIND, id.as_str()))
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<UserView>> {
        require_service_admin(session)?;
        let page = self.kernel.list_filtered::<User>(session, RecordFilter::all(), query).await?;
        Ok(page.map(|user| user.view()))
    }

    pub async fn search(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<UserView>> {
        require_service_admin(session)?;
        if query.trim().is_empty() {
            return Err(LarderError::validation_field("search query cannot be empty", "q"));
        }
        let mut conn = self.kernel.db().read().await?;
        let found = records::search::<User>(&mut conn, query, limit.clamp(1, crate::domain::pagination::MAX_LIMIT)).await?;
        Ok(found.iter().map(User::view).collect())
    }

    /// Archive an account; its sessions and memberships go with it, and the
    /// households it owns pass to another member.
    #[instrument(skip(self, session), fields(user_id = %id))]
    pub async fn archive(&self, session: &SessionContext, id: &UserId) -> Result<()> {
        if id != &session.user_id && !session.is_service_admin() {
            return Err(LarderError::not_found(User::KIND, id.as_str()));
        }
        let now = self.kernel.now();
        let mut tx = self.kernel.db().write().await?;
        let mut user = Self::load_live(&mut tx, id).await?;

        let events = self.households.relinquish_all_in(&mut tx, id, Some(&session.user_id)).await?;
        user.timestamps.archive(now);
        records::save(&mut tx, &user).await?;
        self.journal(&mut tx, "userArchived", Some(&session.user_id), &user).await?;
        let revoked = sessions::revoke_user_sessions(&mut tx, id, now).await?;
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        info!(user_id = %id, revoked_sessions = revoked, "user archived");
        Ok(())
    }

    /// Set an account's reputation. Sessions of a user leaving good standing
    /// are revoked.
    #[instrument(skip(self, session, input), fields(target_user_id = %input.target_user_id))]
    pub async fn update_reputation(&self, session: &SessionContext, input: UserReputationUpdateInput) -> Result<()> {
        require_service_admin(session)?;
        input.validate()?;
        let target = UserId::from(input.target_user_id.as_str());
        if target == session.user_id {
            return Err(LarderError::validation_field("administrators cannot change their own standing", "targetUserID"));
        }

        let now = self.kernel.now();
        let mut tx = self.kernel.db().write().await?;
        let mut user = Self::load_live(&mut tx, &target).await?;
        user.reputation = input.new_status;
        user.reputation_explanation = input.reason.clone();
        user.timestamps.touch(now);
        records::save(&mut tx, &user).await?;

        let event = AuditEvent::new("userReputationUpdated", Some(&session.user_id))
            .resource(User::KIND, user.id.as_str())
            .with("newStatus", user.reputation.as_str())
            .with("reason", input.reason);
        audit_log::append(&mut tx, event, now).await?;
        let revoked = if user.reputation.is_good() {
            0
        } else {
            sessions::revoke_user_sessions(&mut tx, &user.id, now).await?
        };
        tx.commit().await?;

        info!(user_id = %user.id, reputation = %user.reputation, revoked_sessions = revoked, "reputation updated");
        Ok(())
    }
}
