//! Invitation lifecycle: send, accept, reject, cancel and lazy expiry.

use std::sync::Arc;

use chrono::Duration;
use sqlx::SqliteConnection;
use tracing::{instrument, warn};
use validator::Validate;

use super::invitations::{
    HouseholdInvitation, HouseholdInvitationCancelInput, HouseholdInvitationCreationInput,
    HouseholdInvitationResponseInput, InvitationStatus,
};
use super::models::Household;
use super::service::HouseholdService;
use crate::auth::authorization::{authorize_household, Action};
use crate::auth::hashing::{constant_time_eq, generate_secret};
use crate::auth::models::{HouseholdRole, SessionContext};
use crate::auth::user::User;
use crate::domain::{new_record_id, HouseholdId, Page, PageQuery, Timestamps};
use crate::errors::{LarderError, Result};
use crate::kernel::{ChangeEvent, Kernel};
use crate::notifications::{EmailDispatcher, NotificationService, OutboundEmail};
use crate::storage::{records, Column, Document, RecordFilter, WriteTransaction};

const ACCEPTED: &str = "Accepted";
const REJECTED: &str = "Rejected";
const CANCELLED: &str = "Cancelled";
const EXPIRED: &str = "Expired";

#[derive(Debug, Clone)]
pub struct InvitationService {
    kernel: Kernel,
    households: HouseholdService,
    notifications: NotificationService,
    email: Arc<dyn EmailDispatcher>,
    lifetime: Duration,
}

impl InvitationService {
    pub fn new(
        kernel: Kernel,
        households: HouseholdService,
        notifications: NotificationService,
        email: Arc<dyn EmailDispatcher>,
        lifetime: Duration,
    ) -> Self {
        Self { kernel, households, notifications, email, lifetime }
    }

    /// Transition every pending invitation past its expiry.
    pub async fn expire_lapsed_in(&self, conn: &mut SqliteConnection) -> Result<Vec<ChangeEvent>> {
        let now = self.kernel.now();
        let mut events = Vec::new();
        for mut invitation in records::list_due::<HouseholdInvitation>(conn, now).await? {
            if invitation.has_lapsed(now) {
                invitation.resolve(InvitationStatus::Expired, String::new(), now);
                events.push(self.kernel.transition_in(conn, None, &mut invitation, EXPIRED).await?);
            }
        }
        Ok(events)
    }

    /// Background pass; returns how many invitations expired.
    pub async fn sweep(&self) -> Result<usize> {
        let mut tx = self.kernel.db().write().await?;
        let events = self.expire_lapsed_in(&mut tx).await?;
        tx.commit().await?;

        let expired = events.len();
        self.kernel.changes().publish_all(events);
        Ok(expired)
    }

    async fn load_in(conn: &mut SqliteConnection, id: &str) -> Result<HouseholdInvitation> {
        records::fetch_live(conn, id)
            .await?
            .ok_or_else(|| LarderError::not_found(HouseholdInvitation::KIND, id))
    }

    fn visible_to(session: &SessionContext, invitation: &HouseholdInvitation) -> bool {
        session.is_member_of(&invitation.destination_household) || invitation.is_addressed_to(&session.email_address)
    }

    /// Expire a lapsed invitation in its own transaction and report the conflict.
    async fn expire_now(&self, mut tx: WriteTransaction, mut invitation: HouseholdInvitation) -> LarderError {
        invitation.resolve(InvitationStatus::Expired, String::new(), self.kernel.now());
        let outcome = async {
            let event = self.kernel.transition_in(&mut tx, None, &mut invitation, EXPIRED).await?;
            tx.commit().await?;
            Ok::<_, LarderError>(event)
        }
        .await;
        match outcome {
            Ok(event) => {
                self.kernel.changes().publish(event);
                LarderError::conflict("invitation has expired", HouseholdInvitation::KIND)
            }
            Err(err) => err,
        }
    }

    #[instrument(skip(self, session, input), fields(household_id = %household_id, user_id = %session.user_id))]
    pub async fn create(
        &self,
        session: &SessionContext,
        household_id: &HouseholdId,
        input: HouseholdInvitationCreationInput,
    ) -> Result<HouseholdInvitation> {
        input.validate()?;
        authorize_household(session, Action::Read, household_id)?;
        if User::normalize_email(&input.to_email) == User::normalize_email(&session.email_address) {
            return Err(LarderError::validation_field("you cannot invite yourself", "toEmail"));
        }

        let now = self.kernel.now();
        let expires_at = input.expires_at.unwrap_or(now + self.lifetime);
        if expires_at <= now {
            return Err(LarderError::validation_field("expiresAt must be in the future", "expiresAt"));
        }

        let mut tx = self.kernel.db().write().await?;
        let mut events = self.expire_lapsed_in(&mut tx).await?;

        let household: Household = records::fetch_live(&mut tx, household_id.as_str())
            .await?
            .ok_or_else(|| LarderError::not_found("household", household_id.as_str()))?;
        let recipient =
            records::find_by::<User>(&mut tx, Column::SecondaryKey, &User::normalize_email(&input.to_email)).await?;
        if let Some(recipient) = &recipient {
            if HouseholdService::membership_in(&mut tx, household_id, &recipient.id).await?.is_some() {
                return Err(LarderError::conflict(
                    format!("{} is already a member of this household", input.to_email),
                    HouseholdInvitation::KIND,
                ));
            }
        }

        let invitation = HouseholdInvitation {
            id: new_record_id(),
            destination_household: household_id.clone(),
            from_user: session.user_id.clone(),
            to_user: recipient.as_ref().map(|user| user.id.clone()),
            to_email: input.to_email.trim().to_string(),
            to_name: input.to_name,
            note: input.note,
            status_note: String::new(),
            token: generate_secret(32),
            status: InvitationStatus::Pending,
            expires_at,
            responded_at: None,
            timestamps: Timestamps::created(now),
        };
        events.push(self.kernel.insert_in(&mut tx, Some(&session.user_id), &invitation).await?);

        if let Some(recipient) = &recipient {
            let content = format!("{} invited you to join {}", session.username, household.name);
            events.push(self.notifications.notify_in(&mut tx, &recipient.id, content).await?);
        }
        tx.commit().await?;
        self.kernel.changes().publish_all(events);

        let email = OutboundEmail {
            to_address: invitation.to_email.clone(),
            to_name: invitation.to_name.clone(),
            subject: format!("You've been invited to join {}", household.name),
            body: format!(
                "{} invited you to join {}.\n\ninvitation: {}\ntoken: {}\n\n{}",
                session.username, household.name, invitation.id, invitation.token, invitation.note
            ),
        };
        if let Err(err) = self.email.send(email).await {
            warn!(invitation_id = %invitation.id, error = %err, "failed to dispatch invitation email");
        }

        Ok(invitation)
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<HouseholdInvitation> {
        let mut conn = self.kernel.db().read().await?;
        let invitation = Self::load_in(&mut conn, id).await?;
        if !Self::visible_to(session, &invitation) {
            return Err(LarderError::not_found(HouseholdInvitation::KIND, id));
        }
        Ok(invitation)
    }

    /// Pending invitations the principal sent.
    pub async fn list_sent(&self, session: &SessionContext, query: PageQuery) -> Result<Page<HouseholdInvitation>> {
        self.sweep().await?;
        let filter = RecordFilter::scoped(Column::LeftId, session.user_id.as_str());
        self.kernel.list_filtered(session, filter, query).await
    }

    /// Pending invitations addressed to the principal's email.
    pub async fn list_received(&self, session: &SessionContext, query: PageQuery) -> Result<Page<HouseholdInvitation>> {
        self.sweep().await?;
        let filter = RecordFilter::scoped(Column::RightId, User::normalize_email(&session.email_address));
        self.kernel.list_filtered(session, filter, query).await
    }

    #[instrument(skip(self, session, input), fields(invitation_id = %id, user_id = %session.user_id))]
    pub async fn accept(
        &self,
        session: &SessionContext,
        id: &str,
        input: HouseholdInvitationResponseInput,
    ) -> Result<HouseholdInvitation> {
        input.validate()?;
        let actor = Some(&session.user_id);

        let mut tx = self.kernel.db().write().await?;
        let mut invitation = Self::load_in(&mut tx, id).await?;
        if !invitation.is_addressed_to(&session.email_address) {
            return Err(LarderError::not_found(HouseholdInvitation::KIND, id));
        }
        if invitation.has_lapsed(self.kernel.now()) {
            return Err(self.expire_now(tx, invitation).await);
        }
        Self::check_open(&invitation)?;
        Self::check_token(&invitation, &input.token)?;

        let (_, joined) = self
            .households
            .add_member_in(
                &mut tx,
                &invitation.destination_household,
                &session.user_id,
                HouseholdRole::HouseholdMember,
                false,
                actor,
            )
            .await?;
        invitation.resolve(InvitationStatus::Accepted, input.note, self.kernel.now());
        invitation.to_user = Some(session.user_id.clone());
        let accepted = self.kernel.transition_in(&mut tx, actor, &mut invitation, ACCEPTED).await?;
        tx.commit().await?;

        self.kernel.changes().publish_all([joined, accepted]);
        Ok(invitation)
    }

    #[instrument(skip(self, session, input), fields(invitation_id = %id, user_id = %session.user_id))]
    pub async fn reject(
        &self,
        session: &SessionContext,
        id: &str,
        input: HouseholdInvitationResponseInput,
    ) -> Result<HouseholdInvitation> {
        input.validate()?;

        let mut tx = self.kernel.db().write().await?;
        let mut invitation = Self::load_in(&mut tx, id).await?;
        if !invitation.is_addressed_to(&session.email_address) {
            return Err(LarderError::not_found(HouseholdInvitation::KIND, id));
        }
        if invitation.has_lapsed(self.kernel.now()) {
            return Err(self.expire_now(tx, invitation).await);
        }
        Self::check_open(&invitation)?;
        Self::check_token(&invitation, &input.token)?;

        invitation.resolve(InvitationStatus::Rejected, input.note, self.kernel.now());
        let event = self.kernel.transition_in(&mut tx, Some(&session.user_id), &mut invitation, REJECTED).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(invitation)
    }

    /// Only the sender or an admin of the destination household may cancel.
    #[instrument(skip(self, session, input), fields(invitation_id = %id, user_id = %session.user_id))]
    pub async fn cancel(
        &self,
        session: &SessionContext,
        id: &str,
        input: HouseholdInvitationCancelInput,
    ) -> Result<HouseholdInvitation> {
        let mut tx = self.kernel.db().write().await?;
        let mut invitation = Self::load_in(&mut tx, id).await?;
        if !Self::visible_to(session, &invitation) {
            return Err(LarderError::not_found(HouseholdInvitation::KIND, id));
        }
        let is_sender = invitation.from_user == session.user_id;
        let is_admin = session
            .household_role(&invitation.destination_household)
            .is_some_and(|role| role.is_admin());
        if !is_sender && !is_admin {
            return Err(LarderError::forbidden("only the sender or a household admin may cancel an invitation"));
        }
        if invitation.has_lapsed(self.kernel.now()) {
            return Err(self.expire_now(tx, invitation).await);
        }
        Self::check_open(&invitation)?;

        invitation.resolve(InvitationStatus::Cancelled, input.note, self.kernel.now());
        let event = self.kernel.transition_in(&mut tx, Some(&session.user_id), &mut invitation, CANCELLED).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(invitation)
    }

    /// Consume an invitation while registering `user`, inside the registration
    /// transaction.
    pub async fn accept_for_registration_in(
        &self,
        conn: &mut SqliteConnection,
        invitation_id: &str,
        token: &str,
        user: &User,
    ) -> Result<Vec<ChangeEvent>> {
        let mut invitation = records::fetch_live::<HouseholdInvitation>(conn, invitation_id)
            .await?
            .ok_or_else(|| LarderError::validation_field("unknown invitation", "invitationID"))?;
        if !invitation.is_addressed_to(&user.email_address) {
            return Err(LarderError::validation_field(
                "invitation is addressed to a different email address",
                "invitationID",
            ));
        }
        if invitation.has_lapsed(self.kernel.now()) {
            return Err(LarderError::conflict("invitation has expired", HouseholdInvitation::KIND));
        }
        Self::check_open(&invitation)?;
        Self::check_token(&invitation, token)?;

        let actor = Some(&user.id);
        let (_, joined) = self
            .households
            .add_member_in(conn, &invitation.destination_household, &user.id, HouseholdRole::HouseholdMember, false, actor)
            .await?;
        invitation.resolve(InvitationStatus::Accepted, String::new(), self.kernel.now());
        invitation.to_user = Some(user.id.clone());
        let accepted = self.kernel.transition_in(conn, actor, &mut invitation, ACCEPTED).await?;
        Ok(vec![joined, accepted])
    }

    fn check_open(invitation: &HouseholdInvitation) -> Result<()> {
        if invitation.status.is_pending() {
            Ok(())
        } else {
            Err(LarderError::conflict(
                format!("invitation is already {}", invitation.status),
                HouseholdInvitation::KIND,
            ))
        }
    }

    fn check_token(invitation: &HouseholdInvitation, token: &str) -> Result<()> {
        if constant_time_eq(&invitation.token, token) {
            Ok(())
        } else {
            Err(LarderError::validation_field("invalid invitation token", "token"))
        }
    }
}
