//! Household and membership management.
//!
//! Every user keeps at least one live membership: removing a user's last
//! membership (directly or by archiving the household) synthesizes a backup
//! household inside the same transaction.

use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::models::{
    ChangeActiveHouseholdInput, Household, HouseholdCreationInput, HouseholdMembership,
    HouseholdOwnershipTransferInput, HouseholdUpdateInput, HouseholdView, MemberView, ModifyMembershipInput,
};
use crate::auth::authorization::{authorize_household, Action};
use crate::auth::models::{HouseholdRole, SessionContext};
use crate::auth::user::User;
use crate::domain::{HouseholdId, Page, PageQuery, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{ChangeEvent, Kernel, Patchable};
use crate::storage::audit_log::{self, AuditEvent};
use crate::storage::{records, sessions, Column};

#[derive(Debug, Clone)]
pub struct HouseholdService {
    kernel: Kernel,
}

impl HouseholdService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    // ---------------------------------------------------------------------
    // Transaction-level building blocks
    // ---------------------------------------------------------------------

    /// Live memberships of a user, oldest first.
    pub async fn memberships_in(conn: &mut SqliteConnection, user_id: &UserId) -> Result<Vec<HouseholdMembership>> {
        records::list_all(conn, &[(Column::UserId, user_id.to_string())]).await
    }

    /// Live memberships of a household, oldest first.
    pub async fn members_in(conn: &mut SqliteConnection, household_id: &HouseholdId) -> Result<Vec<HouseholdMembership>> {
        records::list_all(conn, &[(Column::HouseholdId, household_id.to_string())]).await
    }

    pub async fn membership_in(
        conn: &mut SqliteConnection,
        household_id: &HouseholdId,
        user_id: &UserId,
    ) -> Result<Option<HouseholdMembership>> {
        records::find_by(conn, Column::UniqueKey, &format!("{}:{}", household_id, user_id)).await
    }

    async fn live_household_in(conn: &mut SqliteConnection, id: &HouseholdId) -> Result<Household> {
        records::fetch_live(conn, id.as_str())
            .await?
            .ok_or_else(|| LarderError::not_found("household", id.as_str()))
    }

    /// Insert a household with `owner` as its admin member.
    pub async fn create_household_in(
        &self,
        conn: &mut SqliteConnection,
        household: &Household,
        default_household: bool,
        actor: Option<&UserId>,
    ) -> Result<Vec<ChangeEvent>> {
        let mut events = vec![self.kernel.insert_in(conn, actor, household).await?];
        let (_, event) = self
            .add_member_in(
                conn,
                &household.id,
                &household.belongs_to_user,
                HouseholdRole::HouseholdAdmin,
                default_household,
                actor,
            )
            .await?;
        events.push(event);
        Ok(events)
    }

    /// Insert a membership. An existing live membership is a conflict.
    pub async fn add_member_in(
        &self,
        conn: &mut SqliteConnection,
        household_id: &HouseholdId,
        user_id: &UserId,
        role: HouseholdRole,
        default_household: bool,
        actor: Option<&UserId>,
    ) -> Result<(HouseholdMembership, ChangeEvent)> {
        if Self::membership_in(conn, household_id, user_id).await?.is_some() {
            return Err(LarderError::conflict(
                format!("user '{}' is already a member of household '{}'", user_id, household_id),
                "householdMembership",
            ));
        }

        let membership =
            HouseholdMembership::new(user_id.clone(), household_id.clone(), role, default_household, self.kernel.now());
        records::insert(conn, &membership).await?;
        let event = self.kernel.journal_as_in(conn, actor, &membership, "userAddedToHousehold").await?;
        Ok((membership, event))
    }

    /// Give `user_id` a fresh personal household if they have no live membership.
    pub async fn ensure_backup_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        actor: Option<&UserId>,
    ) -> Result<Vec<ChangeEvent>> {
        if !Self::memberships_in(conn, user_id).await?.is_empty() {
            return Ok(Vec::new());
        }

        let username = records::fetch::<User>(conn, user_id.as_str())
            .await?
            .map(|user| user.username)
            .unwrap_or_else(|| user_id.to_string());
        let household = Household::named(format!("{}'s household", username), user_id.clone(), self.kernel.now());
        info!(user_id = %user_id, household_id = %household.id, "synthesizing backup household");

        let mut events = self.create_household_in(conn, &household, true, actor).await?;
        events.push(self.kernel.journal_as_in(conn, actor, &household, "backupHouseholdCreated").await?);
        Ok(events)
    }

    async fn archive_membership_in(
        &self,
        conn: &mut SqliteConnection,
        membership: &mut HouseholdMembership,
        actor: Option<&UserId>,
    ) -> Result<ChangeEvent> {
        membership.timestamps.archive(self.kernel.now());
        records::save(conn, membership).await?;
        self.kernel.journal_as_in(conn, actor, membership, "userRemovedFromHousehold").await
    }

    /// Drop every membership of a departing user. Households they own pass
    /// to the longest-standing remaining admin, or else the oldest member;
    /// households they alone belong to are archived.
    pub async fn relinquish_all_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        actor: Option<&UserId>,
    ) -> Result<Vec<ChangeEvent>> {
        let mut events = Vec::new();
        for mut membership in Self::memberships_in(conn, user_id).await? {
            let household_id = membership.belongs_to_household.clone();
            events.push(self.archive_membership_in(conn, &mut membership, actor).await?);

            let Some(mut household) = records::fetch_live::<Household>(conn, household_id.as_str()).await? else {
                continue;
            };
            if &household.belongs_to_user != user_id {
                continue;
            }

            let remaining = Self::members_in(conn, &household_id).await?;
            let successor = remaining
                .iter()
                .find(|member| member.household_role.is_admin())
                .or_else(|| remaining.first())
                .cloned();
            let Some(mut successor) = successor else {
                events.push(self.kernel.archive_in(conn, actor, &mut household).await?);
                continue;
            };

            info!(
                household_id = %household_id,
                previous_owner = %user_id,
                new_owner = %successor.belongs_to_user,
                "passing household to remaining member"
            );
            household.belongs_to_user = successor.belongs_to_user.clone();
            events.push(self.kernel.transition_in(conn, actor, &mut household, "OwnershipTransferred").await?);
            if !successor.household_role.is_admin() {
                successor.household_role = HouseholdRole::HouseholdAdmin;
                events.push(
                    self.kernel.transition_as_in(conn, actor, &mut successor, "userHouseholdPermissionsChanged").await?,
                );
            }
        }
        Ok(events)
    }

    pub async fn view_in(conn: &mut SqliteConnection, household: Household) -> Result<HouseholdView> {
        let memberships = Self::members_in(conn, &household.id).await?;
        let mut members = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let Some(user) = records::fetch_live::<User>(conn, membership.belongs_to_user.as_str()).await? else {
                continue;
            };
            members.push(MemberView {
                id: membership.id,
                user_id: membership.belongs_to_user,
                username: user.username,
                email_address: user.email_address,
                household_role: membership.household_role,
                default_household: membership.default_household,
                created_at: membership.timestamps.created_at,
            });
        }
        Ok(HouseholdView { household, members })
    }

    // ---------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: HouseholdCreationInput) -> Result<HouseholdView> {
        input.validate()?;
        let household = Household::from_input(input, session.user_id.clone(), self.kernel.now());

        let mut tx = self.kernel.db().write().await?;
        let events = self.create_household_in(&mut tx, &household, false, Some(&session.user_id)).await?;
        let view = Self::view_in(&mut tx, household).await?;
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        Ok(view)
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<HouseholdView>> {
        let mut conn = self.kernel.db().read().await?;
        let memberships = Self::memberships_in(&mut conn, &session.user_id).await?;
        let mut views = Vec::with_capacity(memberships.len());
        for membership in memberships {
            if let Some(household) =
                records::fetch_live::<Household>(&mut conn, membership.belongs_to_household.as_str()).await?
            {
                views.push(Self::view_in(&mut conn, household).await?);
            }
        }
        Ok(Page::from_all(views, &query))
    }

    pub async fn get(&self, session: &SessionContext, id: &HouseholdId) -> Result<HouseholdView> {
        authorize_household(session, Action::Read, id)?;
        let mut conn = self.kernel.db().read().await?;
        let household = Self::live_household_in(&mut conn, id).await?;
        Self::view_in(&mut conn, household).await
    }

    pub async fn current(&self, session: &SessionContext) -> Result<HouseholdView> {
        let id = session.active_household()?.clone();
        self.get(session, &id).await
    }

    #[instrument(skip(self, session, patch), fields(household_id = %id))]
    pub async fn update(
        &self,
        session: &SessionContext,
        id: &HouseholdId,
        patch: HouseholdUpdateInput,
    ) -> Result<HouseholdView> {
        patch.validate()?;
        authorize_household(session, Action::UpdateHousehold, id)?;

        let mut tx = self.kernel.db().write().await?;
        let mut household = Self::live_household_in(&mut tx, id).await?;
        household.apply_patch(patch, session)?;
        let event = self.kernel.update_in(&mut tx, Some(&session.user_id), &mut household).await?;
        let view = Self::view_in(&mut tx, household).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(view)
    }

    /// Archive a household and every membership in it. Members left without
    /// a household receive a backup household.
    #[instrument(skip(self, session), fields(household_id = %id))]
    pub async fn archive(&self, session: &SessionContext, id: &HouseholdId) -> Result<()> {
        authorize_household(session, Action::DeleteHousehold, id)?;
        let actor = Some(&session.user_id);

        let mut tx = self.kernel.db().write().await?;
        let mut household = Self::live_household_in(&mut tx, id).await?;
        let mut events = vec![self.kernel.archive_in(&mut tx, actor, &mut household).await?];

        let members = Self::members_in(&mut tx, id).await?;
        for mut membership in members {
            events.push(self.archive_membership_in(&mut tx, &mut membership, actor).await?);
            events.extend(self.ensure_backup_in(&mut tx, &membership.belongs_to_user, actor).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        Ok(())
    }

    /// Make `id` the household sessions start in.
    pub async fn set_default(&self, session: &SessionContext, id: &HouseholdId) -> Result<HouseholdMembership> {
        authorize_household(session, Action::Read, id)?;

        let mut tx = self.kernel.db().write().await?;
        let mut chosen = None;
        for mut membership in Self::memberships_in(&mut tx, &session.user_id).await? {
            let is_target = &membership.belongs_to_household == id;
            if membership.default_household != is_target {
                membership.default_household = is_target;
                membership.timestamps.touch(self.kernel.now());
                records::save(&mut tx, &membership).await?;
            }
            if is_target {
                chosen = Some(membership);
            }
        }
        let membership = chosen.ok_or_else(|| LarderError::not_found("household", id.as_str()))?;
        audit_log::append(
            &mut tx,
            AuditEvent::new("defaultHouseholdChanged", Some(&session.user_id)).household(id),
            self.kernel.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(membership)
    }

    /// Hand ownership to another member. The new owner becomes an admin; the
    /// previous owner stays a member.
    #[instrument(skip(self, session, input), fields(household_id = %id))]
    pub async fn transfer_ownership(
        &self,
        session: &SessionContext,
        id: &HouseholdId,
        input: HouseholdOwnershipTransferInput,
    ) -> Result<HouseholdView> {
        input.validate()?;
        authorize_household(session, Action::TransferOwnership, id)?;
        let actor = Some(&session.user_id);
        let new_owner = UserId::from(input.new_owner.as_str());

        let mut tx = self.kernel.db().write().await?;
        let mut household = Self::live_household_in(&mut tx, id).await?;
        if household.belongs_to_user.as_str() != input.current_owner {
            return Err(LarderError::validation_field("currentOwner does not own this household", "currentOwner"));
        }
        let mut membership = Self::membership_in(&mut tx, id, &new_owner)
            .await?
            .ok_or_else(|| LarderError::validation_field("newOwner must be a member of the household", "newOwner"))?;

        household.belongs_to_user = new_owner.clone();
        let mut events = vec![
            self.kernel.transition_in(&mut tx, actor, &mut household, "OwnershipTransferred").await?,
        ];
        if !membership.household_role.is_admin() {
            membership.household_role = HouseholdRole::HouseholdAdmin;
            events.push(
                self.kernel.transition_as_in(&mut tx, actor, &mut membership, "userHouseholdPermissionsChanged").await?,
            );
        }
        audit_log::append(
            &mut tx,
            AuditEvent::new("householdTransferReason", actor)
                .household(id)
                .with("previousOwner", input.current_owner.as_str())
                .with("newOwner", new_owner.as_str())
                .with("reason", input.reason.as_str()),
            self.kernel.now(),
        )
        .await?;
        let view = Self::view_in(&mut tx, household).await?;
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        Ok(view)
    }

    /// Remove a member. Members may always remove themselves; removing others
    /// needs the admin role. The owner cannot be removed.
    #[instrument(skip(self, session), fields(household_id = %household_id, target_user = %user_id))]
    pub async fn remove_member(
        &self,
        session: &SessionContext,
        household_id: &HouseholdId,
        user_id: &UserId,
    ) -> Result<()> {
        let action = if user_id == &session.user_id { Action::Read } else { Action::ModifyMembership };
        authorize_household(session, action, household_id)?;
        let actor = Some(&session.user_id);

        let mut tx = self.kernel.db().write().await?;
        let household = Self::live_household_in(&mut tx, household_id).await?;
        if &household.belongs_to_user == user_id {
            return Err(LarderError::conflict(
                "the household owner cannot be removed; transfer ownership first",
                "householdMembership",
            ));
        }
        let mut membership = Self::membership_in(&mut tx, household_id, user_id)
            .await?
            .ok_or_else(|| LarderError::not_found("householdMembership", user_id.as_str()))?;

        let mut events = vec![self.archive_membership_in(&mut tx, &mut membership, actor).await?];
        events.extend(self.ensure_backup_in(&mut tx, user_id, actor).await?);
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        Ok(())
    }

    /// Change a member's role. The owner always keeps the admin role.
    #[instrument(skip(self, session, input), fields(household_id = %household_id, target_user = %user_id))]
    pub async fn change_role(
        &self,
        session: &SessionContext,
        household_id: &HouseholdId,
        user_id: &UserId,
        input: ModifyMembershipInput,
    ) -> Result<HouseholdMembership> {
        input.validate()?;
        authorize_household(session, Action::ModifyMembership, household_id)?;

        let mut tx = self.kernel.db().write().await?;
        let household = Self::live_household_in(&mut tx, household_id).await?;
        let mut membership = Self::membership_in(&mut tx, household_id, user_id)
            .await?
            .ok_or_else(|| LarderError::not_found("householdMembership", user_id.as_str()))?;
        if &household.belongs_to_user == user_id && !input.new_role.is_admin() {
            return Err(LarderError::conflict("the household owner must remain an admin", "householdMembership"));
        }

        membership.household_role = input.new_role;
        let event = self
            .kernel
            .transition_as_in(&mut tx, Some(&session.user_id), &mut membership, "userHouseholdPermissionsChanged")
            .await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(membership)
    }

    /// Point the session at another household the principal belongs to.
    #[instrument(skip(self, session, input), fields(session_id = %session.session_id))]
    pub async fn switch_active(&self, session: &SessionContext, input: ChangeActiveHouseholdInput) -> Result<HouseholdId> {
        input.validate()?;
        let household_id = HouseholdId::from(input.household_id.as_str());
        if !session.is_member_of(&household_id) {
            return Err(LarderError::not_found("household", household_id.as_str()));
        }

        let mut tx = self.kernel.db().write().await?;
        sessions::set_active_household(&mut tx, &session.session_id, &household_id).await?;
        audit_log::append(
            &mut tx,
            AuditEvent::new("activeHouseholdChanged", Some(&session.user_id)).household(&household_id),
            self.kernel.now(),
        )
        .await?;
        tx.commit().await?;
        Ok(household_id)
    }
}
