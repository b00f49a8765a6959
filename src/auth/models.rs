//! Principal and session models shared by the session layer, the
//! authorization evaluator and every service.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{HouseholdId, SessionId, UserId};
use crate::errors::{LarderError, Result};
use crate::storage::AuthKind;

crate::string_enum! {
    /// Service-wide role of an account.
    pub enum ServiceRole {
        ServiceUser => "serviceUser",
        ServiceAdmin => "serviceAdmin",
    }
}

crate::string_enum! {
    /// Role of a member within a household.
    pub enum HouseholdRole {
        HouseholdAdmin => "householdAdmin",
        HouseholdMember => "householdMember",
    }
}

impl HouseholdRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, HouseholdRole::HouseholdAdmin)
    }
}

crate::string_enum! {
    /// Standing of an account. Anything but `good` is denied all operations.
    pub enum Reputation {
        Good => "good",
        Banned => "banned",
        Terminated => "terminated",
    }
}

impl Reputation {
    pub fn is_good(&self) -> bool {
        matches!(self, Reputation::Good)
    }
}

/// Request-scoped principal resolved from a cookie or bearer session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub username: String,
    pub email_address: String,
    pub service_role: ServiceRole,
    pub reputation: Reputation,
    pub auth_kind: AuthKind,
    pub active_household_id: Option<HouseholdId>,
    /// Live memberships of the principal.
    pub memberships: BTreeMap<HouseholdId, HouseholdRole>,
}

impl SessionContext {
    pub fn is_service_admin(&self) -> bool {
        matches!(self.service_role, ServiceRole::ServiceAdmin)
    }

    pub fn household_role(&self, household_id: &HouseholdId) -> Option<HouseholdRole> {
        self.memberships.get(household_id).copied()
    }

    pub fn is_member_of(&self, household_id: &HouseholdId) -> bool {
        self.memberships.contains_key(household_id)
    }

    /// The active household, which always resolves to a live membership.
    pub fn active_household(&self) -> Result<&HouseholdId> {
        self.active_household_id
            .as_ref()
            .filter(|household_id| self.is_member_of(household_id))
            .ok_or_else(|| LarderError::not_found("household", "active"))
    }

    /// Role in the active household.
    pub fn active_role(&self) -> Option<HouseholdRole> {
        self.active_household_id.as_ref().and_then(|household_id| self.household_role(household_id))
    }
}

/// Body of `GET /auth/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusResponse {
    pub user_is_authenticated: bool,
    #[serde(rename = "userID")]
    pub user_id: UserId,
    pub active_household: Option<HouseholdId>,
    pub user_reputation: Reputation,
    pub service_role: ServiceRole,
    pub household_role: Option<HouseholdRole>,
}

impl From<&SessionContext> for UserStatusResponse {
    fn from(session: &SessionContext) -> Self {
        Self {
            user_is_authenticated: true,
            user_id: session.user_id.clone(),
            active_household: session.active_household_id.clone(),
            user_reputation: session.reputation,
            service_role: session.service_role,
            household_role: session.active_role(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A member session for unit tests.
    pub fn session(user: &str, household: &str, role: HouseholdRole) -> SessionContext {
        let mut memberships = BTreeMap::new();
        memberships.insert(HouseholdId::from(household), role);
        SessionContext {
            session_id: SessionId::from("s-test"),
            user_id: UserId::from(user),
            username: user.to_string(),
            email_address: format!("{user}@example.com"),
            service_role: ServiceRole::ServiceUser,
            reputation: Reputation::Good,
            auth_kind: AuthKind::Cookie,
            active_household_id: Some(HouseholdId::from(household)),
            memberships,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::session;
    use super::*;

    #[test]
    fn active_household_requires_membership() {
        let mut ctx = session("u1", "h1", HouseholdRole::HouseholdMember);
        assert_eq!(ctx.active_household().unwrap(), &HouseholdId::from("h1"));

        ctx.active_household_id = Some(HouseholdId::from("h2"));
        assert!(ctx.active_household().is_err());
        assert_eq!(ctx.active_role(), None);
    }

    #[test]
    fn role_wire_names() {
        assert_eq!(HouseholdRole::HouseholdAdmin.as_str(), "householdAdmin");
        assert_eq!("terminated".parse::<Reputation>().unwrap(), Reputation::Terminated);
        assert!("suspended".parse::<Reputation>().is_err());
    }
}
