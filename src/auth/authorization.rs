//! Authorization evaluator.
//!
//! Maps (principal, active household, target) to permit or deny for an
//! operation kind. Tenant-scoped denials surface as `notFound` so the existence
//! of another tenant's records is never revealed; only unambiguous capability
//! failures (admin-only operations) surface as `forbidden`.

use std::fmt;

use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, UserId};
use crate::errors::{LarderError, Result};

/// Operation kinds the evaluator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Archive,
    ModifyMembership,
    TransferOwnership,
    UpdateHousehold,
    DeleteHousehold,
}

impl Action {
    /// Operations reserved for household admins.
    pub fn requires_household_admin(&self) -> bool {
        matches!(
            self,
            Action::ModifyMembership
                | Action::TransferOwnership
                | Action::UpdateHousehold
                | Action::DeleteHousehold
        )
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Action::Read)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Archive => "archive",
            Action::ModifyMembership => "modifyMembership",
            Action::TransferOwnership => "transferOwnership",
            Action::UpdateHousehold => "updateHousehold",
            Action::DeleteHousehold => "deleteHousehold",
        };
        f.write_str(name)
    }
}

/// Who owns a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// Global reference data and admin-managed records.
    System,
    User(UserId),
    Household(HouseholdId),
}

impl Owner {
    pub fn household_id(&self) -> Option<&HouseholdId> {
        match self {
            Owner::Household(household_id) => Some(household_id),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Owner::User(user_id) => Some(user_id),
            _ => None,
        }
    }
}

/// The record an operation targets.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub kind: &'a str,
    pub id: &'a str,
    pub owner: &'a Owner,
}

/// Decide whether `session` may perform `action` on `target`.
pub fn authorize(session: &SessionContext, action: Action, target: Target<'_>) -> Result<()> {
    let hidden = || LarderError::not_found(target.kind, target.id);

    match target.owner {
        Owner::System => {
            if !action.is_write() || session.is_service_admin() {
                Ok(())
            } else {
                Err(LarderError::forbidden(format!(
                    "{} of {} requires a service admin",
                    action, target.kind
                )))
            }
        }
        Owner::User(owner) => {
            if owner == &session.user_id {
                Ok(())
            } else {
                Err(hidden())
            }
        }
        Owner::Household(household_id) => {
            let active = session.active_household_id.as_ref() == Some(household_id);
            match session.household_role(household_id) {
                Some(role) if active => {
                    if action.requires_household_admin() && !role.is_admin() {
                        Err(LarderError::forbidden(format!(
                            "{} requires the householdAdmin role",
                            action
                        )))
                    } else {
                        Ok(())
                    }
                }
                _ => Err(hidden()),
            }
        }
    }
}

/// Authorize an operation on a household itself. Membership in any of the
/// principal's households suffices; it need not be the active one.
pub fn authorize_household(session: &SessionContext, action: Action, household_id: &HouseholdId) -> Result<()> {
    match session.household_role(household_id) {
        Some(role) if action.requires_household_admin() && !role.is_admin() => Err(LarderError::forbidden(
            format!("{} requires the householdAdmin role", action),
        )),
        Some(_) => Ok(()),
        None => Err(LarderError::not_found("household", household_id.as_str())),
    }
}

/// Reject principals that are not service admins.
pub fn require_service_admin(session: &SessionContext) -> Result<()> {
    if session.is_service_admin() {
        Ok(())
    } else {
        Err(LarderError::forbidden("operation requires a service admin"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::{HouseholdRole, ServiceRole};
    use crate::errors::ErrorCode;

    fn household(id: &str) -> Owner {
        Owner::Household(HouseholdId::from(id))
    }

    fn code(result: Result<()>) -> Option<ErrorCode> {
        result.err().map(|err| err.code())
    }

    #[test]
    fn global_reads_are_open_writes_need_admin() {
        let mut member = session("u1", "h1", HouseholdRole::HouseholdAdmin);
        let target = Target { kind: "validIngredient", id: "i1", owner: &Owner::System };

        assert!(authorize(&member, Action::Read, target).is_ok());
        assert_eq!(code(authorize(&member, Action::Create, target)), Some(ErrorCode::Forbidden));

        member.service_role = ServiceRole::ServiceAdmin;
        assert!(authorize(&member, Action::Archive, target).is_ok());
    }

    #[test]
    fn user_scoped_records_are_owner_only() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mine = Owner::User(UserId::from("u1"));
        let theirs = Owner::User(UserId::from("u2"));

        assert!(authorize(&member, Action::Update, Target { kind: "n", id: "1", owner: &mine }).is_ok());
        assert_eq!(
            code(authorize(&member, Action::Read, Target { kind: "n", id: "2", owner: &theirs })),
            Some(ErrorCode::NotFound)
        );
    }

    #[test]
    fn household_records_require_active_membership() {
        let mut member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let owner = household("h1");
        let target = Target { kind: "webhook", id: "w1", owner: &owner };
        assert!(authorize(&member, Action::Archive, target).is_ok());

        let foreign = household("h2");
        let foreign_target = Target { kind: "webhook", id: "w2", owner: &foreign };
        assert_eq!(code(authorize(&member, Action::Read, foreign_target)), Some(ErrorCode::NotFound));

        member.memberships.insert(HouseholdId::from("h2"), HouseholdRole::HouseholdMember);
        assert_eq!(code(authorize(&member, Action::Read, foreign_target)), Some(ErrorCode::NotFound));

        member.active_household_id = Some(HouseholdId::from("h2"));
        assert!(authorize(&member, Action::Read, foreign_target).is_ok());
    }

    #[test]
    fn privileged_household_actions_need_admin_role() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let owner = household("h1");
        let target = Target { kind: "household", id: "h1", owner: &owner };
        assert_eq!(
            code(authorize(&member, Action::TransferOwnership, target)),
            Some(ErrorCode::Forbidden)
        );

        let admin = session("u2", "h1", HouseholdRole::HouseholdAdmin);
        assert!(authorize(&admin, Action::ModifyMembership, target).is_ok());
        assert!(authorize_household(&admin, Action::DeleteHousehold, &HouseholdId::from("h1")).is_ok());
        assert_eq!(
            code(authorize_household(&admin, Action::Read, &HouseholdId::from("h9"))),
            Some(ErrorCode::NotFound)
        );
    }
}
