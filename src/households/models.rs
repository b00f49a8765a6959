//! Households, memberships and their DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::{HouseholdRole, SessionContext};
use crate::domain::{new_record_id, HouseholdId, Timestamps, UserId};
use crate::errors::Result;
use crate::kernel::{name_key, patch_field, Patchable, Resource, Scope};
use crate::storage::{Document, RecordIndex};

/// A tenancy boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub id: HouseholdId,
    pub name: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// The owner. Always a member with the admin role.
    pub belongs_to_user: UserId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Household {
    pub fn named(name: impl Into<String>, owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: HouseholdId::new(),
            name: name.into(),
            contact_phone: String::new(),
            address_line1: String::new(),
            address_line2: String::new(),
            city: String::new(),
            state: String::new(),
            zip_code: String::new(),
            country: String::new(),
            latitude: None,
            longitude: None,
            belongs_to_user: owner,
            timestamps: Timestamps::created(now),
        }
    }

    pub fn from_input(input: HouseholdCreationInput, owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            contact_phone: input.contact_phone,
            address_line1: input.address_line1,
            address_line2: input.address_line2,
            city: input.city,
            state: input.state,
            zip_code: input.zip_code,
            country: input.country,
            latitude: input.latitude,
            longitude: input.longitude,
            ..Self::named(input.name, owner, now)
        }
    }
}

impl Document for Household {
    const KIND: &'static str = "household";

    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    fn index(&self) -> RecordIndex {
        RecordIndex {
            household_id: Some(self.id.to_string()),
            user_id: Some(self.belongs_to_user.to_string()),
            search_key: Some(name_key(&self.name)),
            ..Default::default()
        }
    }
}

impl Resource for Household {
    const NOUN: &'static str = "household";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.id.clone())
    }
}

impl Patchable for Household {
    type Patch = HouseholdUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name);
        patch_field(&mut self.contact_phone, patch.contact_phone);
        patch_field(&mut self.address_line1, patch.address_line1);
        patch_field(&mut self.address_line2, patch.address_line2);
        patch_field(&mut self.city, patch.city);
        patch_field(&mut self.state, patch.state);
        patch_field(&mut self.zip_code, patch.zip_code);
        patch_field(&mut self.country, patch.country);
        if patch.latitude.is_some() {
            self.latitude = patch.latitude;
        }
        if patch.longitude.is_some() {
            self.longitude = patch.longitude;
        }
        Ok(())
    }
}

/// A user's membership in a household.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdMembership {
    pub id: String,
    pub belongs_to_user: UserId,
    pub belongs_to_household: HouseholdId,
    pub household_role: HouseholdRole,
    #[serde(default)]
    pub default_household: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl HouseholdMembership {
    pub fn new(
        user_id: UserId,
        household_id: HouseholdId,
        role: HouseholdRole,
        default_household: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_user: user_id,
            belongs_to_household: household_id,
            household_role: role,
            default_household,
            timestamps: Timestamps::created(now),
        }
    }
}

impl Document for HouseholdMembership {
    const KIND: &'static str = "householdMembership";

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
            household_id: Some(self.belongs_to_household.to_string()),
            user_id: Some(self.belongs_to_user.to_string()),
            unique_key: Some(format!("{}:{}", self.belongs_to_household, self.belongs_to_user)),
            ..Default::default()
        }
    }
}

impl Resource for HouseholdMembership {
    const NOUN: &'static str = "householdMembership";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }
}

/// A member as listed on a household.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub id: String,
    #[serde(rename = "belongsToUser")]
    pub user_id: UserId,
    pub username: String,
    pub email_address: String,
    pub household_role: HouseholdRole,
    pub default_household: bool,
    pub created_at: DateTime<Utc>,
}

/// A household with its live members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdView {
    #[serde(flatten)]
    pub household: Household,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be within [-180, 180]"))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub contact_phone: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "latitude must be within [-90, 90]"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "longitude must be within [-180, 180]"))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdOwnershipTransferInput {
    #[validate(length(min = 1, message = "currentOwner is required"))]
    pub current_owner: String,
    #[validate(length(min = 1, message = "newOwner is required"))]
    pub new_owner: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMembershipInput {
    pub new_role: HouseholdRole,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeActiveHouseholdInput {
    #[serde(rename = "householdID")]
    #[validate(length(min = 1, message = "householdID is required"))]
    pub household_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;

    #[test]
    fn membership_is_unique_per_household_and_user() {
        let membership = HouseholdMembership::new(
            UserId::from("u1"),
            HouseholdId::from("h1"),
            HouseholdRole::HouseholdMember,
            false,
            Utc::now(),
        );
        assert_eq!(membership.index().unique_key.as_deref(), Some("h1:u1"));
        assert_eq!(membership.owner(), Owner::Household(HouseholdId::from("h1")));
    }

    #[test]
    fn patch_leaves_absent_fields_alone() {
        let mut household = Household::named("Home", UserId::from("u1"), Utc::now());
        household.city = "Lisbon".to_string();
        let patch = HouseholdUpdateInput { name: Some("Cabin".to_string()), latitude: Some(38.7), ..Default::default() };
        household
            .apply_patch(patch, &session("u1", household.id.as_str(), HouseholdRole::HouseholdAdmin))
            .unwrap();

        assert_eq!(household.name, "Cabin");
        assert_eq!(household.city, "Lisbon");
        assert_eq!(household.latitude, Some(38.7));
    }

    #[test]
    fn coordinates_are_range_checked() {
        let input = HouseholdCreationInput { name: "Home".to_string(), latitude: Some(91.0), ..Default::default() };
        assert!(input.validate().is_err());
    }
}
