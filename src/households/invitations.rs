//! Household invitations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::user::User;
use crate::domain::{HouseholdId, Timestamps, UserId};
use crate::kernel::{Resource, Scope};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    /// `pending` is the only non-terminal state.
    pub enum InvitationStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Cancelled => "cancelled",
        Expired => "expired",
    }
}

impl InvitationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, InvitationStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitation {
    pub id: String,
    #[serde(rename = "destinationHouseholdID")]
    pub destination_household: HouseholdId,
    pub from_user: UserId,
    /// Set when the address belonged to a registered user at send time.
    #[serde(default)]
    pub to_user: Option<UserId>,
    pub to_email: String,
    #[serde(default)]
    pub to_name: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub status_note: String,
    /// Single-use acceptance token.
    pub token: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl HouseholdInvitation {
    pub fn is_addressed_to(&self, email: &str) -> bool {
        User::normalize_email(&self.to_email) == User::normalize_email(email)
    }

    pub fn has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status.is_pending() && self.expires_at <= now
    }

    /// Move out of `pending`.
    pub fn resolve(&mut self, status: InvitationStatus, note: String, now: DateTime<Utc>) {
        self.status = status;
        self.status_note = note;
        self.responded_at = Some(now);
    }
}

impl Document for HouseholdInvitation {
    const KIND: &'static str = "householdInvitation";

    fn id(&self) -> &str {
        &self.id
    }

    fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    fn timestamps_mut(&mut self) -> &mut Timestamps {
        &mut self.timestamps
    }

    // Sender and recipient columns are only populated while pending, so the
    // sent/received listings hold exactly the open invitations.
    fn index(&self) -> RecordIndex {
        let pending = self.status.is_pending();
        let email = User::normalize_email(&self.to_email);
        RecordIndex {
            household_id: Some(self.destination_household.to_string()),
            user_id: Some(self.from_user.to_string()),
            left_id: pending.then(|| self.from_user.to_string()),
            right_id: pending.then(|| email.clone()),
            unique_key: pending.then(|| format!("{}:{}", self.destination_household, email)),
            due_at: pending.then_some(self.expires_at),
            ..Default::default()
        }
    }
}

impl Resource for HouseholdInvitation {
    const NOUN: &'static str = "invitation";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.destination_household.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitationCreationInput {
    #[validate(email(message = "toEmail must be a valid email address"))]
    pub to_email: String,
    #[serde(default)]
    pub to_name: String,
    #[serde(default)]
    #[validate(length(max = 2048, message = "note is too long"))]
    pub note: String,
    /// Overrides the configured invitation lifetime.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitationResponseInput {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HouseholdInvitationCancelInput {
    #[serde(default)]
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus) -> HouseholdInvitation {
        let now = Utc::now();
        HouseholdInvitation {
            id: "inv1".to_string(),
            destination_household: HouseholdId::from("h1"),
            from_user: UserId::from("u1"),
            to_user: None,
            to_email: "Bob@Example.com".to_string(),
            to_name: String::new(),
            note: String::new(),
            status_note: String::new(),
            token: "t".to_string(),
            status,
            expires_at: now + Duration::hours(1),
            responded_at: None,
            timestamps: Timestamps::created(now),
        }
    }

    #[test]
    fn pending_invitations_occupy_the_open_slot() {
        let index = invitation(InvitationStatus::Pending).index();
        assert_eq!(index.unique_key.as_deref(), Some("h1:bob@example.com"));
        assert_eq!(index.right_id.as_deref(), Some("bob@example.com"));
        assert!(index.due_at.is_some());

        let index = invitation(InvitationStatus::Accepted).index();
        assert_eq!(index.unique_key, None);
        assert_eq!(index.left_id, None);
        assert_eq!(index.due_at, None);
    }

    #[test]
    fn email_match_is_case_insensitive() {
        let invitation = invitation(InvitationStatus::Pending);
        assert!(invitation.is_addressed_to(" bob@example.COM"));
        assert!(!invitation.is_addressed_to("rob@example.com"));
    }

    #[test]
    fn lapses_only_while_pending() {
        let mut invitation = invitation(InvitationStatus::Pending);
        let later = invitation.expires_at + Duration::seconds(1);
        assert!(invitation.has_lapsed(later));
        invitation.resolve(InvitationStatus::Rejected, "no".to_string(), later);
        assert!(!invitation.has_lapsed(later));
        assert_eq!(invitation.responded_at, Some(later));
    }
}
