use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{new_record_id, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{Patchable, Resource, Scope};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    pub enum NotificationStatus {
        Unread => "unread",
        Read => "read",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub id: String,
    pub belongs_to_user: UserId,
    pub content: String,
    pub status: NotificationStatus,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl UserNotification {
    pub fn new(user_id: UserId, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_user: user_id,
            content: content.into(),
            status: NotificationStatus::Unread,
            timestamps: Timestamps::created(now),
        }
    }
}

impl Document for UserNotification {
    const KIND: &'static str = "userNotification";

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
        RecordIndex { user_id: Some(self.belongs_to_user.to_string()), ..Default::default() }
    }
}

impl Resource for UserNotification {
    const NOUN: &'static str = "userNotification";
    const SCOPE: Scope = Scope::User;

    fn owner(&self) -> Owner {
        Owner::User(self.belongs_to_user.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserNotificationUpdateInput {
    pub status: Option<NotificationStatus>,
}

impl Patchable for UserNotification {
    type Patch = UserNotificationUpdateInput;

    /// `unread -> read` happens exactly once.
    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        match (self.status, patch.status) {
            (_, None) => Ok(()),
            (NotificationStatus::Unread, Some(NotificationStatus::Read)) => {
                self.status = NotificationStatus::Read;
                Ok(())
            }
            (NotificationStatus::Read, Some(NotificationStatus::Read)) => {
                Err(LarderError::conflict("notification is already read", Self::KIND))
            }
            (_, Some(NotificationStatus::Unread)) => {
                Err(LarderError::validation_field("notifications cannot be marked unread", "status"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use crate::errors::ErrorCode;

    #[test]
    fn read_transition_happens_once() {
        let owner = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mut notification = UserNotification::new(UserId::from("u1"), "hello", Utc::now());
        let read = || UserNotificationUpdateInput { status: Some(NotificationStatus::Read) };

        notification.apply_patch(read(), &owner).unwrap();
        assert_eq!(notification.status, NotificationStatus::Read);

        let err = notification.apply_patch(read(), &owner).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);

        let err = notification
            .apply_patch(UserNotificationUpdateInput { status: Some(NotificationStatus::Unread) }, &owner)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }
}
