//! User accounts and their request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::{Reputation, ServiceRole};
use crate::domain::{HouseholdId, Timestamps, UserId};
use crate::kernel::{Resource, Scope};
use crate::storage::{Document, RecordIndex};

/// Stored representation of a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email_address: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub hashed_password: String,
    pub two_factor_secret: String,
    /// Replacement secret awaiting confirmation.
    #[serde(default)]
    pub pending_two_factor_secret: Option<String>,
    #[serde(default)]
    pub two_factor_secret_verified_at: Option<DateTime<Utc>>,
    pub service_role: ServiceRole,
    pub reputation: Reputation,
    #[serde(default)]
    pub reputation_explanation: String,
    #[serde(default)]
    pub password_last_changed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl User {
    pub fn two_factor_verified(&self) -> bool {
        self.two_factor_secret_verified_at.is_some()
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

impl Document for User {
    const KIND: &'static str = "user";

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
            user_id: Some(self.id.to_string()),
            search_key: Some(self.username.to_lowercase()),
            unique_key: Some(self.username.clone()),
            secondary_key: Some(Self::normalize_email(&self.email_address)),
            ..Default::default()
        }
    }
}

impl Resource for User {
    const NOUN: &'static str = "user";
    const SCOPE: Scope = Scope::User;

    fn owner(&self) -> Owner {
        Owner::User(self.id.clone())
    }
}

/// Public view of a user; never carries credential material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub email_address: String,
    pub first_name: String,
    pub last_name: String,
    pub service_role: ServiceRole,
    pub account_status: Reputation,
    pub account_status_explanation: String,
    pub two_factor_secret_verified_at: Option<DateTime<Utc>>,
    pub password_last_changed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email_address: user.email_address.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            service_role: user.service_role,
            account_status: user.reputation,
            account_status_explanation: user.reputation_explanation.clone(),
            two_factor_secret_verified_at: user.two_factor_secret_verified_at,
            password_last_changed_at: user.password_last_changed_at,
            timestamps: user.timestamps.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistrationInput {
    #[validate(email(message = "emailAddress must be a valid email address"))]
    pub email_address: String,
    #[validate(length(min = 1, max = 128, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 5, max = 256, message = "password is too short"))]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, rename = "invitationID")]
    pub invitation_id: Option<String>,
    #[serde(default)]
    pub invitation_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreationResponse {
    #[serde(rename = "createdUserID")]
    pub created_user_id: UserId,
    pub username: String,
    pub email_address: String,
    pub account_status: Reputation,
    pub two_factor_secret: String,
    /// `otpauth://` provisioning URI for authenticator apps.
    pub two_factor_uri: String,
    #[serde(rename = "householdID")]
    pub household_id: HouseholdId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TotpSecretVerificationInput {
    #[serde(rename = "userID")]
    #[validate(length(min = 1, message = "userID is required"))]
    pub user_id: String,
    #[validate(length(equal = 6, message = "totpToken must be six digits"))]
    pub totp_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TotpSecretRefreshInput {
    #[validate(length(min = 1, message = "currentPassword is required"))]
    pub current_password: String,
    #[validate(length(equal = 6, message = "totpToken must be six digits"))]
    pub totp_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotpSecretRefreshResponse {
    pub two_factor_secret: String,
    pub two_factor_uri: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateInput {
    #[validate(length(min = 1, message = "currentPassword is required"))]
    pub current_password: String,
    #[validate(length(min = 5, max = 256, message = "newPassword is too short"))]
    pub new_password: String,
    #[validate(length(equal = 6, message = "totpToken must be six digits"))]
    pub totp_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[serde(default)]
    pub totp_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserReputationUpdateInput {
    #[serde(rename = "targetUserID")]
    #[validate(length(min = 1, message = "targetUserID is required"))]
    pub target_user_id: String,
    pub new_status: Reputation,
    #[serde(default)]
    pub reason: String,
}

/// `otpauth://` URI for a TOTP secret.
pub fn provisioning_uri(issuer: &str, username: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{}?secret={secret}&issuer={issuer}",
        url::form_urlencoded::byte_serialize(username.as_bytes()).collect::<String>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: UserId::from("u1"),
            username: "Alice".to_string(),
            email_address: " Alice@Example.com ".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            hashed_password: "$argon2id$secret".to_string(),
            two_factor_secret: "GEZDGNBV".to_string(),
            pending_two_factor_secret: None,
            two_factor_secret_verified_at: None,
            service_role: ServiceRole::ServiceUser,
            reputation: Reputation::Good,
            reputation_explanation: String::new(),
            password_last_changed_at: None,
            timestamps: Timestamps::created(Utc::now()),
        }
    }

    #[test]
    fn index_keeps_username_case_and_folds_email() {
        let index = user().index();
        assert_eq!(index.unique_key.as_deref(), Some("Alice"));
        assert_eq!(index.secondary_key.as_deref(), Some("alice@example.com"));
        assert_eq!(index.search_key.as_deref(), Some("alice"));
    }

    #[test]
    fn view_hides_credentials() {
        let json = serde_json::to_value(user().view()).unwrap();
        assert!(json.get("hashedPassword").is_none());
        assert!(json.get("twoFactorSecret").is_none());
        assert_eq!(json["accountStatus"], "good");
    }

    #[test]
    fn registration_accepts_short_strong_passwords() {
        let input = UserRegistrationInput {
            email_address: "a@b.c".to_string(),
            username: "alice".to_string(),
            password: "p0!aB".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            invitation_id: None,
            invitation_token: None,
        };
        assert!(input.validate().is_ok());

        let short = UserRegistrationInput { password: "p0!a".to_string(), ..input };
        assert!(short.validate().is_err());
    }

    #[test]
    fn provisioning_uri_escapes_username() {
        let uri = provisioning_uri("larder", "a b", "ABC");
        assert_eq!(uri, "otpauth://totp/larder:a+b?secret=ABC&issuer=larder");
    }
}
