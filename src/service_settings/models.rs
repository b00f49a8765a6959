use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, patch_field, CreateContext, Creatable, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    /// Who a setting is configured for.
    pub enum SettingType {
        User => "user",
        Household => "household",
    }
}

/// An admin-defined setting users or households may configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSetting {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    /// Allowed values; empty means free-form.
    pub enumeration: Vec<String>,
    pub default_value: Option<String>,
    /// Household settings only household admins may configure; user settings
    /// only service admins may configure.
    pub admins_only: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for ServiceSetting {
    const KIND: &'static str = "serviceSetting";

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
            search_key: Some(name_key(&self.name)),
            unique_key: Some(name_key(&self.name)),
            ..Default::default()
        }
    }
}

impl Resource for ServiceSetting {
    const NOUN: &'static str = "serviceSetting";
    const SCOPE: Scope = Scope::Global;

    fn owner(&self) -> Owner {
        Owner::System
    }
}

impl ServiceSetting {
    fn check(&self) -> Result<()> {
        if let Some(default) = &self.default_value {
            self.check_value(default).map_err(|_| {
                LarderError::validation_field("defaultValue must be one of the enumeration", "defaultValue")
            })?;
        }
        Ok(())
    }

    pub fn check_value(&self, value: &str) -> Result<()> {
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|allowed| allowed == value) {
            return Err(LarderError::validation_field(
                format!("'{value}' is not a valid value for setting '{}'", self.name),
                "value",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingCreationInput {
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    #[serde(default)]
    pub enumeration: Vec<String>,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub admins_only: bool,
}

impl Creatable for ServiceSetting {
    type Input = ServiceSettingCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let setting = Self {
            id: ctx.id.clone(),
            name: input.name.trim().to_string(),
            description: input.description,
            setting_type: input.setting_type,
            enumeration: input.enumeration,
            default_value: input.default_value,
            admins_only: input.admins_only,
            timestamps: Timestamps::created(ctx.now),
        };
        setting.check()?;
        Ok(setting)
    }
}

/// The type of a setting is fixed once created.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingUpdateInput {
    #[validate(length(min = 1, max = 128, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub enumeration: Option<Vec<String>>,
    pub default_value: Option<String>,
    pub admins_only: Option<bool>,
}

impl Patchable for ServiceSetting {
    type Patch = ServiceSettingUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.enumeration, patch.enumeration);
        if patch.default_value.is_some() {
            self.default_value = patch.default_value;
        }
        patch_field(&mut self.admins_only, patch.admins_only);
        self.check()
    }
}

/// A user's or household's chosen value for a setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfiguration {
    pub id: String,
    #[serde(rename = "serviceSettingID")]
    pub service_setting_id: String,
    pub value: String,
    pub notes: String,
    pub belongs_to_user: Option<UserId>,
    pub belongs_to_household: Option<HouseholdId>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for ServiceSettingConfiguration {
    const KIND: &'static str = "serviceSettingConfiguration";

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
        let scope = match (&self.belongs_to_household, &self.belongs_to_user) {
            (Some(household), _) => format!("household:{household}"),
            (None, Some(user)) => format!("user:{user}"),
            (None, None) => String::new(),
        };
        RecordIndex {
            household_id: self.belongs_to_household.as_ref().map(ToString::to_string),
            user_id: self.belongs_to_user.as_ref().map(ToString::to_string),
            parent_id: Some(self.service_setting_id.clone()),
            unique_key: Some(format!("{}:{scope}", self.service_setting_id)),
            ..Default::default()
        }
    }
}

impl Resource for ServiceSettingConfiguration {
    const NOUN: &'static str = "serviceSettingConfiguration";
    const SCOPE: Scope = Scope::User;

    fn owner(&self) -> Owner {
        match (&self.belongs_to_household, &self.belongs_to_user) {
            (Some(household), _) => Owner::Household(household.clone()),
            (None, Some(user)) => Owner::User(user.clone()),
            (None, None) => Owner::System,
        }
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to::<ServiceSetting>(self.service_setting_id.clone(), "serviceSettingID")]
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfigurationCreationInput {
    #[serde(rename = "serviceSettingID")]
    #[validate(length(min = 1, message = "serviceSettingID is required"))]
    pub service_setting_id: String,
    #[validate(length(min = 1, message = "value is required"))]
    pub value: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSettingConfigurationUpdateInput {
    #[validate(length(min = 1, message = "value cannot be empty"))]
    pub value: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setting(enumeration: &[&str], default: Option<&str>) -> ServiceSetting {
        ServiceSetting {
            id: "s1".into(),
            name: "Preferred Units".into(),
            description: String::new(),
            setting_type: SettingType::User,
            enumeration: enumeration.iter().map(|s| s.to_string()).collect(),
            default_value: default.map(Into::into),
            admins_only: false,
            timestamps: Timestamps::created(Utc::now()),
        }
    }

    #[test]
    fn values_must_come_from_the_enumeration() {
        let units = setting(&["metric", "imperial"], Some("metric"));
        assert!(units.check().is_ok());
        assert!(units.check_value("imperial").is_ok());
        assert!(units.check_value("cubits").is_err());

        assert!(setting(&["metric"], Some("imperial")).check().is_err());
        assert!(setting(&[], None).check_value("anything").is_ok());
    }

    #[test]
    fn configurations_are_unique_per_setting_and_scope() {
        let config = ServiceSettingConfiguration {
            id: "c1".into(),
            service_setting_id: "s1".into(),
            value: "metric".into(),
            notes: String::new(),
            belongs_to_user: None,
            belongs_to_household: Some(HouseholdId::from("h1")),
            timestamps: Timestamps::created(Utc::now()),
        };
        assert_eq!(config.index().unique_key.as_deref(), Some("s1:household:h1"));
        assert_eq!(config.owner(), Owner::Household(HouseholdId::from("h1")));
    }
}
