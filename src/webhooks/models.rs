use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, patch_field, ChangeEvent, CreateContext, Creatable, Patchable, Resource, Scope};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    pub enum WebhookMethod {
        Post => "POST",
        Put => "PUT",
        Patch => "PATCH",
    }
}

/// A household's outbound endpoint for data-change events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: String,
    pub name: String,
    pub url: String,
    pub method: WebhookMethod,
    pub content_type: String,
    /// Event types delivered; empty delivers everything.
    pub events: Vec<String>,
    pub created_by_user: UserId,
    pub belongs_to_household: HouseholdId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for Webhook {
    const KIND: &'static str = "webhook";

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
            user_id: Some(self.created_by_user.to_string()),
            search_key: Some(name_key(&self.name)),
            ..Default::default()
        }
    }
}

impl Resource for Webhook {
    const NOUN: &'static str = "webhook";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }
}

impl Webhook {
    pub fn should_receive(&self, event: &ChangeEvent) -> bool {
        if event.household_id.as_ref() != Some(&self.belongs_to_household) {
            return false;
        }
        self.events.is_empty() || self.events.iter().any(|wanted| wanted == &event.event_type)
    }
}

fn validate_endpoint(value: &str) -> std::result::Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(ValidationError::new("url").with_message("url must be an absolute http(s) URL".into())),
    }
}

fn default_content_type() -> String {
    "application/json".to_string()
}

fn default_method() -> WebhookMethod {
    WebhookMethod::Post
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCreationInput {
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    pub name: String,
    #[validate(custom(function = "validate_endpoint"))]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: WebhookMethod,
    #[serde(default = "default_content_type")]
    #[validate(length(min = 1, message = "contentType cannot be empty"))]
    pub content_type: String,
    #[serde(default)]
    pub events: Vec<String>,
}

impl Creatable for Webhook {
    type Input = WebhookCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            name: input.name.trim().to_string(),
            url: input.url,
            method: input.method,
            content_type: input.content_type,
            events: input.events,
            created_by_user: ctx.session.user_id.clone(),
            belongs_to_household: ctx
                .owner
                .household_id()
                .cloned()
                .ok_or_else(|| LarderError::internal("webhooks must belong to a household"))?,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUpdateInput {
    #[validate(length(min = 1, max = 128, message = "name cannot be empty"))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_endpoint"))]
    pub url: Option<String>,
    pub method: Option<WebhookMethod>,
    #[validate(length(min = 1, message = "contentType cannot be empty"))]
    pub content_type: Option<String>,
    pub events: Option<Vec<String>>,
}

impl Patchable for Webhook {
    type Patch = WebhookUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.url, patch.url);
        patch_field(&mut self.method, patch.method);
        patch_field(&mut self.content_type, patch.content_type);
        patch_field(&mut self.events, patch.events);
        Ok(())
    }
}
