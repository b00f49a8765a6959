use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::catalog::ValidIngredient;
use crate::domain::{Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{patch_field, CreateContext, Creatable, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

/// How much a user likes an ingredient, and whether they are allergic to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreference {
    pub id: String,
    #[serde(rename = "ingredientID")]
    pub ingredient_id: String,
    /// -10 (never) through 10 (always).
    pub rating: i8,
    pub allergy: bool,
    pub notes: String,
    pub belongs_to_user: UserId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for UserIngredientPreference {
    const KIND: &'static str = "userIngredientPreference";

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
            user_id: Some(self.belongs_to_user.to_string()),
            right_id: Some(self.ingredient_id.clone()),
            unique_key: Some(format!("{}:{}", self.belongs_to_user, self.ingredient_id)),
            ..Default::default()
        }
    }
}

impl Resource for UserIngredientPreference {
    const NOUN: &'static str = "userIngredientPreference";
    const SCOPE: Scope = Scope::User;

    fn owner(&self) -> Owner {
        Owner::User(self.belongs_to_user.clone())
    }

    fn references(&self) -> Vec<Reference> {
        vec![Reference::to::<ValidIngredient>(self.ingredient_id.clone(), "ingredientID")]
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreferenceCreationInput {
    #[serde(rename = "ingredientID")]
    #[validate(length(min = 1, message = "ingredientID is required"))]
    pub ingredient_id: String,
    #[serde(default)]
    #[validate(range(min = -10, max = 10, message = "rating must be between -10 and 10"))]
    pub rating: i8,
    #[serde(default)]
    pub allergy: bool,
    #[serde(default)]
    pub notes: String,
}

impl Creatable for UserIngredientPreference {
    type Input = UserIngredientPreferenceCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            ingredient_id: input.ingredient_id,
            rating: input.rating,
            allergy: input.allergy,
            notes: input.notes,
            belongs_to_user: ctx
                .owner
                .user_id()
                .cloned()
                .ok_or_else(|| LarderError::internal("ingredient preferences must belong to a user"))?,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

/// The ingredient is fixed; archive and recreate to change it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserIngredientPreferenceUpdateInput {
    #[validate(range(min = -10, max = 10, message = "rating must be between -10 and 10"))]
    pub rating: Option<i8>,
    pub allergy: Option<bool>,
    pub notes: Option<String>,
}

impl Patchable for UserIngredientPreference {
    type Patch = UserIngredientPreferenceUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.rating, patch.rating);
        patch_field(&mut self.allergy, patch.allergy);
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn ratings_are_bounded() {
        let input = |rating: i64| {
            serde_json::from_value::<UserIngredientPreferenceCreationInput>(
                serde_json::json!({ "ingredientID": "i1", "rating": rating }),
            )
            .unwrap()
        };
        assert!(input(10).validate().is_ok());
        assert!(input(-10).validate().is_ok());
        assert!(input(11).validate().is_err());
    }

    #[test]
    fn one_preference_per_user_and_ingredient() {
        let preference = UserIngredientPreference {
            id: "p1".into(),
            ingredient_id: "i1".into(),
            rating: 3,
            allergy: true,
            notes: String::new(),
            belongs_to_user: UserId::from("u1"),
            timestamps: Timestamps::created(Utc::now()),
        };
        assert_eq!(preference.index().unique_key.as_deref(), Some("u1:i1"));
        assert_eq!(preference.references()[0].field, "ingredientID");
    }
}
