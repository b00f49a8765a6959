//! Recipe ratings: one per (recipe, user).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{patch_field, CreateContext, Creatable, Patchable, Resource, Scope};
use crate::storage::{Document, RecordIndex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRating {
    pub id: String,
    #[serde(rename = "recipeID")]
    pub recipe_id: String,
    pub belongs_to_household: HouseholdId,
    pub by_user: UserId,
    pub taste: f32,
    pub difficulty: f32,
    pub cleanup: f32,
    pub instructions: f32,
    pub overall: f32,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for RecipeRating {
    const KIND: &'static str = "recipeRating";

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
            user_id: Some(self.by_user.to_string()),
            parent_id: Some(self.recipe_id.clone()),
            unique_key: Some(format!("{}:{}", self.recipe_id, self.by_user)),
            ..Default::default()
        }
    }
}

impl Resource for RecipeRating {
    const NOUN: &'static str = "recipeRating";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }
}

impl RecipeRating {
    /// Household members read every rating; only the author changes one.
    pub fn check_author(&self, session: &SessionContext) -> Result<()> {
        if self.by_user != session.user_id {
            return Err(LarderError::forbidden("only the author may change a rating"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RecipeRatingCreationInput {
    #[validate(range(min = 0.0, max = 5.0, message = "taste must be within [0, 5]"))]
    pub taste: f32,
    #[validate(range(min = 0.0, max = 5.0, message = "difficulty must be within [0, 5]"))]
    pub difficulty: f32,
    #[validate(range(min = 0.0, max = 5.0, message = "cleanup must be within [0, 5]"))]
    pub cleanup: f32,
    #[validate(range(min = 0.0, max = 5.0, message = "instructions must be within [0, 5]"))]
    pub instructions: f32,
    #[validate(range(min = 0.0, max = 5.0, message = "overall must be within [0, 5]"))]
    pub overall: f32,
    pub notes: String,
}

impl Creatable for RecipeRating {
    type Input = RecipeRatingCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        Ok(Self {
            id: ctx.id.clone(),
            recipe_id: ctx
                .parent_id
                .clone()
                .ok_or_else(|| LarderError::internal("ratings need a parent recipe"))?,
            belongs_to_household: ctx
                .owner
                .household_id()
                .cloned()
                .ok_or_else(|| LarderError::internal("ratings must belong to a household"))?,
            by_user: ctx.session.user_id.clone(),
            taste: input.taste,
            difficulty: input.difficulty,
            cleanup: input.cleanup,
            instructions: input.instructions,
            overall: input.overall,
            notes: input.notes,
            timestamps: Timestamps::created(ctx.now),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeRatingUpdateInput {
    #[validate(range(min = 0.0, max = 5.0, message = "taste must be within [0, 5]"))]
    pub taste: Option<f32>,
    #[validate(range(min = 0.0, max = 5.0, message = "difficulty must be within [0, 5]"))]
    pub difficulty: Option<f32>,
    #[validate(range(min = 0.0, max = 5.0, message = "cleanup must be within [0, 5]"))]
    pub cleanup: Option<f32>,
    #[validate(range(min = 0.0, max = 5.0, message = "instructions must be within [0, 5]"))]
    pub instructions: Option<f32>,
    #[validate(range(min = 0.0, max = 5.0, message = "overall must be within [0, 5]"))]
    pub overall: Option<f32>,
    pub notes: Option<String>,
}

impl Patchable for RecipeRating {
    type Patch = RecipeRatingUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, session: &SessionContext) -> Result<()> {
        self.check_author(session)?;
        patch_field(&mut self.taste, patch.taste);
        patch_field(&mut self.difficulty, patch.difficulty);
        patch_field(&mut self.cleanup, patch.cleanup);
        patch_field(&mut self.instructions, patch.instructions);
        patch_field(&mut self.overall, patch.overall);
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use crate::errors::ErrorCode;
    use chrono::Utc;

    #[test]
    fn scores_are_range_checked() {
        let input = RecipeRatingCreationInput { taste: 6.0, ..Default::default() };
        assert!(input.validate().is_err());
        let patch = RecipeRatingUpdateInput { overall: Some(-1.0), ..Default::default() };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn only_the_author_patches() {
        let author = session("u1", "h1", HouseholdRole::HouseholdMember);
        let other = session("u2", "h1", HouseholdRole::HouseholdAdmin);
        let ctx = CreateContext {
            id: "rt1".to_string(),
            owner: Owner::Household(HouseholdId::from("h1")),
            parent_id: Some("r1".to_string()),
            now: Utc::now(),
            session: &author,
        };
        let mut rating = RecipeRating::from_input(RecipeRatingCreationInput { overall: 4.0, ..Default::default() }, &ctx).unwrap();
        assert_eq!(rating.index().unique_key.as_deref(), Some("r1:u1"));

        let err = rating
            .apply_patch(RecipeRatingUpdateInput { overall: Some(1.0), ..Default::default() }, &other)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        rating.apply_patch(RecipeRatingUpdateInput { overall: Some(5.0), ..Default::default() }, &author).unwrap();
        assert_eq!(rating.overall, 5.0);
    }
}
