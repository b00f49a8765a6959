//! Meals: named bundles of recipes that meal plan options point at.

use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use super::models::Recipe;
use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{HouseholdId, Page, PageQuery, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, patch_field, CreateContext, Creatable, Kernel, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    pub enum MealComponentType {
        AmuseBouche => "amuse-bouche",
        Appetizer => "appetizer",
        Soup => "soup",
        Main => "main",
        Salad => "salad",
        Beverage => "beverage",
        Side => "side",
        Dessert => "dessert",
        Unspecified => "unspecified",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealComponent {
    #[serde(rename = "recipeID")]
    pub recipe_id: String,
    pub component_type: MealComponentType,
    /// Multiplier applied to the recipe's quantities.
    pub recipe_scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub name: String,
    pub description: String,
    pub minimum_estimated_portions: f32,
    pub maximum_estimated_portions: Option<f32>,
    pub eligible_for_meal_plans: bool,
    pub created_by_user: UserId,
    pub belongs_to_household: HouseholdId,
    pub components: Vec<MealComponent>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for Meal {
    const KIND: &'static str = "meal";

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

impl Resource for Meal {
    const NOUN: &'static str = "meal";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }

    fn references(&self) -> Vec<Reference> {
        self.components
            .iter()
            .map(|component| Reference::to::<Recipe>(component.recipe_id.clone(), "recipeID"))
            .collect()
    }
}

impl Meal {
    fn check(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(LarderError::validation_field("a meal needs at least one component", "components"));
        }
        if self.components.iter().any(|c| !(c.recipe_scale.is_finite() && c.recipe_scale > 0.0)) {
            return Err(LarderError::validation_field("recipeScale must be positive", "recipeScale"));
        }
        if self.maximum_estimated_portions.is_some_and(|max| max < self.minimum_estimated_portions) {
            return Err(LarderError::validation_field(
                "maximumEstimatedPortions is below the minimum",
                "maximumEstimatedPortions",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealComponentInput {
    #[serde(rename = "recipeID")]
    #[validate(length(min = 1, message = "recipeID is required"))]
    pub recipe_id: String,
    #[serde(default = "unspecified")]
    pub component_type: MealComponentType,
    #[serde(default = "unit_scale")]
    pub recipe_scale: f64,
}

fn unspecified() -> MealComponentType {
    MealComponentType::Unspecified
}

fn unit_scale() -> f64 {
    1.0
}

impl From<MealComponentInput> for MealComponent {
    fn from(input: MealComponentInput) -> Self {
        Self { recipe_id: input.recipe_id, component_type: input.component_type, recipe_scale: input.recipe_scale }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "one_portion")]
    pub minimum_estimated_portions: f32,
    #[serde(default)]
    pub maximum_estimated_portions: Option<f32>,
    #[serde(default = "default_true")]
    pub eligible_for_meal_plans: bool,
    #[validate(nested)]
    pub components: Vec<MealComponentInput>,
}

fn one_portion() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Creatable for Meal {
    type Input = MealCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let meal = Self {
            id: ctx.id.clone(),
            name: input.name.trim().to_string(),
            description: input.description,
            minimum_estimated_portions: input.minimum_estimated_portions,
            maximum_estimated_portions: input.maximum_estimated_portions,
            eligible_for_meal_plans: input.eligible_for_meal_plans,
            created_by_user: ctx.session.user_id.clone(),
            belongs_to_household: ctx
                .owner
                .household_id()
                .cloned()
                .ok_or_else(|| LarderError::internal("meals must belong to a household"))?,
            components: input.components.into_iter().map(Into::into).collect(),
            timestamps: Timestamps::created(ctx.now),
        };
        meal.check()?;
        Ok(meal)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub minimum_estimated_portions: Option<f32>,
    pub maximum_estimated_portions: Option<f32>,
    pub eligible_for_meal_plans: Option<bool>,
    #[validate(nested)]
    pub components: Option<Vec<MealComponentInput>>,
}

impl Patchable for Meal {
    type Patch = MealUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.minimum_estimated_portions, patch.minimum_estimated_portions);
        if patch.maximum_estimated_portions.is_some() {
            self.maximum_estimated_portions = patch.maximum_estimated_portions;
        }
        patch_field(&mut self.eligible_for_meal_plans, patch.eligible_for_meal_plans);
        if let Some(components) = patch.components {
            self.components = components.into_iter().map(Into::into).collect();
        }
        self.check()
    }
}

#[derive(Debug, Clone)]
pub struct MealService {
    kernel: Kernel,
}

impl MealService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: MealCreationInput) -> Result<Meal> {
        self.kernel.create::<Meal>(session, input).await
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<Meal> {
        self.kernel.get(session, id).await
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<Meal>> {
        self.kernel.list(session, query).await
    }

    pub async fn search(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<Meal>> {
        self.kernel.search(session, query, limit).await
    }

    pub async fn update(&self, session: &SessionContext, id: &str, patch: MealUpdateInput) -> Result<Meal> {
        self.kernel.update::<Meal>(session, id, patch).await
    }

    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<Meal> {
        self.kernel.archive::<Meal>(session, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_default_and_are_checked() {
        let input: MealCreationInput = serde_json::from_value(serde_json::json!({
            "name": "Taco night",
            "components": [{ "recipeID": "r1" }, { "recipeID": "r2", "componentType": "side", "recipeScale": 0.5 }]
        }))
        .unwrap();
        assert_eq!(input.components[0].component_type, MealComponentType::Unspecified);
        assert_eq!(input.components[0].recipe_scale, 1.0);
        assert_eq!(input.components[1].component_type, MealComponentType::Side);

        let empty: MealCreationInput =
            serde_json::from_value(serde_json::json!({ "name": "Nothing", "components": [] })).unwrap();
        let member = crate::auth::models::fixtures::session("u1", "h1", crate::auth::models::HouseholdRole::HouseholdMember);
        let ctx = CreateContext {
            id: "m1".to_string(),
            owner: Owner::Household(HouseholdId::from("h1")),
            parent_id: None,
            now: chrono::Utc::now(),
            session: &member,
        };
        assert!(Meal::from_input(empty, &ctx).is_err());

        let meal = Meal::from_input(input, &ctx).unwrap();
        assert_eq!(meal.references().len(), 2);
    }
}
