//! Recipes and their ordered steps.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::catalog::{slugify, ValidIngredient, ValidIngredientState, ValidInstrument, ValidMeasurementUnit, ValidPreparation};
use crate::domain::{new_record_id, HouseholdId, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{name_key, patch_field, CreateContext, Creatable, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

use super::prep_tasks::RecipePrepTask;

fn household_of(owner: &Owner, kind: &str) -> Result<HouseholdId> {
    owner
        .household_id()
        .cloned()
        .ok_or_else(|| LarderError::internal(format!("{kind} must belong to a household")))
}

fn check_band(min: f64, max: Option<f64>, field: &'static str) -> Result<()> {
    if min < 0.0 {
        return Err(LarderError::validation_field(format!("{field} cannot be negative"), field));
    }
    if max.is_some_and(|max| max < min) {
        return Err(LarderError::validation_field(format!("{field} exceeds its maximum"), field));
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Recipe
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub source: String,
    pub description: String,
    #[serde(rename = "inspiredByRecipeID")]
    pub inspired_by_recipe_id: Option<String>,
    pub minimum_estimated_portions: f32,
    pub maximum_estimated_portions: Option<f32>,
    pub portion_name: String,
    pub plural_portion_name: String,
    pub seal_of_approval: bool,
    pub eligible_for_meals: bool,
    pub created_by_user: UserId,
    pub belongs_to_household: HouseholdId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for Recipe {
    const KIND: &'static str = "recipe";

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

impl Resource for Recipe {
    const NOUN: &'static str = "recipe";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }

    fn references(&self) -> Vec<Reference> {
        Reference::optional::<Recipe>(self.inspired_by_recipe_id.as_ref(), "inspiredByRecipeID")
            .into_iter()
            .collect()
    }
}

impl Recipe {
    fn check_portions(&self) -> Result<()> {
        if self.minimum_estimated_portions <= 0.0 {
            return Err(LarderError::validation_field(
                "minimumEstimatedPortions must be positive",
                "minimumEstimatedPortions",
            ));
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
pub struct RecipeCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inspiredByRecipeID")]
    pub inspired_by_recipe_id: Option<String>,
    #[serde(default = "one_portion")]
    pub minimum_estimated_portions: f32,
    #[serde(default)]
    pub maximum_estimated_portions: Option<f32>,
    #[serde(default)]
    pub portion_name: String,
    #[serde(default)]
    pub plural_portion_name: String,
    #[serde(default)]
    pub seal_of_approval: bool,
    #[serde(default = "default_true")]
    pub eligible_for_meals: bool,
}

fn one_portion() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Creatable for Recipe {
    type Input = RecipeCreationInput;

    fn from_input(input: Self::Input, ctx: &CreateContext<'_>) -> Result<Self> {
        let slug = input
            .slug
            .map(|slug| slug.trim().to_lowercase())
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| slugify(&input.name));
        let recipe = Self {
            id: ctx.id.clone(),
            name: input.name.trim().to_string(),
            slug,
            source: input.source,
            description: input.description,
            inspired_by_recipe_id: input.inspired_by_recipe_id.filter(|id| !id.is_empty()),
            minimum_estimated_portions: input.minimum_estimated_portions,
            maximum_estimated_portions: input.maximum_estimated_portions,
            portion_name: input.portion_name,
            plural_portion_name: input.plural_portion_name,
            seal_of_approval: input.seal_of_approval,
            eligible_for_meals: input.eligible_for_meals,
            created_by_user: ctx.session.user_id.clone(),
            belongs_to_household: household_of(&ctx.owner, Self::KIND)?,
            timestamps: Timestamps::created(ctx.now),
        };
        recipe.check_portions()?;
        Ok(recipe)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub slug: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "inspiredByRecipeID")]
    pub inspired_by_recipe_id: Option<String>,
    pub minimum_estimated_portions: Option<f32>,
    pub maximum_estimated_portions: Option<f32>,
    pub portion_name: Option<String>,
    pub plural_portion_name: Option<String>,
    pub seal_of_approval: Option<bool>,
    pub eligible_for_meals: Option<bool>,
}

impl Patchable for Recipe {
    type Patch = RecipeUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        if let Some(slug) = patch.slug {
            let slug = slug.trim().to_lowercase();
            if slug.is_empty() {
                return Err(LarderError::validation_field("slug cannot be empty", "slug"));
            }
            self.slug = slug;
        }
        patch_field(&mut self.source, patch.source);
        patch_field(&mut self.description, patch.description);
        if let Some(inspired_by) = patch.inspired_by_recipe_id {
            if inspired_by == self.id {
                return Err(LarderError::validation_field("a recipe cannot be inspired by itself", "inspiredByRecipeID"));
            }
            self.inspired_by_recipe_id = Some(inspired_by).filter(|id| !id.is_empty());
        }
        patch_field(&mut self.minimum_estimated_portions, patch.minimum_estimated_portions);
        if patch.maximum_estimated_portions.is_some() {
            self.maximum_estimated_portions = patch.maximum_estimated_portions;
        }
        patch_field(&mut self.portion_name, patch.portion_name);
        patch_field(&mut self.plural_portion_name, patch.plural_portion_name);
        patch_field(&mut self.seal_of_approval, patch.seal_of_approval);
        patch_field(&mut self.eligible_for_meals, patch.eligible_for_meals);
        self.check_portions()
    }
}

/// A recipe with its ordered steps and prep tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeView {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub steps: Vec<RecipeStep>,
    pub prep_tasks: Vec<RecipePrepTask>,
}

// -------------------------------------------------------------------------
// Steps
// -------------------------------------------------------------------------

/// An ingredient consumed by a step: either catalog data or the product of an
/// earlier step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepIngredient {
    pub id: String,
    pub name: String,
    #[serde(rename = "ingredientID")]
    pub ingredient_id: Option<String>,
    #[serde(rename = "measurementUnitID")]
    pub measurement_unit_id: String,
    #[serde(rename = "recipeStepProductID")]
    pub recipe_step_product_id: Option<String>,
    pub minimum_quantity: f64,
    pub maximum_quantity: Option<f64>,
    pub quantity_notes: String,
    pub ingredient_notes: String,
    pub optional: bool,
}

crate::string_enum! {
    pub enum RecipeStepProductType {
        Ingredient => "ingredient",
        Instrument => "instrument",
        Vessel => "vessel",
    }
}

/// Something a step yields, addressable by later steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepProduct {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: RecipeStepProductType,
    #[serde(rename = "measurementUnitID")]
    pub measurement_unit_id: Option<String>,
    pub minimum_quantity: Option<f64>,
    pub maximum_quantity: Option<f64>,
    pub quantity_notes: String,
    pub compostable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepInstrument {
    pub id: String,
    pub name: String,
    #[serde(rename = "instrumentID")]
    pub instrument_id: Option<String>,
    pub notes: String,
    pub preference_rank: u8,
    pub optional: bool,
    pub minimum_quantity: u32,
    pub maximum_quantity: Option<u32>,
}

/// "Until the onions are translucent": an ingredient state the step waits for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepCompletionCondition {
    pub id: String,
    #[serde(rename = "ingredientStateID")]
    pub ingredient_state_id: String,
    /// Ids of this step's ingredients the condition observes.
    #[serde(rename = "ingredientIDs")]
    pub ingredient_ids: Vec<String>,
    pub notes: String,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStep {
    pub id: String,
    pub belongs_to_recipe: String,
    pub belongs_to_household: HouseholdId,
    /// Position within the recipe; steps form `0..n` without gaps.
    pub index: u32,
    #[serde(rename = "preparationID")]
    pub preparation_id: String,
    pub notes: String,
    pub explicit_instructions: String,
    pub minimum_estimated_time_in_seconds: Option<u32>,
    pub maximum_estimated_time_in_seconds: Option<u32>,
    pub minimum_temperature_in_celsius: Option<f32>,
    pub maximum_temperature_in_celsius: Option<f32>,
    pub optional: bool,
    pub start_timer_automatically: bool,
    pub ingredients: Vec<RecipeStepIngredient>,
    pub products: Vec<RecipeStepProduct>,
    pub instruments: Vec<RecipeStepInstrument>,
    pub completion_conditions: Vec<RecipeStepCompletionCondition>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for RecipeStep {
    const KIND: &'static str = "recipeStep";

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
            parent_id: Some(self.belongs_to_recipe.clone()),
            ..Default::default()
        }
    }
}

impl Resource for RecipeStep {
    const NOUN: &'static str = "recipeStep";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }

    fn references(&self) -> Vec<Reference> {
        let mut references = vec![Reference::to::<ValidPreparation>(self.preparation_id.clone(), "preparationID")];
        for ingredient in &self.ingredients {
            references.extend(Reference::optional::<ValidIngredient>(ingredient.ingredient_id.as_ref(), "ingredientID"));
            references.push(Reference::to::<ValidMeasurementUnit>(
                ingredient.measurement_unit_id.clone(),
                "measurementUnitID",
            ));
        }
        for product in &self.products {
            references.extend(Reference::optional::<ValidMeasurementUnit>(
                product.measurement_unit_id.as_ref(),
                "measurementUnitID",
            ));
        }
        for instrument in &self.instruments {
            references.extend(Reference::optional::<ValidInstrument>(instrument.instrument_id.as_ref(), "instrumentID"));
        }
        for condition in &self.completion_conditions {
            references.push(Reference::to::<ValidIngredientState>(
                condition.ingredient_state_id.clone(),
                "ingredientStateID",
            ));
        }
        references
    }
}

impl RecipeStep {
    /// Structural checks that do not need the store.
    pub fn check(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.minimum_estimated_time_in_seconds, self.maximum_estimated_time_in_seconds) {
            if max < min {
                return Err(LarderError::validation_field(
                    "maximumEstimatedTimeInSeconds is below the minimum",
                    "maximumEstimatedTimeInSeconds",
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.minimum_temperature_in_celsius, self.maximum_temperature_in_celsius) {
            if max < min {
                return Err(LarderError::validation_field(
                    "maximumTemperatureInCelsius is below the minimum",
                    "maximumTemperatureInCelsius",
                ));
            }
        }
        for ingredient in &self.ingredients {
            check_band(ingredient.minimum_quantity, ingredient.maximum_quantity, "minimumQuantity")?;
            if ingredient.ingredient_id.is_none() && ingredient.recipe_step_product_id.is_none() {
                return Err(LarderError::validation_field(
                    "an ingredient needs an ingredientID or a recipeStepProductID",
                    "ingredientID",
                ));
            }
        }
        let ingredient_ids: Vec<&str> = self.ingredients.iter().map(|i| i.id.as_str()).collect();
        for condition in &self.completion_conditions {
            if condition.ingredient_ids.iter().any(|id| !ingredient_ids.contains(&id.as_str())) {
                return Err(LarderError::validation_field(
                    "completion conditions may only observe this step's ingredients",
                    "ingredientIDs",
                ));
            }
        }
        Ok(())
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &str> {
        self.products.iter().map(|product| product.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepIngredientInput {
    /// Client-chosen id so completion conditions can point at it.
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "ingredient name is required"))]
    pub name: String,
    #[serde(default, rename = "ingredientID")]
    pub ingredient_id: Option<String>,
    #[serde(rename = "measurementUnitID")]
    pub measurement_unit_id: String,
    #[serde(default, rename = "recipeStepProductID")]
    pub recipe_step_product_id: Option<String>,
    pub minimum_quantity: f64,
    #[serde(default)]
    pub maximum_quantity: Option<f64>,
    #[serde(default)]
    pub quantity_notes: String,
    #[serde(default)]
    pub ingredient_notes: String,
    #[serde(default)]
    pub optional: bool,
}

impl From<RecipeStepIngredientInput> for RecipeStepIngredient {
    fn from(input: RecipeStepIngredientInput) -> Self {
        Self {
            id: input.id.filter(|id| !id.is_empty()).unwrap_or_else(new_record_id),
            name: input.name,
            ingredient_id: input.ingredient_id.filter(|id| !id.is_empty()),
            measurement_unit_id: input.measurement_unit_id,
            recipe_step_product_id: input.recipe_step_product_id.filter(|id| !id.is_empty()),
            minimum_quantity: input.minimum_quantity,
            maximum_quantity: input.maximum_quantity,
            quantity_notes: input.quantity_notes,
            ingredient_notes: input.ingredient_notes,
            optional: input.optional,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepProductInput {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(length(min = 1, message = "product name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: RecipeStepProductType,
    #[serde(default, rename = "measurementUnitID")]
    pub measurement_unit_id: Option<String>,
    #[serde(default)]
    pub minimum_quantity: Option<f64>,
    #[serde(default)]
    pub maximum_quantity: Option<f64>,
    #[serde(default)]
    pub quantity_notes: String,
    #[serde(default)]
    pub compostable: bool,
}

impl From<RecipeStepProductInput> for RecipeStepProduct {
    fn from(input: RecipeStepProductInput) -> Self {
        Self {
            id: input.id.filter(|id| !id.is_empty()).unwrap_or_else(new_record_id),
            name: input.name,
            product_type: input.product_type,
            measurement_unit_id: input.measurement_unit_id.filter(|id| !id.is_empty()),
            minimum_quantity: input.minimum_quantity,
            maximum_quantity: input.maximum_quantity,
            quantity_notes: input.quantity_notes,
            compostable: input.compostable,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepInstrumentInput {
    #[validate(length(min = 1, message = "instrument name is required"))]
    pub name: String,
    #[serde(default, rename = "instrumentID")]
    pub instrument_id: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub preference_rank: u8,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "one")]
    pub minimum_quantity: u32,
    #[serde(default)]
    pub maximum_quantity: Option<u32>,
}

fn one() -> u32 {
    1
}

impl From<RecipeStepInstrumentInput> for RecipeStepInstrument {
    fn from(input: RecipeStepInstrumentInput) -> Self {
        Self {
            id: new_record_id(),
            name: input.name,
            instrument_id: input.instrument_id.filter(|id| !id.is_empty()),
            notes: input.notes,
            preference_rank: input.preference_rank,
            optional: input.optional,
            minimum_quantity: input.minimum_quantity,
            maximum_quantity: input.maximum_quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepCompletionConditionInput {
    #[serde(rename = "ingredientStateID")]
    #[validate(length(min = 1, message = "ingredientStateID is required"))]
    pub ingredient_state_id: String,
    #[serde(default, rename = "ingredientIDs")]
    pub ingredient_ids: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub optional: bool,
}

impl From<RecipeStepCompletionConditionInput> for RecipeStepCompletionCondition {
    fn from(input: RecipeStepCompletionConditionInput) -> Self {
        Self {
            id: new_record_id(),
            ingredient_state_id: input.ingredient_state_id,
            ingredient_ids: input.ingredient_ids,
            notes: input.notes,
            optional: input.optional,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepCreationInput {
    /// Insert position; defaults to the end.
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(rename = "preparationID")]
    #[validate(length(min = 1, message = "preparationID is required"))]
    pub preparation_id: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub explicit_instructions: String,
    #[serde(default)]
    pub minimum_estimated_time_in_seconds: Option<u32>,
    #[serde(default)]
    pub maximum_estimated_time_in_seconds: Option<u32>,
    #[serde(default)]
    pub minimum_temperature_in_celsius: Option<f32>,
    #[serde(default)]
    pub maximum_temperature_in_celsius: Option<f32>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub start_timer_automatically: bool,
    #[serde(default)]
    #[validate(nested)]
    pub ingredients: Vec<RecipeStepIngredientInput>,
    #[serde(default)]
    #[validate(nested)]
    pub products: Vec<RecipeStepProductInput>,
    #[serde(default)]
    #[validate(nested)]
    pub instruments: Vec<RecipeStepInstrumentInput>,
    #[serde(default)]
    #[validate(nested)]
    pub completion_conditions: Vec<RecipeStepCompletionConditionInput>,
}

impl RecipeStep {
    /// Build a step at `index`; the caller owns index bookkeeping.
    pub fn from_input(input: RecipeStepCreationInput, index: u32, ctx: &CreateContext<'_>) -> Result<Self> {
        let step = Self {
            id: ctx.id.clone(),
            belongs_to_recipe: ctx
                .parent_id
                .clone()
                .ok_or_else(|| LarderError::internal("recipe steps need a parent recipe"))?,
            belongs_to_household: household_of(&ctx.owner, Self::KIND)?,
            index,
            preparation_id: input.preparation_id,
            notes: input.notes,
            explicit_instructions: input.explicit_instructions,
            minimum_estimated_time_in_seconds: input.minimum_estimated_time_in_seconds,
            maximum_estimated_time_in_seconds: input.maximum_estimated_time_in_seconds,
            minimum_temperature_in_celsius: input.minimum_temperature_in_celsius,
            maximum_temperature_in_celsius: input.maximum_temperature_in_celsius,
            optional: input.optional,
            start_timer_automatically: input.start_timer_automatically,
            ingredients: input.ingredients.into_iter().map(Into::into).collect(),
            products: input.products.into_iter().map(Into::into).collect(),
            instruments: input.instruments.into_iter().map(Into::into).collect(),
            completion_conditions: input.completion_conditions.into_iter().map(Into::into).collect(),
            timestamps: Timestamps::created(ctx.now),
        };
        step.check()?;
        Ok(step)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipeStepUpdateInput {
    /// Move the step; the others shift to keep indices contiguous.
    pub index: Option<u32>,
    #[serde(rename = "preparationID")]
    pub preparation_id: Option<String>,
    pub notes: Option<String>,
    pub explicit_instructions: Option<String>,
    pub minimum_estimated_time_in_seconds: Option<u32>,
    pub maximum_estimated_time_in_seconds: Option<u32>,
    pub minimum_temperature_in_celsius: Option<f32>,
    pub maximum_temperature_in_celsius: Option<f32>,
    pub optional: Option<bool>,
    pub start_timer_automatically: Option<bool>,
    #[validate(nested)]
    pub ingredients: Option<Vec<RecipeStepIngredientInput>>,
    #[validate(nested)]
    pub products: Option<Vec<RecipeStepProductInput>>,
    #[validate(nested)]
    pub instruments: Option<Vec<RecipeStepInstrumentInput>>,
    #[validate(nested)]
    pub completion_conditions: Option<Vec<RecipeStepCompletionConditionInput>>,
}

impl Patchable for RecipeStep {
    type Patch = RecipeStepUpdateInput;

    /// Applies everything but `index`, which the service handles.
    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.preparation_id, patch.preparation_id);
        patch_field(&mut self.notes, patch.notes);
        patch_field(&mut self.explicit_instructions, patch.explicit_instructions);
        if patch.minimum_estimated_time_in_seconds.is_some() {
            self.minimum_estimated_time_in_seconds = patch.minimum_estimated_time_in_seconds;
        }
        if patch.maximum_estimated_time_in_seconds.is_some() {
            self.maximum_estimated_time_in_seconds = patch.maximum_estimated_time_in_seconds;
        }
        if patch.minimum_temperature_in_celsius.is_some() {
            self.minimum_temperature_in_celsius = patch.minimum_temperature_in_celsius;
        }
        if patch.maximum_temperature_in_celsius.is_some() {
            self.maximum_temperature_in_celsius = patch.maximum_temperature_in_celsius;
        }
        patch_field(&mut self.optional, patch.optional);
        patch_field(&mut self.start_timer_automatically, patch.start_timer_automatically);
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients.into_iter().map(Into::into).collect();
        }
        if let Some(products) = patch.products {
            self.products = products.into_iter().map(Into::into).collect();
        }
        if let Some(instruments) = patch.instruments {
            self.instruments = instruments.into_iter().map(Into::into).collect();
        }
        if let Some(conditions) = patch.completion_conditions {
            self.completion_conditions = conditions.into_iter().map(Into::into).collect();
        }
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use chrono::Utc;

    fn ctx<'a>(session: &'a SessionContext, parent: Option<&str>) -> CreateContext<'a> {
        CreateContext {
            id: "r1".to_string(),
            owner: Owner::Household(HouseholdId::from("h1")),
            parent_id: parent.map(str::to_string),
            now: Utc::now(),
            session,
        }
    }

    fn ingredient(id: &str) -> RecipeStepIngredientInput {
        RecipeStepIngredientInput {
            id: Some(id.to_string()),
            name: "onion".to_string(),
            ingredient_id: Some("i-onion".to_string()),
            measurement_unit_id: "m-unit".to_string(),
            recipe_step_product_id: None,
            minimum_quantity: 1.0,
            maximum_quantity: Some(2.0),
            quantity_notes: String::new(),
            ingredient_notes: String::new(),
            optional: false,
        }
    }

    fn step_input() -> RecipeStepCreationInput {
        serde_json::from_value(serde_json::json!({ "preparationID": "p-dice" })).unwrap()
    }

    #[test]
    fn recipe_is_stamped_from_context() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let input: RecipeCreationInput = serde_json::from_value(serde_json::json!({ "name": "Soup" })).unwrap();
        let recipe = Recipe::from_input(input, &ctx(&member, None)).unwrap();

        assert_eq!(recipe.belongs_to_household, HouseholdId::from("h1"));
        assert_eq!(recipe.created_by_user, UserId::from("u1"));
        assert_eq!(recipe.slug, "soup");
        assert!(recipe.eligible_for_meals);
        assert_eq!(recipe.minimum_estimated_portions, 1.0);
    }

    #[test]
    fn step_references_catalog_records() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mut input = step_input();
        input.ingredients = vec![ingredient("ing-1")];
        let step = RecipeStep::from_input(input, 0, &ctx(&member, Some("r-1"))).unwrap();

        let kinds: Vec<_> = step.references().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["validPreparation", "validIngredient", "validMeasurementUnit"]);
        assert_eq!(step.index().parent_id.as_deref(), Some("r-1"));
        assert_eq!(step.ingredients[0].id, "ing-1");
    }

    #[test]
    fn completion_conditions_must_observe_own_ingredients() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mut input = step_input();
        input.ingredients = vec![ingredient("ing-1")];
        input.completion_conditions = vec![RecipeStepCompletionConditionInput {
            ingredient_state_id: "s-translucent".to_string(),
            ingredient_ids: vec!["ing-2".to_string()],
            notes: String::new(),
            optional: false,
        }];
        assert!(RecipeStep::from_input(input, 0, &ctx(&member, Some("r-1"))).is_err());
    }

    #[test]
    fn inverted_quantity_band_is_rejected() {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mut bad = ingredient("ing-1");
        bad.minimum_quantity = 3.0;
        let mut input = step_input();
        input.ingredients = vec![bad];
        assert!(RecipeStep::from_input(input, 0, &ctx(&member, Some("r-1"))).is_err());
    }
}
