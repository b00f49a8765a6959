//! Recipe prep tasks: work that can happen ahead of cooking ("dice the onions
//! the night before"), tied to the steps they satisfy.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{new_record_id, HouseholdId, Timestamps};
use crate::errors::{LarderError, Result};
use crate::kernel::{patch_field, CreateContext, Patchable, Reference, Resource, Scope};
use crate::storage::{Document, RecordIndex};

use super::models::RecipeStep;

crate::string_enum! {
    pub enum StorageContainerType {
        Uncovered => "uncovered",
        Covered => "covered",
        OnAWireRack => "on a wire rack",
        InAnAirtightContainer => "in an airtight container",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskStep {
    pub id: String,
    pub belongs_to_recipe_step: String,
    /// Whether doing the task completes the step outright.
    pub satisfies_recipe_step: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTask {
    pub id: String,
    pub belongs_to_recipe: String,
    pub belongs_to_household: HouseholdId,
    pub name: String,
    pub description: String,
    pub notes: String,
    pub optional: bool,
    pub explicit_storage_instructions: String,
    pub storage_type: Option<StorageContainerType>,
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    pub maximum_storage_temperature_in_celsius: Option<f32>,
    pub minimum_time_buffer_before_recipe_in_seconds: u32,
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub task_steps: Vec<RecipePrepTaskStep>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Document for RecipePrepTask {
    const KIND: &'static str = "recipePrepTask";

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

impl Resource for RecipePrepTask {
    const NOUN: &'static str = "recipePrepTask";
    const SCOPE: Scope = Scope::Household;

    fn owner(&self) -> Owner {
        Owner::Household(self.belongs_to_household.clone())
    }

    fn references(&self) -> Vec<Reference> {
        self.task_steps
            .iter()
            .map(|step| Reference::to::<RecipeStep>(step.belongs_to_recipe_step.clone(), "belongsToRecipeStep"))
            .collect()
    }
}

impl RecipePrepTask {
    fn check(&self) -> Result<()> {
        if self.task_steps.is_empty() {
            return Err(LarderError::validation_field("a prep task needs at least one step", "taskSteps"));
        }
        let mut seen = std::collections::HashSet::new();
        if !self.task_steps.iter().all(|step| seen.insert(step.belongs_to_recipe_step.as_str())) {
            return Err(LarderError::validation_field("a step may appear only once per prep task", "taskSteps"));
        }
        if self
            .maximum_time_buffer_before_recipe_in_seconds
            .is_some_and(|max| max < self.minimum_time_buffer_before_recipe_in_seconds)
        {
            return Err(LarderError::validation_field(
                "maximumTimeBufferBeforeRecipeInSeconds is below the minimum",
                "maximumTimeBufferBeforeRecipeInSeconds",
            ));
        }
        if let (Some(min), Some(max)) =
            (self.minimum_storage_temperature_in_celsius, self.maximum_storage_temperature_in_celsius)
        {
            if max < min {
                return Err(LarderError::validation_field(
                    "maximumStorageTemperatureInCelsius is below the minimum",
                    "maximumStorageTemperatureInCelsius",
                ));
            }
        }
        Ok(())
    }

    /// Every task step must name one of `steps`, the recipe's live steps.
    pub fn check_steps(&self, steps: &[RecipeStep]) -> Result<()> {
        for task_step in &self.task_steps {
            if !steps.iter().any(|step| step.id == task_step.belongs_to_recipe_step) {
                return Err(LarderError::validation_field(
                    format!("step '{}' is not part of this recipe", task_step.belongs_to_recipe_step),
                    "belongsToRecipeStep",
                ));
            }
        }
        Ok(())
    }

    pub fn uses_step(&self, step_id: &str) -> bool {
        self.task_steps.iter().any(|step| step.belongs_to_recipe_step == step_id)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskStepInput {
    #[validate(length(min = 1, message = "belongsToRecipeStep is required"))]
    pub belongs_to_recipe_step: String,
    #[serde(default)]
    pub satisfies_recipe_step: bool,
}

impl From<RecipePrepTaskStepInput> for RecipePrepTaskStep {
    fn from(input: RecipePrepTaskStepInput) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_recipe_step: input.belongs_to_recipe_step,
            satisfies_recipe_step: input.satisfies_recipe_step,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskCreationInput {
    #[validate(length(min = 1, max = 256, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub explicit_storage_instructions: String,
    #[serde(default)]
    pub storage_type: Option<StorageContainerType>,
    #[serde(default)]
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    #[serde(default)]
    pub maximum_storage_temperature_in_celsius: Option<f32>,
    #[serde(default)]
    pub minimum_time_buffer_before_recipe_in_seconds: u32,
    #[serde(default)]
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    #[validate(nested)]
    pub task_steps: Vec<RecipePrepTaskStepInput>,
}

impl RecipePrepTask {
    pub fn from_input(input: RecipePrepTaskCreationInput, ctx: &CreateContext<'_>) -> Result<Self> {
        let task = Self {
            id: ctx.id.clone(),
            belongs_to_recipe: ctx
                .parent_id
                .clone()
                .ok_or_else(|| LarderError::internal("prep tasks need a parent recipe"))?,
            belongs_to_household: ctx
                .owner
                .household_id()
                .cloned()
                .ok_or_else(|| LarderError::internal("prep tasks must belong to a household"))?,
            name: input.name.trim().to_string(),
            description: input.description,
            notes: input.notes,
            optional: input.optional,
            explicit_storage_instructions: input.explicit_storage_instructions,
            storage_type: input.storage_type,
            minimum_storage_temperature_in_celsius: input.minimum_storage_temperature_in_celsius,
            maximum_storage_temperature_in_celsius: input.maximum_storage_temperature_in_celsius,
            minimum_time_buffer_before_recipe_in_seconds: input.minimum_time_buffer_before_recipe_in_seconds,
            maximum_time_buffer_before_recipe_in_seconds: input.maximum_time_buffer_before_recipe_in_seconds,
            task_steps: input.task_steps.into_iter().map(Into::into).collect(),
            timestamps: Timestamps::created(ctx.now),
        };
        task.check()?;
        Ok(task)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecipePrepTaskUpdateInput {
    #[validate(length(min = 1, max = 256, message = "name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub optional: Option<bool>,
    pub explicit_storage_instructions: Option<String>,
    pub storage_type: Option<StorageContainerType>,
    pub minimum_storage_temperature_in_celsius: Option<f32>,
    pub maximum_storage_temperature_in_celsius: Option<f32>,
    pub minimum_time_buffer_before_recipe_in_seconds: Option<u32>,
    pub maximum_time_buffer_before_recipe_in_seconds: Option<u32>,
    #[validate(nested)]
    pub task_steps: Option<Vec<RecipePrepTaskStepInput>>,
}

impl Patchable for RecipePrepTask {
    type Patch = RecipePrepTaskUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.name, patch.name.map(|name| name.trim().to_string()));
        patch_field(&mut self.description, patch.description);
        patch_field(&mut self.notes, patch.notes);
        patch_field(&mut self.optional, patch.optional);
        patch_field(&mut self.explicit_storage_instructions, patch.explicit_storage_instructions);
        if patch.storage_type.is_some() {
            self.storage_type = patch.storage_type;
        }
        if patch.minimum_storage_temperature_in_celsius.is_some() {
            self.minimum_storage_temperature_in_celsius = patch.minimum_storage_temperature_in_celsius;
        }
        if patch.maximum_storage_temperature_in_celsius.is_some() {
            self.maximum_storage_temperature_in_celsius = patch.maximum_storage_temperature_in_celsius;
        }
        patch_field(
            &mut self.minimum_time_buffer_before_recipe_in_seconds,
            patch.minimum_time_buffer_before_recipe_in_seconds,
        );
        if patch.maximum_time_buffer_before_recipe_in_seconds.is_some() {
            self.maximum_time_buffer_before_recipe_in_seconds = patch.maximum_time_buffer_before_recipe_in_seconds;
        }
        if let Some(steps) = patch.task_steps {
            self.task_steps = steps.into_iter().map(Into::into).collect();
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

    fn input(steps: &[&str]) -> RecipePrepTaskCreationInput {
        serde_json::from_value(serde_json::json!({
            "name": "dice onions",
            "storageType": "in an airtight container",
            "taskSteps": steps
                .iter()
                .map(|id| serde_json::json!({ "belongsToRecipeStep": id, "satisfiesRecipeStep": true }))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    fn build(steps: &[&str]) -> Result<RecipePrepTask> {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let ctx = CreateContext {
            id: "t1".to_string(),
            owner: Owner::Household(HouseholdId::from("h1")),
            parent_id: Some("r1".to_string()),
            now: Utc::now(),
            session: &member,
        };
        RecipePrepTask::from_input(input(steps), &ctx)
    }

    #[test]
    fn task_steps_must_be_present_and_distinct() {
        assert!(build(&[]).is_err());
        assert!(build(&["s1", "s1"]).is_err());

        let task = build(&["s1", "s2"]).unwrap();
        assert_eq!(task.storage_type, Some(StorageContainerType::InAnAirtightContainer));
        assert!(task.uses_step("s2"));
        assert_eq!(task.references().len(), 2);
    }
}
