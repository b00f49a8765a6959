//! Recipe service: recipes, their ordered steps, prep tasks and ratings.
//!
//! Step indices stay contiguous (`0..n`) across insertions, moves and
//! archives; every shifted step is saved and journaled in the same
//! transaction as the change that shifted it.

use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::models::{Recipe, RecipeCreationInput, RecipeStep, RecipeStepCreationInput, RecipeStepUpdateInput, RecipeUpdateInput, RecipeView};
use super::prep_tasks::{RecipePrepTask, RecipePrepTaskCreationInput, RecipePrepTaskUpdateInput};
use super::ratings::{RecipeRating, RecipeRatingCreationInput, RecipeRatingUpdateInput};
use crate::auth::authorization::Action;
use crate::auth::models::SessionContext;
use crate::domain::{new_record_id, Page, PageQuery};
use crate::errors::{LarderError, Result};
use crate::kernel::lifecycle::UPDATED;
use crate::kernel::{CreateContext, Kernel, Patchable, Resource};
use crate::storage::{records, Column, Document};

/// Renumber `steps` to `0..n` in slice order; returns the positions that moved.
pub fn renumber(steps: &mut [RecipeStep]) -> Vec<usize> {
    let mut moved = Vec::new();
    for (position, step) in steps.iter_mut().enumerate() {
        let index = position as u32;
        if step.index != index {
            step.index = index;
            moved.push(position);
        }
    }
    moved
}

/// Ingredients drawn from a step product must name a product of an earlier step.
fn check_product_flow(steps: &[RecipeStep]) -> Result<()> {
    let mut available: Vec<&str> = Vec::new();
    for step in steps {
        for ingredient in &step.ingredients {
            if let Some(product) = &ingredient.recipe_step_product_id {
                if !available.contains(&product.as_str()) {
                    return Err(LarderError::validation_field(
                        format!("product '{product}' is not made by an earlier step"),
                        "recipeStepProductID",
                    ));
                }
            }
        }
        available.extend(step.product_ids());
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RecipeService {
    kernel: Kernel,
}

impl RecipeService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    /// Live steps of a recipe in index order.
    pub async fn steps_in(conn: &mut SqliteConnection, recipe_id: &str) -> Result<Vec<RecipeStep>> {
        let mut steps: Vec<RecipeStep> = records::list_all(conn, &[(Column::ParentId, recipe_id.to_string())]).await?;
        steps.sort_by_key(|step| step.index);
        Ok(steps)
    }

    /// Live prep tasks of a recipe, oldest first.
    pub async fn prep_tasks_in(conn: &mut SqliteConnection, recipe_id: &str) -> Result<Vec<RecipePrepTask>> {
        records::list_all(conn, &[(Column::ParentId, recipe_id.to_string())]).await
    }

    // ---------------------------------------------------------------------
    // Recipes
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: RecipeCreationInput) -> Result<Recipe> {
        let recipe = self.kernel.create::<Recipe>(session, input).await?;
        info!(recipe_id = %recipe.id, household_id = %recipe.belongs_to_household, "recipe created");
        Ok(recipe)
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<RecipeView> {
        let mut conn = self.kernel.db().read().await?;
        let recipe: Recipe = Kernel::load_for(&mut conn, session, id, Action::Read).await?;
        let steps = Self::steps_in(&mut conn, id).await?;
        let prep_tasks = Self::prep_tasks_in(&mut conn, id).await?;
        Ok(RecipeView { recipe, steps, prep_tasks })
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<Recipe>> {
        self.kernel.list(session, query).await
    }

    pub async fn search(&self, session: &SessionContext, query: &str, limit: u32) -> Result<Vec<Recipe>> {
        self.kernel.search(session, query, limit).await
    }

    pub async fn update(&self, session: &SessionContext, id: &str, patch: RecipeUpdateInput) -> Result<Recipe> {
        self.kernel.update::<Recipe>(session, id, patch).await
    }

    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<Recipe> {
        self.kernel.archive::<Recipe>(session, id).await
    }

    // ---------------------------------------------------------------------
    // Steps
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(recipe_id = %recipe_id))]
    pub async fn create_step(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        input: RecipeStepCreationInput,
    ) -> Result<RecipeStep> {
        input.validate()?;
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let recipe: Recipe = Kernel::load_for(&mut tx, session, recipe_id, Action::Update).await?;
        let mut steps = Self::steps_in(&mut tx, recipe_id).await?;

        let position = input.index.map(|index| index as usize).unwrap_or(steps.len());
        if position > steps.len() {
            return Err(LarderError::validation_field(
                format!("index must be between 0 and {}", steps.len()),
                "index",
            ));
        }

        let ctx = CreateContext {
            id: new_record_id(),
            owner: recipe.owner(),
            parent_id: Some(recipe.id.clone()),
            now: self.kernel.now(),
            session,
        };
        let step = RecipeStep::from_input(input, position as u32, &ctx)?;
        steps.insert(position, step.clone());
        let moved = renumber(&mut steps);
        check_product_flow(&steps)?;

        let mut events = Vec::new();
        for position in moved {
            events.push(self.kernel.transition_in(&mut tx, actor, &mut steps[position], UPDATED).await?);
        }
        events.push(self.kernel.insert_in(&mut tx, actor, &step).await?);
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        info!(step_id = %step.id, index = step.index, "recipe step created");
        Ok(step)
    }

    pub async fn list_steps(&self, session: &SessionContext, recipe_id: &str, query: PageQuery) -> Result<Page<RecipeStep>> {
        let mut conn = self.kernel.db().read().await?;
        Kernel::load_for::<Recipe>(&mut conn, session, recipe_id, Action::Read).await?;
        let steps = Self::steps_in(&mut conn, recipe_id).await?;
        Ok(Page::from_all(steps, &query))
    }

    pub async fn get_step(&self, session: &SessionContext, recipe_id: &str, step_id: &str) -> Result<RecipeStep> {
        self.kernel.get_child::<Recipe, RecipeStep>(session, recipe_id, step_id).await
    }

    #[instrument(skip(self, session, patch), fields(recipe_id = %recipe_id, step_id = %step_id))]
    pub async fn update_step(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        step_id: &str,
        patch: RecipeStepUpdateInput,
    ) -> Result<RecipeStep> {
        patch.validate()?;
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let mut step: RecipeStep =
            Kernel::load_child_for::<Recipe, RecipeStep>(&mut tx, session, recipe_id, step_id, Action::Update).await?;
        let target = patch.index;
        step.apply_patch(patch, session)?;

        let mut steps = Self::steps_in(&mut tx, recipe_id).await?;
        let from = steps
            .iter()
            .position(|candidate| candidate.id == step.id)
            .ok_or_else(|| LarderError::not_found(RecipeStep::KIND, step_id))?;
        steps[from] = step;
        if let Some(target) = target {
            let target = target as usize;
            if target >= steps.len() {
                return Err(LarderError::validation_field(
                    format!("index must be between 0 and {}", steps.len() - 1),
                    "index",
                ));
            }
            let moving = steps.remove(from);
            steps.insert(target, moving);
        }
        let moved = renumber(&mut steps);
        check_product_flow(&steps)?;

        let mut events = Vec::new();
        let mut updated = None;
        for (position, candidate) in steps.iter_mut().enumerate() {
            if candidate.id == step_id {
                events.push(self.kernel.update_in(&mut tx, actor, candidate).await?);
                updated = Some(candidate.clone());
            } else if moved.contains(&position) {
                events.push(self.kernel.transition_in(&mut tx, actor, candidate, UPDATED).await?);
            }
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        updated.ok_or_else(|| LarderError::not_found(RecipeStep::KIND, step_id))
    }

    /// Archive a step and close the gap it leaves. Steps still used by a prep
    /// task or feeding a later step cannot be archived.
    #[instrument(skip(self, session), fields(recipe_id = %recipe_id, step_id = %step_id))]
    pub async fn archive_step(&self, session: &SessionContext, recipe_id: &str, step_id: &str) -> Result<RecipeStep> {
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let mut step: RecipeStep =
            Kernel::load_child_for::<Recipe, RecipeStep>(&mut tx, session, recipe_id, step_id, Action::Archive).await?;

        let prep_tasks = Self::prep_tasks_in(&mut tx, recipe_id).await?;
        if prep_tasks.iter().any(|task| task.uses_step(step_id)) {
            return Err(LarderError::conflict("step is used by a prep task", RecipeStep::KIND));
        }

        let mut steps = Self::steps_in(&mut tx, recipe_id).await?;
        steps.retain(|candidate| candidate.id != step_id);
        if check_product_flow(&steps).is_err() {
            return Err(LarderError::conflict("a later step consumes this step's products", RecipeStep::KIND));
        }
        let moved = renumber(&mut steps);

        let mut events = vec![self.kernel.archive_in(&mut tx, actor, &mut step).await?];
        for position in moved {
            events.push(self.kernel.transition_in(&mut tx, actor, &mut steps[position], UPDATED).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(events);
        Ok(step)
    }

    // ---------------------------------------------------------------------
    // Prep tasks
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(recipe_id = %recipe_id))]
    pub async fn create_prep_task(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        input: RecipePrepTaskCreationInput,
    ) -> Result<RecipePrepTask> {
        input.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let recipe: Recipe = Kernel::load_for(&mut tx, session, recipe_id, Action::Update).await?;
        let ctx = CreateContext {
            id: new_record_id(),
            owner: recipe.owner(),
            parent_id: Some(recipe.id.clone()),
            now: self.kernel.now(),
            session,
        };
        let task = RecipePrepTask::from_input(input, &ctx)?;
        task.check_steps(&Self::steps_in(&mut tx, recipe_id).await?)?;
        let event = self.kernel.insert_in(&mut tx, Some(&session.user_id), &task).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(task)
    }

    pub async fn list_prep_tasks(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        query: PageQuery,
    ) -> Result<Page<RecipePrepTask>> {
        self.kernel.list_children::<Recipe, RecipePrepTask>(session, recipe_id, query).await
    }

    pub async fn get_prep_task(&self, session: &SessionContext, recipe_id: &str, task_id: &str) -> Result<RecipePrepTask> {
        self.kernel.get_child::<Recipe, RecipePrepTask>(session, recipe_id, task_id).await
    }

    pub async fn update_prep_task(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        task_id: &str,
        patch: RecipePrepTaskUpdateInput,
    ) -> Result<RecipePrepTask> {
        patch.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let mut task: RecipePrepTask =
            Kernel::load_child_for::<Recipe, RecipePrepTask>(&mut tx, session, recipe_id, task_id, Action::Update).await?;
        task.apply_patch(patch, session)?;
        task.check_steps(&Self::steps_in(&mut tx, recipe_id).await?)?;
        let event = self.kernel.update_in(&mut tx, Some(&session.user_id), &mut task).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(task)
    }

    pub async fn archive_prep_task(&self, session: &SessionContext, recipe_id: &str, task_id: &str) -> Result<RecipePrepTask> {
        self.kernel.archive_child::<Recipe, RecipePrepTask>(session, recipe_id, task_id).await
    }

    // ---------------------------------------------------------------------
    // Ratings
    // ---------------------------------------------------------------------

    pub async fn create_rating(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        input: RecipeRatingCreationInput,
    ) -> Result<RecipeRating> {
        self.kernel.create_child::<Recipe, RecipeRating>(session, recipe_id, input).await
    }

    pub async fn list_ratings(&self, session: &SessionContext, recipe_id: &str, query: PageQuery) -> Result<Page<RecipeRating>> {
        self.kernel.list_children::<Recipe, RecipeRating>(session, recipe_id, query).await
    }

    pub async fn get_rating(&self, session: &SessionContext, recipe_id: &str, rating_id: &str) -> Result<RecipeRating> {
        self.kernel.get_child::<Recipe, RecipeRating>(session, recipe_id, rating_id).await
    }

    pub async fn update_rating(
        &self,
        session: &SessionContext,
        recipe_id: &str,
        rating_id: &str,
        patch: RecipeRatingUpdateInput,
    ) -> Result<RecipeRating> {
        self.kernel.update_child::<Recipe, RecipeRating>(session, recipe_id, rating_id, patch).await
    }

    pub async fn archive_rating(&self, session: &SessionContext, recipe_id: &str, rating_id: &str) -> Result<RecipeRating> {
        let mut tx = self.kernel.db().write().await?;
        let mut rating: RecipeRating =
            Kernel::load_child_for::<Recipe, RecipeRating>(&mut tx, session, recipe_id, rating_id, Action::Archive).await?;
        rating.check_author(session)?;
        let event = self.kernel.archive_in(&mut tx, Some(&session.user_id), &mut rating).await?;
        tx.commit().await?;

        self.kernel.changes().publish(event);
        Ok(rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authorization::Owner;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use crate::domain::HouseholdId;
    use chrono::Utc;

    fn step(id: &str, index: u32, json: serde_json::Value) -> RecipeStep {
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let ctx = CreateContext {
            id: id.to_string(),
            owner: Owner::Household(HouseholdId::from("h1")),
            parent_id: Some("r1".to_string()),
            now: Utc::now(),
            session: &member,
        };
        let mut input = json;
        input["preparationID"] = serde_json::json!("p1");
        RecipeStep::from_input(serde_json::from_value(input).unwrap(), index, &ctx).unwrap()
    }

    #[test]
    fn renumber_reports_only_moved_positions() {
        let mut steps = vec![
            step("a", 0, serde_json::json!({})),
            step("new", 1, serde_json::json!({})),
            step("b", 1, serde_json::json!({})),
            step("c", 2, serde_json::json!({})),
        ];
        assert_eq!(renumber(&mut steps), vec![2, 3]);
        let indices: Vec<_> = steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn products_must_come_from_earlier_steps() {
        let producer = step(
            "a",
            0,
            serde_json::json!({ "products": [{ "id": "dough", "name": "dough", "type": "ingredient" }] }),
        );
        let consumer = step(
            "b",
            1,
            serde_json::json!({ "ingredients": [{
                "name": "dough", "measurementUnitID": "m1", "recipeStepProductID": "dough", "minimumQuantity": 1.0
            }] }),
        );

        assert!(check_product_flow(&[producer.clone(), consumer.clone()]).is_ok());
        assert!(check_product_flow(&[consumer.clone(), producer]).is_err());
        assert!(check_product_flow(&[consumer]).is_err());
    }
}
