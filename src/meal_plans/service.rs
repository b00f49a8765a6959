//! Meal plan engine: plan structure, ballots, finalization and derivation.
//!
//! Votes and finalization both run under the storage write gate, so a ballot
//! either lands before a finalization begins or sees the plan already
//! finalized and is rejected.

use std::collections::HashSet;

use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::grocery::{self, IngredientNeed};
use super::models::{
    BallotReceipt, EventOutcome, FinalizationResult, MealPlan, MealPlanBallotInput, MealPlanCreationInput,
    MealPlanEvent, MealPlanEventCreationInput, MealPlanEventUpdateInput, MealPlanEventView, MealPlanGroceryListItem,
    MealPlanGroceryListItemUpdateInput, MealPlanOption, MealPlanOptionCreationInput, MealPlanOptionUpdateInput,
    MealPlanOptionVote, MealPlanStatus, MealPlanTask, MealPlanTaskUpdateInput, MealPlanUpdateInput, MealPlanView,
};
use super::tally::{self, RankedVote};
use crate::auth::authorization::{authorize, Action, Owner, Target};
use crate::auth::models::SessionContext;
use crate::catalog::ValidMeasurementUnitConversion;
use crate::domain::{new_record_id, Page, PageQuery, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::households::HouseholdService;
use crate::kernel::lifecycle::UPDATED;
use crate::kernel::{ChangeEvent, Kernel, Patchable};
use crate::notifications::NotificationService;
use crate::observability::metrics;
use crate::recipes::{Meal, RecipeService};
use crate::storage::{records, Column, Document};

#[derive(Debug, Clone)]
pub struct MealPlanService {
    kernel: Kernel,
    notifications: NotificationService,
}

impl MealPlanService {
    pub fn new(kernel: Kernel, notifications: NotificationService) -> Self {
        Self { kernel, notifications }
    }

    async fn events_in(conn: &mut SqliteConnection, plan_id: &str) -> Result<Vec<MealPlanEvent>> {
        records::list_all(conn, &[(Column::ParentId, plan_id.to_string())]).await
    }

    async fn options_in(conn: &mut SqliteConnection, event_id: &str) -> Result<Vec<MealPlanOption>> {
        records::list_all(conn, &[(Column::ParentId, event_id.to_string())]).await
    }

    async fn votes_in(conn: &mut SqliteConnection, event_id: &str) -> Result<Vec<MealPlanOptionVote>> {
        records::list_all(conn, &[(Column::LeftId, event_id.to_string())]).await
    }

    async fn view_in(conn: &mut SqliteConnection, plan: MealPlan) -> Result<MealPlanView> {
        let mut events = Vec::new();
        for event in Self::events_in(conn, &plan.id).await? {
            let options = Self::options_in(conn, &event.id).await?;
            events.push(MealPlanEventView { event, options });
        }
        Ok(MealPlanView { plan, events })
    }

    /// Load an event of a plan the session may act on.
    async fn load_event(
        conn: &mut SqliteConnection,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        action: Action,
    ) -> Result<(MealPlan, MealPlanEvent)> {
        let plan: MealPlan = Kernel::load_for(conn, session, plan_id, action).await?;
        let event = Kernel::load_child_for::<MealPlan, MealPlanEvent>(conn, session, plan_id, event_id, action).await?;
        Ok((plan, event))
    }

    async fn load_option(
        conn: &mut SqliteConnection,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        option_id: &str,
        action: Action,
    ) -> Result<(MealPlan, MealPlanEvent, MealPlanOption)> {
        let (plan, event) = Self::load_event(conn, session, plan_id, event_id, action).await?;
        let option =
            Kernel::load_child_for::<MealPlanEvent, MealPlanOption>(conn, session, event_id, option_id, action).await?;
        Ok((plan, event, option))
    }

    /// Ballots for an event stop being complete once its options change.
    async fn discard_votes_in(
        &self,
        conn: &mut SqliteConnection,
        actor: Option<&UserId>,
        event_id: &str,
    ) -> Result<Vec<ChangeEvent>> {
        let mut changes = Vec::new();
        for mut vote in Self::votes_in(conn, event_id).await? {
            changes.push(self.kernel.archive_in(conn, actor, &mut vote).await?);
        }
        Ok(changes)
    }

    // ---------------------------------------------------------------------
    // Plans
    // ---------------------------------------------------------------------

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: MealPlanCreationInput) -> Result<MealPlanView> {
        input.validate()?;
        let household = session.active_household()?.clone();
        let owner = Owner::Household(household.clone());
        authorize(session, Action::Create, Target { kind: MealPlan::KIND, id: "new", owner: &owner })?;

        let now = self.kernel.now();
        let actor = Some(&session.user_id);
        let plan = MealPlan::new(&input, session, household, now)?;

        let mut tx = self.kernel.db().write().await?;
        let mut changes = vec![self.kernel.insert_in(&mut tx, actor, &plan).await?];
        let mut events = Vec::with_capacity(input.events.len());
        for event_input in &input.events {
            let event = MealPlanEvent::new(event_input, &plan, now)?;
            changes.push(self.kernel.insert_in(&mut tx, actor, &event).await?);
            let mut options = Vec::with_capacity(event_input.options.len());
            for option_input in &event_input.options {
                let option = MealPlanOption::new(option_input, &event, now);
                changes.push(self.kernel.insert_in(&mut tx, actor, &option).await?);
                options.push(option);
            }
            events.push(MealPlanEventView { event, options });
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        info!(meal_plan_id = %plan.id, events = events.len(), "meal plan created");
        Ok(MealPlanView { plan, events })
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<MealPlanView> {
        let mut conn = self.kernel.db().read().await?;
        let plan: MealPlan = Kernel::load_for(&mut conn, session, id, Action::Read).await?;
        Self::view_in(&mut conn, plan).await
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<MealPlan>> {
        self.kernel.list(session, query).await
    }

    pub async fn update(&self, session: &SessionContext, id: &str, patch: MealPlanUpdateInput) -> Result<MealPlan> {
        if patch.voting_deadline.is_some_and(|deadline| deadline <= self.kernel.now()) {
            return Err(LarderError::validation_field("votingDeadline must be in the future", "votingDeadline"));
        }
        self.kernel.update::<MealPlan>(session, id, patch).await
    }

    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<MealPlan> {
        self.kernel.archive::<MealPlan>(session, id).await
    }

    /// Finalize on request. Succeeds only when voting is complete or closed;
    /// a plan that is no longer awaiting votes is a conflict.
    #[instrument(skip(self, session), fields(meal_plan_id = %id))]
    pub async fn finalize(&self, session: &SessionContext, id: &str) -> Result<FinalizationResult> {
        let mut tx = self.kernel.db().write().await?;
        let mut plan: MealPlan = Kernel::load_for(&mut tx, session, id, Action::Update).await?;
        plan.ensure_open()?;

        let ready = plan.voting_closed(self.kernel.now()) || self.everyone_voted_in(&mut tx, &plan).await?;
        if !ready {
            return Ok(FinalizationResult { finalized: false, status: plan.status });
        }

        let changes = self.finalize_in(&mut tx, &mut plan, Some(&session.user_id)).await?;
        tx.commit().await?;
        self.kernel.changes().publish_all(changes);
        Ok(FinalizationResult { finalized: true, status: plan.status })
    }

    /// Finalize every plan whose voting deadline has passed.
    #[instrument(skip(self))]
    pub async fn finalize_due(&self) -> Result<usize> {
        let mut tx = self.kernel.db().write().await?;
        let due: Vec<MealPlan> = records::list_due(&mut tx, self.kernel.now()).await?;
        let count = due.len();

        let mut changes = Vec::new();
        for mut plan in due {
            changes.extend(self.finalize_in(&mut tx, &mut plan, None).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub async fn create_event(
        &self,
        session: &SessionContext,
        plan_id: &str,
        input: MealPlanEventCreationInput,
    ) -> Result<MealPlanEventView> {
        input.validate()?;
        let now = self.kernel.now();
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let plan: MealPlan = Kernel::load_for(&mut tx, session, plan_id, Action::Update).await?;
        plan.ensure_open()?;

        let event = MealPlanEvent::new(&input, &plan, now)?;
        let mut changes = vec![self.kernel.insert_in(&mut tx, actor, &event).await?];
        let mut options = Vec::with_capacity(input.options.len());
        for option_input in &input.options {
            let option = MealPlanOption::new(option_input, &event, now);
            changes.push(self.kernel.insert_in(&mut tx, actor, &option).await?);
            options.push(option);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(MealPlanEventView { event, options })
    }

    pub async fn list_events(&self, session: &SessionContext, plan_id: &str, query: PageQuery) -> Result<Page<MealPlanEvent>> {
        self.kernel.list_children::<MealPlan, MealPlanEvent>(session, plan_id, query).await
    }

    pub async fn get_event(&self, session: &SessionContext, plan_id: &str, event_id: &str) -> Result<MealPlanEventView> {
        let mut conn = self.kernel.db().read().await?;
        let (_, event) = Self::load_event(&mut conn, session, plan_id, event_id, Action::Read).await?;
        let options = Self::options_in(&mut conn, event_id).await?;
        Ok(MealPlanEventView { event, options })
    }

    pub async fn update_event(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        patch: MealPlanEventUpdateInput,
    ) -> Result<MealPlanEvent> {
        patch.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let (plan, mut event) = Self::load_event(&mut tx, session, plan_id, event_id, Action::Update).await?;
        plan.ensure_open()?;
        event.apply_patch(patch, session)?;
        plan.check_event(&event)?;
        let change = self.kernel.update_in(&mut tx, Some(&session.user_id), &mut event).await?;
        tx.commit().await?;

        self.kernel.changes().publish(change);
        Ok(event)
    }

    pub async fn archive_event(&self, session: &SessionContext, plan_id: &str, event_id: &str) -> Result<MealPlanEvent> {
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let (plan, mut event) = Self::load_event(&mut tx, session, plan_id, event_id, Action::Archive).await?;
        plan.ensure_open()?;

        let mut changes = self.discard_votes_in(&mut tx, actor, event_id).await?;
        for mut option in Self::options_in(&mut tx, event_id).await? {
            changes.push(self.kernel.archive_in(&mut tx, actor, &mut option).await?);
        }
        changes.push(self.kernel.archive_in(&mut tx, actor, &mut event).await?);
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(event)
    }

    // ---------------------------------------------------------------------
    // Options
    // ---------------------------------------------------------------------

    pub async fn create_option(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        input: MealPlanOptionCreationInput,
    ) -> Result<MealPlanOption> {
        input.validate()?;
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let (plan, event) = Self::load_event(&mut tx, session, plan_id, event_id, Action::Update).await?;
        plan.ensure_open()?;

        let option = MealPlanOption::new(&input, &event, self.kernel.now());
        let mut changes = vec![self.kernel.insert_in(&mut tx, actor, &option).await?];
        changes.extend(self.discard_votes_in(&mut tx, actor, event_id).await?);
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(option)
    }

    pub async fn list_options(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        query: PageQuery,
    ) -> Result<Page<MealPlanOption>> {
        let mut conn = self.kernel.db().read().await?;
        Self::load_event(&mut conn, session, plan_id, event_id, Action::Read).await?;
        let options = Self::options_in(&mut conn, event_id).await?;
        Ok(Page::from_all(options, &query))
    }

    pub async fn get_option(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        option_id: &str,
    ) -> Result<MealPlanOption> {
        let mut conn = self.kernel.db().read().await?;
        let (_, _, option) = Self::load_option(&mut conn, session, plan_id, event_id, option_id, Action::Read).await?;
        Ok(option)
    }

    pub async fn update_option(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        option_id: &str,
        patch: MealPlanOptionUpdateInput,
    ) -> Result<MealPlanOption> {
        patch.validate()?;
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let (plan, _, mut option) =
            Self::load_option(&mut tx, session, plan_id, event_id, option_id, Action::Update).await?;
        plan.ensure_open()?;

        let previous_meal = option.meal_id.clone();
        option.apply_patch(patch, session)?;
        let mut changes = vec![self.kernel.update_in(&mut tx, actor, &mut option).await?];
        if option.meal_id != previous_meal {
            changes.extend(self.discard_votes_in(&mut tx, actor, event_id).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(option)
    }

    pub async fn archive_option(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        option_id: &str,
    ) -> Result<MealPlanOption> {
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let (plan, _, mut option) =
            Self::load_option(&mut tx, session, plan_id, event_id, option_id, Action::Archive).await?;
        plan.ensure_open()?;

        let mut changes = self.discard_votes_in(&mut tx, actor, event_id).await?;
        changes.push(self.kernel.archive_in(&mut tx, actor, &mut option).await?);
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(option)
    }

    // ---------------------------------------------------------------------
    // Voting
    // ---------------------------------------------------------------------

    /// Replace the voter's ballot for one event. Completing the household's
    /// voting finalizes the plan; a ballot after the deadline finalizes the
    /// plan and is then rejected.
    #[instrument(skip(self, session, ballot), fields(meal_plan_id = %plan_id, event_id = %event_id, user_id = %session.user_id))]
    pub async fn vote(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        ballot: MealPlanBallotInput,
    ) -> Result<BallotReceipt> {
        ballot.validate()?;
        let now = self.kernel.now();
        let actor = Some(&session.user_id);
        let mut tx = self.kernel.db().write().await?;
        let mut plan: MealPlan = Kernel::load_for(&mut tx, session, plan_id, Action::Create).await?;
        if !plan.is_awaiting_votes() {
            return Err(LarderError::conflict(format!("meal plan is {}", plan.status), MealPlan::KIND));
        }
        if plan.voting_closed(now) {
            let changes = self.finalize_in(&mut tx, &mut plan, None).await?;
            tx.commit().await?;
            self.kernel.changes().publish_all(changes);
            return Err(LarderError::conflict("voting for this meal plan has closed", MealPlan::KIND));
        }

        let event = Kernel::load_child_for::<MealPlan, MealPlanEvent>(&mut tx, session, plan_id, event_id, Action::Read).await?;
        let option_ids: Vec<String> = Self::options_in(&mut tx, event_id).await?.into_iter().map(|o| o.id).collect();
        let entries: Vec<RankedVote> = ballot
            .votes
            .iter()
            .map(|vote| RankedVote {
                option_id: vote.meal_plan_option_id.clone(),
                rank: vote.rank,
                abstain: vote.abstain,
            })
            .collect();
        tally::check_ballot(&option_ids, &entries)?;

        let mut changes = Vec::new();
        let previous: Vec<MealPlanOptionVote> = records::list_all(
            &mut tx,
            &[(Column::LeftId, event_id.to_string()), (Column::UserId, session.user_id.to_string())],
        )
        .await?;
        for mut vote in previous {
            changes.push(self.kernel.archive_in(&mut tx, actor, &mut vote).await?);
        }

        let mut votes = Vec::with_capacity(ballot.votes.len());
        for input in ballot.votes {
            let vote = MealPlanOptionVote {
                id: new_record_id(),
                belongs_to_meal_plan_option: input.meal_plan_option_id,
                belongs_to_meal_plan_event: event.id.clone(),
                belongs_to_meal_plan: plan.id.clone(),
                belongs_to_household: plan.belongs_to_household.clone(),
                by_user: session.user_id.clone(),
                rank: input.rank,
                abstain: input.abstain,
                notes: input.notes,
                timestamps: Timestamps::created(now),
            };
            changes.push(self.kernel.insert_in(&mut tx, actor, &vote).await?);
            votes.push(vote);
        }

        if self.everyone_voted_in(&mut tx, &plan).await? {
            changes.extend(self.finalize_in(&mut tx, &mut plan, actor).await?);
        }
        tx.commit().await?;

        self.kernel.changes().publish_all(changes);
        Ok(BallotReceipt { votes, meal_plan_status: plan.status })
    }

    pub async fn list_votes(
        &self,
        session: &SessionContext,
        plan_id: &str,
        event_id: &str,
        query: PageQuery,
    ) -> Result<Page<MealPlanOptionVote>> {
        let mut conn = self.kernel.db().read().await?;
        Self::load_event(&mut conn, session, plan_id, event_id, Action::Read).await?;
        let votes = Self::votes_in(&mut conn, event_id).await?;
        Ok(Page::from_all(votes, &query))
    }

    /// Whether every current member has a ballot for every event with options.
    async fn everyone_voted_in(&self, conn: &mut SqliteConnection, plan: &MealPlan) -> Result<bool> {
        let members = HouseholdService::members_in(conn, &plan.belongs_to_household).await?;
        for event in Self::events_in(conn, &plan.id).await? {
            if Self::options_in(conn, &event.id).await?.is_empty() {
                continue;
            }
            let voters: HashSet<UserId> =
                Self::votes_in(conn, &event.id).await?.into_iter().map(|vote| vote.by_user).collect();
            if members.iter().any(|member| !voters.contains(&member.belongs_to_user)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Finalization
    // ---------------------------------------------------------------------

    /// Tally every event, fix the chosen options and derive tasks and grocery
    /// lines. A no-op for plans no longer awaiting votes.
    pub async fn finalize_in(
        &self,
        conn: &mut SqliteConnection,
        plan: &mut MealPlan,
        actor: Option<&UserId>,
    ) -> Result<Vec<ChangeEvent>> {
        if !plan.is_awaiting_votes() {
            return Ok(Vec::new());
        }

        let now = self.kernel.now();
        let mut changes = Vec::new();
        let mut chosen = Vec::new();
        let mut failed_events = 0usize;

        for mut event in Self::events_in(conn, &plan.id).await? {
            let mut options = Self::options_in(conn, &event.id).await?;
            if options.is_empty() {
                continue;
            }
            let option_ids: Vec<String> = options.iter().map(|o| o.id.clone()).collect();
            let votes: Vec<RankedVote> = Self::votes_in(conn, &event.id)
                .await?
                .into_iter()
                .map(|vote| RankedVote {
                    option_id: vote.belongs_to_meal_plan_option,
                    rank: vote.rank,
                    abstain: vote.abstain,
                })
                .collect();

            match tally::decide(&option_ids, &votes) {
                Some(decision) => {
                    if let Some(option) = options.iter_mut().find(|o| o.id == decision.winner) {
                        option.chosen = true;
                        option.tiebroken = decision.tiebroken;
                        changes.push(self.kernel.transition_in(conn, actor, option, "Chosen").await?);
                        chosen.push(option.clone());
                    }
                    event.outcome = Some(EventOutcome::Decided);
                }
                None => {
                    warn!(meal_plan_id = %plan.id, event_id = %event.id, "no votes cast for meal plan event");
                    event.outcome = Some(EventOutcome::NoVotes);
                    failed_events += 1;
                }
            }
            changes.push(self.kernel.transition_in(conn, actor, &mut event, UPDATED).await?);
        }

        plan.status = if failed_events == 0 { MealPlanStatus::Finalized } else { MealPlanStatus::Failed };
        plan.finalized_at = Some(now);
        let verb = if failed_events == 0 { "Finalized" } else { "Failed" };
        changes.push(self.kernel.transition_in(conn, actor, plan, verb).await?);
        changes.extend(self.derive_in(conn, plan, &chosen, actor).await?);

        for member in HouseholdService::members_in(conn, &plan.belongs_to_household).await? {
            changes.push(
                self.notifications
                    .notify_in(conn, &member.belongs_to_user, format!("Meal plan {} is {}", plan.id, plan.status))
                    .await?,
            );
        }

        metrics::record_meal_plan_finalized(plan.status.as_str());
        info!(meal_plan_id = %plan.id, status = %plan.status, chosen = chosen.len(), "meal plan finalized");
        Ok(changes)
    }

    /// Materialise prep tasks and the grocery list of the chosen options.
    async fn derive_in(
        &self,
        conn: &mut SqliteConnection,
        plan: &MealPlan,
        chosen: &[MealPlanOption],
        actor: Option<&UserId>,
    ) -> Result<Vec<ChangeEvent>> {
        let now = self.kernel.now();
        let mut changes = Vec::new();
        let mut needs = Vec::new();

        for option in chosen {
            let Some(meal) = records::fetch_live::<Meal>(conn, &option.meal_id).await? else {
                warn!(meal_id = %option.meal_id, "chosen meal was archived before finalization");
                continue;
            };
            for component in &meal.components {
                for prep_task in RecipeService::prep_tasks_in(conn, &component.recipe_id).await? {
                    let task = MealPlanTask::new(option, &prep_task, now);
                    changes.push(self.kernel.insert_in(conn, actor, &task).await?);
                }
                for step in RecipeService::steps_in(conn, &component.recipe_id).await? {
                    for ingredient in step.ingredients {
                        if ingredient.recipe_step_product_id.is_some() {
                            continue;
                        }
                        let Some(ingredient_id) = ingredient.ingredient_id else {
                            continue;
                        };
                        needs.push(IngredientNeed {
                            ingredient_id,
                            measurement_unit_id: ingredient.measurement_unit_id,
                            minimum_quantity: ingredient.minimum_quantity * component.recipe_scale,
                            maximum_quantity: ingredient.maximum_quantity.map(|max| max * component.recipe_scale),
                        });
                    }
                }
            }
        }

        let conversions: Vec<ValidMeasurementUnitConversion> = records::list_all(conn, &[]).await?;
        for need in grocery::aggregate(&needs, &conversions) {
            let item = MealPlanGroceryListItem::new(plan, need, now);
            changes.push(self.kernel.insert_in(conn, actor, &item).await?);
        }
        Ok(changes)
    }

    // ---------------------------------------------------------------------
    // Tasks and grocery list
    // ---------------------------------------------------------------------

    pub async fn list_tasks(&self, session: &SessionContext, plan_id: &str, query: PageQuery) -> Result<Page<MealPlanTask>> {
        self.kernel.list_children::<MealPlan, MealPlanTask>(session, plan_id, query).await
    }

    pub async fn get_task(&self, session: &SessionContext, plan_id: &str, task_id: &str) -> Result<MealPlanTask> {
        self.kernel.get_child::<MealPlan, MealPlanTask>(session, plan_id, task_id).await
    }

    /// Update a task's status or assignee; assignees must be household members.
    pub async fn update_task(
        &self,
        session: &SessionContext,
        plan_id: &str,
        task_id: &str,
        patch: MealPlanTaskUpdateInput,
    ) -> Result<MealPlanTask> {
        patch.validate()?;
        let mut tx = self.kernel.db().write().await?;
        let mut task: MealPlanTask =
            Kernel::load_child_for::<MealPlan, MealPlanTask>(&mut tx, session, plan_id, task_id, Action::Update).await?;
        if let Some(assignee) = &patch.assigned_to_user {
            if HouseholdService::membership_in(&mut tx, &task.belongs_to_household, assignee).await?.is_none() {
                return Err(LarderError::validation_field(
                    "tasks can only be assigned to household members",
                    "assignedToUser",
                ));
            }
        }
        task.apply_update(patch, self.kernel.now());
        let change = self.kernel.update_in(&mut tx, Some(&session.user_id), &mut task).await?;
        tx.commit().await?;

        self.kernel.changes().publish(change);
        Ok(task)
    }

    pub async fn list_grocery_items(
        &self,
        session: &SessionContext,
        plan_id: &str,
        query: PageQuery,
    ) -> Result<Page<MealPlanGroceryListItem>> {
        self.kernel.list_children::<MealPlan, MealPlanGroceryListItem>(session, plan_id, query).await
    }

    pub async fn get_grocery_item(
        &self,
        session: &SessionContext,
        plan_id: &str,
        item_id: &str,
    ) -> Result<MealPlanGroceryListItem> {
        self.kernel.get_child::<MealPlan, MealPlanGroceryListItem>(session, plan_id, item_id).await
    }

    pub async fn update_grocery_item(
        &self,
        session: &SessionContext,
        plan_id: &str,
        item_id: &str,
        patch: MealPlanGroceryListItemUpdateInput,
    ) -> Result<MealPlanGroceryListItem> {
        self.kernel.update_child::<MealPlan, MealPlanGroceryListItem>(session, plan_id, item_id, patch).await
    }
}
