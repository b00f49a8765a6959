//! Meal plan records: plans, their events and options, votes, and the tasks and
//! grocery lines derived on finalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::authorization::Owner;
use crate::auth::models::SessionContext;
use crate::domain::{new_record_id, HouseholdId, Timestamps, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{patch_field, Patchable, Reference, Resource, Scope};
use crate::recipes::{Meal, RecipePrepTask};
use crate::storage::{Document, RecordIndex};

crate::string_enum! {
    pub enum MealPlanStatus {
        AwaitingVotes => "awaitingVotes",
        Finalized => "finalized",
        Failed => "failed",
    }
}

crate::string_enum! {
    pub enum MealName {
        Breakfast => "breakfast",
        SecondBreakfast => "second_breakfast",
        Brunch => "brunch",
        Lunch => "lunch",
        Supper => "supper",
        Dinner => "dinner",
    }
}

crate::string_enum! {
    /// Per-event result of finalization.
    pub enum EventOutcome {
        Decided => "decided",
        NoVotes => "noVotes",
    }
}

crate::string_enum! {
    pub enum MealPlanTaskStatus {
        Unfinished => "unfinished",
        Finished => "finished",
        Canceled => "canceled",
    }
}

crate::string_enum! {
    pub enum GroceryListItemStatus {
        Unknown => "unknown",
        AlreadyOwned => "already owned",
        Needs => "needs",
        Unavailable => "unavailable",
        Acquired => "acquired",
    }
}

/// Implements `Document` and `Resource` for a household-owned meal plan record.
macro_rules! household_record {
    ($ty:ty, $kind:literal, |$rec:ident| $index:expr $(, refs: |$r:ident| $refs:expr)?) => {
        impl Document for $ty {
            const KIND: &'static str = $kind;

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
                let $rec = self;
                $index
            }
        }

        impl Resource for $ty {
            const NOUN: &'static str = $kind;
            const SCOPE: Scope = Scope::Household;

            fn owner(&self) -> Owner {
                Owner::Household(self.belongs_to_household.clone())
            }

            $(
                fn references(&self) -> Vec<Reference> {
                    let $r = self;
                    $refs
                }
            )?
        }
    };
}

fn check_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<()> {
    if ends_at <= starts_at {
        return Err(LarderError::validation_field("endsAt must be after startsAt", "endsAt"));
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Plans
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: String,
    pub notes: String,
    pub status: MealPlanStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_by_user: UserId,
    pub belongs_to_household: HouseholdId,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(MealPlan, "mealPlan", |plan| RecordIndex {
    household_id: Some(plan.belongs_to_household.to_string()),
    user_id: Some(plan.created_by_user.to_string()),
    due_at: plan.is_awaiting_votes().then_some(plan.voting_deadline),
    ..Default::default()
});

impl MealPlan {
    pub fn is_awaiting_votes(&self) -> bool {
        self.status == MealPlanStatus::AwaitingVotes
    }

    pub fn voting_closed(&self, now: DateTime<Utc>) -> bool {
        now >= self.voting_deadline
    }

    /// Structural edits are only allowed while votes are still being collected.
    pub fn ensure_open(&self) -> Result<()> {
        if !self.is_awaiting_votes() {
            return Err(LarderError::conflict(
                format!("meal plan is {}", self.status),
                Self::KIND,
            ));
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        check_window(self.starts_at, self.ends_at)?;
        if self.voting_deadline > self.starts_at {
            return Err(LarderError::validation_field(
                "votingDeadline must not be after startsAt",
                "votingDeadline",
            ));
        }
        Ok(())
    }

    /// An event must fit inside the plan's window.
    pub fn check_event(&self, event: &MealPlanEvent) -> Result<()> {
        check_window(event.starts_at, event.ends_at)?;
        if event.starts_at < self.starts_at || event.ends_at > self.ends_at {
            return Err(LarderError::validation_field(
                "events must fall within the meal plan's window",
                "startsAt",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOptionCreationInput {
    #[serde(rename = "mealID")]
    #[validate(length(min = 1, message = "mealID is required"))]
    pub meal_id: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEventCreationInput {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub meal_name: MealName,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<MealPlanOptionCreationInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanCreationInput {
    #[serde(default)]
    pub notes: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub voting_deadline: DateTime<Utc>,
    #[serde(default)]
    #[validate(nested)]
    pub events: Vec<MealPlanEventCreationInput>,
}

impl MealPlan {
    pub fn new(input: &MealPlanCreationInput, session: &SessionContext, household: HouseholdId, now: DateTime<Utc>) -> Result<Self> {
        if input.voting_deadline <= now {
            return Err(LarderError::validation_field("votingDeadline must be in the future", "votingDeadline"));
        }
        let plan = Self {
            id: new_record_id(),
            notes: input.notes.clone(),
            status: MealPlanStatus::AwaitingVotes,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            voting_deadline: input.voting_deadline,
            finalized_at: None,
            created_by_user: session.user_id.clone(),
            belongs_to_household: household,
            timestamps: Timestamps::created(now),
        };
        plan.check()?;
        Ok(plan)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanUpdateInput {
    pub notes: Option<String>,
    pub voting_deadline: Option<DateTime<Utc>>,
}

impl Patchable for MealPlan {
    type Patch = MealPlanUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        self.ensure_open()?;
        patch_field(&mut self.notes, patch.notes);
        patch_field(&mut self.voting_deadline, patch.voting_deadline);
        self.check()
    }
}

// -------------------------------------------------------------------------
// Events and options
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEvent {
    pub id: String,
    pub belongs_to_meal_plan: String,
    pub belongs_to_household: HouseholdId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub meal_name: MealName,
    pub notes: String,
    pub outcome: Option<EventOutcome>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(MealPlanEvent, "mealPlanEvent", |event| RecordIndex {
    household_id: Some(event.belongs_to_household.to_string()),
    parent_id: Some(event.belongs_to_meal_plan.clone()),
    ..Default::default()
});

impl MealPlanEvent {
    pub fn new(input: &MealPlanEventCreationInput, plan: &MealPlan, now: DateTime<Utc>) -> Result<Self> {
        let event = Self {
            id: new_record_id(),
            belongs_to_meal_plan: plan.id.clone(),
            belongs_to_household: plan.belongs_to_household.clone(),
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            meal_name: input.meal_name,
            notes: input.notes.clone(),
            outcome: None,
            timestamps: Timestamps::created(now),
        };
        plan.check_event(&event)?;
        Ok(event)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEventUpdateInput {
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub meal_name: Option<MealName>,
    pub notes: Option<String>,
}

impl Patchable for MealPlanEvent {
    type Patch = MealPlanEventUpdateInput;

    /// Window checks against the plan happen in the service.
    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.starts_at, patch.starts_at);
        patch_field(&mut self.ends_at, patch.ends_at);
        patch_field(&mut self.meal_name, patch.meal_name);
        patch_field(&mut self.notes, patch.notes);
        check_window(self.starts_at, self.ends_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOption {
    pub id: String,
    pub belongs_to_meal_plan_event: String,
    pub belongs_to_meal_plan: String,
    pub belongs_to_household: HouseholdId,
    #[serde(rename = "mealID")]
    pub meal_id: String,
    pub notes: String,
    pub chosen: bool,
    /// Set when the option won on a tie-break rather than outright.
    pub tiebroken: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(
    MealPlanOption,
    "mealPlanOption",
    |option| RecordIndex {
        household_id: Some(option.belongs_to_household.to_string()),
        parent_id: Some(option.belongs_to_meal_plan_event.clone()),
        left_id: Some(option.belongs_to_meal_plan.clone()),
        ..Default::default()
    },
    refs: |option| vec![Reference::to::<Meal>(option.meal_id.clone(), "mealID")]
);

impl MealPlanOption {
    pub fn new(input: &MealPlanOptionCreationInput, event: &MealPlanEvent, now: DateTime<Utc>) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_meal_plan_event: event.id.clone(),
            belongs_to_meal_plan: event.belongs_to_meal_plan.clone(),
            belongs_to_household: event.belongs_to_household.clone(),
            meal_id: input.meal_id.clone(),
            notes: input.notes.clone(),
            chosen: false,
            tiebroken: false,
            timestamps: Timestamps::created(now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOptionUpdateInput {
    #[serde(rename = "mealID")]
    #[validate(length(min = 1, message = "mealID cannot be empty"))]
    pub meal_id: Option<String>,
    pub notes: Option<String>,
}

impl Patchable for MealPlanOption {
    type Patch = MealPlanOptionUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.meal_id, patch.meal_id);
        patch_field(&mut self.notes, patch.notes);
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Votes
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOptionVote {
    pub id: String,
    pub belongs_to_meal_plan_option: String,
    pub belongs_to_meal_plan_event: String,
    pub belongs_to_meal_plan: String,
    pub belongs_to_household: HouseholdId,
    pub by_user: UserId,
    pub rank: u32,
    pub abstain: bool,
    pub notes: String,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(MealPlanOptionVote, "mealPlanOptionVote", |vote| RecordIndex {
    household_id: Some(vote.belongs_to_household.to_string()),
    user_id: Some(vote.by_user.to_string()),
    parent_id: Some(vote.belongs_to_meal_plan_option.clone()),
    left_id: Some(vote.belongs_to_meal_plan_event.clone()),
    right_id: Some(vote.belongs_to_meal_plan.clone()),
    unique_key: Some(format!("{}:{}", vote.belongs_to_meal_plan_option, vote.by_user)),
    ..Default::default()
});

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanOptionVoteInput {
    #[serde(rename = "mealPlanOptionID")]
    #[validate(length(min = 1, message = "mealPlanOptionID is required"))]
    pub meal_plan_option_id: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub abstain: bool,
    #[serde(default)]
    pub notes: String,
}

/// One voter's complete ranking for one event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanBallotInput {
    #[validate(length(min = 1, message = "a ballot needs at least one vote"), nested)]
    pub votes: Vec<MealPlanOptionVoteInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotReceipt {
    pub votes: Vec<MealPlanOptionVote>,
    pub meal_plan_status: MealPlanStatus,
}

// -------------------------------------------------------------------------
// Derived records
// -------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanTask {
    pub id: String,
    pub belongs_to_meal_plan: String,
    pub belongs_to_household: HouseholdId,
    #[serde(rename = "mealPlanOptionID")]
    pub meal_plan_option_id: String,
    #[serde(rename = "recipePrepTaskID")]
    pub recipe_prep_task_id: String,
    pub status: MealPlanTaskStatus,
    pub status_explanation: String,
    pub assigned_to_user: Option<UserId>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(
    MealPlanTask,
    "mealPlanTask",
    |task| RecordIndex {
        household_id: Some(task.belongs_to_household.to_string()),
        user_id: task.assigned_to_user.as_ref().map(ToString::to_string),
        parent_id: Some(task.belongs_to_meal_plan.clone()),
        ..Default::default()
    },
    refs: |task| vec![Reference::to::<RecipePrepTask>(task.recipe_prep_task_id.clone(), "recipePrepTaskID")]
);

impl MealPlanTask {
    pub fn new(option: &MealPlanOption, prep_task: &RecipePrepTask, now: DateTime<Utc>) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_meal_plan: option.belongs_to_meal_plan.clone(),
            belongs_to_household: option.belongs_to_household.clone(),
            meal_plan_option_id: option.id.clone(),
            recipe_prep_task_id: prep_task.id.clone(),
            status: MealPlanTaskStatus::Unfinished,
            status_explanation: String::new(),
            assigned_to_user: None,
            completed_at: None,
            timestamps: Timestamps::created(now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanTaskUpdateInput {
    pub status: Option<MealPlanTaskStatus>,
    pub status_explanation: Option<String>,
    /// Membership of the assignee is checked by the service.
    pub assigned_to_user: Option<UserId>,
}

impl MealPlanTask {
    pub fn apply_update(&mut self, patch: MealPlanTaskUpdateInput, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.completed_at = (status == MealPlanTaskStatus::Finished).then_some(now);
            self.status = status;
        }
        patch_field(&mut self.status_explanation, patch.status_explanation);
        if patch.assigned_to_user.is_some() {
            self.assigned_to_user = patch.assigned_to_user;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanGroceryListItem {
    pub id: String,
    pub belongs_to_meal_plan: String,
    pub belongs_to_household: HouseholdId,
    #[serde(rename = "ingredientID")]
    pub ingredient_id: String,
    #[serde(rename = "measurementUnitID")]
    pub measurement_unit_id: String,
    pub minimum_quantity_needed: f64,
    pub maximum_quantity_needed: Option<f64>,
    pub status: GroceryListItemStatus,
    pub status_explanation: String,
    #[serde(rename = "purchasedMeasurementUnitID")]
    pub purchased_measurement_unit_id: Option<String>,
    #[serde(rename = "purchasedUPC")]
    pub purchased_upc: Option<String>,
    pub purchase_price: Option<f64>,
    pub quantity_purchased: Option<f64>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

household_record!(MealPlanGroceryListItem, "mealPlanGroceryListItem", |item| RecordIndex {
    household_id: Some(item.belongs_to_household.to_string()),
    parent_id: Some(item.belongs_to_meal_plan.clone()),
    ..Default::default()
});

impl MealPlanGroceryListItem {
    pub fn new(plan: &MealPlan, need: super::grocery::IngredientNeed, now: DateTime<Utc>) -> Self {
        Self {
            id: new_record_id(),
            belongs_to_meal_plan: plan.id.clone(),
            belongs_to_household: plan.belongs_to_household.clone(),
            ingredient_id: need.ingredient_id,
            measurement_unit_id: need.measurement_unit_id,
            minimum_quantity_needed: need.minimum_quantity,
            maximum_quantity_needed: need.maximum_quantity,
            status: GroceryListItemStatus::Unknown,
            status_explanation: String::new(),
            purchased_measurement_unit_id: None,
            purchased_upc: None,
            purchase_price: None,
            quantity_purchased: None,
            timestamps: Timestamps::created(now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanGroceryListItemUpdateInput {
    pub status: Option<GroceryListItemStatus>,
    pub status_explanation: Option<String>,
    #[serde(rename = "purchasedMeasurementUnitID")]
    pub purchased_measurement_unit_id: Option<String>,
    #[serde(rename = "purchasedUPC")]
    pub purchased_upc: Option<String>,
    #[validate(range(min = 0.0, message = "purchasePrice cannot be negative"))]
    pub purchase_price: Option<f64>,
    #[validate(range(min = 0.0, message = "quantityPurchased cannot be negative"))]
    pub quantity_purchased: Option<f64>,
}

impl Patchable for MealPlanGroceryListItem {
    type Patch = MealPlanGroceryListItemUpdateInput;

    fn apply_patch(&mut self, patch: Self::Patch, _session: &SessionContext) -> Result<()> {
        patch_field(&mut self.status, patch.status);
        patch_field(&mut self.status_explanation, patch.status_explanation);
        if patch.purchased_measurement_unit_id.is_some() {
            self.purchased_measurement_unit_id = patch.purchased_measurement_unit_id;
        }
        if patch.purchased_upc.is_some() {
            self.purchased_upc = patch.purchased_upc;
        }
        if patch.purchase_price.is_some() {
            self.purchase_price = patch.purchase_price;
        }
        if patch.quantity_purchased.is_some() {
            self.quantity_purchased = patch.quantity_purchased;
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Views
// -------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanEventView {
    #[serde(flatten)]
    pub event: MealPlanEvent,
    pub options: Vec<MealPlanOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanView {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub events: Vec<MealPlanEventView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationResult {
    pub finalized: bool,
    pub status: MealPlanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::fixtures::session;
    use crate::auth::models::HouseholdRole;
    use chrono::Duration;

    fn plan_input(now: DateTime<Utc>) -> MealPlanCreationInput {
        serde_json::from_value(serde_json::json!({
            "notes": "week one",
            "startsAt": now + Duration::days(2),
            "endsAt": now + Duration::days(9),
            "votingDeadline": now + Duration::days(1),
            "events": [{
                "startsAt": now + Duration::days(2),
                "endsAt": now + Duration::days(2) + Duration::hours(2),
                "mealName": "dinner",
                "options": [{ "mealID": "m1" }]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn plans_index_their_deadline_only_while_voting() {
        let now = Utc::now();
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);
        let mut plan = MealPlan::new(&plan_input(now), &member, HouseholdId::from("h1"), now).unwrap();
        assert_eq!(plan.index().due_at, Some(plan.voting_deadline));

        plan.status = MealPlanStatus::Finalized;
        assert_eq!(plan.index().due_at, None);
        assert!(plan.ensure_open().is_err());
    }

    #[test]
    fn plan_windows_are_validated() {
        let now = Utc::now();
        let member = session("u1", "h1", HouseholdRole::HouseholdMember);

        let mut late_deadline = plan_input(now);
        late_deadline.voting_deadline = now + Duration::days(3);
        assert!(MealPlan::new(&late_deadline, &member, HouseholdId::from("h1"), now).is_err());

        let mut past_deadline = plan_input(now);
        past_deadline.voting_deadline = now - Duration::minutes(1);
        assert!(MealPlan::new(&past_deadline, &member, HouseholdId::from("h1"), now).is_err());

        let input = plan_input(now);
        let plan = MealPlan::new(&input, &member, HouseholdId::from("h1"), now).unwrap();
        let event = MealPlanEvent::new(&input.events[0], &plan, now).unwrap();
        assert_eq!(event.meal_name, MealName::Dinner);

        let mut outside = input.events[0].clone();
        outside.ends_at = now + Duration::days(10);
        assert!(MealPlanEvent::new(&outside, &plan, now).is_err());
    }

    #[test]
    fn finishing_a_task_stamps_completion() {
        let now = Utc::now();
        let mut task = MealPlanTask {
            id: "t1".into(),
            belongs_to_meal_plan: "p1".into(),
            belongs_to_household: HouseholdId::from("h1"),
            meal_plan_option_id: "o1".into(),
            recipe_prep_task_id: "rp1".into(),
            status: MealPlanTaskStatus::Unfinished,
            status_explanation: String::new(),
            assigned_to_user: None,
            completed_at: None,
            timestamps: Timestamps::created(now),
        };
        task.apply_update(
            MealPlanTaskUpdateInput { status: Some(MealPlanTaskStatus::Finished), ..Default::default() },
            now,
        );
        assert_eq!(task.completed_at, Some(now));
        assert_eq!(task.index().user_id, None);
    }
}
