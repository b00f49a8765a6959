//! Meal plans: events with candidate meals, ranked household voting, and the
//! tasks and grocery list derived once a plan is finalized.

pub mod finalizer;
pub mod grocery;
pub mod models;
pub mod service;
pub mod tally;

pub use finalizer::spawn_finalizer;
pub use models::{
    MealPlan, MealPlanEvent, MealPlanGroceryListItem, MealPlanOption, MealPlanOptionVote, MealPlanStatus, MealPlanTask,
};
pub use service::MealPlanService;
