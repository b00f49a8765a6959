//! Household-authored recipes with ordered steps, prep tasks and ratings,
//! plus the meals that bundle them.

pub mod meals;
pub mod models;
pub mod prep_tasks;
pub mod ratings;
pub mod service;

pub use meals::{Meal, MealComponent, MealComponentType, MealService};
pub use models::{Recipe, RecipeStep, RecipeStepIngredient, RecipeView};
pub use prep_tasks::RecipePrepTask;
pub use ratings::RecipeRating;
pub use service::RecipeService;
