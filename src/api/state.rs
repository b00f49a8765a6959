//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::auth::{ApiClientService, SessionService, TokenService, UserService};
use crate::catalog::CatalogService;
use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::errors::Result;
use crate::households::{HouseholdService, InvitationService};
use crate::kernel::{ChangeFeed, Kernel};
use crate::meal_plans::MealPlanService;
use crate::notifications::{EmailDispatcher, NotificationService};
use crate::recipes::{MealService, RecipeService};
use crate::service_settings::ServiceSettingService;
use crate::storage::Database;
use crate::user_ingredient_preferences::UserIngredientPreferenceService;
use crate::webhooks::WebhookService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub kernel: Kernel,
    pub sessions: SessionService,
    pub users: UserService,
    pub api_clients: ApiClientService,
    pub households: HouseholdService,
    pub invitations: InvitationService,
    pub notifications: NotificationService,
    pub catalog: CatalogService,
    pub recipes: RecipeService,
    pub meals: MealService,
    pub meal_plans: MealPlanService,
    pub settings: ServiceSettingService,
    pub preferences: UserIngredientPreferenceService,
    pub webhooks: WebhookService,
}

impl AppState {
    /// Wire every service over one database, clock and change feed.
    pub fn new(
        config: AppConfig,
        db: Database,
        clock: SharedClock,
        email: Arc<dyn EmailDispatcher>,
    ) -> Result<Self> {
        let kernel = Kernel::new(db, clock, ChangeFeed::default());
        let tokens = TokenService::from_config(&config.auth)?;

        let sessions = SessionService::new(kernel.clone(), tokens, config.auth.clone());
        let notifications = NotificationService::new(kernel.clone());
        let households = HouseholdService::new(kernel.clone());
        let invitations = InvitationService::new(
            kernel.clone(),
            households.clone(),
            notifications.clone(),
            email,
            config.auth.invitation_lifetime(),
        );
        let users = UserService::new(kernel.clone(), households.clone(), invitations.clone(), config.auth.clone());
        let api_clients = ApiClientService::new(kernel.clone(), sessions.clone());

        Ok(Self {
            sessions,
            users,
            api_clients,
            households,
            invitations,
            catalog: CatalogService::new(kernel.clone()),
            recipes: RecipeService::new(kernel.clone()),
            meals: MealService::new(kernel.clone()),
            meal_plans: MealPlanService::new(kernel.clone(), notifications.clone()),
            settings: ServiceSettingService::new(kernel.clone()),
            preferences: UserIngredientPreferenceService::new(kernel.clone()),
            webhooks: WebhookService::new(kernel.clone()),
            notifications,
            kernel,
            config: Arc::new(config),
        })
    }
}
