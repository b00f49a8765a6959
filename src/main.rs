use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use larder::{
    api::start_api_server,
    auth::{spawn_cleanup, CleanupService},
    clock::SystemClock,
    meal_plans::spawn_finalizer,
    notifications::LoggingEmailDispatcher,
    observability::{init_observability, log_config_info},
    storage::{create_pool, list_applied_migrations, run_migrations, Database},
    webhooks::{spawn_webhook_worker, WebhookDispatcher},
    AppConfig, AppState, Result, APP_NAME, VERSION,
};

#[derive(Parser)]
#[command(name = "larder", version, about = "Recipe and meal-planning API server")]
struct Cli {
    /// Configuration file (defaults to ./larder.toml when present)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists; must happen before configuration is read
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let config = AppConfig::load_from(cli.config.as_deref())?;
    init_observability(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting Larder");
    log_config_info(&config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(config).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let pool = create_pool(&config.database).await?;
    let db = Database::new(pool);

    let finalizer_interval = config.meal_plans.finalizer_interval();
    let state = AppState::new(config, db.clone(), Arc::new(SystemClock), Arc::new(LoggingEmailDispatcher))?;

    let finalizer = spawn_finalizer(state.meal_plans.clone(), finalizer_interval);
    let cleanup = spawn_cleanup(
        CleanupService::new(state.sessions.clone(), state.invitations.clone()),
        larder::auth::cleanup::CLEANUP_INTERVAL,
    );
    let webhooks = spawn_webhook_worker(WebhookDispatcher::new(db)?, state.kernel.changes());

    let result = start_api_server(state).await;

    finalizer.abort();
    cleanup.abort();
    webhooks.abort();
    result
}

async fn migrate(config: AppConfig) -> Result<()> {
    let database = larder::storage::DatabaseConfig { auto_migrate: false, ..config.database };
    let pool = create_pool(&database).await?;
    run_migrations(&pool).await?;

    for migration in list_applied_migrations(&pool).await? {
        info!(version = migration.version, description = %migration.description, "migration applied");
    }
    info!("Migration completed successfully");
    Ok(())
}
