//! Background sweep that finalizes plans whose voting deadline has passed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::MealPlanService;

/// Run [`MealPlanService::finalize_due`] every `interval` until the runtime
/// shuts down.
pub fn spawn_finalizer(service: MealPlanService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_seconds = interval.as_secs(), "meal plan finalizer started");

        loop {
            ticker.tick().await;
            match service.finalize_due().await {
                Ok(0) => debug!("no meal plans past their voting deadline"),
                Ok(count) => info!(count, "finalized meal plans past their voting deadline"),
                Err(e) => error!(error = %e, "meal plan finalizer sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::clock::SystemClock;
    use crate::kernel::{ChangeFeed, Kernel};
    use crate::notifications::NotificationService;
    use crate::storage::{create_pool, Database, DatabaseConfig};

    #[traced_test]
    #[tokio::test]
    async fn finalizer_sweeps_on_every_tick() {
        let config = DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() };
        let db = Database::new(create_pool(&config).await.unwrap());
        let kernel = Kernel::new(db, Arc::new(SystemClock), ChangeFeed::default());
        let service = MealPlanService::new(kernel.clone(), NotificationService::new(kernel));

        let handle = spawn_finalizer(service, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.abort();

        assert!(logs_contain("meal plan finalizer started"));
        assert!(logs_contain("no meal plans past their voting deadline"));
    }
}
