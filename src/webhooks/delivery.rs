//! Outbound delivery of committed data changes to household webhooks.

use std::time::Duration;

use reqwest::{header::CONTENT_TYPE, Client, Method};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::models::{Webhook, WebhookMethod};
use crate::errors::{LarderError, Result};
use crate::kernel::{ChangeEvent, ChangeFeed};
use crate::observability::metrics;
use crate::storage::{records, Column, Database, Document};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers change events to the webhooks of the household they belong to.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    db: Database,
    client: Client,
    retry_delay: Duration,
}

impl WebhookDispatcher {
    pub fn new(db: Database) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LarderError::internal(format!("failed to build webhook client: {e}")))?;
        Ok(Self { db, client, retry_delay: Duration::from_millis(RETRY_DELAY_MS) })
    }

    /// Override the base retry delay (tests use zero).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Live webhooks that want `event`.
    pub async fn subscribers(&self, event: &ChangeEvent) -> Result<Vec<Webhook>> {
        let Some(household_id) = &event.household_id else {
            return Ok(Vec::new());
        };
        let mut conn = self.db.read().await?;
        let hooks: Vec<Webhook> =
            records::list_all(&mut conn, &[(Column::HouseholdId, household_id.to_string())]).await?;
        Ok(hooks.into_iter().filter(|hook| hook.should_receive(event)).collect())
    }

    /// Deliver to every subscriber. Returns the number of successful deliveries.
    pub async fn dispatch(&self, event: &ChangeEvent) -> Result<usize> {
        let hooks = self.subscribers(event).await?;
        let mut delivered = 0;
        for hook in &hooks {
            if self.deliver(hook, event).await {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn deliver(&self, hook: &Webhook, event: &ChangeEvent) -> bool {
        for attempt in 1..=MAX_RETRIES {
            match self.send(hook, event).await {
                Ok(()) => {
                    info!(
                        webhook_id = %hook.id,
                        event_type = %event.event_type,
                        attempt,
                        "webhook delivered"
                    );
                    metrics::record_webhook_delivery(true);
                    return true;
                }
                Err(e) => {
                    warn!(
                        webhook_id = %hook.id,
                        event_type = %event.event_type,
                        attempt,
                        max_retries = MAX_RETRIES,
                        error = %e,
                        "webhook delivery failed"
                    );
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(self.retry_delay * attempt).await;
                    }
                }
            }
        }

        error!(
            webhook_id = %hook.id,
            url = %hook.url,
            event_type = %event.event_type,
            "webhook delivery exhausted all retries"
        );
        metrics::record_webhook_delivery(false);
        false
    }

    async fn send(&self, hook: &Webhook, event: &ChangeEvent) -> Result<()> {
        let method = match hook.method {
            WebhookMethod::Post => Method::POST,
            WebhookMethod::Put => Method::PUT,
            WebhookMethod::Patch => Method::PATCH,
        };
        let body = serde_json::to_vec(event)?;

        let response = self
            .client
            .request(method, &hook.url)
            .header(CONTENT_TYPE, &hook.content_type)
            .header("X-Larder-Event", &event.event_type)
            .body(body)
            .send()
            .await
            .map_err(|e| LarderError::internal(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LarderError::internal(format!("webhook endpoint returned {status}")));
        }
        Ok(())
    }
}

/// Consume the change feed until it closes.
pub fn spawn_webhook_worker(dispatcher: WebhookDispatcher, feed: &ChangeFeed) -> JoinHandle<()> {
    let mut receiver = feed.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    // Webhook edits are not themselves delivered.
                    if event.resource_kind == Webhook::KIND {
                        continue;
                    }
                    match dispatcher.dispatch(&event).await {
                        Ok(0) => {}
                        Ok(delivered) => debug!(event_type = %event.event_type, delivered, "change event dispatched"),
                        Err(e) => error!(error = %e, event_type = %event.event_type, "failed to dispatch change event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "webhook worker lagged behind the change feed");
                }
                Err(RecvError::Closed) => {
                    info!("change feed closed, webhook worker stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::domain::{HouseholdId, Timestamps, UserId};
    use crate::storage::create_pool;

    async fn memory_database() -> Database {
        let config = DatabaseConfig { url: "sqlite::memory:".to_string(), ..Default::default() };
        Database::new(create_pool(&config).await.unwrap())
    }

    fn hook(id: &str, household: &str, events: &[&str]) -> Webhook {
        Webhook {
            id: id.into(),
            name: id.into(),
            // Nothing listens on port 9 locally.
            url: "http://127.0.0.1:9/hook".into(),
            method: WebhookMethod::Post,
            content_type: "application/json".into(),
            events: events.iter().map(|e| e.to_string()).collect(),
            created_by_user: UserId::from("u1"),
            belongs_to_household: HouseholdId::from(household),
            timestamps: Timestamps::created(Utc::now()),
        }
    }

    fn event(household: Option<&str>, event_type: &str) -> ChangeEvent {
        ChangeEvent {
            event_type: event_type.into(),
            resource_kind: "recipe".into(),
            resource_id: "r1".into(),
            household_id: household.map(HouseholdId::from),
            user_id: None,
            data: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_are_the_households_live_matching_hooks() {
        let db = memory_database().await;
        {
            let mut tx = db.write().await.unwrap();
            records::insert(&mut tx, &hook("w1", "h1", &[])).await.unwrap();
            records::insert(&mut tx, &hook("w2", "h1", &["mealPlanFinalized"])).await.unwrap();
            records::insert(&mut tx, &hook("w3", "h2", &[])).await.unwrap();
            tx.commit().await.unwrap();
        }
        let dispatcher = WebhookDispatcher::new(db).unwrap();

        let ids = |hooks: Vec<Webhook>| hooks.into_iter().map(|h| h.id).collect::<Vec<_>>();
        assert_eq!(ids(dispatcher.subscribers(&event(Some("h1"), "recipeCreated")).await.unwrap()), vec!["w1"]);
        assert_eq!(
            ids(dispatcher.subscribers(&event(Some("h1"), "mealPlanFinalized")).await.unwrap()),
            vec!["w1", "w2"]
        );
        assert!(dispatcher.subscribers(&event(None, "userCreated")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoints_count_as_failed_deliveries() {
        let db = memory_database().await;
        {
            let mut tx = db.write().await.unwrap();
            records::insert(&mut tx, &hook("w1", "h1", &[])).await.unwrap();
            tx.commit().await.unwrap();
        }
        let dispatcher = WebhookDispatcher::new(db).unwrap().with_retry_delay(Duration::ZERO);
        assert_eq!(dispatcher.dispatch(&event(Some("h1"), "recipeCreated")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deliveries_carry_the_event_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Larder-Event", "recipeCreated"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let db = memory_database().await;
        {
            let mut webhook = hook("w1", "h1", &[]);
            webhook.url = format!("{}/hook", server.uri());
            let mut tx = db.write().await.unwrap();
            records::insert(&mut tx, &webhook).await.unwrap();
            tx.commit().await.unwrap();
        }
        let dispatcher = WebhookDispatcher::new(db).unwrap();
        assert_eq!(dispatcher.dispatch(&event(Some("h1"), "recipeCreated")).await.unwrap(), 1);
    }
}
