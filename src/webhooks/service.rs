use tracing::instrument;

use super::models::{Webhook, WebhookCreationInput, WebhookUpdateInput};
use crate::auth::models::SessionContext;
use crate::domain::{Page, PageQuery};
use crate::errors::Result;
use crate::kernel::Kernel;

/// Household webhooks; visible only inside the owning household.
#[derive(Debug, Clone)]
pub struct WebhookService {
    kernel: Kernel,
}

impl WebhookService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    #[instrument(skip(self, session, input), fields(user_id = %session.user_id))]
    pub async fn create(&self, session: &SessionContext, input: WebhookCreationInput) -> Result<Webhook> {
        self.kernel.create::<Webhook>(session, input).await
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<Webhook> {
        self.kernel.get(session, id).await
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<Webhook>> {
        self.kernel.list(session, query).await
    }

    pub async fn update(&self, session: &SessionContext, id: &str, patch: WebhookUpdateInput) -> Result<Webhook> {
        self.kernel.update::<Webhook>(session, id, patch).await
    }

    #[instrument(skip(self, session), fields(webhook_id = %id))]
    pub async fn archive(&self, session: &SessionContext, id: &str) -> Result<Webhook> {
        self.kernel.archive::<Webhook>(session, id).await
    }
}
