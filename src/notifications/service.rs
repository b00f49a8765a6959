use sqlx::SqliteConnection;
use tracing::instrument;

use super::models::{UserNotification, UserNotificationUpdateInput};
use crate::auth::models::SessionContext;
use crate::domain::{Page, PageQuery, UserId};
use crate::errors::{LarderError, Result};
use crate::kernel::{ChangeEvent, Kernel};

#[derive(Debug, Clone)]
pub struct NotificationService {
    kernel: Kernel,
}

impl NotificationService {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    /// Privileged system path: notify `user_id` inside the caller's transaction.
    pub async fn notify_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: &UserId,
        content: impl Into<String>,
    ) -> Result<ChangeEvent> {
        let notification = UserNotification::new(user_id.clone(), content, self.kernel.now());
        self.kernel.insert_in(conn, None, &notification).await
    }

    /// Clients never create notifications.
    pub fn create_from_client(&self, _session: &SessionContext) -> Result<UserNotification> {
        Err(LarderError::forbidden("user notifications are created by the system"))
    }

    pub async fn list(&self, session: &SessionContext, query: PageQuery) -> Result<Page<UserNotification>> {
        self.kernel.list(session, query).await
    }

    pub async fn get(&self, session: &SessionContext, id: &str) -> Result<UserNotification> {
        self.kernel.get(session, id).await
    }

    #[instrument(skip(self, session, patch), fields(notification_id = %id))]
    pub async fn update(
        &self,
        session: &SessionContext,
        id: &str,
        patch: UserNotificationUpdateInput,
    ) -> Result<UserNotification> {
        self.kernel.update(session, id, patch).await
    }
}
