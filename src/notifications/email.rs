//! Outbound email seam.
//!
//! Delivery itself is an external collaborator; the service only hands
//! messages to an [`EmailDispatcher`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::errors::{LarderError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEmail {
    pub to_address: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailDispatcher: Send + Sync + std::fmt::Debug {
    async fn send(&self, email: OutboundEmail) -> Result<()>;
}

/// Writes each message to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LoggingEmailDispatcher;

#[async_trait]
impl EmailDispatcher for LoggingEmailDispatcher {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        info!(to = %email.to_address, subject = %email.subject, "email dispatched");
        Ok(())
    }
}

/// Keeps messages in memory; used by local tooling and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryEmailDispatcher {
    outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl MemoryEmailDispatcher {
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().map(|outbox| outbox.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailDispatcher for MemoryEmailDispatcher {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        self.outbox
            .lock()
            .map_err(|_| LarderError::internal("email outbox lock poisoned"))?
            .push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_dispatcher_records_messages() {
        let dispatcher = MemoryEmailDispatcher::default();
        dispatcher
            .send(OutboundEmail {
                to_address: "bob@example.com".to_string(),
                to_name: "Bob".to_string(),
                subject: "You're invited".to_string(),
                body: "join us".to_string(),
            })
            .await
            .unwrap();

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_address, "bob@example.com");
    }
}
