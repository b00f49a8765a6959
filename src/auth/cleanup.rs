//! Background maintenance: expired sessions and lapsed invitations.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::auth::SessionService;
use crate::errors::Result;
use crate::households::InvitationService;

/// How often [`spawn_cleanup`] runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct CleanupService {
    sessions: SessionService,
    invitations: InvitationService,
}

/// What one pass removed or transitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub sessions_purged: u64,
    pub invitations_expired: usize,
}

impl CleanupService {
    pub fn new(sessions: SessionService, invitations: InvitationService) -> Self {
        Self { sessions, invitations }
    }

    /// Purge dead sessions and expire pending invitations past `expiresAt`.
    pub async fn run_once(&self) -> Result<CleanupReport> {
        let sessions_purged = self.sessions.purge_expired().await?;
        let invitations_expired = self.invitations.sweep().await?;
        Ok(CleanupReport { sessions_purged, invitations_expired })
    }
}

pub fn spawn_cleanup(service: CleanupService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.run_once().await {
                Ok(report) if report == CleanupReport::default() => debug!("nothing to clean up"),
                Ok(report) => info!(
                    sessions_purged = report.sessions_purged,
                    invitations_expired = report.invitations_expired,
                    "cleanup pass completed"
                ),
                Err(e) => error!(error = %e, "cleanup pass failed"),
            }
        }
    })
}
