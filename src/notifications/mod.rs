//! User notifications and the outbound email seam.
//!
//! Notifications are created only by privileged system paths (invitation
//! arrival, meal plan finalization). Owners may read them and mark them read.

pub mod email;
pub mod models;
pub mod service;

pub use email::{EmailDispatcher, LoggingEmailDispatcher, MemoryEmailDispatcher, OutboundEmail};
pub use models::{NotificationStatus, UserNotification, UserNotificationUpdateInput};
pub use service::NotificationService;
