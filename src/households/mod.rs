//! # Households
//!
//! Tenancy boundary of the service: households, memberships with roles,
//! ownership transfer, backup households and the invitation lifecycle.

pub mod invitation_service;
pub mod invitations;
pub mod models;
pub mod service;

pub use invitation_service::InvitationService;
pub use invitations::{HouseholdInvitation, InvitationStatus};
pub use models::{Household, HouseholdMembership, HouseholdView, MemberView};
pub use service::HouseholdService;
