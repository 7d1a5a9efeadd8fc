//! Board invites: issuing, matching, accepting, and the membership
//! reconciler that keeps stored roles aligned with board ownership.

mod acceptance;
pub mod clock;
pub mod error;
mod issuance;
mod matcher;
mod membership;
pub mod model;
pub mod notifier;
mod service;

pub use acceptance::InvitePreview;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::InviteError;
pub use issuance::{Delivery, IssuedInvite};
pub use membership::{MembershipChange, Reconciled};
pub use model::Invite;
pub use notifier::{DeliveryError, DisabledNotifier, Email, HttpEmailNotifier, MemoryNotifier, Notifier};
pub use service::{InviteService, InviteSettings};
