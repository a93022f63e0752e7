//! Claims domain
//!
//! Line items frozen from coverage resolution, the claim lifecycle state
//! machine (draft through vetting, submission, and settlement), and the
//! builder that turns billable charges into claim lines.

pub mod builder;
pub mod claim;
pub mod error;
pub mod line_item;
pub mod response;

pub use builder::{BillableItem, BillableKind, ClaimItemBuilder};
pub use claim::{ClaimStatus, InsuranceClaim};
pub use error::ClaimError;
pub use line_item::{ClaimLineItem, ItemVerdict};
pub use response::ClaimResponse;
