//! Insurer adjudication responses

use serde::{Deserialize, Serialize};

use core_kernel::{ClaimItemId, Money};

/// What the insurer said about a submitted claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum ClaimResponse {
    /// Accepted; an explicit amount overrides the vetted approved amount
    Approved { approved_amount: Option<Money> },
    /// Some items accepted; the rest are marked rejected on the claim
    PartiallyApproved { accepted_items: Vec<ClaimItemId> },
    Rejected { reason: String },
    /// Settled directly, skipping a separate approval notice
    Paid,
}
