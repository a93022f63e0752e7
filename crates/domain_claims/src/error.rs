//! Claims domain errors

use thiserror::Error;

use core_kernel::{ClaimId, ClaimItemId};

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim {claim_id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        claim_id: ClaimId,
        from: String,
        to: String,
    },

    #[error("Claim {0} has no line items")]
    EmptyClaim(ClaimId),

    #[error("Claim {claim_id}: no verdict recorded for item {item_id}")]
    MissingVerdict {
        claim_id: ClaimId,
        item_id: ClaimItemId,
    },

    #[error("Claim {claim_id}: verdict references unknown item {item_id}")]
    UnknownItem {
        claim_id: ClaimId,
        item_id: ClaimItemId,
    },

    #[error("Claim {claim_id}: rejection of item {item_id} requires a reason")]
    MissingRejectionReason {
        claim_id: ClaimId,
        item_id: ClaimItemId,
    },

    #[error("Claim {0} can only be deleted while in draft")]
    NotDeletable(ClaimId),
}
