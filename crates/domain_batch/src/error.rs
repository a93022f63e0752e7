//! Batch domain errors

use thiserror::Error;

use core_kernel::{BatchId, ClaimId};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch {batch_id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        batch_id: BatchId,
        from: String,
        to: String,
    },

    #[error("Batch {0} has no claims")]
    EmptyBatch(BatchId),

    #[error("Claim {claim_id} is already in batch {batch_id}")]
    DuplicateClaim {
        batch_id: BatchId,
        claim_id: ClaimId,
    },

    #[error("Claim {claim_id} is not in batch {batch_id}")]
    ClaimNotInBatch {
        batch_id: BatchId,
        claim_id: ClaimId,
    },
}
