//! Engine error taxonomy
//!
//! The engine folds the domain errors into one surface so callers can map
//! each class to a user-facing message: validation failures, illegal
//! transitions, lock contention, gateway failures and missing entities.

use thiserror::Error;

use core_kernel::{ActorId, GatewayError, LockContention};
use domain_batch::BatchError;
use domain_claims::ClaimError;
use domain_coverage::CoverageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Coverage(#[from] CoverageError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Another transition is in flight for this resource")]
    ConcurrencyConflict(#[from] LockContention),

    #[error("Insurer gateway failure: {0}")]
    ExternalGateway(#[from] GatewayError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Actor {actor_id} is not permitted to {action}")]
    PermissionDenied { actor_id: ActorId, action: String },
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }
}
