//! Batch domain
//!
//! Monthly insurer submission batches: assembly, finalization, submission,
//! and per-claim outcome tracking.

pub mod batch;
pub mod error;

pub use batch::{format_batch_number, BatchEntry, BatchStatus, ClaimBatch, EntryOutcome};
pub use error::BatchError;
