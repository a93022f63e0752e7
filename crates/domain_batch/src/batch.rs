//! Claim batch aggregate
//!
//! Vetted claims are grouped into monthly batches for submission to the
//! insurer. A batch is assembled in draft, finalized (totals locked),
//! submitted, and completed once every entry has an insurer outcome. A
//! failed gateway handoff reverts the batch to finalized so it can be
//! retried without rebuilding it.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{BatchId, ClaimId, Money, PlanId};

use crate::error::BatchError;

/// Batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Claims may still be added or removed
    Draft,
    /// Contents and totals locked, ready to send
    Finalized,
    /// Handed to the insurer, awaiting per-claim outcomes
    Submitted,
    /// Every entry has an outcome
    Completed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Finalized => "finalized",
            BatchStatus::Submitted => "submitted",
            BatchStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Insurer outcome for one claim in a submitted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EntryOutcome {
    Approved { amount: Money },
    Rejected { reason: String },
    Paid { amount: Money },
}

/// One claim's slot in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub claim_id: ClaimId,
    /// The claim's vetted approved amount at the time it joined the batch
    pub claim_amount: Money,
    pub outcome: Option<EntryOutcome>,
}

impl BatchEntry {
    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }
}

/// A monthly submission batch for one plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimBatch {
    pub id: BatchId,
    /// e.g. `BATCH-202506-0007`
    pub batch_number: String,
    pub plan_id: PlanId,
    pub status: BatchStatus,
    pub entries: Vec<BatchEntry>,
    /// Sum of entry amounts; recomputed at finalization
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ClaimBatch {
    pub fn new(plan_id: PlanId, batch_number: String, now: DateTime<Utc>) -> Self {
        Self {
            id: BatchId::new_v7(),
            batch_number,
            plan_id,
            status: BatchStatus::Draft,
            entries: Vec::new(),
            total_amount: Money::zero(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
            submitted_at: None,
        }
    }

    /// Adds a vetted claim to a draft batch
    pub fn add_claim(
        &mut self,
        claim_id: ClaimId,
        claim_amount: Money,
        now: DateTime<Utc>,
    ) -> Result<(), BatchError> {
        self.require_status(BatchStatus::Draft, "add claim")?;
        if self.entries.iter().any(|e| e.claim_id == claim_id) {
            return Err(BatchError::DuplicateClaim {
                batch_id: self.id,
                claim_id,
            });
        }
        self.entries.push(BatchEntry {
            claim_id,
            claim_amount,
            outcome: None,
        });
        self.recompute_total();
        self.updated_at = now;
        Ok(())
    }

    /// Removes a claim from a draft batch
    pub fn remove_claim(
        &mut self,
        claim_id: ClaimId,
        now: DateTime<Utc>,
    ) -> Result<(), BatchError> {
        self.require_status(BatchStatus::Draft, "remove claim")?;
        let before = self.entries.len();
        self.entries.retain(|e| e.claim_id != claim_id);
        if self.entries.len() == before {
            return Err(BatchError::ClaimNotInBatch {
                batch_id: self.id,
                claim_id,
            });
        }
        self.recompute_total();
        self.updated_at = now;
        Ok(())
    }

    /// Locks contents and totals
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<(), BatchError> {
        if self.entries.is_empty() {
            return Err(BatchError::EmptyBatch(self.id));
        }
        self.transition(BatchStatus::Finalized, now)?;
        self.recompute_total();
        self.finalized_at = Some(now);
        Ok(())
    }

    /// Marks the batch handed to the insurer
    pub fn mark_submitted(&mut self, now: DateTime<Utc>) -> Result<(), BatchError> {
        self.transition(BatchStatus::Submitted, now)?;
        self.submitted_at = Some(now);
        Ok(())
    }

    /// Undoes a submission that never reached the insurer
    pub fn revert_to_finalized(&mut self, now: DateTime<Utc>) -> Result<(), BatchError> {
        self.require_status(BatchStatus::Submitted, "revert")?;
        self.status = BatchStatus::Finalized;
        self.submitted_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Reopens a finalized or submitted batch for editing; the caller is
    /// responsible for releasing member claims back to vetted
    pub fn revert_to_draft(&mut self, now: DateTime<Utc>) -> Result<(), BatchError> {
        if !matches!(self.status, BatchStatus::Finalized | BatchStatus::Submitted) {
            return Err(BatchError::InvalidTransition {
                batch_id: self.id,
                from: self.status.to_string(),
                to: BatchStatus::Draft.to_string(),
            });
        }
        self.status = BatchStatus::Draft;
        self.finalized_at = None;
        self.submitted_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Records the insurer's outcome for one claim; the batch completes
    /// when no entry remains pending
    pub fn record_entry_outcome(
        &mut self,
        claim_id: ClaimId,
        outcome: EntryOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), BatchError> {
        self.require_status(BatchStatus::Submitted, "record outcome")?;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.claim_id == claim_id)
            .ok_or(BatchError::ClaimNotInBatch {
                batch_id: self.id,
                claim_id,
            })?;
        entry.outcome = Some(outcome);
        self.updated_at = now;

        if self.entries.iter().all(|e| !e.is_pending()) {
            self.transition(BatchStatus::Completed, now)?;
        }
        Ok(())
    }

    pub fn claim_ids(&self) -> impl Iterator<Item = ClaimId> + '_ {
        self.entries.iter().map(|e| e.claim_id)
    }

    pub fn contains(&self, claim_id: ClaimId) -> bool {
        self.entries.iter().any(|e| e.claim_id == claim_id)
    }

    /// True once the batch can no longer hold a claim exclusively
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, BatchStatus::Completed)
    }

    fn recompute_total(&mut self) {
        self.total_amount = self.entries.iter().map(|e| e.claim_amount).sum();
    }

    fn require_status(&self, expected: BatchStatus, action: &str) -> Result<(), BatchError> {
        if self.status != expected {
            return Err(BatchError::InvalidTransition {
                batch_id: self.id,
                from: self.status.to_string(),
                to: format!("{expected} ({action})"),
            });
        }
        Ok(())
    }

    fn transition(&mut self, target: BatchStatus, now: DateTime<Utc>) -> Result<(), BatchError> {
        use BatchStatus::*;
        let allowed = matches!(
            (self.status, target),
            (Draft, Finalized) | (Finalized, Submitted) | (Submitted, Completed)
        );
        if !allowed {
            return Err(BatchError::InvalidTransition {
                batch_id: self.id,
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }
}

/// Formats a batch number for the month of `at` with a monthly sequence
pub fn format_batch_number(at: DateTime<Utc>, sequence: u32) -> String {
    format!("BATCH-{:04}{:02}-{:04}", at.year(), at.month(), sequence)
}
