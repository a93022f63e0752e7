//! Insurance claim aggregate
//!
//! A claim collects the covered line items of one encounter and walks them
//! through vetting, submission to the insurer, and settlement. Every status
//! change goes through a guarded transition; callers supply the timestamp so
//! the aggregate stays clock-free.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{
    ActorId, ClaimId, ClaimItemId, EncounterId, Money, PatientInsuranceId, PlanId,
};

use crate::error::ClaimError;
use crate::line_item::{ClaimLineItem, ItemVerdict};
use crate::response::ClaimResponse;

/// Claim lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Being assembled; items may still be added or removed
    Draft,
    /// Awaiting the vetting desk
    PendingVetting,
    /// Vetted; per-item verdicts recorded
    Vetted,
    /// Sent to the insurer (usually via a batch)
    Submitted,
    /// Accepted by the insurer
    Approved,
    /// Rejected at vetting or by the insurer; may be resubmitted
    Rejected,
    /// Settled
    Paid,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::PendingVetting => "pending_vetting",
            ClaimStatus::Vetted => "vetted",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// A claim against a patient's insurance plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceClaim {
    pub id: ClaimId,
    /// Insurer-facing reference, e.g. printed on the claim form
    pub claim_check_code: String,
    pub encounter_id: EncounterId,
    pub patient_insurance_id: PatientInsuranceId,
    pub plan_id: PlanId,
    pub status: ClaimStatus,
    pub items: Vec<ClaimLineItem>,
    /// Sum of line subtotals
    pub total_amount: Money,
    /// Sum of insurer shares across all items
    pub claimed_amount: Money,
    /// Sum of insurer shares across approved items; set at vetting
    pub approved_amount: Option<Money>,
    /// Patient's share after vetting: total minus approved
    pub patient_copay_amount: Money,
    pub rejection_reason: Option<String>,
    pub vetted_by: Option<ActorId>,
    pub vetted_at: Option<DateTime<Utc>>,
    pub submitted_by: Option<ActorId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// How many times this claim went back to draft after rejection
    pub resubmission_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsuranceClaim {
    pub fn new(
        encounter_id: EncounterId,
        patient_insurance_id: PatientInsuranceId,
        plan_id: PlanId,
        claim_check_code: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = ClaimId::new_v7();
        let claim_check_code =
            claim_check_code.unwrap_or_else(|| generate_check_code(id));

        Self {
            id,
            claim_check_code,
            encounter_id,
            patient_insurance_id,
            plan_id,
            status: ClaimStatus::Draft,
            items: Vec::new(),
            total_amount: Money::zero(),
            claimed_amount: Money::zero(),
            approved_amount: None,
            patient_copay_amount: Money::zero(),
            rejection_reason: None,
            vetted_by: None,
            vetted_at: None,
            submitted_by: None,
            submitted_at: None,
            responded_at: None,
            paid_at: None,
            resubmission_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds a line item; draft claims only
    pub fn add_item(
        &mut self,
        item: ClaimLineItem,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Draft, "add item")?;
        self.items.push(item);
        self.recompute_totals();
        self.updated_at = now;
        Ok(())
    }

    /// Removes a line item; draft claims only
    pub fn remove_item(
        &mut self,
        item_id: ClaimItemId,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Draft, "remove item")?;
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before {
            return Err(ClaimError::UnknownItem {
                claim_id: self.id,
                item_id,
            });
        }
        self.recompute_totals();
        self.updated_at = now;
        Ok(())
    }

    /// Hands the claim to the vetting desk
    pub fn submit_for_vetting(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if self.items.is_empty() {
            return Err(ClaimError::EmptyClaim(self.id));
        }
        self.transition(ClaimStatus::PendingVetting, now)
    }

    /// Records per-item verdicts. Every item must receive a verdict and every
    /// rejection must carry a reason. The approved amount becomes the sum of
    /// the approved items' insurer shares; a claim whose items were all
    /// rejected goes straight to rejected.
    pub fn vet(
        &mut self,
        verdicts: HashMap<ClaimItemId, ItemVerdict>,
        vetted_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::PendingVetting, "vet")?;

        for item_id in verdicts.keys() {
            if !self.items.iter().any(|i| i.id == *item_id) {
                return Err(ClaimError::UnknownItem {
                    claim_id: self.id,
                    item_id: *item_id,
                });
            }
        }
        for item in &self.items {
            match verdicts.get(&item.id) {
                None => {
                    return Err(ClaimError::MissingVerdict {
                        claim_id: self.id,
                        item_id: item.id,
                    })
                }
                Some(ItemVerdict::Rejected { reason }) if reason.trim().is_empty() => {
                    return Err(ClaimError::MissingRejectionReason {
                        claim_id: self.id,
                        item_id: item.id,
                    })
                }
                Some(_) => {}
            }
        }

        for item in &mut self.items {
            // Presence checked above
            if let Some(verdict) = verdicts.get(&item.id) {
                item.verdict = Some(verdict.clone());
            }
        }

        self.recompute_approved();
        self.vetted_by = Some(vetted_by);
        self.vetted_at = Some(now);

        if self.items.iter().any(ClaimLineItem::is_approved) {
            self.transition(ClaimStatus::Vetted, now)
        } else {
            self.rejection_reason = Some("All items rejected during vetting".to_string());
            self.transition(ClaimStatus::Rejected, now)
        }
    }

    /// Marks the claim as sent to the insurer
    pub fn submit_to_insurer(
        &mut self,
        submitted_by: ActorId,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.transition(ClaimStatus::Submitted, now)?;
        self.submitted_by = Some(submitted_by);
        self.submitted_at = Some(now);
        Ok(())
    }

    /// Applies the insurer's adjudication
    pub fn record_response(
        &mut self,
        response: ClaimResponse,
        now: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Submitted, "record response")?;
        self.responded_at = Some(now);

        match response {
            ClaimResponse::Approved { approved_amount } => {
                if let Some(amount) = approved_amount {
                    self.approved_amount = Some(amount);
                }
                self.transition(ClaimStatus::Approved, now)
            }
            ClaimResponse::PartiallyApproved { accepted_items } => {
                for item in &mut self.items {
                    if !accepted_items.contains(&item.id) {
                        item.verdict = Some(ItemVerdict::Rejected {
                            reason: "Rejected by insurer".to_string(),
                        });
                    }
                }
                self.recompute_approved();
                if self.items.iter().any(ClaimLineItem::is_approved) {
                    self.transition(ClaimStatus::Approved, now)
                } else {
                    self.rejection_reason = Some("All items rejected by insurer".to_string());
                    self.transition(ClaimStatus::Rejected, now)
                }
            }
            ClaimResponse::Rejected { reason } => {
                self.rejection_reason = Some(reason);
                self.transition(ClaimStatus::Rejected, now)
            }
            ClaimResponse::Paid => {
                self.paid_at = Some(now);
                self.transition(ClaimStatus::Paid, now)
            }
        }
    }

    /// Undoes a submission that never reached the insurer; the vetting
    /// verdicts are kept
    pub fn revert_to_vetted(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Submitted, "revert to vetted")?;
        self.status = ClaimStatus::Vetted;
        self.submitted_by = None;
        self.submitted_at = None;
        self.updated_at = now;
        Ok(())
    }

    /// Rejects the claim outright; allowed from any state except paid
    pub fn reject(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.transition(ClaimStatus::Rejected, now)?;
        self.rejection_reason = Some(reason.into());
        Ok(())
    }

    /// Records settlement of an approved claim
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Approved, "mark paid")?;
        self.paid_at = Some(now);
        self.transition(ClaimStatus::Paid, now)
    }

    /// Returns a rejected claim to draft for correction. Verdicts and the
    /// vetting/submission stamps are cleared; the items themselves are kept.
    pub fn resubmit(&mut self, now: DateTime<Utc>) -> Result<(), ClaimError> {
        self.require_status(ClaimStatus::Rejected, "resubmit")?;
        for item in &mut self.items {
            item.verdict = None;
        }
        self.approved_amount = None;
        self.patient_copay_amount = Money::zero();
        self.rejection_reason = None;
        self.vetted_by = None;
        self.vetted_at = None;
        self.submitted_by = None;
        self.submitted_at = None;
        self.responded_at = None;
        self.resubmission_count += 1;
        self.transition(ClaimStatus::Draft, now)
    }

    /// Only drafts may be deleted
    pub fn ensure_deletable(&self) -> Result<(), ClaimError> {
        if self.status != ClaimStatus::Draft {
            return Err(ClaimError::NotDeletable(self.id));
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ClaimStatus::Paid)
    }

    fn recompute_totals(&mut self) {
        self.total_amount = self.items.iter().map(|i| i.subtotal).sum();
        self.claimed_amount = self.items.iter().map(|i| i.insurance_amount).sum();
    }

    /// Approved amount from the approved subset; the rest of the total
    /// becomes the patient's share
    fn recompute_approved(&mut self) {
        let approved: Money = self
            .items
            .iter()
            .filter(|i| i.is_approved())
            .map(|i| i.insurance_amount)
            .sum();
        self.approved_amount = Some(approved);
        self.patient_copay_amount = self.total_amount - approved;
    }

    fn require_status(&self, expected: ClaimStatus, action: &str) -> Result<(), ClaimError> {
        if self.status != expected {
            return Err(ClaimError::InvalidTransition {
                claim_id: self.id,
                from: self.status.to_string(),
                to: format!("{expected} ({action})"),
            });
        }
        Ok(())
    }

    fn transition(&mut self, target: ClaimStatus, now: DateTime<Utc>) -> Result<(), ClaimError> {
        if !self.can_transition_to(target) {
            return Err(ClaimError::InvalidTransition {
                claim_id: self.id,
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    fn can_transition_to(&self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;
        // Any state short of paid can be rejected outright
        if target == Rejected {
            return !matches!(self.status, Paid | Rejected);
        }
        matches!(
            (self.status, target),
            (Draft, PendingVetting)
                | (PendingVetting, Vetted)
                | (Vetted, Submitted)
                | (Submitted, Approved)
                | (Submitted, Paid)
                | (Approved, Paid)
                | (Rejected, Draft)
        )
    }
}

fn generate_check_code(id: ClaimId) -> String {
    let hex = id.as_uuid().simple().to_string();
    format!("CC-{}", hex[..10].to_uppercase())
}
