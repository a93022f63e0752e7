//! Claims engine
//!
//! The single entry point the hospital backend talks to. It owns the rule
//! store and the claim/batch registries, wires in the collaborator ports
//! (plan registry, pricing catalog, permission gate, insurer gateway, audit
//! sink) and serializes state transitions per claim/batch id.
//!
//! Every accepted mutation is audited with before/after snapshots. The only
//! async operation is `submit_batch`, which awaits the insurer gateway after
//! the local transition has committed and compensates by reverting when the
//! gateway fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{info, warn};

use core_kernel::{
    ActorId, AuditEvent, AuditSink, BatchId, BatchSubmission, BillableId, ClaimId, ClaimItemId,
    ClaimSubmission, Clock, EncounterId, GatewayError, GatewayReceipt, InsurerGateway, LockMap,
    Money, PatientInsuranceId, PermissionGate, PlanId, PlanRegistry, PricingCatalog, RuleId,
    ServiceCategory,
};
use domain_batch::{format_batch_number, ClaimBatch, EntryOutcome};
use domain_claims::{
    BillableItem, BillableKind, ClaimItemBuilder, ClaimLineItem, ClaimResponse, ClaimStatus,
    InsuranceClaim, ItemVerdict,
};
use domain_coverage::{
    CoverageOutcome, CoverageResolver, CoverageRule, CoverageRuleStore, RuleHistoryEntry,
};

use crate::error::EngineError;

/// Collaborators the engine is wired with
pub struct EngineConfig {
    pub clock: Arc<dyn Clock>,
    pub plans: Arc<dyn PlanRegistry>,
    pub pricing: Arc<dyn PricingCatalog>,
    pub permissions: Arc<dyn PermissionGate>,
    pub gateway: Arc<dyn InsurerGateway>,
    pub audit: Arc<dyn AuditSink>,
}

/// A billable charge as received from the billing layer; prices missing
/// from the record are filled from the pricing catalog
#[derive(Debug, Clone)]
pub struct ChargeInput {
    pub billable_id: BillableId,
    pub kind: BillableKind,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub item_code: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Money>,
    pub item_date: NaiveDate,
}

pub struct ClaimsEngine {
    rules: Mutex<CoverageRuleStore>,
    claims: Mutex<HashMap<ClaimId, InsuranceClaim>>,
    batches: Mutex<HashMap<BatchId, ClaimBatch>>,
    /// Which open batch each claim belongs to
    batch_index: Mutex<HashMap<ClaimId, BatchId>>,
    /// Monthly batch-number sequences, keyed by (year, month)
    batch_sequences: Mutex<HashMap<(i32, u32), u32>>,
    claim_locks: LockMap<ClaimId>,
    batch_locks: LockMap<BatchId>,
    clock: Arc<dyn Clock>,
    plans: Arc<dyn PlanRegistry>,
    pricing: Arc<dyn PricingCatalog>,
    permissions: Arc<dyn PermissionGate>,
    gateway: Arc<dyn InsurerGateway>,
    audit: Arc<dyn AuditSink>,
}

fn guarded<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ClaimsEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            rules: Mutex::new(CoverageRuleStore::new()),
            claims: Mutex::new(HashMap::new()),
            batches: Mutex::new(HashMap::new()),
            batch_index: Mutex::new(HashMap::new()),
            batch_sequences: Mutex::new(HashMap::new()),
            claim_locks: LockMap::new(),
            batch_locks: LockMap::new(),
            clock: config.clock,
            plans: config.plans,
            pricing: config.pricing,
            permissions: config.permissions,
            gateway: config.gateway,
            audit: config.audit,
        }
    }

    // ----- coverage rules -----

    pub fn add_coverage_rule(
        &self,
        rule: CoverageRule,
        actor: ActorId,
    ) -> Result<RuleId, EngineError> {
        let now = self.clock.now();
        let snapshot = serde_json::to_value(&rule).unwrap_or_default();
        let id = guarded(&self.rules).add_rule(rule, Some(actor), now)?;

        info!(rule_id = %id, "coverage rule created");
        self.audit.record(AuditEvent::new(
            "coverage_rule.created",
            Some(actor),
            serde_json::Value::Null,
            snapshot,
            now,
        ));
        Ok(id)
    }

    pub fn update_coverage_rule(
        &self,
        rule_id: RuleId,
        mutate: impl FnOnce(&mut CoverageRule),
        actor: ActorId,
    ) -> Result<u32, EngineError> {
        let now = self.clock.now();
        let mut rules = guarded(&self.rules);
        let before = rules
            .get(rule_id)
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .unwrap_or_default();
        let version = rules.update_rule(rule_id, mutate, Some(actor), now)?;
        let after = rules
            .get(rule_id)
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .unwrap_or_default();
        drop(rules);

        info!(rule_id = %rule_id, version, "coverage rule updated");
        self.audit.record(AuditEvent::new(
            "coverage_rule.updated",
            Some(actor),
            before,
            after,
            now,
        ));
        Ok(version)
    }

    pub fn deactivate_coverage_rule(
        &self,
        rule_id: RuleId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();
        let mut rules = guarded(&self.rules);
        let before = rules
            .get(rule_id)
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .unwrap_or_default();
        rules.deactivate_rule(rule_id, Some(actor), now)?;
        let after = rules
            .get(rule_id)
            .map(|r| serde_json::to_value(r).unwrap_or_default())
            .unwrap_or_default();
        drop(rules);

        info!(rule_id = %rule_id, "coverage rule deactivated");
        self.audit.record(AuditEvent::new(
            "coverage_rule.deactivated",
            Some(actor),
            before,
            after,
            now,
        ));
        Ok(())
    }

    pub fn coverage_rule(&self, rule_id: RuleId) -> Option<CoverageRule> {
        guarded(&self.rules).get(rule_id).cloned()
    }

    pub fn rule_history(&self, rule_id: RuleId) -> Vec<RuleHistoryEntry> {
        guarded(&self.rules)
            .history_for(rule_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Resolves the insurer/patient split for one charge under the
    /// patient's active plan, as of today
    pub fn resolve_coverage(
        &self,
        patient_insurance_id: PatientInsuranceId,
        category: &ServiceCategory,
        item_code: Option<&str>,
        unit_price: Money,
        quantity: u32,
    ) -> Result<CoverageOutcome, EngineError> {
        let plan = self
            .plans
            .active_plan(patient_insurance_id)
            .ok_or_else(|| EngineError::not_found("active plan", patient_insurance_id))?;

        let rules = guarded(&self.rules);
        let resolver = CoverageResolver::new(&rules);
        Ok(resolver.resolve_line(
            plan.plan_id,
            category,
            item_code,
            unit_price,
            quantity,
            self.clock.today(),
        ))
    }

    // ----- claims -----

    /// Builds line items for a set of charges without creating a claim;
    /// charges with no applicable rule come back as uncovered self-pay lines
    pub fn build_claim_items(
        &self,
        plan_id: PlanId,
        charges: &[ChargeInput],
    ) -> Result<Vec<ClaimLineItem>, EngineError> {
        let billables = self.price_charges(charges)?;
        let rules = guarded(&self.rules);
        let builder = ClaimItemBuilder::new(CoverageResolver::new(&rules));
        Ok(builder.build(plan_id, &billables, self.clock.today()))
    }

    /// Creates a draft claim for an encounter from its billable charges
    pub fn create_claim(
        &self,
        encounter_id: EncounterId,
        patient_insurance_id: PatientInsuranceId,
        charges: &[ChargeInput],
        claim_check_code: Option<String>,
        actor: ActorId,
    ) -> Result<ClaimId, EngineError> {
        let plan = self
            .plans
            .active_plan(patient_insurance_id)
            .ok_or_else(|| EngineError::not_found("active plan", patient_insurance_id))?;
        let items = self.build_claim_items(plan.plan_id, charges)?;

        let now = self.clock.now();
        let mut claim = InsuranceClaim::new(
            encounter_id,
            patient_insurance_id,
            plan.plan_id,
            claim_check_code,
            now,
        );
        for item in items {
            claim.add_item(item, now)?;
        }

        let claim_id = claim.id;
        let after = serde_json::to_value(&claim).unwrap_or_default();
        guarded(&self.claims).insert(claim_id, claim);

        info!(claim_id = %claim_id, "claim created");
        self.audit.record(AuditEvent::new(
            "claim.created",
            Some(actor),
            serde_json::Value::Null,
            after,
            now,
        ));
        Ok(claim_id)
    }

    pub fn claim(&self, claim_id: ClaimId) -> Result<InsuranceClaim, EngineError> {
        guarded(&self.claims)
            .get(&claim_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("claim", claim_id))
    }

    /// Hard-deletes a draft claim
    pub fn delete_claim(&self, claim_id: ClaimId, actor: ActorId) -> Result<(), EngineError> {
        let _guard = self.claim_locks.acquire(claim_id)?;
        let now = self.clock.now();
        let mut claims = guarded(&self.claims);
        let claim = claims
            .get(&claim_id)
            .ok_or_else(|| EngineError::not_found("claim", claim_id))?;
        claim.ensure_deletable()?;
        let before = serde_json::to_value(claim).unwrap_or_default();
        claims.remove(&claim_id);
        drop(claims);

        info!(claim_id = %claim_id, "claim deleted");
        self.audit.record(AuditEvent::new(
            "claim.deleted",
            Some(actor),
            before,
            serde_json::Value::Null,
            now,
        ));
        Ok(())
    }

    pub fn submit_claim_for_vetting(
        &self,
        claim_id: ClaimId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        self.with_claim(claim_id, actor, "claim.submitted_for_vetting", |claim, now| {
            claim.submit_for_vetting(now)
        })
    }

    pub fn vet_claim(
        &self,
        claim_id: ClaimId,
        verdicts: HashMap<ClaimItemId, ItemVerdict>,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        self.with_claim(claim_id, actor, "claim.vetted", |claim, now| {
            claim.vet(verdicts, actor, now)
        })
    }

    /// Submits a single unbatched claim to the insurer. Claims riding in a
    /// batch are stamped by `submit_batch` instead.
    pub fn submit_claim_to_insurer(
        &self,
        claim_id: ClaimId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        if let Some(batch_id) = guarded(&self.batch_index).get(&claim_id) {
            return Err(EngineError::validation(format!(
                "claim {claim_id} is in open batch {batch_id}; submit the batch instead"
            )));
        }
        self.with_claim(claim_id, actor, "claim.submitted", |claim, now| {
            claim.submit_to_insurer(actor, now)
        })
    }

    pub fn record_claim_response(
        &self,
        claim_id: ClaimId,
        response: ClaimResponse,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        self.with_claim(claim_id, actor, "claim.response_recorded", |claim, now| {
            claim.record_response(response, now)
        })
    }

    pub fn reject_claim(
        &self,
        claim_id: ClaimId,
        reason: String,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        self.with_claim(claim_id, actor, "claim.rejected", |claim, now| {
            claim.reject(reason, now)
        })
    }

    pub fn mark_claim_paid(&self, claim_id: ClaimId, actor: ActorId) -> Result<(), EngineError> {
        self.with_claim(claim_id, actor, "claim.paid", |claim, now| {
            claim.mark_paid(now)
        })
    }

    /// Returns a rejected claim to draft for correction
    pub fn resubmit_claim(&self, claim_id: ClaimId, actor: ActorId) -> Result<(), EngineError> {
        if let Some(batch_id) = guarded(&self.batch_index).get(&claim_id) {
            return Err(EngineError::validation(format!(
                "claim {claim_id} is still in open batch {batch_id}"
            )));
        }
        self.with_claim(claim_id, actor, "claim.resubmitted", |claim, now| {
            claim.resubmit(now)
        })
    }

    // ----- batches -----

    /// Opens a draft batch with the next monthly batch number
    pub fn create_batch(&self, plan_id: PlanId, actor: ActorId) -> Result<BatchId, EngineError> {
        let now = self.clock.now();
        let sequence = {
            let mut sequences = guarded(&self.batch_sequences);
            let counter = sequences.entry((now.year(), now.month())).or_insert(0);
            *counter += 1;
            *counter
        };
        let batch = ClaimBatch::new(plan_id, format_batch_number(now, sequence), now);
        let batch_id = batch.id;
        let after = serde_json::to_value(&batch).unwrap_or_default();
        guarded(&self.batches).insert(batch_id, batch);

        info!(batch_id = %batch_id, "batch created");
        self.audit.record(AuditEvent::new(
            "batch.created",
            Some(actor),
            serde_json::Value::Null,
            after,
            now,
        ));
        Ok(batch_id)
    }

    pub fn batch(&self, batch_id: BatchId) -> Result<ClaimBatch, EngineError> {
        guarded(&self.batches)
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("batch", batch_id))
    }

    /// Adds a vetted, unbatched claim to a draft batch
    pub fn add_claim_to_batch(
        &self,
        batch_id: BatchId,
        claim_id: ClaimId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let _claim_guard = self.claim_locks.acquire(claim_id)?;
        let now = self.clock.now();

        if let Some(existing) = guarded(&self.batch_index).get(&claim_id) {
            return Err(EngineError::validation(format!(
                "claim {claim_id} already belongs to open batch {existing}"
            )));
        }

        let approved = {
            let claims = guarded(&self.claims);
            let claim = claims
                .get(&claim_id)
                .ok_or_else(|| EngineError::not_found("claim", claim_id))?;
            if claim.status != ClaimStatus::Vetted {
                return Err(EngineError::validation(format!(
                    "claim {claim_id} is {} but must be vetted to join a batch",
                    claim.status
                )));
            }
            claim.approved_amount.ok_or_else(|| {
                EngineError::validation(format!("claim {claim_id} has no approved amount"))
            })?
        };

        let mut batches = guarded(&self.batches);
        let batch = batches
            .get_mut(&batch_id)
            .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
        batch.add_claim(claim_id, approved, now)?;
        drop(batches);
        guarded(&self.batch_index).insert(claim_id, batch_id);

        info!(batch_id = %batch_id, claim_id = %claim_id, "claim added to batch");
        self.audit.record(AuditEvent::new(
            "batch.claim_added",
            Some(actor),
            serde_json::Value::Null,
            serde_json::json!({ "batch_id": batch_id, "claim_id": claim_id }),
            now,
        ));
        Ok(())
    }

    pub fn remove_claim_from_batch(
        &self,
        batch_id: BatchId,
        claim_id: ClaimId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let now = self.clock.now();

        let mut batches = guarded(&self.batches);
        let batch = batches
            .get_mut(&batch_id)
            .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
        batch.remove_claim(claim_id, now)?;
        drop(batches);
        guarded(&self.batch_index).remove(&claim_id);

        info!(batch_id = %batch_id, claim_id = %claim_id, "claim removed from batch");
        self.audit.record(AuditEvent::new(
            "batch.claim_removed",
            Some(actor),
            serde_json::json!({ "batch_id": batch_id, "claim_id": claim_id }),
            serde_json::Value::Null,
            now,
        ));
        Ok(())
    }

    /// Locks batch membership and totals. Entry amounts are refreshed from
    /// the member claims' approved amounts, never trusted as stored.
    pub fn finalize_batch(&self, batch_id: BatchId, actor: ActorId) -> Result<(), EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let now = self.clock.now();

        let mut batches = guarded(&self.batches);
        let batch = batches
            .get_mut(&batch_id)
            .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
        let before = serde_json::json!({ "status": batch.status });

        {
            let claims = guarded(&self.claims);
            for entry in &mut batch.entries {
                let claim = claims
                    .get(&entry.claim_id)
                    .ok_or_else(|| EngineError::not_found("claim", entry.claim_id))?;
                entry.claim_amount = claim.approved_amount.unwrap_or_else(Money::zero);
            }
        }
        batch.finalize(now)?;
        let after = serde_json::json!({ "status": batch.status, "total": batch.total_amount });
        drop(batches);

        info!(batch_id = %batch_id, "batch finalized");
        self.audit.record(AuditEvent::new(
            "batch.finalized",
            Some(actor),
            before,
            after,
            now,
        ));
        Ok(())
    }

    /// Submits a finalized batch: stamps the batch and every member claim
    /// atomically, then hands the payload to the insurer gateway. A gateway
    /// failure (or an unaccepted receipt) reverts the batch to finalized and
    /// the claims to vetted before the error is surfaced.
    pub async fn submit_batch(
        &self,
        batch_id: BatchId,
        actor: ActorId,
    ) -> Result<GatewayReceipt, EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let now = self.clock.now();

        let claim_ids: Vec<ClaimId> = {
            let batches = guarded(&self.batches);
            let batch = batches
                .get(&batch_id)
                .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
            batch.claim_ids().collect()
        };

        // Hold every member claim's lock for the whole transition
        let mut claim_guards = Vec::with_capacity(claim_ids.len());
        for claim_id in &claim_ids {
            claim_guards.push(self.claim_locks.acquire(*claim_id)?);
        }

        // Validate everything before touching anything
        {
            let claims = guarded(&self.claims);
            for claim_id in &claim_ids {
                let claim = claims
                    .get(claim_id)
                    .ok_or_else(|| EngineError::not_found("claim", *claim_id))?;
                if claim.status != ClaimStatus::Vetted {
                    return Err(EngineError::validation(format!(
                        "claim {claim_id} is {}; every batch member must be vetted",
                        claim.status
                    )));
                }
            }
        }

        // Commit the local transition
        let submission = {
            let mut batches = guarded(&self.batches);
            let batch = batches
                .get_mut(&batch_id)
                .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
            batch.mark_submitted(now)?;

            let mut claims = guarded(&self.claims);
            let mut payload = Vec::with_capacity(claim_ids.len());
            for claim_id in &claim_ids {
                let claim = claims
                    .get_mut(claim_id)
                    .ok_or_else(|| EngineError::not_found("claim", *claim_id))?;
                claim.submit_to_insurer(actor, now)?;
                payload.push(ClaimSubmission {
                    claim_id: *claim_id,
                    claim_check_code: claim.claim_check_code.clone(),
                    amount: claim.approved_amount.unwrap_or_else(Money::zero),
                });
            }
            BatchSubmission {
                batch_id,
                batch_number: batch.batch_number.clone(),
                claims: payload,
                total_amount: batch.total_amount,
            }
        };

        info!(batch_id = %batch_id, claims = claim_ids.len(), "batch submitted locally, calling gateway");

        let gateway_result = self.gateway.submit_batch(submission).await;
        let outcome = match gateway_result {
            Ok(receipt) if receipt.accepted => Ok(receipt),
            Ok(receipt) => Err(GatewayError::Rejected {
                message: format!("gateway declined submission (ref {})", receipt.reference),
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(receipt) => {
                self.audit.record(AuditEvent::new(
                    "batch.submitted",
                    Some(actor),
                    serde_json::json!({ "status": "finalized" }),
                    serde_json::json!({ "status": "submitted", "reference": receipt.reference }),
                    now,
                ));
                Ok(receipt)
            }
            Err(err) => {
                warn!(batch_id = %batch_id, error = %err, "gateway failed, reverting submission");
                let mut batches = guarded(&self.batches);
                if let Some(batch) = batches.get_mut(&batch_id) {
                    batch.revert_to_finalized(now)?;
                }
                drop(batches);
                let mut claims = guarded(&self.claims);
                for claim_id in &claim_ids {
                    if let Some(claim) = claims.get_mut(claim_id) {
                        claim.revert_to_vetted(now)?;
                    }
                }
                drop(claims);
                self.audit.record(AuditEvent::new(
                    "batch.submission_reverted",
                    Some(actor),
                    serde_json::json!({ "status": "submitted" }),
                    serde_json::json!({ "status": "finalized", "error": err.to_string() }),
                    now,
                ));
                Err(EngineError::ExternalGateway(err))
            }
        }
    }

    /// Reopens a finalized or submitted batch. Reverting a submitted batch
    /// is privileged and is checked against the permission gate.
    pub fn revert_batch_to_draft(
        &self,
        batch_id: BatchId,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let now = self.clock.now();

        let mut batches = guarded(&self.batches);
        let batch = batches
            .get_mut(&batch_id)
            .ok_or_else(|| EngineError::not_found("batch", batch_id))?;

        if batch.status == domain_batch::BatchStatus::Submitted {
            let action = "batch.revert_submitted";
            if !self
                .permissions
                .can(actor, action, Some(&batch_id.to_string()))
            {
                return Err(EngineError::PermissionDenied {
                    actor_id: actor,
                    action: action.to_string(),
                });
            }
        }

        let before = serde_json::json!({ "status": batch.status });
        let claim_ids: Vec<ClaimId> = batch.claim_ids().collect();
        batch.revert_to_draft(now)?;
        drop(batches);

        let mut claims = guarded(&self.claims);
        for claim_id in &claim_ids {
            if let Some(claim) = claims.get_mut(claim_id) {
                if claim.status == ClaimStatus::Submitted {
                    claim.revert_to_vetted(now)?;
                }
            }
        }
        drop(claims);

        info!(batch_id = %batch_id, "batch reverted to draft");
        self.audit.record(AuditEvent::new(
            "batch.reverted_to_draft",
            Some(actor),
            before,
            serde_json::json!({ "status": "draft" }),
            now,
        ));
        Ok(())
    }

    /// Applies the insurer's per-claim adjudication for a submitted batch.
    /// Each outcome is delegated to the claim's own lifecycle; batch entry
    /// amounts are recomputed from the children. The batch completes once no
    /// entry is pending, releasing its claims from the membership index.
    pub fn record_batch_response(
        &self,
        batch_id: BatchId,
        outcomes: Vec<(ClaimId, ClaimResponse)>,
        actor: ActorId,
    ) -> Result<(), EngineError> {
        let _batch_guard = self.batch_locks.acquire(batch_id)?;
        let now = self.clock.now();

        for (claim_id, response) in outcomes {
            let _claim_guard = self.claim_locks.acquire(claim_id)?;

            let entry_outcome = {
                let mut claims = guarded(&self.claims);
                let claim = claims
                    .get_mut(&claim_id)
                    .ok_or_else(|| EngineError::not_found("claim", claim_id))?;
                claim.record_response(response, now)?;
                match claim.status {
                    ClaimStatus::Approved => EntryOutcome::Approved {
                        amount: claim.approved_amount.unwrap_or_else(Money::zero),
                    },
                    ClaimStatus::Paid => EntryOutcome::Paid {
                        amount: claim.approved_amount.unwrap_or_else(Money::zero),
                    },
                    _ => EntryOutcome::Rejected {
                        reason: claim
                            .rejection_reason
                            .clone()
                            .unwrap_or_else(|| "rejected by insurer".to_string()),
                    },
                }
            };

            let mut batches = guarded(&self.batches);
            let batch = batches
                .get_mut(&batch_id)
                .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
            batch.record_entry_outcome(claim_id, entry_outcome, now)?;
        }

        let completed = {
            let batches = guarded(&self.batches);
            let batch = batches
                .get(&batch_id)
                .ok_or_else(|| EngineError::not_found("batch", batch_id))?;
            batch.is_terminal().then(|| batch.claim_ids().collect::<Vec<_>>())
        };
        if let Some(claim_ids) = completed {
            let mut index = guarded(&self.batch_index);
            for claim_id in claim_ids {
                index.remove(&claim_id);
            }
            info!(batch_id = %batch_id, "batch completed");
        }

        self.audit.record(AuditEvent::new(
            "batch.response_recorded",
            Some(actor),
            serde_json::Value::Null,
            serde_json::json!({ "batch_id": batch_id }),
            now,
        ));
        Ok(())
    }

    // ----- internals -----

    fn price_charges(&self, charges: &[ChargeInput]) -> Result<Vec<BillableItem>, EngineError> {
        charges
            .iter()
            .map(|charge| {
                let price = match charge.unit_price {
                    Some(price) => price,
                    None => {
                        let code = charge.item_code.as_deref().ok_or_else(|| {
                            EngineError::validation(format!(
                                "charge {} has neither a price nor an item code",
                                charge.billable_id
                            ))
                        })?;
                        self.pricing
                            .standard_price(&charge.category, code)
                            .ok_or_else(|| {
                                EngineError::validation(format!(
                                    "no standard price for {} item {code}",
                                    charge.category
                                ))
                            })?
                    }
                };
                Ok(BillableItem {
                    billable_id: charge.billable_id,
                    kind: charge.kind,
                    description: charge.description.clone(),
                    category: charge.category.clone(),
                    item_code: charge.item_code.clone(),
                    quantity: charge.quantity,
                    standard_price: price,
                    item_date: charge.item_date,
                })
            })
            .collect()
    }

    /// Runs a guarded claim mutation under the claim's id lock, then logs
    /// and audits the accepted transition
    fn with_claim<R>(
        &self,
        claim_id: ClaimId,
        actor: ActorId,
        event: &str,
        mutate: impl FnOnce(&mut InsuranceClaim, DateTime<Utc>) -> Result<R, domain_claims::ClaimError>,
    ) -> Result<R, EngineError> {
        let _guard = self.claim_locks.acquire(claim_id)?;
        let now = self.clock.now();

        let mut claims = guarded(&self.claims);
        let claim = claims
            .get_mut(&claim_id)
            .ok_or_else(|| EngineError::not_found("claim", claim_id))?;
        let before = serde_json::json!({ "status": claim.status });
        let result = mutate(claim, now)?;
        let after = serde_json::json!({
            "status": claim.status,
            "approved_amount": claim.approved_amount,
        });
        let to = claim.status;
        drop(claims);

        info!(claim_id = %claim_id, status = %to, event, "claim transition accepted");
        self.audit
            .record(AuditEvent::new(event, Some(actor), before, after, now));
        Ok(result)
    }
}
