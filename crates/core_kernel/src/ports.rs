//! Collaborator ports
//!
//! The engine treats the rest of the hospital platform as external
//! collaborators reached through these seams: plan lookup, price lookup,
//! permission checks, insurer submission, and the audit trail. Each port
//! ships with a static or in-memory implementation used by the test suites;
//! production adapters live with the callers, not here.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::category::ServiceCategory;
use crate::identifiers::{ActorId, AuditEventId, BatchId, ClaimId, PatientInsuranceId, PlanId};
use crate::money::Money;

/// The active insurance plan behind a patient-insurance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePlan {
    pub plan_id: PlanId,
    /// True when the plan's provider is a national scheme; the core applies
    /// no special-casing, callers use it for reporting only
    pub provider_is_nhis: bool,
}

/// Resolves a patient-insurance record to its active plan
pub trait PlanRegistry: Send + Sync {
    fn active_plan(&self, patient_insurance_id: PatientInsuranceId) -> Option<ActivePlan>;
}

/// Fixed plan mapping for tests and bootstrapping
#[derive(Debug, Default)]
pub struct StaticPlanRegistry {
    plans: HashMap<PatientInsuranceId, ActivePlan>,
}

impl StaticPlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, patient_insurance_id: PatientInsuranceId, plan: ActivePlan) -> Self {
        self.plans.insert(patient_insurance_id, plan);
        self
    }
}

impl PlanRegistry for StaticPlanRegistry {
    fn active_plan(&self, patient_insurance_id: PatientInsuranceId) -> Option<ActivePlan> {
        self.plans.get(&patient_insurance_id).copied()
    }
}

/// Looks up the hospital's standard (cash) price for a billable item
pub trait PricingCatalog: Send + Sync {
    fn standard_price(&self, category: &ServiceCategory, item_code: &str) -> Option<Money>;
}

/// Fixed price list for tests and bootstrapping
#[derive(Debug, Default)]
pub struct StaticPricingCatalog {
    prices: HashMap<(ServiceCategory, String), Money>,
}

impl StaticPricingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(
        mut self,
        category: ServiceCategory,
        item_code: impl Into<String>,
        price: Money,
    ) -> Self {
        self.prices.insert((category, item_code.into()), price);
        self
    }
}

impl PricingCatalog for StaticPricingCatalog {
    fn standard_price(&self, category: &ServiceCategory, item_code: &str) -> Option<Money> {
        self.prices
            .get(&(category.clone(), item_code.to_string()))
            .copied()
    }
}

/// Opaque "may perform action X" predicate, consulted by the calling layer
/// before it invokes a lifecycle transition. The engine itself never
/// authenticates.
pub trait PermissionGate: Send + Sync {
    fn can(&self, actor_id: ActorId, action: &str, resource_id: Option<&str>) -> bool;
}

/// Grants everything; the default for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn can(&self, _actor_id: ActorId, _action: &str, _resource_id: Option<&str>) -> bool {
        true
    }
}

/// One claim inside a batch submission payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub claim_id: ClaimId,
    pub claim_check_code: String,
    pub amount: Money,
}

/// Payload handed to the insurer gateway when a batch is submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub batch_id: BatchId,
    pub batch_number: String,
    pub claims: Vec<ClaimSubmission>,
    pub total_amount: Money,
}

/// Receipt returned by the insurer for an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayReceipt {
    pub accepted: bool,
    pub reference: String,
}

/// Errors from the insurer gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Gateway connection failed: {message}")]
    Connection { message: String },

    #[error("Submission rejected by gateway: {message}")]
    Rejected { message: String },
}

impl GatewayError {
    /// True when the failure may succeed on retry; the caller owns the
    /// retry policy, the engine only reverts its local transition
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout { .. } | GatewayError::Connection { .. }
        )
    }
}

/// External insurer submission channel, invoked only after the local
/// submit transition has committed
#[async_trait]
pub trait InsurerGateway: Send + Sync {
    async fn submit_batch(&self, submission: BatchSubmission)
        -> Result<GatewayReceipt, GatewayError>;
}

/// Append-only audit record of a state mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub event: String,
    pub actor_id: Option<ActorId>,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        event: impl Into<String>,
        actor_id: Option<ActorId>,
        before: serde_json::Value,
        after: serde_json::Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEventId::new_v7(),
            event: event.into(),
            actor_id,
            before,
            after,
            recorded_at,
        }
    }
}

/// Append-only audit trail consumer
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards events
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Collects events in memory for inspection by tests
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
