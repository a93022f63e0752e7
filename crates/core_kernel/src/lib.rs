//! Core Kernel - Foundational types and ports for the claims engine
//!
//! This crate provides the building blocks shared by every domain module:
//! - Money with precise two-decimal arithmetic
//! - Strongly-typed identifiers
//! - An injectable clock and id-scoped locks
//! - The collaborator ports (plan registry, pricing, permissions, insurer
//!   gateway, audit trail)

pub mod category;
pub mod clock;
pub mod identifiers;
pub mod lock;
pub mod money;
pub mod ports;

pub use category::ServiceCategory;
pub use clock::{Clock, FixedClock, SystemClock};
pub use identifiers::{
    ActorId, AuditEventId, BatchId, BillableId, ClaimId, ClaimItemId, EncounterId,
    PatientInsuranceId, PlanId, RuleId,
};
pub use lock::{LockContention, LockGuard, LockMap};
pub use money::Money;
pub use ports::{
    ActivePlan, AllowAll, AuditEvent, AuditSink, BatchSubmission, ClaimSubmission, GatewayError,
    GatewayReceipt, InMemoryAuditSink, InsurerGateway, NoopAuditSink, PermissionGate, PlanRegistry,
    PricingCatalog, StaticPlanRegistry, StaticPricingCatalog,
};
