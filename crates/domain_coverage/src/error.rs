//! Coverage domain errors

use chrono::NaiveDate;
use thiserror::Error;

use core_kernel::{PlanId, RuleId, ServiceCategory};

/// Errors raised by the coverage rule store. The resolver itself never
/// fails: missing or expired rules mean "no coverage", not an error.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("An active general rule already exists for plan {plan_id} category {category}")]
    DuplicateGeneralRule {
        plan_id: PlanId,
        category: ServiceCategory,
    },

    #[error(
        "An active rule already exists for plan {plan_id} category {category} item {item_code}"
    )]
    DuplicateItemRule {
        plan_id: PlanId,
        category: ServiceCategory,
        item_code: String,
    },

    #[error("Effective window is inverted: {effective_from} > {effective_to}")]
    InvertedEffectiveWindow {
        effective_from: NaiveDate,
        effective_to: NaiveDate,
    },

    #[error("Malformed rule: {0}")]
    MalformedRule(String),
}
