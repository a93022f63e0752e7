//! Coverage rule model
//!
//! A coverage rule maps a billable category (or one specific item within it)
//! to an insurer payment formula for a plan. Rules carry an effective-date
//! window and an active flag; expired or inactive rules are invisible to the
//! resolver.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, PlanId, RuleId, ServiceCategory};

/// How the insurer share is computed from the base price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageType {
    /// Insurer pays `coverage_value` percent of the base price
    Percentage,
    /// Insurer pays a fixed amount per unit, capped at the base price
    FixedAmount,
    /// Insurer pays the full base price; `coverage_value` is ignored
    Full,
    /// Insurer pays nothing
    Excluded,
}

/// A coverage rule for one plan/category, optionally scoped to an item code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRule {
    pub id: RuleId,
    pub plan_id: PlanId,
    pub category: ServiceCategory,
    /// None makes this the general/default rule for the whole category
    pub item_code: Option<String>,
    pub coverage_type: CoverageType,
    pub coverage_value: Decimal,
    /// Insurer-negotiated unit price, used instead of the standard price
    pub tariff_amount: Option<Money>,
    /// Fixed patient copay per unit, on top of any percentage share
    pub patient_copay_amount: Option<Money>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub active: bool,
    pub max_quantity_per_visit: Option<u32>,
    pub max_amount_per_visit: Option<Money>,
    pub requires_preauthorization: bool,
    /// Bumped on every mutation; superseded versions live in the history
    pub version: u32,
}

impl CoverageRule {
    pub fn new(
        plan_id: PlanId,
        category: ServiceCategory,
        coverage_type: CoverageType,
        coverage_value: Decimal,
        effective_from: NaiveDate,
    ) -> Self {
        Self {
            id: RuleId::new_v7(),
            plan_id,
            category,
            item_code: None,
            coverage_type,
            coverage_value,
            tariff_amount: None,
            patient_copay_amount: None,
            effective_from,
            effective_to: None,
            active: true,
            max_quantity_per_visit: None,
            max_amount_per_visit: None,
            requires_preauthorization: false,
            version: 1,
        }
    }

    /// Scopes this rule to a single item code
    pub fn for_item(mut self, item_code: impl Into<String>) -> Self {
        self.item_code = Some(item_code.into());
        self
    }

    pub fn with_tariff(mut self, tariff: Money) -> Self {
        self.tariff_amount = Some(tariff);
        self
    }

    pub fn with_copay(mut self, copay: Money) -> Self {
        self.patient_copay_amount = Some(copay);
        self
    }

    pub fn with_effective_to(mut self, effective_to: NaiveDate) -> Self {
        self.effective_to = Some(effective_to);
        self
    }

    pub fn with_amount_limit(mut self, max_amount_per_visit: Money) -> Self {
        self.max_amount_per_visit = Some(max_amount_per_visit);
        self
    }

    pub fn with_quantity_limit(mut self, max_quantity_per_visit: u32) -> Self {
        self.max_quantity_per_visit = Some(max_quantity_per_visit);
        self
    }

    pub fn requiring_preauthorization(mut self) -> Self {
        self.requires_preauthorization = true;
        self
    }

    /// True for the category-wide default rule (no item code)
    pub fn is_general(&self) -> bool {
        self.item_code.is_none()
    }

    /// True when the rule is active and `as_of` falls inside its window
    pub fn is_effective_on(&self, as_of: NaiveDate) -> bool {
        self.active
            && self.effective_from <= as_of
            && self.effective_to.map_or(true, |to| as_of <= to)
    }
}
