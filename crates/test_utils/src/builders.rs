//! Test data builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Money, PlanId, ServiceCategory};
use domain_coverage::{CoverageRule, CoverageType};

use crate::fixtures::window_start;

/// Builder for coverage rules; defaults to an 80% general drug rule
pub struct TestRuleBuilder {
    plan_id: PlanId,
    category: ServiceCategory,
    item_code: Option<String>,
    coverage_type: CoverageType,
    coverage_value: Decimal,
    tariff: Option<Money>,
    copay: Option<Money>,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
}

impl TestRuleBuilder {
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            plan_id,
            category: ServiceCategory::Drug,
            item_code: None,
            coverage_type: CoverageType::Percentage,
            coverage_value: dec!(80),
            tariff: None,
            copay: None,
            effective_from: window_start(),
            effective_to: None,
        }
    }

    pub fn category(mut self, category: ServiceCategory) -> Self {
        self.category = category;
        self
    }

    pub fn for_item(mut self, item_code: impl Into<String>) -> Self {
        self.item_code = Some(item_code.into());
        self
    }

    pub fn full(mut self) -> Self {
        self.coverage_type = CoverageType::Full;
        self.coverage_value = dec!(0);
        self
    }

    pub fn excluded(mut self) -> Self {
        self.coverage_type = CoverageType::Excluded;
        self.coverage_value = dec!(0);
        self
    }

    pub fn percentage(mut self, value: Decimal) -> Self {
        self.coverage_type = CoverageType::Percentage;
        self.coverage_value = value;
        self
    }

    pub fn fixed_amount(mut self, value: Decimal) -> Self {
        self.coverage_type = CoverageType::FixedAmount;
        self.coverage_value = value;
        self
    }

    pub fn tariff(mut self, tariff: Money) -> Self {
        self.tariff = Some(tariff);
        self
    }

    pub fn copay(mut self, copay: Money) -> Self {
        self.copay = Some(copay);
        self
    }

    pub fn effective(mut self, from: NaiveDate, to: Option<NaiveDate>) -> Self {
        self.effective_from = from;
        self.effective_to = to;
        self
    }

    pub fn build(self) -> CoverageRule {
        let mut rule = CoverageRule::new(
            self.plan_id,
            self.category,
            self.coverage_type,
            self.coverage_value,
            self.effective_from,
        );
        rule.item_code = self.item_code;
        rule.tariff_amount = self.tariff;
        rule.patient_copay_amount = self.copay;
        rule.effective_to = self.effective_to;
        rule
    }
}
