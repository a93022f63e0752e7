//! Coverage resolution
//!
//! Given a billable item and a plan, decides how much the insurer pays and
//! how much the patient owes. Resolution never fails: an item with no
//! applicable rule (unknown category, expired window, unmapped code) is
//! fully patient-payable. Malformed rule values are applied literally and
//! surfaced as data-integrity warnings; correcting them is an operator
//! decision, not the resolver's.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use core_kernel::{Money, PlanId, RuleId, ServiceCategory};

use crate::rule::{CoverageRule, CoverageType};
use crate::store::CoverageRuleStore;

/// Which rule decided the split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    /// An item-specific rule matched
    Item,
    /// The category-wide general rule applied
    General,
    /// No rule applied; the item is self-pay
    None,
}

/// Non-fatal rule problems surfaced alongside the resolution
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DataIntegrityWarning {
    #[error("Rule {rule_id}: percentage coverage value {value} is outside 0..=100")]
    PercentageOutOfRange { rule_id: RuleId, value: Decimal },

    #[error("Rule {rule_id}: fixed coverage {value} exceeds unit price {unit_price}")]
    FixedAmountExceedsPrice {
        rule_id: RuleId,
        value: Decimal,
        unit_price: Money,
    },
}

/// The insurer/patient split for one billable line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageOutcome {
    pub is_covered: bool,
    pub insurance_amount: Money,
    /// Includes the fixed copay and any rounding remainder
    pub patient_amount: Money,
    pub copay_amount: Money,
    /// Line base: effective unit price times quantity
    pub base_amount: Money,
    /// Effective per-unit price actually charged against the rule
    pub unit_price: Money,
    /// The rule tariff, when it displaced the standard price
    pub used_tariff: Option<Money>,
    pub coverage_percentage: Decimal,
    pub rule_source: RuleSource,
    pub rule_id: Option<RuleId>,
    pub requires_preauthorization: bool,
    /// Set when a per-visit quantity/amount limit was hit
    pub limit_message: Option<String>,
    pub warnings: Vec<DataIntegrityWarning>,
}

impl CoverageOutcome {
    fn self_pay(unit_price: Money, quantity: u32) -> Self {
        let base = unit_price.multiply(Decimal::from(quantity));
        Self {
            is_covered: false,
            insurance_amount: Money::zero(),
            patient_amount: base,
            copay_amount: Money::zero(),
            base_amount: base,
            unit_price,
            used_tariff: None,
            coverage_percentage: dec!(0),
            rule_source: RuleSource::None,
            rule_id: None,
            requires_preauthorization: false,
            limit_message: None,
            warnings: Vec::new(),
        }
    }
}

/// Resolves coverage against a rule store
///
/// The reference date is an explicit parameter so resolution stays
/// deterministic; callers obtain it from the engine clock.
#[derive(Debug, Clone, Copy)]
pub struct CoverageResolver<'a> {
    rules: &'a CoverageRuleStore,
}

impl<'a> CoverageResolver<'a> {
    pub fn new(rules: &'a CoverageRuleStore) -> Self {
        Self { rules }
    }

    /// Resolves the insurer/patient split for a single-unit price
    pub fn resolve(
        &self,
        plan_id: PlanId,
        category: &ServiceCategory,
        item_code: Option<&str>,
        standard_price: Money,
        as_of: NaiveDate,
    ) -> CoverageOutcome {
        self.resolve_line(plan_id, category, item_code, standard_price, 1, as_of)
    }

    /// Resolves a full line: unit price times quantity, copay per unit
    pub fn resolve_line(
        &self,
        plan_id: PlanId,
        category: &ServiceCategory,
        item_code: Option<&str>,
        standard_price: Money,
        quantity: u32,
        as_of: NaiveDate,
    ) -> CoverageOutcome {
        // Item-specific rule wins over the category-wide general rule
        let resolved = item_code
            .and_then(|code| self.rules.find_item_rule(plan_id, category, code, as_of))
            .map(|rule| (rule, RuleSource::Item))
            .or_else(|| {
                self.rules
                    .find_general_rule(plan_id, category, as_of)
                    .map(|rule| (rule, RuleSource::General))
            });

        let Some((rule, source)) = resolved else {
            return CoverageOutcome::self_pay(standard_price, quantity);
        };

        self.apply_rule(rule, source, standard_price, quantity)
    }

    fn apply_rule(
        &self,
        rule: &CoverageRule,
        source: RuleSource,
        standard_price: Money,
        quantity: u32,
    ) -> CoverageOutcome {
        let qty = Decimal::from(quantity);
        let unit_price = rule.tariff_amount.unwrap_or(standard_price);
        let base = unit_price.multiply(qty);
        let copay = rule
            .patient_copay_amount
            .unwrap_or_else(Money::zero)
            .multiply(qty);

        let mut warnings = Vec::new();
        let mut is_covered = true;

        let (mut insurance, coverage_percentage) = match rule.coverage_type {
            CoverageType::Full => (base, dec!(100)),
            CoverageType::Excluded => {
                is_covered = false;
                (Money::zero(), dec!(0))
            }
            CoverageType::Percentage => {
                if rule.coverage_value < dec!(0) || rule.coverage_value > dec!(100) {
                    warnings.push(DataIntegrityWarning::PercentageOutOfRange {
                        rule_id: rule.id,
                        value: rule.coverage_value,
                    });
                }
                // Applied literally even when out of range; flagged, not fixed
                (base.percentage(rule.coverage_value), rule.coverage_value)
            }
            CoverageType::FixedAmount => {
                let per_line = Money::new(rule.coverage_value).multiply(qty);
                if Money::new(rule.coverage_value) > unit_price {
                    warnings.push(DataIntegrityWarning::FixedAmountExceedsPrice {
                        rule_id: rule.id,
                        value: rule.coverage_value,
                        unit_price,
                    });
                }
                let capped = per_line.min(base);
                let pct = capped.percent_of(base);
                (capped, pct)
            }
        };

        // The remainder plus copay lands on the patient; any rounding drift
        // is absorbed here so insurance + (patient - copay) == base
        let mut patient = (base - insurance) + copay;

        let mut limit_message = None;
        if let Some(max_qty) = rule.max_quantity_per_visit {
            if quantity > max_qty {
                limit_message = Some(format!(
                    "Quantity {quantity} exceeds plan limit of {max_qty} per visit"
                ));
            }
        }
        if let Some(max_amount) = rule.max_amount_per_visit {
            if insurance > max_amount {
                limit_message = Some(format!(
                    "Insurance coverage amount exceeds plan limit of {max_amount} per visit"
                ));
                insurance = max_amount;
                patient = (base - insurance) + copay;
            }
        }

        for warning in &warnings {
            warn!(rule_id = %rule.id, %warning, "coverage rule integrity warning");
        }

        CoverageOutcome {
            is_covered,
            insurance_amount: insurance,
            patient_amount: patient,
            copay_amount: copay,
            base_amount: base,
            unit_price,
            used_tariff: rule.tariff_amount,
            coverage_percentage,
            rule_source: source,
            rule_id: Some(rule.id),
            requires_preauthorization: rule.requires_preauthorization,
            limit_message,
            warnings,
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn store_with_pct(plan: PlanId, pct: u32) -> CoverageRuleStore {
        let mut store = CoverageRuleStore::new();
        store
            .add_rule(
                CoverageRule::new(
                    plan,
                    ServiceCategory::Drug,
                    CoverageType::Percentage,
                    Decimal::from(pct),
                    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                ),
                None,
                Utc::now(),
            )
            .unwrap();
        store
    }

    proptest! {
        #[test]
        fn split_identity_holds_for_in_range_percentages(
            minor in 1i64..10_000_00i64,
            pct in 0u32..=100u32,
            qty in 1u32..20u32
        ) {
            let plan = PlanId::new();
            let store = store_with_pct(plan, pct);
            let resolver = CoverageResolver::new(&store);

            let outcome = resolver.resolve_line(
                plan,
                &ServiceCategory::Drug,
                None,
                Money::from_minor(minor),
                qty,
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            );

            // insurance + (patient - copay) == base, to the cent
            prop_assert_eq!(
                outcome.insurance_amount + (outcome.patient_amount - outcome.copay_amount),
                outcome.base_amount
            );
            prop_assert!(!outcome.patient_amount.is_negative());
            prop_assert!(outcome.warnings.is_empty());
        }

        #[test]
        fn resolution_is_idempotent(
            minor in 1i64..10_000_00i64,
            pct in 0u32..=100u32
        ) {
            let plan = PlanId::new();
            let store = store_with_pct(plan, pct);
            let resolver = CoverageResolver::new(&store);
            let as_of = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
            let price = Money::from_minor(minor);

            let first = resolver.resolve(plan, &ServiceCategory::Drug, None, price, as_of);
            let second = resolver.resolve(plan, &ServiceCategory::Drug, None, price, as_of);

            prop_assert_eq!(first, second);
        }
    }
}
