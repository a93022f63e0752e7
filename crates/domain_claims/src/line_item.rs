//! Claim line items
//!
//! A line item is the frozen result of coverage resolution for one billable
//! charge. Amounts are captured at build time and never re-resolved, so a
//! later rule change cannot silently alter a claim under vetting.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillableId, ClaimItemId, Money, RuleId, ServiceCategory};
use domain_coverage::{CoverageOutcome, RuleSource};

/// Vetting decision for a single line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum ItemVerdict {
    Approved,
    Rejected { reason: String },
}

impl ItemVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, ItemVerdict::Approved)
    }
}

/// One billed charge on a claim, with its insurer/patient split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLineItem {
    pub id: ClaimItemId,
    /// Source charge in the billing system
    pub billable_id: BillableId,
    pub description: String,
    pub category: ServiceCategory,
    pub item_code: Option<String>,
    pub quantity: u32,
    /// Effective per-unit price (tariff when one applied)
    pub unit_price: Money,
    /// unit_price times quantity
    pub subtotal: Money,
    /// False when no rule applied or the category is excluded; the whole
    /// subtotal then lands on the patient
    pub is_covered: bool,
    pub insurance_amount: Money,
    pub patient_amount: Money,
    pub copay_amount: Money,
    pub coverage_percentage: Decimal,
    pub rule_source: RuleSource,
    pub rule_id: Option<RuleId>,
    pub requires_preauthorization: bool,
    /// Per-visit limit note from resolution, if any
    pub limit_message: Option<String>,
    pub item_date: NaiveDate,
    /// Set during vetting; cleared on resubmission
    pub verdict: Option<ItemVerdict>,
}

impl ClaimLineItem {
    /// Freezes a coverage outcome into a claim line
    pub fn from_outcome(
        billable_id: BillableId,
        description: impl Into<String>,
        category: ServiceCategory,
        item_code: Option<String>,
        quantity: u32,
        item_date: NaiveDate,
        outcome: &CoverageOutcome,
    ) -> Self {
        Self {
            id: ClaimItemId::new_v7(),
            billable_id,
            description: description.into(),
            category,
            item_code,
            quantity,
            unit_price: outcome.unit_price,
            subtotal: outcome.base_amount,
            is_covered: outcome.is_covered,
            insurance_amount: outcome.insurance_amount,
            patient_amount: outcome.patient_amount,
            copay_amount: outcome.copay_amount,
            coverage_percentage: outcome.coverage_percentage,
            rule_source: outcome.rule_source,
            rule_id: outcome.rule_id,
            requires_preauthorization: outcome.requires_preauthorization,
            limit_message: outcome.limit_message.clone(),
            item_date,
            verdict: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.verdict.as_ref().is_some_and(ItemVerdict::is_approved)
    }
}
