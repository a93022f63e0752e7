//! Claim item builder
//!
//! Gathers the billable charges of an encounter, resolves coverage for each,
//! and produces the claim's line items in a stable presentation order
//! (service date, then arrival order).

use chrono::NaiveDate;
use tracing::debug;

use core_kernel::{BillableId, Money, PlanId, ServiceCategory};
use domain_coverage::{CoverageResolver, RuleSource};

use crate::line_item::ClaimLineItem;

/// Kind of charge feeding a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillableKind {
    Consultation,
    Prescription,
    LabOrder,
    Procedure,
}

impl BillableKind {
    /// Fallback description when the billing record carries none
    fn default_description(self) -> &'static str {
        match self {
            BillableKind::Consultation => "Consultation",
            BillableKind::Prescription => "Prescribed medication",
            BillableKind::LabOrder => "Laboratory investigation",
            BillableKind::Procedure => "Medical procedure",
        }
    }
}

/// An unresolved charge from the billing side of an encounter
#[derive(Debug, Clone)]
pub struct BillableItem {
    pub billable_id: BillableId,
    pub kind: BillableKind,
    pub description: Option<String>,
    pub category: ServiceCategory,
    pub item_code: Option<String>,
    pub quantity: u32,
    /// Hospital standard price per unit; a rule tariff may displace it
    pub standard_price: Money,
    pub item_date: NaiveDate,
}

/// Builds claim line items from billable charges
pub struct ClaimItemBuilder<'a> {
    resolver: CoverageResolver<'a>,
}

impl<'a> ClaimItemBuilder<'a> {
    pub fn new(resolver: CoverageResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Resolves coverage for every charge and returns one line per charge,
    /// ordered by service date then input order. A charge with no applicable
    /// rule still gets a line, marked uncovered with the full subtotal on the
    /// patient, so the claim accounts for the whole encounter.
    pub fn build(
        &self,
        plan_id: PlanId,
        billables: &[BillableItem],
        as_of: NaiveDate,
    ) -> Vec<ClaimLineItem> {
        let mut indexed: Vec<(usize, &BillableItem)> = billables.iter().enumerate().collect();
        indexed.sort_by_key(|(seq, b)| (b.item_date, *seq));

        let mut items = Vec::with_capacity(indexed.len());
        for (_, billable) in indexed {
            let outcome = self.resolver.resolve_line(
                plan_id,
                &billable.category,
                billable.item_code.as_deref(),
                billable.standard_price,
                billable.quantity,
                as_of,
            );

            if outcome.rule_source == RuleSource::None {
                debug!(
                    billable_id = %billable.billable_id,
                    "no coverage rule; line recorded as self-pay"
                );
            }

            let description = billable
                .description
                .clone()
                .unwrap_or_else(|| billable.kind.default_description().to_string());

            items.push(ClaimLineItem::from_outcome(
                billable.billable_id,
                description,
                billable.category.clone(),
                billable.item_code.clone(),
                billable.quantity,
                billable.item_date,
                &outcome,
            ));
        }
        items
    }
}
