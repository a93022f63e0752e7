//! Coverage resolution scenarios
//!
//! Exercises the rule store and resolver together on the pricing cases the
//! vetting desk actually sees: negotiated tariffs with copays, percentage
//! splits, fixed amounts larger than cheap items, and unmapped self-pay.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{Money, PlanId, ServiceCategory};
use domain_coverage::{
    CoverageResolver, CoverageRule, CoverageRuleStore, CoverageType, DataIntegrityWarning,
    RuleSource,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn as_of() -> NaiveDate {
    date(2025, 6, 15)
}

fn add(store: &mut CoverageRuleStore, rule: CoverageRule) {
    store.add_rule(rule, None, chrono::Utc::now()).unwrap();
}

#[test]
fn test_full_coverage_with_tariff_and_copay() {
    // Standard price 20, negotiated tariff 10, full coverage, copay 15:
    // the insurer pays the tariff, the patient pays only the copay.
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Consultation,
            CoverageType::Full,
            dec!(0),
            date(2025, 1, 1),
        )
        .with_tariff(Money::new(dec!(10)))
        .with_copay(Money::new(dec!(15))),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Consultation,
        None,
        Money::new(dec!(20)),
        as_of(),
    );

    assert!(outcome.is_covered);
    assert_eq!(outcome.insurance_amount, Money::new(dec!(10)));
    assert_eq!(outcome.patient_amount, Money::new(dec!(15)));
    assert_eq!(outcome.copay_amount, Money::new(dec!(15)));
    assert_eq!(outcome.base_amount, Money::new(dec!(10)));
    assert_eq!(outcome.used_tariff, Some(Money::new(dec!(10))));
    assert_eq!(outcome.coverage_percentage, dec!(100));
    assert_eq!(outcome.rule_source, RuleSource::General);
}

#[test]
fn test_percentage_coverage_split() {
    // Price 20 at 80%: insurer 16, patient 4.
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Percentage,
            dec!(80),
            date(2025, 1, 1),
        ),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Drug,
        Some("PARA-500"),
        Money::new(dec!(20)),
        as_of(),
    );

    assert!(outcome.is_covered);
    assert_eq!(outcome.insurance_amount, Money::new(dec!(16)));
    assert_eq!(outcome.patient_amount, Money::new(dec!(4)));
    assert_eq!(outcome.coverage_percentage, dec!(80));
    assert_eq!(outcome.rule_source, RuleSource::General);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_fixed_amount_capped_at_price_with_warning() {
    // Price 3, fixed coverage 80: capped at 3, patient pays 0, and the
    // oversized rule value is flagged.
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::FixedAmount,
            dec!(80),
            date(2025, 1, 1),
        ),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Drug,
        None,
        Money::new(dec!(3)),
        as_of(),
    );

    assert!(outcome.is_covered);
    assert_eq!(outcome.insurance_amount, Money::new(dec!(3)));
    assert_eq!(outcome.patient_amount, Money::zero());
    assert_eq!(outcome.coverage_percentage, dec!(100));
    assert!(matches!(
        outcome.warnings.as_slice(),
        [DataIntegrityWarning::FixedAmountExceedsPrice { .. }]
    ));
}

#[test]
fn test_fixed_amount_below_price() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Lab,
            CoverageType::FixedAmount,
            dec!(30),
            date(2025, 1, 1),
        ),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Lab,
        None,
        Money::new(dec!(50)),
        as_of(),
    );

    assert_eq!(outcome.insurance_amount, Money::new(dec!(30)));
    assert_eq!(outcome.patient_amount, Money::new(dec!(20)));
    assert_eq!(outcome.coverage_percentage, dec!(60));
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_item_rule_overrides_general_rule() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Percentage,
            dec!(50),
            date(2025, 1, 1),
        ),
    );
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Percentage,
            dec!(90),
            date(2025, 1, 1),
        )
        .for_item("AMOX-250"),
    );

    let resolver = CoverageResolver::new(&store);

    let specific = resolver.resolve(
        plan,
        &ServiceCategory::Drug,
        Some("AMOX-250"),
        Money::new(dec!(100)),
        as_of(),
    );
    assert_eq!(specific.rule_source, RuleSource::Item);
    assert_eq!(specific.insurance_amount, Money::new(dec!(90)));

    let fallback = resolver.resolve(
        plan,
        &ServiceCategory::Drug,
        Some("CIPRO-500"),
        Money::new(dec!(100)),
        as_of(),
    );
    assert_eq!(fallback.rule_source, RuleSource::General);
    assert_eq!(fallback.insurance_amount, Money::new(dec!(50)));
}

#[test]
fn test_excluded_category_is_patient_payable() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Procedure,
            CoverageType::Excluded,
            dec!(0),
            date(2025, 1, 1),
        ),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Procedure,
        None,
        Money::new(dec!(250)),
        as_of(),
    );

    assert!(!outcome.is_covered);
    assert_eq!(outcome.insurance_amount, Money::zero());
    assert_eq!(outcome.patient_amount, Money::new(dec!(250)));
    assert_eq!(outcome.rule_source, RuleSource::General);
    assert!(outcome.rule_id.is_some());
}

#[test]
fn test_no_rule_means_self_pay() {
    let plan = PlanId::new();
    let store = CoverageRuleStore::new();

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Ward,
        None,
        Money::new(dec!(120)),
        as_of(),
    );

    assert!(!outcome.is_covered);
    assert_eq!(outcome.insurance_amount, Money::zero());
    assert_eq!(outcome.patient_amount, Money::new(dec!(120)));
    assert_eq!(outcome.rule_source, RuleSource::None);
    assert_eq!(outcome.rule_id, None);
}

#[test]
fn test_expired_rule_means_self_pay() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Full,
            dec!(0),
            date(2024, 1, 1),
        )
        .with_effective_to(date(2024, 12, 31)),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Drug,
        None,
        Money::new(dec!(10)),
        as_of(),
    );

    assert_eq!(outcome.rule_source, RuleSource::None);
    assert_eq!(outcome.patient_amount, Money::new(dec!(10)));
}

#[test]
fn test_out_of_range_percentage_applied_literally_with_warning() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Lab,
            CoverageType::Percentage,
            dec!(150),
            date(2025, 1, 1),
        ),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Lab,
        None,
        Money::new(dec!(10)),
        as_of(),
    );

    assert_eq!(outcome.insurance_amount, Money::new(dec!(15)));
    assert!(outcome.patient_amount.is_negative());
    assert!(matches!(
        outcome.warnings.as_slice(),
        [DataIntegrityWarning::PercentageOutOfRange { .. }]
    ));
}

#[test]
fn test_quantity_multiplies_base_and_copay() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Percentage,
            dec!(80),
            date(2025, 1, 1),
        )
        .with_copay(Money::new(dec!(2))),
    );

    let outcome = CoverageResolver::new(&store).resolve_line(
        plan,
        &ServiceCategory::Drug,
        None,
        Money::new(dec!(10)),
        3,
        as_of(),
    );

    assert_eq!(outcome.base_amount, Money::new(dec!(30)));
    assert_eq!(outcome.insurance_amount, Money::new(dec!(24)));
    assert_eq!(outcome.copay_amount, Money::new(dec!(6)));
    // patient = (30 - 24) + 6
    assert_eq!(outcome.patient_amount, Money::new(dec!(12)));
}

#[test]
fn test_quantity_limit_flags_but_does_not_block() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Drug,
            CoverageType::Full,
            dec!(0),
            date(2025, 1, 1),
        )
        .with_quantity_limit(2),
    );

    let outcome = CoverageResolver::new(&store).resolve_line(
        plan,
        &ServiceCategory::Drug,
        None,
        Money::new(dec!(5)),
        4,
        as_of(),
    );

    assert!(outcome.limit_message.is_some());
    assert_eq!(outcome.insurance_amount, Money::new(dec!(20)));
}

#[test]
fn test_amount_limit_caps_insurer_share() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Procedure,
            CoverageType::Full,
            dec!(0),
            date(2025, 1, 1),
        )
        .with_amount_limit(Money::new(dec!(100))),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Procedure,
        None,
        Money::new(dec!(350)),
        as_of(),
    );

    assert!(outcome.limit_message.is_some());
    assert_eq!(outcome.insurance_amount, Money::new(dec!(100)));
    assert_eq!(outcome.patient_amount, Money::new(dec!(250)));
}

#[test]
fn test_preauthorization_flag_propagates() {
    let plan = PlanId::new();
    let mut store = CoverageRuleStore::new();
    add(
        &mut store,
        CoverageRule::new(
            plan,
            ServiceCategory::Procedure,
            CoverageType::Full,
            dec!(0),
            date(2025, 1, 1),
        )
        .requiring_preauthorization(),
    );

    let outcome = CoverageResolver::new(&store).resolve(
        plan,
        &ServiceCategory::Procedure,
        None,
        Money::new(dec!(40)),
        as_of(),
    );

    assert!(outcome.requires_preauthorization);
}
