//! Claim lifecycle scenarios

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use core_kernel::{
    ActorId, BillableId, ClaimItemId, EncounterId, Money, PatientInsuranceId, PlanId,
    ServiceCategory,
};
use domain_claims::{
    ClaimError, ClaimLineItem, ClaimResponse, ClaimStatus, InsuranceClaim, ItemVerdict,
};
use domain_coverage::{CoverageOutcome, RuleSource};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
}

fn line_item(insurance: rust_decimal::Decimal) -> ClaimLineItem {
    let base = Money::new(insurance) + Money::new(dec!(5));
    let outcome = CoverageOutcome {
        is_covered: true,
        insurance_amount: Money::new(insurance),
        patient_amount: Money::new(dec!(5)),
        copay_amount: Money::zero(),
        base_amount: base,
        unit_price: base,
        used_tariff: None,
        coverage_percentage: dec!(80),
        rule_source: RuleSource::General,
        rule_id: None,
        requires_preauthorization: false,
        limit_message: None,
        warnings: Vec::new(),
    };
    ClaimLineItem::from_outcome(
        BillableId::new(),
        "item",
        ServiceCategory::Drug,
        None,
        1,
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(),
        &outcome,
    )
}

fn draft_claim_with(amounts: &[rust_decimal::Decimal]) -> InsuranceClaim {
    let mut claim = InsuranceClaim::new(
        EncounterId::new(),
        PatientInsuranceId::new(),
        PlanId::new(),
        None,
        now(),
    );
    for amount in amounts {
        claim.add_item(line_item(*amount), now()).unwrap();
    }
    claim
}

fn approve_all(claim: &InsuranceClaim) -> HashMap<ClaimItemId, ItemVerdict> {
    claim
        .items
        .iter()
        .map(|i| (i.id, ItemVerdict::Approved))
        .collect()
}

#[test]
fn test_new_claim_gets_generated_check_code() {
    let claim = draft_claim_with(&[]);
    assert!(claim.claim_check_code.starts_with("CC-"));
    assert_eq!(claim.status, ClaimStatus::Draft);
    assert_eq!(claim.resubmission_count, 0);
}

#[test]
fn test_supplied_check_code_is_kept() {
    let claim = InsuranceClaim::new(
        EncounterId::new(),
        PatientInsuranceId::new(),
        PlanId::new(),
        Some("NHIS-12345".to_string()),
        now(),
    );
    assert_eq!(claim.claim_check_code, "NHIS-12345");
}

#[test]
fn test_totals_track_items() {
    let mut claim = draft_claim_with(&[dec!(10), dec!(20)]);
    assert_eq!(claim.claimed_amount, Money::new(dec!(30)));
    assert_eq!(claim.total_amount, Money::new(dec!(40)));

    let first = claim.items[0].id;
    claim.remove_item(first, now()).unwrap();
    assert_eq!(claim.claimed_amount, Money::new(dec!(20)));
}

#[test]
fn test_empty_claim_cannot_enter_vetting() {
    let mut claim = draft_claim_with(&[]);
    assert!(matches!(
        claim.submit_for_vetting(now()),
        Err(ClaimError::EmptyClaim(_))
    ));
}

#[test]
fn test_vetting_with_partial_approval_sets_approved_amount() {
    // Three items; two approved worth 50 together. The claim is vetted
    // with an approved amount of exactly 50.
    let mut claim = draft_claim_with(&[dec!(30), dec!(20), dec!(15)]);
    claim.submit_for_vetting(now()).unwrap();

    let mut verdicts = approve_all(&claim);
    verdicts.insert(
        claim.items[2].id,
        ItemVerdict::Rejected {
            reason: "duplicate charge".to_string(),
        },
    );

    claim.vet(verdicts, ActorId::new(), now()).unwrap();

    assert_eq!(claim.status, ClaimStatus::Vetted);
    assert_eq!(claim.approved_amount, Some(Money::new(dec!(50))));
    // total 80 (subtotals 35+25+20), approved 50, remainder on the patient
    assert_eq!(claim.patient_copay_amount, Money::new(dec!(30)));
    assert!(claim.vetted_at.is_some());
}

#[test]
fn test_vetter_can_reject_outright() {
    let mut claim = draft_claim_with(&[dec!(10)]);
    claim.submit_for_vetting(now()).unwrap();

    claim.reject("wrong member number", now()).unwrap();

    assert_eq!(claim.status, ClaimStatus::Rejected);
    assert_eq!(
        claim.rejection_reason.as_deref(),
        Some("wrong member number")
    );
}

#[test]
fn test_paid_claim_cannot_be_rejected() {
    let mut claim = draft_claim_with(&[dec!(10)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();
    claim.record_response(ClaimResponse::Paid, now()).unwrap();

    assert!(matches!(
        claim.reject("too late", now()),
        Err(ClaimError::InvalidTransition { .. })
    ));
}

#[test]
fn test_vetting_requires_verdict_for_every_item() {
    let mut claim = draft_claim_with(&[dec!(10), dec!(20)]);
    claim.submit_for_vetting(now()).unwrap();

    let mut verdicts = HashMap::new();
    verdicts.insert(claim.items[0].id, ItemVerdict::Approved);

    assert!(matches!(
        claim.vet(verdicts, ActorId::new(), now()),
        Err(ClaimError::MissingVerdict { .. })
    ));
    assert_eq!(claim.status, ClaimStatus::PendingVetting);
}

#[test]
fn test_rejection_verdict_requires_reason() {
    let mut claim = draft_claim_with(&[dec!(10)]);
    claim.submit_for_vetting(now()).unwrap();

    let mut verdicts = HashMap::new();
    verdicts.insert(
        claim.items[0].id,
        ItemVerdict::Rejected {
            reason: "  ".to_string(),
        },
    );

    assert!(matches!(
        claim.vet(verdicts, ActorId::new(), now()),
        Err(ClaimError::MissingRejectionReason { .. })
    ));
}

#[test]
fn test_all_items_rejected_rejects_claim() {
    let mut claim = draft_claim_with(&[dec!(10), dec!(20)]);
    claim.submit_for_vetting(now()).unwrap();

    let verdicts: HashMap<_, _> = claim
        .items
        .iter()
        .map(|i| {
            (
                i.id,
                ItemVerdict::Rejected {
                    reason: "not covered".to_string(),
                },
            )
        })
        .collect();

    claim.vet(verdicts, ActorId::new(), now()).unwrap();

    assert_eq!(claim.status, ClaimStatus::Rejected);
    assert_eq!(claim.approved_amount, Some(Money::zero()));
    assert!(claim.rejection_reason.is_some());
}

#[test]
fn test_full_happy_path_to_paid() {
    let mut claim = draft_claim_with(&[dec!(25)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();
    claim
        .record_response(ClaimResponse::Approved { approved_amount: None }, now())
        .unwrap();
    claim.mark_paid(now()).unwrap();

    assert_eq!(claim.status, ClaimStatus::Paid);
    assert!(claim.is_terminal());
    assert!(claim.paid_at.is_some());
    assert_eq!(claim.approved_amount, Some(Money::new(dec!(25))));
}

#[test]
fn test_insurer_amount_overrides_vetted_amount() {
    let mut claim = draft_claim_with(&[dec!(25)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();
    claim
        .record_response(
            ClaimResponse::Approved {
                approved_amount: Some(Money::new(dec!(22.50))),
            },
            now(),
        )
        .unwrap();

    assert_eq!(claim.approved_amount, Some(Money::new(dec!(22.50))));
}

#[test]
fn test_partial_insurer_response_rejects_other_items() {
    let mut claim = draft_claim_with(&[dec!(30), dec!(20)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();

    let accepted = vec![claim.items[0].id];
    claim
        .record_response(ClaimResponse::PartiallyApproved { accepted_items: accepted }, now())
        .unwrap();

    assert_eq!(claim.status, ClaimStatus::Approved);
    assert_eq!(claim.approved_amount, Some(Money::new(dec!(30))));
    assert!(matches!(
        claim.items[1].verdict,
        Some(ItemVerdict::Rejected { .. })
    ));
}

#[test]
fn test_partial_response_accepting_nothing_rejects_claim() {
    let mut claim = draft_claim_with(&[dec!(30), dec!(20)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();

    claim
        .record_response(
            ClaimResponse::PartiallyApproved { accepted_items: Vec::new() },
            now(),
        )
        .unwrap();

    assert_eq!(claim.status, ClaimStatus::Rejected);
    assert_eq!(claim.approved_amount, Some(Money::zero()));
    assert!(claim.rejection_reason.is_some());
    assert!(claim
        .items
        .iter()
        .all(|i| matches!(i.verdict, Some(ItemVerdict::Rejected { .. }))));
}

#[test]
fn test_rejected_claim_can_be_resubmitted() {
    let mut claim = draft_claim_with(&[dec!(10)]);
    claim.submit_for_vetting(now()).unwrap();
    claim.vet(approve_all(&claim), ActorId::new(), now()).unwrap();
    claim.submit_to_insurer(ActorId::new(), now()).unwrap();
    claim
        .record_response(
            ClaimResponse::Rejected {
                reason: "member not eligible on service date".to_string(),
            },
            now(),
        )
        .unwrap();
    assert_eq!(claim.status, ClaimStatus::Rejected);

    claim.resubmit(now()).unwrap();

    assert_eq!(claim.status, ClaimStatus::Draft);
    assert_eq!(claim.resubmission_count, 1);
    assert!(claim.items.iter().all(|i| i.verdict.is_none()));
    assert!(claim.approved_amount.is_none());
    assert!(claim.rejection_reason.is_none());
    assert!(claim.vetted_at.is_none());
    assert!(claim.submitted_at.is_none());
}

#[test]
fn test_guards_block_out_of_order_transitions() {
    let mut claim = draft_claim_with(&[dec!(10)]);

    // Cannot vet, submit, or pay a draft
    assert!(matches!(
        claim.vet(approve_all(&claim), ActorId::new(), now()),
        Err(ClaimError::InvalidTransition { .. })
    ));
    assert!(matches!(
        claim.submit_to_insurer(ActorId::new(), now()),
        Err(ClaimError::InvalidTransition { .. })
    ));
    assert!(matches!(
        claim.mark_paid(now()),
        Err(ClaimError::InvalidTransition { .. })
    ));

    // Cannot add items once vetting starts
    claim.submit_for_vetting(now()).unwrap();
    assert!(matches!(
        claim.add_item(line_item(dec!(5)), now()),
        Err(ClaimError::InvalidTransition { .. })
    ));

    // Cannot resubmit a claim that was never rejected
    assert!(matches!(
        claim.resubmit(now()),
        Err(ClaimError::InvalidTransition { .. })
    ));
}

#[test]
fn test_delete_guard() {
    let mut claim = draft_claim_with(&[dec!(10)]);
    assert!(claim.ensure_deletable().is_ok());

    claim.submit_for_vetting(now()).unwrap();
    assert!(matches!(
        claim.ensure_deletable(),
        Err(ClaimError::NotDeletable(_))
    ));
}
