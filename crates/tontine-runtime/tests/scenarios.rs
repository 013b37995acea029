//! End-to-end rotation and ledger scenarios

mod common;

use common::{engine, pay, setup, treasurer};
use tontine_runtime::StatusChange;
use tontine_runtime::TontineEngine;
use tontine_types::{
    Amount, AssignmentMode, AssociationId, AssociationStatus, ErrorKind, LedgerScope, MemberId,
    MemberRef, RedistributionShare, TontineError, TourStatus, TransactionKind,
};

/// Assign the next tour alphabetically, fund it from its beneficiary and pay it
fn assign_and_pay(engine: &TontineEngine, association_id: &AssociationId) {
    let ctx = treasurer();
    let tour = engine
        .assign_next_tour(association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(association_id, pay(tour.beneficiary.as_str(), &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap();
}

#[test]
fn scenario_a_totals_follow_active_members() {
    let engine = engine();
    let association_id = setup(&engine);

    let totals = engine.association_totals(&association_id).unwrap();
    assert_eq!(totals.active_member_count, 3);
    assert_eq!(totals.total_pool, Amount::new(30_000));
    assert_eq!(totals.total_cycles, 3);

    let totals = engine
        .deactivate_member(&association_id, &MemberId::new("m3"), &treasurer())
        .unwrap();
    assert_eq!(totals.active_member_count, 2);
    assert_eq!(totals.total_pool, Amount::new(20_000));
}

#[test]
fn scenario_b_one_tour_per_member_per_cycle() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    let mut beneficiaries = Vec::new();
    for expected in 1..=3 {
        let tour = engine
            .assign_next_tour(&association_id, AssignmentMode::Lottery, &ctx)
            .unwrap();
        assert_eq!(tour.tour_number, expected);
        assert_eq!(tour.cycle, 1);
        beneficiaries.push(tour.beneficiary);
    }
    beneficiaries.sort();
    beneficiaries.dedup();
    assert_eq!(beneficiaries.len(), 3);

    let err = engine
        .assign_next_tour(&association_id, AssignmentMode::Lottery, &ctx)
        .unwrap_err();
    assert!(matches!(err, TontineError::NoEligibleMember { .. }));
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Active
    );
}

#[test]
fn scenario_c_contribution_then_payout() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m2", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap();

    let balances = engine.balances(&scope).unwrap();
    assert_eq!(balances.cash_from_contributions, Amount::zero());
    assert_eq!(balances.total_contributed, Amount::new(10_000));
    assert_eq!(balances.total_distributed, Amount::new(10_000));

    let paid = engine.get_tour(&tour.id).unwrap();
    assert_eq!(paid.status, TourStatus::Paid);
    assert!(paid.payment_date.is_some());
}

#[test]
fn scenario_d_refusal_moves_funds_to_refusal_pool() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 6_000), &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m3", &tour.id, 4_000), &ctx)
        .unwrap();
    let before = engine.balances(&scope).unwrap();

    engine
        .update_tour_status(&tour.id, StatusChange::refused("beneficiary declined"), &ctx)
        .unwrap();

    let after = engine.balances(&scope).unwrap();
    assert_eq!(
        after.cash_from_contributions,
        before.cash_from_contributions.checked_sub(Amount::new(10_000)).unwrap()
    );
    assert_eq!(after.cash_from_refusals, Amount::new(10_000));
    assert_eq!(after.total_balance(), before.total_balance());
    assert_eq!(after.total_refused, Amount::new(10_000));

    let refused = engine.refused_tours(&scope).unwrap();
    assert_eq!(refused.len(), 1);
    assert_eq!(refused[0].tour_id, tour.id);
    assert_eq!(refused[0].reason.as_deref(), Some("beneficiary declined"));
}

#[test]
fn scenario_e_redistribution_empties_refusal_pool() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Manual(MemberId::new("m1")), &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m2", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::refused("travel"), &ctx)
        .unwrap();
    let before = engine.balances(&scope).unwrap();

    let records = engine
        .redistribute(
            &association_id,
            &[
                RedistributionShare::new("m2", Amount::new(5_000)),
                RedistributionShare::new("m3", Amount::new(5_000)),
            ],
            &ctx,
        )
        .unwrap();

    let after = engine.balances(&scope).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(after.cash_from_refusals, Amount::zero());
    assert_eq!(
        after.total_balance(),
        before.total_balance().checked_sub(Amount::new(10_000)).unwrap()
    );
    assert_eq!(engine.redistributions(&scope).unwrap().len(), 2);

    let redistributed = engine
        .transactions(&scope)
        .unwrap()
        .iter()
        .filter(|t| t.kind == TransactionKind::Redistribution)
        .count();
    assert_eq!(redistributed, 2);
}

#[test]
fn test_redistribution_over_pool_has_no_effect() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m2", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::refused("travel"), &ctx)
        .unwrap();
    let log_len = engine.transactions(&scope).unwrap().len();

    let err = engine
        .redistribute(
            &association_id,
            &[
                RedistributionShare::new("m2", Amount::new(8_000)),
                RedistributionShare::new("m3", Amount::new(8_000)),
            ],
            &ctx,
        )
        .unwrap_err();
    assert!(matches!(err, TontineError::InsufficientFunds { .. }));
    assert_eq!(engine.transactions(&scope).unwrap().len(), log_len);
    assert_eq!(
        engine.balances(&scope).unwrap().cash_from_refusals,
        Amount::new(10_000)
    );
}

#[test]
fn test_contribution_delete_round_trip() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 2_500), &ctx)
        .unwrap();
    let before = engine.balances(&scope).unwrap();

    let contribution = engine
        .record_contribution(&association_id, pay("m2", &tour.id, 7_500), &ctx)
        .unwrap();
    engine.delete_contribution(&contribution.id, &ctx).unwrap();

    assert_eq!(engine.balances(&scope).unwrap(), before);
    assert_eq!(engine.contributions_for_tour(&tour.id).unwrap().len(), 1);
}

#[test]
fn test_contribution_cannot_be_deleted_after_payout() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    let contribution = engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap();

    let err = engine.delete_contribution(&contribution.id, &ctx).unwrap_err();
    assert!(matches!(err, TontineError::InvalidTransition { .. }));
}

#[test]
fn test_cancel_refusal_to_paid() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::refused("hesitated"), &ctx)
        .unwrap();
    let paid = engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap();

    assert_eq!(paid.status, TourStatus::Paid);
    let balances = engine.balances(&scope).unwrap();
    assert_eq!(balances.cash_from_refusals, Amount::zero());
    assert_eq!(balances.total_refused, Amount::zero());
    assert_eq!(balances.total_distributed, Amount::new(10_000));
    assert!(engine.refused_tours(&scope).unwrap().is_empty());
}

#[test]
fn test_cancel_refusal_after_redistribution_fails_atomically() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::refused("declined"), &ctx)
        .unwrap();
    engine
        .redistribute(
            &association_id,
            &[RedistributionShare::new("m3", Amount::new(10_000))],
            &ctx,
        )
        .unwrap();
    let before = engine.balances(&scope).unwrap();

    let err = engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Assigned), &ctx)
        .unwrap_err();
    assert!(matches!(err, TontineError::InsufficientFunds { .. }));
    assert_eq!(engine.get_tour(&tour.id).unwrap().status, TourStatus::Refused);
    assert_eq!(engine.balances(&scope).unwrap(), before);
}

#[test]
fn test_idempotent_retries() {
    let engine = engine();
    let association_id = setup(&engine);
    let scope = LedgerScope::Association(association_id.clone());

    let assign = treasurer().with_idempotency_key("assign-1");
    let first = engine
        .assign_next_tour(&association_id, AssignmentMode::Lottery, &assign)
        .unwrap();
    let again = engine
        .assign_next_tour(&association_id, AssignmentMode::Lottery, &assign)
        .unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(engine.tours_for_cycle(&association_id, 1).unwrap().len(), 1);

    let record = treasurer().with_idempotency_key("pay-1");
    let c1 = engine
        .record_contribution(&association_id, pay("m1", &first.id, 10_000), &record)
        .unwrap();
    let c2 = engine
        .record_contribution(&association_id, pay("m1", &first.id, 10_000), &record)
        .unwrap();
    assert_eq!(c1.id, c2.id);
    assert_eq!(
        engine.balances(&scope).unwrap().total_contributed,
        Amount::new(10_000)
    );

    let delete = treasurer().with_idempotency_key("delete-1");
    let d1 = engine.delete_contribution(&c1.id, &delete).unwrap();
    let d2 = engine.delete_contribution(&c1.id, &delete).unwrap();
    assert_eq!(d1, d2);
    assert_eq!(engine.balances(&scope).unwrap().total_contributed, Amount::zero());
}

#[test]
fn test_global_ledger_accepts_collaborator_postings() {
    use tontine_types::{ActorId, TransactionDraft};

    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    engine
        .append_transaction(
            &LedgerScope::Global,
            TransactionDraft::new(
                TransactionKind::SolidarityPayment,
                Amount::new(2_000),
                ActorId::new("solidarity"),
            ),
        )
        .unwrap();
    engine
        .append_transaction(
            &LedgerScope::Global,
            TransactionDraft::new(
                TransactionKind::CardPayment,
                Amount::new(500),
                ActorId::new("cards"),
            ),
        )
        .unwrap();
    let err = engine
        .append_transaction(
            &LedgerScope::Global,
            TransactionDraft::new(TransactionKind::Payout, Amount::new(100), ActorId::new("cards")),
        )
        .unwrap_err();
    assert!(matches!(err, TontineError::Validation(_)));

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();

    let summary = engine.global_summary().unwrap();
    assert_eq!(summary.global.total_balance(), Amount::new(2_500));
    assert_eq!(summary.associations.total_balance(), Amount::new(10_000));
    assert_eq!(summary.combined.total_contributed, Amount::new(12_500));
    assert_eq!(summary.association_ledgers, 1);
    assert_eq!(summary.transactions, 3);
}

#[test]
fn test_recompute_all_is_idempotent() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();

    let first = engine.recompute_all_ledgers().unwrap();
    let second = engine.recompute_all_ledgers().unwrap();
    assert_eq!(first.ledgers_scanned, 2);
    assert_eq!(first.ledgers_repaired, 0);
    assert_eq!(second.ledgers_repaired, 0);
    let after: Vec<_> = first.outcomes.iter().map(|o| o.after).collect();
    let again: Vec<_> = second.outcomes.iter().map(|o| o.after).collect();
    assert_eq!(after.len(), again.len());
    for balances in &after {
        assert!(again.contains(balances));
    }
}

#[test]
fn test_delete_association_then_purge() {
    let engine = engine();
    let association_id = setup(&engine);
    let keep = setup(&engine);
    let ctx = treasurer();

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();

    engine.delete_association(&association_id, &ctx).unwrap();
    assert!(matches!(
        engine.get_association(&association_id).unwrap_err(),
        TontineError::NotFound { .. }
    ));

    let report = engine.purge_orphaned(&ctx).unwrap();
    assert_eq!(report.tours_removed, 1);
    assert_eq!(report.contributions_removed, 1);
    assert_eq!(report.ledgers_removed, 1);
    assert_eq!(report.index_entries_repaired, 2);
    assert_eq!(report.findings.len(), 3);
    assert!(report
        .findings
        .iter()
        .all(|f| matches!(f, TontineError::OrphanedReference { .. })));

    let second = engine.purge_orphaned(&ctx).unwrap();
    assert!(second.is_clean());
    assert!(engine.get_association(&keep).is_ok());
}

#[test]
fn test_suspended_association_blocks_mutations() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &ctx)
        .unwrap();
    engine.suspend_association(&association_id, &ctx).unwrap();

    let err = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap_err();
    assert!(matches!(err, TontineError::InvalidTransition { .. }));
    let err = engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap_err();
    assert!(matches!(err, TontineError::InvalidTransition { .. }));

    let resumed = engine.resume_association(&association_id, &ctx).unwrap();
    assert_eq!(resumed.status, AssociationStatus::Active);
    engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &ctx)
        .unwrap();
}

#[test]
fn test_snapshot_round_trip_preserves_state() {
    use std::sync::Arc;
    use tontine_runtime::{EngineConfig, InMemoryDirectory, Snapshot, TontineEngine};

    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();
    let scope = LedgerScope::Association(association_id.clone());

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m2", &tour.id, 10_000), &ctx)
        .unwrap();
    engine
        .update_tour_status(&tour.id, StatusChange::refused("declined"), &ctx)
        .unwrap();

    let json = engine.snapshot().unwrap().to_json().unwrap();
    let restored = TontineEngine::from_snapshot(
        Snapshot::from_json(&json).unwrap(),
        EngineConfig::default(),
        Arc::new(InMemoryDirectory::new()),
    )
    .unwrap();

    assert_eq!(restored.balances(&scope).unwrap(), engine.balances(&scope).unwrap());
    assert_eq!(restored.get_tour(&tour.id).unwrap().status, TourStatus::Refused);
    assert_eq!(restored.refused_tours(&scope).unwrap().len(), 1);
    assert_eq!(
        restored.association_totals(&association_id).unwrap().active_member_count,
        3
    );

    // The restored engine keeps working on the same log.
    restored
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Assigned), &ctx)
        .unwrap();
    assert_eq!(
        restored.balances(&scope).unwrap().cash_from_contributions,
        Amount::new(10_000)
    );
}

#[test]
fn test_rotation_finishes_when_unserved_member_leaves() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    assign_and_pay(&engine, &association_id);
    assign_and_pay(&engine, &association_id);
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Active
    );

    let totals = engine
        .deactivate_member(&association_id, &MemberId::new("m3"), &ctx)
        .unwrap();
    assert_eq!(totals.total_cycles, 2);
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Finished
    );
}

#[test]
fn test_member_leaving_mid_cycle_keeps_rotation_open() {
    let engine = engine();
    let association_id = setup(&engine);

    assign_and_pay(&engine, &association_id);
    engine
        .deactivate_member(&association_id, &MemberId::new("m3"), &treasurer())
        .unwrap();
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Active
    );
}

#[test]
fn test_new_member_reopens_finished_rotation() {
    let engine = engine();
    let association_id = setup(&engine);
    let ctx = treasurer();

    for _ in 0..3 {
        assign_and_pay(&engine, &association_id);
    }
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Finished
    );
    let err = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap_err();
    assert!(matches!(err, TontineError::InvalidTransition { .. }));

    let totals = engine
        .add_member(&association_id, MemberRef::Id(MemberId::new("m4")), &ctx)
        .unwrap();
    assert_eq!(totals.total_cycles, 4);
    assert_eq!(
        engine.get_association(&association_id).unwrap().status,
        AssociationStatus::Active
    );

    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &ctx)
        .unwrap();
    assert_eq!(tour.beneficiary, MemberId::new("m4"));
    assert_eq!(tour.tour_number, 4);
}

#[test]
fn test_status_update_rejects_key_used_by_contribution() {
    let engine = engine();
    let association_id = setup(&engine);
    let scope = LedgerScope::Association(association_id.clone());

    let keyed = treasurer().with_idempotency_key("k-1");
    let tour = engine
        .assign_next_tour(&association_id, AssignmentMode::Alphabetical, &treasurer())
        .unwrap();
    engine
        .record_contribution(&association_id, pay("m1", &tour.id, 10_000), &keyed)
        .unwrap();

    let err = engine
        .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &keyed)
        .unwrap_err();
    assert!(matches!(err, TontineError::Validation(_)));
    assert_eq!(engine.get_tour(&tour.id).unwrap().status, TourStatus::Assigned);
    assert_eq!(
        engine.balances(&scope).unwrap().total_distributed,
        Amount::zero()
    );

    let settle = treasurer().with_idempotency_key("settle-1");
    for _ in 0..2 {
        let paid = engine
            .update_tour_status(&tour.id, StatusChange::new(TourStatus::Paid), &settle)
            .unwrap();
        assert_eq!(paid.status, TourStatus::Paid);
    }
    assert_eq!(
        engine.balances(&scope).unwrap().total_distributed,
        Amount::new(10_000)
    );
}

#[test]
fn test_recompute_all_reports_corrupt_log_and_continues() {
    use std::sync::Arc;
    use tontine_runtime::{EngineConfig, InMemoryDirectory, Snapshot};

    let engine = engine();
    let corrupt = setup(&engine);
    let healthy = setup(&engine);
    let ctx = treasurer();
    for association_id in [&corrupt, &healthy] {
        let tour = engine
            .assign_next_tour(association_id, AssignmentMode::Alphabetical, &ctx)
            .unwrap();
        for member in ["m1", "m2"] {
            engine
                .record_contribution(association_id, pay(member, &tour.id, 10_000), &ctx)
                .unwrap();
        }
    }

    let json = engine.snapshot().unwrap().to_json().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let ledger = value["ledgers"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|l| l["scope"]["association"] == serde_json::json!(corrupt.as_str()))
        .unwrap();
    ledger["transactions"][1]["seq"] = serde_json::json!(7);

    let restored = TontineEngine::from_snapshot(
        Snapshot::from_json(&value.to_string()).unwrap(),
        EngineConfig::default(),
        Arc::new(InMemoryDirectory::new()),
    )
    .unwrap();
    let corrupt_scope = LedgerScope::Association(corrupt.clone());
    let before = restored.balances(&corrupt_scope).unwrap();

    let report = restored.recompute_all_ledgers().unwrap();
    assert_eq!(report.ledgers_scanned, 3);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scope, corrupt_scope);
    assert_eq!(report.failures[0].kind, ErrorKind::Storage);

    assert_eq!(restored.balances(&corrupt_scope).unwrap(), before);
    assert_eq!(
        restored
            .balances(&LedgerScope::Association(healthy.clone()))
            .unwrap()
            .total_contributed,
        Amount::new(20_000)
    );
}
