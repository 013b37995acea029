//! Contribution Tracker: payments tied to a tour

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tontine_types::{
    Amount, CommandContext, Contribution, ContributionId, MemberId, PaymentMethod, RecordKind,
    TontineError, TontineResult, TourId, TourStatus, Transaction,
};
use tracing::info;

use crate::unit::AssociationUnit;

/// Collection progress of one tour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourStats {
    pub tour_id: TourId,
    pub total_collected: Amount,
    pub contributor_count: usize,
    pub expected_amount: Amount,
    /// `total_collected / expected_amount`, 0.0 when nothing is expected
    pub collection_rate: f64,
}

/// Outcome of deleting a contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDeletion {
    pub contribution_id: ContributionId,
    pub amount: Amount,
    /// Compensating ledger entry; `None` if the contribution never reached the ledger
    pub reversal: Option<Transaction>,
}

/// A contribution to record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    pub member_id: MemberId,
    pub tour_id: TourId,
    pub amount: Amount,
    pub method: PaymentMethod,
}

impl NewContribution {
    pub fn new(member_id: MemberId, tour_id: TourId, amount: Amount) -> Self {
        Self {
            member_id,
            tour_id,
            amount,
            method: PaymentMethod::default(),
        }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }
}

/// Records and reverses contributions against an association's ledger
pub struct ContributionTracker;

impl ContributionTracker {
    pub fn record_contribution(
        unit: &mut AssociationUnit,
        input: NewContribution,
        ctx: &CommandContext,
    ) -> TontineResult<Contribution> {
        if input.amount.is_zero() {
            return Err(TontineError::validation(
                "contribution amount must be greater than zero",
            ));
        }

        let association_id = unit.association.id.clone();
        let tour = unit
            .tours
            .iter()
            .find(|t| t.id == input.tour_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Tour, &input.tour_id))?;
        if tour.association_id != association_id {
            return Err(TontineError::validation(format!(
                "tour {} does not belong to association {}",
                tour.id, association_id
            )));
        }
        if !tour.status.is_collecting() {
            return Err(closed_tour(tour.status));
        }
        if !unit.association.is_active_member(&input.member_id) {
            return Err(TontineError::not_found(
                RecordKind::Membership,
                &input.member_id,
            ));
        }

        let cycle = unit.association.current_cycle;
        let contribution = Contribution::new(
            association_id,
            input.member_id,
            input.tour_id,
            cycle,
            input.amount,
            input.method,
            ctx.actor_id().clone(),
        )
        .with_idempotency_key(ctx.idempotency_key.clone());

        unit.ledger_mut().record_contribution(
            ctx,
            contribution.amount,
            contribution.id.clone(),
            contribution.tour_id.clone(),
            contribution.member_id.clone(),
            cycle,
        )?;
        unit.contributions.push(contribution.clone());

        info!(
            association = %contribution.association_id,
            contribution = %contribution.id,
            tour = %contribution.tour_id,
            member = %contribution.member_id,
            amount = contribution.amount.0,
            actor = %ctx.actor_id(),
            "Contribution recorded"
        );
        Ok(contribution)
    }

    /// Remove a contribution and post its exact inverse to the ledger
    pub fn delete_contribution(
        unit: &mut AssociationUnit,
        contribution_id: &ContributionId,
        ctx: &CommandContext,
    ) -> TontineResult<ContributionDeletion> {
        let contribution = unit.contribution(contribution_id)?.clone();
        let tour = unit.tour(&contribution.tour_id)?;
        if !tour.status.is_collecting() {
            return Err(closed_tour(tour.status));
        }

        // Only received contributions ever reached the ledger.
        let reversal = if contribution.is_received() {
            Some(unit.ledger_mut().reverse_contribution(
                ctx,
                contribution.amount,
                contribution.id.clone(),
                contribution.tour_id.clone(),
                contribution.member_id.clone(),
                contribution.cycle,
            )?)
        } else {
            None
        };
        unit.contributions.retain(|c| &c.id != contribution_id);

        info!(
            association = %contribution.association_id,
            contribution = %contribution.id,
            amount = contribution.amount.0,
            actor = %ctx.actor_id(),
            "Contribution deleted"
        );
        Ok(ContributionDeletion {
            contribution_id: contribution.id,
            amount: contribution.amount,
            reversal,
        })
    }

    /// Pure read of a tour's collection progress
    pub fn get_tour_stats(unit: &AssociationUnit, tour_id: &TourId) -> TontineResult<TourStats> {
        unit.tour(tour_id)?;
        let total_collected = unit.collected_for_tour(tour_id)?;
        let contributor_count = unit
            .contributions_for_tour(tour_id)
            .filter(|c| c.is_received())
            .map(|c| &c.member_id)
            .collect::<HashSet<_>>()
            .len();
        let expected_amount = unit.association.total_pool();
        let collection_rate = if expected_amount.is_zero() {
            0.0
        } else {
            total_collected.0 as f64 / expected_amount.0 as f64
        };

        Ok(TourStats {
            tour_id: tour_id.clone(),
            total_collected,
            contributor_count,
            expected_amount,
            collection_rate,
        })
    }
}

fn closed_tour(status: TourStatus) -> TontineError {
    TontineError::InvalidTransition {
        from: format!("{:?}", status),
        to: "collecting".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tontine_ledger::LedgerReader;
    use tontine_types::{
        ActorId, AssignmentMode, Association, AssociationSpec, Frequency, MemberProfile, Tour,
    };

    fn setup() -> (AssociationUnit, TourId) {
        let spec = AssociationSpec::new(
            "Tontine des amis",
            Amount::new(10_000),
            Frequency::Weekly,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        );
        let mut association = Association::new(spec, ActorId::new("admin")).unwrap();
        for (id, name) in [("m1", "Awa"), ("m2", "Bakary"), ("m3", "Coumba")] {
            association
                .add_membership(MemberProfile::new(id, name))
                .unwrap();
        }
        let tour = Tour::new(
            association.id.clone(),
            MemberId::new("m1"),
            "Awa",
            1,
            1,
            association.total_pool(),
            AssignmentMode::Alphabetical,
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            ActorId::new("admin"),
        );
        let tour_id = tour.id.clone();
        let mut unit = AssociationUnit::new(association);
        unit.tours.push(tour);
        (unit, tour_id)
    }

    fn pay(member: &str, tour_id: &TourId, amount: u64) -> NewContribution {
        NewContribution::new(MemberId::new(member), tour_id.clone(), Amount::new(amount))
    }

    #[test]
    fn test_record_then_delete_restores_ledger() {
        let (mut unit, tour_id) = setup();
        let ctx = CommandContext::system();
        ContributionTracker::record_contribution(&mut unit, pay("m2", &tour_id, 4_000), &ctx)
            .unwrap();
        let before = unit.ledger.as_ref().unwrap().balances();

        let contribution =
            ContributionTracker::record_contribution(&mut unit, pay("m3", &tour_id, 10_000), &ctx)
                .unwrap();
        assert_eq!(contribution.cycle, 1);
        assert_eq!(contribution.recorded_by, ActorId::new("system"));

        let deletion =
            ContributionTracker::delete_contribution(&mut unit, &contribution.id, &ctx).unwrap();
        assert!(deletion.reversal.is_some());
        assert_eq!(unit.ledger.as_ref().unwrap().balances(), before);
        assert_eq!(unit.contributions.len(), 1);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (mut unit, tour_id) = setup();
        let err = ContributionTracker::record_contribution(
            &mut unit,
            pay("m2", &tour_id, 0),
            &CommandContext::system(),
        )
        .unwrap_err();
        assert!(matches!(err, TontineError::Validation(_)));
        assert!(unit.ledger.is_none());
    }

    #[test]
    fn test_unknown_tour_and_non_member() {
        let (mut unit, tour_id) = setup();
        let ctx = CommandContext::system();

        let err = ContributionTracker::record_contribution(
            &mut unit,
            pay("m2", &TourId::new("missing"), 1_000),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, TontineError::NotFound { kind: RecordKind::Tour, .. }));

        let err =
            ContributionTracker::record_contribution(&mut unit, pay("nobody", &tour_id, 1_000), &ctx)
                .unwrap_err();
        assert!(matches!(err, TontineError::NotFound { kind: RecordKind::Membership, .. }));
    }

    #[test]
    fn test_closed_tour_rejects_contributions() {
        let (mut unit, tour_id) = setup();
        unit.tour_mut(&tour_id).unwrap().status = TourStatus::Paid;
        let err = ContributionTracker::record_contribution(
            &mut unit,
            pay("m2", &tour_id, 1_000),
            &CommandContext::system(),
        )
        .unwrap_err();
        assert!(matches!(err, TontineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_tour_stats() {
        let (mut unit, tour_id) = setup();
        let ctx = CommandContext::system();
        ContributionTracker::record_contribution(&mut unit, pay("m1", &tour_id, 10_000), &ctx)
            .unwrap();
        ContributionTracker::record_contribution(&mut unit, pay("m2", &tour_id, 5_000), &ctx)
            .unwrap();
        ContributionTracker::record_contribution(&mut unit, pay("m2", &tour_id, 5_000), &ctx)
            .unwrap();

        let ledger_before = unit.ledger.as_ref().unwrap().transactions().len();
        let stats = ContributionTracker::get_tour_stats(&unit, &tour_id).unwrap();
        assert_eq!(stats.total_collected, Amount::new(20_000));
        assert_eq!(stats.contributor_count, 2);
        assert_eq!(stats.expected_amount, Amount::new(30_000));
        assert!((stats.collection_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(unit.ledger.as_ref().unwrap().transactions().len(), ledger_before);
    }
}
