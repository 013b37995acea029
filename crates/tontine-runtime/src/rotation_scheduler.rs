//! Rotation Scheduler: beneficiary selection and tour lifecycle
//!
//! A cycle is one full round of the rotation. Every active member receives
//! exactly one tour per cycle, so `(association, beneficiary, cycle)` is
//! unique. The scheduler runs inside the association's serialization unit;
//! the uniqueness check and the insert happen under the same lock.

use chrono::{NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tontine_types::{
    AssignmentMode, AssociationStatus, CommandContext, MemberProfile, RecordKind,
    RefusalResolution, TontineError, TontineResult, Tour, TourId, TourStatus,
};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::unit::AssociationUnit;

/// Requested tour status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: TourStatus,
    /// Actual payment date when moving to paid, defaults to today
    pub payment_date: Option<NaiveDate>,
    /// Reason recorded with a refusal
    pub reason: Option<String>,
}

impl StatusChange {
    pub fn new(status: TourStatus) -> Self {
        Self {
            status,
            payment_date: None,
            reason: None,
        }
    }

    pub fn paid_on(date: NaiveDate) -> Self {
        Self {
            status: TourStatus::Paid,
            payment_date: Some(date),
            reason: None,
        }
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            status: TourStatus::Refused,
            payment_date: None,
            reason: Some(reason.into()),
        }
    }
}

/// Assigns tours and applies tour status transitions
pub struct RotationScheduler<'a> {
    config: &'a EngineConfig,
}

impl<'a> RotationScheduler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Active members without a tour in the current cycle, in membership order
    pub fn eligible_members(unit: &AssociationUnit) -> Vec<MemberProfile> {
        let cycle = unit.association.current_cycle;
        unit.association
            .active_memberships()
            .filter(|m| !unit.has_tour_in_cycle(m.member_id(), cycle))
            .map(|m| m.member.clone())
            .collect()
    }

    /// Open the next tour of the current cycle
    pub fn assign_next_tour<R: Rng + ?Sized>(
        &self,
        unit: &mut AssociationUnit,
        mode: AssignmentMode,
        ctx: &CommandContext,
        rng: &mut R,
    ) -> TontineResult<Tour> {
        let association = &unit.association;
        if !association.status.is_operational() {
            return Err(TontineError::invalid_transition(
                association.status,
                AssociationStatus::Active,
            ));
        }

        let cycle = association.current_cycle;
        let eligible = Self::eligible_members(unit);
        if eligible.is_empty() {
            warn!(
                association = %association.id,
                cycle,
                "No eligible member left in cycle"
            );
            return Err(TontineError::NoEligibleMember {
                association: association.id.clone(),
                cycle,
            });
        }

        let beneficiary = match &mode {
            AssignmentMode::Lottery => eligible.choose(rng).cloned(),
            AssignmentMode::Alphabetical => eligible
                .iter()
                .min_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)))
                .cloned(),
            AssignmentMode::Manual(member_id) | AssignmentMode::Emergency(member_id) => {
                let membership = association
                    .active_membership(member_id)
                    .ok_or_else(|| TontineError::not_found(RecordKind::Membership, member_id))?;
                Some(membership.member.clone())
            }
        }
        .ok_or_else(|| TontineError::NoEligibleMember {
            association: association.id.clone(),
            cycle,
        })?;

        // Uniqueness is checked at the insert, not only through `eligible`.
        if unit.has_tour_in_cycle(&beneficiary.id, cycle) {
            warn!(
                association = %association.id,
                member = %beneficiary.id,
                cycle,
                "Duplicate tour assignment rejected"
            );
            return Err(TontineError::DuplicateAssignment {
                association: association.id.clone(),
                member: beneficiary.id,
                cycle,
            });
        }

        let last = unit.tours.iter().max_by_key(|t| t.tour_number);
        let tour_number = last.map(|t| t.tour_number + 1).unwrap_or(1);
        let previous_date = last.map(|t| t.scheduled_date).unwrap_or(association.start_date);
        let scheduled_date = association.frequency.advance(previous_date)?;

        let tour = Tour::new(
            association.id.clone(),
            beneficiary.id.clone(),
            beneficiary.name.clone(),
            cycle,
            tour_number,
            association.total_pool(),
            mode.clone(),
            scheduled_date,
            ctx.actor_id().clone(),
        )
        .with_idempotency_key(ctx.idempotency_key.clone());

        unit.association.activate()?;
        unit.tours.push(tour.clone());

        if matches!(mode, AssignmentMode::Emergency(_)) {
            warn!(
                association = %tour.association_id,
                member = %tour.beneficiary,
                tour_number,
                "Emergency tour assigned ahead of rotation order"
            );
        }
        info!(
            association = %tour.association_id,
            tour = %tour.id,
            member = %tour.beneficiary,
            cycle,
            tour_number,
            mode = mode.label(),
            scheduled = %scheduled_date,
            actor = %ctx.actor_id(),
            "Tour assigned"
        );

        Ok(tour)
    }

    /// Move a tour to a new status and post the matching ledger transactions
    pub fn update_tour_status(
        &self,
        unit: &mut AssociationUnit,
        tour_id: &TourId,
        change: StatusChange,
        ctx: &CommandContext,
    ) -> TontineResult<Tour> {
        if unit.association.status == AssociationStatus::Suspended {
            return Err(TontineError::invalid_transition(
                unit.association.status,
                unit.association.status,
            ));
        }

        let tour = unit.tour(tour_id)?;
        let previous = tour.status;
        let next = change.status;
        if !previous.can_transition_to(next) {
            warn!(
                tour = %tour_id,
                from = ?previous,
                to = ?next,
                "Invalid tour transition rejected"
            );
            return Err(TontineError::invalid_transition(previous, next));
        }

        let beneficiary = tour.beneficiary.clone();
        let cycle = tour.cycle;
        let collected = unit.collected_for_tour(tour_id)?;
        let today = Utc::now().date_naive();

        match (previous, next) {
            (TourStatus::Assigned, TourStatus::Paid) => {
                if collected.is_zero() {
                    return Err(TontineError::validation(format!(
                        "tour {} has no collected funds to pay out",
                        tour_id
                    )));
                }
                unit.ledger_mut()
                    .record_payout(ctx, collected, tour_id.clone(), beneficiary, cycle)?;

                let tour = unit.tour_mut(tour_id)?;
                tour.settled_amount = Some(collected);
                tour.payment_date = Some(change.payment_date.unwrap_or(today));
            }
            (TourStatus::Assigned, TourStatus::Refused) => {
                if collected.is_zero() && !self.config.allow_zero_refusal {
                    return Err(TontineError::validation(format!(
                        "tour {} has no collected funds to refuse",
                        tour_id
                    )));
                }
                unit.ledger_mut().record_refusal(
                    ctx,
                    collected,
                    tour_id.clone(),
                    beneficiary,
                    cycle,
                    change.reason.clone(),
                )?;

                let tour = unit.tour_mut(tour_id)?;
                tour.settled_amount = Some(collected);
                tour.refusal_reason = change.reason;
            }
            (TourStatus::Refused, TourStatus::Assigned) => {
                unit.ledger_mut()
                    .cancel_refusal(ctx, tour_id, RefusalResolution::Assigned)?;

                let tour = unit.tour_mut(tour_id)?;
                tour.settled_amount = None;
                tour.refusal_reason = None;
            }
            (TourStatus::Refused, TourStatus::Paid) => {
                let ledger = unit.ledger_mut();
                let refused = ledger
                    .refused_tour(tour_id)
                    .map(|r| r.amount)
                    .ok_or_else(|| TontineError::not_found(RecordKind::RefusedTour, tour_id))?;
                if refused.is_zero() {
                    return Err(TontineError::validation(format!(
                        "refused tour {} holds no funds to pay out",
                        tour_id
                    )));
                }
                ledger.cancel_refusal(ctx, tour_id, RefusalResolution::Paid)?;

                let tour = unit.tour_mut(tour_id)?;
                tour.settled_amount = Some(refused);
                tour.refusal_reason = None;
                tour.payment_date = Some(change.payment_date.unwrap_or(today));
            }
            (from, to) => return Err(TontineError::invalid_transition(from, to)),
        }

        unit.tour_mut(tour_id)?.transition(next)?;
        unit.refresh_completion();

        let tour = unit.tour(tour_id)?.clone();
        info!(
            association = %tour.association_id,
            tour = %tour.id,
            from = ?previous,
            to = ?next,
            amount = tour.settled_amount.map(|a| a.0).unwrap_or(0),
            actor = %ctx.actor_id(),
            association_status = ?unit.association.status,
            "Tour status updated"
        );
        Ok(tour)
    }
}
