//! Tours: one payout event to one beneficiary within a cycle

use crate::{
    ActorId, Amount, AssociationId, IdempotencyKey, MemberId, TontineError, TontineResult, TourId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How a tour's beneficiary was chosen
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "member", rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Uniformly random among eligible members
    Lottery,
    /// First eligible member by name
    Alphabetical,
    /// Caller-chosen eligible member
    Manual(MemberId),
    /// Caller-chosen member served ahead of the normal queue order.
    ///
    /// The member takes the next free tour number and date of the current
    /// cycle. Tours already assigned keep their numbers and dates; nothing in
    /// the cycle is reordered.
    Emergency(MemberId),
}

impl AssignmentMode {
    /// The caller-chosen member, for modes that carry one
    pub fn chosen_member(&self) -> Option<&MemberId> {
        match self {
            AssignmentMode::Manual(id) | AssignmentMode::Emergency(id) => Some(id),
            AssignmentMode::Lottery | AssignmentMode::Alphabetical => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssignmentMode::Lottery => "lottery",
            AssignmentMode::Alphabetical => "alphabetical",
            AssignmentMode::Manual(_) => "manual",
            AssignmentMode::Emergency(_) => "emergency",
        }
    }
}

/// Status of a tour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TourStatus {
    #[default]
    Assigned,
    Paid,
    Pending,
    Refused,
}

impl TourStatus {
    /// Allowed status changes. Everything else is an invalid transition.
    pub fn can_transition_to(&self, next: TourStatus) -> bool {
        matches!(
            (self, next),
            (TourStatus::Assigned, TourStatus::Paid)
                | (TourStatus::Assigned, TourStatus::Refused)
                | (TourStatus::Refused, TourStatus::Assigned)
                | (TourStatus::Refused, TourStatus::Paid)
        )
    }

    /// Open for collecting contributions
    pub fn is_collecting(&self) -> bool {
        matches!(self, TourStatus::Assigned)
    }

    /// Paid or refused: the tour no longer waits on the rotation
    pub fn is_resolved(&self) -> bool {
        matches!(self, TourStatus::Paid | TourStatus::Refused)
    }
}

/// A tour record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    pub id: TourId,
    pub association_id: AssociationId,
    pub beneficiary: MemberId,
    pub beneficiary_name: String,
    pub cycle: u32,
    /// Sequential per association, starting at 1
    pub tour_number: u32,
    /// Pool size at assignment time
    pub amount_to_receive: Amount,
    pub mode: AssignmentMode,
    pub status: TourStatus,
    pub scheduled_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    /// Amount moved by the last payout or refusal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<String>,
    pub assigned_by: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        association_id: AssociationId,
        beneficiary: MemberId,
        beneficiary_name: impl Into<String>,
        cycle: u32,
        tour_number: u32,
        amount_to_receive: Amount,
        mode: AssignmentMode,
        scheduled_date: NaiveDate,
        assigned_by: ActorId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TourId::generate(),
            association_id,
            beneficiary,
            beneficiary_name: beneficiary_name.into(),
            cycle,
            tour_number,
            amount_to_receive,
            mode,
            status: TourStatus::Assigned,
            scheduled_date,
            payment_date: None,
            settled_amount: None,
            refusal_reason: None,
            assigned_by,
            idempotency_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Apply a status change, rejecting anything outside the transition table
    pub fn transition(&mut self, next: TourStatus) -> TontineResult<TourStatus> {
        if !self.status.can_transition_to(next) {
            return Err(TontineError::invalid_transition(self.status, next));
        }
        let previous = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        Ok(previous)
    }
}
