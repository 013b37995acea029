//! Contributions: payments tied to a tour

use crate::{
    ActorId, Amount, AssociationId, ContributionId, IdempotencyKey, MemberId, TourId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a contribution was paid
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    MobileMoney,
    BankTransfer,
    Cheque,
    Other(String),
}

/// Status of a contribution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    #[default]
    Received,
    Pending,
    Rejected,
}

/// A member's payment into an association for one tour
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub association_id: AssociationId,
    pub member_id: MemberId,
    pub tour_id: TourId,
    pub cycle: u32,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub status: ContributionStatus,
    pub recorded_by: ActorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
    pub recorded_at: DateTime<Utc>,
}

impl Contribution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        association_id: AssociationId,
        member_id: MemberId,
        tour_id: TourId,
        cycle: u32,
        amount: Amount,
        method: PaymentMethod,
        recorded_by: ActorId,
    ) -> Self {
        Self {
            id: ContributionId::generate(),
            association_id,
            member_id,
            tour_id,
            cycle,
            amount,
            method,
            status: ContributionStatus::Received,
            recorded_by,
            idempotency_key: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Only received contributions count toward a tour's collected funds
    pub fn is_received(&self) -> bool {
        matches!(self.status, ContributionStatus::Received)
    }
}
