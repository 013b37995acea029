//! Ledger records: transactions, balances, refusal and redistribution rows
//!
//! These are the storage shapes of the central ledger. The transition logic
//! that turns a transaction log into balances lives in `tontine-ledger`.

use crate::{
    ActorId, Amount, AssociationId, ContributionId, IdempotencyKey, MemberId, TourId,
    TransactionId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which ledger a record belongs to
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "association", rename_all = "snake_case")]
pub enum LedgerScope {
    /// Ledger of a single association
    Association(AssociationId),
    /// Cross-association ledger fed by collaborators
    Global,
}

impl LedgerScope {
    pub fn association_id(&self) -> Option<&AssociationId> {
        match self {
            LedgerScope::Association(id) => Some(id),
            LedgerScope::Global => None,
        }
    }
}

impl std::fmt::Display for LedgerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerScope::Association(id) => write!(f, "association:{}", id),
            LedgerScope::Global => f.write_str("global"),
        }
    }
}

/// Direction of a manual adjustment on the contributions balance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Credit,
    Debit,
}

/// Kind of a ledger transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Money in from a member, earmarked for a tour
    Contribution,
    /// Compensating entry for a deleted contribution
    ContributionReversal,
    /// Money out to a tour beneficiary
    Payout,
    /// Tour funds moved from contributions to the refusal pool
    Refusal,
    /// Refusal pool funds moved back to contributions
    RefusalCancellation,
    /// Refusal pool funds paid out to another beneficiary
    Redistribution,
    Adjustment(AdjustmentDirection),
    /// Posted by the solidarity-dues collaborator
    SolidarityPayment,
    /// Posted by the membership-card collaborator
    CardPayment,
}

impl TransactionKind {
    /// Kinds that external collaborators may append directly. Tour-linked
    /// kinds are only produced by domain operations.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            TransactionKind::Adjustment(_)
                | TransactionKind::SolidarityPayment
                | TransactionKind::CardPayment
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Contribution => "contribution",
            TransactionKind::ContributionReversal => "contribution_reversal",
            TransactionKind::Payout => "payout",
            TransactionKind::Refusal => "refusal",
            TransactionKind::RefusalCancellation => "refusal_cancellation",
            TransactionKind::Redistribution => "redistribution",
            TransactionKind::Adjustment(AdjustmentDirection::Credit) => "adjustment_credit",
            TransactionKind::Adjustment(AdjustmentDirection::Debit) => "adjustment_debit",
            TransactionKind::SolidarityPayment => "solidarity_payment",
            TransactionKind::CardPayment => "card_payment",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Records a transaction points at
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tour_id: Option<TourId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<MemberId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution_id: Option<ContributionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<u32>,
}

/// A transaction before the ledger assigns it an id, sequence and timestamp
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub kind: TransactionKind,
    pub amount: Amount,
    pub actor: ActorId,
    #[serde(default)]
    pub refs: TransactionRefs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl TransactionDraft {
    pub fn new(kind: TransactionKind, amount: Amount, actor: ActorId) -> Self {
        Self {
            kind,
            amount,
            actor,
            refs: TransactionRefs::default(),
            reason: None,
            idempotency_key: None,
        }
    }

    pub fn with_tour(mut self, tour_id: TourId) -> Self {
        self.refs.tour_id = Some(tour_id);
        self
    }

    pub fn with_member(mut self, member_id: MemberId) -> Self {
        self.refs.member_id = Some(member_id);
        self
    }

    pub fn with_contribution(mut self, contribution_id: ContributionId) -> Self {
        self.refs.contribution_id = Some(contribution_id);
        self
    }

    pub fn with_cycle(mut self, cycle: u32) -> Self {
        self.refs.cycle = Some(cycle);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: Option<IdempotencyKey>) -> Self {
        self.idempotency_key = key;
        self
    }
}

/// An entry of the append-only transaction log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Position in the log, starting at 1
    pub seq: u64,
    pub kind: TransactionKind,
    pub amount: Amount,
    pub actor: ActorId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub refs: TransactionRefs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl Transaction {
    pub fn from_draft(draft: TransactionDraft, seq: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::generate(),
            seq,
            kind: draft.kind,
            amount: draft.amount,
            actor: draft.actor,
            timestamp,
            refs: draft.refs,
            reason: draft.reason,
            idempotency_key: draft.idempotency_key,
        }
    }
}

/// Running balances and cumulative counters of a ledger
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub cash_from_contributions: Amount,
    pub cash_from_refusals: Amount,
    pub total_contributed: Amount,
    pub total_distributed: Amount,
    pub total_refused: Amount,
    pub total_redistributed: Amount,
}

impl Balances {
    /// Money held: contributions plus the refusal pool
    pub fn total_balance(&self) -> Amount {
        self.cash_from_contributions
            .saturating_add(self.cash_from_refusals)
    }

    /// Field-wise sum, used for cross-ledger summaries
    pub fn merged(&self, other: &Balances) -> Balances {
        Balances {
            cash_from_contributions: self
                .cash_from_contributions
                .saturating_add(other.cash_from_contributions),
            cash_from_refusals: self
                .cash_from_refusals
                .saturating_add(other.cash_from_refusals),
            total_contributed: self.total_contributed.saturating_add(other.total_contributed),
            total_distributed: self.total_distributed.saturating_add(other.total_distributed),
            total_refused: self.total_refused.saturating_add(other.total_refused),
            total_redistributed: self
                .total_redistributed
                .saturating_add(other.total_redistributed),
        }
    }
}

/// A tour whose funds were moved to the refusal pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusedTour {
    pub tour_id: TourId,
    pub beneficiary: MemberId,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub cycle: u32,
    pub refused_at: DateTime<Utc>,
    pub transaction_id: TransactionId,
}

/// A payout from the refusal pool to one member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionRecord {
    pub member_id: MemberId,
    pub amount: Amount,
    pub date: DateTime<Utc>,
    pub transaction_id: TransactionId,
}

/// One requested share of a redistribution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionShare {
    pub member_id: MemberId,
    pub amount: Amount,
}

impl RedistributionShare {
    pub fn new(member_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            member_id: MemberId::new(member_id),
            amount,
        }
    }
}

/// Where a cancelled refusal resolves to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalResolution {
    /// Funds go back to the contributions balance, tour reopens
    Assigned,
    /// Funds are paid to the original beneficiary
    Paid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_balance_is_sum() {
        let balances = Balances {
            cash_from_contributions: Amount::new(7_000),
            cash_from_refusals: Amount::new(3_000),
            ..Default::default()
        };
        assert_eq!(balances.total_balance(), Amount::new(10_000));
    }

    #[test]
    fn test_external_kinds() {
        assert!(TransactionKind::SolidarityPayment.is_external());
        assert!(TransactionKind::CardPayment.is_external());
        assert!(TransactionKind::Adjustment(AdjustmentDirection::Debit).is_external());
        assert!(!TransactionKind::Payout.is_external());
        assert!(!TransactionKind::Redistribution.is_external());
    }

    #[test]
    fn test_scope_serde() {
        let json = serde_json::to_string(&LedgerScope::Global).unwrap();
        assert_eq!(json, r#"{"scope":"global"}"#);
        let scope = LedgerScope::Association(AssociationId::new("a1"));
        let back: LedgerScope =
            serde_json::from_str(&serde_json::to_string(&scope).unwrap()).unwrap();
        assert_eq!(back, scope);
    }
}
