//! Materialized ledger state and its transition function

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tontine_types::{
    AdjustmentDirection, Amount, Balances, RecordKind, RedistributionRecord, RefusedTour,
    TontineError, TontineResult, Transaction, TransactionKind,
};

/// Read model: everything derivable from the transaction log
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerView {
    pub balances: Balances,
    pub refused_tours: Vec<RefusedTour>,
    pub redistributions: Vec<RedistributionRecord>,
    pub redistributed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redistributed_at: Option<DateTime<Utc>>,
    /// Sequence number of the last applied transaction
    pub last_seq: u64,
}

impl LedgerView {
    /// Rebuild a view by folding transactions from zero
    pub fn replay<'a, I>(transactions: I) -> TontineResult<Self>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut view = LedgerView::default();
        for txn in transactions {
            view.apply(txn)?;
        }
        Ok(view)
    }

    /// Apply one transaction. On error the view is left unchanged.
    pub fn apply(&mut self, txn: &Transaction) -> TontineResult<()> {
        let expected_seq = self.last_seq + 1;
        if txn.seq != expected_seq {
            return Err(TontineError::Storage(format!(
                "ledger integrity violation: expected seq {}, found {}",
                expected_seq, txn.seq
            )));
        }

        let mut next = self.clone();
        let amount = txn.amount;
        let b = &mut next.balances;

        match txn.kind {
            TransactionKind::Contribution
            | TransactionKind::SolidarityPayment
            | TransactionKind::CardPayment => {
                b.cash_from_contributions = credit(b.cash_from_contributions, amount)?;
                b.total_contributed = credit(b.total_contributed, amount)?;
            }
            TransactionKind::ContributionReversal => {
                b.cash_from_contributions = debit(b.cash_from_contributions, amount)?;
                b.total_contributed = debit(b.total_contributed, amount)?;
            }
            TransactionKind::Payout => {
                b.cash_from_contributions = debit(b.cash_from_contributions, amount)?;
                b.total_distributed = credit(b.total_distributed, amount)?;
            }
            TransactionKind::Refusal => {
                let tour_id = txn.refs.tour_id.clone().ok_or_else(|| {
                    TontineError::validation("refusal transaction without a tour reference")
                })?;
                let beneficiary = txn.refs.member_id.clone().ok_or_else(|| {
                    TontineError::validation("refusal transaction without a beneficiary")
                })?;
                if next.refused_tours.iter().any(|r| r.tour_id == tour_id) {
                    return Err(TontineError::validation(format!(
                        "tour {} is already in the refusal pool",
                        tour_id
                    )));
                }

                b.cash_from_contributions = debit(b.cash_from_contributions, amount)?;
                b.cash_from_refusals = credit(b.cash_from_refusals, amount)?;
                b.total_refused = credit(b.total_refused, amount)?;

                next.refused_tours.push(RefusedTour {
                    tour_id,
                    beneficiary,
                    amount,
                    reason: txn.reason.clone(),
                    cycle: txn.refs.cycle.unwrap_or_default(),
                    refused_at: txn.timestamp,
                    transaction_id: txn.id.clone(),
                });
            }
            TransactionKind::RefusalCancellation => {
                let tour_id = txn.refs.tour_id.as_ref().ok_or_else(|| {
                    TontineError::validation("refusal cancellation without a tour reference")
                })?;
                let index = next
                    .refused_tours
                    .iter()
                    .position(|r| &r.tour_id == tour_id)
                    .ok_or_else(|| TontineError::not_found(RecordKind::RefusedTour, tour_id))?;

                b.cash_from_refusals = debit(b.cash_from_refusals, amount)?;
                b.total_refused = debit(b.total_refused, amount)?;
                b.cash_from_contributions = credit(b.cash_from_contributions, amount)?;

                next.refused_tours.remove(index);
            }
            TransactionKind::Redistribution => {
                let member_id = txn.refs.member_id.clone().ok_or_else(|| {
                    TontineError::validation("redistribution without a beneficiary")
                })?;

                b.cash_from_refusals = debit(b.cash_from_refusals, amount)?;
                b.total_redistributed = credit(b.total_redistributed, amount)?;

                next.redistributions.push(RedistributionRecord {
                    member_id,
                    amount,
                    date: txn.timestamp,
                    transaction_id: txn.id.clone(),
                });
                next.redistributed = true;
                next.redistributed_at = Some(txn.timestamp);
            }
            TransactionKind::Adjustment(AdjustmentDirection::Credit) => {
                b.cash_from_contributions = credit(b.cash_from_contributions, amount)?;
            }
            TransactionKind::Adjustment(AdjustmentDirection::Debit) => {
                b.cash_from_contributions = debit(b.cash_from_contributions, amount)?;
            }
        }

        next.last_seq = txn.seq;
        *self = next;
        Ok(())
    }
}

fn credit(balance: Amount, amount: Amount) -> TontineResult<Amount> {
    balance
        .checked_add(amount)
        .ok_or_else(|| TontineError::validation(format!("amount overflow adding {}", amount)))
}

fn debit(balance: Amount, amount: Amount) -> TontineResult<Amount> {
    balance
        .checked_sub(amount)
        .ok_or(TontineError::InsufficientFunds {
            required: amount,
            available: balance,
        })
}
