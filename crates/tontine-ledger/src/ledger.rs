//! The per-association and global ledger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tontine_types::{
    Amount, Balances, CommandContext, ContributionId, IdempotencyKey, LedgerScope, MemberId,
    RecordKind, RedistributionRecord, RedistributionShare, RefusalResolution, RefusedTour,
    TontineError, TontineResult, TourId, Transaction, TransactionDraft, TransactionKind,
};
use tracing::{info, warn};

use crate::traits::{LedgerReader, LedgerWriter};
use crate::view::LedgerView;

/// Result of rebuilding a ledger from its log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub scope: LedgerScope,
    pub drift_detected: bool,
    pub before: Balances,
    pub after: Balances,
    pub transactions_replayed: usize,
}

/// Append-only ledger with a materialized view over its log.
///
/// No in-place mutation APIs are exposed: every state change is an additional
/// transaction, and the view is only ever advanced by [`LedgerView::apply`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ledger {
    scope: LedgerScope,
    transactions: Vec<Transaction>,
    view: LedgerView,
    created_at: DateTime<Utc>,
}

impl Ledger {
    pub fn new(scope: LedgerScope) -> Self {
        Self {
            scope,
            transactions: Vec::new(),
            view: LedgerView::default(),
            created_at: Utc::now(),
        }
    }

    pub fn global() -> Self {
        Self::new(LedgerScope::Global)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn view(&self) -> &LedgerView {
        &self.view
    }

    pub fn is_redistributed(&self) -> bool {
        self.view.redistributed
    }

    pub fn redistributed_at(&self) -> Option<DateTime<Utc>> {
        self.view.redistributed_at
    }

    pub fn refused_tour(&self, tour_id: &TourId) -> Option<&RefusedTour> {
        self.view.refused_tours.iter().find(|r| &r.tour_id == tour_id)
    }

    /// Transactions written under an idempotency key
    pub fn find_by_idempotency_key(&self, key: &IdempotencyKey) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.idempotency_key.as_ref() == Some(key))
            .collect()
    }

    pub fn has_idempotency_key(&self, key: &IdempotencyKey) -> bool {
        self.transactions
            .iter()
            .any(|t| t.idempotency_key.as_ref() == Some(key))
    }

    /// Run `op` against a staged copy and keep the result only if it succeeds
    pub fn commit<T, F>(&mut self, op: F) -> TontineResult<T>
    where
        F: FnOnce(&mut Ledger) -> TontineResult<T>,
    {
        let mut staged = self.clone();
        let out = op(&mut staged)?;
        *self = staged;
        Ok(out)
    }

    fn append_draft(&mut self, draft: TransactionDraft) -> TontineResult<Transaction> {
        let seq = self.transactions.len() as u64 + 1;
        let txn = Transaction::from_draft(draft, seq, Utc::now());
        self.view.apply(&txn)?;
        self.transactions.push(txn.clone());
        Ok(txn)
    }

    // --- Domain postings ---

    /// Money in for a tour
    pub fn record_contribution(
        &mut self,
        ctx: &CommandContext,
        amount: Amount,
        contribution_id: ContributionId,
        tour_id: TourId,
        member_id: MemberId,
        cycle: u32,
    ) -> TontineResult<Transaction> {
        if amount.is_zero() {
            return Err(TontineError::validation(
                "contribution amount must be greater than zero",
            ));
        }
        let draft = TransactionDraft::new(TransactionKind::Contribution, amount, ctx.actor.id.clone())
            .with_contribution(contribution_id)
            .with_tour(tour_id)
            .with_member(member_id)
            .with_cycle(cycle)
            .with_idempotency_key(ctx.idempotency_key.clone());
        let txn = self.append_draft(draft)?;
        info!(scope = %self.scope, amount = amount.0, seq = txn.seq, "Contribution posted");
        Ok(txn)
    }

    /// Exact inverse of [`Ledger::record_contribution`]
    pub fn reverse_contribution(
        &mut self,
        ctx: &CommandContext,
        amount: Amount,
        contribution_id: ContributionId,
        tour_id: TourId,
        member_id: MemberId,
        cycle: u32,
    ) -> TontineResult<Transaction> {
        let draft = TransactionDraft::new(
            TransactionKind::ContributionReversal,
            amount,
            ctx.actor.id.clone(),
        )
        .with_contribution(contribution_id)
        .with_tour(tour_id)
        .with_member(member_id)
        .with_cycle(cycle)
        .with_reason("contribution deleted")
        .with_idempotency_key(ctx.idempotency_key.clone());
        let txn = self.append_draft(draft)?;
        info!(scope = %self.scope, amount = amount.0, seq = txn.seq, "Contribution reversed");
        Ok(txn)
    }

    /// Money out to a tour beneficiary
    pub fn record_payout(
        &mut self,
        ctx: &CommandContext,
        amount: Amount,
        tour_id: TourId,
        beneficiary: MemberId,
        cycle: u32,
    ) -> TontineResult<Transaction> {
        if amount.is_zero() {
            return Err(TontineError::validation("payout amount must be greater than zero"));
        }
        let available = self.view.balances.cash_from_contributions;
        if amount > available {
            warn!(
                scope = %self.scope,
                required = amount.0,
                available = available.0,
                "Payout exceeds contributions balance"
            );
            return Err(TontineError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        let draft = TransactionDraft::new(TransactionKind::Payout, amount, ctx.actor.id.clone())
            .with_tour(tour_id)
            .with_member(beneficiary)
            .with_cycle(cycle)
            .with_idempotency_key(ctx.idempotency_key.clone());
        let txn = self.append_draft(draft)?;
        info!(scope = %self.scope, amount = amount.0, seq = txn.seq, "Payout posted");
        Ok(txn)
    }

    /// Move a tour's earmarked funds into the refusal pool
    pub fn record_refusal(
        &mut self,
        ctx: &CommandContext,
        amount: Amount,
        tour_id: TourId,
        beneficiary: MemberId,
        cycle: u32,
        reason: Option<String>,
    ) -> TontineResult<Transaction> {
        let mut draft =
            TransactionDraft::new(TransactionKind::Refusal, amount, ctx.actor.id.clone())
                .with_tour(tour_id)
                .with_member(beneficiary)
                .with_cycle(cycle)
                .with_idempotency_key(ctx.idempotency_key.clone());
        if let Some(reason) = reason {
            draft = draft.with_reason(reason);
        }
        let txn = self.append_draft(draft)?;
        warn!(scope = %self.scope, amount = amount.0, seq = txn.seq, "Tour refused");
        Ok(txn)
    }

    /// Undo a refusal. Funds return to contributions, and with
    /// [`RefusalResolution::Paid`] are then paid to the original beneficiary.
    pub fn cancel_refusal(
        &mut self,
        ctx: &CommandContext,
        tour_id: &TourId,
        resolve_to: RefusalResolution,
    ) -> TontineResult<Vec<Transaction>> {
        let refused = self
            .refused_tour(tour_id)
            .cloned()
            .ok_or_else(|| TontineError::not_found(RecordKind::RefusedTour, tour_id))?;

        let actor = ctx.actor.id.clone();
        let key = ctx.idempotency_key.clone();
        let scope = self.scope.clone();

        self.commit(|ledger| {
            let mut posted = Vec::with_capacity(2);
            let cancellation = TransactionDraft::new(
                TransactionKind::RefusalCancellation,
                refused.amount,
                actor.clone(),
            )
            .with_tour(refused.tour_id.clone())
            .with_member(refused.beneficiary.clone())
            .with_cycle(refused.cycle)
            .with_idempotency_key(key.clone());
            posted.push(ledger.append_draft(cancellation)?);

            if resolve_to == RefusalResolution::Paid && !refused.amount.is_zero() {
                let payout =
                    TransactionDraft::new(TransactionKind::Payout, refused.amount, actor.clone())
                        .with_tour(refused.tour_id.clone())
                        .with_member(refused.beneficiary.clone())
                        .with_cycle(refused.cycle)
                        .with_idempotency_key(key.clone());
                posted.push(ledger.append_draft(payout)?);
            }

            info!(
                scope = %scope,
                tour = %refused.tour_id,
                amount = refused.amount.0,
                resolve_to = ?resolve_to,
                "Refusal cancelled"
            );
            Ok(posted)
        })
    }

    /// Pay the refusal pool out to other beneficiaries
    pub fn redistribute(
        &mut self,
        ctx: &CommandContext,
        shares: &[RedistributionShare],
    ) -> TontineResult<Vec<RedistributionRecord>> {
        if shares.is_empty() {
            return Err(TontineError::validation("redistribution has no beneficiaries"));
        }
        if let Some(share) = shares.iter().find(|s| s.amount.is_zero()) {
            return Err(TontineError::validation(format!(
                "redistribution share for {} must be greater than zero",
                share.member_id
            )));
        }

        let requested = shares
            .iter()
            .try_fold(Amount::zero(), |acc, s| acc.checked_add(s.amount))
            .ok_or_else(|| TontineError::validation("redistribution total overflows"))?;
        let available = self.view.balances.cash_from_refusals;
        if requested > available {
            return Err(TontineError::InsufficientFunds {
                required: requested,
                available,
            });
        }

        let actor = ctx.actor.id.clone();
        let key = ctx.idempotency_key.clone();
        let scope = self.scope.clone();

        self.commit(|ledger| {
            let first = ledger.view.redistributions.len();
            for share in shares {
                let draft = TransactionDraft::new(
                    TransactionKind::Redistribution,
                    share.amount,
                    actor.clone(),
                )
                .with_member(share.member_id.clone())
                .with_idempotency_key(key.clone());
                ledger.append_draft(draft)?;
            }
            info!(
                scope = %scope,
                beneficiaries = shares.len(),
                amount = requested.0,
                "Refusal pool redistributed"
            );
            Ok(ledger.view.redistributions[first..].to_vec())
        })
    }

    // --- Maintenance ---

    /// Rebuild the view strictly from the log. Idempotent.
    pub fn recompute_from_log(&mut self) -> TontineResult<RecomputeOutcome> {
        let rebuilt = LedgerView::replay(&self.transactions)?;
        let before = self.view.balances;
        let drift_detected = rebuilt != self.view;

        if drift_detected {
            warn!(
                scope = %self.scope,
                before = ?before,
                after = ?rebuilt.balances,
                "Ledger drift corrected from transaction log"
            );
        }

        let after = rebuilt.balances;
        self.view = rebuilt;

        Ok(RecomputeOutcome {
            scope: self.scope.clone(),
            drift_detected,
            before,
            after,
            transactions_replayed: self.transactions.len(),
        })
    }
}

impl LedgerWriter for Ledger {
    /// Collaborator entry point. Only external kinds are accepted; the others
    /// need the linked tour/contribution change that only the engine makes.
    fn append(&mut self, draft: TransactionDraft) -> TontineResult<Transaction> {
        if !draft.kind.is_external() {
            return Err(TontineError::validation(format!(
                "{} transactions can only be produced by domain operations",
                draft.kind
            )));
        }
        if draft.amount.is_zero() {
            return Err(TontineError::validation(
                "transaction amount must be greater than zero",
            ));
        }
        if let Some(key) = draft.idempotency_key.as_ref() {
            if let Some(existing) = self.find_by_idempotency_key(key).first() {
                return Ok((*existing).clone());
            }
        }
        let kind = draft.kind;
        let txn = self.append_draft(draft)?;
        info!(scope = %self.scope, kind = %kind, amount = txn.amount.0, seq = txn.seq, "Transaction appended");
        Ok(txn)
    }
}

impl LedgerReader for Ledger {
    fn scope(&self) -> &LedgerScope {
        &self.scope
    }

    fn balances(&self) -> Balances {
        self.view.balances
    }

    fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn refused_tours(&self) -> &[RefusedTour] {
        &self.view.refused_tours
    }

    fn redistributions(&self) -> &[RedistributionRecord] {
        &self.view.redistributions
    }
}

#[cfg(test)]
impl Ledger {
    /// Corrupt the materialized view to simulate drift
    pub(crate) fn view_mut_for_test(&mut self) -> &mut LedgerView {
        &mut self.view
    }
}
