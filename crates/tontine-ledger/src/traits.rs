use tontine_types::{
    Balances, LedgerScope, RedistributionRecord, RefusedTour, TontineResult, Transaction,
    TransactionDraft,
};

/// Write boundary for the transaction-append contract.
///
/// Collaborators (solidarity dues, membership cards) post through this trait
/// exactly like the core does; no origin is special-cased.
pub trait LedgerWriter {
    fn append(&mut self, draft: TransactionDraft) -> TontineResult<Transaction>;
}

/// Read boundary for balance queries and audits.
pub trait LedgerReader {
    fn scope(&self) -> &LedgerScope;

    fn balances(&self) -> Balances;

    fn transactions(&self) -> &[Transaction];

    fn refused_tours(&self) -> &[RefusedTour];

    fn redistributions(&self) -> &[RedistributionRecord];
}
