//! Tontine Central Ledger
//!
//! This crate provides:
//! - an append-only transaction log per association, plus one global log
//!   fed by collaborators, both represented by the same [`Ledger`] type
//! - a deterministic transition function ([`LedgerView::apply`]) that is the
//!   only code allowed to move balances
//! - replay from zero ([`Ledger::recompute_from_log`]) to detect and correct
//!   drift between the log and the materialized balances
//! - read/write trait boundaries ([`LedgerReader`], [`LedgerWriter`]) used
//!   by collaborators that post transactions
//!
//! Every operation is all-or-nothing: it runs against a staged copy and only
//! replaces the live state once every transaction of the operation applied.

#![deny(unsafe_code)]

pub mod ledger;
pub mod traits;
pub mod view;

pub use ledger::{Ledger, RecomputeOutcome};
pub use traits::{LedgerReader, LedgerWriter};
pub use view::LedgerView;
