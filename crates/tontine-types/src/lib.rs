//! Tontine Domain Types
//!
//! This crate defines the domain types for rotating savings associations
//! ("tontines"): members contribute every period and, each tour, one member
//! receives the pooled amount.
//!
//! # Key Concepts
//!
//! - **Association**: the savings group, with its ordered memberships and
//!   derived totals (active members, pool, cycle size).
//! - **Tour**: one payout event to one beneficiary within a cycle.
//! - **Contribution**: a member's payment tied to exactly one tour.
//! - **Transaction**: an entry of the append-only ledger log. Balances are
//!   always a projection of the log.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. All types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. IDs use the
//! newtype pattern and implement `Display`, `generate()`, and `new()`.

#![deny(unsafe_code)]

mod actor;
mod amount;
mod association;
mod contribution;
mod errors;
mod ids;
mod ledger;
mod tour;

pub use actor::*;
pub use amount::*;
pub use association::*;
pub use contribution::*;
pub use errors::*;
pub use ids::*;
pub use ledger::*;
pub use tour::*;
