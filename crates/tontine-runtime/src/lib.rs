//! Tontine Rotation & Ledger Engine
//!
//! This crate provides the runtime for rotating savings associations. The
//! [`TontineEngine`] is the main entry point and composes:
//!
//! - [`MembershipRegistry`]: active member set and derived totals
//! - [`RotationScheduler`]: beneficiary selection and tour status changes
//! - [`ContributionTracker`]: payments tied to a tour, and their reversal
//! - the Central Ledger from `tontine-ledger`, one per association plus a
//!   global instance fed by collaborators
//!
//! # Key Invariants
//!
//! 1. `total_balance == cash_from_contributions + cash_from_refusals` for every ledger
//! 2. Pool and cycle size are computed from active memberships, never stored
//! 3. No two tours share (association, beneficiary, cycle)
//! 4. Every operation on an association either fully commits or leaves no trace
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::NaiveDate;
//! use tontine_runtime::{EngineConfig, InMemoryDirectory, TontineEngine};
//! use tontine_types::{
//!     Amount, AssignmentMode, AssociationSpec, CommandContext, Frequency, MemberProfile,
//!     MemberRef,
//! };
//!
//! let engine = TontineEngine::new(EngineConfig::default(), Arc::new(InMemoryDirectory::new())).unwrap();
//! let ctx = CommandContext::system();
//!
//! let spec = AssociationSpec::new(
//!     "Tontine du quartier",
//!     Amount::new(10_000),
//!     Frequency::Monthly,
//!     NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
//! );
//! let association = engine.create_association(spec, &ctx).unwrap();
//! engine
//!     .add_member(&association.id, MemberRef::Profile(MemberProfile::new("m1", "Awa")), &ctx)
//!     .unwrap();
//!
//! let tour = engine
//!     .assign_next_tour(&association.id, AssignmentMode::Alphabetical, &ctx)
//!     .unwrap();
//! assert_eq!(tour.tour_number, 1);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod contribution_tracker;
pub mod engine;
pub mod maintenance;
pub mod membership_registry;
pub mod rotation_scheduler;
pub mod snapshot;
pub mod unit;

pub use config::EngineConfig;
pub use contribution_tracker::{ContributionDeletion, ContributionTracker, NewContribution, TourStats};
pub use engine::TontineEngine;
pub use maintenance::{GlobalSummary, PurgeReport, RecomputeFailure, RecomputeReport};
pub use membership_registry::{InMemoryDirectory, MemberDirectory, MembershipRegistry};
pub use rotation_scheduler::{RotationScheduler, StatusChange};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use unit::AssociationUnit;
