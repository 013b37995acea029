//! Error types for the rotation and ledger engine

use crate::{Amount, AssociationId, MemberId};
use serde::{Deserialize, Serialize};

/// Record kinds used in not-found and orphan reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Association,
    Member,
    Membership,
    Tour,
    Contribution,
    Ledger,
    RefusedTour,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Association => "association",
            RecordKind::Member => "member",
            RecordKind::Membership => "membership",
            RecordKind::Tour => "tour",
            RecordKind::Contribution => "contribution",
            RecordKind::Ledger => "ledger",
            RecordKind::RefusedTour => "refused tour",
        };
        f.write_str(name)
    }
}

/// Stable error classification surfaced to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    DuplicateMember,
    DuplicateAssignment,
    InsufficientFunds,
    InvalidTransition,
    NoEligibleMember,
    OrphanedReference,
    Storage,
    Configuration,
}

/// Errors that can occur in tontine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TontineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("Member {member} already has an active membership in {association}")]
    DuplicateMember {
        association: AssociationId,
        member: MemberId,
    },

    #[error("Member {member} already has a tour in cycle {cycle} of {association}")]
    DuplicateAssignment {
        association: AssociationId,
        member: MemberId,
        cycle: u32,
    },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("No eligible member left in cycle {cycle} of {association}")]
    NoEligibleMember {
        association: AssociationId,
        cycle: u32,
    },

    #[error("Orphaned {kind} {id}: references missing {missing}")]
    OrphanedReference {
        kind: RecordKind,
        id: String,
        missing: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TontineError {
    pub fn not_found(kind: RecordKind, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn invalid_transition(from: impl std::fmt::Debug, to: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TontineError::Validation(_) => ErrorKind::Validation,
            TontineError::NotFound { .. } => ErrorKind::NotFound,
            TontineError::DuplicateMember { .. } => ErrorKind::DuplicateMember,
            TontineError::DuplicateAssignment { .. } => ErrorKind::DuplicateAssignment,
            TontineError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TontineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            TontineError::NoEligibleMember { .. } => ErrorKind::NoEligibleMember,
            TontineError::OrphanedReference { .. } => ErrorKind::OrphanedReference,
            TontineError::Storage(_) => ErrorKind::Storage,
            TontineError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

/// Result type alias for tontine operations
pub type TontineResult<T> = Result<T, TontineError>;
