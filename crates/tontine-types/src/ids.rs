//! Identifier newtypes
//!
//! Every record kind gets its own id type so an association id can never be
//! passed where a tour id is expected.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a new random id
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Create an id from a known string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Short display form (first 8 chars)
            pub fn short(&self) -> String {
                self.0.chars().take(8).collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an association (tontine)
    AssociationId
);
define_id!(
    /// Unique identifier for a member, owned by the member directory
    MemberId
);
define_id!(
    /// Unique identifier for a tour
    TourId
);
define_id!(
    /// Unique identifier for a contribution
    ContributionId
);
define_id!(
    /// Unique identifier for a ledger transaction
    TransactionId
);
define_id!(
    /// Authenticated actor id supplied by the identity collaborator
    ActorId
);
define_id!(
    /// Caller-supplied key that makes a retried mutation a no-op
    IdempotencyKey
);
