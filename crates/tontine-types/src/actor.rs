//! Authenticated caller context
//!
//! Authentication lives outside the engine. The identity collaborator hands
//! over an actor id and role which the engine trusts for audit fields.

use crate::{ActorId, IdempotencyKey};
use serde::{Deserialize, Serialize};

/// Role of the actor performing a mutation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Treasurer,
    #[default]
    Member,
    /// Maintenance jobs and other internal callers
    System,
}

/// An authenticated actor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: ActorId::new(id),
            role,
        }
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

/// Context carried by every mutating call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl CommandContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            idempotency_key: None,
        }
    }

    pub fn system() -> Self {
        Self::new(Actor::system())
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(IdempotencyKey::new(key));
        self
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor.id
    }
}
