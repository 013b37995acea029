//! Membership Registry: who is in an association
//!
//! Member references arrive either as a bare id or as a full profile. They are
//! resolved here, once, through the [`MemberDirectory`]; everything past this
//! boundary only handles resolved [`MemberProfile`]s.

use std::collections::HashMap;
use std::sync::RwLock;

use tontine_types::{
    Association, AssociationTotals, CommandContext, MemberId, MemberProfile, MemberRef,
    RecordKind, TontineError, TontineResult,
};
use tracing::{info, warn};

/// Lookup of member profiles owned by the member CRUD collaborator
pub trait MemberDirectory: Send + Sync {
    fn lookup(&self, id: &MemberId) -> TontineResult<Option<MemberProfile>>;
}

/// Directory backed by a map, for tests and embedded use
#[derive(Default)]
pub struct InMemoryDirectory {
    members: RwLock<HashMap<MemberId, MemberProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: impl IntoIterator<Item = MemberProfile>) -> Self {
        let map = members.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            members: RwLock::new(map),
        }
    }

    pub fn register(&self, profile: MemberProfile) -> TontineResult<()> {
        let mut members = self
            .members
            .write()
            .map_err(|_| TontineError::Storage("member directory lock poisoned".into()))?;
        members.insert(profile.id.clone(), profile);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemberDirectory for InMemoryDirectory {
    fn lookup(&self, id: &MemberId) -> TontineResult<Option<MemberProfile>> {
        let members = self
            .members
            .read()
            .map_err(|_| TontineError::Storage("member directory lock poisoned".into()))?;
        Ok(members.get(id).cloned())
    }
}

/// Membership operations over an association
pub struct MembershipRegistry<'a> {
    directory: &'a dyn MemberDirectory,
}

impl<'a> MembershipRegistry<'a> {
    pub fn new(directory: &'a dyn MemberDirectory) -> Self {
        Self { directory }
    }

    /// Resolve a polymorphic member reference to a profile
    pub fn resolve(&self, member: MemberRef) -> TontineResult<MemberProfile> {
        match member {
            MemberRef::Profile(profile) => {
                if profile.name.trim().is_empty() {
                    return Err(TontineError::validation(format!(
                        "member {} has an empty name",
                        profile.id
                    )));
                }
                Ok(profile)
            }
            MemberRef::Id(id) => self
                .directory
                .lookup(&id)?
                .ok_or_else(|| TontineError::not_found(RecordKind::Member, &id)),
        }
    }

    /// Append an active membership and return the recomputed totals
    pub fn add_member(
        &self,
        association: &mut Association,
        member: MemberRef,
        ctx: &CommandContext,
    ) -> TontineResult<AssociationTotals> {
        let profile = self.resolve(member)?;
        let member_id = profile.id.clone();

        if let Err(e) = association.add_membership(profile) {
            warn!(
                association = %association.id,
                member = %member_id,
                "Duplicate membership rejected"
            );
            return Err(e);
        }

        let totals = association.totals();
        info!(
            association = %association.id,
            member = %member_id,
            actor = %ctx.actor_id(),
            active_members = totals.active_member_count,
            total_pool = totals.total_pool.0,
            "Member added to association"
        );
        Ok(totals)
    }

    /// Soft-remove a member. Past tours and contributions are untouched.
    pub fn deactivate_member(
        &self,
        association: &mut Association,
        member_id: &MemberId,
        ctx: &CommandContext,
    ) -> TontineResult<AssociationTotals> {
        association.deactivate_membership(member_id)?;

        let totals = association.totals();
        info!(
            association = %association.id,
            member = %member_id,
            actor = %ctx.actor_id(),
            active_members = totals.active_member_count,
            total_pool = totals.total_pool.0,
            "Member deactivated"
        );
        Ok(totals)
    }
}
