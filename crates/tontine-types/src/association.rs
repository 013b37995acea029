//! Associations and their memberships
//!
//! The membership list is the source of truth for "who's in". Everything
//! that depends on it (active member count, pool, cycle size) is computed on
//! demand and has no setter.

use crate::{ActorId, Amount, AssociationId, MemberId, RecordKind, TontineError, TontineResult};
use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// How often contributions are collected and tours paid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    /// Twice a month, on a fourteen-day cadence
    Bimonthly,
    #[default]
    Monthly,
}

impl Frequency {
    /// Advance a date by one frequency unit
    pub fn advance(&self, from: NaiveDate) -> TontineResult<NaiveDate> {
        let next = match self {
            Frequency::Weekly => from.checked_add_days(Days::new(7)),
            Frequency::Bimonthly => from.checked_add_days(Days::new(14)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
        };
        next.ok_or_else(|| TontineError::validation(format!("date overflow advancing {}", from)))
    }
}

/// Lifecycle status of an association
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStatus {
    #[default]
    Planned,
    Active,
    Finished,
    Suspended,
}

impl AssociationStatus {
    /// Whether new tours may be assigned and contributions collected
    pub fn is_operational(&self) -> bool {
        matches!(self, AssociationStatus::Planned | AssociationStatus::Active)
    }
}

/// A member as known to the member directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub name: String,
}

impl MemberProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: MemberId::new(id),
            name: name.into(),
        }
    }
}

/// A member reference as it arrives from callers: either a bare id or an
/// already-loaded profile. Resolved once at the registry boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MemberRef {
    Id(MemberId),
    Profile(MemberProfile),
}

impl MemberRef {
    pub fn id(&self) -> &MemberId {
        match self {
            MemberRef::Id(id) => id,
            MemberRef::Profile(profile) => &profile.id,
        }
    }
}

impl From<MemberId> for MemberRef {
    fn from(id: MemberId) -> Self {
        MemberRef::Id(id)
    }
}

impl From<MemberProfile> for MemberRef {
    fn from(profile: MemberProfile) -> Self {
        MemberRef::Profile(profile)
    }
}

/// One member's participation in an association
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub member: MemberProfile,
    pub joined_at: DateTime<Utc>,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

impl Membership {
    pub fn new(member: MemberProfile) -> Self {
        Self {
            member,
            joined_at: Utc::now(),
            active: true,
            left_at: None,
        }
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member.id
    }
}

/// Parameters for creating an association
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationSpec {
    pub name: String,
    pub contribution_amount: Amount,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl AssociationSpec {
    pub fn new(
        name: impl Into<String>,
        contribution_amount: Amount,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            contribution_amount,
            frequency,
            start_date,
            end_date: None,
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn validate(&self) -> TontineResult<()> {
        if self.name.trim().is_empty() {
            return Err(TontineError::validation("association name is empty"));
        }
        if self.contribution_amount.is_zero() {
            return Err(TontineError::validation(
                "contribution amount must be greater than zero",
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(TontineError::validation(format!(
                    "end date {} precedes start date {}",
                    end, self.start_date
                )));
            }
        }
        Ok(())
    }
}

/// Derived totals, computed from the membership list
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationTotals {
    pub active_member_count: usize,
    pub total_pool: Amount,
    pub total_cycles: u32,
}

/// A rotating savings association
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Association {
    pub id: AssociationId,
    pub name: String,
    pub contribution_amount: Amount,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub status: AssociationStatus,
    /// Status to return to when a suspension is lifted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_from: Option<AssociationStatus>,
    pub current_cycle: u32,
    memberships: Vec<Membership>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Association {
    pub fn new(spec: AssociationSpec, created_by: ActorId) -> TontineResult<Self> {
        spec.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: AssociationId::generate(),
            name: spec.name,
            contribution_amount: spec.contribution_amount,
            frequency: spec.frequency,
            start_date: spec.start_date,
            end_date: spec.end_date,
            status: AssociationStatus::Planned,
            suspended_from: None,
            current_cycle: 1,
            memberships: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Create with a specific ID (for testing or restoration)
    pub fn with_id(mut self, id: AssociationId) -> Self {
        self.id = id;
        self
    }

    // --- Derived totals ---

    pub fn active_member_count(&self) -> usize {
        self.memberships.iter().filter(|m| m.active).count()
    }

    pub fn total_pool(&self) -> Amount {
        self.contribution_amount
            .saturating_mul(self.active_member_count() as u64)
    }

    pub fn total_cycles(&self) -> u32 {
        u32::try_from(self.active_member_count()).unwrap_or(u32::MAX)
    }

    pub fn totals(&self) -> AssociationTotals {
        AssociationTotals {
            active_member_count: self.active_member_count(),
            total_pool: self.total_pool(),
            total_cycles: self.total_cycles(),
        }
    }

    // --- Memberships ---

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    pub fn active_memberships(&self) -> impl Iterator<Item = &Membership> {
        self.memberships.iter().filter(|m| m.active)
    }

    pub fn active_membership(&self, member_id: &MemberId) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.active && m.member_id() == member_id)
    }

    pub fn is_active_member(&self, member_id: &MemberId) -> bool {
        self.active_membership(member_id).is_some()
    }

    /// Append a new active membership
    pub fn add_membership(&mut self, member: MemberProfile) -> TontineResult<&Membership> {
        if self.is_active_member(&member.id) {
            return Err(TontineError::DuplicateMember {
                association: self.id.clone(),
                member: member.id,
            });
        }
        self.memberships.push(Membership::new(member));
        self.touch();
        Ok(&self.memberships[self.memberships.len() - 1])
    }

    /// Soft-remove the active membership of a member
    pub fn deactivate_membership(&mut self, member_id: &MemberId) -> TontineResult<&Membership> {
        let index = self
            .memberships
            .iter()
            .position(|m| m.active && m.member_id() == member_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Membership, member_id))?;

        let membership = &mut self.memberships[index];
        membership.active = false;
        membership.left_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(&self.memberships[index])
    }

    // --- Lifecycle ---

    /// Planned -> Active, when rotation starts
    pub fn activate(&mut self) -> TontineResult<()> {
        match self.status {
            AssociationStatus::Planned => {
                self.status = AssociationStatus::Active;
                self.touch();
                Ok(())
            }
            AssociationStatus::Active => Ok(()),
            other => Err(TontineError::invalid_transition(
                other,
                AssociationStatus::Active,
            )),
        }
    }

    pub fn suspend(&mut self) -> TontineResult<()> {
        if self.status == AssociationStatus::Suspended {
            return Err(TontineError::invalid_transition(
                self.status,
                AssociationStatus::Suspended,
            ));
        }
        self.suspended_from = Some(self.status);
        self.status = AssociationStatus::Suspended;
        self.touch();
        Ok(())
    }

    pub fn resume(&mut self) -> TontineResult<()> {
        if self.status != AssociationStatus::Suspended {
            return Err(TontineError::invalid_transition(
                self.status,
                AssociationStatus::Active,
            ));
        }
        self.status = self.suspended_from.take().unwrap_or(AssociationStatus::Active);
        self.touch();
        Ok(())
    }

    /// Re-evaluate Active/Finished given the number of resolved tours in the
    /// current cycle. Planned and Suspended are left alone.
    pub fn refresh_completion(&mut self, resolved_tours: usize) {
        let cycles = self.total_cycles() as usize;
        let complete = cycles > 0 && resolved_tours >= cycles;
        let next = match (self.status, complete) {
            (AssociationStatus::Active, true) => AssociationStatus::Finished,
            (AssociationStatus::Finished, false) => AssociationStatus::Active,
            (status, _) => status,
        };
        if next != self.status {
            self.status = next;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
