//! The rotation and ledger engine
//!
//! [`TontineEngine`] composes the registry, scheduler and tracker over a set
//! of serialization units, one per association, plus the global ledger.
//!
//! Locking: the unit map is only held long enough to clone a unit handle.
//! A unit lock may be followed by the rng lock or an index lock, never the
//! other way round. The global ledger lock is never held with a unit lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tontine_ledger::{Ledger, LedgerReader, LedgerWriter, RecomputeOutcome};
use tontine_types::{
    AssignmentMode, Association, AssociationId, AssociationSpec, AssociationTotals, Balances,
    CommandContext, Contribution, ContributionId, LedgerScope, MemberId, MemberRef, RecordKind,
    RedistributionRecord, RedistributionShare, RefusedTour, TontineError, TontineResult, Tour,
    TourId, Transaction, TransactionDraft, TransactionKind,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::contribution_tracker::{
    ContributionDeletion, ContributionTracker, NewContribution, TourStats,
};
use crate::maintenance::{GlobalSummary, OrphanStore, PurgeReport, RecomputeReport};
use crate::membership_registry::{MemberDirectory, MembershipRegistry};
use crate::rotation_scheduler::{RotationScheduler, StatusChange};
use crate::snapshot::{Snapshot, SNAPSHOT_VERSION};
use crate::unit::AssociationUnit;

type UnitHandle = Arc<Mutex<AssociationUnit>>;

/// Rotation & ledger engine over many associations
pub struct TontineEngine {
    config: EngineConfig,
    directory: Arc<dyn MemberDirectory>,
    units: RwLock<HashMap<AssociationId, UnitHandle>>,
    tour_index: RwLock<HashMap<TourId, AssociationId>>,
    contribution_index: RwLock<HashMap<ContributionId, AssociationId>>,
    global: Mutex<Ledger>,
    orphans: Mutex<OrphanStore>,
    rng: Mutex<StdRng>,
}

impl TontineEngine {
    pub fn new(config: EngineConfig, directory: Arc<dyn MemberDirectory>) -> TontineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            directory,
            units: RwLock::new(HashMap::new()),
            tour_index: RwLock::new(HashMap::new()),
            contribution_index: RwLock::new(HashMap::new()),
            global: Mutex::new(Ledger::global()),
            orphans: Mutex::new(OrphanStore::default()),
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// Use a fixed seed for lottery draws
    pub fn with_rng_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- Persistence ---

    /// Rebuild an engine from a snapshot. Records whose association is
    /// missing are kept aside for [`TontineEngine::purge_orphaned`].
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: EngineConfig,
        directory: Arc<dyn MemberDirectory>,
    ) -> TontineResult<Self> {
        let engine = Self::new(config, directory)?;
        let mut units: HashMap<AssociationId, AssociationUnit> = snapshot
            .associations
            .into_iter()
            .map(|a| (a.id.clone(), AssociationUnit::new(a)))
            .collect();
        let mut orphans = OrphanStore::default();
        let mut tour_index = HashMap::new();
        let mut contribution_index = HashMap::new();

        for tour in snapshot.tours {
            match units.get_mut(&tour.association_id) {
                Some(unit) => {
                    tour_index.insert(tour.id.clone(), tour.association_id.clone());
                    unit.tours.push(tour);
                }
                None => orphans.tours.push(tour),
            }
        }
        for contribution in snapshot.contributions {
            match units.get_mut(&contribution.association_id) {
                Some(unit) => {
                    contribution_index
                        .insert(contribution.id.clone(), contribution.association_id.clone());
                    unit.contributions.push(contribution);
                }
                None => orphans.contributions.push(contribution),
            }
        }
        for ledger in snapshot.ledgers {
            let owner = ledger
                .scope()
                .association_id()
                .and_then(|id| units.get_mut(id));
            match owner {
                Some(unit) if unit.ledger.is_none() => unit.ledger = Some(ledger),
                _ => orphans.ledgers.push(ledger),
            }
        }

        let association_count = units.len();
        let orphan_count = orphans.tours.len() + orphans.contributions.len() + orphans.ledgers.len();
        if orphan_count > 0 {
            warn!(orphans = orphan_count, "Snapshot contains orphaned records");
        }

        *write(&engine.units, "association map")? = units
            .into_iter()
            .map(|(id, unit)| (id, Arc::new(Mutex::new(unit))))
            .collect();
        *write(&engine.tour_index, "tour index")? = tour_index;
        *write(&engine.contribution_index, "contribution index")? = contribution_index;
        *lock(&engine.global, "global ledger")? = snapshot.global;
        *lock(&engine.orphans, "orphan store")? = orphans;

        info!(associations = association_count, "Engine restored from snapshot");
        Ok(engine)
    }

    /// Consistent point-in-time copy of the whole engine
    pub fn snapshot(&self) -> TontineResult<Snapshot> {
        let global = lock(&self.global, "global ledger")?.clone();
        let mut snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            global,
            ..Snapshot::default()
        };

        let mut handles: Vec<(AssociationId, UnitHandle)> = read(&self.units, "association map")?
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect();
        handles.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, handle) in handles {
            let unit = lock(&handle, "association unit")?;
            snapshot.associations.push(unit.association.clone());
            snapshot.tours.extend(unit.tours.iter().cloned());
            snapshot.contributions.extend(unit.contributions.iter().cloned());
            if let Some(ledger) = &unit.ledger {
                snapshot.ledgers.push(ledger.clone());
            }
        }

        let orphans = lock(&self.orphans, "orphan store")?;
        snapshot.tours.extend(orphans.tours.iter().cloned());
        snapshot.contributions.extend(orphans.contributions.iter().cloned());
        snapshot.ledgers.extend(orphans.ledgers.iter().cloned());

        Ok(snapshot)
    }

    // --- Associations ---

    pub fn create_association(
        &self,
        spec: AssociationSpec,
        ctx: &CommandContext,
    ) -> TontineResult<Association> {
        let association = Association::new(spec, ctx.actor_id().clone())?;
        let id = association.id.clone();
        write(&self.units, "association map")?
            .insert(id.clone(), Arc::new(Mutex::new(AssociationUnit::new(association.clone()))));

        info!(
            association = %id,
            name = %association.name,
            contribution = association.contribution_amount.0,
            frequency = ?association.frequency,
            actor = %ctx.actor_id(),
            "Association created"
        );
        Ok(association)
    }

    pub fn get_association(&self, association_id: &AssociationId) -> TontineResult<Association> {
        self.with_unit(association_id, |unit| Ok(unit.association.clone()))
    }

    pub fn list_associations(&self) -> TontineResult<Vec<Association>> {
        let mut associations = Vec::new();
        for handle in self.handles()? {
            associations.push(lock(&handle, "association unit")?.association.clone());
        }
        associations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(associations)
    }

    pub fn association_totals(
        &self,
        association_id: &AssociationId,
    ) -> TontineResult<AssociationTotals> {
        self.with_unit(association_id, |unit| Ok(unit.association.totals()))
    }

    pub fn suspend_association(
        &self,
        association_id: &AssociationId,
        ctx: &CommandContext,
    ) -> TontineResult<Association> {
        let association = self.commit_unit(association_id, |unit| {
            unit.association.suspend()?;
            Ok(unit.association.clone())
        })?;
        warn!(association = %association_id, actor = %ctx.actor_id(), "Association suspended");
        Ok(association)
    }

    pub fn resume_association(
        &self,
        association_id: &AssociationId,
        ctx: &CommandContext,
    ) -> TontineResult<Association> {
        let association = self.commit_unit(association_id, |unit| {
            unit.association.resume()?;
            Ok(unit.association.clone())
        })?;
        info!(
            association = %association_id,
            status = ?association.status,
            actor = %ctx.actor_id(),
            "Association resumed"
        );
        Ok(association)
    }

    /// Remove an association. Its tours, contributions and ledger stay behind
    /// as orphans until [`TontineEngine::purge_orphaned`] runs.
    pub fn delete_association(
        &self,
        association_id: &AssociationId,
        ctx: &CommandContext,
    ) -> TontineResult<()> {
        let handle = write(&self.units, "association map")?
            .remove(association_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Association, association_id))?;

        let mut unit = lock(&handle, "association unit")?;
        unit.retired = true;
        let mut orphans = lock(&self.orphans, "orphan store")?;
        orphans.tours.append(&mut unit.tours);
        orphans.contributions.append(&mut unit.contributions);
        if let Some(ledger) = unit.ledger.take() {
            orphans.ledgers.push(ledger);
        }

        warn!(association = %association_id, actor = %ctx.actor_id(), "Association deleted");
        Ok(())
    }

    // --- Membership Registry ---

    pub fn add_member(
        &self,
        association_id: &AssociationId,
        member: MemberRef,
        ctx: &CommandContext,
    ) -> TontineResult<AssociationTotals> {
        let registry = MembershipRegistry::new(self.directory.as_ref());
        self.commit_unit(association_id, |unit| {
            let totals = registry.add_member(&mut unit.association, member, ctx)?;
            // A newcomer reopens a finished rotation
            unit.refresh_completion();
            Ok(totals)
        })
    }

    pub fn deactivate_member(
        &self,
        association_id: &AssociationId,
        member_id: &MemberId,
        ctx: &CommandContext,
    ) -> TontineResult<AssociationTotals> {
        let registry = MembershipRegistry::new(self.directory.as_ref());
        self.commit_unit(association_id, |unit| {
            let totals = registry.deactivate_member(&mut unit.association, member_id, ctx)?;
            unit.refresh_completion();
            Ok(totals)
        })
    }

    // --- Rotation Scheduler ---

    pub fn assign_next_tour(
        &self,
        association_id: &AssociationId,
        mode: AssignmentMode,
        ctx: &CommandContext,
    ) -> TontineResult<Tour> {
        let scheduler = RotationScheduler::new(&self.config);
        let tour = self.commit_unit(association_id, |unit| {
            if let Some(key) = &ctx.idempotency_key {
                if let Some(existing) = unit.tour_by_idempotency_key(key) {
                    debug!(tour = %existing.id, key = %key, "Idempotent replay of tour assignment");
                    return Ok(existing.clone());
                }
            }
            let mut rng = lock(&self.rng, "rng")?;
            scheduler.assign_next_tour(unit, mode, ctx, &mut *rng)
        })?;
        write(&self.tour_index, "tour index")?.insert(tour.id.clone(), association_id.clone());
        Ok(tour)
    }

    /// Assign with the configured default mode
    pub fn assign_next_tour_default(
        &self,
        association_id: &AssociationId,
        ctx: &CommandContext,
    ) -> TontineResult<Tour> {
        self.assign_next_tour(association_id, self.config.default_assignment_mode.clone(), ctx)
    }

    pub fn update_tour_status(
        &self,
        tour_id: &TourId,
        change: StatusChange,
        ctx: &CommandContext,
    ) -> TontineResult<Tour> {
        let association_id = self.locate_tour(tour_id)?;
        let scheduler = RotationScheduler::new(&self.config);
        self.commit_unit(&association_id, |unit| {
            if let Some(key) = &ctx.idempotency_key {
                if unit.ledger_has_key(key) {
                    if unit.tour_settlement_has_key(tour_id, key) {
                        debug!(tour = %tour_id, key = %key, "Idempotent replay of tour status update");
                        return Ok(unit.tour(tour_id)?.clone());
                    }
                    return Err(TontineError::validation(format!(
                        "idempotency key {} was already used by another operation",
                        key
                    )));
                }
            }
            scheduler.update_tour_status(unit, tour_id, change, ctx)
        })
    }

    pub fn get_tour(&self, tour_id: &TourId) -> TontineResult<Tour> {
        let association_id = self.locate_tour(tour_id)?;
        self.with_unit(&association_id, |unit| Ok(unit.tour(tour_id)?.clone()))
    }

    /// Tours of one cycle ordered by tour number
    pub fn tours_for_cycle(
        &self,
        association_id: &AssociationId,
        cycle: u32,
    ) -> TontineResult<Vec<Tour>> {
        self.with_unit(association_id, |unit| {
            let mut tours: Vec<Tour> = unit.tours_in_cycle(cycle).cloned().collect();
            tours.sort_by_key(|t| t.tour_number);
            Ok(tours)
        })
    }

    // --- Contribution Tracker ---

    pub fn record_contribution(
        &self,
        association_id: &AssociationId,
        input: NewContribution,
        ctx: &CommandContext,
    ) -> TontineResult<Contribution> {
        let contribution = self.commit_unit(association_id, |unit| {
            if let Some(key) = &ctx.idempotency_key {
                if let Some(existing) = unit.contribution_by_idempotency_key(key) {
                    debug!(contribution = %existing.id, key = %key, "Idempotent replay of contribution");
                    return Ok(existing.clone());
                }
                if unit.ledger_has_key(key) {
                    return Err(TontineError::validation(format!(
                        "idempotency key {} was already used by another operation",
                        key
                    )));
                }
            }
            ContributionTracker::record_contribution(unit, input, ctx)
        })?;
        write(&self.contribution_index, "contribution index")?
            .insert(contribution.id.clone(), association_id.clone());
        Ok(contribution)
    }

    pub fn delete_contribution(
        &self,
        contribution_id: &ContributionId,
        ctx: &CommandContext,
    ) -> TontineResult<ContributionDeletion> {
        let association_id = self.locate_contribution(contribution_id)?;
        self.commit_unit(&association_id, |unit| {
            if let Some(key) = &ctx.idempotency_key {
                let replay = unit.ledger.as_ref().and_then(|ledger| {
                    ledger.find_by_idempotency_key(key).into_iter().find(|t| {
                        t.kind == TransactionKind::ContributionReversal
                            && t.refs.contribution_id.as_ref() == Some(contribution_id)
                    })
                });
                if let Some(txn) = replay {
                    debug!(contribution = %contribution_id, key = %key, "Idempotent replay of contribution deletion");
                    return Ok(ContributionDeletion {
                        contribution_id: contribution_id.clone(),
                        amount: txn.amount,
                        reversal: Some(txn.clone()),
                    });
                }
            }
            ContributionTracker::delete_contribution(unit, contribution_id, ctx)
        })
    }

    pub fn contributions_for_tour(&self, tour_id: &TourId) -> TontineResult<Vec<Contribution>> {
        let association_id = self.locate_tour(tour_id)?;
        self.with_unit(&association_id, |unit| {
            unit.tour(tour_id)?;
            Ok(unit.contributions_for_tour(tour_id).cloned().collect())
        })
    }

    pub fn get_tour_stats(&self, tour_id: &TourId) -> TontineResult<TourStats> {
        let association_id = self.locate_tour(tour_id)?;
        self.with_unit(&association_id, |unit| {
            ContributionTracker::get_tour_stats(unit, tour_id)
        })
    }

    // --- Central Ledger ---

    /// Pay the association's refusal pool out to other members
    pub fn redistribute(
        &self,
        association_id: &AssociationId,
        shares: &[RedistributionShare],
        ctx: &CommandContext,
    ) -> TontineResult<Vec<RedistributionRecord>> {
        if shares.len() > self.config.max_redistribution_beneficiaries {
            return Err(TontineError::validation(format!(
                "redistribution to {} beneficiaries exceeds the limit of {}",
                shares.len(),
                self.config.max_redistribution_beneficiaries
            )));
        }

        self.commit_unit(association_id, |unit| {
            if let Some(key) = &ctx.idempotency_key {
                if let Some(ledger) = unit.ledger.as_ref() {
                    let ids: Vec<_> = ledger
                        .find_by_idempotency_key(key)
                        .into_iter()
                        .filter(|t| t.kind == TransactionKind::Redistribution)
                        .map(|t| t.id.clone())
                        .collect();
                    if !ids.is_empty() {
                        debug!(association = %association_id, key = %key, "Idempotent replay of redistribution");
                        return Ok(ledger
                            .redistributions()
                            .iter()
                            .filter(|r| ids.contains(&r.transaction_id))
                            .cloned()
                            .collect());
                    }
                }
            }

            if let Some(share) = shares
                .iter()
                .find(|s| !unit.association.is_active_member(&s.member_id))
            {
                return Err(TontineError::not_found(
                    RecordKind::Membership,
                    &share.member_id,
                ));
            }
            unit.ledger_mut().redistribute(ctx, shares)
        })
    }

    /// Transaction-append contract for collaborators
    pub fn append_transaction(
        &self,
        scope: &LedgerScope,
        draft: TransactionDraft,
    ) -> TontineResult<Transaction> {
        match scope {
            LedgerScope::Global => lock(&self.global, "global ledger")?.commit(|l| l.append(draft)),
            LedgerScope::Association(id) => {
                self.commit_unit(id, |unit| unit.ledger_mut().append(draft))
            }
        }
    }

    pub fn balances(&self, scope: &LedgerScope) -> TontineResult<Balances> {
        self.read_ledger(scope, |ledger| {
            Ok(ledger.map(|l| l.balances()).unwrap_or_default())
        })
    }

    pub fn transactions(&self, scope: &LedgerScope) -> TontineResult<Vec<Transaction>> {
        self.read_ledger(scope, |ledger| {
            Ok(ledger.map(|l| l.transactions().to_vec()).unwrap_or_default())
        })
    }

    pub fn refused_tours(&self, scope: &LedgerScope) -> TontineResult<Vec<RefusedTour>> {
        self.read_ledger(scope, |ledger| {
            Ok(ledger.map(|l| l.refused_tours().to_vec()).unwrap_or_default())
        })
    }

    pub fn redistributions(&self, scope: &LedgerScope) -> TontineResult<Vec<RedistributionRecord>> {
        self.read_ledger(scope, |ledger| {
            Ok(ledger.map(|l| l.redistributions().to_vec()).unwrap_or_default())
        })
    }

    pub fn global_summary(&self) -> TontineResult<GlobalSummary> {
        let global = lock(&self.global, "global ledger")?;
        let mut summary = GlobalSummary {
            global: global.balances(),
            transactions: global.transactions().len(),
            ..GlobalSummary::default()
        };
        drop(global);

        for handle in self.handles()? {
            let unit = lock(&handle, "association unit")?;
            if let Some(ledger) = &unit.ledger {
                summary.associations = summary.associations.merged(&ledger.balances());
                summary.association_ledgers += 1;
                summary.transactions += ledger.transactions().len();
            }
        }
        summary.combined = summary.global.merged(&summary.associations);
        Ok(summary)
    }

    // --- Maintenance ---

    /// Rebuild one ledger from its log
    pub fn recompute_from_log(&self, scope: &LedgerScope) -> TontineResult<RecomputeOutcome> {
        match scope {
            LedgerScope::Global => lock(&self.global, "global ledger")?.recompute_from_log(),
            LedgerScope::Association(id) => self.commit_unit(id, |unit| {
                unit.ledger
                    .as_mut()
                    .ok_or_else(|| TontineError::not_found(RecordKind::Ledger, id))?
                    .recompute_from_log()
            }),
        }
    }

    pub fn recompute_all_ledgers(&self) -> TontineResult<RecomputeReport> {
        let mut report = RecomputeReport::default();
        {
            let mut global = lock(&self.global, "global ledger")?;
            let outcome = global.recompute_from_log();
            report.record(LedgerScope::Global, outcome);
        }

        for handle in self.handles()? {
            let mut unit = lock(&handle, "association unit")?;
            if unit.retired {
                continue;
            }
            if let Some(ledger) = unit.ledger.as_mut() {
                let scope = ledger.scope().clone();
                let outcome = ledger.recompute_from_log();
                report.record(scope, outcome);
            }
        }

        if report.failures.is_empty() {
            info!(
                scanned = report.ledgers_scanned,
                repaired = report.ledgers_repaired,
                "Recomputed all ledgers"
            );
        } else {
            warn!(
                scanned = report.ledgers_scanned,
                repaired = report.ledgers_repaired,
                failed = report.failures.len(),
                "Recomputed ledgers with failures"
            );
        }
        Ok(report)
    }

    /// Delete records referencing deleted associations and repair indexes
    pub fn purge_orphaned(&self, ctx: &CommandContext) -> TontineResult<PurgeReport> {
        let mut report = PurgeReport::default();
        lock(&self.orphans, "orphan store")?.drain_into(&mut report);

        // Contributions whose tour is gone from a live association
        for handle in self.handles()? {
            let mut unit = lock(&handle, "association unit")?;
            let AssociationUnit {
                tours,
                contributions,
                ..
            } = &mut *unit;
            contributions.retain(|c| {
                let known = tours.iter().any(|t| t.id == c.tour_id);
                if !known {
                    report.findings.push(TontineError::OrphanedReference {
                        kind: RecordKind::Contribution,
                        id: c.id.to_string(),
                        missing: format!("tour {}", c.tour_id),
                    });
                    report.contributions_removed += 1;
                }
                known
            });
        }

        let live: Vec<AssociationId> = read(&self.units, "association map")?
            .keys()
            .cloned()
            .collect();
        {
            let mut index = write(&self.tour_index, "tour index")?;
            let before = index.len();
            index.retain(|_, a| live.contains(a));
            report.index_entries_repaired += before - index.len();
        }
        {
            let mut index = write(&self.contribution_index, "contribution index")?;
            let before = index.len();
            index.retain(|_, a| live.contains(a));
            report.index_entries_repaired += before - index.len();
        }

        if report.is_clean() {
            info!(actor = %ctx.actor_id(), "Purge found no orphaned records");
        } else {
            warn!(
                ledgers = report.ledgers_removed,
                tours = report.tours_removed,
                contributions = report.contributions_removed,
                index_entries = report.index_entries_repaired,
                actor = %ctx.actor_id(),
                "Purged orphaned records"
            );
        }
        Ok(report)
    }

    // --- Internals ---

    fn handles(&self) -> TontineResult<Vec<UnitHandle>> {
        Ok(read(&self.units, "association map")?
            .values()
            .map(Arc::clone)
            .collect())
    }

    fn handle(&self, association_id: &AssociationId) -> TontineResult<UnitHandle> {
        read(&self.units, "association map")?
            .get(association_id)
            .cloned()
            .ok_or_else(|| TontineError::not_found(RecordKind::Association, association_id))
    }

    fn with_unit<T>(
        &self,
        association_id: &AssociationId,
        op: impl FnOnce(&AssociationUnit) -> TontineResult<T>,
    ) -> TontineResult<T> {
        let handle = self.handle(association_id)?;
        let unit = lock(&handle, "association unit")?;
        if unit.retired {
            return Err(TontineError::not_found(RecordKind::Association, association_id));
        }
        op(&unit)
    }

    /// Run `op` on a staged copy of the unit and keep it only on success
    fn commit_unit<T>(
        &self,
        association_id: &AssociationId,
        op: impl FnOnce(&mut AssociationUnit) -> TontineResult<T>,
    ) -> TontineResult<T> {
        let handle = self.handle(association_id)?;
        let mut unit = lock(&handle, "association unit")?;
        if unit.retired {
            return Err(TontineError::not_found(RecordKind::Association, association_id));
        }
        let mut staged = unit.clone();
        let out = op(&mut staged)?;
        *unit = staged;
        Ok(out)
    }

    fn read_ledger<T>(
        &self,
        scope: &LedgerScope,
        op: impl FnOnce(Option<&Ledger>) -> TontineResult<T>,
    ) -> TontineResult<T> {
        match scope {
            LedgerScope::Global => op(Some(&*lock(&self.global, "global ledger")?)),
            LedgerScope::Association(id) => self.with_unit(id, |unit| op(unit.ledger.as_ref())),
        }
    }

    fn locate_tour(&self, tour_id: &TourId) -> TontineResult<AssociationId> {
        if let Some(id) = read(&self.tour_index, "tour index")?.get(tour_id) {
            return Ok(id.clone());
        }
        for handle in self.handles()? {
            let unit = lock(&handle, "association unit")?;
            if unit.tours.iter().any(|t| &t.id == tour_id) {
                let id = unit.association.id.clone();
                drop(unit);
                write(&self.tour_index, "tour index")?.insert(tour_id.clone(), id.clone());
                return Ok(id);
            }
        }
        Err(TontineError::not_found(RecordKind::Tour, tour_id))
    }

    fn locate_contribution(&self, contribution_id: &ContributionId) -> TontineResult<AssociationId> {
        if let Some(id) = read(&self.contribution_index, "contribution index")?.get(contribution_id)
        {
            return Ok(id.clone());
        }
        // Deleted contributions are still findable through their ledger entries.
        for handle in self.handles()? {
            let unit = lock(&handle, "association unit")?;
            let known = unit.contributions.iter().any(|c| &c.id == contribution_id)
                || unit.ledger.as_ref().is_some_and(|l| {
                    l.transactions()
                        .iter()
                        .any(|t| t.refs.contribution_id.as_ref() == Some(contribution_id))
                });
            if known {
                let id = unit.association.id.clone();
                drop(unit);
                write(&self.contribution_index, "contribution index")?
                    .insert(contribution_id.clone(), id.clone());
                return Ok(id);
            }
        }
        Err(TontineError::not_found(RecordKind::Contribution, contribution_id))
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> TontineResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| TontineError::Storage(format!("{} lock poisoned", what)))
}

fn read<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> TontineResult<std::sync::RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| TontineError::Storage(format!("{} lock poisoned", what)))
}

fn write<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> TontineResult<std::sync::RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| TontineError::Storage(format!("{} lock poisoned", what)))
}
