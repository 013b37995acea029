//! Maintenance reports and the orphan area

use serde::{Deserialize, Serialize};
use tontine_ledger::{Ledger, LedgerReader, RecomputeOutcome};
use tontine_types::{
    Balances, Contribution, ErrorKind, LedgerScope, RecordKind, TontineError, TontineResult, Tour,
};
use tracing::warn;

/// Result of `recompute_all_ledgers`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeReport {
    pub ledgers_scanned: usize,
    /// Ledgers whose materialized view differed from the replay
    pub ledgers_repaired: usize,
    pub outcomes: Vec<RecomputeOutcome>,
    /// Ledgers whose log could not be replayed; they are left as they were
    #[serde(default)]
    pub failures: Vec<RecomputeFailure>,
}

/// A ledger the sweep could not rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeFailure {
    pub scope: LedgerScope,
    pub kind: ErrorKind,
    pub reason: String,
}

impl RecomputeReport {
    pub(crate) fn record(
        &mut self,
        scope: LedgerScope,
        outcome: TontineResult<RecomputeOutcome>,
    ) {
        self.ledgers_scanned += 1;
        match outcome {
            Ok(outcome) => {
                if outcome.drift_detected {
                    self.ledgers_repaired += 1;
                }
                self.outcomes.push(outcome);
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "Ledger log could not be replayed");
                self.failures.push(RecomputeFailure {
                    scope,
                    kind: e.kind(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Result of `purge_orphaned`. Findings are reported, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub ledgers_removed: usize,
    pub tours_removed: usize,
    pub contributions_removed: usize,
    /// Lookup index entries pointing at missing records
    pub index_entries_repaired: usize,
    pub findings: Vec<TontineError>,
}

impl PurgeReport {
    pub fn records_removed(&self) -> usize {
        self.ledgers_removed + self.tours_removed + self.contributions_removed
    }

    pub fn is_clean(&self) -> bool {
        self.records_removed() == 0 && self.index_entries_repaired == 0
    }
}

/// Balances across every ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSummary {
    /// The global ledger fed by collaborators
    pub global: Balances,
    /// Sum over all association ledgers
    pub associations: Balances,
    pub combined: Balances,
    pub association_ledgers: usize,
    pub transactions: usize,
}

/// Records whose association no longer exists
#[derive(Debug, Clone, Default)]
pub(crate) struct OrphanStore {
    pub tours: Vec<Tour>,
    pub contributions: Vec<Contribution>,
    pub ledgers: Vec<Ledger>,
}

impl OrphanStore {
    /// Empty the store into a report
    pub fn drain_into(&mut self, report: &mut PurgeReport) {
        for tour in self.tours.drain(..) {
            report.findings.push(TontineError::OrphanedReference {
                kind: RecordKind::Tour,
                id: tour.id.to_string(),
                missing: format!("association {}", tour.association_id),
            });
            report.tours_removed += 1;
        }
        for contribution in self.contributions.drain(..) {
            report.findings.push(TontineError::OrphanedReference {
                kind: RecordKind::Contribution,
                id: contribution.id.to_string(),
                missing: format!("association {}", contribution.association_id),
            });
            report.contributions_removed += 1;
        }
        for ledger in self.ledgers.drain(..) {
            report.findings.push(TontineError::OrphanedReference {
                kind: RecordKind::Ledger,
                id: ledger.scope().to_string(),
                missing: ledger
                    .scope()
                    .association_id()
                    .map(|id| format!("association {}", id))
                    .unwrap_or_else(|| "association".to_string()),
            });
            report.ledgers_removed += 1;
        }
    }
}
