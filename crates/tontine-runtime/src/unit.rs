//! The serialization unit: one association with its tours, contributions and ledger

use serde::{Deserialize, Serialize};
use tontine_ledger::Ledger;
use tontine_types::{
    Amount, Association, Contribution, ContributionId, IdempotencyKey, LedgerScope, MemberId,
    RecordKind, TontineError, TontineResult, Tour, TourId, TransactionKind,
};

/// Everything a mutating operation on one association may touch.
///
/// The engine hands out a staged clone of the unit per operation and swaps it
/// back only on success, so a failed operation leaves no partial write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssociationUnit {
    pub association: Association,
    pub tours: Vec<Tour>,
    pub contributions: Vec<Contribution>,
    /// Created the first time money moves
    pub ledger: Option<Ledger>,
    /// Set once the association is deleted; the engine refuses further commits
    #[serde(skip)]
    pub(crate) retired: bool,
}

impl AssociationUnit {
    pub fn new(association: Association) -> Self {
        Self {
            association,
            tours: Vec::new(),
            contributions: Vec::new(),
            ledger: None,
            retired: false,
        }
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        let scope = LedgerScope::Association(self.association.id.clone());
        self.ledger.get_or_insert_with(|| Ledger::new(scope))
    }

    pub fn tour(&self, tour_id: &TourId) -> TontineResult<&Tour> {
        self.tours
            .iter()
            .find(|t| &t.id == tour_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Tour, tour_id))
    }

    pub fn tour_mut(&mut self, tour_id: &TourId) -> TontineResult<&mut Tour> {
        self.tours
            .iter_mut()
            .find(|t| &t.id == tour_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Tour, tour_id))
    }

    pub fn contribution(&self, contribution_id: &ContributionId) -> TontineResult<&Contribution> {
        self.contributions
            .iter()
            .find(|c| &c.id == contribution_id)
            .ok_or_else(|| TontineError::not_found(RecordKind::Contribution, contribution_id))
    }

    pub fn tours_in_cycle(&self, cycle: u32) -> impl Iterator<Item = &Tour> {
        self.tours.iter().filter(move |t| t.cycle == cycle)
    }

    pub fn has_tour_in_cycle(&self, member_id: &MemberId, cycle: u32) -> bool {
        self.tours_in_cycle(cycle).any(|t| &t.beneficiary == member_id)
    }

    pub fn contributions_for_tour<'a>(
        &'a self,
        tour_id: &'a TourId,
    ) -> impl Iterator<Item = &'a Contribution> + 'a {
        self.contributions.iter().filter(move |c| &c.tour_id == tour_id)
    }

    /// Sum of received contributions for a tour
    pub fn collected_for_tour(&self, tour_id: &TourId) -> TontineResult<Amount> {
        self.contributions_for_tour(tour_id)
            .filter(|c| c.is_received())
            .try_fold(Amount::zero(), |acc, c| acc.checked_add(c.amount))
            .ok_or_else(|| {
                TontineError::validation(format!("collected total overflows for tour {}", tour_id))
            })
    }

    /// Re-evaluate Active/Finished from the tours of the current cycle
    pub fn refresh_completion(&mut self) {
        let cycle = self.association.current_cycle;
        let resolved = self
            .tours_in_cycle(cycle)
            .filter(|t| t.status.is_resolved())
            .count();
        self.association.refresh_completion(resolved);
    }

    pub fn tour_by_idempotency_key(&self, key: &IdempotencyKey) -> Option<&Tour> {
        self.tours
            .iter()
            .find(|t| t.idempotency_key.as_ref() == Some(key))
    }

    pub fn contribution_by_idempotency_key(&self, key: &IdempotencyKey) -> Option<&Contribution> {
        self.contributions
            .iter()
            .find(|c| c.idempotency_key.as_ref() == Some(key))
    }

    /// Whether `key` marks a payout, refusal or refusal cancellation of this tour
    pub fn tour_settlement_has_key(&self, tour_id: &TourId, key: &IdempotencyKey) -> bool {
        self.ledger.as_ref().is_some_and(|ledger| {
            ledger.find_by_idempotency_key(key).into_iter().any(|t| {
                matches!(
                    t.kind,
                    TransactionKind::Payout
                        | TransactionKind::Refusal
                        | TransactionKind::RefusalCancellation
                ) && t.refs.tour_id.as_ref() == Some(tour_id)
            })
        })
    }

    pub fn ledger_has_key(&self, key: &IdempotencyKey) -> bool {
        self.ledger
            .as_ref()
            .map(|l| l.has_idempotency_key(key))
            .unwrap_or(false)
    }
}
