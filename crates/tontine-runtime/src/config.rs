//! Engine configuration

use serde::{Deserialize, Serialize};
use tontine_types::{AssignmentMode, TontineError, TontineResult};

/// Tunables for the rotation and ledger engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on beneficiaries in a single redistribution
    #[serde(default = "default_max_redistribution_beneficiaries")]
    pub max_redistribution_beneficiaries: usize,

    /// Whether a tour with nothing collected may still be refused
    #[serde(default = "default_true")]
    pub allow_zero_refusal: bool,

    /// Mode used by callers that do not pick one (lottery or alphabetical)
    #[serde(default = "default_assignment_mode")]
    pub default_assignment_mode: AssignmentMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_redistribution_beneficiaries: default_max_redistribution_beneficiaries(),
            allow_zero_refusal: true,
            default_assignment_mode: default_assignment_mode(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> TontineResult<()> {
        if self.max_redistribution_beneficiaries == 0 {
            return Err(TontineError::Configuration(
                "max_redistribution_beneficiaries must be at least 1".into(),
            ));
        }
        if self.default_assignment_mode.chosen_member().is_some() {
            return Err(TontineError::Configuration(format!(
                "default_assignment_mode cannot be {}: it needs a caller-chosen member",
                self.default_assignment_mode.label()
            )));
        }
        Ok(())
    }
}

fn default_max_redistribution_beneficiaries() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_assignment_mode() -> AssignmentMode {
    AssignmentMode::Lottery
}
