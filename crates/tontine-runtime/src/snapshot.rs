//! Store-agnostic persistence layout
//!
//! Associations embed their memberships; ledgers embed their transactions,
//! refused tours and redistributions; tours and contributions are separate
//! records pointing at their association by id.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tontine_ledger::Ledger;
use tontine_types::{Association, Contribution, TontineError, TontineResult, Tour};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full engine state at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub associations: Vec<Association>,
    #[serde(default)]
    pub tours: Vec<Tour>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    /// Per-association ledgers
    #[serde(default)]
    pub ledgers: Vec<Ledger>,
    pub global: Ledger,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            associations: Vec::new(),
            tours: Vec::new(),
            contributions: Vec::new(),
            ledgers: Vec::new(),
            global: Ledger::global(),
        }
    }
}

impl Snapshot {
    pub fn to_json(&self) -> TontineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| TontineError::Storage(format!("snapshot serialization failed: {}", e)))
    }

    pub fn from_json(json: &str) -> TontineResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| TontineError::Storage(format!("snapshot is not valid JSON: {}", e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TontineError::Storage(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn load(path: &Path) -> TontineResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            TontineError::Storage(format!("cannot read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Write atomically through a sibling temp file
    pub fn save(&self, path: &Path) -> TontineResult<()> {
        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| {
            TontineError::Storage(format!("cannot write snapshot {}: {}", tmp.display(), e))
        })?;
        fs::rename(&tmp, path).map_err(|e| {
            TontineError::Storage(format!("cannot replace snapshot {}: {}", path.display(), e))
        })
    }
}
