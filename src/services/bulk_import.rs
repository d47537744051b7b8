//! Dataset import into one or both engines.

use crate::security::{AccessControl, Identity, Permission};
use crate::storage::{PersistenceMode, PersistenceSwitch, StorageEngine};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Which engines a load writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTarget {
    /// The in-memory engine only.
    Memory,
    /// The relational engine only.
    Relational,
    /// Memory first, then relational.
    Both,
}

impl LoadTarget {
    /// The engines this target covers, in load order.
    #[must_use]
    pub const fn modes(self) -> &'static [PersistenceMode] {
        match self {
            Self::Memory => &[PersistenceMode::Memory],
            Self::Relational => &[PersistenceMode::Relational],
            Self::Both => &[PersistenceMode::Memory, PersistenceMode::Relational],
        }
    }
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Relational => "relational",
            Self::Both => "both",
        })
    }
}

impl FromStr for LoadTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "both" | "all" => Ok(Self::Both),
            other => other.parse::<PersistenceMode>().map(|mode| match mode {
                PersistenceMode::Memory => Self::Memory,
                PersistenceMode::Relational => Self::Relational,
            }),
        }
    }
}

/// Outcome of loading into one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// The engine loaded.
    pub target: PersistenceMode,
    /// Whether the load completed.
    pub success: bool,
    /// Records upserted.
    pub records_loaded: usize,
    /// Failure description when `success` is false.
    pub error_message: Option<String>,
}

impl LoadReport {
    fn loaded(target: PersistenceMode, records_loaded: usize) -> Self {
        Self {
            target,
            success: true,
            records_loaded,
            error_message: None,
        }
    }

    fn failed(target: PersistenceMode, message: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            records_loaded: 0,
            error_message: Some(message.into()),
        }
    }
}

/// Imports the configured CSV dataset.
///
/// Engines are addressed directly, independent of the active mode.
pub struct BulkImportService {
    switch: Arc<PersistenceSwitch>,
    dataset_path: PathBuf,
    access: AccessControl,
}

impl BulkImportService {
    /// Creates an import service for a dataset file.
    #[must_use]
    pub fn new(switch: Arc<PersistenceSwitch>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            switch,
            dataset_path: dataset_path.into(),
            access: AccessControl::new(),
        }
    }

    /// Replaces the access rules.
    #[must_use]
    pub fn with_access(mut self, access: AccessControl) -> Self {
        self.access = access;
        self
    }

    /// Returns the dataset path.
    #[must_use]
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Loads the dataset into the target engines.
    ///
    /// Returns one report per engine. Engine failures, including a missing
    /// dataset file, are reported rather than returned. A failure in one
    /// engine does not prevent loading the next.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forbidden`] if the identity lacks the bulk-load
    /// permission. Nothing is loaded in that case.
    #[instrument(skip(self, identity), fields(operation = "trigger_load", load_target = %target, subject = %identity.subject))]
    pub async fn trigger_load(
        &self,
        identity: &Identity,
        target: LoadTarget,
    ) -> Result<Vec<LoadReport>> {
        self.access.check(identity, Permission::BulkLoad)?;

        if !self.dataset_path.is_file() {
            let message = format!("dataset not found: {}", self.dataset_path.display());
            tracing::warn!("{message}");
            return Ok(target
                .modes()
                .iter()
                .map(|mode| LoadReport::failed(*mode, message.clone()))
                .collect());
        }

        let mut reports = Vec::with_capacity(target.modes().len());
        for mode in target.modes() {
            reports.push(self.load_into(*mode).await);
        }
        Ok(reports)
    }

    async fn load_into(&self, mode: PersistenceMode) -> LoadReport {
        let start = Instant::now();
        let result = match mode {
            PersistenceMode::Memory => self.switch.memory().bulk_load(&self.dataset_path).await,
            PersistenceMode::Relational => match self.switch.relational() {
                Ok(engine) => engine.bulk_load(&self.dataset_path).await,
                Err(e) => Err(e),
            },
        };

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("bulk_loads_total", "target" => mode.as_str(), "status" => status)
            .increment(1);
        metrics::histogram!("bulk_load_duration_ms", "target" => mode.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(loaded) => {
                tracing::info!(engine = %mode, loaded, "Bulk load complete");
                LoadReport::loaded(mode, loaded)
            },
            Err(e) => {
                tracing::warn!(engine = %mode, error = %e, "Bulk load failed");
                LoadReport::failed(mode, e.to_string())
            },
        }
    }
}
