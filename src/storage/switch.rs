//! Runtime-switchable persistence.
//!
//! The switch owns both engines for the life of the process. Resolving the
//! active engine is an atomic load plus an `Arc` clone; callers hold the
//! returned [`Engine`] for one operation and resolve again on the next.

use super::memory::InMemoryEngine;
use super::relational::RelationalEngine;
use super::traits::{CardFilter, StorageEngine};
use crate::models::{Card, CardId};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Identifies a storage engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// The in-process map.
    #[default]
    Memory,
    /// The `SQLite` database.
    Relational,
}

impl PersistenceMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Relational => "relational",
        }
    }

    const fn to_flag(self) -> u8 {
        match self {
            Self::Memory => 0,
            Self::Relational => 1,
        }
    }

    const fn from_flag(flag: u8) -> Self {
        match flag {
            1 => Self::Relational,
            _ => Self::Memory,
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistenceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" | "in-memory" => Ok(Self::Memory),
            "relational" | "sqlite" | "sql" | "database" | "db" => Ok(Self::Relational),
            other => Err(Error::InvalidInput(format!(
                "unknown persistence mode '{other}' (expected 'memory' or 'relational')"
            ))),
        }
    }
}

/// The engine resolved for one call.
#[derive(Debug, Clone)]
pub enum Engine {
    /// The in-memory engine.
    Memory(Arc<InMemoryEngine>),
    /// The relational engine.
    Relational(Arc<RelationalEngine>),
}

impl Engine {
    fn inner(&self) -> &dyn StorageEngine {
        match self {
            Self::Memory(engine) => engine.as_ref(),
            Self::Relational(engine) => engine.as_ref(),
        }
    }
}

#[async_trait]
impl StorageEngine for Engine {
    async fn get_all(&self) -> Result<Vec<Card>> {
        self.inner().get_all().await
    }

    async fn get_by_id(&self, id: &CardId) -> Result<Option<Card>> {
        self.inner().get_by_id(id).await
    }

    async fn add(&self, card: Card) -> Result<Card> {
        self.inner().add(card).await
    }

    async fn update(&self, card: Card) -> Result<Card> {
        self.inner().update(card).await
    }

    async fn delete(&self, id: &CardId) -> Result<()> {
        self.inner().delete(id).await
    }

    async fn clear(&self) -> Result<()> {
        self.inner().clear().await
    }

    async fn bulk_load(&self, path: &Path) -> Result<usize> {
        self.inner().bulk_load(path).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner().count().await
    }

    async fn find(&self, filter: &CardFilter, limit: Option<usize>) -> Result<Vec<Card>> {
        self.inner().find(filter, limit).await
    }

    fn mode(&self) -> PersistenceMode {
        self.inner().mode()
    }
}

/// Holds both engines and the active-mode flag.
pub struct PersistenceSwitch {
    memory: Arc<InMemoryEngine>,
    /// The relational engine, or the reason it could not be constructed.
    relational: std::result::Result<Arc<RelationalEngine>, String>,
    mode: AtomicU8,
}

impl PersistenceSwitch {
    /// Creates a switch over both engines, starting in memory mode.
    #[must_use]
    pub fn new(memory: Arc<InMemoryEngine>, relational: Arc<RelationalEngine>) -> Self {
        Self {
            memory,
            relational: Ok(relational),
            mode: AtomicU8::new(PersistenceMode::Memory.to_flag()),
        }
    }

    /// Creates a switch whose relational engine is not configured.
    #[must_use]
    pub fn memory_only(memory: Arc<InMemoryEngine>) -> Self {
        Self::with_unavailable_relational(memory, "relational engine not configured")
    }

    /// Creates a switch whose relational engine failed to start.
    #[must_use]
    pub fn with_unavailable_relational(
        memory: Arc<InMemoryEngine>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            memory,
            relational: Err(reason.into()),
            mode: AtomicU8::new(PersistenceMode::Memory.to_flag()),
        }
    }

    /// Creates a switch from the outcome of opening the relational engine.
    ///
    /// A failed open is logged and leaves the switch usable in memory mode.
    #[must_use]
    pub fn from_bootstrap(
        memory: Arc<InMemoryEngine>,
        relational: Result<RelationalEngine>,
    ) -> Self {
        match relational {
            Ok(engine) => Self::new(memory, Arc::new(engine)),
            Err(e) => {
                tracing::warn!(error = %e, "Relational engine unavailable, continuing in memory mode");
                Self::with_unavailable_relational(memory, e.to_string())
            },
        }
    }

    /// Returns the engine for the active mode.
    #[must_use]
    pub fn current(&self) -> Engine {
        match PersistenceMode::from_flag(self.mode.load(Ordering::Acquire)) {
            PersistenceMode::Relational => match &self.relational {
                Ok(engine) => Engine::Relational(Arc::clone(engine)),
                // The flag is only set after checking availability
                Err(_) => Engine::Memory(Arc::clone(&self.memory)),
            },
            PersistenceMode::Memory => Engine::Memory(Arc::clone(&self.memory)),
        }
    }

    /// Returns the active mode.
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        PersistenceMode::from_flag(self.mode.load(Ordering::Acquire))
    }

    /// Activates `mode` for subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] when switching to an unavailable
    /// relational engine. The active mode is unchanged in that case.
    pub fn switch_mode(&self, mode: PersistenceMode) -> Result<PersistenceMode> {
        if mode == PersistenceMode::Relational {
            if let Err(reason) = &self.relational {
                return Err(Error::StorageUnavailable {
                    backend: PersistenceMode::Relational.as_str().to_string(),
                    cause: reason.clone(),
                });
            }
        }

        let previous = PersistenceMode::from_flag(self.mode.swap(mode.to_flag(), Ordering::AcqRel));
        if previous != mode {
            tracing::info!(from = %previous, to = %mode, "Switched persistence mode");
            metrics::counter!("persistence_mode_switches_total", "to" => mode.as_str())
                .increment(1);
        }
        Ok(mode)
    }

    /// Returns the in-memory engine.
    #[must_use]
    pub fn memory(&self) -> Arc<InMemoryEngine> {
        Arc::clone(&self.memory)
    }

    /// Returns the relational engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if it is not available.
    pub fn relational(&self) -> Result<Arc<RelationalEngine>> {
        self.relational
            .as_ref()
            .map(Arc::clone)
            .map_err(|reason| Error::StorageUnavailable {
                backend: PersistenceMode::Relational.as_str().to_string(),
                cause: reason.clone(),
            })
    }

    /// Returns true if the relational engine is available.
    #[must_use]
    pub const fn relational_available(&self) -> bool {
        self.relational.is_ok()
    }
}

impl fmt::Debug for PersistenceSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceSwitch")
            .field("mode", &self.mode())
            .field("relational_available", &self.relational_available())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "memory".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Memory
        );
        assert_eq!(
            " Relational ".parse::<PersistenceMode>().unwrap(),
            PersistenceMode::Relational
        );
        assert!(matches!(
            "postgres".parse::<PersistenceMode>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_switch_to_unavailable_relational_keeps_mode() {
        let switch = PersistenceSwitch::memory_only(Arc::new(InMemoryEngine::new()));
        let result = switch.switch_mode(PersistenceMode::Relational);

        assert!(matches!(result, Err(Error::StorageUnavailable { .. })));
        assert_eq!(switch.mode(), PersistenceMode::Memory);
        assert_eq!(switch.current().mode(), PersistenceMode::Memory);
        assert!(switch.relational().is_err());
    }

    #[tokio::test]
    async fn test_switch_routes_calls() {
        let dir = tempfile::tempdir().unwrap();
        let relational = RelationalEngine::open(dir.path().join("cards.db")).unwrap();
        let switch = PersistenceSwitch::new(Arc::new(InMemoryEngine::new()), Arc::new(relational));

        switch.current().add(Card::new("In Memory")).await.unwrap();
        assert_eq!(
            switch.switch_mode(PersistenceMode::Relational).unwrap(),
            PersistenceMode::Relational
        );
        assert_eq!(switch.current().mode(), PersistenceMode::Relational);
        assert_eq!(switch.current().count().await.unwrap(), 0);

        switch.switch_mode(PersistenceMode::Memory).unwrap();
        let cards = switch.current().get_all().await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "In Memory");
    }

    #[tokio::test]
    async fn test_resolved_handle_survives_switch() {
        let dir = tempfile::tempdir().unwrap();
        let relational = RelationalEngine::open(dir.path().join("cards.db")).unwrap();
        let switch = PersistenceSwitch::new(Arc::new(InMemoryEngine::new()), Arc::new(relational));

        let in_flight = switch.current();
        switch.switch_mode(PersistenceMode::Relational).unwrap();
        in_flight.add(Card::new("Late Write")).await.unwrap();

        assert_eq!(switch.memory().count().await.unwrap(), 1);
        assert_eq!(switch.current().count().await.unwrap(), 0);
    }
}
