//! # Cardvault
//!
//! A card catalog service with hot-swappable persistence and a natural-language
//! query facade.
//!
//! Cardvault keeps a catalog of cards behind one storage contract that two
//! engines satisfy: an in-process concurrent map and a `SQLite` database. The
//! active engine can be switched at runtime without touching calling code.
//! Queries run through a cascade: a deterministic rule router first, then a
//! language model that may call back into storage through a tool invocation.
//!
//! ## Features
//!
//! - Two storage engines behind one async trait (`storage::StorageEngine`)
//! - Lock-free runtime switching (`storage::PersistenceSwitch`)
//! - Idempotent CSV bulk import with upsert semantics
//! - Rule router with a fixed priority order
//! - Language model fallback with tool-call execution
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cardvault::query::QueryOrchestrator;
//! use cardvault::storage::{InMemoryEngine, PersistenceMode, PersistenceSwitch};
//!
//! let switch = Arc::new(PersistenceSwitch::memory_only(Arc::new(InMemoryEngine::new())));
//! let orchestrator = QueryOrchestrator::with_defaults(Arc::clone(&switch), None);
//! let result = orchestrator.process_query("how many cards are there").await;
//! println!("{} ({})", result.response, result.router);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod llm;
pub mod models;
pub mod observability;
pub mod query;
pub mod security;
pub mod services;
pub mod storage;

pub use config::CardvaultConfig;
pub use llm::CompletionClient;
pub use models::{Card, CardId, QueryResult, RouterKind};
pub use query::QueryOrchestrator;
pub use security::{Identity, Role};
pub use services::{BulkImportService, CatalogService, LoadReport, LoadTarget};
pub use storage::{Engine, InMemoryEngine, PersistenceMode, PersistenceSwitch, RelationalEngine, StorageEngine};

/// Error type for cardvault operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty card name, malformed mode name, empty or oversized query |
/// | `NotFound` | Unknown id on update or delete |
/// | `StorageUnavailable` | Relational database cannot be opened or bootstrapped |
/// | `ExternalService` | Language model call fails or returns a malformed body |
/// | `Forbidden` | Privileged operation without an elevated role |
/// | `OperationFailed` | Any other storage or I/O failure |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A card is created or updated with an empty name
    /// - A field exceeds its maximum length
    /// - A persistence mode name is not recognized
    /// - A query is empty or longer than the configured limit
    /// - A CSV source has no `name` column or does not exist
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested entity does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Kind of entity (e.g. "card").
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A storage engine could not be reached or initialized.
    ///
    /// Retryable by the caller. The engine never falls back to another engine.
    #[error("storage '{backend}' unavailable: {cause}")]
    StorageUnavailable {
        /// The backend that failed.
        backend: String,
        /// The underlying cause.
        cause: String,
    },

    /// An external service call failed.
    #[error("external service '{service}' failed: {cause}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// The underlying cause.
        cause: String,
    },

    /// The caller's identity lacks the permission for this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for failures a caller may reasonably retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::ExternalService { .. }
        )
    }

    /// Builds a `NotFound` error for a card id.
    #[must_use]
    pub fn card_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "card",
            id: id.into(),
        }
    }
}

/// Result type alias for cardvault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use cardvault::current_timestamp;
///
/// assert!(current_timestamp() > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("name is required".to_string());
        assert_eq!(err.to_string(), "invalid input: name is required");

        let err = Error::card_not_found("abc");
        assert_eq!(err.to_string(), "card 'abc' not found");

        let err = Error::StorageUnavailable {
            backend: "relational".to_string(),
            cause: "unable to open database file".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "storage 'relational' unavailable: unable to open database file"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            Error::StorageUnavailable {
                backend: "relational".to_string(),
                cause: "locked".to_string(),
            }
            .is_retryable()
        );
        assert!(
            Error::ExternalService {
                service: "openai".to_string(),
                cause: "503".to_string(),
            }
            .is_retryable()
        );
        assert!(!Error::InvalidInput("x".to_string()).is_retryable());
        assert!(!Error::card_not_found("x").is_retryable());
        assert!(!Error::Forbidden("clear".to_string()).is_retryable());
    }
}
