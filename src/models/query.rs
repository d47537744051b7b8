//! Query result envelope.

use super::Card;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// Which router produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouterKind {
    /// The deterministic rule router.
    Rule,
    /// The language model fallback.
    LanguageModel,
    /// No router produced a result; the response carries the error message.
    Error,
}

impl RouterKind {
    /// Returns the router kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "Rule",
            Self::LanguageModel => "LanguageModel",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for RouterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized response shape returned by the query orchestrator.
///
/// `result_count` is derived from `data` and cannot drift from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Human-readable response text.
    pub response: String,
    /// Matching cards, when the router produced any.
    pub data: Option<Vec<Card>>,
    /// The router that handled the query.
    pub router: RouterKind,
    /// Wall-clock time spent in the router cascade.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Creates a result with no card data.
    #[must_use]
    pub fn text(router: RouterKind, response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            data: None,
            router,
            execution_time_ms: 0,
        }
    }

    /// Creates a result carrying cards.
    #[must_use]
    pub fn with_cards(router: RouterKind, response: impl Into<String>, cards: Vec<Card>) -> Self {
        Self {
            response: response.into(),
            data: Some(cards),
            router,
            execution_time_ms: 0,
        }
    }

    /// Creates an error envelope.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::text(RouterKind::Error, message)
    }

    /// Sets the measured execution time.
    #[must_use]
    pub const fn with_elapsed(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    /// Number of cards in `data`, or 0 when there is none.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Returns true if this is an error envelope.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.router == RouterKind::Error
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("QueryResult", 5)?;
        state.serialize_field("response", &self.response)?;
        state.serialize_field("data", &self.data)?;
        state.serialize_field("router", self.router.as_str())?;
        state.serialize_field("result_count", &self.result_count())?;
        state.serialize_field("execution_time_ms", &self.execution_time_ms)?;
        state.end()
    }
}
