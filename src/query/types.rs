//! Router contract shared by the cascade.

use crate::Result;
use crate::models::{Card, RouterKind};
use async_trait::async_trait;

/// What a router produced for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The router handled the query.
    Matched(RouterResponse),
    /// The router does not handle this query. Not an error.
    NoMatch,
}

/// A router's answer before it is wrapped in the result envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterResponse {
    /// Response text.
    pub response: String,
    /// Matching cards, if any.
    pub data: Option<Vec<Card>>,
}

impl RouterResponse {
    /// A text-only response.
    #[must_use]
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            data: None,
        }
    }

    /// A response carrying cards.
    #[must_use]
    pub fn with_cards(response: impl Into<String>, cards: Vec<Card>) -> Self {
        Self {
            response: response.into(),
            data: Some(cards),
        }
    }
}

/// One stage of the query cascade.
#[async_trait]
pub trait QueryRouter: Send + Sync {
    /// The router kind reported in the result envelope.
    fn kind(&self) -> RouterKind;

    /// Attempts to handle the query.
    async fn route(&self, query: &str) -> Result<RouteOutcome>;
}
