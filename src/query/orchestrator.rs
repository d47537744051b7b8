//! Query cascade.

use super::llm::LanguageModelRouter;
use super::patterns;
use super::rules::RuleRouter;
use super::types::{QueryRouter, RouteOutcome};
use crate::config::{CardvaultConfig, QueryConfig};
use crate::llm::{CompletionClient, client_from_config};
use crate::models::QueryResult;
use crate::storage::PersistenceSwitch;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Routes a natural-language query through an ordered list of routers.
///
/// The first router that matches produces the result. Every outcome,
/// including failures, is normalized into a [`QueryResult`].
pub struct QueryOrchestrator {
    routers: Vec<Box<dyn QueryRouter>>,
    config: QueryConfig,
}

impl QueryOrchestrator {
    /// Creates an orchestrator over a custom router list.
    #[must_use]
    pub fn new(routers: Vec<Box<dyn QueryRouter>>, config: QueryConfig) -> Self {
        Self { routers, config }
    }

    /// Rule router then language model router, with default limits.
    #[must_use]
    pub fn with_defaults(
        switch: Arc<PersistenceSwitch>,
        client: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        Self::with_config(switch, client, QueryConfig::default())
    }

    /// Rule router then language model router.
    #[must_use]
    pub fn with_config(
        switch: Arc<PersistenceSwitch>,
        client: Option<Arc<dyn CompletionClient>>,
        config: QueryConfig,
    ) -> Self {
        let rules = RuleRouter::new(Arc::clone(&switch)).with_max_results(config.max_rule_results);
        let fallback = LanguageModelRouter::new(switch, client);
        Self::new(vec![Box::new(rules), Box::new(fallback)], config)
    }

    /// Builds the default cascade from loaded configuration.
    #[must_use]
    pub fn from_config(switch: Arc<PersistenceSwitch>, config: &CardvaultConfig) -> Self {
        let client = client_from_config(&config.llm);
        if client.is_none() {
            tracing::info!("No language model configured, fallback will return guidance");
        }
        Self::with_config(switch, client, config.query)
    }

    /// Descriptions of the deterministic rules, in priority order.
    #[must_use]
    pub fn available_rules(&self) -> Vec<String> {
        patterns::descriptions()
    }

    /// Processes a query and returns the result envelope.
    ///
    /// Never fails: rejected input and router errors become an error
    /// envelope carrying the error message.
    #[instrument(skip(self), fields(operation = "process_query"))]
    pub async fn process_query(&self, query: &str) -> QueryResult {
        let start = Instant::now();

        let result = match self.cascade(query).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "Query failed");
                QueryResult::error(e.to_string())
            },
        };

        let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        metrics::counter!("query_routed_total", "router" => result.router.as_str()).increment(1);
        metrics::histogram!("query_duration_ms", "router" => result.router.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            router = %result.router,
            result_count = result.result_count(),
            elapsed_ms = elapsed,
            "Query processed"
        );

        result.with_elapsed(elapsed)
    }

    async fn cascade(&self, query: &str) -> Result<QueryResult> {
        self.validate(query)?;
        let query = query.trim();

        for router in &self.routers {
            if let RouteOutcome::Matched(response) = router.route(query).await? {
                let kind = router.kind();
                return Ok(match response.data {
                    Some(cards) => QueryResult::with_cards(kind, response.response, cards),
                    None => QueryResult::text(kind, response.response),
                });
            }
        }

        Err(Error::OperationFailed {
            operation: "process_query".to_string(),
            cause: "no router handled the query".to_string(),
        })
    }

    fn validate(&self, query: &str) -> Result<()> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        let length = query.chars().count();
        if length > self.config.max_query_length {
            return Err(Error::InvalidInput(format!(
                "query is {length} characters, the limit is {}",
                self.config.max_query_length
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouterKind;
    use crate::storage::InMemoryEngine;
    use async_trait::async_trait;

    struct NeverMatches;

    #[async_trait]
    impl QueryRouter for NeverMatches {
        fn kind(&self) -> RouterKind {
            RouterKind::Rule
        }

        async fn route(&self, _query: &str) -> Result<RouteOutcome> {
            Ok(RouteOutcome::NoMatch)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl QueryRouter for AlwaysFails {
        fn kind(&self) -> RouterKind {
            RouterKind::Rule
        }

        async fn route(&self, _query: &str) -> Result<RouteOutcome> {
            Err(Error::OperationFailed {
                operation: "count".to_string(),
                cause: "disk I/O error".to_string(),
            })
        }
    }

    fn orchestrator() -> QueryOrchestrator {
        let switch = Arc::new(PersistenceSwitch::memory_only(Arc::new(InMemoryEngine::new())));
        QueryOrchestrator::with_defaults(switch, None)
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let result = orchestrator().process_query("   ").await;
        assert!(result.is_error());
        assert!(result.response.contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_oversized_query_rejected() {
        let query = "a".repeat(501);
        let result = orchestrator().process_query(&query).await;
        assert!(result.is_error());
        assert!(result.response.contains("limit is 500"));

        let at_limit = "a".repeat(500);
        assert!(!orchestrator().process_query(&at_limit).await.is_error());
    }

    #[tokio::test]
    async fn test_no_router_handled() {
        let orchestrator =
            QueryOrchestrator::new(vec![Box::new(NeverMatches)], QueryConfig::default());
        let result = orchestrator.process_query("count cards").await;
        assert!(result.is_error());
        assert!(result.response.contains("no router handled the query"));
    }

    #[tokio::test]
    async fn test_router_error_becomes_envelope() {
        let orchestrator = QueryOrchestrator::new(
            vec![Box::new(AlwaysFails), Box::new(NeverMatches)],
            QueryConfig::default(),
        );
        let result = orchestrator.process_query("count cards").await;
        assert_eq!(result.router, RouterKind::Error);
        assert!(result.response.contains("disk I/O error"));
        assert_eq!(result.result_count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_without_client() {
        let result = orchestrator().process_query("what is the best deck?").await;
        assert_eq!(result.router, RouterKind::LanguageModel);
        assert!(result.response.starts_with("Language model not configured"));
    }

    #[test]
    fn test_available_rules() {
        assert_eq!(orchestrator().available_rules().len(), 6);
    }
}
