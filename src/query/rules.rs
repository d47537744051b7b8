//! Deterministic rule router.

use super::patterns::{self, RuleMatch};
use super::types::{QueryRouter, RouteOutcome, RouterResponse};
use crate::Result;
use crate::models::{Card, RouterKind};
use crate::storage::{CardFilter, PersistenceSwitch, StorageEngine};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Default cap on records returned by a non-count rule.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Answers queries that match a fixed keyword rule.
///
/// Rules are tried in priority order (count, find, colour, rarity, category,
/// set) and the first match wins. Filtering runs inside the active engine.
pub struct RuleRouter {
    switch: Arc<PersistenceSwitch>,
    max_results: usize,
}

impl RuleRouter {
    /// Creates a rule router over the switch's active engine.
    #[must_use]
    pub const fn new(switch: Arc<PersistenceSwitch>) -> Self {
        Self {
            switch,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the cap on records returned by a non-count rule.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// One human-readable description per rule family.
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        patterns::descriptions()
    }

    async fn execute(&self, rule: RuleMatch) -> Result<RouterResponse> {
        let engine = self.switch.current();

        let (filter, subject) = match rule {
            RuleMatch::Count => {
                let total = engine.count().await?;
                let text = if total == 1 {
                    "There is 1 card in the catalog.".to_string()
                } else {
                    format!("There are {total} cards in the catalog.")
                };
                return Ok(RouterResponse::text(text));
            },
            RuleMatch::Find(term) => {
                let subject = format!("matching '{term}'");
                (CardFilter::NameContains(term), subject)
            },
            RuleMatch::Colour { name, symbol } => (
                CardFilter::ManaSymbol(symbol.to_string()),
                format!("with {name} mana"),
            ),
            RuleMatch::Rarity(rarity) => {
                (CardFilter::Rarity(rarity.to_string()), format!("of rarity {rarity}"))
            },
            RuleMatch::Category(category) => (
                CardFilter::TypeContains(category.to_string()),
                format!("of type {category}"),
            ),
            RuleMatch::Set(set) => {
                let subject = format!("from set '{set}'");
                (CardFilter::SetContains(set), subject)
            },
        };

        let cards = engine.find(&filter, Some(self.max_results)).await?;
        Ok(RouterResponse::with_cards(summarize(&cards, &subject), cards))
    }
}

fn summarize(cards: &[Card], subject: &str) -> String {
    if cards.is_empty() {
        return format!("No cards found {subject}.");
    }
    let names: Vec<&str> = cards.iter().map(|c| c.name.as_str()).collect();
    let noun = if cards.len() == 1 { "card" } else { "cards" };
    format!(
        "Found {} {noun} {subject}: {}",
        cards.len(),
        names.join(", ")
    )
}

#[async_trait]
impl QueryRouter for RuleRouter {
    fn kind(&self) -> RouterKind {
        RouterKind::Rule
    }

    #[instrument(skip(self), fields(operation = "route", router = "rule"))]
    async fn route(&self, query: &str) -> Result<RouteOutcome> {
        let Some(rule) = patterns::match_rule(query) else {
            return Ok(RouteOutcome::NoMatch);
        };
        tracing::debug!(rule = ?rule, "Rule matched");
        self.execute(rule).await.map(RouteOutcome::Matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryEngine;

    async fn router_with(cards: Vec<Card>) -> RuleRouter {
        let memory = Arc::new(InMemoryEngine::new());
        for card in cards {
            memory.add(card).await.unwrap();
        }
        RuleRouter::new(Arc::new(PersistenceSwitch::memory_only(memory)))
    }

    fn matched(outcome: RouteOutcome) -> RouterResponse {
        match outcome {
            RouteOutcome::Matched(response) => response,
            RouteOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn test_count() {
        let router = router_with(vec![Card::new("Black Lotus").with_rarity("Rare")]).await;
        let response = matched(router.route("how many cards are there").await.unwrap());
        assert_eq!(response.response, "There is 1 card in the catalog.");
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_find() {
        let router = router_with(vec![Card::new("Black Lotus"), Card::new("Mox Pearl")]).await;
        let response = matched(router.route("find Black Lotus").await.unwrap());
        let data = response.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "Black Lotus");
        assert!(response.response.starts_with("Found 1 card matching"));
    }

    #[tokio::test]
    async fn test_colour_uses_mana_symbol() {
        let router = router_with(vec![
            Card::new("Counterspell").with_mana_cost("{U}{U}"),
            Card::new("Shock").with_mana_cost("{R}"),
        ])
        .await;
        let data = matched(router.route("blue cards").await.unwrap()).data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].name, "Counterspell");
    }

    #[tokio::test]
    async fn test_results_are_capped() {
        let cards = (0..25)
            .map(|i| Card::new(format!("Goblin {i:02}")).with_type("Creature - Goblin"))
            .collect();
        let router = router_with(cards).await.with_max_results(10);
        let data = matched(router.route("creatures").await.unwrap()).data.unwrap();
        assert_eq!(data.len(), 10);
    }

    #[tokio::test]
    async fn test_empty_result_is_still_a_match() {
        let router = router_with(Vec::new()).await;
        let response = matched(router.route("mythic rare cards").await.unwrap());
        assert_eq!(response.response, "No cards found of rarity Mythic Rare.");
        assert_eq!(response.data, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_no_match() {
        let router = router_with(Vec::new()).await;
        assert_eq!(
            router.route("xyzzy nonsense query with no keywords").await.unwrap(),
            RouteOutcome::NoMatch
        );
    }
}
