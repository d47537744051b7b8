//! Language model fallback router.

use super::context::CatalogSummary;
use super::prompts;
use super::tool_call::{GET_STATISTICS, SEARCH_CARDS, ToolInvocation, search_names};
use super::types::{QueryRouter, RouteOutcome, RouterResponse};
use crate::Result;
use crate::llm::CompletionClient;
use crate::models::{Card, RouterKind};
use crate::storage::{Engine, PersistenceSwitch, StorageEngine};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::instrument;

/// Most cards rendered into a response.
pub const MAX_RENDERED: usize = 10;

const GUIDANCE: &str = "Try a specific command like 'count cards', 'find <name>', 'blue cards' or 'rare cards'.";

/// Response when the language model call fails.
#[must_use]
pub fn guidance_message() -> String {
    format!("The language model could not answer this query. {GUIDANCE}")
}

/// Response when no language model is configured.
#[must_use]
pub fn not_configured_message() -> String {
    format!("Language model not configured. {GUIDANCE}")
}

/// Handles every query the rule router declined.
///
/// Never returns an error: failures of the completion call or of a tool's
/// storage access degrade to a guidance message.
pub struct LanguageModelRouter {
    switch: Arc<PersistenceSwitch>,
    client: Option<Arc<dyn CompletionClient>>,
}

impl LanguageModelRouter {
    /// Creates a router. Without a client every query gets the
    /// not-configured message.
    #[must_use]
    pub fn new(switch: Arc<PersistenceSwitch>, client: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { switch, client }
    }

    /// Returns true if a completion client is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    async fn answer(&self, client: &dyn CompletionClient, query: &str) -> Result<RouterResponse> {
        let engine = self.switch.current();
        let summary = CatalogSummary::build(&engine).await?;

        let system = prompts::tool_system_prompt(&summary.render());
        let completion = client.complete(&system, query).await?;

        match ToolInvocation::parse(&completion) {
            ToolInvocation::NoToolCall => Ok(RouterResponse::text(completion.trim())),
            ToolInvocation::ToolCall { name, arguments } => {
                tracing::debug!(tool = %name, "Executing tool call");
                metrics::counter!("llm_tool_calls_total", "tool" => name.clone()).increment(1);
                match name.as_str() {
                    SEARCH_CARDS => {
                        self.search_cards(client, &engine, query, &arguments)
                            .await
                    },
                    GET_STATISTICS => Ok(RouterResponse::text(summary.render())),
                    _ => Ok(RouterResponse::text(completion.trim())),
                }
            },
        }
    }

    async fn search_cards(
        &self,
        client: &dyn CompletionClient,
        engine: &Engine,
        query: &str,
        arguments: &Value,
    ) -> Result<RouterResponse> {
        let names = search_names(arguments);
        let cards = if names.is_empty() {
            Vec::new()
        } else {
            engine.search_by_names(&names).await?
        };

        if cards.is_empty() {
            let answer = client
                .complete(
                    prompts::FOLLOW_UP_SYSTEM_PROMPT,
                    &prompts::general_knowledge_prompt(query),
                )
                .await?;
            return Ok(RouterResponse::with_cards(answer.trim(), cards));
        }

        let intro = client
            .complete(
                prompts::FOLLOW_UP_SYSTEM_PROMPT,
                &prompts::intro_prompt(query, cards.len(), &cards[0].name),
            )
            .await?;
        let response = format!("{}\n{}", intro.trim(), render_cards(&cards));
        Ok(RouterResponse::with_cards(response, cards))
    }
}

/// Renders found cards as markdown, at most [`MAX_RENDERED`] of them.
#[must_use]
pub fn render_cards(cards: &[Card]) -> String {
    let mut out = String::from("\n---\n### Results in the catalog:\n\n");
    for card in cards.iter().take(MAX_RENDERED) {
        let _ = writeln!(out, "#### {}", card.name);
        match card.image_url.as_deref().filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let _ = writeln!(out, "![{}]({url})", card.name);
            },
            None => out.push_str("*(image not available)*\n"),
        }
        let _ = writeln!(out, "- **Type:** {}", card.card_type.as_deref().unwrap_or(""));
        let _ = writeln!(out, "- **Cost:** {}", card.mana_cost.as_deref().unwrap_or(""));
        let _ = writeln!(out, "- **Text:** {}", card.text.as_deref().unwrap_or(""));
        out.push_str("---\n");
    }
    if cards.len() > MAX_RENDERED {
        let _ = writeln!(out, "\n*(... and {} more)*", cards.len() - MAX_RENDERED);
    }
    out
}

#[async_trait]
impl QueryRouter for LanguageModelRouter {
    fn kind(&self) -> RouterKind {
        RouterKind::LanguageModel
    }

    #[instrument(skip(self), fields(operation = "route", router = "language_model"))]
    async fn route(&self, query: &str) -> Result<RouteOutcome> {
        let Some(client) = &self.client else {
            return Ok(RouteOutcome::Matched(RouterResponse::text(
                not_configured_message(),
            )));
        };

        let response = match self.answer(client.as_ref(), query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, provider = client.name(), "Language model fallback failed");
                RouterResponse::text(guidance_message())
            },
        };
        Ok(RouteOutcome::Matched(response))
    }
}
