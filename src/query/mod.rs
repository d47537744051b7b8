//! Natural-language query handling.
//!
//! Queries run through a cascade of routers:
//! 1. [`RuleRouter`]: deterministic keyword rules over the active engine
//! 2. [`LanguageModelRouter`]: a completion client with tool calls
//!
//! [`QueryOrchestrator`] owns the cascade and normalizes every outcome into
//! a [`crate::models::QueryResult`].

mod context;
mod llm;
mod orchestrator;
mod patterns;
mod prompts;
mod rules;
mod tool_call;
mod types;

pub use context::CatalogSummary;
pub use llm::{LanguageModelRouter, MAX_RENDERED, guidance_message, not_configured_message, render_cards};
pub use orchestrator::QueryOrchestrator;
pub use patterns::{RuleFamily, RuleMatch, descriptions, match_rule};
pub use rules::{DEFAULT_MAX_RESULTS, RuleRouter};
pub use tool_call::{GET_STATISTICS, SEARCH_CARDS, ToolInvocation, search_names};
pub use types::{QueryRouter, RouteOutcome, RouterResponse};
