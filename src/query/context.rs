//! Catalog summary given to the language model.

use crate::Result;
use crate::models::Card;
use crate::storage::{CardFilter, StorageEngine};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Most records read to build a summary.
pub const SAMPLE_SIZE: usize = 200;
/// Most distinct types listed.
pub const MAX_TYPES: usize = 10;
/// Most example names listed.
pub const MAX_EXAMPLES: usize = 5;

/// A bounded summary of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    /// Total number of cards in the engine.
    pub total: usize,
    /// Number of cards actually sampled.
    pub sampled: usize,
    /// Rarity counts within the sample.
    pub by_rarity: BTreeMap<String, usize>,
    /// Distinct type lines within the sample.
    pub types: Vec<String>,
    /// Example cards as `name (type, rarity)`.
    pub examples: Vec<String>,
}

impl CatalogSummary {
    /// Reads a bounded sample from the engine and summarizes it.
    pub async fn build<E: StorageEngine + ?Sized>(engine: &E) -> Result<Self> {
        let total = engine.count().await?;
        let sample = engine.find(&CardFilter::All, Some(SAMPLE_SIZE)).await?;
        Ok(Self::from_sample(total, &sample))
    }

    /// Summarizes an already-read sample.
    #[must_use]
    pub fn from_sample(total: usize, sample: &[Card]) -> Self {
        let mut by_rarity = BTreeMap::new();
        let mut types: Vec<String> = Vec::new();

        for card in sample {
            let rarity = card.rarity.clone().unwrap_or_else(|| "Unknown".to_string());
            *by_rarity.entry(rarity).or_insert(0) += 1;

            if let Some(card_type) = &card.card_type {
                if types.len() < MAX_TYPES && !types.contains(card_type) {
                    types.push(card_type.clone());
                }
            }
        }

        let examples = sample
            .iter()
            .take(MAX_EXAMPLES)
            .map(|card| {
                format!(
                    "{} ({}, {})",
                    card.name,
                    card.card_type.as_deref().unwrap_or("?"),
                    card.rarity.as_deref().unwrap_or("?")
                )
            })
            .collect();

        Self {
            total,
            sampled: sample.len(),
            by_rarity,
            types,
            examples,
        }
    }

    /// Renders the summary as prompt context.
    #[must_use]
    pub fn render(&self) -> String {
        if self.total == 0 {
            return "The catalog is empty.".to_string();
        }

        let mut out = String::new();
        let _ = writeln!(out, "Total cards: {}", self.total);
        if !self.by_rarity.is_empty() {
            let _ = writeln!(out, "Rarities (sample of {}):", self.sampled);
            for (rarity, count) in &self.by_rarity {
                let _ = writeln!(out, "- {rarity}: {count}");
            }
        }
        if !self.types.is_empty() {
            let _ = writeln!(out, "Types: {}", self.types.join(", "));
        }
        if !self.examples.is_empty() {
            let _ = writeln!(out, "Example cards:");
            for example in &self.examples {
                let _ = writeln!(out, "- {example}");
            }
        }
        out.trim_end().to_string()
    }
}
