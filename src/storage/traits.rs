//! Storage engine contract.

use super::PersistenceMode;
use crate::Result;
use crate::models::{Card, CardId};
use async_trait::async_trait;
use std::path::Path;

/// A predicate over cards that every engine can evaluate natively.
///
/// String comparisons are case-insensitive with Unicode lowercasing, except
/// [`CardFilter::ManaSymbol`], which matches mana symbols such as `{U}` literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFilter {
    /// Every card.
    All,
    /// Name contains the term.
    NameContains(String),
    /// Name contains any of the terms. An empty list matches nothing.
    NameContainsAny(Vec<String>),
    /// Mana cost contains the symbol.
    ManaSymbol(String),
    /// Rarity equals the value.
    Rarity(String),
    /// Type line contains the term.
    TypeContains(String),
    /// Set name contains the term.
    SetContains(String),
}

impl CardFilter {
    /// Evaluates the filter against a card.
    #[must_use]
    pub fn matches(&self, card: &Card) -> bool {
        match self {
            Self::All => true,
            Self::NameContains(term) => contains_ci(Some(&card.name), term),
            Self::NameContainsAny(terms) => terms.iter().any(|t| contains_ci(Some(&card.name), t)),
            Self::ManaSymbol(symbol) => card
                .mana_cost
                .as_deref()
                .is_some_and(|cost| cost.contains(symbol.as_str())),
            Self::Rarity(rarity) => card
                .rarity
                .as_deref()
                .is_some_and(|r| r.to_lowercase() == rarity.to_lowercase()),
            Self::TypeContains(term) => contains_ci(card.card_type.as_deref(), term),
            Self::SetContains(term) => contains_ci(card.set_name.as_deref(), term),
        }
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

/// Sorts cards by name, breaking ties by id so ordering is deterministic.
pub fn sort_by_name(cards: &mut [Card]) {
    cards.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

/// The contract both storage engines satisfy.
///
/// Engines never retry and never fall back to one another. Failures are
/// classified as `InvalidInput`, `NotFound`, `StorageUnavailable` or
/// `OperationFailed`.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Returns every card, sorted by name.
    async fn get_all(&self) -> Result<Vec<Card>>;

    /// Retrieves a card by id.
    async fn get_by_id(&self, id: &CardId) -> Result<Option<Card>>;

    /// Inserts a card, assigning an id when it has none.
    ///
    /// Rejects an empty name and an id that is already stored.
    async fn add(&self, card: Card) -> Result<Card>;

    /// Replaces an existing card. The creation timestamp is kept.
    async fn update(&self, card: Card) -> Result<Card>;

    /// Physically removes a card.
    async fn delete(&self, id: &CardId) -> Result<()>;

    /// Removes every card.
    async fn clear(&self) -> Result<()>;

    /// Upserts every card parsed from a CSV file and returns the number loaded.
    async fn bulk_load(&self, path: &Path) -> Result<usize>;

    /// Returns the number of stored cards.
    async fn count(&self) -> Result<usize>;

    /// Returns cards matching the filter, sorted by name, up to `limit`.
    async fn find(&self, filter: &CardFilter, limit: Option<usize>) -> Result<Vec<Card>>;

    /// Returns cards whose name contains any of the terms.
    async fn search_by_names(&self, terms: &[String]) -> Result<Vec<Card>> {
        self.find(&CardFilter::NameContainsAny(terms.to_vec()), None)
            .await
    }

    /// Returns the identifier of this engine.
    fn mode(&self) -> PersistenceMode;
}
