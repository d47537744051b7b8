//! In-process storage engine.
//!
//! Cards live in a [`DashMap`] keyed by id, so concurrent reads and writes
//! need no external locking. Contents are lost when the process exits.

use super::dataset::parse_cards_csv;
use super::metrics::observe;
use super::traits::{CardFilter, StorageEngine, sort_by_name};
use super::PersistenceMode;
use crate::models::{Card, CardId};
use crate::{Error, Result, current_timestamp};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "memory";

/// Storage engine backed by a concurrent in-process map.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    cards: DashMap<String, Card>,
}

impl InMemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts already-parsed cards. Existing ids keep their creation time.
    pub fn upsert_all(&self, cards: Vec<Card>) -> usize {
        let now = current_timestamp();
        let mut loaded = 0;
        for mut card in cards {
            match self.cards.entry(card.id.as_str().to_string()) {
                Entry::Occupied(mut existing) => {
                    card.created_at = existing.get().created_at;
                    card.updated_at = Some(now);
                    existing.insert(card);
                },
                Entry::Vacant(slot) => {
                    card.created_at = now;
                    card.updated_at = None;
                    slot.insert(card);
                },
            }
            loaded += 1;
        }
        loaded
    }

    fn collect(&self, filter: &CardFilter, limit: Option<usize>) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_name(&mut cards);
        if let Some(limit) = limit {
            cards.truncate(limit);
        }
        cards
    }
}

#[async_trait]
impl StorageEngine for InMemoryEngine {
    #[instrument(skip(self), fields(operation = "get_all", backend = BACKEND))]
    async fn get_all(&self) -> Result<Vec<Card>> {
        let start = Instant::now();
        observe(BACKEND, "get_all", start, Ok(self.collect(&CardFilter::All, None)))
    }

    #[instrument(skip(self), fields(operation = "get_by_id", backend = BACKEND, card.id = %id))]
    async fn get_by_id(&self, id: &CardId) -> Result<Option<Card>> {
        let start = Instant::now();
        let card = self.cards.get(id.as_str()).map(|entry| entry.value().clone());
        observe(BACKEND, "get_by_id", start, Ok(card))
    }

    #[instrument(skip(self, card), fields(operation = "add", backend = BACKEND, card.id = %card.id))]
    async fn add(&self, mut card: Card) -> Result<Card> {
        let start = Instant::now();
        let result = card.validate().and_then(|()| {
            if card.id.is_blank() {
                card.id = CardId::generate();
            }
            card.created_at = current_timestamp();
            card.updated_at = None;

            match self.cards.entry(card.id.as_str().to_string()) {
                Entry::Occupied(_) => Err(Error::InvalidInput(format!(
                    "card '{}' already exists",
                    card.id
                ))),
                Entry::Vacant(slot) => {
                    slot.insert(card.clone());
                    Ok(card)
                },
            }
        });
        observe(BACKEND, "add", start, result)
    }

    #[instrument(skip(self, card), fields(operation = "update", backend = BACKEND, card.id = %card.id))]
    async fn update(&self, mut card: Card) -> Result<Card> {
        let start = Instant::now();
        let result = card.validate().and_then(|()| {
            let mut existing = self
                .cards
                .get_mut(card.id.as_str())
                .ok_or_else(|| Error::card_not_found(card.id.as_str()))?;
            card.created_at = existing.created_at;
            card.updated_at = Some(current_timestamp());
            *existing = card.clone();
            Ok(card)
        });
        observe(BACKEND, "update", start, result)
    }

    #[instrument(skip(self), fields(operation = "delete", backend = BACKEND, card.id = %id))]
    async fn delete(&self, id: &CardId) -> Result<()> {
        let start = Instant::now();
        let result = self
            .cards
            .remove(id.as_str())
            .map(|_| ())
            .ok_or_else(|| Error::card_not_found(id.as_str()));
        observe(BACKEND, "delete", start, result)
    }

    #[instrument(skip(self), fields(operation = "clear", backend = BACKEND))]
    async fn clear(&self) -> Result<()> {
        let start = Instant::now();
        self.cards.clear();
        tracing::info!("Cleared in-memory catalog");
        observe(BACKEND, "clear", start, Ok(()))
    }

    #[instrument(skip(self), fields(operation = "bulk_load", backend = BACKEND, path = %path.display()))]
    async fn bulk_load(&self, path: &Path) -> Result<usize> {
        let start = Instant::now();
        let owned: PathBuf = path.to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || parse_cards_csv(&owned))
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "bulk_load".to_string(),
                cause: e.to_string(),
            })
            .and_then(|parsed| parsed);

        let result = parsed.map(|parsed| {
            let skipped = parsed.skipped;
            let loaded = self.upsert_all(parsed.cards);
            tracing::info!(loaded, skipped, "Loaded dataset into memory");
            loaded
        });
        observe(BACKEND, "bulk_load", start, result)
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    async fn count(&self) -> Result<usize> {
        let start = Instant::now();
        observe(BACKEND, "count", start, Ok(self.cards.len()))
    }

    #[instrument(skip(self), fields(operation = "find", backend = BACKEND))]
    async fn find(&self, filter: &CardFilter, limit: Option<usize>) -> Result<Vec<Card>> {
        let start = Instant::now();
        observe(BACKEND, "find", start, Ok(self.collect(filter, limit)))
    }

    fn mode(&self) -> PersistenceMode {
        PersistenceMode::Memory
    }
}
