//! CSV dataset parsing for bulk loads.
//!
//! Both engines parse through [`parse_cards_csv`]; the relational engine
//! never reads CSV on its own.

use crate::models::{Card, CardId};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Placeholder name given to rows with an empty or missing name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Outcome of parsing a CSV dataset.
#[derive(Debug, Clone, Default)]
pub struct ParsedCards {
    /// Cards parsed successfully, in file order.
    pub cards: Vec<Card>,
    /// Number of malformed rows that were skipped.
    pub skipped: usize,
}

/// Maps CSV column indices to card fields.
#[derive(Debug, Default)]
struct ColumnMap {
    id: Option<usize>,
    name: Option<usize>,
    mana_cost: Option<usize>,
    card_type: Option<usize>,
    rarity: Option<usize>,
    set_name: Option<usize>,
    text: Option<usize>,
    power: Option<usize>,
    toughness: Option<usize>,
    image_url: Option<usize>,
    multiverse_id: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let mut map = Self::default();

        for (i, header) in headers.iter().enumerate() {
            match header.to_lowercase().as_str() {
                "id" => map.id = Some(i),
                "name" => map.name = Some(i),
                "manacost" | "mana_cost" => map.mana_cost = Some(i),
                "type" | "card_type" => map.card_type = Some(i),
                "rarity" => map.rarity = Some(i),
                "setname" | "set_name" => map.set_name = Some(i),
                "text" => map.text = Some(i),
                "power" => map.power = Some(i),
                "toughness" => map.toughness = Some(i),
                "imageurl" | "image_url" => map.image_url = Some(i),
                "multiverseid" | "multiverse_id" => map.multiverse_id = Some(i),
                _ => {},
            }
        }

        if map.name.is_none() {
            return Err(Error::InvalidInput(
                "CSV must have a 'name' column".to_string(),
            ));
        }

        Ok(map)
    }

    fn parse_record(&self, record: &csv::StringRecord) -> Card {
        let get_field = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let mut card = Card::new(
            get_field(self.name).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        );
        card.mana_cost = get_field(self.mana_cost);
        card.card_type = get_field(self.card_type);
        card.rarity = get_field(self.rarity);
        card.set_name = get_field(self.set_name);
        card.text = get_field(self.text);
        card.power = get_field(self.power);
        card.toughness = get_field(self.toughness);
        card.image_url = get_field(self.image_url);
        card.multiverse_id = get_field(self.multiverse_id);

        card.id = get_field(self.id).map_or_else(
            || {
                CardId::derive(&[
                    card.name.as_str(),
                    card.set_name.as_deref().unwrap_or_default(),
                    card.multiverse_id.as_deref().unwrap_or_default(),
                    card.card_type.as_deref().unwrap_or_default(),
                    card.mana_cost.as_deref().unwrap_or_default(),
                ])
            },
            CardId::new,
        );
        card
    }
}

/// Parses a card dataset from a CSV file.
///
/// The first row is the header. Rows that cannot be decoded, or that carry
/// more fields than the header, are skipped with a warning and counted in
/// [`ParsedCards::skipped`]. Rows without an id get a stable derived id.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the file does not exist or has no
/// `name` column.
pub fn parse_cards_csv(path: &Path) -> Result<ParsedCards> {
    if !path.exists() {
        return Err(Error::InvalidInput(format!(
            "dataset file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path).map_err(|e| Error::OperationFailed {
        operation: "open_dataset".to_string(),
        cause: e.to_string(),
    })?;

    parse_cards_reader(BufReader::new(file))
}

/// Parses a card dataset from any reader.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if there is no `name` column.
pub fn parse_cards_reader<R: Read>(reader: R) -> Result<ParsedCards> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| Error::InvalidInput(format!("unreadable CSV header: {e}")))?
        .clone();
    let column_map = ColumnMap::from_headers(&headers)?;

    let mut parsed = ParsedCards::default();
    let mut record = csv::StringRecord::new();
    let mut line = 1_u64;

    loop {
        line += 1;
        match csv_reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) if record.len() > headers.len() => {
                tracing::warn!(
                    line,
                    fields = record.len(),
                    expected = headers.len(),
                    "Skipping CSV row with too many fields"
                );
                parsed.skipped += 1;
            },
            Ok(true) => parsed.cards.push(column_map.parse_record(&record)),
            Err(e) => {
                tracing::warn!(line, error = %e, "Skipping malformed CSV row");
                parsed.skipped += 1;
            },
        }
    }

    if parsed.skipped > 0 {
        metrics::counter!("bulk_load_rows_skipped_total").increment(parsed.skipped as u64);
    }

    Ok(parsed)
}
