//! Card types and identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// Creates a card ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Derives a stable ID from the identifying fields of an imported row.
    ///
    /// Rows without an explicit id get the same id on every import, which
    /// keeps repeated imports of one source from duplicating cards.
    #[must_use]
    pub fn derive(parts: &[&str]) -> Self {
        let key = parts.join("\u{1f}");
        Self(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, key.as_bytes()).to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the ID is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Rarity vocabulary recognized by the rule router.
pub const RARITIES: [&str; 4] = ["Common", "Uncommon", "Rare", "Mythic Rare"];

/// Maximum name length.
pub const MAX_NAME_LEN: usize = 200;

/// Per-field length limits, applied by [`Card::validate`].
const FIELD_LIMITS: [(&str, usize); 9] = [
    ("mana_cost", 50),
    ("type", 200),
    ("rarity", 50),
    ("set_name", 200),
    ("text", 1000),
    ("power", 10),
    ("toughness", 10),
    ("image_url", 500),
    ("multiverse_id", 50),
];

/// A catalog card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique identifier. Blank until the storage engine assigns one.
    #[serde(default = "blank_id")]
    pub id: CardId,
    /// Card name (required, non-empty).
    pub name: String,
    /// Mana cost, e.g. `{3}{U}{U}`.
    #[serde(default)]
    pub mana_cost: Option<String>,
    /// Type line, e.g. `Creature - Human Wizard`.
    #[serde(default, rename = "type")]
    pub card_type: Option<String>,
    /// Rarity (Common, Uncommon, Rare, Mythic Rare).
    #[serde(default)]
    pub rarity: Option<String>,
    /// Set or expansion name.
    #[serde(default)]
    pub set_name: Option<String>,
    /// Rules text.
    #[serde(default)]
    pub text: Option<String>,
    /// Power (creatures only).
    #[serde(default)]
    pub power: Option<String>,
    /// Toughness (creatures only).
    #[serde(default)]
    pub toughness: Option<String>,
    /// Image reference.
    #[serde(default)]
    pub image_url: Option<String>,
    /// External catalog id.
    #[serde(default)]
    pub multiverse_id: Option<String>,
    /// Creation timestamp (Unix epoch seconds).
    #[serde(default)]
    pub created_at: u64,
    /// Last update timestamp (Unix epoch seconds).
    #[serde(default)]
    pub updated_at: Option<u64>,
}

fn blank_id() -> CardId {
    CardId::new("")
}

impl Card {
    /// Creates a card with only a name set.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: blank_id(),
            name: name.into(),
            mana_cost: None,
            card_type: None,
            rarity: None,
            set_name: None,
            text: None,
            power: None,
            toughness: None,
            image_url: None,
            multiverse_id: None,
            created_at: 0,
            updated_at: None,
        }
    }

    /// Sets the id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<CardId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: impl Into<String>) -> Self {
        self.mana_cost = Some(cost.into());
        self
    }

    /// Sets the type line.
    #[must_use]
    pub fn with_type(mut self, card_type: impl Into<String>) -> Self {
        self.card_type = Some(card_type.into());
        self
    }

    /// Sets the rarity.
    #[must_use]
    pub fn with_rarity(mut self, rarity: impl Into<String>) -> Self {
        self.rarity = Some(rarity.into());
        self
    }

    /// Sets the set name.
    #[must_use]
    pub fn with_set_name(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = Some(set_name.into());
        self
    }

    /// Sets the rules text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets power and toughness.
    #[must_use]
    pub fn with_stats(mut self, power: impl Into<String>, toughness: impl Into<String>) -> Self {
        self.power = Some(power.into());
        self.toughness = Some(toughness.into());
        self
    }

    /// Sets the image reference.
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Validates a card for interactive create or update.
    ///
    /// Bulk import does not call this; it coerces instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is empty or a field is too long.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("card name is required".to_string()));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(Error::InvalidInput(format!(
                "card name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        for ((field, limit), value) in FIELD_LIMITS.iter().zip(self.optional_fields()) {
            if let Some(value) = value {
                if value.chars().count() > *limit {
                    return Err(Error::InvalidInput(format!(
                        "{field} cannot exceed {limit} characters"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Optional fields in the same order as `FIELD_LIMITS`.
    fn optional_fields(&self) -> [Option<&str>; 9] {
        [
            self.mana_cost.as_deref(),
            self.card_type.as_deref(),
            self.rarity.as_deref(),
            self.set_name.as_deref(),
            self.text.as_deref(),
            self.power.as_deref(),
            self.toughness.as_deref(),
            self.image_url.as_deref(),
            self.multiverse_id.as_deref(),
        ]
    }

    /// Returns true if the type line names a creature.
    #[must_use]
    pub fn is_creature(&self) -> bool {
        self.card_type
            .as_deref()
            .is_some_and(|t| t.to_lowercase().contains("creature"))
    }

    /// Returns the colour names encoded in the mana cost.
    #[must_use]
    pub fn colors(&self) -> String {
        let Some(cost) = self.mana_cost.as_deref().filter(|c| !c.is_empty()) else {
            return "Colorless".to_string();
        };

        let colors: Vec<&str> = [
            ("{W}", "White"),
            ("{U}", "Blue"),
            ("{B}", "Black"),
            ("{R}", "Red"),
            ("{G}", "Green"),
        ]
        .iter()
        .filter(|(symbol, _)| cost.contains(symbol))
        .map(|(_, name)| *name)
        .collect();

        if colors.is_empty() {
            "Colorless".to_string()
        } else {
            colors.join(", ")
        }
    }
}
