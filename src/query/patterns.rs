//! Rule patterns for the deterministic router.
//!
//! Patterns are evaluated in declaration order and the first match wins.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A rule family, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleFamily {
    /// Total card count.
    Count,
    /// Name search.
    Find,
    /// Mana colour.
    Colour,
    /// Rarity.
    Rarity,
    /// Card type.
    Category,
    /// Set name.
    Set,
}

/// A compiled rule pattern.
#[derive(Debug)]
pub struct RulePattern {
    /// The regex to match against the raw query.
    pub pattern: Regex,
    /// Which family this pattern belongs to.
    pub family: RuleFamily,
    /// Human-readable description of the rule.
    pub description: &'static str,
}

/// Static rule patterns in priority order.
pub static RULE_PATTERNS: LazyLock<Vec<RulePattern>> = LazyLock::new(|| {
    vec![
        RulePattern {
            pattern: Regex::new(r"(?i)\b(how\s+many|count|total|number\s+of)\b")
                .expect("static regex: count"),
            family: RuleFamily::Count,
            description: "count: 'how many cards', 'count cards', 'total', 'number of cards'",
        },
        RulePattern {
            pattern: Regex::new(
                r"(?i)\b(?:find|search(?:\s+for)?|show(?:\s+me)?|look\s*up)\s+(?P<term>\S.*)$",
            )
            .expect("static regex: find"),
            family: RuleFamily::Find,
            description: "find: 'find <name>', 'search <name>', 'show <name>', 'look up <name>'",
        },
        RulePattern {
            pattern: Regex::new(r"(?i)\b(?P<colour>white|blue|black|red|green)\b(?:\s+cards?\b)?")
                .expect("static regex: colour"),
            family: RuleFamily::Colour,
            description: "colour: 'white', 'blue', 'black', 'red' or 'green' cards",
        },
        RulePattern {
            pattern: Regex::new(r"(?i)\b(?P<rarity>mythic\s+rare|mythic|rare|uncommon|common)\b")
                .expect("static regex: rarity"),
            family: RuleFamily::Rarity,
            description: "rarity: 'common', 'uncommon', 'rare' or 'mythic rare' cards",
        },
        RulePattern {
            pattern: Regex::new(
                r"(?i)\b(?P<category>creatures?|instants?|sorcery|sorceries|lands?|artifacts?|enchantments?|planeswalkers?)\b",
            )
            .expect("static regex: category"),
            family: RuleFamily::Category,
            description: "category: creatures, instants, sorceries, lands, artifacts, enchantments, planeswalkers",
        },
        RulePattern {
            pattern: Regex::new(r"(?i)\b(?:(?:from|in)\s+)?set\s+(?P<set>\S.*?)\s*$")
                .expect("static regex: set"),
            family: RuleFamily::Set,
            description: "set: 'from set <name>', 'in set <name>', 'set <name>'",
        },
    ]
});

/// A find term that is only a keyword of a later family, optionally wrapped
/// in filler words, e.g. "rare cards" or "all creatures".
static BARE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:all|the|any|some)\s+)*(?:white|blue|black|red|green|mythic\s+rare|mythic|rare|uncommon|common|creatures?|instants?|sorcery|sorceries|lands?|artifacts?|enchantments?|planeswalkers?)(?:\s+cards?)?$",
    )
    .expect("static regex: bare keyword")
});

/// A matched rule with its extracted argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatch {
    /// Count all cards.
    Count,
    /// Name contains the term.
    Find(String),
    /// Colour name and its mana symbol.
    Colour {
        /// Capitalized colour name.
        name: &'static str,
        /// Mana symbol such as `{U}`.
        symbol: &'static str,
    },
    /// Canonical rarity.
    Rarity(&'static str),
    /// Singular type keyword.
    Category(&'static str),
    /// Set name fragment.
    Set(String),
}

/// Finds the first rule matching the query.
#[must_use]
pub fn match_rule(query: &str) -> Option<RuleMatch> {
    RULE_PATTERNS.iter().find_map(|rule| {
        let caps = rule.pattern.captures(query)?;
        extract(rule.family, &caps)
    })
}

/// Returns one description per rule family, in priority order.
#[must_use]
pub fn descriptions() -> Vec<String> {
    RULE_PATTERNS
        .iter()
        .map(|rule| rule.description.to_string())
        .collect()
}

fn extract(family: RuleFamily, caps: &Captures<'_>) -> Option<RuleMatch> {
    match family {
        RuleFamily::Count => Some(RuleMatch::Count),
        // "show me rare cards" falls through to the rarity rule
        RuleFamily::Find => clean_term(&caps["term"])
            .filter(|term| !BARE_KEYWORD.is_match(term))
            .map(RuleMatch::Find),
        RuleFamily::Colour => {
            let (name, symbol) = match caps["colour"].to_lowercase().as_str() {
                "white" => ("White", "{W}"),
                "blue" => ("Blue", "{U}"),
                "black" => ("Black", "{B}"),
                "red" => ("Red", "{R}"),
                _ => ("Green", "{G}"),
            };
            Some(RuleMatch::Colour { name, symbol })
        },
        RuleFamily::Rarity => {
            let normalized = caps["rarity"]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            let rarity = match normalized.as_str() {
                "mythic rare" | "mythic" => "Mythic Rare",
                "rare" => "Rare",
                "uncommon" => "Uncommon",
                _ => "Common",
            };
            Some(RuleMatch::Rarity(rarity))
        },
        RuleFamily::Category => {
            let category = match caps["category"].to_lowercase().as_str() {
                "creature" | "creatures" => "creature",
                "instant" | "instants" => "instant",
                "sorcery" | "sorceries" => "sorcery",
                "land" | "lands" => "land",
                "artifact" | "artifacts" => "artifact",
                "enchantment" | "enchantments" => "enchantment",
                _ => "planeswalker",
            };
            Some(RuleMatch::Category(category))
        },
        RuleFamily::Set => clean_term(&caps["set"]).map(RuleMatch::Set),
    }
}

/// Strips quotes and trailing punctuation from a captured term.
fn clean_term(raw: &str) -> Option<String> {
    let term = raw
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .trim_matches(['"', '\''])
        .trim();
    (!term.is_empty()).then(|| term.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("how many cards are there", RuleMatch::Count ; "how many")]
    #[test_case("count cards", RuleMatch::Count ; "count")]
    #[test_case("what is the total", RuleMatch::Count ; "total")]
    #[test_case("number of cards please", RuleMatch::Count ; "number of")]
    #[test_case("find Black Lotus", RuleMatch::Find("Black Lotus".to_string()) ; "find")]
    #[test_case("search for \"Mox Pearl\"?", RuleMatch::Find("Mox Pearl".to_string()) ; "search for quoted")]
    #[test_case("look up shock", RuleMatch::Find("shock".to_string()) ; "look up")]
    #[test_case("blue cards", RuleMatch::Colour { name: "Blue", symbol: "{U}" } ; "blue")]
    #[test_case("anything GREEN?", RuleMatch::Colour { name: "Green", symbol: "{G}" } ; "green")]
    #[test_case("mythic rare cards", RuleMatch::Rarity("Mythic Rare") ; "mythic rare")]
    #[test_case("uncommon cards", RuleMatch::Rarity("Uncommon") ; "uncommon")]
    #[test_case("sorceries", RuleMatch::Category("sorcery") ; "sorceries")]
    #[test_case("list all creatures", RuleMatch::Category("creature") ; "creatures")]
    #[test_case("cards from set Alpha", RuleMatch::Set("Alpha".to_string()) ; "from set")]
    #[test_case("set Limited Edition Beta", RuleMatch::Set("Limited Edition Beta".to_string()) ; "set")]
    fn test_rule_matching(query: &str, expected: RuleMatch) {
        assert_eq!(match_rule(query), Some(expected));
    }

    #[test]
    fn test_count_beats_find() {
        assert_eq!(match_rule("find the count of lotus"), Some(RuleMatch::Count));
        assert_eq!(match_rule("show me how many rare cards"), Some(RuleMatch::Count));
    }

    #[test]
    fn test_find_beats_colour() {
        assert_eq!(
            match_rule("find Black Lotus"),
            Some(RuleMatch::Find("Black Lotus".to_string()))
        );
    }

    #[test_case("show me rare cards", RuleMatch::Rarity("Rare") ; "rarity")]
    #[test_case("show me blue cards", RuleMatch::Colour { name: "Blue", symbol: "{U}" } ; "colour")]
    #[test_case("show me all creatures", RuleMatch::Category("creature") ; "category")]
    #[test_case("find the mythic rare cards", RuleMatch::Rarity("Mythic Rare") ; "find keyword")]
    #[test_case("show me Black Lotus", RuleMatch::Find("Black Lotus".to_string()) ; "name")]
    #[test_case("search for rare bird", RuleMatch::Find("rare bird".to_string()) ; "keyword inside name")]
    fn test_find_yields_to_bare_keyword(query: &str, expected: RuleMatch) {
        assert_eq!(match_rule(query), Some(expected));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_rule("xyzzy nonsense query with no keywords"), None);
        assert_eq!(match_rule("what is the best deck?"), None);
        assert_eq!(match_rule("find"), None);
        assert_eq!(match_rule("mythics"), None);
    }

    #[test]
    fn test_descriptions_cover_every_family() {
        assert_eq!(descriptions().len(), 6);
        assert!(descriptions()[0].starts_with("count"));
    }
}
