//! Prompt templates for the language model router.

use super::tool_call::{GET_STATISTICS, SEARCH_CARDS};

/// System prompt for the first completion.
#[must_use]
pub fn tool_system_prompt(context: &str) -> String {
    format!(
        r#"You are an expert Magic: The Gathering assistant connected to a card catalog.

If the user asks about specific cards or a group of cards (for example "the Power 9"
or "the best cards from Alpha"):
1. Work out the list of card names yourself.
2. Call `{SEARCH_CARDS}` with the names SEPARATED BY COMMAS.

If the user asks about the catalog as a whole (sizes, rarities, types), call `{GET_STATISTICS}`.

Available tools:
- {SEARCH_CARDS}: search the catalog by one or more comma-separated card names. Arguments: {{ "name": "..." }}
- {GET_STATISTICS}: summarize the catalog. Arguments: {{}}

To call a tool, respond with ONLY valid JSON, for example:
{{ "tool": "{SEARCH_CARDS}", "arguments": {{ "name": "Black Lotus, Mox Pearl" }} }}

Otherwise answer the question directly in plain text.

Catalog summary:
{context}"#
    )
}

/// System prompt for follow-up completions.
pub const FOLLOW_UP_SYSTEM_PROMPT: &str = "You are a helpful Magic: The Gathering assistant.";

/// Asks for a single introductory sentence over found cards.
#[must_use]
pub fn intro_prompt(query: &str, found: usize, first_name: &str) -> String {
    format!(
        "The user searched for: '{query}'.\n\
         Found {found} cards (for example: {first_name}).\n\
         INSTRUCTION: write ONLY a friendly introductory sentence. Do NOT list cards."
    )
}

/// Asks for a general-knowledge answer when the catalog has no matches.
#[must_use]
pub fn general_knowledge_prompt(query: &str) -> String {
    format!(
        "USER QUESTION: '{query}'\n\
         CONTEXT: the local catalog has NO matching cards.\n\
         INSTRUCTION: answer from your general knowledge, but say that the cards are not in the inventory."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_names_tools() {
        let prompt = tool_system_prompt("Total cards: 3");
        assert!(prompt.contains("search_cards"));
        assert!(prompt.contains("get_statistics"));
        assert!(prompt.contains(r#"{ "tool": "search_cards", "arguments": { "name": "Black Lotus, Mox Pearl" } }"#));
        assert!(prompt.ends_with("Total cards: 3"));
    }

    #[test]
    fn test_follow_up_prompts() {
        let intro = intro_prompt("power nine", 2, "Black Lotus");
        assert!(intro.contains("Found 2 cards"));
        assert!(intro.contains("Do NOT list cards"));

        let general = general_knowledge_prompt("Ancestral Recall");
        assert!(general.contains("'Ancestral Recall'"));
        assert!(general.contains("not in the inventory"));
    }
}
