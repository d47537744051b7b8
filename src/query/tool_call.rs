//! Tool-call detection in completion text.

use crate::llm::extract_json_from_response;
use serde_json::Value;

/// Tool that searches the catalog by comma-separated names.
pub const SEARCH_CARDS: &str = "search_cards";
/// Tool that reports catalog statistics.
pub const GET_STATISTICS: &str = "get_statistics";

/// The result of inspecting a completion for a tool call.
///
/// Parsing never fails: anything that is not a well-formed call to a known
/// tool is [`ToolInvocation::NoToolCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// The completion is a plain answer.
    NoToolCall,
    /// The completion asks for a tool to run.
    ToolCall {
        /// Tool name.
        name: String,
        /// Tool arguments (an object, possibly empty).
        arguments: Value,
    },
}

impl ToolInvocation {
    /// Inspects completion text for a tool call.
    ///
    /// Accepts `{ "tool": ..., "arguments": {...} }` with optional markdown
    /// fences and surrounding prose. Key matching is case-insensitive.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let json = extract_json_from_response(text);
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(json) else {
            return Self::NoToolCall;
        };

        let field = |key: &str| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        };

        let Some(name) = field("tool").and_then(Value::as_str).map(str::trim) else {
            return Self::NoToolCall;
        };
        if name != SEARCH_CARDS && name != GET_STATISTICS {
            tracing::debug!(tool = name, "Ignoring unknown tool");
            return Self::NoToolCall;
        }

        let arguments = match field("arguments") {
            Some(args @ Value::Object(_)) => args.clone(),
            _ => Value::Object(serde_json::Map::new()),
        };

        Self::ToolCall {
            name: name.to_string(),
            arguments,
        }
    }
}

/// Reads the `name` argument of `search_cards` as a list of names.
///
/// Accepts a comma-separated string or an array of strings.
#[must_use]
pub fn search_names(arguments: &Value) -> Vec<String> {
    let raw: Vec<String> = match arguments.get("name").or_else(|| arguments.get("names")) {
        Some(Value::String(s)) => s.split(',').map(String::from).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    raw.into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fenced_tool_call() {
        let text = "```json\n{ \"tool\": \"search_cards\", \"arguments\": { \"name\": \"Black Lotus, Mox Pearl\" } }\n```";
        let ToolInvocation::ToolCall { name, arguments } = ToolInvocation::parse(text) else {
            panic!("expected tool call");
        };
        assert_eq!(name, SEARCH_CARDS);
        assert_eq!(search_names(&arguments), vec!["Black Lotus", "Mox Pearl"]);
    }

    #[test]
    fn test_parse_with_prose() {
        let text = "Let me check. {\"Tool\": \"get_statistics\"} Done.";
        assert_eq!(
            ToolInvocation::parse(text),
            ToolInvocation::ToolCall {
                name: GET_STATISTICS.to_string(),
                arguments: json!({}),
            }
        );
    }

    #[test]
    fn test_plain_answer() {
        assert_eq!(
            ToolInvocation::parse("Black Lotus costs {0}."),
            ToolInvocation::NoToolCall
        );
        assert_eq!(ToolInvocation::parse(""), ToolInvocation::NoToolCall);
    }

    #[test]
    fn test_unknown_tool_is_no_call() {
        let text = r#"{"tool": "delete_everything", "arguments": {}}"#;
        assert_eq!(ToolInvocation::parse(text), ToolInvocation::NoToolCall);
    }

    #[test]
    fn test_malformed_json_is_no_call() {
        let text = r#"{"tool": "search_cards", "arguments": "#;
        assert_eq!(ToolInvocation::parse(text), ToolInvocation::NoToolCall);
    }

    #[test]
    fn test_search_names_array() {
        let args = json!({ "name": ["Shock", " ", "Opt "] });
        assert_eq!(search_names(&args), vec!["Shock", "Opt"]);
        assert!(search_names(&json!({})).is_empty());
    }
}
