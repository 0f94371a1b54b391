//! Parsing raw oracle text
//!
//! Oracle output is untrusted text. Nothing here assumes more structure than
//! the parser has actually confirmed; every outcome is a tagged value.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use super::action::ActionCandidate;
use crate::tools::{ToolSpec, find_tool};

/// Outcome of parsing a proposal response
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalParse {
    Candidates(Vec<ActionCandidate>),
    Malformed(String),
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawCandidate {
    #[serde(alias = "name", alias = "action")]
    tool: String,
    #[serde(default, alias = "args", alias = "arguments")]
    input: Option<Value>,
    #[serde(default, alias = "cost_hint", alias = "cost-hint")]
    cost: Option<Value>,
    #[serde(default, alias = "plan-complete", alias = "done")]
    plan_complete: Option<bool>,
    #[serde(default, alias = "expected-observation", alias = "observation")]
    expected_observation: Option<String>,
}

/// Parse a proposal response into candidates
///
/// Accepts a bare JSON array or an object with an `actions` array, either
/// optionally inside a fenced code block. Candidates naming tools outside
/// the catalogue are dropped unless they declare `plan_complete`; an empty
/// catalogue constrains nothing.
pub fn parse_proposals(text: &str, tools: &[ToolSpec]) -> ProposalParse {
    debug!(len = text.len(), "parse_proposals: called");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ProposalParse::Empty;
    }

    let Some(body) = extract_json(trimmed) else {
        return ProposalParse::Malformed("no JSON found in response".to_string());
    };

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return ProposalParse::Malformed(format!("invalid JSON: {}", e)),
    };

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("actions") {
            Some(Value::Array(items)) => items,
            _ => return ProposalParse::Malformed("object without an `actions` array".to_string()),
        },
        _ => return ProposalParse::Malformed("expected a JSON array of actions".to_string()),
    };

    if items.is_empty() {
        return ProposalParse::Empty;
    }

    let total = items.len();
    let mut seen = BTreeSet::new();
    let mut candidates = Vec::new();
    for item in items {
        let raw: RawCandidate = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "parse_proposals: skipping invalid candidate");
                continue;
            }
        };
        let tool = raw.tool.trim().to_string();
        let plan_complete = raw.plan_complete.unwrap_or(false);
        let unknown = !tools.is_empty() && find_tool(tools, &tool).is_none();
        if tool.is_empty() || (!plan_complete && unknown) {
            debug!(%tool, "parse_proposals: dropping candidate with unknown tool");
            continue;
        }

        let candidate = ActionCandidate {
            tool,
            input: input_to_string(raw.input),
            cost_hint: raw.cost.as_ref().and_then(cost_from_value),
            plan_complete,
            expected_observation: raw.expected_observation,
        };
        if seen.insert(candidate.to_action().normalized()) {
            candidates.push(candidate);
        }
    }

    if candidates.is_empty() {
        return ProposalParse::Malformed(format!("none of {} candidates named a usable tool", total));
    }
    ProposalParse::Candidates(candidates)
}

/// First unsigned integer in the text, saturating on overflow
pub fn parse_estimate(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    Some(digits.parse().unwrap_or(u64::MAX))
}

/// Locate the JSON payload: fenced block first, then the outermost brackets
fn extract_json(text: &str) -> Option<&str> {
    if let Some(fence) = text.find("```") {
        let after = &text[fence + 3..];
        // skip the info string (```json)
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        let body = body.find("```").map_or(body, |end| &body[..end]);
        return extract_json(body.trim()).or(Some(body.trim()));
    }

    let open = text.find(['[', '{'])?;
    let close_char = if text[open..].starts_with('[') { ']' } else { '}' };
    let close = text.rfind(close_char)?;
    (close > open).then(|| &text[open..=close])
}

fn input_to_string(input: Option<Value>) -> String {
    match input {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

fn cost_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => parse_estimate(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools() -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("search_flights", "search_flights(route)"),
            ToolSpec::new("book_flight", "book_flight(id)"),
        ]
    }

    fn candidates(parse: ProposalParse) -> Vec<ActionCandidate> {
        match parse {
            ProposalParse::Candidates(c) => c,
            other => panic!("expected candidates, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_array() {
        let text = r#"[{"tool": "search_flights", "input": "SFO->JFK", "cost": 2}]"#;
        let c = candidates(parse_proposals(text, &tools()));
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].tool, "search_flights");
        assert_eq!(c[0].input, "SFO->JFK");
        assert_eq!(c[0].cost_hint, Some(2));
        assert!(!c[0].plan_complete);
    }

    #[test]
    fn test_fenced_object_with_actions() {
        let text = "Here you go:\n```json\n{\"actions\": [{\"name\": \"book_flight\", \"args\": {\"id\": 7}}]}\n```\nGood luck";
        let c = candidates(parse_proposals(text, &tools()));
        assert_eq!(c[0].tool, "book_flight");
        assert_eq!(c[0].input, r#"{"id":7}"#);
        assert_eq!(c[0].cost_hint, None);
    }

    #[test]
    fn test_prose_around_array() {
        let text = "Sure! [{\"tool\": \"search_flights\"}] hope that helps";
        assert_eq!(candidates(parse_proposals(text, &tools())).len(), 1);
    }

    #[test]
    fn test_unknown_tool_dropped_unless_complete() {
        let text = r#"[
            {"tool": "launch_rocket"},
            {"tool": "DONE", "plan_complete": true},
            {"tool": "search_flights"}
        ]"#;
        let c = candidates(parse_proposals(text, &tools()));
        let names: Vec<&str> = c.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(names, vec!["DONE", "search_flights"]);
        assert!(c[0].plan_complete);
    }

    #[test]
    fn test_empty_catalogue_accepts_any_tool() {
        let text = r#"[{"tool": "search_flights", "input": "SFO"}, {"tool": "launch_rocket"}]"#;
        let c = candidates(parse_proposals(text, &[]));
        let names: Vec<&str> = c.iter().map(|c| c.tool.as_str()).collect();
        assert_eq!(names, vec!["search_flights", "launch_rocket"]);
        assert!(matches!(
            parse_proposals("[{\"tool\": \"  \"}]", &[]),
            ProposalParse::Malformed(_)
        ));
    }

    #[test]
    fn test_duplicates_collapsed() {
        let text = r#"[{"tool": "search_flights", "input": "A"}, {"tool": "search_flights", "input": "a"}]"#;
        assert_eq!(candidates(parse_proposals(text, &tools())).len(), 1);
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(parse_proposals("   ", &tools()), ProposalParse::Empty);
        assert_eq!(parse_proposals("[]", &tools()), ProposalParse::Empty);
        assert!(matches!(parse_proposals("no idea", &tools()), ProposalParse::Malformed(_)));
        assert!(matches!(parse_proposals("[{\"tool\": ", &tools()), ProposalParse::Malformed(_)));
        assert!(matches!(parse_proposals("{\"plan\": 1}", &tools()), ProposalParse::Malformed(_)));
        assert!(matches!(
            parse_proposals("[{\"tool\": \"launch_rocket\"}]", &tools()),
            ProposalParse::Malformed(_)
        ));
    }

    #[test]
    fn test_cost_variants() {
        let text = r#"[
            {"tool": "search_flights", "input": "1", "cost": 2.6},
            {"tool": "search_flights", "input": "2", "cost_hint": "3 steps"},
            {"tool": "search_flights", "input": "3", "cost": -1}
        ]"#;
        let c = candidates(parse_proposals(text, &tools()));
        assert_eq!(c[0].cost_hint, Some(3));
        assert_eq!(c[1].cost_hint, Some(3));
        assert_eq!(c[2].cost_hint, None);
    }

    #[test]
    fn test_parse_estimate() {
        assert_eq!(parse_estimate("42"), Some(42));
        assert_eq!(parse_estimate("About 7 more steps, maybe 9"), Some(7));
        assert_eq!(parse_estimate("-3"), Some(3));
        assert_eq!(parse_estimate("no number here"), None);
        assert_eq!(parse_estimate("99999999999999999999999"), Some(u64::MAX));
    }
}
