//! Parser for raw model output.
//!
//! All brittle text matching against the `Thought:` / `Action:` /
//! `Action Input:` / `Final Answer:` grammar lives behind this module. The
//! parser is total: malformed model output is always representable as a
//! [`Directive::Error`] with a [`ParseReason`], never a Rust error, because
//! the dispatch loop recovers from parse failures by feeding an explanatory
//! observation back to the model.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

pub const THOUGHT_MARKER: &str = "Thought:";
pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

/// Why a block of model output failed to parse into a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseReason {
    /// Action Input content was present but not a valid JSON object.
    InvalidJson,
    /// Action named a tool that is not registered.
    UnknownTool,
    /// Action marker present but Action Input absent or whitespace-only.
    MissingInput,
    /// Neither a final answer nor an action was found.
    NoRecognizedDirective,
}

impl ParseReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidJson => "invalid_json",
            Self::UnknownTool => "unknown_tool",
            Self::MissingInput => "missing_input",
            Self::NoRecognizedDirective => "no_recognized_directive",
        }
    }

    /// Guidance included in the recovery observation so the model can
    /// self-correct on its next turn.
    pub const fn hint(self) -> &'static str {
        match self {
            Self::InvalidJson => {
                "Action Input must be a single valid JSON object with double-quoted keys and strings"
            }
            Self::UnknownTool => "Action must name one of the listed tools exactly",
            Self::MissingInput => "an Action line must be followed by an Action Input JSON object",
            Self::NoRecognizedDirective => {
                "reply with either 'Final Answer:' or an 'Action:' / 'Action Input:' pair"
            }
        }
    }
}

impl fmt::Display for ParseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    FinalAnswer(String),
    Action {
        tool: String,
        input: Map<String, Value>,
    },
    Error(ParseReason),
}

/// One parsed model reply: optional leading thought plus the directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub thought: Option<String>,
    pub directive: Directive,
}

/// Parse one block of raw model output.
///
/// Recognized forms, in priority order: a final-answer marker; an action
/// marker naming a registered tool followed by a JSON object; everything
/// else degrades to a [`Directive::Error`]. Never returns a Rust error.
pub fn parse(raw: &str, known_tools: &HashSet<String>) -> ParsedReply {
    let thought = extract_thought(raw);

    if let Some(pos) = raw.find(FINAL_ANSWER_MARKER) {
        let answer = raw[pos + FINAL_ANSWER_MARKER.len()..].trim().to_string();
        return ParsedReply {
            thought,
            directive: Directive::FinalAnswer(answer),
        };
    }

    let Some(action_pos) = raw.find(ACTION_MARKER) else {
        return ParsedReply {
            thought,
            directive: Directive::Error(ParseReason::NoRecognizedDirective),
        };
    };

    let after_action = &raw[action_pos + ACTION_MARKER.len()..];
    let tool = after_action
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches('`')
        .trim()
        .to_string();
    if tool.is_empty() {
        return ParsedReply {
            thought,
            directive: Directive::Error(ParseReason::NoRecognizedDirective),
        };
    }

    let input_body = after_action
        .find(ACTION_INPUT_MARKER)
        .map(|pos| &after_action[pos + ACTION_INPUT_MARKER.len()..]);
    let Some(input_body) = input_body.filter(|body| !body.trim().is_empty()) else {
        return ParsedReply {
            thought,
            directive: Directive::Error(ParseReason::MissingInput),
        };
    };

    let payload = strip_code_fence(input_body);
    let Some(object) = first_balanced_object(payload).and_then(parse_json_object) else {
        return ParsedReply {
            thought,
            directive: Directive::Error(ParseReason::InvalidJson),
        };
    };

    if !known_tools.contains(&tool) {
        return ParsedReply {
            thought,
            directive: Directive::Error(ParseReason::UnknownTool),
        };
    }

    ParsedReply {
        thought,
        directive: Directive::Action {
            tool,
            input: object,
        },
    }
}

/// Text between the first `Thought:` marker and the next directive marker.
fn extract_thought(raw: &str) -> Option<String> {
    let start = raw.find(THOUGHT_MARKER)? + THOUGHT_MARKER.len();
    let rest = &raw[start..];
    let end = [ACTION_MARKER, FINAL_ANSWER_MARKER]
        .iter()
        .filter_map(|marker| rest.find(marker))
        .min()
        .unwrap_or(rest.len());
    let thought = rest[..end].trim();
    (!thought.is_empty()).then(|| thought.to_string())
}

/// Drop a surrounding ```-fence (with optional language tag) if present.
fn strip_code_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag on the opening fence line.
    let inner = match inner.find('\n') {
        Some(nl) => &inner[nl + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// First balanced `{...}` span in `text`, honoring JSON string literals so
/// braces inside quoted values do not affect nesting depth.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json_object(span: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> HashSet<String> {
        ["open_app_tool", "executor", "file_read"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_final_answer_with_thought() {
        let reply = parse("Thought: hi\nFinal Answer: Hello!", &known());
        assert_eq!(reply.thought.as_deref(), Some("hi"));
        assert_eq!(reply.directive, Directive::FinalAnswer("Hello!".into()));
    }

    #[test]
    fn final_answer_takes_priority_over_action() {
        let raw = "Thought: both\nAction: executor\nAction Input: {}\nFinal Answer: done";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::FinalAnswer("done".into()));
    }

    #[test]
    fn parses_action_with_json_input() {
        let raw = "Thought: open\nAction: open_app_tool\nAction Input:\n{\"app_name\": \"notepad\"}";
        let reply = parse(raw, &known());
        match reply.directive {
            Directive::Action { tool, input } => {
                assert_eq!(tool, "open_app_tool");
                assert_eq!(input["app_name"], "notepad");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn strips_fenced_payload() {
        let raw = "Action: executor\nAction Input:\n```json\n{\"code\": \"print(1)\"}\n```";
        let reply = parse(raw, &known());
        match reply.directive {
            Directive::Action { input, .. } => assert_eq!(input["code"], "print(1)"),
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn takes_first_balanced_object_when_text_follows() {
        let raw = "Action: executor\nAction Input: {\"code\": \"x\"} and then {\"junk\": 1}";
        let reply = parse(raw, &known());
        match reply.directive {
            Directive::Action { input, .. } => {
                assert_eq!(input["code"], "x");
                assert!(!input.contains_key("junk"));
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn braces_inside_strings_do_not_break_balancing() {
        let raw = r#"Action: executor
Action Input: {"code": "d = {\"a\": 1}"}"#;
        let reply = parse(raw, &known());
        match reply.directive {
            Directive::Action { input, .. } => {
                assert_eq!(input["code"], "d = {\"a\": 1}");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let raw = "Action: executor\nAction Input: {not json at all";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::Error(ParseReason::InvalidJson));
    }

    #[test]
    fn non_object_json_is_invalid() {
        // A bare array carries no named arguments.
        let raw = "Action: executor\nAction Input: [1, 2, 3]";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::Error(ParseReason::InvalidJson));
    }

    #[test]
    fn unknown_tool_with_valid_json() {
        let raw = "Action: frobnicate\nAction Input: {\"x\": 1}";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::Error(ParseReason::UnknownTool));
    }

    #[test]
    fn invalid_json_wins_over_unknown_tool() {
        let raw = "Action: frobnicate\nAction Input: {broken";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::Error(ParseReason::InvalidJson));
    }

    #[test]
    fn missing_input_after_action() {
        let raw = "Thought: t\nAction: executor\nAction Input:   \n";
        let reply = parse(raw, &known());
        assert_eq!(reply.directive, Directive::Error(ParseReason::MissingInput));
        let raw2 = "Action: executor";
        assert_eq!(
            parse(raw2, &known()).directive,
            Directive::Error(ParseReason::MissingInput)
        );
    }

    #[test]
    fn free_text_is_no_recognized_directive() {
        let reply = parse("Sure, I can help with that!", &known());
        assert_eq!(
            reply.directive,
            Directive::Error(ParseReason::NoRecognizedDirective)
        );
        assert!(reply.thought.is_none());
    }

    #[test]
    fn empty_tool_name_is_no_recognized_directive() {
        let raw = "Action:\nAction Input: {}";
        let reply = parse(raw, &known());
        assert_eq!(
            reply.directive,
            Directive::Error(ParseReason::NoRecognizedDirective)
        );
    }

    #[test]
    fn backticked_tool_name_is_accepted() {
        let raw = "Action: `executor`\nAction Input: {\"code\": \"1\"}";
        let reply = parse(raw, &known());
        assert!(matches!(reply.directive, Directive::Action { ref tool, .. } if tool == "executor"));
    }

    #[test]
    fn parse_never_panics_on_garbage() {
        for raw in [
            "",
            "Action:",
            "Action Input: {}",
            "Thought:",
            "Final Answer:",
            "Action: executor\nAction Input: }{",
            "\u{1F600} unicode noise { \" unterminated",
        ] {
            let _ = parse(raw, &known());
        }
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(ParseReason::InvalidJson.code(), "invalid_json");
        assert_eq!(ParseReason::UnknownTool.code(), "unknown_tool");
        assert_eq!(ParseReason::MissingInput.code(), "missing_input");
        assert_eq!(
            ParseReason::NoRecognizedDirective.code(),
            "no_recognized_directive"
        );
    }
}
