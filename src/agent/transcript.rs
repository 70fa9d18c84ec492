//! Transcript data model for one dispatch run.
//!
//! A [`Transcript`] is the append-only sequence of [`Turn`]s produced while
//! handling one user command. It is owned by the dispatch loop for that run
//! and discarded when the run terminates; nothing here persists across runs.

use crate::agent::parser::ParseReason;
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// One structured unit of the dispatch transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    Thought(String),
    Action {
        tool: String,
        input: Map<String, Value>,
    },
    Observation(String),
    FinalAnswer(String),
    /// Raw model output that matched no recognized directive. Kept verbatim so
    /// the model sees exactly what it wrote on the next iteration.
    ParseError {
        reason: ParseReason,
        raw: String,
    },
}

/// Ordered, append-only turn sequence for one run.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Serialize the transcript into the scratchpad block fed back to the
    /// model: `Thought:` / `Action:` / `Action Input:` / `Observation:` /
    /// `Final Answer:` lines in append order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            match turn {
                Turn::Thought(text) => {
                    let _ = writeln!(out, "Thought: {text}");
                }
                Turn::Action { tool, input } => {
                    let json = serde_json::to_string(&Value::Object(input.clone()))
                        .unwrap_or_else(|_| "{}".to_string());
                    let _ = writeln!(out, "Action: {tool}");
                    let _ = writeln!(out, "Action Input: {json}");
                }
                Turn::Observation(text) => {
                    let _ = writeln!(out, "Observation: {text}");
                }
                Turn::FinalAnswer(text) => {
                    let _ = writeln!(out, "Final Answer: {text}");
                }
                Turn::ParseError { raw, .. } => {
                    let _ = writeln!(out, "{}", raw.trim_end());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::parser;
    use serde_json::json;

    fn action(tool: &str, input: Value) -> Turn {
        Turn::Action {
            tool: tool.to_string(),
            input: input.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn render_preserves_append_order() {
        let mut t = Transcript::new();
        t.push(Turn::Thought("open the app".into()));
        t.push(action("open_app", json!({"app_name": "notepad"})));
        t.push(Turn::Observation("{\"status\":\"success\"}".into()));
        t.push(Turn::FinalAnswer("Done.".into()));

        let rendered = t.render();
        let thought = rendered.find("Thought:").unwrap();
        let act = rendered.find("Action:").unwrap();
        let input = rendered.find("Action Input:").unwrap();
        let obs = rendered.find("Observation:").unwrap();
        let fin = rendered.find("Final Answer:").unwrap();
        assert!(thought < act && act < input && input < obs && obs < fin);
    }

    #[test]
    fn action_input_roundtrips_through_rendering() {
        let input = json!({"app_name": "notepad", "wait_secs": 3});
        let mut t = Transcript::new();
        t.push(action("open_app", input.clone()));

        let rendered = t.render();
        let line = rendered
            .lines()
            .find_map(|l| l.strip_prefix("Action Input: "))
            .unwrap();
        let reparsed: Value = serde_json::from_str(line).unwrap();
        assert_eq!(reparsed, input);
    }

    #[test]
    fn parse_error_turn_renders_raw_text() {
        let mut t = Transcript::new();
        t.push(Turn::ParseError {
            reason: parser::ParseReason::NoRecognizedDirective,
            raw: "I will just ramble here".into(),
        });
        assert!(t.render().contains("I will just ramble here"));
    }

    #[test]
    fn empty_transcript_renders_empty() {
        assert!(Transcript::new().render().is_empty());
    }
}
