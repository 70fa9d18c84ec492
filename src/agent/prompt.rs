//! Prompt construction for the dispatch loop.
//!
//! [`render_tools`] turns a registry snapshot into the tool-description block
//! and tool-name list; [`build_prompt`] assembles the full per-iteration
//! prompt. Both are pure functions of their inputs: the same specs always
//! produce byte-identical text, which keeps prompts reproducible in tests.

use crate::tools::ToolSpec;
use std::fmt::Write as _;

/// Static instruction template. `{tools}`, `{tool_names}`, `{input}` and
/// `{scratchpad}` are substituted by [`build_prompt`].
const SYSTEM_TEMPLATE: &str = r#"You are a helpful personal assistant that can use tools to act on the user's behalf.

## TOOLS
You have access to the following tools (use exact names for Action):
{tools}

## RESPONSE FORMAT
Every reply starts with `Thought:` followed by EITHER:
- `Final Answer: <your reply to the user>` for direct conversational answers, capability questions, or after you have gathered enough observations; OR
- `Action: <one of: {tool_names}>` on its own line, then `Action Input: <a single valid JSON object matching that tool's input fields>`.

Rules:
- Action Input MUST be one JSON object with double-quoted keys and string values.
- After an Action the system replies with `Observation: <result>`. Observations are JSON with a `status` field; read it and either act again or give a `Final Answer:` summarizing all key data conversationally.
- Never invent tool names or input fields.

Begin!

User Input: {input}
{scratchpad}"#;

/// Render the registry snapshot into the tool block and the comma-separated
/// tool-name list consumed by the prompt template.
pub fn render_tools(specs: &[ToolSpec]) -> (String, String) {
    let mut block = String::new();
    for spec in specs {
        let _ = writeln!(block, "- {}: {}", spec.name, spec.description);
        if spec.input.fields().is_empty() {
            let _ = writeln!(block, "  input: {{}} (no fields)");
            continue;
        }
        let _ = writeln!(block, "  input fields:");
        for field in spec.input.fields() {
            let requirement = if field.required {
                "required".to_string()
            } else {
                match &field.default {
                    Some(default) => format!("optional, default {default}"),
                    None => "optional".to_string(),
                }
            };
            let _ = writeln!(
                block,
                "    {} ({}, {}): {}",
                field.name, field.ty, requirement, field.description
            );
        }
    }

    let names_csv = specs
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    (block, names_csv)
}

/// Assemble the full prompt for one model invocation.
pub fn build_prompt(tools_block: &str, names_csv: &str, input: &str, scratchpad: &str) -> String {
    SYSTEM_TEMPLATE
        .replace("{tools}", tools_block)
        .replace("{tool_names}", names_csv)
        .replace("{input}", input)
        .replace("{scratchpad}", scratchpad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FieldSpec, FieldType, InputSchema};
    use serde_json::json;

    fn specs() -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "open_app".into(),
                description: "Open a desktop application.".into(),
                input: InputSchema::new().field(FieldSpec::required(
                    "app_name",
                    FieldType::String,
                    "Application to open",
                )),
            },
            ToolSpec {
                name: "executor".into(),
                description: "Run code in the sandbox.".into(),
                input: InputSchema::new()
                    .field(FieldSpec::required("code", FieldType::String, "Code to run"))
                    .field(FieldSpec::optional(
                        "timeout_secs",
                        FieldType::Integer,
                        Some(json!(120)),
                        "Execution timeout",
                    )),
            },
        ]
    }

    #[test]
    fn rendering_is_deterministic() {
        let specs = specs();
        let (block_a, names_a) = render_tools(&specs);
        let (block_b, names_b) = render_tools(&specs);
        assert_eq!(block_a, block_b);
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn block_renders_every_field() {
        let (block, _) = render_tools(&specs());
        assert!(block.contains("open_app"));
        assert!(block.contains("app_name (string, required)"));
        assert!(block.contains("timeout_secs (integer, optional, default 120)"));
        assert!(block.contains("Execution timeout"));
    }

    #[test]
    fn names_csv_follows_spec_order() {
        let (_, names) = render_tools(&specs());
        assert_eq!(names, "open_app, executor");
    }

    #[test]
    fn empty_schema_renders_no_fields_note() {
        let spec = ToolSpec {
            name: "close_sandbox".into(),
            description: "Close the sandbox.".into(),
            input: InputSchema::new(),
        };
        let (block, _) = render_tools(&[spec]);
        assert!(block.contains("{} (no fields)"));
    }

    #[test]
    fn build_prompt_substitutes_all_slots() {
        let prompt = build_prompt("TOOLBLOCK", "a, b", "open notepad", "Thought: hi\n");
        assert!(prompt.contains("TOOLBLOCK"));
        assert!(prompt.contains("one of: a, b"));
        assert!(prompt.contains("User Input: open notepad"));
        assert!(prompt.contains("Thought: hi"));
        assert!(!prompt.contains("{tools}"));
        assert!(!prompt.contains("{scratchpad}"));
    }
}
