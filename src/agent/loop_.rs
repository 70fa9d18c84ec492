//! The dispatch loop: one user command in, one final response out.
//!
//! Each iteration renders the prompt from the transcript so far, calls the
//! model once, and interprets the reply. Recoverable failures (unparseable
//! output, unknown tools, invalid input, tool errors) are fed back as
//! observations so the model can self-correct; only a failed model request
//! aborts the run. The iteration budget counts model replies that consumed a
//! turn (actions and parse errors) and is checked after the corresponding
//! observation is appended, so an exhausted run never makes the extra call.

use crate::agent::parser::{self, Directive};
use crate::agent::prompt;
use crate::agent::transcript::{Transcript, Turn};
use crate::providers::Provider;
use crate::tools::ToolRegistry;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal state of one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// The model produced a final answer.
    Completed,
    /// The iteration budget ran out before a final answer.
    Exhausted,
    /// The model request itself failed; no recovery is possible.
    Failed,
}

/// Result of one dispatch run.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Final answer text, or a terminal diagnostic for exhausted/failed runs.
    pub response: String,
    pub status: RunStatus,
    /// Budget-consuming iterations: one per action, one per parse error.
    pub iterations: usize,
    pub run_id: Uuid,
    pub transcript: Transcript,
}

const EXHAUSTED_RESPONSE: &str =
    "Agent stopped: iteration budget exhausted before reaching a final answer.";

/// Run one user command through the model/tool loop until a terminal state.
pub async fn dispatch(
    provider: &dyn Provider,
    registry: &ToolRegistry,
    user_input: &str,
    max_iterations: usize,
) -> DispatchOutcome {
    let run_id = Uuid::new_v4();
    let known_tools = registry.names();
    let (tools_block, names_csv) = prompt::render_tools(&registry.all_specs());

    let mut transcript = Transcript::new();
    let mut iterations = 0usize;

    info!(%run_id, max_iterations, "dispatch run started");

    loop {
        let rendered =
            prompt::build_prompt(&tools_block, &names_csv, user_input, &transcript.render());

        let raw = match provider.complete(&rendered).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%run_id, error = %e, "model request failed");
                return DispatchOutcome {
                    response: format!("model request failed: {e}"),
                    status: RunStatus::Failed,
                    iterations,
                    run_id,
                    transcript,
                };
            }
        };

        let reply = parser::parse(&raw, &known_tools);
        if let Some(thought) = reply.thought {
            transcript.push(Turn::Thought(thought));
        }

        match reply.directive {
            Directive::FinalAnswer(answer) => {
                transcript.push(Turn::FinalAnswer(answer.clone()));
                info!(%run_id, iterations, "dispatch run completed");
                return DispatchOutcome {
                    response: answer,
                    status: RunStatus::Completed,
                    iterations,
                    run_id,
                    transcript,
                };
            }
            Directive::Action { tool, input } => {
                debug!(%run_id, tool = %tool, "action requested");
                transcript.push(Turn::Action {
                    tool: tool.clone(),
                    input: input.clone(),
                });

                let observation = match registry.lookup(&tool) {
                    Err(_) => format!(
                        "tool '{tool}' is not recognized. Available tools: {names_csv}"
                    ),
                    Ok(implementation) => match implementation.input_schema().validate(&input) {
                        Err(e) => format!("invalid input for tool '{tool}': {e}"),
                        Ok(validated) => match implementation.invoke(validated).await {
                            Ok(result) => result,
                            Err(e) => {
                                warn!(%run_id, tool = %tool, error = %e, "tool failed");
                                format!("error: tool '{tool}' failed: {e}")
                            }
                        },
                    },
                };
                transcript.push(Turn::Observation(observation));
            }
            Directive::Error(reason) => {
                debug!(%run_id, reason = %reason, "unparseable model reply");
                transcript.push(Turn::ParseError { reason, raw });
                transcript.push(Turn::Observation(format!(
                    "could not parse your reply ({}): {}",
                    reason.code(),
                    reason.hint()
                )));
            }
        }

        iterations += 1;
        if iterations >= max_iterations {
            warn!(%run_id, iterations, "iteration budget exhausted");
            return DispatchOutcome {
                response: EXHAUSTED_RESPONSE.to_string(),
                status: RunStatus::Exhausted,
                iterations,
                run_id,
                transcript,
            };
        }
    }
}
