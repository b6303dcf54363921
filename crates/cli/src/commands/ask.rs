use partsline_agent::{Conversation, Router};
use partsline_core::config::LoadOptions;
use partsline_core::ToolEnvelope;
use serde::Serialize;

use super::{prepare, startup_failure, CommandResult, EXIT_ROUTING_ERROR, EXIT_TOOL_ERROR};

#[derive(Debug, Serialize)]
struct AskOutcome<'a> {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    handler: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool: Option<&'static str>,
    reply: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<ToolEnvelope>,
}

pub async fn run(options: LoadOptions, query: &str) -> CommandResult {
    let (config, router) = match prepare(options) {
        Ok(prepared) => prepared,
        Err(error) => return startup_failure("ask", &error),
    };

    execute(&router, config.conversation.history_limit, query).await
}

/// One round against an already built router.
pub async fn execute(router: &Router, history_limit: usize, query: &str) -> CommandResult {
    let mut conversation = Conversation::new(history_limit);
    let turn = conversation.ask(router, query).await;

    let (exit_code, outcome) = match &turn.outcome {
        Ok(routed) => {
            let failed = routed.result.as_ref().err();
            let outcome = AskOutcome {
                command: "ask",
                status: if failed.is_some() { "error" } else { "ok" },
                error_class: failed.map(|error| error.kind()),
                handler: Some(routed.decision.handler.as_str()),
                tool: Some(routed.decision.tool.as_str()),
                reply: &turn.reply,
                result: Some(ToolEnvelope::from(&routed.result)),
            };
            (if failed.is_some() { EXIT_TOOL_ERROR } else { 0 }, outcome)
        }
        Err(error) => {
            let outcome = AskOutcome {
                command: "ask",
                status: "error",
                error_class: Some(error.kind()),
                handler: None,
                tool: None,
                reply: &turn.reply,
                result: None,
            };
            (EXIT_ROUTING_ERROR, outcome)
        }
    };

    CommandResult::json(exit_code, &outcome)
}
