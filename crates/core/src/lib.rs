pub mod config;
pub mod domain;
pub mod errors;

pub use domain::conversation::{ConversationContext, Exchange, DEFAULT_HISTORY_LIMIT};
pub use domain::route::{HandlerTag, Parameters, RouteDecision};
pub use domain::tool::{
    ParamSpec, Payload, RetryPolicy, ToolContract, ToolEnvelope, ToolName, ToolRequest,
    ToolResponse, ToolResult, UpdateKind,
};
pub use errors::{RouterError, ToolError, APOLOGY_MESSAGE};
