//! Routing runtime - classification, dispatch and conversation context
//!
//! A customer query goes through one constrained round:
//! 1. **Context merge** (`conversation`) - fold the last exchanges into one input
//! 2. **Classification** (`classifier`, `llm`) - pick a handler, a tool and parameters
//! 3. **Resolution** (`runtime`) - reject anything but exactly one handler and an owned tool
//! 4. **Dispatch** (`handlers`, `tools`) - validate against the tool contract, then call the API
//! 5. **Reply** (`reply`) - render the outcome and record it in context
//!
//! # Key Types
//!
//! - `Router` - shared, stateless orchestrator
//! - `Conversation` - one customer's bounded history
//! - `Classifier` - pluggable rules or chat-model classification
//!
//! The classifier only chooses. Parameter validation and every HTTP call
//! happen in deterministic code after the decision has been checked.

pub mod classifier;
pub mod conversation;
pub mod handlers;
pub mod llm;
pub mod reply;
pub mod runtime;
pub mod tools;

pub use classifier::{Classification, Classifier, RuleClassifier};
pub use conversation::{parse_composite, ComposedInput, ContextManager};
pub use handlers::{Handler, SalesHandler, SupportHandler};
pub use llm::{LlmClassifier, LlmClient, OpenAiCompatibleClient};
pub use reply::describe;
pub use runtime::{resolve, Conversation, Routed, Router, RouterPhase, Turn};
