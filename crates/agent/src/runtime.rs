use std::sync::Arc;

use anyhow::{Context, Result};
use partsline_api::{ApiClient, Dispatch};
use partsline_core::config::{AppConfig, ClassifierKind};
use partsline_core::{
    ConversationContext, HandlerTag, RouteDecision, RouterError, ToolName, ToolResult,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{Classification, Classifier, RuleClassifier};
use crate::conversation::ContextManager;
use crate::handlers::{Handler, SalesHandler, SupportHandler};
use crate::llm::{LlmClassifier, OpenAiCompatibleClient};
use crate::reply::describe;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouterPhase {
    Idle,
    Classifying,
    Dispatching,
    AwaitingResult,
}

impl RouterPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Dispatching => "dispatching",
            Self::AwaitingResult => "awaiting_result",
        }
    }

    /// Idle → Classifying → Dispatching → AwaitingResult → Idle. Classification
    /// failures short-circuit straight back to Idle.
    pub fn can_advance_to(&self, next: RouterPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Classifying)
                | (Self::Classifying, Self::Dispatching)
                | (Self::Classifying, Self::Idle)
                | (Self::Dispatching, Self::AwaitingResult)
                | (Self::AwaitingResult, Self::Idle)
        )
    }
}

/// A routed round: the validated decision and what its tool returned.
#[derive(Clone, Debug, PartialEq)]
pub struct Routed {
    pub decision: RouteDecision,
    pub result: ToolResult,
}

/// Classifies composite input and invokes exactly one handler.
pub struct Router {
    classifier: Arc<dyn Classifier>,
    support: Arc<dyn Handler>,
    sales: Arc<dyn Handler>,
}

impl Router {
    pub fn new(classifier: Arc<dyn Classifier>, dispatch: Arc<dyn Dispatch>) -> Self {
        Self::with_handlers(
            classifier,
            Arc::new(SupportHandler::new(dispatch.clone())),
            Arc::new(SalesHandler::new(dispatch)),
        )
    }

    pub fn with_handlers(
        classifier: Arc<dyn Classifier>,
        support: Arc<dyn Handler>,
        sales: Arc<dyn Handler>,
    ) -> Self {
        Self { classifier, support, sales }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client = ApiClient::from_config(&config.api, config.retry_policy())
            .context("failed to build parts API client")?;
        let dispatch: Arc<dyn Dispatch> = Arc::new(client);

        let classifier: Arc<dyn Classifier> = match config.classifier.kind {
            ClassifierKind::Rules => Arc::new(RuleClassifier::new()),
            ClassifierKind::Llm => {
                let llm = OpenAiCompatibleClient::from_config(&config.classifier)?;
                Arc::new(LlmClassifier::new(llm))
            }
        };

        Ok(Self::new(classifier, dispatch))
    }

    pub fn handler(&self, tag: HandlerTag) -> &dyn Handler {
        match tag {
            HandlerTag::Support => self.support.as_ref(),
            HandlerTag::Sales => self.sales.as_ref(),
        }
    }

    pub async fn route(&self, correlation_id: &str, input: &str) -> Result<Routed, RouterError> {
        let mut phase = RouterPhase::Idle;
        advance(&mut phase, RouterPhase::Classifying, correlation_id);

        let decision = match self.classify(input).await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(
                    event_name = "router.rejected",
                    correlation_id,
                    error_kind = error.kind(),
                    error = %error,
                    "query could not be routed"
                );
                advance(&mut phase, RouterPhase::Idle, correlation_id);
                return Err(error);
            }
        };

        advance(&mut phase, RouterPhase::Dispatching, correlation_id);
        info!(
            event_name = "router.routed",
            correlation_id,
            handler = decision.handler.as_str(),
            tool = decision.tool.as_str(),
            "query routed"
        );

        let pending = self.handler(decision.handler).handle(decision.tool, &decision.parameters);
        advance(&mut phase, RouterPhase::AwaitingResult, correlation_id);
        let result = pending.await;

        match &result {
            Ok(response) => info!(
                event_name = "router.completed",
                correlation_id,
                tool = decision.tool.as_str(),
                status = response.status_code,
                "tool returned"
            ),
            Err(error) => warn!(
                event_name = "router.tool_failed",
                correlation_id,
                tool = decision.tool.as_str(),
                error_kind = error.kind(),
                "tool returned an error"
            ),
        }
        advance(&mut phase, RouterPhase::Idle, correlation_id);

        Ok(Routed { decision, result })
    }

    async fn classify(&self, input: &str) -> Result<RouteDecision, RouterError> {
        let classification = self.classifier.classify(input).await?;
        resolve(classification)
    }
}

fn advance(phase: &mut RouterPhase, next: RouterPhase, correlation_id: &str) {
    debug_assert!(phase.can_advance_to(next), "{phase:?} -> {next:?}");
    debug!(
        event_name = "router.phase",
        correlation_id,
        from = phase.as_str(),
        to = next.as_str(),
        "router phase changed"
    );
    *phase = next;
}

/// Turns a raw classification into a decision naming exactly one handler and
/// a tool that handler owns.
pub fn resolve(classification: Classification) -> Result<RouteDecision, RouterError> {
    let handler = match classification.handlers.as_slice() {
        [single] => single.parse::<HandlerTag>()?,
        [] => return Err(RouterError::Routing("no handler selected".to_string())),
        many => {
            return Err(RouterError::Routing(format!(
                "expected exactly one handler, got {}: {}",
                many.len(),
                many.join(", ")
            )))
        }
    };

    let tool = classification
        .tool
        .as_deref()
        .map(str::trim)
        .filter(|tool| !tool.is_empty())
        .ok_or_else(|| RouterError::Routing(format!("no tool selected for {handler}")))?
        .parse::<ToolName>()?;

    if tool.handler() != handler {
        return Err(RouterError::Routing(format!("{tool} is not owned by {handler}")));
    }

    Ok(RouteDecision::new(handler, tool, classification.parameters))
}

/// One completed round of a conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    pub reply: String,
    pub outcome: Result<Routed, RouterError>,
}

impl Turn {
    pub fn decision(&self) -> Option<&RouteDecision> {
        self.outcome.as_ref().ok().map(|routed| &routed.decision)
    }

    pub fn result(&self) -> Option<&ToolResult> {
        self.outcome.as_ref().ok().map(|routed| &routed.result)
    }
}

/// One customer's session. Rounds are sequential through `&mut self`; the
/// router may be shared across sessions.
pub struct Conversation {
    id: Uuid,
    rounds: u64,
    manager: ContextManager,
    context: ConversationContext,
}

impl Conversation {
    pub fn new(history_limit: usize) -> Self {
        let manager = ContextManager::new(history_limit);
        Self { id: Uuid::new_v4(), rounds: 0, context: manager.empty_context(), manager }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub async fn ask(&mut self, router: &Router, query: &str) -> Turn {
        self.rounds += 1;
        let correlation_id = format!("{}:{}", self.id, self.rounds);
        let input = self.manager.merge(&self.context, query);

        let outcome = router.route(&correlation_id, &input).await;
        let reply = match &outcome {
            Ok(routed) => describe(routed.decision.tool, &routed.result),
            Err(error) => error.user_message().to_string(),
        };

        let context = std::mem::take(&mut self.context);
        self.context = self.manager.record(context, query, &reply);

        Turn { reply, outcome }
    }
}
