use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use partsline_core::config::ClassifierConfig;
use partsline_core::{Parameters, RouterError};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::classifier::{Classification, Classifier};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

pub const ROUTING_INSTRUCTIONS: &str = r#"You route customer messages for an appliance parts store.
Pick exactly one handler and one tool. Never pick more than one handler.

Handlers and the tools they own:
- "support": order_status, refund_status, subscription_lookup, subscription_cancel,
  subscription_update
- "sales": part_lookup

Tool parameters (use these names, omit anything the customer did not give):
- order_status: orderNo (required), zip
- refund_status: orderNo (required), zip
- part_lookup: partNumber (required), modelNumber, zip
- subscription_lookup: membershipId or phoneNumber
- subscription_cancel: membershipId (required)
- subscription_update: membershipId, update ("frequency" or "quantity"), value

The input may contain "Previous query:" / "Previous response:" blocks followed by
"Current query:". Answer the current query; when it is a bare follow-up (a number,
a zip code, "yes"), resolve it against the previous queries.

Reply with a single JSON object and nothing else:
{"handler": "support", "tool": "order_status", "parameters": {"orderNo": "W174191"}}"#;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible servers (Ollama's `/v1`).
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build classifier HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, model: model.into(), api_key })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: 0.0,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.http.post(url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.context("classifier request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("classifier returned {status}: {body}"));
        }

        let chat: ChatResponse = response.json().await.context("classifier response was not JSON")?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("classifier returned no content"))
    }
}

/// Classifies with a chat model, trusting nothing it says until parsed.
pub struct LlmClassifier<C> {
    llm: C,
}

impl<C> LlmClassifier<C>
where
    C: LlmClient,
{
    pub fn new(llm: C) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl<C> Classifier for LlmClassifier<C>
where
    C: LlmClient,
{
    async fn classify(&self, input: &str) -> Result<Classification, RouterError> {
        let raw = self
            .llm
            .complete(ROUTING_INSTRUCTIONS, input)
            .await
            .map_err(|error| RouterError::Classification(format!("{error:#}")))?;
        debug!(event_name = "classifier.llm.raw", raw = %raw, "llm classification received");
        parse_classification(&raw)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HandlerField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(alias = "handlers", alias = "agent")]
    handler: Option<HandlerField>,
    #[serde(alias = "function")]
    tool: Option<String>,
    #[serde(default, alias = "params", alias = "arguments")]
    parameters: BTreeMap<String, Value>,
}

/// Parses model output into a [`Classification`]. Markdown fences and prose
/// around the JSON object are tolerated.
pub fn parse_classification(raw: &str) -> Result<Classification, RouterError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => {
            return Err(RouterError::Classification(
                "classifier output contained no JSON object".to_string(),
            ))
        }
    };

    let parsed: RawClassification = serde_json::from_str(json).map_err(|error| {
        RouterError::Classification(format!("classifier output was not valid JSON: {error}"))
    })?;

    let handlers = match parsed.handler {
        Some(HandlerField::One(handler)) => vec![handler],
        Some(HandlerField::Many(handlers)) => handlers,
        None => Vec::new(),
    };

    let parameters = parsed
        .parameters
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(text) => Some((name, text)),
            Value::Number(number) => Some((name, number.to_string())),
            Value::Bool(flag) => Some((name, flag.to_string())),
            _ => None,
        })
        .collect::<Parameters>();

    Ok(Classification { handlers, tool: parsed.tool, parameters })
}
