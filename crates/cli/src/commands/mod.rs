pub mod ask;
pub mod chat;
pub mod config;
pub mod tools;

use anyhow::{Context, Result};
use partsline_agent::Router;
use partsline_core::config::{AppConfig, ConfigError, LoadOptions};
use serde::Serialize;

use crate::logging;

pub const EXIT_TOOL_ERROR: u8 = 1;
pub const EXIT_ROUTING_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn text(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }

    pub fn json(exit_code: u8, payload: &impl Serialize) -> Self {
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: &impl Serialize) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\
             \"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, installs logging and builds the router. Every failure here
/// exits with [`EXIT_CONFIG_ERROR`].
pub(crate) fn prepare(options: LoadOptions) -> Result<(AppConfig, Router)> {
    let config = AppConfig::load(options).context("configuration is invalid")?;
    logging::init(&config.logging)?;
    let router = Router::from_config(&config)?;
    Ok((config, router))
}

pub(crate) fn startup_failure(command: &str, error: &anyhow::Error) -> CommandResult {
    let error_class =
        if error.downcast_ref::<ConfigError>().is_some() { "config_validation" } else { "startup" };
    CommandResult::failure(command, error_class, format!("{error:#}"), EXIT_CONFIG_ERROR)
}
