use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::tool::ToolName;
use crate::errors::RouterError;

/// Parameters extracted from conversation text, keyed by canonical camelCase name.
pub type Parameters = BTreeMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerTag {
    Support,
    Sales,
}

impl HandlerTag {
    pub const ALL: [HandlerTag; 2] = [HandlerTag::Support, HandlerTag::Sales];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Sales => "sales",
        }
    }
}

impl fmt::Display for HandlerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerTag {
    type Err = RouterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "support" | "parts_support" | "parts_support_tool" | "partssupportagent" => {
                Ok(Self::Support)
            }
            "sales" | "parts_sales" | "parts_sales_tool" | "partssalesagent" => Ok(Self::Sales),
            other => Err(RouterError::Routing(format!("unrecognized handler tag `{other}`"))),
        }
    }
}

/// A structurally valid routing decision: exactly one handler, one tool it owns,
/// and the parameters extracted for that tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub handler: HandlerTag,
    pub tool: ToolName,
    pub parameters: Parameters,
}

impl RouteDecision {
    pub fn new(handler: HandlerTag, tool: ToolName, parameters: Parameters) -> Self {
        Self { handler, tool, parameters }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}
