use partsline_agent::tools::contracts;
use partsline_core::{ParamSpec, ToolContract};

use super::CommandResult;

pub fn run() -> CommandResult {
    let mut lines = vec!["tools (handler, endpoint, parameters):".to_string()];
    lines.extend(contracts().map(render_contract));
    CommandResult::text(0, lines.join("\n"))
}

fn render_contract(contract: &ToolContract) -> String {
    let mut parts = vec![format!(
        "- {} [{}] POST {}",
        contract.name.as_str(),
        contract.handler().as_str(),
        contract.endpoint_path
    )];
    if !contract.required.is_empty() {
        parts.push(format!("required: {}", names(contract.required)));
    }
    if !contract.any_of.is_empty() {
        parts.push(format!("one of: {}", names(contract.any_of)));
    }
    if !contract.optional.is_empty() {
        parts.push(format!("optional: {}", names(contract.optional)));
    }
    parts.join("; ")
}

fn names(specs: &[ParamSpec]) -> String {
    specs.iter().map(|spec| spec.name).collect::<Vec<_>>().join(", ")
}
