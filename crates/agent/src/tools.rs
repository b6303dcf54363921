//! Static contracts for the six backend operations and request building.
//!
//! [`build_request`] is the only way to obtain a [`ToolRequest`]; it rejects
//! missing or empty required parameters before anything touches the network.

use partsline_core::{
    ParamSpec, Parameters, Payload, ToolContract, ToolError, ToolName, ToolRequest, UpdateKind,
};
use serde_json::Value;

const ORDER_NO: ParamSpec = ParamSpec::new("orderNo", "orderNo");
const ZIP: ParamSpec = ParamSpec::new("zip", "zip");
const PART_NUMBER: ParamSpec = ParamSpec::new("partNumber", "part_number");
const MODEL_NUMBER: ParamSpec = ParamSpec::new("modelNumber", "model-number");
const PHONE_NUMBER: ParamSpec = ParamSpec::new("phoneNumber", "phoneNumber");
const MEMBERSHIP_ID: ParamSpec = ParamSpec::new("membershipId", "membershipId");
const UPDATE: ParamSpec = ParamSpec::new("update", "update");
const VALUE: ParamSpec = ParamSpec::new("value", "value");

pub static ORDER_STATUS: ToolContract = ToolContract {
    name: ToolName::OrderStatus,
    endpoint_path: "/parts/status",
    required: &[ORDER_NO],
    any_of: &[],
    optional: &[ZIP],
};

pub static REFUND_STATUS: ToolContract = ToolContract {
    name: ToolName::RefundStatus,
    endpoint_path: "/parts/refundstatus",
    required: &[ORDER_NO],
    any_of: &[],
    optional: &[ZIP],
};

pub static PART_LOOKUP: ToolContract = ToolContract {
    name: ToolName::PartLookup,
    endpoint_path: "/parts/lookup",
    required: &[PART_NUMBER],
    any_of: &[],
    optional: &[MODEL_NUMBER, ZIP],
};

pub static SUBSCRIPTION_LOOKUP: ToolContract = ToolContract {
    name: ToolName::SubscriptionLookup,
    endpoint_path: "/subscription/lookup",
    required: &[],
    any_of: &[MEMBERSHIP_ID, PHONE_NUMBER],
    optional: &[],
};

pub static SUBSCRIPTION_CANCEL: ToolContract = ToolContract {
    name: ToolName::SubscriptionCancel,
    endpoint_path: "/subscription/cancel",
    required: &[MEMBERSHIP_ID],
    any_of: &[],
    optional: &[],
};

pub static SUBSCRIPTION_UPDATE: ToolContract = ToolContract {
    name: ToolName::SubscriptionUpdate,
    endpoint_path: "/subscription/edit",
    required: &[MEMBERSHIP_ID, UPDATE, VALUE],
    any_of: &[],
    optional: &[],
};

pub fn contract(tool: ToolName) -> &'static ToolContract {
    match tool {
        ToolName::OrderStatus => &ORDER_STATUS,
        ToolName::RefundStatus => &REFUND_STATUS,
        ToolName::PartLookup => &PART_LOOKUP,
        ToolName::SubscriptionLookup => &SUBSCRIPTION_LOOKUP,
        ToolName::SubscriptionCancel => &SUBSCRIPTION_CANCEL,
        ToolName::SubscriptionUpdate => &SUBSCRIPTION_UPDATE,
    }
}

pub fn contracts() -> impl Iterator<Item = &'static ToolContract> {
    ToolName::ALL.into_iter().map(contract)
}

/// Validates `parameters` against the tool's contract and builds its payload.
pub fn build_request(tool: ToolName, parameters: &Parameters) -> Result<ToolRequest, ToolError> {
    let contract = contract(tool);
    let mut payload = Payload::new();

    for field in contract.required {
        if param(parameters, field.name).is_none() {
            return Err(ToolError::validation(format!(
                "{} is required for {}",
                field.name,
                tool.as_str()
            )));
        }
    }

    match tool {
        ToolName::SubscriptionUpdate => {
            insert_present(&mut payload, parameters, &MEMBERSHIP_ID);
            let update = parameters.get(UPDATE.name).map(String::as_str).unwrap_or_default();
            let value = param(parameters, VALUE.name).unwrap_or_default();
            UpdateKind::parse(update, value)?.write_into(&mut payload);
        }
        ToolName::SubscriptionLookup => {
            if !contract.any_of.iter().any(|field| param(parameters, field.name).is_some()) {
                return Err(ToolError::validation(
                    "either membershipId or phoneNumber is required for subscription_lookup",
                ));
            }
            // The backend resolves membershipId first when both are sent.
            for field in contract.any_of {
                insert_present(&mut payload, parameters, field);
            }
        }
        ToolName::OrderStatus
        | ToolName::RefundStatus
        | ToolName::PartLookup
        | ToolName::SubscriptionCancel => {
            for field in contract.required.iter().chain(contract.optional) {
                insert_present(&mut payload, parameters, field);
            }
        }
    }

    Ok(ToolRequest { tool, endpoint_path: contract.endpoint_path, payload })
}

fn param<'a>(parameters: &'a Parameters, name: &str) -> Option<&'a str> {
    parameters.get(name).map(|value| value.trim()).filter(|value| !value.is_empty())
}

// Inserts only when present and non-empty; optional parameters are omitted otherwise.
fn insert_present(payload: &mut Payload, parameters: &Parameters, field: &ParamSpec) {
    if let Some(value) = param(parameters, field.name) {
        payload.insert(field.wire_key.to_string(), Value::String(value.to_string()));
    }
}
