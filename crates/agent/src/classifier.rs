use async_trait::async_trait;
use partsline_core::{HandlerTag, Parameters, RouterError, ToolName};
use serde::{Deserialize, Serialize};

use crate::conversation::parse_composite;

/// Raw classifier output. Nothing here is trusted until the router resolves it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub handlers: Vec<String>,
    pub tool: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Classification {
    pub fn single(handler: HandlerTag, tool: ToolName, parameters: Parameters) -> Self {
        Self {
            handlers: vec![handler.as_str().to_string()],
            tool: Some(tool.as_str().to_string()),
            parameters,
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, input: &str) -> Result<Classification, RouterError>;
}

/// Deterministic keyword classifier for offline use and tests.
#[derive(Clone, Debug, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify_text(&self, input: &str) -> Result<Classification, RouterError> {
        let composed = parse_composite(input);
        let current = tokenize(&composed.current);
        let history = composed.previous_queries().map(tokenize).collect::<Vec<_>>();

        let intent = detect_intent(&current)
            .or_else(|| history.iter().find_map(|tokens| detect_intent(tokens)))
            .ok_or_else(|| {
                RouterError::Classification(format!(
                    "no recognizable request in `{}`",
                    composed.current
                ))
            })?;

        let mut parameters = extract_parameters(&current, intent);
        for tokens in &history {
            let compatible =
                detect_intent(tokens).map_or(true, |other| family(other) == family(intent));
            if compatible {
                fill_missing(&mut parameters, extract_parameters(tokens, intent));
            }
        }

        Ok(Classification::single(intent.handler(), intent, parameters))
    }
}

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, input: &str) -> Result<Classification, RouterError> {
        self.classify_text(input)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Token {
    raw: String,
    lower: String,
}

const FILLER: &[&str] = &["number", "no", "num", "id", "is", "of", "the", "my", "code", "for"];
const ORDER_KEYS: &[&str] = &["order", "orderno", "ordernumber"];
const ZIP_KEYS: &[&str] = &["zip", "zipcode", "postal"];
const PART_KEYS: &[&str] = &["part", "partno", "partnumber"];
const MODEL_KEYS: &[&str] = &["model", "modelno", "modelnumber"];
const PHONE_KEYS: &[&str] = &["phone", "phonenumber", "mobile", "cell", "telephone"];
const MEMBERSHIP_KEYS: &[&str] =
    &["membership", "member", "membershipid", "subscription", "account"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Family {
    Orders,
    Parts,
    Subscriptions,
}

fn family(tool: ToolName) -> Family {
    match tool {
        ToolName::OrderStatus | ToolName::RefundStatus => Family::Orders,
        ToolName::PartLookup => Family::Parts,
        ToolName::SubscriptionLookup
        | ToolName::SubscriptionCancel
        | ToolName::SubscriptionUpdate => Family::Subscriptions,
    }
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_ascii_alphanumeric() || matches!(character, '-' | '(' | ')') {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized
        .split_whitespace()
        .map(|word| word.trim_matches('-'))
        .filter(|word| !word.is_empty())
        .map(|word| Token { raw: word.to_string(), lower: word.to_ascii_lowercase() })
        .collect()
}

fn mentions(tokens: &[Token], stems: &[&str]) -> bool {
    tokens.iter().any(|token| stems.iter().any(|stem| token.lower.starts_with(stem)))
}

fn detect_intent(tokens: &[Token]) -> Option<ToolName> {
    if mentions(tokens, &["refund"]) {
        return Some(ToolName::RefundStatus);
    }
    if mentions(tokens, &["subscri", "membership"]) {
        if mentions(tokens, &["cancel", "unsubscri", "stop"]) {
            return Some(ToolName::SubscriptionCancel);
        }
        if mentions(tokens, &["updat", "chang", "modif", "edit", "frequen", "quantit", "switch"]) {
            return Some(ToolName::SubscriptionUpdate);
        }
        return Some(ToolName::SubscriptionLookup);
    }

    let has_order_number = tokens.iter().any(|token| is_order_number(&token.raw));
    let order_words = mentions(tokens, &["order", "track", "deliver", "shipment"]);
    let status_words = mentions(tokens, &["status", "track", "where"]);
    let part_words =
        mentions(tokens, &["part", "compatib", "model", "fit", "ship", "price", "detail"]);

    if order_words && (!part_words || has_order_number || status_words) {
        return Some(ToolName::OrderStatus);
    }
    if part_words {
        return Some(ToolName::PartLookup);
    }
    if has_order_number {
        return Some(ToolName::OrderStatus);
    }
    None
}

fn extract_parameters(tokens: &[Token], intent: ToolName) -> Parameters {
    let mut parameters = Parameters::new();
    match family(intent) {
        Family::Orders => {
            let order_no = value_after(tokens, ORDER_KEYS, has_digit)
                .or_else(|| first_match(tokens, |raw| is_order_number(raw)));
            let zip = value_after(tokens, ZIP_KEYS, is_zip).or_else(|| {
                first_match(tokens, |raw| is_zip(raw) && Some(raw) != order_no.as_deref())
            });
            insert(&mut parameters, "orderNo", order_no);
            insert(&mut parameters, "zip", zip);
        }
        Family::Parts => {
            let model = value_after(tokens, MODEL_KEYS, has_digit);
            let mut zip_keys = ZIP_KEYS.to_vec();
            zip_keys.push("to");
            let zip = value_after(tokens, &zip_keys, is_zip);
            let part = value_after(tokens, PART_KEYS, has_digit)
                .or_else(|| value_before(tokens, &["compatib", "fit", "work"], has_digit))
                .or_else(|| {
                    first_match(tokens, |raw| {
                        has_digit(raw)
                            && Some(raw) != model.as_deref()
                            && Some(raw) != zip.as_deref()
                    })
                });
            insert(&mut parameters, "partNumber", part);
            insert(&mut parameters, "modelNumber", model);
            insert(&mut parameters, "zip", zip);
        }
        Family::Subscriptions => {
            let phone = value_after(tokens, PHONE_KEYS, |raw| digit_count(raw) >= 10)
                .or_else(|| phone_like(tokens));
            let membership = value_after(tokens, MEMBERSHIP_KEYS, is_membership_id).or_else(|| {
                first_match(tokens, |raw| {
                    raw.len() == 10 && is_membership_id(raw) && Some(raw) != phone.as_deref()
                })
            });
            insert(&mut parameters, "phoneNumber", phone);
            insert(&mut parameters, "membershipId", membership.clone());

            if intent == ToolName::SubscriptionUpdate {
                let update = if mentions(tokens, &["frequen"]) {
                    Some("frequency".to_string())
                } else if mentions(tokens, &["quantit", "qty"]) {
                    Some("quantity".to_string())
                } else {
                    None
                };
                let value = value_after(tokens, &["to"], |raw| {
                    has_digit(raw) && Some(raw) != membership.as_deref()
                });
                insert(&mut parameters, "update", update);
                insert(&mut parameters, "value", value);
            }
        }
    }
    parameters
}

fn fill_missing(parameters: &mut Parameters, earlier: Parameters) {
    let has_identifier =
        parameters.contains_key("membershipId") || parameters.contains_key("phoneNumber");
    for (name, value) in earlier {
        if has_identifier && matches!(name.as_str(), "membershipId" | "phoneNumber") {
            continue;
        }
        parameters.entry(name).or_insert(value);
    }
}

fn insert(parameters: &mut Parameters, name: &str, value: Option<String>) {
    if let Some(value) = value {
        parameters.insert(name.to_string(), value);
    }
}

fn value_after(tokens: &[Token], keys: &[&str], accept: impl Fn(&str) -> bool) -> Option<String> {
    for (index, token) in tokens.iter().enumerate() {
        if !keys.contains(&token.lower.as_str()) {
            continue;
        }
        for next in tokens.iter().skip(index + 1).take(3) {
            if FILLER.contains(&next.lower.as_str()) {
                continue;
            }
            if accept(&next.raw) {
                return Some(next.raw.clone());
            }
            break;
        }
    }
    None
}

fn value_before(tokens: &[Token], stems: &[&str], accept: impl Fn(&str) -> bool) -> Option<String> {
    tokens.windows(2).find_map(|pair| {
        let follows = stems.iter().any(|stem| pair[1].lower.starts_with(stem));
        (follows && accept(&pair[0].raw)).then(|| pair[0].raw.clone())
    })
}

fn first_match(tokens: &[Token], accept: impl Fn(&str) -> bool) -> Option<String> {
    tokens.iter().find(|token| accept(&token.raw)).map(|token| token.raw.clone())
}

fn phone_like(tokens: &[Token]) -> Option<String> {
    for (index, token) in tokens.iter().enumerate() {
        if is_formatted_phone(&token.raw) {
            return Some(token.raw.clone());
        }
        // "(512) 709-1519" tokenizes as two words
        if let Some(next) = tokens.get(index + 1) {
            let joined = format!("{} {}", token.raw, next.raw);
            if token.raw.starts_with('(') && is_formatted_phone(&joined) {
                return Some(joined);
            }
        }
    }
    None
}

fn has_digit(raw: &str) -> bool {
    raw.chars().any(|character| character.is_ascii_digit())
}

fn digit_count(raw: &str) -> usize {
    raw.chars().filter(char::is_ascii_digit).count()
}

fn is_order_number(raw: &str) -> bool {
    let mut chars = raw.chars();
    let leads_with_letter = chars.next().is_some_and(|first| first.is_ascii_alphabetic());
    leads_with_letter && raw.len() >= 5 && chars.all(|character| character.is_ascii_digit())
}

fn is_zip(raw: &str) -> bool {
    let (head, tail) = raw.split_once('-').unwrap_or((raw, ""));
    let digits =
        |part: &str, len: usize| part.len() == len && part.chars().all(|c| c.is_ascii_digit());
    digits(head, 5) && (tail.is_empty() || digits(tail, 4))
}

fn is_membership_id(raw: &str) -> bool {
    raw.len() >= 6 && raw.chars().all(|character| character.is_ascii_digit())
}

fn is_formatted_phone(raw: &str) -> bool {
    let separated = raw.chars().any(|character| matches!(character, '-' | '(' | ')' | ' '));
    let allowed = raw
        .chars()
        .all(|character| character.is_ascii_digit() || matches!(character, '-' | '(' | ')' | ' '));
    let digits = digit_count(raw);
    separated && allowed && (digits == 10 || (digits == 11 && raw.starts_with('1')))
}

#[cfg(test)]
mod tests {
    use partsline_core::{Parameters, RouterError, ToolName};

    use super::{Classification, RuleClassifier};

    fn classify(input: &str) -> Result<Classification, RouterError> {
        RuleClassifier::new().classify_text(input)
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
    }

    fn assert_routes(input: &str, handler: &str, tool: ToolName, pairs: &[(&str, &str)]) {
        let classification = match classify(input) {
            Ok(classification) => classification,
            Err(error) => panic!("`{input}` should classify: {error}"),
        };
        assert_eq!(classification.handlers, vec![handler.to_string()], "input: {input}");
        assert_eq!(classification.tool.as_deref(), Some(tool.as_str()), "input: {input}");
        assert_eq!(classification.parameters, params(pairs), "input: {input}");
    }

    #[test]
    fn order_status_with_zip() {
        assert_routes(
            "Check order status for order W174191 with zip 20020",
            "support",
            ToolName::OrderStatus,
            &[("orderNo", "W174191"), ("zip", "20020")],
        );
    }

    #[test]
    fn refund_status_without_zip() {
        assert_routes(
            "What's the refund status for order #E001861?",
            "support",
            ToolName::RefundStatus,
            &[("orderNo", "E001861")],
        );
    }

    #[test]
    fn compatibility_question_goes_to_sales() {
        assert_routes(
            "1366 compatible with model 3352573",
            "sales",
            ToolName::PartLookup,
            &[("partNumber", "1366"), ("modelNumber", "3352573")],
        );
        assert_routes(
            "Need part details for part number 1-17548-006",
            "sales",
            ToolName::PartLookup,
            &[("partNumber", "1-17548-006")],
        );
    }

    #[test]
    fn shipping_question_picks_up_destination_zip() {
        assert_routes(
            "What are the shipping options for part 1366 to 90210?",
            "sales",
            ToolName::PartLookup,
            &[("partNumber", "1366"), ("zip", "90210")],
        );
    }

    #[test]
    fn subscription_lookup_by_phone() {
        assert_routes(
            "Can you look up my subscription? My phone is 512-709-1519",
            "support",
            ToolName::SubscriptionLookup,
            &[("phoneNumber", "512-709-1519")],
        );
        assert_routes(
            "Find my subscription, phone (512) 709-1519",
            "support",
            ToolName::SubscriptionLookup,
            &[("phoneNumber", "(512) 709-1519")],
        );
    }

    #[test]
    fn cancel_and_update_subscription() {
        assert_routes(
            "Please cancel my subscription 2237407160",
            "support",
            ToolName::SubscriptionCancel,
            &[("membershipId", "2237407160")],
        );
        assert_routes(
            "Change the frequency of membership 8282916880 to 6",
            "support",
            ToolName::SubscriptionUpdate,
            &[("membershipId", "8282916880"), ("update", "frequency"), ("value", "6")],
        );
    }

    #[test]
    fn elliptical_follow_up_inherits_previous_intent() {
        assert_routes(
            "Previous query: I want to look up my subscription\n\
             Previous response: Please share your membership ID or phone number.\n\n\
             Current query: 8282916880",
            "support",
            ToolName::SubscriptionLookup,
            &[("membershipId", "8282916880")],
        );
    }

    #[test]
    fn follow_up_fills_parameters_from_earlier_turns() {
        assert_routes(
            "Previous query: Where is order W174191?\n\
             Previous response: order_status (404): Please provide a zip code.\n\n\
             Current query: 60179",
            "support",
            ToolName::OrderStatus,
            &[("orderNo", "W174191"), ("zip", "60179")],
        );
        assert_routes(
            "Previous query: Where is order W174191?\n\
             Previous response: order_status (200): Shipped\n\n\
             Current query: and what about the refund?",
            "support",
            ToolName::RefundStatus,
            &[("orderNo", "W174191")],
        );
    }

    #[test]
    fn unrelated_history_is_not_merged() {
        assert_routes(
            "Previous query: Where is order W174191 zip 60179?\n\
             Previous response: order_status (200): Shipped\n\n\
             Current query: Is part 1366 compatible with model 3352573?",
            "sales",
            ToolName::PartLookup,
            &[("partNumber", "1366"), ("modelNumber", "3352573")],
        );
    }

    #[test]
    fn chit_chat_is_a_classification_failure() {
        assert!(matches!(classify("hello there"), Err(RouterError::Classification(_))));
        assert!(matches!(classify(""), Err(RouterError::Classification(_))));
    }
}
