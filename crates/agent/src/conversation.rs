//! Context merging for multi-turn conversations.
//!
//! The classifier only ever sees one string. Prior exchanges are folded into it
//! as labelled blocks so elliptical follow-ups ("8282916880") can be resolved
//! against earlier turns.

use partsline_core::{ConversationContext, Exchange, DEFAULT_HISTORY_LIMIT};

pub const PREVIOUS_QUERY_LABEL: &str = "Previous query: ";
pub const PREVIOUS_RESPONSE_LABEL: &str = "Previous response: ";
pub const CURRENT_QUERY_LABEL: &str = "Current query: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextManager {
    history_limit: usize,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ContextManager {
    pub fn new(history_limit: usize) -> Self {
        Self { history_limit: history_limit.max(1) }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn empty_context(&self) -> ConversationContext {
        ConversationContext::with_capacity(self.history_limit)
    }

    /// Builds the composite classifier input. With no history the query is
    /// returned verbatim.
    pub fn merge(&self, context: &ConversationContext, query: &str) -> String {
        if context.is_empty() {
            return query.to_string();
        }

        let skip = context.len().saturating_sub(self.history_limit);
        let blocks = context
            .exchanges()
            .skip(skip)
            .map(|exchange| {
                format!(
                    "{PREVIOUS_QUERY_LABEL}{}\n{PREVIOUS_RESPONSE_LABEL}{}",
                    exchange.query(),
                    exchange.response()
                )
            })
            .collect::<Vec<_>>();

        format!("{}\n\n{CURRENT_QUERY_LABEL}{query}", blocks.join("\n\n"))
    }

    /// Appends one exchange, evicting the oldest past the history limit.
    pub fn record(
        &self,
        mut context: ConversationContext,
        query: &str,
        response: &str,
    ) -> ConversationContext {
        if context.capacity() != self.history_limit {
            let mut resized = self.empty_context();
            for exchange in context.exchanges() {
                resized.push(exchange.clone());
            }
            context = resized;
        }
        context.push(Exchange::new(query, response));
        context
    }
}

/// A composite input split back into its parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposedInput {
    pub previous: Vec<Exchange>,
    pub current: String,
}

impl ComposedInput {
    pub fn previous_queries(&self) -> impl Iterator<Item = &str> {
        self.previous.iter().rev().map(Exchange::query)
    }
}

/// Inverse of [`ContextManager::merge`]. Input without a current-query label is
/// treated as a bare query.
pub fn parse_composite(input: &str) -> ComposedInput {
    let current_marker = format!("\n\n{CURRENT_QUERY_LABEL}");
    let (history, current) = match input.rfind(&current_marker) {
        Some(index) => (&input[..index], &input[index + current_marker.len()..]),
        None => match input.strip_prefix(CURRENT_QUERY_LABEL) {
            Some(current) => ("", current),
            None => ("", input),
        },
    };

    let previous = history
        .split(PREVIOUS_QUERY_LABEL)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| match block.split_once(&format!("\n{PREVIOUS_RESPONSE_LABEL}")) {
            Some((query, response)) => Exchange::new(query.trim(), response.trim()),
            None => Exchange::new(block, ""),
        })
        .collect();

    ComposedInput { previous, current: current.trim().to_string() }
}
