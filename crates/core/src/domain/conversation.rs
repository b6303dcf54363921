use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// One completed (query, response) round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    query: String,
    response: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self { query: query.into(), response: response.into() }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn response(&self) -> &str {
        &self.response
    }
}

/// Bounded, oldest-first history of a single conversation.
///
/// Appending past `capacity` evicts the oldest exchange, so the context never
/// holds more than `capacity` entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationContext {
    capacity: usize,
    exchanges: VecDeque<Exchange>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_LIMIT)
    }
}

impl ConversationContext {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, exchanges: VecDeque::with_capacity(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.iter()
    }

    pub fn latest(&self) -> Option<&Exchange> {
        self.exchanges.back()
    }

    pub fn push(&mut self, exchange: Exchange) {
        while self.exchanges.len() >= self.capacity {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(exchange);
    }
}
