//! Per-user conversation state.

use std::collections::{HashMap, VecDeque};

use crate::config::Settings;
use crate::graphmaster::{Graphmaster, OtherHasher};

pub const TOPIC: &str = "topic";

/// Bounded, most-recent-first history with 1-based indexing.
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}
impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::new(), capacity: capacity.max(1) }
    }
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }
    /// `index` 1 is the most recent item.
    pub fn get(&self, index: usize) -> Option<&T> {
        index.checked_sub(1).and_then(|i| self.items.get(i))
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug)]
pub struct Session {
    id: String,
    pub predicates: HashMap<String, String, OtherHasher>,
    /// Categories learned during this session only.
    pub graph: Graphmaster,
    /// Input sentences.
    pub inputs: History<String>,
    /// Whole requests.
    pub requests: History<String>,
    /// Whole responses.
    pub responses: History<String>,
    /// Sentences of each response, most recent response first.
    pub thats: History<Vec<String>>,
    /// Patterns matched while answering the latest request.
    pub trace: Vec<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, settings: &Settings) -> Self {
        Self {
            id: id.into(),
            predicates: HashMap::default(),
            graph: Graphmaster::new(),
            inputs: History::new(settings.max_history),
            requests: History::new(settings.max_history),
            responses: History::new(settings.max_history),
            thats: History::new(settings.max_history),
            trace: Vec::new(),
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn predicate(&self, name: &str) -> Option<&str> {
        self.predicates.get(&name.to_lowercase()).map(String::as_str)
    }
    pub fn set_predicate(&mut self, name: &str, value: impl Into<String>) {
        self.predicates.insert(name.to_lowercase(), value.into());
    }
    pub fn topic<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.predicate(TOPIC)
            .filter(|topic| !topic.trim().is_empty())
            .unwrap_or(&settings.default_topic)
    }
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.set_predicate(TOPIC, topic);
    }
    /// The last sentence of the previous response.
    pub fn that<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.thats
            .get(1)
            .and_then(|sentences| sentences.last())
            .map(String::as_str)
            .unwrap_or(&settings.default_that)
    }
}
