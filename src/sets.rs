//! Named sets (pattern vocabulary) and maps (template lookup tables).

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::Settings;
use crate::graphmaster::OtherHasher;

/// What the trie search needs to know about sets.
pub trait SetLookup {
    /// Number of words in the longest member, `None` for an unknown set.
    fn max_length(&self, name: &str) -> Option<usize>;
    /// Membership of an already case-folded, single-spaced phrase.
    fn contains(&self, name: &str, phrase: &str) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct WordSet {
    members: HashSet<String, OtherHasher>,
    max_length: usize,
}
impl WordSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, folded_phrase: &str) {
        let phrase = folded_phrase.split_whitespace().collect::<Vec<_>>();
        if phrase.is_empty() {
            return;
        }
        self.max_length = self.max_length.max(phrase.len());
        self.members.insert(phrase.join(" "));
    }
    pub fn contains(&self, phrase: &str) -> bool {
        self.members.contains(phrase)
    }
    pub fn max_length(&self) -> usize {
        self.max_length
    }
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

pub const NUMBER_SET: &str = "number";

/// Sets keyed by lowercase name, plus the built-in `number` set.
#[derive(Debug, Default)]
pub struct Sets {
    kept: HashMap<String, WordSet, OtherHasher>,
}
impl Sets {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add<I, S>(&mut self, name: &str, members: I, settings: &Settings)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = self.kept.entry(name.to_lowercase()).or_default();
        for member in members {
            set.insert(&settings.fold(member.as_ref()));
        }
    }
    pub fn get(&self, name: &str) -> Option<&WordSet> {
        self.kept.get(&name.to_lowercase())
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl SetLookup for Sets {
    fn max_length(&self, name: &str) -> Option<usize> {
        match self.kept.get(name) {
            Some(set) => Some(set.max_length()),
            None if name == NUMBER_SET => Some(1),
            None => {
                debug!(set = name, "unknown set in pattern");
                None
            }
        }
    }
    fn contains(&self, name: &str, phrase: &str) -> bool {
        match self.kept.get(name) {
            Some(set) => set.contains(phrase),
            None => name == NUMBER_SET && !phrase.is_empty() && phrase.chars().all(|c| c.is_ascii_digit()),
        }
    }
}

pub const SUCCESSOR_MAP: &str = "successor";
pub const PREDECESSOR_MAP: &str = "predecessor";

/// Maps keyed by lowercase name; keys are case-folded. `successor` and
/// `predecessor` are computed unless a map of that name was added.
#[derive(Debug, Default)]
pub struct Maps {
    kept: HashMap<String, HashMap<String, String, OtherHasher>, OtherHasher>,
}
impl Maps {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add<I, K, V>(&mut self, name: &str, entries: I, settings: &Settings)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let map = self.kept.entry(name.to_lowercase()).or_default();
        for (key, value) in entries {
            let key = settings.fold(key.as_ref()).split_whitespace().collect::<Vec<_>>().join(" ");
            map.insert(key, value.into());
        }
    }
    pub fn lookup(&self, name: &str, key: &str, settings: &Settings) -> Option<String> {
        let name = name.to_lowercase();
        let folded = settings.fold(key).split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(map) = self.kept.get(&name) {
            return map.get(&folded).cloned();
        }
        let number = folded.parse::<i64>().ok()?;
        match name.as_str() {
            SUCCESSOR_MAP => number.checked_add(1).map(|n| n.to_string()),
            PREDECESSOR_MAP => number.checked_sub(1).map(|n| n.to_string()),
            _ => None,
        }
    }
}
