//! The Graphmaster: a trie of pattern paths searched with fixed precedence.
//!
//! At every node the search tries, in order: the priority-exact child (`$WORD`),
//! the priority wildcards (`#`, then `_`), the literal child, the set children
//! in insertion order, and finally the weak wildcards (`^`, then `*`). The
//! first branch that reaches a template wins; there is no ranking of complete
//! matches. A node owning a template matches immediately when the key is
//! exhausted, before any zero-width wildcard is tried.

use core::hash::BuildHasherDefault;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use seahash::SeaHasher;
use tracing::{debug, warn};

use crate::error::{GraphmasterError, Result};
use crate::sets::SetLookup;
use crate::template::Template;
use crate::token::{self, Segment, Token, Wildcard};

pub type OtherHasher = BuildHasherDefault<SeaHasher>;

// ------------- Watch -------------
/// Per-sentence stopwatch, polled cooperatively.
#[derive(Debug, Clone, Copy)]
pub struct Watch {
    started: Instant,
    limit: Duration,
}
impl Watch {
    pub fn start(limit: Duration) -> Self {
        Self { started: Instant::now(), limit }
    }
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
    pub fn check(&self) -> Result<()> {
        let elapsed = self.started.elapsed();
        if elapsed > self.limit {
            return Err(GraphmasterError::Timeout { elapsed_ms: elapsed.as_millis() });
        }
        Ok(())
    }
}

// ------------- Stars -------------
/// Captured wildcard text for the three segments, in pattern order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stars {
    pub message: Vec<String>,
    pub that: Vec<String>,
    pub topic: Vec<String>,
}
impl Stars {
    pub fn segment(&self, segment: Segment) -> &[String] {
        match segment {
            Segment::Message => &self.message,
            Segment::That => &self.that,
            Segment::Topic => &self.topic,
        }
    }
    fn segment_mut(&mut self, segment: Segment) -> &mut Vec<String> {
        match segment {
            Segment::Message => &mut self.message,
            Segment::That => &mut self.that,
            Segment::Topic => &mut self.topic,
        }
    }
    /// 1-based capture lookup.
    pub fn get(&self, segment: Segment, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.segment(segment).get(i))
            .map(String::as_str)
    }
    fn reserve(&mut self, segment: Segment) -> usize {
        let captures = self.segment_mut(segment);
        captures.push(String::new());
        captures.len() - 1
    }
    fn fill(&mut self, segment: Segment, slot: usize, text: String) {
        self.segment_mut(segment)[slot] = text;
    }
    fn release(&mut self, segment: Segment, slot: usize) {
        let captures = self.segment_mut(segment);
        debug_assert_eq!(captures.len(), slot + 1, "unbalanced capture reservation");
        captures.truncate(slot);
    }
}

// ------------- Leaf -------------
#[derive(Debug, Clone)]
pub struct Leaf {
    template: Arc<Template>,
    pattern: String,
}
impl Leaf {
    pub fn template(&self) -> Arc<Template> {
        Arc::clone(&self.template)
    }
    /// The path this template was stored under, as pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// A successful search.
#[derive(Debug, Clone)]
pub struct Match {
    pub template: Arc<Template>,
    pub stars: Stars,
    pub pattern: String,
}

// ------------- Node -------------
#[derive(Debug, Default)]
pub struct Node {
    words: HashMap<String, Node, OtherHasher>,
    exact: HashMap<String, Node, OtherHasher>,
    wildcards: [Option<Box<Node>>; 4],
    sets: Vec<(String, Node)>,
    next_segment: Option<Box<Node>>,
    leaf: Option<Leaf>,
}
impl Node {
    fn child_mut(&mut self, token: &Token) -> &mut Node {
        match token {
            Token::Word(w) => self.words.entry(w.clone()).or_default(),
            Token::Exact(w) => self.exact.entry(w.clone()).or_default(),
            Token::Wildcard(w) => self.wildcards[w.slot()].get_or_insert_with(Box::default),
            Token::Separator(_) => self.next_segment.get_or_insert_with(Box::default),
            Token::Set(name) => {
                let position = match self.sets.iter().position(|(n, _)| n == name) {
                    Some(p) => p,
                    None => {
                        self.sets.push((name.clone(), Node::default()));
                        self.sets.len() - 1
                    }
                };
                &mut self.sets[position].1
            }
        }
    }
    fn wildcard(&self, wildcard: Wildcard) -> Option<&Node> {
        self.wildcards[wildcard.slot()].as_deref()
    }
}

// ------------- Graphmaster -------------
#[derive(Debug, Default)]
pub struct Graphmaster {
    root: Node,
    categories: usize,
    vocabulary: HashSet<String, OtherHasher>,
}

impl Graphmaster {
    pub fn new() -> Self {
        Self::default()
    }
    /// Stores `template` under `path`, returning the template it displaced.
    pub fn insert(&mut self, path: &[Token], template: Arc<Template>) -> Result<Option<Arc<Template>>> {
        token::check_shape(path)?;
        let pattern = token::render(path);
        let mut node = &mut self.root;
        for token in path {
            match token {
                Token::Word(w) | Token::Exact(w) => {
                    self.vocabulary.insert(w.clone());
                }
                _ => (),
            }
            node = node.child_mut(token);
        }
        let displaced = node.leaf.replace(Leaf { template, pattern: pattern.clone() });
        match displaced {
            Some(previous) => {
                warn!(%pattern, "duplicate category replaced");
                Ok(Some(previous.template))
            }
            None => {
                self.categories += 1;
                Ok(None)
            }
        }
    }
    pub fn len(&self) -> usize {
        self.categories
    }
    pub fn is_empty(&self) -> bool {
        self.categories == 0
    }
    pub fn vocabulary(&self) -> usize {
        self.vocabulary.len()
    }
    /// Finds the template for a search key of shape `message <THAT> that <TOPIC> topic`.
    pub fn search(&self, key: &[Token], sets: &dyn SetLookup, watch: &Watch) -> Result<Option<Match>> {
        token::check_shape(key)?;
        let mut search = Search { key, sets, watch, stars: Stars::default() };
        let found = search.descend(&self.root, 0, Segment::Message)?;
        Ok(found.map(|leaf| {
            debug!(pattern = %leaf.pattern, "matched");
            Match { template: leaf.template(), stars: search.stars, pattern: leaf.pattern.clone() }
        }))
    }
    /// Convenience search composing the key from the three segments.
    pub fn search_words(
        &self,
        message: &[Token],
        that: &[Token],
        topic: &[Token],
        sets: &dyn SetLookup,
        watch: &Watch,
    ) -> Result<Option<Match>> {
        let mut key = message.to_vec();
        key.push(Token::Separator(Segment::That));
        key.extend_from_slice(that);
        key.push(Token::Separator(Segment::Topic));
        key.extend_from_slice(topic);
        self.search(&key, sets, watch)
    }
}

impl fmt::Display for Graphmaster {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Graphmaster({} categories, {} words)", self.categories, self.vocabulary.len())
    }
}

struct Search<'g> {
    key: &'g [Token],
    sets: &'g dyn SetLookup,
    watch: &'g Watch,
    stars: Stars,
}

impl<'g> Search<'g> {
    fn descend(&mut self, node: &'g Node, position: usize, segment: Segment) -> Result<Option<&'g Leaf>> {
        self.watch.check()?;
        let key = self.key;
        let current = key.get(position);
        if current.is_none() {
            if let Some(leaf) = &node.leaf {
                return Ok(Some(leaf));
            }
        }
        if let Some(Token::Word(w)) = current {
            if let Some(child) = node.exact.get(w) {
                if let Some(leaf) = self.descend(child, position + 1, segment)? {
                    return Ok(Some(leaf));
                }
            }
        }
        for wildcard in [Wildcard::PriorityZeroOrMore, Wildcard::PriorityOneOrMore] {
            if let Some(leaf) = self.wildcard(node, wildcard, position, segment)? {
                return Ok(Some(leaf));
            }
        }
        match current {
            Some(Token::Word(w)) => {
                if let Some(child) = node.words.get(w) {
                    if let Some(leaf) = self.descend(child, position + 1, segment)? {
                        return Ok(Some(leaf));
                    }
                }
            }
            Some(Token::Separator(next)) => {
                if let Some(child) = node.next_segment.as_deref() {
                    if let Some(leaf) = self.descend(child, position + 1, *next)? {
                        return Ok(Some(leaf));
                    }
                }
            }
            _ => (),
        }
        if let Some(leaf) = self.named_sets(node, position, segment)? {
            return Ok(Some(leaf));
        }
        for wildcard in [Wildcard::WeakZeroOrMore, Wildcard::WeakOneOrMore] {
            if let Some(leaf) = self.wildcard(node, wildcard, position, segment)? {
                return Ok(Some(leaf));
            }
        }
        Ok(None)
    }

    /// Shortest-first consumption within the current segment.
    fn wildcard(
        &mut self,
        node: &'g Node,
        wildcard: Wildcard,
        position: usize,
        segment: Segment,
    ) -> Result<Option<&'g Leaf>> {
        let Some(child) = node.wildcard(wildcard) else {
            return Ok(None);
        };
        let end = self.segment_end(position);
        let minimum = wildcard.minimum();
        if end - position < minimum {
            return Ok(None);
        }
        let slot = self.stars.reserve(segment);
        for stop in position + minimum..=end {
            if let Some(leaf) = self.descend(child, stop, segment)? {
                let captured = self.join(position, stop);
                self.stars.fill(segment, slot, captured);
                return Ok(Some(leaf));
            }
        }
        self.stars.release(segment, slot);
        Ok(None)
    }

    /// Set children in insertion order; within a set the longest member
    /// whose continuation matches wins.
    fn named_sets(&mut self, node: &'g Node, position: usize, segment: Segment) -> Result<Option<&'g Leaf>> {
        if node.sets.is_empty() {
            return Ok(None);
        }
        let end = self.segment_end(position);
        for (name, child) in &node.sets {
            let Some(longest) = self.sets.max_length(name) else {
                continue;
            };
            let mut phrase = String::new();
            let mut lengths = Vec::new();
            for length in 1..=longest.min(end - position) {
                if length > 1 {
                    phrase.push(' ');
                }
                phrase.push_str(self.key[position + length - 1].word().unwrap_or_default());
                if self.sets.contains(name, &phrase) {
                    lengths.push(length);
                }
            }
            if lengths.is_empty() {
                continue;
            }
            let slot = self.stars.reserve(segment);
            for &length in lengths.iter().rev() {
                if let Some(leaf) = self.descend(child, position + length, segment)? {
                    let captured = self.join(position, position + length);
                    self.stars.fill(segment, slot, captured);
                    return Ok(Some(leaf));
                }
            }
            self.stars.release(segment, slot);
        }
        Ok(None)
    }

    fn segment_end(&self, position: usize) -> usize {
        self.key[position.min(self.key.len())..]
            .iter()
            .position(|t| matches!(t, Token::Separator(_)))
            .map(|offset| position + offset)
            .unwrap_or(self.key.len())
    }

    fn join(&self, from: usize, to: usize) -> String {
        self.key[from..to]
            .iter()
            .filter_map(Token::word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}
