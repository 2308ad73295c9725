use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::Hash;

// triples are identified by integers so that candidate sets can be intersected as bitmaps
use roaring::RoaringTreemap;
use tracing::debug;

use crate::config::Settings;
use crate::error::{GraphmasterError, Result};
use crate::graphmaster::OtherHasher;

// ------------- Key -------------
pub type Key = u64;

pub const GENESIS: Key = 0;

/// Hands out stable keys; a key is never reused once its triple is removed.
#[derive(Debug)]
pub struct KeyGenerator {
    lower_bound: Key,
}
impl KeyGenerator {
    pub fn new() -> Self {
        Self { lower_bound: GENESIS }
    }
    pub fn generate(&mut self) -> Key {
        self.lower_bound += 1;
        self.lower_bound
    }
}
impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Triple -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    key: Key,
    subject: String,
    predicate: String,
    object: String,
}
impl Triple {
    pub fn key(&self) -> Key {
        self.key
    }
    pub fn subject(&self) -> &str {
        &self.subject
    }
    pub fn predicate(&self) -> &str {
        &self.predicate
    }
    pub fn object(&self) -> &str {
        &self.object
    }
}
impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.subject, self.predicate, self.object)
    }
}

// ------------- Clause -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Value(String),
    Variable(String),
}
impl Term {
    pub fn parse(text: &str, settings: &Settings) -> Self {
        let text = text.trim();
        if settings.is_variable(text) {
            Term::Variable(text.to_string())
        } else {
            Term::Value(text.to_string())
        }
    }
    pub fn variable(&self) -> Option<&str> {
        match self {
            Term::Variable(v) => Some(v),
            Term::Value(_) => None,
        }
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Value(v) | Term::Variable(v) => write!(f, "{}", v),
        }
    }
}

/// One conjunct of a query; a negated clause must match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub affirmative: bool,
}
impl Clause {
    pub fn new(subject: Term, predicate: Term, object: Term, affirmative: bool) -> Self {
        Self { subject, predicate, object, affirmative }
    }
    pub fn parse(subject: &str, predicate: &str, object: &str, affirmative: bool, settings: &Settings) -> Self {
        Self::new(
            Term::parse(subject, settings),
            Term::parse(predicate, settings),
            Term::parse(object, settings),
            affirmative,
        )
    }
    pub fn terms(&self) -> [&Term; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

// ------------- Lookups -------------
/// Maps an index component to the keys of the triples carrying it.
#[derive(Debug)]
pub struct Lookup<K, H = OtherHasher> {
    index: HashMap<K, RoaringTreemap, H>,
}
impl<K: Eq + Hash + fmt::Debug, H: std::hash::BuildHasher + Default> Lookup<K, H> {
    pub fn new() -> Self {
        Self {
            index: HashMap::<K, RoaringTreemap, H>::default(),
        }
    }
    pub fn insert(&mut self, key: K, value: Key) {
        self.index.entry(key).or_default().insert(value);
    }
    /// Removes `value` from the bucket of `key`, dropping the bucket once empty.
    pub fn remove(&mut self, key: K, value: Key) -> Result<()> {
        match self.index.entry(key) {
            Entry::Occupied(mut bucket) => {
                if !bucket.get_mut().remove(value) {
                    return Err(GraphmasterError::Invariant(format!(
                        "triple {} missing from index bucket {:?}",
                        value,
                        bucket.key()
                    )));
                }
                if bucket.get().is_empty() {
                    bucket.remove();
                }
                Ok(())
            }
            Entry::Vacant(bucket) => Err(GraphmasterError::Invariant(format!(
                "index bucket {:?} missing for triple {}",
                bucket.key(),
                value
            ))),
        }
    }
    pub fn lookup(&self, key: &K) -> Option<&RoaringTreemap> {
        self.index.get(key)
    }
    pub fn len(&self) -> usize {
        self.index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
impl<K: Eq + Hash + fmt::Debug, H: std::hash::BuildHasher + Default> Default for Lookup<K, H> {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- TripleStore -------------
/// Subject/predicate/object facts mirrored in one lookup per component,
/// all keyed by case-folded text.
#[derive(Debug)]
pub struct TripleStore {
    settings: Settings,
    generator: KeyGenerator,
    kept: HashMap<Key, Triple, OtherHasher>,
    identities: HashMap<(String, String, String), Key, OtherHasher>,
    all: RoaringTreemap,
    pub subject_lookup: Lookup<String>,
    pub predicate_lookup: Lookup<String>,
    pub object_lookup: Lookup<String>,
}

impl TripleStore {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            generator: KeyGenerator::new(),
            kept: HashMap::default(),
            identities: HashMap::default(),
            all: RoaringTreemap::new(),
            subject_lookup: Lookup::new(),
            predicate_lookup: Lookup::new(),
            object_lookup: Lookup::new(),
        }
    }
    fn identity(&self, subject: &str, predicate: &str, object: &str) -> (String, String, String) {
        (
            self.settings.fold(subject.trim()),
            self.settings.fold(predicate.trim()),
            self.settings.fold(object.trim()),
        )
    }
    /// Adds a triple, returning its key and whether it was already kept.
    pub fn add(&mut self, subject: &str, predicate: &str, object: &str) -> (Key, bool) {
        let identity = self.identity(subject, predicate, object);
        if let Some(key) = self.identities.get(&identity) {
            return (*key, true);
        }
        let key = self.generator.generate();
        let (s, p, o) = identity.clone();
        self.subject_lookup.insert(s, key);
        self.predicate_lookup.insert(p, key);
        self.object_lookup.insert(o, key);
        self.all.insert(key);
        self.identities.insert(identity, key);
        self.kept.insert(
            key,
            Triple {
                key,
                subject: subject.trim().to_string(),
                predicate: predicate.trim().to_string(),
                object: object.trim().to_string(),
            },
        );
        (key, false)
    }
    /// Removes a triple from the store and all three lookups. Unknown keys
    /// yield `Ok(false)`; a lookup missing the key is an invariant violation.
    pub fn remove(&mut self, key: Key) -> Result<bool> {
        let Some(triple) = self.kept.remove(&key) else {
            debug!(key, "no triple to remove");
            return Ok(false);
        };
        let identity = self.identity(&triple.subject, &triple.predicate, &triple.object);
        self.identities.remove(&identity);
        self.all.remove(key);
        let (s, p, o) = identity;
        self.subject_lookup.remove(s, key)?;
        self.predicate_lookup.remove(p, key)?;
        self.object_lookup.remove(o, key)?;
        Ok(true)
    }
    pub fn find(&self, subject: &str, predicate: &str, object: &str) -> Option<Key> {
        self.identities.get(&self.identity(subject, predicate, object)).copied()
    }
    pub fn triple(&self, key: Key) -> Option<&Triple> {
        self.kept.get(&key)
    }
    /// Keys of the triples matching a clause; a variable narrows nothing.
    pub fn matches(&self, clause: &Clause) -> RoaringTreemap {
        let lookups = [&self.subject_lookup, &self.predicate_lookup, &self.object_lookup];
        let mut result = self.all.clone();
        for (term, lookup) in clause.terms().into_iter().zip(lookups) {
            if let Term::Value(value) = term {
                match lookup.lookup(&self.settings.fold(value)) {
                    Some(keys) => result &= keys,
                    None => return RoaringTreemap::new(),
                }
            }
            if result.is_empty() {
                break;
            }
        }
        result
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
    /// Triples in key order.
    pub fn triples(&self) -> impl Iterator<Item = &Triple> {
        self.all.iter().filter_map(|key| self.kept.get(&key))
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
