//! Multi-clause joins over the triple store.
//!
//! A join starts from the empty tuple and walks the clauses left to right.
//! Every affirmative clause fans a tuple out into one successor per matching
//! triple; a negated clause keeps the tuple only when nothing matches. Tuples
//! compare and hash on their visible variables alone, so the final results
//! collapse bindings that differ only in hidden intermediate variables.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// used to keep the one-to-one mapping between tuples and their ordinals
use bimap::BiMap;
use tracing::debug;

use crate::config::Settings;
use crate::graphmaster::OtherHasher;
use crate::triples::{Clause, Key, Term, Triple, TripleStore};

pub const TUPLE_PREFIX: &str = "tuple";

// ------------- Tuple -------------
#[derive(Debug, Clone)]
pub struct Tuple {
    bindings: BTreeMap<String, String>,
    visible: Arc<Vec<String>>,
}
impl Tuple {
    /// The starting point of every join.
    pub fn empty(visible: &[String]) -> Self {
        Self {
            bindings: BTreeMap::new(),
            visible: Arc::new(visible.to_vec()),
        }
    }
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.bindings.get(variable).map(String::as_str)
    }
    pub fn visible(&self) -> &[String] {
        &self.visible
    }
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }
    /// Binds a variable, failing when it already holds a different value.
    fn bind(&mut self, variable: &str, value: &str, store: &TripleStore) -> bool {
        match self.bindings.get(variable) {
            Some(bound) => store.settings().fold(bound) == store.settings().fold(value),
            None => {
                self.bindings.insert(variable.to_string(), value.to_string());
                true
            }
        }
    }
    fn projection(&self) -> Vec<Option<&String>> {
        self.visible.iter().map(|v| self.bindings.get(v)).collect()
    }
}
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.visible == other.visible && self.projection() == other.projection()
    }
}
impl Eq for Tuple {}
impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.visible.hash(state);
        self.projection().hash(state);
    }
}

fn substitute(term: &Term, tuple: &Tuple) -> Term {
    match term {
        Term::Variable(v) => match tuple.get(v) {
            Some(value) => Term::Value(value.to_string()),
            None => term.clone(),
        },
        Term::Value(_) => term.clone(),
    }
}

fn bound_clause(clause: &Clause, tuple: &Tuple) -> Clause {
    Clause::new(
        substitute(&clause.subject, tuple),
        substitute(&clause.predicate, tuple),
        substitute(&clause.object, tuple),
        clause.affirmative,
    )
}

fn extend(tuple: &Tuple, clause: &Clause, triple: &Triple, store: &TripleStore) -> Option<Tuple> {
    let mut extended = tuple.clone();
    let values = [triple.subject(), triple.predicate(), triple.object()];
    for (term, value) in clause.terms().into_iter().zip(values) {
        if let Some(variable) = term.variable() {
            if !extended.bind(variable, value, store) {
                return None;
            }
        }
    }
    Some(extended)
}

fn join(store: &TripleStore, partial: Tuple, clauses: &[Clause], results: &mut Vec<Tuple>) {
    let Some((clause, remaining)) = clauses.split_first() else {
        results.push(partial);
        return;
    };
    let bound = bound_clause(clause, &partial);
    let keys = store.matches(&bound);
    if !clause.affirmative {
        if keys.is_empty() {
            join(store, partial, remaining, results);
        }
        return;
    }
    let mut candidates = HashSet::<BTreeMap<String, String>, OtherHasher>::default();
    for key in keys.iter() {
        let Some(triple) = store.triple(key) else {
            continue;
        };
        if let Some(candidate) = extend(&partial, &bound, triple, store) {
            if candidates.insert(candidate.bindings.clone()) {
                join(store, candidate, remaining, results);
            }
        }
    }
}

/// Every distinct visible binding satisfying all clauses, in discovery order.
pub fn select(store: &TripleStore, clauses: &[Clause], visible: &[String]) -> Vec<Tuple> {
    let mut found = Vec::new();
    if clauses.is_empty() {
        return found;
    }
    join(store, Tuple::empty(visible), clauses, &mut found);
    let mut seen = HashSet::<Tuple, OtherHasher>::default();
    found.retain(|tuple| seen.insert(tuple.clone()));
    debug!(clauses = clauses.len(), tuples = found.len(), "select");
    found
}

/// The first triple matching a clause, with the value bound to its single
/// variable (if any).
pub fn unique(store: &TripleStore, clause: &Clause) -> Option<(Key, Option<String>)> {
    let key = store.matches(clause).min()?;
    let triple = store.triple(key)?;
    let values = [triple.subject(), triple.predicate(), triple.object()];
    let bound = clause
        .terms()
        .into_iter()
        .zip(values)
        .find(|(term, _)| term.variable().is_some())
        .map(|(_, value)| value.to_string());
    Some((key, bound))
}

// ------------- TupleKeeper -------------
/// Gives every distinct tuple a stable ordinal, referenced as `tuple<N>`.
/// At most `capacity` tuples are kept; the oldest is forgotten first and its
/// reference no longer resolves.
#[derive(Debug)]
pub struct TupleKeeper {
    kept: BiMap<u64, Arc<Tuple>>,
    order: VecDeque<u64>,
    capacity: usize,
    lower_bound: u64,
}
impl Default for TupleKeeper {
    fn default() -> Self {
        Self::with_capacity(Settings::default().max_tuples)
    }
}
impl TupleKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            kept: BiMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            lower_bound: 0,
        }
    }
    pub fn keep(&mut self, tuple: Tuple) -> u64 {
        let keepsake = Arc::new(tuple);
        if let Some(ordinal) = self.kept.get_by_right(&keepsake) {
            return *ordinal;
        }
        while self.kept.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.kept.remove_by_left(&oldest);
            debug!(ordinal = oldest, "tuple forgotten");
        }
        self.lower_bound += 1;
        self.kept.insert(self.lower_bound, keepsake);
        self.order.push_back(self.lower_bound);
        self.lower_bound
    }
    pub fn reference(ordinal: u64) -> String {
        format!("{}{}", TUPLE_PREFIX, ordinal)
    }
    pub fn resolve(&self, reference: &str) -> Option<Arc<Tuple>> {
        let ordinal = reference.trim().strip_prefix(TUPLE_PREFIX)?.parse::<u64>().ok()?;
        self.kept.get_by_left(&ordinal).map(Arc::clone)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
