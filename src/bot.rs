//! The long-lived bot: shared tables behind locks, and the request driver.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{GraphmasterError, Result};
use crate::graphmaster::{Graphmaster, Match, OtherHasher, Watch};
use crate::interpreter::Context;
use crate::persist;
use crate::session::Session;
use crate::sets::{Maps, Sets};
use crate::substitution::{self, Substitution};
use crate::template::{Element, Template};
use crate::token::{self, Token};
use crate::triples::{Clause, Key, TripleStore};
use crate::tuples::{self, Tuple, TupleKeeper};

/// A custom instruction, registered under its tag name.
pub trait Extension: Send + Sync {
    fn evaluate(&self, element: &Element, context: &mut Context<'_>) -> Result<String>;
}

/// Outcome of one `test` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub name: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

/// The five rule lists of the normalization pipeline.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pub normal: Substitution,
    pub denormal: Substitution,
    pub person: Substitution,
    pub person2: Substitution,
    pub gender: Substitution,
}

pub struct Bot {
    settings: Settings,
    graph: RwLock<Graphmaster>,
    triples: RwLock<TripleStore>,
    tuples: RwLock<TupleKeeper>,
    pub sets: Sets,
    pub maps: Maps,
    pub substitutions: Substitutions,
    properties: HashMap<String, String, OtherHasher>,
    extensions: HashMap<String, Arc<dyn Extension>, OtherHasher>,
}

impl Bot {
    pub fn new(settings: Settings) -> Self {
        Self {
            graph: RwLock::new(Graphmaster::new()),
            triples: RwLock::new(TripleStore::new(&settings)),
            tuples: RwLock::new(TupleKeeper::with_capacity(settings.max_tuples)),
            sets: Sets::new(),
            maps: Maps::new(),
            substitutions: Substitutions::default(),
            properties: HashMap::default(),
            extensions: HashMap::default(),
            settings,
        }
    }
    /// A bot with the triple dump at `triples_path` loaded, when configured
    /// and present.
    pub fn open(settings: Settings) -> Result<Self> {
        let bot = Self::new(settings);
        if let Some(path) = bot.settings.triples_path.as_deref() {
            if path.exists() {
                let loaded = persist::load_triples(path, &mut *bot.triples.write()?)?;
                info!(path = %path.display(), triples = loaded, "triples loaded");
            }
        }
        Ok(bot)
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------- categories -------------
    pub fn add_category(&self, path: &[Token], template: Arc<Template>) -> Result<Option<Arc<Template>>> {
        self.graph.write()?.insert(path, template)
    }
    /// Adds a category written in the authoring token convention.
    pub fn learn(&self, pattern: &str, that: &str, topic: &str, template: Template) -> Result<Option<Arc<Template>>> {
        let path = token::path(pattern, that, topic, &self.settings)?;
        self.add_category(&path, template.shared())
    }
    pub(crate) fn search(&self, key: &[Token], watch: &Watch) -> Result<Option<Match>> {
        self.graph.read()?.search(key, &self.sets, watch)
    }
    pub fn size(&self) -> Result<usize> {
        Ok(self.graph.read()?.len())
    }
    pub fn vocabulary(&self) -> Result<usize> {
        Ok(self.graph.read()?.vocabulary())
    }

    // ------------- properties and extensions -------------
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(name.to_lowercase(), value.into());
    }
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(&name.to_lowercase()).map(String::as_str)
    }
    pub fn register(&mut self, tag: &str, extension: Arc<dyn Extension>) {
        self.extensions.insert(tag.to_lowercase(), extension);
    }
    pub fn extension(&self, tag: &str) -> Option<&Arc<dyn Extension>> {
        self.extensions.get(tag)
    }

    // ------------- triples -------------
    pub fn add_triple(&self, subject: &str, predicate: &str, object: &str) -> Result<Key> {
        let (key, existed) = self.triples.write()?.add(subject, predicate, object);
        if existed {
            debug!(key, "triple already kept");
        }
        Ok(key)
    }
    pub fn remove_triple(&self, key: Key) -> Result<bool> {
        self.triples.write()?.remove(key)
    }
    /// Keys of the triples matching a single clause.
    pub fn matching(&self, clause: &Clause) -> Result<Vec<Key>> {
        Ok(self.triples.read()?.matches(clause).iter().collect())
    }
    pub fn unique(&self, clause: &Clause) -> Result<Option<(Key, Option<String>)>> {
        Ok(tuples::unique(&*self.triples.read()?, clause))
    }
    /// Runs a join and keeps every resulting tuple, returning their ordinals.
    pub fn select(&self, clauses: &[Clause], visible: &[String]) -> Result<Vec<u64>> {
        let found = tuples::select(&*self.triples.read()?, clauses, visible);
        let mut keeper = self.tuples.write()?;
        Ok(found.into_iter().map(|tuple| keeper.keep(tuple)).collect())
    }
    pub fn tuple(&self, reference: &str) -> Result<Option<Arc<Tuple>>> {
        Ok(self.tuples.read()?.resolve(reference))
    }
    pub fn triple_count(&self) -> Result<usize> {
        Ok(self.triples.read()?.len())
    }
    /// Writes every triple to `triples_path`.
    pub fn save_triples(&self) -> Result<()> {
        let path = self
            .settings
            .triples_path
            .as_deref()
            .ok_or_else(|| GraphmasterError::Config("no triples_path configured".into()))?;
        self.save_triples_to(path)
    }
    pub fn save_triples_to(&self, path: &Path) -> Result<()> {
        let written = persist::save_triples(path, &*self.triples.read()?)?;
        info!(path = %path.display(), triples = written, "triples saved");
        Ok(())
    }

    // ------------- requests -------------
    pub fn respond(&self, session: &mut Session, request: &str) -> String {
        self.answer(session, request, None)
    }
    /// Like `respond`, also collecting the outcome of every `test` instruction.
    pub fn respond_with_tests(&self, session: &mut Session, request: &str) -> (String, Vec<TestResult>) {
        let mut results = Vec::new();
        let response = self.answer(session, request, Some(&mut results));
        (response, results)
    }

    fn answer(&self, session: &mut Session, request: &str, mut tests: Option<&mut Vec<TestResult>>) -> String {
        let splitters = self.settings.sentence_splitters.as_str();
        let normalized = self.substitutions.normal.apply(request);
        let mut that = session.that(&self.settings).to_string();
        let mut outputs = Vec::new();
        let mut replied = Vec::new();
        session.trace.clear();
        for sentence in substitution::split_sentences(&normalized, splitters) {
            session.inputs.push(sentence.clone());
            let output = self.answer_sentence(session, &sentence, &that, tests.as_deref_mut());
            // replies are matched as the next "that", so they are normalized like input
            let sentences = substitution::split_sentences(&output, splitters)
                .iter()
                .map(|sentence| self.substitutions.normal.apply(sentence))
                .filter(|sentence| !sentence.is_empty())
                .collect::<Vec<_>>();
            if let Some(last) = sentences.last() {
                that = last.clone();
            }
            replied.extend(sentences);
            if !output.is_empty() {
                outputs.push(output);
            }
        }
        let response = outputs.join(" ");
        session.requests.push(request.trim().to_string());
        session.responses.push(response.clone());
        session.thats.push(replied);
        response
    }

    fn answer_sentence(
        &self,
        session: &mut Session,
        sentence: &str,
        that: &str,
        tests: Option<&mut Vec<TestResult>>,
    ) -> String {
        let mut context = Context::new(self, session, that, tests);
        let outcome = context.reduce(sentence);
        let trace = context.into_trace();
        session.trace.extend(trace);
        match outcome {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                if e.is_recoverable() {
                    warn!(error = %e, sentence, "sentence abandoned");
                } else {
                    error!(error = %e, sentence, "sentence failed");
                }
                match e {
                    GraphmasterError::Timeout { .. } => self.settings.timeout_response.clone(),
                    GraphmasterError::RecursionLimit { .. } => self.settings.recursion_response.clone(),
                    GraphmasterError::LoopLimit { .. } => self.settings.loop_response.clone(),
                    _ => self.settings.default_response.clone(),
                }
            }
        }
    }
}
