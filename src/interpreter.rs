//! Template evaluation.
//!
//! A `Context` lives for one sentence. It owns the stopwatch and the shared
//! recursion depth, and a frame (captures and local variables) per matched
//! template; `reduce` saves the caller's frame, matches and evaluates the new
//! input, and restores the frame afterwards.

use std::collections::HashMap;
use std::mem;

use chrono::Local;
use chrono::format::{Item, StrftimeItems};
use rand::Rng;
use tracing::{debug, warn};

use crate::bot::{Bot, TestResult};
use crate::config::Settings;
use crate::error::{GraphmasterError, Result};
use crate::graphmaster::{OtherHasher, Stars, Watch};
use crate::persist;
use crate::session::Session;
use crate::substitution::{Substitution, squeeze};
use crate::template::{Element, Node, Tag, Template};
use crate::token::{self, Segment};
use crate::triples::{Clause, Term};
use crate::tuples::TupleKeeper;

const DEFAULT_DATE_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Default)]
struct Frame {
    stars: Stars,
    locals: HashMap<String, String, OtherHasher>,
}

/// What a `condition` or `li` tests: a predicate or a local variable.
#[derive(Debug, Clone)]
enum Subject {
    Predicate(String),
    Local(String),
}

pub struct Context<'a> {
    bot: &'a Bot,
    session: &'a mut Session,
    watch: Watch,
    depth: usize,
    that: String,
    frame: Frame,
    trace: Vec<String>,
    tests: Option<&'a mut Vec<TestResult>>,
}

impl<'a> Context<'a> {
    pub fn new(bot: &'a Bot, session: &'a mut Session, that: &str, tests: Option<&'a mut Vec<TestResult>>) -> Self {
        Self {
            watch: Watch::start(bot.settings().timeout()),
            bot,
            session,
            depth: 0,
            that: that.to_string(),
            frame: Frame::default(),
            trace: Vec::new(),
            tests,
        }
    }
    pub fn bot(&self) -> &'a Bot {
        self.bot
    }
    pub fn settings(&self) -> &'a Settings {
        self.bot.settings()
    }
    pub fn session(&self) -> &Session {
        &*self.session
    }
    pub fn session_mut(&mut self) -> &mut Session {
        &mut *self.session
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    /// 1-based capture of the template being evaluated.
    pub fn star(&self, segment: Segment, index: usize) -> Option<&str> {
        self.frame.stars.get(segment, index)
    }
    pub fn local(&self, name: &str) -> Option<&str> {
        self.frame.locals.get(name).map(String::as_str)
    }
    pub fn set_local(&mut self, name: &str, value: impl Into<String>) {
        self.frame.locals.insert(name.to_string(), value.into());
    }
    /// Patterns matched so far, outermost first.
    pub fn into_trace(self) -> Vec<String> {
        self.trace
    }

    /// Symbolic reduction: match `input` afresh and evaluate the winner.
    pub fn reduce(&mut self, input: &str) -> Result<String> {
        let limit = self.settings().max_recursion_depth;
        if self.depth >= limit {
            warn!(limit, input, "recursion limit reached");
            return Err(GraphmasterError::RecursionLimit { limit });
        }
        self.depth += 1;
        let result = self.match_and_evaluate(input);
        self.depth -= 1;
        result
    }

    fn match_and_evaluate(&mut self, input: &str) -> Result<String> {
        let settings = self.settings();
        let key = token::key(input, &self.that, self.session.topic(settings), settings);
        let found = match self.session.graph.search(&key, &self.bot.sets, &self.watch)? {
            Some(found) => Some(found),
            None => self.bot.search(&key, &self.watch)?,
        };
        let Some(found) = found else {
            debug!(input, "no category matched");
            return Ok(settings.default_response.clone());
        };
        debug!(depth = self.depth, pattern = %found.pattern, "evaluating");
        self.trace.push(found.pattern);
        let caller = mem::replace(&mut self.frame, Frame { stars: found.stars, ..Frame::default() });
        let result = self.evaluate_nodes(found.template.nodes());
        self.frame = caller;
        result
    }

    pub fn evaluate_nodes(&mut self, nodes: &[Node]) -> Result<String> {
        let mut output = String::new();
        for node in nodes {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Element(element) => output.push_str(&self.evaluate(element)?),
            }
        }
        Ok(output)
    }

    /// Evaluated, trimmed value of an attribute.
    pub fn attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>> {
        match element.attribute(name) {
            Some(value) => Ok(Some(self.evaluate_nodes(value)?.trim().to_string())),
            None => Ok(None),
        }
    }

    pub fn evaluate(&mut self, element: &Element) -> Result<String> {
        let bot = self.bot;
        let settings = bot.settings();
        match &element.tag {
            Tag::Star => self.capture(element, Segment::Message),
            Tag::ThatStar => self.capture(element, Segment::That),
            Tag::TopicStar => self.capture(element, Segment::Topic),
            Tag::Srai => {
                let input = self.evaluate_nodes(&element.children)?;
                self.reduce(input.trim())
            }
            Tag::Sr => {
                let input = self.star_or_null(Segment::Message, 1);
                self.reduce(&input)
            }
            Tag::Think => {
                self.evaluate_nodes(&element.children)?;
                Ok(String::new())
            }
            Tag::Get => self.get(element),
            Tag::Set => self.set(element),
            Tag::Bot => {
                let name = self.attribute(element, "name")?.unwrap_or_default();
                Ok(bot.property(&name).map(String::from).unwrap_or_else(|| {
                    debug!(property = %name, "unknown bot property");
                    settings.default_property.clone()
                }))
            }
            Tag::Condition => self.condition(element),
            Tag::Random => self.random(element),
            Tag::Li | Tag::Eval => self.evaluate_nodes(&element.children),
            Tag::Loop => Ok(String::new()),
            Tag::Input => {
                let index = self.index(element)?;
                Ok(self.history(self.session.inputs.get(index).cloned(), "input", index))
            }
            Tag::Request => {
                let index = self.index(element)?;
                Ok(self.history(self.session.requests.get(index).cloned(), "request", index))
            }
            Tag::Response => {
                let index = self.index(element)?;
                Ok(self.history(self.session.responses.get(index).cloned(), "response", index))
            }
            Tag::That => self.that_history(element),
            Tag::Date => {
                let format = self.attribute(element, "format")?.unwrap_or_else(|| DEFAULT_DATE_FORMAT.into());
                let format = if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
                    debug!(%format, "invalid date format");
                    DEFAULT_DATE_FORMAT.to_string()
                } else {
                    format
                };
                Ok(Local::now().format(&format).to_string())
            }
            Tag::Uppercase => Ok(self.evaluate_nodes(&element.children)?.to_uppercase()),
            Tag::Lowercase => Ok(self.evaluate_nodes(&element.children)?.to_lowercase()),
            Tag::Formal => {
                let text = self.evaluate_nodes(&element.children)?;
                Ok(text.split_whitespace().map(capitalize).collect::<Vec<_>>().join(" "))
            }
            Tag::Sentence => {
                let text = self.evaluate_nodes(&element.children)?;
                let text = text.trim();
                let mut chars = text.chars();
                Ok(match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                })
            }
            Tag::Explode => {
                let text = self.evaluate_nodes(&element.children)?;
                Ok(text
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .join(" "))
            }
            Tag::Normalize => self.substitute(element, &bot.substitutions.normal, false),
            Tag::Denormalize => self.substitute(element, &bot.substitutions.denormal, false),
            Tag::Person => self.substitute(element, &bot.substitutions.person, true),
            Tag::Person2 => self.substitute(element, &bot.substitutions.person2, true),
            Tag::Gender => self.substitute(element, &bot.substitutions.gender, true),
            Tag::Map => {
                let name = self.attribute(element, "name")?.unwrap_or_default();
                let key = self.evaluate_nodes(&element.children)?;
                Ok(bot.maps.lookup(&name, &key, settings).unwrap_or_else(|| {
                    debug!(map = %name, key = key.trim(), "no map entry");
                    settings.default_map.clone()
                }))
            }
            Tag::Id => Ok(self.session.id().to_string()),
            Tag::Size => Ok(self.bot.size()?.to_string()),
            Tag::Vocabulary => Ok(self.bot.vocabulary()?.to_string()),
            Tag::Program => Ok(format!("graphmaster {}", env!("CARGO_PKG_VERSION"))),
            Tag::Learn => self.learn(element, false),
            Tag::Learnf => self.learn(element, true),
            Tag::AddTriple => self.add_triple(element),
            Tag::DeleteTriple => self.delete_triple(element),
            Tag::Uniq => self.uniq(element),
            Tag::Select => self.select(element),
            Tag::First | Tag::Rest => {
                let text = self.evaluate_nodes(&element.children)?;
                let mut items = text.split_whitespace().filter(|item| *item != settings.empty_list);
                let picked = match element.tag {
                    Tag::First => items.next().map(String::from),
                    _ => {
                        items.next();
                        Some(items.collect::<Vec<_>>().join(" ")).filter(|rest| !rest.is_empty())
                    }
                };
                Ok(picked.unwrap_or_else(|| settings.empty_list.clone()))
            }
            Tag::Test => self.test(element),
            Tag::Custom(name) => {
                match bot.extension(name) {
                    Some(extension) => extension.evaluate(element, self),
                    None => {
                        debug!(tag = %name, "no extension registered, evaluating contents");
                        self.evaluate_nodes(&element.children)
                    }
                }
            }
            Tag::Category
            | Tag::Pattern
            | Tag::Template
            | Tag::Topic
            | Tag::Vars
            | Tag::Q
            | Tag::NotQ
            | Tag::Subj
            | Tag::Pred
            | Tag::Obj => self.evaluate_nodes(&element.children),
        }
    }

    // ------------- captures and history -------------
    fn index(&mut self, element: &Element) -> Result<usize> {
        Ok(match self.attribute(element, "index")? {
            Some(index) => index.parse::<usize>().unwrap_or_else(|_| {
                debug!(%index, "unreadable index");
                1
            }),
            None => 1,
        })
    }

    fn star_or_null(&self, segment: Segment, index: usize) -> String {
        match self.frame.stars.get(segment, index) {
            Some(text) => text.to_string(),
            None => {
                debug!(?segment, index, "unbound wildcard");
                self.settings().null_star.clone()
            }
        }
    }

    fn capture(&mut self, element: &Element, segment: Segment) -> Result<String> {
        let index = self.index(element)?;
        Ok(self.star_or_null(segment, index))
    }

    fn history(&self, found: Option<String>, kind: &str, index: usize) -> String {
        found.unwrap_or_else(|| {
            debug!(kind, index, "no history entry");
            self.settings().unknown_history.clone()
        })
    }

    /// `index="n,m"` is the m-th last sentence of the n-th last response.
    fn that_history(&mut self, element: &Element) -> Result<String> {
        let index = self.attribute(element, "index")?.unwrap_or_default();
        let mut parts = index.split(',').map(|part| part.trim().parse::<usize>().ok());
        let response = parts.next().flatten().unwrap_or(1);
        let sentence = parts.next().flatten().unwrap_or(1);
        let found = self.session.thats.get(response).and_then(|sentences| {
            sentences
                .len()
                .checked_sub(sentence)
                .and_then(|i| sentences.get(i))
                .cloned()
        });
        Ok(self.history(found, "that", response))
    }

    // ------------- predicates and locals -------------
    fn subject(&mut self, element: &Element) -> Result<Option<Subject>> {
        if let Some(name) = self.attribute(element, "name")? {
            return Ok(Some(Subject::Predicate(name)));
        }
        Ok(self.attribute(element, "var")?.map(Subject::Local))
    }

    fn bound(&self, subject: &Subject) -> Option<&str> {
        match subject {
            Subject::Predicate(name) => self.session.predicate(name),
            Subject::Local(name) => self.local(name),
        }
    }

    /// `*` asks only whether the subject is bound; other values compare
    /// case-folded against the bound value or the `get` default.
    fn satisfies(&self, subject: &Subject, expected: &str) -> bool {
        let settings = self.settings();
        let bound = self.bound(subject);
        if expected == "*" {
            return bound.is_some();
        }
        let actual = bound.unwrap_or(settings.default_get.as_str());
        settings.fold(&squeeze(actual)) == settings.fold(&squeeze(expected))
    }

    fn get(&mut self, element: &Element) -> Result<String> {
        let default = self.settings().default_get.clone();
        if let Some(reference) = self.attribute(element, "tuple")? {
            let var = self.attribute(element, "var")?.unwrap_or_default();
            let value = self
                .bot
                .tuple(&reference)?
                .and_then(|tuple| tuple.get(&var).map(String::from));
            return Ok(value.unwrap_or_else(|| {
                debug!(%reference, %var, "no tuple binding");
                default
            }));
        }
        let value = match self.subject(element)? {
            Some(subject) => self.bound(&subject).map(String::from),
            None => None,
        };
        Ok(value.unwrap_or_else(|| {
            debug!("unbound predicate");
            default
        }))
    }

    fn set(&mut self, element: &Element) -> Result<String> {
        let value = self.evaluate_nodes(&element.children)?.trim().to_string();
        match self.subject(element)? {
            Some(Subject::Predicate(name)) => self.session.set_predicate(&name, value.clone()),
            Some(Subject::Local(name)) => self.set_local(&name, value.clone()),
            None => debug!("set without name or var"),
        }
        Ok(value)
    }

    // ------------- choices -------------
    fn next_iteration(&self, iterations: &mut usize) -> Result<()> {
        self.watch.check()?;
        *iterations += 1;
        let limit = self.settings().max_loops;
        if *iterations > limit {
            warn!(limit, "loop limit reached");
            return Err(GraphmasterError::LoopLimit { limit });
        }
        Ok(())
    }

    fn condition(&mut self, element: &Element) -> Result<String> {
        let outer = self.subject(element)?;
        if let Some(subject) = &outer {
            if let Some(value) = self.attribute(element, "value")? {
                return if self.satisfies(subject, &value) {
                    self.evaluate_nodes(&element.children)
                } else {
                    Ok(String::new())
                };
            }
        }
        let mut output = String::new();
        let mut iterations = 0;
        loop {
            let Some(item) = self.choose(element, outer.as_ref())? else {
                break;
            };
            output.push_str(&self.evaluate_nodes(&item.children)?);
            if !item.has_child(&Tag::Loop) {
                break;
            }
            self.next_iteration(&mut iterations)?;
        }
        Ok(output)
    }

    /// First `li` whose test holds; an `li` without a value is the default.
    fn choose<'e>(&mut self, element: &'e Element, outer: Option<&Subject>) -> Result<Option<&'e Element>> {
        for item in element.elements(&Tag::Li) {
            let subject = match self.subject(item)? {
                Some(subject) => Some(subject),
                None => outer.cloned(),
            };
            match (subject, self.attribute(item, "value")?) {
                (_, None) => return Ok(Some(item)),
                (Some(subject), Some(value)) => {
                    if self.satisfies(&subject, &value) {
                        return Ok(Some(item));
                    }
                }
                (None, Some(_)) => debug!("li value without name or var"),
            }
        }
        Ok(None)
    }

    fn random(&mut self, element: &Element) -> Result<String> {
        let items = element.elements(&Tag::Li).collect::<Vec<_>>();
        if items.is_empty() {
            return Ok(String::new());
        }
        let mut output = String::new();
        let mut iterations = 0;
        loop {
            let item = items[rand::thread_rng().gen_range(0..items.len())];
            output.push_str(&self.evaluate_nodes(&item.children)?);
            if !item.has_child(&Tag::Loop) {
                break;
            }
            self.next_iteration(&mut iterations)?;
        }
        Ok(output)
    }

    // ------------- substitutions -------------
    /// An empty `person`, `person2` or `gender` applies to the first star.
    fn substitute(&mut self, element: &Element, rules: &Substitution, star_shortcut: bool) -> Result<String> {
        let text = if star_shortcut && element.children.is_empty() {
            self.star_or_null(Segment::Message, 1)
        } else {
            self.evaluate_nodes(&element.children)?
        };
        Ok(rules.apply(&text))
    }

    // ------------- learning -------------
    fn learn(&mut self, element: &Element, global: bool) -> Result<String> {
        let settings = self.settings();
        for category in element.elements(&Tag::Category) {
            let pattern = match category.element(&Tag::Pattern) {
                Some(pattern) => self.pattern_text(&pattern.children)?,
                None => String::new(),
            };
            let that = match category.element(&Tag::That) {
                Some(that) => self.pattern_text(&that.children)?,
                None => String::new(),
            };
            let topic = match category.element(&Tag::Topic) {
                Some(topic) => self.pattern_text(&topic.children)?,
                None => String::new(),
            };
            let template = match category.element(&Tag::Template) {
                Some(template) => Template::new(self.resolve_evals(&template.children)?),
                None => Template::default(),
            };
            let path = match token::path(&pattern, &that, &topic, settings) {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "category not learned");
                    continue;
                }
            };
            if !global {
                self.session.graph.insert(&path, template.shared())?;
                continue;
            }
            self.bot.add_category(&path, template.clone().shared())?;
            if let Some(file) = settings.learnf_path.as_deref() {
                if let Err(e) = persist::append_category(file, &pattern, &that, &topic, &template) {
                    warn!(error = %e, path = %file.display(), "learnf export failed");
                }
            }
        }
        Ok(String::new())
    }

    /// Pattern text in the authoring convention; a `set` without name or var
    /// stays a set reference, other elements are evaluated.
    fn pattern_text(&mut self, nodes: &[Node]) -> Result<String> {
        let mut text = String::new();
        for node in nodes {
            match node {
                Node::Text(t) => text.push_str(t),
                Node::Element(e) if e.tag == Tag::Set && e.attributes.is_empty() => {
                    let name = self.pattern_text(&e.children)?;
                    text.push_str(&format!(" <set>{}</set> ", name));
                }
                Node::Element(e) => text.push_str(&self.evaluate(e)?),
            }
        }
        Ok(squeeze(&text))
    }

    /// Copies a learned template, replacing every `eval` with its value now.
    fn resolve_evals(&mut self, nodes: &[Node]) -> Result<Vec<Node>> {
        let mut resolved = Vec::with_capacity(nodes.len());
        for node in nodes {
            resolved.push(match node {
                Node::Element(e) if e.tag == Tag::Eval => Node::Text(self.evaluate_nodes(&e.children)?),
                Node::Element(e) => {
                    let mut copy = Element::new(e.tag.clone());
                    for (name, value) in &e.attributes {
                        copy = copy.attr_nodes(name, self.resolve_evals(value)?);
                    }
                    copy.children = self.resolve_evals(&e.children)?;
                    Node::Element(copy)
                }
                Node::Text(_) => node.clone(),
            });
        }
        Ok(resolved)
    }

    // ------------- triples -------------
    /// A clause component from an attribute or a `subj`/`pred`/`obj` child.
    fn component(&mut self, element: &Element, tag: Tag) -> Result<Option<String>> {
        if let Some(value) = self.attribute(element, tag.name())? {
            return Ok(Some(value));
        }
        match element.element(&tag) {
            Some(part) => Ok(Some(self.evaluate_nodes(&part.children)?.trim().to_string())),
            None => Ok(None),
        }
    }

    /// Reads a clause; absent components become anonymous variables when a
    /// counter is given, otherwise they match nothing. Variables the clause
    /// names explicitly are appended to `named`.
    fn clause(
        &mut self,
        element: &Element,
        affirmative: bool,
        anonymous: &mut Option<usize>,
        named: &mut Vec<String>,
    ) -> Result<Clause> {
        let subject = self.term(element, Tag::Subj, anonymous, named)?;
        let predicate = self.term(element, Tag::Pred, anonymous, named)?;
        let object = self.term(element, Tag::Obj, anonymous, named)?;
        Ok(Clause::new(subject, predicate, object, affirmative))
    }

    fn term(&mut self, element: &Element, tag: Tag, anonymous: &mut Option<usize>, named: &mut Vec<String>) -> Result<Term> {
        let settings = self.settings();
        let term = match (self.component(element, tag)?, anonymous.as_mut()) {
            (Some(text), _) => Term::parse(&text, settings),
            (None, Some(counter)) => {
                *counter += 1;
                return Ok(Term::Variable(format!("{}_{}", settings.variable_prefix, counter)));
            }
            (None, None) => Term::Value(String::new()),
        };
        if let Some(variable) = term.variable() {
            if !named.iter().any(|n| n == variable) {
                named.push(variable.to_string());
            }
        }
        Ok(term)
    }

    fn add_triple(&mut self, element: &Element) -> Result<String> {
        let settings = self.settings();
        let subject = self.component(element, Tag::Subj)?;
        let predicate = self.component(element, Tag::Pred)?;
        let object = self.component(element, Tag::Obj)?;
        match (subject, predicate, object) {
            (Some(s), Some(p), Some(o)) if !s.is_empty() && !p.is_empty() && !o.is_empty() => {
                Ok(self.bot.add_triple(&s, &p, &o)?.to_string())
            }
            _ => {
                debug!("addtriple needs subject, predicate and object");
                Ok(settings.default_triple.clone())
            }
        }
    }

    /// Removes every triple matching the given components; absent ones match anything.
    fn delete_triple(&mut self, element: &Element) -> Result<String> {
        let clause = self.clause(element, true, &mut Some(0), &mut Vec::new())?;
        let keys = self.bot.matching(&clause)?;
        if keys.is_empty() {
            debug!("no triple to delete");
            return Ok(self.settings().default_triple.clone());
        }
        for key in &keys {
            self.bot.remove_triple(*key)?;
        }
        Ok(keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(" "))
    }

    /// Value bound to the clause's variable in the first matching triple, or
    /// that triple's key when the clause has no variable.
    fn uniq(&mut self, element: &Element) -> Result<String> {
        let clause = self.clause(element, true, &mut None, &mut Vec::new())?;
        Ok(match self.bot.unique(&clause)? {
            Some((_, Some(value))) => value,
            Some((key, None)) => key.to_string(),
            None => {
                debug!("no unique triple");
                self.settings().default_triple.clone()
            }
        })
    }

    fn select(&mut self, element: &Element) -> Result<String> {
        let mut clauses = Vec::new();
        let mut named = Vec::new();
        let mut anonymous = Some(0);
        for part in element.children.iter().filter_map(Node::as_element) {
            let affirmative = match part.tag {
                Tag::Q => true,
                Tag::NotQ => false,
                _ => continue,
            };
            clauses.push(self.clause(part, affirmative, &mut anonymous, &mut named)?);
        }
        let visible = match element.element(&Tag::Vars) {
            Some(vars) => self
                .evaluate_nodes(&vars.children)?
                .split_whitespace()
                .map(String::from)
                .collect(),
            None => named,
        };
        let ordinals = self.bot.select(&clauses, &visible)?;
        if ordinals.is_empty() {
            return Ok(self.settings().empty_list.clone());
        }
        Ok(ordinals
            .into_iter()
            .map(TupleKeeper::reference)
            .collect::<Vec<_>>()
            .join(" "))
    }

    // ------------- tests -------------
    fn test(&mut self, element: &Element) -> Result<String> {
        let name = self.attribute(element, "name")?.unwrap_or_default();
        let expected = self.attribute(element, "expected")?.unwrap_or_default();
        let actual = squeeze(&self.evaluate_nodes(&element.children)?);
        let passed = actual == squeeze(&expected);
        debug!(%name, passed, "test evaluated");
        if let Some(results) = self.tests.as_deref_mut() {
            results.push(TestResult { name, expected, actual: actual.clone(), passed });
        }
        Ok(actual)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
