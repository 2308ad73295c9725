//! Tokens of pattern paths and search keys.
//!
//! Both have the shape `message <THAT> that <TOPIC> topic`. Search keys only
//! ever hold words and the two separators; pattern paths may also hold
//! wildcards, priority-exact words and set references.

use std::fmt;

use crate::config::Settings;
use crate::error::{GraphmasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Message,
    That,
    Topic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wildcard {
    /// `#`
    PriorityZeroOrMore,
    /// `_`
    PriorityOneOrMore,
    /// `^`
    WeakZeroOrMore,
    /// `*`
    WeakOneOrMore,
}

impl Wildcard {
    pub const ALL: [Wildcard; 4] = [
        Wildcard::PriorityZeroOrMore,
        Wildcard::PriorityOneOrMore,
        Wildcard::WeakZeroOrMore,
        Wildcard::WeakOneOrMore,
    ];
    pub fn minimum(&self) -> usize {
        match self {
            Wildcard::PriorityZeroOrMore | Wildcard::WeakZeroOrMore => 0,
            Wildcard::PriorityOneOrMore | Wildcard::WeakOneOrMore => 1,
        }
    }
    pub fn symbol(&self) -> &'static str {
        match self {
            Wildcard::PriorityZeroOrMore => "#",
            Wildcard::PriorityOneOrMore => "_",
            Wildcard::WeakZeroOrMore => "^",
            Wildcard::WeakOneOrMore => "*",
        }
    }
    pub(crate) fn slot(&self) -> usize {
        *self as usize
    }
    fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.symbol() == symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    Word(String),
    /// `$WORD`, a literal that outranks every wildcard.
    Exact(String),
    Wildcard(Wildcard),
    /// `<set>name</set>`, the name kept lowercase.
    Set(String),
    /// Opens the given segment.
    Separator(Segment),
}

impl Token {
    pub fn word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Exact(w) => write!(f, "${}", w),
            Token::Wildcard(w) => write!(f, "{}", w.symbol()),
            Token::Set(name) => write!(f, "<set>{}</set>", name),
            Token::Separator(Segment::That) => write!(f, "<THAT>"),
            Token::Separator(Segment::Topic) => write!(f, "<TOPIC>"),
            Token::Separator(Segment::Message) => write!(f, "<INPUT>"),
        }
    }
}

/// Case-folded words of an utterance.
pub fn words(text: &str, settings: &Settings) -> Vec<Token> {
    settings
        .fold(text)
        .split_whitespace()
        .map(|w| Token::Word(w.to_string()))
        .collect()
}

/// The search key for one sentence in its conversational context. A blank
/// `that` or `topic` stands for its default, so `*` still finds a word.
pub fn key(input: &str, that: &str, topic: &str, settings: &Settings) -> Vec<Token> {
    let or_default = |text: &str, default: &str| -> Vec<Token> {
        let found = words(text, settings);
        if found.is_empty() { words(default, settings) } else { found }
    };
    let mut key = words(input, settings);
    key.push(Token::Separator(Segment::That));
    key.extend(or_default(that, &settings.default_that));
    key.push(Token::Separator(Segment::Topic));
    key.extend(or_default(topic, &settings.default_topic));
    key
}

/// Tokens of one pattern segment written in the authoring convention.
pub fn parse_pattern(text: &str, settings: &Settings) -> Vec<Token> {
    text.split_whitespace()
        .map(|item| {
            if let Some(w) = Wildcard::from_symbol(item) {
                Token::Wildcard(w)
            } else if let Some(name) = item
                .strip_prefix("<set>")
                .and_then(|rest| rest.strip_suffix("</set>"))
            {
                Token::Set(name.trim().to_lowercase())
            } else if let Some(word) = item.strip_prefix('$').filter(|w| !w.is_empty()) {
                Token::Exact(settings.fold(word))
            } else {
                Token::Word(settings.fold(item))
            }
        })
        .collect()
}

/// Full category path; an empty `that` or `topic` matches anything.
pub fn path(pattern: &str, that: &str, topic: &str, settings: &Settings) -> Result<Vec<Token>> {
    let mut path = parse_pattern(pattern, settings);
    if path.is_empty() {
        return Err(GraphmasterError::Structure("empty pattern".into()));
    }
    path.push(Token::Separator(Segment::That));
    path.extend(segment_or_any(that, settings));
    path.push(Token::Separator(Segment::Topic));
    path.extend(segment_or_any(topic, settings));
    Ok(path)
}

fn segment_or_any(text: &str, settings: &Settings) -> Vec<Token> {
    let tokens = parse_pattern(text, settings);
    if tokens.is_empty() {
        vec![Token::Wildcard(Wildcard::WeakOneOrMore)]
    } else {
        tokens
    }
}

/// Checks that a path or key holds exactly one `<THAT>` followed by exactly
/// one `<TOPIC>`.
pub fn check_shape(tokens: &[Token]) -> Result<()> {
    let separators: Vec<Segment> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Separator(s) => Some(*s),
            _ => None,
        })
        .collect();
    if separators == [Segment::That, Segment::Topic] {
        Ok(())
    } else {
        Err(GraphmasterError::Structure(format!(
            "expected message <THAT> that <TOPIC> topic, found: {}",
            render(tokens)
        )))
    }
}

pub fn render(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
}
