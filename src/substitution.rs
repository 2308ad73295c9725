//! Normalization: ordered substitution rules and sentence splitting.
//!
//! All rules of a list are compiled into a single alternation, so at any
//! position the first rule (in list order) that matches wins, the text is
//! scanned once left to right, and replaced text is never matched again.

use lazy_static::lazy_static;
use regex::{Captures, Regex, RegexBuilder};

use crate::error::{GraphmasterError, Result};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RULE_LINE: Regex = Regex::new(r#"^\s*"(.*)"\s*,\s*"(.*)"\s*$"#).unwrap();
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn squeeze(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Regular expression source (literal rules are escaped).
    pub pattern: String,
    /// Replacement text, `$1`-style references address the rule's own groups.
    pub replacement: String,
    /// The match must sit between whitespace or the ends of the text.
    pub word_boundary: bool,
}

impl Rule {
    pub fn literal(pattern: &str, replacement: &str, word_boundary: bool) -> Self {
        Self {
            pattern: regex::escape(pattern.trim()),
            replacement: replacement.to_string(),
            word_boundary,
        }
    }
    pub fn regex(pattern: &str, replacement: &str, word_boundary: bool) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            word_boundary,
        }
    }
    /// Reads a `"pattern","replacement"` line; blanks padding the pattern
    /// make it a word-boundary rule. Blank lines and `#` comments yield `None`.
    pub fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let captures = RULE_LINE.captures(trimmed)?;
        let pattern = captures.get(1)?.as_str();
        let replacement = captures.get(2)?.as_str();
        let word_boundary = pattern.starts_with(' ') || pattern.ends_with(' ');
        if pattern.trim().is_empty() {
            return None;
        }
        Some(Self::literal(pattern, replacement.trim(), word_boundary))
    }
}

/// An ordered rule list compiled into one alternation.
#[derive(Debug, Clone)]
pub struct Substitution {
    rules: Vec<Rule>,
    combined: Option<Regex>,
    // each rule on its own, used to expand group references of the winner
    singles: Vec<Regex>,
}

impl Default for Substitution {
    fn default() -> Self {
        Self { rules: Vec::new(), combined: None, singles: Vec::new() }
    }
}

impl Substitution {
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        if rules.is_empty() {
            return Ok(Self::default());
        }
        let mut alternatives = Vec::with_capacity(rules.len());
        let mut singles = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            // the text is scanned with doubled blanks, see `apply`
            let inner = rule.pattern.replace(' ', "  ");
            let body = if rule.word_boundary {
                format!(" (?:{}) ", inner)
            } else {
                format!("(?:{})", inner)
            };
            singles.push(
                RegexBuilder::new(&format!("^{}$", body))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| GraphmasterError::Config(format!("substitution rule {}: {}", i + 1, e)))?,
            );
            alternatives.push(format!("(?P<r{}>{})", i, body));
        }
        let combined = RegexBuilder::new(&alternatives.join("|")).case_insensitive(true).build()?;
        Ok(Self { rules, combined: Some(combined), singles })
    }
    /// Builds a list from `"pattern","replacement"` lines.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        Self::new(lines.into_iter().filter_map(Rule::from_line).collect())
    }
    pub fn len(&self) -> usize {
        self.rules.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
    pub fn apply(&self, text: &str) -> String {
        let Some(combined) = &self.combined else {
            return squeeze(text);
        };
        // doubling the blanks lets adjacent word-boundary matches each own a blank
        let padded = format!("  {}  ", squeeze(text).replace(' ', "  "));
        let replaced = combined.replace_all(&padded, |captures: &Captures| self.expand(captures));
        squeeze(&replaced)
    }
    fn expand(&self, captures: &Captures) -> String {
        let matched = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
        for (i, rule) in self.rules.iter().enumerate() {
            if captures.name(&format!("r{}", i)).is_none() {
                continue;
            }
            let mut expanded = String::new();
            if let Some(own) = self.singles[i].captures(matched) {
                own.expand(&rule.replacement, &mut expanded);
            } else {
                expanded.push_str(&rule.replacement);
            }
            return if rule.word_boundary {
                format!(" {} ", expanded)
            } else {
                expanded
            };
        }
        matched.to_string()
    }
}

/// Splits on the splitter characters that are followed by whitespace, a
/// markup opening `<`, or the end of the text; other splitters stay inside
/// their word. Splitters are dropped and empty sentences skipped.
pub fn split_sentences(text: &str, splitters: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if !splitters.contains(c) {
            current.push(c);
            continue;
        }
        // a run of splitters is judged by what follows the whole run
        let mut run = String::from(c);
        while let Some(next) = chars.next_if(|next| splitters.contains(*next)) {
            run.push(next);
        }
        if chars.peek().is_none_or(|next| next.is_whitespace() || *next == '<') {
            push_sentence(&mut sentences, &current);
            current.clear();
        } else {
            current.push_str(&run);
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, text: &str) {
    let sentence = squeeze(text);
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
}
