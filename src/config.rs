//! Runtime settings: ceilings, fallback strings and lookup defaults.
//!
//! Settings are layered by the `config` crate: built-in defaults first, then an
//! optional settings file, then `GRAPHMASTER_*` environment variables (for
//! example `GRAPHMASTER_MAX_LOOPS=50`).

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-folding rule; `tr` and `az` fold a dotted `i` to `İ`.
    pub locale: String,
    pub max_recursion_depth: usize,
    pub max_loops: usize,
    pub timeout_ms: u64,
    pub max_history: usize,
    /// Select results kept for `tuple<N>` references before the oldest is dropped.
    pub max_tuples: usize,
    pub sentence_splitters: String,
    pub variable_prefix: String,
    pub default_response: String,
    pub timeout_response: String,
    pub recursion_response: String,
    pub loop_response: String,
    pub default_get: String,
    pub default_property: String,
    pub default_map: String,
    pub default_that: String,
    pub default_topic: String,
    pub null_star: String,
    pub unknown_history: String,
    pub default_triple: String,
    pub empty_list: String,
    pub log_level: String,
    pub learnf_path: Option<PathBuf>,
    pub triples_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "en".into(),
            max_recursion_depth: 32,
            max_loops: 100,
            timeout_ms: 2000,
            max_history: 32,
            max_tuples: 10_000,
            sentence_splitters: ".!?;".into(),
            variable_prefix: "?".into(),
            default_response: "I have no answer for that.".into(),
            timeout_response: "That is taking too long to think about.".into(),
            recursion_response: "Too much recursion.".into(),
            loop_response: "Too much looping.".into(),
            default_get: "unknown".into(),
            default_property: "unknown".into(),
            default_map: "unknown".into(),
            default_that: "unknown".into(),
            default_topic: "unknown".into(),
            null_star: "nullstar".into(),
            unknown_history: "nothing".into(),
            default_triple: "unknown".into(),
            empty_list: "NIL".into(),
            log_level: "info".into(),
            learnf_path: None,
            triples_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the optional file at `path` (any format the `config`
    /// crate understands, chosen by extension), overridden by environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("GRAPHMASTER"))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
    pub fn is_variable(&self, term: &str) -> bool {
        !self.variable_prefix.is_empty() && term.starts_with(self.variable_prefix.as_str())
    }
    /// Locale case folding applied to every pattern token, search key and
    /// triple index entry.
    pub fn fold(&self, text: &str) -> String {
        match self.locale.as_str() {
            "tr" | "az" => text
                .chars()
                .flat_map(|c| match c {
                    'i' => vec!['İ'],
                    'ı' => vec!['I'],
                    c => c.to_uppercase().collect(),
                })
                .collect(),
            _ => text.to_uppercase(),
        }
    }
}
