//! Flat-file persistence: colon-separated triple dumps and the append-only
//! markup export of categories learned with `learnf`.
//!
//! A dump holds one `subject:predicate:object` line per triple. Colons and
//! backslashes inside a component are escaped with a backslash; blank lines
//! and lines starting with `#` are skipped on load.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{GraphmasterError, Result};
use crate::template::Template;
use crate::triples::TripleStore;

fn escape(component: &str) -> String {
    component.replace('\\', "\\\\").replace(':', "\\:")
}

/// Splits a dump line on its unescaped colons.
fn components(line: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if let Some(part) = parts.last_mut() {
                        part.push(escaped);
                    }
                }
            }
            ':' => parts.push(String::new()),
            c => {
                if let Some(part) = parts.last_mut() {
                    part.push(c);
                }
            }
        }
    }
    parts
}

/// Adds every triple of the dump at `path`, returning how many lines were read.
pub fn load_triples(path: &Path, store: &mut TripleStore) -> Result<usize> {
    let reader = BufReader::new(File::open(path)?);
    let mut loaded = 0;
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match components(trimmed).as_slice() {
            [subject, predicate, object] => {
                let (key, existed) = store.add(subject, predicate, object);
                if existed {
                    debug!(key, line = number + 1, "duplicate triple in dump");
                }
                loaded += 1;
            }
            _ => {
                return Err(GraphmasterError::Persistence(format!(
                    "{}:{}: expected subject:predicate:object",
                    path.display(),
                    number + 1
                )));
            }
        }
    }
    Ok(loaded)
}

/// Overwrites `path` with every triple in key order.
pub fn save_triples(path: &Path, store: &TripleStore) -> Result<usize> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;
    for triple in store.triples() {
        writeln!(
            writer,
            "{}:{}:{}",
            escape(triple.subject()),
            escape(triple.predicate()),
            escape(triple.object())
        )?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Appends one category as markup. Empty `that` and `topic` are left out.
pub fn append_category(path: &Path, pattern: &str, that: &str, topic: &str, template: &Template) -> Result<()> {
    let mut markup = format!("<category><pattern>{}</pattern>", pattern);
    if !that.is_empty() {
        markup.push_str(&format!("<that>{}</that>", that));
    }
    if !topic.is_empty() {
        markup.push_str(&format!("<topic>{}</topic>", topic));
    }
    markup.push_str(&format!("<template>{}</template></category>", template));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", markup)?;
    Ok(())
}
