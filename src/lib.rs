//! Graphmaster – a conversational pattern engine.
//!
//! An utterance, together with the bot's previous utterance (*that*) and the
//! active *topic*, is resolved to a stored response template, which is then
//! evaluated to produce the reply. Three engines do the work:
//! * [`graphmaster`] – a trie over tokenized patterns, searched depth-first
//!   with fixed precedence across four wildcard kinds, priority-exact words,
//!   literal words and named sets.
//! * [`interpreter`] – a tree-walking evaluator over the matched template that
//!   reads wildcard captures, updates per-user state, recurses through
//!   symbolic reduction and enforces recursion, loop and time ceilings.
//! * [`triples`] and [`tuples`] – an indexed subject/predicate/object fact
//!   store with multi-clause backtracking joins, reached from templates.
//!
//! ## Modules
//! * [`token`] – Search keys and pattern paths.
//! * [`template`] – Immutable instruction trees and their markup rendering.
//! * [`sets`] – Named sets and maps, including the built-in `number` set.
//! * [`substitution`] – Normalization rule lists and the sentence splitter.
//! * [`session`] – Per-user predicates, histories and learned categories.
//! * [`bot`] – The shared tables and the request driver.
//! * [`persist`] – Flat-file triple dumps and the `learnf` export.
//! * [`config`], [`error`], [`logging`] – Settings, the error type and the
//!   tracing subscriber.
//!
//! ## Quick Start
//! ```
//! use graphmaster::{bot::Bot, config::Settings, session::Session};
//! use graphmaster::template::{Element, Tag, Template};
//!
//! let bot = Bot::new(Settings::default());
//! let greeting = Template::new(vec![
//!     "Hello ".into(),
//!     Element::new(Tag::Star).into(),
//!     "!".into(),
//! ]);
//! bot.learn("HELLO *", "", "", greeting).unwrap();
//! let mut session = Session::new("alice", bot.settings());
//! assert_eq!(bot.respond(&mut session, "hello world"), "Hello WORLD!");
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod graphmaster;
pub mod interpreter;
pub mod logging;
pub mod persist;
pub mod session;
pub mod sets;
pub mod substitution;
pub mod template;
pub mod token;
pub mod triples;
pub mod tuples;
