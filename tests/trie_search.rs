use std::thread;
use std::time::Duration;

use graphmaster::config::Settings;
use graphmaster::error::GraphmasterError;
use graphmaster::graphmaster::{Graphmaster, Match, Stars, Watch};
use graphmaster::sets::Sets;
use graphmaster::template::Template;
use graphmaster::token::{self, Segment, Token};

fn watch() -> Watch {
    Watch::start(Duration::from_secs(5))
}

fn insert(graph: &mut Graphmaster, pattern: &str, that: &str, topic: &str, name: &str) {
    let path = token::path(pattern, that, topic, &Settings::default()).unwrap();
    graph.insert(&path, Template::text(name).shared()).unwrap();
}

fn search(graph: &Graphmaster, sets: &Sets, input: &str) -> Option<Match> {
    let key = token::key(input, "unknown", "unknown", &Settings::default());
    graph.search(&key, sets, &watch()).unwrap()
}

fn answer(graph: &Graphmaster, sets: &Sets, input: &str) -> Option<String> {
    search(graph, sets, input).map(|m| m.template.to_string())
}

#[test]
fn exact_path_round_trip() {
    let settings = Settings::default();
    let mut graph = Graphmaster::new();
    insert(&mut graph, "HELLO THERE", "HI", "GREETING", "exact");
    let key = token::key("Hello there", "hi", "greeting", &settings);
    let found = graph.search(&key, &Sets::new(), &watch()).unwrap().unwrap();
    assert_eq!(found.template.to_string(), "exact");
    assert_eq!(found.stars, Stars::default());
    assert_eq!(found.pattern, "HELLO THERE <THAT> HI <TOPIC> GREETING");
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.vocabulary(), 4);
}

#[test]
fn priority_wildcard_beats_literal_beats_weak_wildcard() {
    let sets = Sets::new();
    let mut graph = Graphmaster::new();
    insert(&mut graph, "* ANGELINA", "", "", "weak");
    insert(&mut graph, "HELLO ANGELINA", "", "", "literal");
    insert(&mut graph, "_ ANGELINA", "", "", "priority");
    assert_eq!(answer(&graph, &sets, "Hello Angelina").as_deref(), Some("priority"));

    let mut graph = Graphmaster::new();
    insert(&mut graph, "* ANGELINA", "", "", "weak");
    insert(&mut graph, "HELLO ANGELINA", "", "", "literal");
    assert_eq!(answer(&graph, &sets, "Hello Angelina").as_deref(), Some("literal"));
    assert_eq!(answer(&graph, &sets, "Goodbye Angelina").as_deref(), Some("weak"));
}

#[test]
fn priority_exact_word_outranks_every_wildcard() {
    let sets = Sets::new();
    let mut graph = Graphmaster::new();
    insert(&mut graph, "_", "", "", "priority");
    insert(&mut graph, "$HELLO", "", "", "exact");
    assert_eq!(answer(&graph, &sets, "hello").as_deref(), Some("exact"));
    assert_eq!(answer(&graph, &sets, "goodbye").as_deref(), Some("priority"));
}

#[test]
fn adjacent_wildcards_split_minimally() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "* *", "", "", "pair");
    let found = search(&graph, &Sets::new(), "1 2 3").unwrap();
    assert_eq!(found.stars.message, vec!["1".to_string(), "2 3".to_string()]);
    assert_eq!(found.stars.get(Segment::That, 1), Some("UNKNOWN"));
    assert_eq!(found.stars.get(Segment::Message, 3), None);
}

#[test]
fn zero_width_wildcard_captures_nothing() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "HELLO ^", "", "", "hello");
    let found = search(&graph, &Sets::new(), "hello").unwrap();
    assert_eq!(found.stars.message, vec![String::new()]);
    let found = search(&graph, &Sets::new(), "hello big world").unwrap();
    assert_eq!(found.stars.message, vec!["BIG WORLD".to_string()]);
}

#[test]
fn wildcards_never_cross_a_separator() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "HELLO *", "", "", "hello");
    assert!(search(&graph, &Sets::new(), "hello").is_none());
}

#[test]
fn set_member_beats_weak_wildcard_and_longest_member_wins() {
    let settings = Settings::default();
    let mut sets = Sets::new();
    sets.add("color", ["light", "light blue", "red"], &settings);
    let mut graph = Graphmaster::new();
    insert(&mut graph, "I LIKE *", "", "", "star");
    insert(&mut graph, "I LIKE <set>color</set> ^", "", "", "set");
    let found = search(&graph, &sets, "I like light blue").unwrap();
    assert_eq!(found.template.to_string(), "set");
    assert_eq!(found.stars.message, vec!["LIGHT BLUE".to_string(), String::new()]);
    assert_eq!(answer(&graph, &sets, "I like green").as_deref(), Some("star"));
}

#[test]
fn failed_branches_release_their_captures() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "_ FOO", "", "", "foo");
    insert(&mut graph, "* BAR", "", "", "bar");
    let found = search(&graph, &Sets::new(), "x y bar").unwrap();
    assert_eq!(found.template.to_string(), "bar");
    assert_eq!(found.stars.message, vec!["X Y".to_string()]);
}

#[test]
fn shorter_set_member_wins_when_longer_continuation_fails() {
    let settings = Settings::default();
    let mut sets = Sets::new();
    sets.add("color", ["light", "light blue"], &settings);
    let mut graph = Graphmaster::new();
    insert(&mut graph, "I LIKE <set>color</set> BLUE *", "", "", "shade");
    let found = search(&graph, &sets, "I like light blue sky").unwrap();
    assert_eq!(found.template.to_string(), "shade");
    assert_eq!(found.stars.message, vec!["LIGHT".to_string(), "SKY".to_string()]);
}

#[test]
fn builtin_number_set() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "<set>number</set> PLUS <set>number</set>", "", "", "sum");
    let found = search(&graph, &Sets::new(), "7 plus 8").unwrap();
    assert_eq!(found.stars.message, vec!["7".to_string(), "8".to_string()]);
    assert!(search(&graph, &Sets::new(), "seven plus 8").is_none());
}

#[test]
fn that_and_topic_segments_are_matched() {
    let settings = Settings::default();
    let mut graph = Graphmaster::new();
    insert(&mut graph, "YES", "DO YOU LIKE *", "", "agreed");
    insert(&mut graph, "YES", "", "", "plain");
    let key = token::key("yes", "Do you like cheese", "food", &settings);
    let found = graph.search(&key, &Sets::new(), &watch()).unwrap().unwrap();
    assert_eq!(found.template.to_string(), "agreed");
    assert_eq!(found.stars.get(Segment::That, 1), Some("CHEESE"));
    assert_eq!(found.stars.get(Segment::Topic, 1), Some("FOOD"));
    let key = token::key("yes", "What now", "food", &settings);
    let found = graph.search(&key, &Sets::new(), &watch()).unwrap().unwrap();
    assert_eq!(found.template.to_string(), "plain");
}

#[test]
fn blank_that_and_topic_stand_for_their_defaults() {
    let settings = Settings::default();
    let mut graph = Graphmaster::new();
    insert(&mut graph, "HELLO", "", "", "hi");
    let key = token::key("hello", "", "  ", &settings);
    assert_eq!(key, token::key("hello", "unknown", "unknown", &settings));
    let found = graph.search(&key, &Sets::new(), &watch()).unwrap().unwrap();
    assert_eq!(found.template.to_string(), "hi");
}

#[test]
fn duplicate_insert_replaces_and_returns_previous() {
    let settings = Settings::default();
    let mut graph = Graphmaster::new();
    let path = token::path("HI", "", "", &settings).unwrap();
    assert!(graph.insert(&path, Template::text("first").shared()).unwrap().is_none());
    let previous = graph.insert(&path, Template::text("second").shared()).unwrap().unwrap();
    assert_eq!(previous.to_string(), "first");
    assert_eq!(graph.len(), 1);
    assert_eq!(answer(&graph, &Sets::new(), "hi").as_deref(), Some("second"));
}

#[test]
fn malformed_paths_and_keys_are_rejected() {
    let settings = Settings::default();
    assert!(matches!(token::path("  ", "", "", &settings), Err(GraphmasterError::Structure(_))));
    let mut graph = Graphmaster::new();
    let bad = vec![Token::Word("HI".into())];
    assert!(graph.insert(&bad, Template::text("x").shared()).is_err());
    assert!(matches!(graph.search(&bad, &Sets::new(), &watch()), Err(GraphmasterError::Structure(_))));
}

#[test]
fn exhausted_clock_times_out() {
    let mut graph = Graphmaster::new();
    insert(&mut graph, "* *", "", "", "pair");
    let key = token::key("a b c d", "unknown", "unknown", &Settings::default());
    let expired = Watch::start(Duration::ZERO);
    thread::sleep(Duration::from_millis(2));
    assert!(matches!(
        graph.search(&key, &Sets::new(), &expired),
        Err(GraphmasterError::Timeout { .. })
    ));
}
