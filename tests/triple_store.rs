use graphmaster::config::Settings;
use graphmaster::triples::{Clause, TripleStore};
use graphmaster::tuples::{self, TupleKeeper};

fn clause(s: &str, p: &str, o: &str) -> Clause {
    Clause::parse(s, p, o, true, &Settings::default())
}

fn family() -> TripleStore {
    let mut store = TripleStore::new(&Settings::default());
    store.add("alice", "parent", "bob");
    store.add("alice", "parent", "carol");
    store.add("bob", "parent", "dave");
    store.add("carol", "parent", "erin");
    store.add("carol", "parent", "frank");
    store.add("dave", "likes", "cheese");
    store
}

#[test]
fn add_match_remove_round_trip() {
    let mut store = TripleStore::new(&Settings::default());
    let (key, existed) = store.add("Sky", "color", "Blue");
    assert!(!existed);
    let found = store.matches(&clause("sky", "COLOR", "blue"));
    assert_eq!(found.iter().collect::<Vec<_>>(), vec![key]);
    assert!(store.remove(key).unwrap());
    assert!(store.matches(&clause("sky", "color", "blue")).is_empty());
    assert!(!store.remove(key).unwrap());
    assert!(store.is_empty());
    assert!(store.subject_lookup.is_empty());
    assert!(store.predicate_lookup.is_empty());
    assert!(store.object_lookup.is_empty());
}

#[test]
fn duplicates_return_the_existing_key() {
    let mut store = TripleStore::new(&Settings::default());
    let (first, _) = store.add("sky", "color", "blue");
    let (second, existed) = store.add(" SKY ", "Color", "BLUE");
    assert!(existed);
    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
    assert_eq!(store.triple(first).unwrap().to_string(), "sky:color:blue");
}

#[test]
fn keys_are_never_reused() {
    let mut store = TripleStore::new(&Settings::default());
    let (first, _) = store.add("a", "b", "c");
    store.remove(first).unwrap();
    let (second, _) = store.add("a", "b", "c");
    assert_ne!(first, second);
    assert_eq!(store.find("A", "B", "C"), Some(second));
}

#[test]
fn variables_do_not_narrow_a_match() {
    let store = family();
    assert_eq!(store.matches(&clause("?x", "parent", "?y")).len(), 5);
    assert_eq!(store.matches(&clause("carol", "?p", "?o")).len(), 2);
    assert_eq!(store.matches(&clause("?s", "?p", "?o")).len(), 6);
    assert!(store.matches(&clause("zed", "?p", "?o")).is_empty());
}

#[test]
fn two_clause_join_returns_exactly_the_satisfying_tuples() {
    let store = family();
    let clauses = vec![clause("?x", "parent", "?y"), clause("?y", "parent", "?z")];
    let visible = vec!["?x".to_string(), "?z".to_string()];
    let found = tuples::select(&store, &clauses, &visible);
    let mut pairs = found
        .iter()
        .map(|t| (t.get("?x").unwrap().to_string(), t.get("?z").unwrap().to_string()))
        .collect::<Vec<_>>();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("alice".to_string(), "dave".to_string()),
            ("alice".to_string(), "erin".to_string()),
            ("alice".to_string(), "frank".to_string()),
        ]
    );
}

#[test]
fn hidden_variables_collapse_in_the_results() {
    let store = family();
    let clauses = vec![clause("?x", "parent", "?y"), clause("?y", "parent", "?z")];
    let found = tuples::select(&store, &clauses, &["?x".to_string()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get("?x"), Some("alice"));
}

#[test]
fn negated_clause_filters_out_matches() {
    let store = family();
    let clauses = vec![
        clause("?x", "parent", "?y"),
        Clause::parse("?y", "parent", "?z", false, &Settings::default()),
    ];
    let found = tuples::select(&store, &clauses, &["?y".to_string()]);
    let mut leaves = found.iter().map(|t| t.get("?y").unwrap().to_string()).collect::<Vec<_>>();
    leaves.sort();
    assert_eq!(leaves, vec!["dave", "erin", "frank"]);
}

#[test]
fn unique_binds_the_single_variable() {
    let store = family();
    let (_, value) = tuples::unique(&store, &clause("dave", "likes", "?what")).unwrap();
    assert_eq!(value.as_deref(), Some("cheese"));
    assert!(tuples::unique(&store, &clause("erin", "likes", "?what")).is_none());
}

#[test]
fn tuple_ordinals_are_stable() {
    let store = family();
    let clauses = vec![clause("alice", "parent", "?child")];
    let visible = vec!["?child".to_string()];
    let mut keeper = TupleKeeper::new();
    let first = tuples::select(&store, &clauses, &visible)
        .into_iter()
        .map(|t| keeper.keep(t))
        .collect::<Vec<_>>();
    let again = tuples::select(&store, &clauses, &visible)
        .into_iter()
        .map(|t| keeper.keep(t))
        .collect::<Vec<_>>();
    assert_eq!(first, again);
    assert_eq!(keeper.len(), 2);
    let reference = TupleKeeper::reference(first[0]);
    assert!(reference.starts_with("tuple"));
    let tuple = keeper.resolve(&reference).unwrap();
    assert!(matches!(tuple.get("?child"), Some("bob") | Some("carol")));
    assert!(keeper.resolve("tuple999").is_none());
    assert!(keeper.resolve("nonsense").is_none());
}

#[test]
fn tuple_keeper_forgets_the_oldest_beyond_capacity() {
    let store = family();
    let visible = vec!["?child".to_string()];
    let found = tuples::select(&store, &[clause("?who", "parent", "?child")], &visible);
    assert!(found.len() >= 2);
    let mut keeper = TupleKeeper::with_capacity(1);
    let first = keeper.keep(found[0].clone());
    let second = keeper.keep(found[1].clone());
    assert_ne!(first, second);
    assert_eq!(keeper.len(), 1);
    assert!(keeper.resolve(&TupleKeeper::reference(first)).is_none());
    assert!(keeper.resolve(&TupleKeeper::reference(second)).is_some());
}
