use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use graphmaster::config::Settings;
use graphmaster::graphmaster::{Graphmaster, Watch};
use graphmaster::sets::Sets;
use graphmaster::template::Template;
use graphmaster::token;
use graphmaster::triples::{Clause, TripleStore};
use graphmaster::tuples;

fn populated_graph(settings: &Settings) -> Graphmaster {
    let mut graph = Graphmaster::new();
    for i in 0..2_000 {
        let patterns = [
            format!("WORD{} *", i),
            format!("_ WORD{} END", i),
            format!("WHAT IS WORD{} ^", i),
            format!("* WORD{} * WORD{}", i, i + 1),
        ];
        for pattern in patterns {
            let path = token::path(&pattern, "", "", settings).unwrap();
            graph.insert(&path, Template::text(pattern.clone()).shared()).unwrap();
        }
    }
    graph
}

fn trie_search(c: &mut Criterion) {
    let settings = Settings::default();
    let graph = populated_graph(&settings);
    let sets = Sets::new();
    let inputs = [
        "word17 is a fine word",
        "what is word1999 anyway",
        "some words before word512 and after word513",
        "nothing here matches at all",
    ];
    let keys = inputs
        .iter()
        .map(|input| token::key(input, "unknown", "unknown", &settings))
        .collect::<Vec<_>>();
    c.bench_function("trie search", |b| {
        b.iter(|| {
            for key in &keys {
                let watch = Watch::start(Duration::from_secs(5));
                black_box(graph.search(black_box(key), &sets, &watch).unwrap());
            }
        })
    });
}

fn triple_join(c: &mut Criterion) {
    let settings = Settings::default();
    let mut store = TripleStore::new(&settings);
    for i in 0..5_000 {
        store.add(&format!("person{}", i), "parent", &format!("person{}", i * 2 + 1));
        store.add(&format!("person{}", i), "parent", &format!("person{}", i * 2 + 2));
        store.add(&format!("person{}", i), "age", &format!("{}", i % 90));
    }
    let clauses = vec![
        Clause::parse("?x", "parent", "?y", true, &settings),
        Clause::parse("?y", "parent", "?z", true, &settings),
        Clause::parse("?z", "age", "42", true, &settings),
    ];
    let visible = vec!["?x".to_string()];
    c.bench_function("three clause join", |b| {
        b.iter(|| black_box(tuples::select(&store, black_box(&clauses), &visible)))
    });
}

criterion_group!(benches, trie_search, triple_join);
criterion_main!(benches);
