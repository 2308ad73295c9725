use std::fs;

use graphmaster::bot::Bot;
use graphmaster::config::Settings;
use graphmaster::error::GraphmasterError;
use graphmaster::persist;
use graphmaster::session::{History, Session};
use graphmaster::template::{Element, Tag, Template};
use graphmaster::triples::TripleStore;

#[test]
fn triple_dump_round_trip_keeps_colons() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triples.txt");
    let settings = Settings::default();
    let mut store = TripleStore::new(&settings);
    store.add("lunch", "starts at", "12:30");
    store.add("c:\\temp", "is", "a folder");
    assert_eq!(persist::save_triples(&path, &store).unwrap(), 2);

    let mut restored = TripleStore::new(&settings);
    assert_eq!(persist::load_triples(&path, &mut restored).unwrap(), 2);
    assert!(restored.find("lunch", "starts at", "12:30").is_some());
    assert!(restored.find("c:\\temp", "is", "a folder").is_some());
}

#[test]
fn malformed_dump_lines_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.txt");
    fs::write(&path, "# comment\n\nsky:color:blue\nno separators here\n").unwrap();
    let mut store = TripleStore::new(&Settings::default());
    let result = persist::load_triples(&path, &mut store);
    assert!(matches!(result, Err(GraphmasterError::Persistence(message)) if message.contains(":4:")));
}

#[test]
fn bot_loads_and_saves_its_triples_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("facts.txt");
    fs::write(&path, "sky:color:blue\ngrass:color:green\n").unwrap();
    let settings = Settings { triples_path: Some(path.clone()), ..Settings::default() };
    let bot = Bot::open(settings).unwrap();
    assert_eq!(bot.triple_count().unwrap(), 2);
    bot.add_triple("sun", "color", "yellow").unwrap();
    bot.save_triples().unwrap();
    let saved = fs::read_to_string(&path).unwrap();
    assert_eq!(saved, "sky:color:blue\ngrass:color:green\nsun:color:yellow\n");
}

#[test]
fn saving_without_a_path_is_a_config_error() {
    let bot = Bot::new(Settings::default());
    assert!(matches!(bot.save_triples(), Err(GraphmasterError::Config(_))));
}

#[test]
fn learnf_appends_markup_and_teaches_every_session() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("learned.aiml");
    let settings = Settings { learnf_path: Some(export.clone()), ..Settings::default() };
    let bot = Bot::new(settings);
    let category = Element::new(Tag::Category)
        .child(Element::new(Tag::Pattern).text("CHERRY"))
        .child(Element::new(Tag::That).text("WHAT FRUIT"))
        .child(Element::new(Tag::Template).text("Sweet & red ").child(Element::new(Tag::Get).attr("name", "name")));
    let teach = Template::new(vec![Element::new(Tag::Learnf).child(category).into(), "Saved.".into()]);
    bot.learn("REMEMBER CHERRY", "", "", teach).unwrap();
    bot.learn("ASK", "", "", Template::text("What fruit?")).unwrap();

    let mut first = Session::new("first", bot.settings());
    assert_eq!(bot.respond(&mut first, "remember cherry"), "Saved.");
    let mut second = Session::new("second", bot.settings());
    bot.respond(&mut second, "ask");
    assert_eq!(bot.respond(&mut second, "cherry"), "Sweet & red unknown");

    let exported = fs::read_to_string(&export).unwrap();
    assert_eq!(
        exported,
        "<category><pattern>CHERRY</pattern><that>WHAT FRUIT</that>\
         <template>Sweet &amp; red <get name=\"name\"/></template></category>\n"
    );
}

#[test]
fn settings_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graphmaster.toml");
    fs::write(&path, "max_loops = 7\nlocale = \"tr\"\ndefault_response = \"Hmm?\"\n").unwrap();
    let settings = Settings::load(path.to_str()).unwrap();
    assert_eq!(settings.max_loops, 7);
    assert_eq!(settings.default_response, "Hmm?");
    assert_eq!(settings.max_recursion_depth, 32);
    assert_eq!(settings.fold("istanbul"), "İSTANBUL");
    assert_eq!(Settings::default().fold("istanbul"), "ISTANBUL");
}

#[test]
fn missing_settings_file_falls_back_to_defaults() {
    let settings = Settings::load(Some("/nonexistent/graphmaster")).unwrap();
    assert_eq!(settings.timeout_ms, Settings::default().timeout_ms);
}

#[test]
fn histories_are_bounded_and_most_recent_first() {
    let mut history = History::new(3);
    for turn in ["one", "two", "three", "four"] {
        history.push(turn.to_string());
    }
    assert_eq!(history.len(), 3);
    assert_eq!(history.get(1).map(String::as_str), Some("four"));
    assert_eq!(history.get(3).map(String::as_str), Some("two"));
    assert_eq!(history.get(4), None);
    assert_eq!(history.get(0), None);
}
