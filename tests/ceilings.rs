use std::sync::Arc;
use std::thread;
use std::time::Duration;

use graphmaster::bot::{Bot, Extension};
use graphmaster::config::Settings;
use graphmaster::error::Result;
use graphmaster::interpreter::Context;
use graphmaster::session::Session;
use graphmaster::template::{Element, Tag, Template};

fn with_greeting(settings: Settings) -> Bot {
    let bot = Bot::new(settings);
    bot.learn("HELLO", "", "", Template::text("Hi there.")).unwrap();
    bot
}

#[test]
fn unconditional_self_recursion_hits_the_recursion_limit() {
    let bot = with_greeting(Settings::default());
    let again = Element::new(Tag::Srai).text("recurse");
    bot.learn("RECURSE", "", "", Template::from(again)).unwrap();
    let mut session = Session::new("u1", bot.settings());
    assert_eq!(bot.respond(&mut session, "recurse"), "Too much recursion.");
    assert_eq!(bot.respond(&mut session, "recurse. hello"), "Too much recursion. Hi there.");
}

#[test]
fn recursion_limit_is_configurable() {
    let settings = Settings {
        max_recursion_depth: 3,
        recursion_response: "deep".into(),
        ..Settings::default()
    };
    let bot = Bot::new(settings);
    bot.learn("A", "", "", Template::from(Element::new(Tag::Srai).text("b"))).unwrap();
    bot.learn("B", "", "", Template::from(Element::new(Tag::Srai).text("c"))).unwrap();
    bot.learn("C", "", "", Template::text("bottom")).unwrap();
    bot.learn("D", "", "", Template::from(Element::new(Tag::Srai).text("a"))).unwrap();
    let mut session = Session::new("u1", bot.settings());
    assert_eq!(bot.respond(&mut session, "a"), "bottom");
    assert_eq!(bot.respond(&mut session, "d"), "deep");
}

#[test]
fn a_condition_that_always_loops_hits_the_loop_limit() {
    let bot = with_greeting(Settings::default());
    let forever = Element::new(Tag::Condition).child(Element::new(Tag::Li).text("again ").child(Element::new(Tag::Loop)));
    bot.learn("SPIN", "", "", Template::from(forever)).unwrap();
    let mut session = Session::new("u1", bot.settings());
    assert_eq!(bot.respond(&mut session, "spin"), "Too much looping.");
    assert_eq!(bot.respond(&mut session, "spin! hello"), "Too much looping. Hi there.");
}

#[test]
fn a_random_choice_that_always_loops_hits_the_loop_limit() {
    let settings = Settings { max_loops: 5, ..Settings::default() };
    let bot = with_greeting(settings);
    let forever = Element::new(Tag::Random)
        .child(Element::new(Tag::Li).child(Element::new(Tag::Loop)))
        .child(Element::new(Tag::Li).text("x").child(Element::new(Tag::Loop)));
    bot.learn("DICE", "", "", Template::from(forever)).unwrap();
    let mut session = Session::new("u1", bot.settings());
    assert_eq!(bot.respond(&mut session, "dice"), "Too much looping.");
}

struct Slow;

impl Extension for Slow {
    fn evaluate(&self, _element: &Element, context: &mut Context<'_>) -> Result<String> {
        thread::sleep(Duration::from_millis(40));
        context.reduce("hello")
    }
}

#[test]
fn a_slow_sentence_times_out_while_the_others_answer() {
    let settings = Settings { timeout_ms: 20, ..Settings::default() };
    let mut bot = with_greeting(settings);
    bot.register("slow", Arc::new(Slow));
    bot.learn("SLOW", "", "", Template::from(Element::named("slow"))).unwrap();
    let mut session = Session::new("u1", bot.settings());
    assert_eq!(
        bot.respond(&mut session, "slow. hello"),
        "That is taking too long to think about. Hi there."
    );
}
