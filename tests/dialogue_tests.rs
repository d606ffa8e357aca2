//! Dialogue integration tests: packs compiled from disk, queried end to end.

use dialogue_engine::core::compiler::CompileError;
use dialogue_engine::core::consequence::{EffectSinks, Trigger};
use dialogue_engine::core::dialogue::{Dialogue, DialogueError};
use dialogue_engine::schema::fact_store::{FactStoreExt, MemoryFactStore};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

#[derive(Default)]
struct Heard {
    responses: Vec<String>,
    triggers: Vec<Trigger>,
}

fn listening_dialogue(seed: u64) -> (Dialogue, Rc<RefCell<Heard>>) {
    let heard = Rc::new(RefCell::new(Heard::default()));
    let on_text = Rc::clone(&heard);
    let on_trigger = Rc::clone(&heard);
    let sinks = EffectSinks::new()
        .on_text_response(move |id| on_text.borrow_mut().responses.push(id.to_string()))
        .on_trigger(move |t| on_trigger.borrow_mut().triggers.push(t.clone()));

    let dialogue = Dialogue::builder()
        .seed(seed)
        .packs_dir("tests/fixtures/packs")
        .with_sinks(sinks)
        .build()
        .unwrap();
    (dialogue, heard)
}

#[test]
fn packs_dir_merges_same_named_files() {
    let (dialogue, _) = listening_dialogue(7);
    let machine = dialogue.machine();
    assert_eq!(machine.pack_count(), 1);

    let pack = machine.pack("dogTalk").unwrap();
    assert_eq!(pack.rule_count(), 4);
    assert_eq!(pack.response_count(), 3);
    // the night rule is the most specific, so it leads after the merge
    assert_eq!(pack.try_get_rule(0).unwrap().condition_count(), 4);
}

#[test]
fn most_specific_rule_wins() {
    let (mut dialogue, heard) = listening_dialogue(7);

    let seen_twice = MemoryFactStore::new()
        .with("SeeDog", true)
        .with("DogSeen", 2.0)
        .with("Is", "@A");
    assert!(dialogue.query(&seen_twice));

    let dark = MemoryFactStore::new()
        .with("SeeDog", true)
        .with("Is", "@A")
        .with("light", 0.1)
        .with("fear", 0.9);
    assert!(dialogue.query(&dark));

    let heard = heard.borrow();
    assert_eq!(heard.responses, vec!["SeeDog", "DarkDog"]);
    assert_eq!(
        heard.triggers,
        vec![Trigger::new("@B", "LookAtDog"), Trigger::new("@B", "Hide")]
    );
}

#[test]
fn unmatched_query_is_idle() {
    let (mut dialogue, heard) = listening_dialogue(7);
    let nothing = MemoryFactStore::new().with("Is", "@C");
    assert!(!dialogue.query(&nothing));
    assert!(heard.borrow().responses.is_empty());
}

#[test]
fn split_stores_query_together() {
    let (mut dialogue, heard) = listening_dialogue(7);
    let speaker = MemoryFactStore::new().with("Is", "@B");
    let world = MemoryFactStore::new()
        .with("SeeDog", true)
        .with("Dead", false);

    assert!(!dialogue.query(&world));
    assert!(dialogue.query_all(&[&speaker, &world]));
    assert_eq!(heard.borrow().responses, vec!["DogAgain"]);
}

#[test]
fn applied_memory_drives_the_next_query() {
    let (mut dialogue, heard) = listening_dialogue(7);
    let mut store = MemoryFactStore::new().with("SeeDog", true).with("Is", "@A");

    // first sighting remembers DogSeen = 2
    assert!(dialogue.query_and_apply(&mut store));
    assert_eq!(store.try_get_value::<f32>("DogSeen").unwrap(), Some(2.0));
    assert!(heard.borrow().triggers.is_empty());

    // second sighting now matches the three-condition rule
    assert!(dialogue.query_and_apply(&mut store));
    assert_eq!(store.try_get_value::<f32>("DogSeen").unwrap(), Some(3.0));
    assert_eq!(heard.borrow().triggers, vec![Trigger::new("@B", "LookAtDog")]);
    assert_eq!(heard.borrow().responses, vec!["SeeDog", "SeeDog"]);
}

#[test]
fn text_resolves_lines_deterministically() {
    let (mut first, _) = listening_dialogue(1993);
    let (mut second, _) = listening_dialogue(1993);

    let lines: Vec<String> = (0..8).map(|_| first.text("SeeDog").unwrap()).collect();
    let again: Vec<String> = (0..8).map(|_| second.text("SeeDog").unwrap()).collect();
    assert_eq!(lines, again);

    let pack = first.machine().pack("dogTalk").unwrap();
    let known = pack.try_get_response("SeeDog").unwrap().lines();
    assert!(lines.iter().all(|line| known.contains(line)));
}

#[test]
fn unknown_response_is_an_error() {
    let (mut dialogue, _) = listening_dialogue(7);
    assert!(matches!(
        dialogue.text("Meow"),
        Err(DialogueError::ResponseNotFound(ref id)) if id == "Meow"
    ));
}

#[test]
fn broken_program_reports_line() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let mut dialogue = Dialogue::builder()
        .on_error(move |msg| sink.borrow_mut().push(msg.to_string()))
        .build()
        .unwrap();

    let err = dialogue
        .load_program(Path::new("tests/fixtures/broken.ron"))
        .unwrap_err();
    // the rule tuple on line 4 is never closed, so line 5 opens with `]`
    // where the next field name should be
    match err {
        DialogueError::Compile(CompileError::Syntax {
            line,
            column,
            ref message,
        }) => {
            assert_eq!((line, column), (5, 5));
            assert_eq!(message, "Expected identifier");
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
    assert_eq!(dialogue.machine().pack_count(), 0);
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn unload_then_reload() {
    let (mut dialogue, _) = listening_dialogue(7);
    dialogue.unload_pack("dogTalk").unwrap();
    assert!(dialogue.machine().pack("dogTalk").is_none());
    assert!(matches!(
        dialogue.unload_pack("dogTalk"),
        Err(DialogueError::UnloadMiss(_))
    ));

    let name = dialogue
        .load_program(Path::new("tests/fixtures/packs/dog_talk_night.ron"))
        .unwrap();
    assert_eq!(name, "dogTalk");
    assert_eq!(dialogue.machine().pack("dogTalk").unwrap().rule_count(), 1);

    dialogue.unload_all();
    assert_eq!(dialogue.machine().pack_count(), 0);
}

#[test]
fn lint_findings_do_not_block_loading() {
    // dangling responses and shadowed rules are linter findings, not load errors
    let mut dialogue = Dialogue::builder().build().unwrap();
    let name = dialogue
        .load_program(Path::new("tests/fixtures/lint_me.ron"))
        .unwrap();
    assert_eq!(name, "lintMe");

    let query = MemoryFactStore::new().with("a", true);
    assert!(dialogue.query(&query));
    assert!(matches!(
        dialogue.text("silent"),
        Err(DialogueError::EmptyResponse(_))
    ));
}
