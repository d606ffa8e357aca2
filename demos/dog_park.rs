//! Dog Park example: two friends walking a park at dusk.
//!
//! Each step updates the world, asks the engine what to say, and prints the
//! chosen line. Rules remember what happened, so repeated sightings change
//! the conversation.
//!
//! Run with: cargo run --example dog_park

use dialogue_engine::core::compiler;
use dialogue_engine::core::consequence::EffectSinks;
use dialogue_engine::core::dialogue::Dialogue;
use dialogue_engine::schema::fact_store::{FactStore, MemoryFactStore};
use std::cell::RefCell;
use std::rc::Rc;

const PARK: &str = r#"Pack(
    name: "park",
    rules: [
        (
            conditions: [Exists("SeeDog"), Equals("Is", String("@Ana"))],
            response: Some("FirstDog"),
            remember: [("DogsSeen", Float(1.0))],
        ),
        (
            conditions: [Exists("SeeDog"), Equals("Is", String("@Ana")), AtLeast("DogsSeen", 1.0)],
            response: Some("AnotherDog"),
            remember: [("DogsSeen", Float(2.0))],
            trigger: Some((to: "@Ben", concept: "Tease")),
        ),
        (
            conditions: [Exists("SeeDog"), Equals("Is", String("@Ana")), AtLeast("DogsSeen", 2.0), AtMost("light", 0.3)],
            response: Some("DarkDog"),
            remember: [("Spooked", Bool(true))],
        ),
        (
            conditions: [Equals("Is", String("@Ben")), Equals("Spooked", Bool(true))],
            response: Some("Reassure"),
        ),
    ],
    responses: [
        ("FirstDog", ["Look, a dog!", "Oh, a puppy!"]),
        ("AnotherDog", ["Another one!", "This park is full of dogs."]),
        ("DarkDog", ["Was that a dog or a bear?", "I can't see a thing..."]),
        ("Reassure", ["Relax, it was just a labrador.", "It's fine, let's keep walking."]),
    ],
)"#;

fn main() {
    let pack = compiler::compile_str(PARK, "park").expect("Failed to compile park pack");

    let said = Rc::new(RefCell::new(Vec::new()));
    let on_text = Rc::clone(&said);
    let sinks = EffectSinks::new()
        .on_text_response(move |id| on_text.borrow_mut().push(id.to_string()))
        .on_trigger(|t| println!("  [{} should react: {}]", t.to, t.concept));

    let mut dialogue = Dialogue::builder()
        .seed(2024)
        .with_pack(pack)
        .with_sinks(sinks)
        .on_error(|msg| eprintln!("  (engine) {}", msg))
        .build()
        .expect("Failed to build dialogue");

    let mut ana = MemoryFactStore::new().with("Is", "@Ana").with("light", 0.8);

    println!("=== Dog Park ===\n");

    for (step, light) in [0.8, 0.6, 0.2].into_iter().enumerate() {
        ana.set_value("light", light.into());
        ana.set_value("SeeDog", true.into());
        println!("Step {} (light {:.1}):", step + 1, light);
        speak(&mut dialogue, &mut ana, &said, "Ana");
    }

    // Ben hears what Ana remembered.
    let mut ben = MemoryFactStore::new().with("Is", "@Ben");
    if let Some(spooked) = ana.value("Spooked") {
        ben.set_value("Spooked", spooked.clone());
    }
    println!("Step 4:");
    speak(&mut dialogue, &mut ben, &said, "Ben");

    println!("\nAna remembers:");
    for (key, value) in ana.iter() {
        println!("  {} = {}", key, value);
    }
}

fn speak(
    dialogue: &mut Dialogue,
    speaker: &mut MemoryFactStore,
    said: &Rc<RefCell<Vec<String>>>,
    name: &str,
) {
    if !dialogue.query_and_apply(speaker) {
        println!("  {} says nothing.", name);
        return;
    }
    for id in said.borrow_mut().drain(..) {
        match dialogue.text(&id) {
            Ok(line) => println!("  {}: \"{}\"", name, line),
            Err(e) => eprintln!("  {}", e),
        }
    }
}
