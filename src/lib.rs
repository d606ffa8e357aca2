//! Dialogue Engine: fact-driven rule selection for game dialogue.
//!
//! Given a store of typed facts about world state, picks the most specific
//! matching rule from the loaded packs, runs its effects, and resolves
//! response ids to randomly chosen lines.

pub mod core;
pub mod schema;
