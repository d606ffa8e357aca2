pub mod clause;
pub mod compiler;
pub mod consequence;
pub mod dialogue;
pub mod machine;
pub mod pack;
pub mod response;
pub mod rule;
