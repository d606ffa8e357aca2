//! Pack authoring format: compiles RON source into a [`Pack`].
//!
//! ```ron
//! Pack(
//!     name: "greetings",
//!     rules: [
//!         (
//!             conditions: [Exists("seenDog"), AtLeast("gold", 10.0)],
//!             response: Some("bark"),
//!             remember: [("metDog", Bool(true))],
//!             trigger: Some((to: "@dog", concept: "Greeted")),
//!         ),
//!     ],
//!     responses: [("bark", ["woof", "arf"])],
//! )
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::core::clause::{Clause, CompareMode};
use crate::core::consequence::{Consequence, ConsequenceError, StorageChange, Trigger};
use crate::core::pack::{Pack, PackError};
use crate::core::response::Response;
use crate::core::rule::Rule;
use crate::schema::value::Value;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error on line {line}, column {column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("error in {context}: {message}")]
    Semantic { context: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Source line of a syntax error. Semantic errors carry no position.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

impl From<ron::error::SpannedError> for CompileError {
    fn from(e: ron::error::SpannedError) -> Self {
        Self::Syntax {
            line: e.position.line,
            column: e.position.col,
            message: e.code.to_string(),
        }
    }
}

// RON deserialization shapes. The authoring syntax differs from the runtime
// types, so rules are assembled from these.

#[derive(Debug, Deserialize)]
#[serde(rename = "Pack")]
struct RonPack {
    #[serde(default)]
    name: String,
    #[serde(default)]
    rules: Vec<RonRule>,
    #[serde(default)]
    responses: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Deserialize)]
struct RonRule {
    conditions: Vec<RonCondition>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    remember: Vec<(String, Value)>,
    #[serde(default)]
    trigger: Option<Trigger>,
}

#[derive(Debug, Deserialize)]
enum RonCondition {
    Exists(String),
    /// A float compares with [`CompareMode::EqualTo`].
    Equals(String, Value),
    AtLeast(String, f32),
    AtMost(String, f32),
    EqualTo(String, f32),
}

impl RonCondition {
    fn into_clause(self) -> Clause {
        match self {
            Self::Exists(key) => Clause::exists(&key),
            Self::Equals(key, Value::String(s)) => Clause::string_equals(&key, &s),
            Self::Equals(key, Value::Bool(b)) => Clause::bool_equals(&key, b),
            Self::Equals(key, Value::Float(v)) | Self::EqualTo(key, v) => {
                Clause::numeric(&key, CompareMode::EqualTo, v)
            }
            Self::AtLeast(key, v) => Clause::numeric(&key, CompareMode::AtLeast, v),
            Self::AtMost(key, v) => Clause::numeric(&key, CompareMode::AtMost, v),
        }
    }
}

impl RonRule {
    /// Consequences are emitted as response, remember, trigger.
    fn into_rule(self, index: usize) -> Result<Rule, CompileError> {
        let mut rule = Rule::new();
        for condition in self.conditions {
            rule.add_condition(condition.into_clause());
        }

        if let Some(id) = self.response {
            rule.add_consequence(Consequence::TextResponse(id));
        }

        if !self.remember.is_empty() {
            let mut change = StorageChange::new();
            for (key, value) in self.remember {
                change.add_change(&key, value).map_err(|e| match e {
                    ConsequenceError::DuplicateChange(_) => CompileError::Semantic {
                        context: format!("rule {}", index),
                        message: e.to_string(),
                    },
                })?;
            }
            rule.add_consequence(change);
        }

        if let Some(trigger) = self.trigger {
            rule.add_consequence(trigger);
        }

        Ok(rule)
    }
}

/// Compile a pack from a RON file. The file stem names the pack when the
/// source does not.
pub fn compile_file(path: &Path) -> Result<Pack, CompileError> {
    let contents = std::fs::read_to_string(path)?;
    let fallback = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    compile_str(&contents, fallback)
}

/// Compile a pack from RON source. `fallback_name` is used when the
/// source has no `name` field.
pub fn compile_str(input: &str, fallback_name: &str) -> Result<Pack, CompileError> {
    let raw: RonPack = ron::from_str(input)?;
    let name = if raw.name.is_empty() {
        fallback_name
    } else {
        raw.name.as_str()
    };
    let mut pack = Pack::new(name);

    for (index, ron_rule) in raw.rules.into_iter().enumerate() {
        pack.add_rule(ron_rule.into_rule(index)?);
    }

    for (response_name, lines) in raw.responses {
        let mut response = Response::new(&response_name);
        for line in &lines {
            response.add_line(line);
        }
        pack.add_response(response).map_err(|e| match e {
            PackError::DuplicateResponse { ref response, .. } => CompileError::Semantic {
                context: format!("response '{}'", response),
                message: e.to_string(),
            },
        })?;
    }

    Ok(pack)
}
