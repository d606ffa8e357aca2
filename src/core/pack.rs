//! Packs: named bundles of rules and responses, merged by name when loaded.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::response::Response;
use crate::core::rule::Rule;

#[derive(Debug, Error, PartialEq)]
pub enum PackError {
    #[error("pack '{pack}' already has a response named '{response}'")]
    DuplicateResponse { pack: String, response: String },
}

/// A named bundle of rules and responses.
///
/// Rules are kept ordered from most to least specific (descending
/// condition count); rules of equal specificity stay in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Pack {
    name: String,
    rules: Vec<Rule>,
    responses: Vec<Response>,
    response_index: FxHashMap<String, usize>,
}

impl Pack {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    pub fn with_response(mut self, response: Response) -> Result<Self, PackError> {
        self.add_response(response)?;
        Ok(self)
    }

    /// Insert `rule` after every rule at least as specific as it.
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        let count = rule.condition_count();
        let at = self
            .rules
            .partition_point(|r| r.condition_count() >= count);
        self.rules.insert(at, rule);
        self
    }

    /// Register a response. Names are unique within a pack.
    pub fn add_response(&mut self, response: Response) -> Result<&mut Self, PackError> {
        if self.response_index.contains_key(response.name()) {
            return Err(PackError::DuplicateResponse {
                pack: self.name.clone(),
                response: response.name().to_string(),
            });
        }
        self.response_index
            .insert(response.name().to_string(), self.responses.len());
        self.responses.push(response);
        Ok(self)
    }

    /// Append every rule and response of `other`.
    ///
    /// All response names are checked before anything is added, so a
    /// rejected merge leaves this pack unchanged.
    pub fn merge(&mut self, other: Pack) -> Result<(), PackError> {
        for response in &other.responses {
            if self.response_index.contains_key(response.name()) {
                return Err(PackError::DuplicateResponse {
                    pack: self.name.clone(),
                    response: response.name().to_string(),
                });
            }
        }

        for rule in other.rules {
            self.add_rule(rule);
        }
        for response in other.responses {
            self.add_response(response)?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    /// No rules and no responses.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.responses.is_empty()
    }

    pub fn try_get_rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn try_get_response(&self, name: &str) -> Option<&Response> {
        self.response_index
            .get(name)
            .and_then(|&idx| self.responses.get(idx))
    }

    /// Responses in registration order.
    pub fn response_at(&self, index: usize) -> Option<&Response> {
        self.responses.get(index)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn responses(&self) -> &[Response] {
        &self.responses
    }
}
