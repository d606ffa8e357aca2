//! Effects a rule produces when it fires, and the sinks that receive them.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::schema::fact_store::FactStore;
use crate::schema::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum ConsequenceError {
    #[error("storage change already sets '{0}'")]
    DuplicateChange(String),
}

/// A batch of fact writes applied together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageChange {
    changes: Vec<(String, Value)>,
}

impl StorageChange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write. Each key may appear once per batch.
    pub fn add_change(
        &mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ConsequenceError> {
        if self.changes.iter().any(|(k, _)| k == key) {
            return Err(ConsequenceError::DuplicateChange(key.to_string()));
        }
        self.changes.push((key.to_string(), value.into()));
        Ok(self)
    }

    /// Consuming variant of [`StorageChange::add_change`].
    pub fn with_change(
        mut self,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Self, ConsequenceError> {
        self.add_change(key, value)?;
        Ok(self)
    }

    pub fn changes(&self) -> &[(String, Value)] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Write every change into `store`, in order.
    pub fn apply_to(&self, store: &mut dyn FactStore) {
        for (key, value) in &self.changes {
            store.set_value(key, value.clone());
        }
    }
}

/// A signal addressed to `to`, naming a concept it should react to.
///
/// The sender is not recorded; the host knows who is speaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    pub to: String,
    pub concept: String,
}

impl Trigger {
    pub fn new(to: &str, concept: &str) -> Self {
        Self {
            to: to.to_string(),
            concept: concept.to_string(),
        }
    }
}

/// Receives the effects of executed rules.
pub trait EffectTarget {
    fn storage_change(&mut self, change: &StorageChange);
    fn text_response(&mut self, response_id: &str);
    fn trigger(&mut self, trigger: &Trigger);
}

/// An effect run when a rule fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Consequence {
    StorageChange(StorageChange),
    /// Surface the response with this id. Resolving it to a line is left
    /// to the caller.
    TextResponse(String),
    Trigger(Trigger),
}

impl Consequence {
    pub fn text_response(response_id: &str) -> Self {
        Self::TextResponse(response_id.to_string())
    }

    pub fn trigger(to: &str, concept: &str) -> Self {
        Self::Trigger(Trigger::new(to, concept))
    }

    /// Hand this effect to the matching sink of `target`.
    pub fn execute(&self, target: &mut dyn EffectTarget) {
        match self {
            Self::StorageChange(change) => target.storage_change(change),
            Self::TextResponse(id) => target.text_response(id),
            Self::Trigger(trigger) => target.trigger(trigger),
        }
    }
}

impl From<StorageChange> for Consequence {
    fn from(change: StorageChange) -> Self {
        Self::StorageChange(change)
    }
}

impl From<Trigger> for Consequence {
    fn from(trigger: Trigger) -> Self {
        Self::Trigger(trigger)
    }
}

type StorageChangeHandler = Box<dyn FnMut(&StorageChange)>;
type TextResponseHandler = Box<dyn FnMut(&str)>;
type TriggerHandler = Box<dyn FnMut(&Trigger)>;

/// An [`EffectTarget`] assembled from closures.
///
/// Effects arriving at a sink with no handler are dropped.
#[derive(Default)]
pub struct EffectSinks {
    storage_change: Option<StorageChangeHandler>,
    text_response: Option<TextResponseHandler>,
    trigger: Option<TriggerHandler>,
}

impl EffectSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_storage_change(mut self, handler: impl FnMut(&StorageChange) + 'static) -> Self {
        self.storage_change = Some(Box::new(handler));
        self
    }

    pub fn on_text_response(mut self, handler: impl FnMut(&str) + 'static) -> Self {
        self.text_response = Some(Box::new(handler));
        self
    }

    pub fn on_trigger(mut self, handler: impl FnMut(&Trigger) + 'static) -> Self {
        self.trigger = Some(Box::new(handler));
        self
    }
}

impl EffectTarget for EffectSinks {
    fn storage_change(&mut self, change: &StorageChange) {
        match self.storage_change.as_mut() {
            Some(handler) => handler(change),
            None => debug!(changes = change.len(), "No storage change handler, dropped"),
        }
    }

    fn text_response(&mut self, response_id: &str) {
        match self.text_response.as_mut() {
            Some(handler) => handler(response_id),
            None => debug!(response_id, "No text response handler, dropped"),
        }
    }

    fn trigger(&mut self, trigger: &Trigger) {
        match self.trigger.as_mut() {
            Some(handler) => handler(trigger),
            None => debug!(to = %trigger.to, concept = %trigger.concept, "No trigger handler, dropped"),
        }
    }
}

impl fmt::Debug for EffectSinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSinks")
            .field("storage_change", &self.storage_change.is_some())
            .field("text_response", &self.text_response.is_some())
            .field("trigger", &self.trigger.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fact_store::{FactStoreExt, MemoryFactStore};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        store: MemoryFactStore,
        responses: Vec<String>,
        triggers: Vec<Trigger>,
    }

    impl EffectTarget for Recorder {
        fn storage_change(&mut self, change: &StorageChange) {
            change.apply_to(&mut self.store);
        }

        fn text_response(&mut self, response_id: &str) {
            self.responses.push(response_id.to_string());
        }

        fn trigger(&mut self, trigger: &Trigger) {
            self.triggers.push(trigger.clone());
        }
    }

    #[test]
    fn storage_change_applies_to_empty_store() {
        let change = StorageChange::new()
            .with_change("gold", 10.0)
            .unwrap()
            .with_change("metDog", true)
            .unwrap();
        let mut recorder = Recorder::default();
        Consequence::from(change).execute(&mut recorder);

        assert_eq!(recorder.store.try_get_value::<f32>("gold"), Ok(Some(10.0)));
        assert_eq!(recorder.store.try_get_value::<bool>("metDog"), Ok(Some(true)));
        assert!(recorder.responses.is_empty());
        assert!(recorder.triggers.is_empty());
    }

    #[test]
    fn storage_change_rejects_duplicate_key() {
        let mut change = StorageChange::new();
        change.add_change("gold", 1.0).unwrap();
        assert_eq!(
            change.add_change("gold", "lots").unwrap_err(),
            ConsequenceError::DuplicateChange("gold".to_string())
        );
        assert_eq!(change.len(), 1);
    }

    #[test]
    fn storage_change_keeps_insertion_order() {
        let change = StorageChange::new()
            .with_change("z", 1.0)
            .unwrap()
            .with_change("a", 2.0)
            .unwrap();
        assert_eq!(change.changes()[0].0, "z");
        assert_eq!(change.changes()[1].0, "a");
    }

    #[test]
    fn each_variant_reaches_one_sink() {
        let mut recorder = Recorder::default();
        Consequence::text_response("SeeDog").execute(&mut recorder);
        Consequence::trigger("@A", "Bark").execute(&mut recorder);

        assert_eq!(recorder.responses, vec!["SeeDog".to_string()]);
        assert_eq!(recorder.triggers, vec![Trigger::new("@A", "Bark")]);
        assert!(recorder.store.is_empty());
    }

    #[test]
    fn effect_sinks_dispatch_to_closures() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let responses = Rc::clone(&seen);
        let triggers = Rc::clone(&seen);
        let mut sinks = EffectSinks::new()
            .on_text_response(move |id| responses.borrow_mut().push(format!("text:{id}")))
            .on_trigger(move |t| triggers.borrow_mut().push(format!("trigger:{}:{}", t.to, t.concept)));

        Consequence::text_response("bark").execute(&mut sinks);
        Consequence::trigger("@dog", "Fetch").execute(&mut sinks);
        // no storage handler registered
        Consequence::from(StorageChange::new()).execute(&mut sinks);

        assert_eq!(*seen.borrow(), vec!["text:bark", "trigger:@dog:Fetch"]);
    }
}
