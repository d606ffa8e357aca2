//! The pack registry and best-match rule selection.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::core::pack::{Pack, PackError};
use crate::core::response::Response;
use crate::core::rule::Rule;
use crate::schema::fact_store::FactStore;

/// Why a pack was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadFailure {
    #[error("because its name was empty")]
    EmptyName,
    #[error("{0} because it was empty")]
    EmptyPack(String),
    #[error("{pack} because response '{response}' is already loaded under that pack")]
    DuplicateResponse { pack: String, response: String },
}

/// Outcome of [`Machine::load_pack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Registered under a name not seen before.
    New,
    /// Merged into the pack already registered under the same name.
    Additive,
    Failure(LoadFailure),
}

#[derive(Debug)]
struct LoadedPack {
    pack: Pack,
    /// Condition count of the pack's most specific rule, or 0.
    head_count: usize,
    /// Next rule to test during a sweep.
    cursor: usize,
}

/// Holds loaded packs and answers rule and response queries across all of
/// them.
///
/// Rule selection finds the matching rule with the most conditions over
/// every pack. Ties go to the earliest loaded pack, then to the earliest
/// rule within it.
#[derive(Debug, Default)]
pub struct Machine {
    packs: Vec<LoadedPack>,
    index: FxHashMap<String, usize>,
    /// Highest `head_count` across packs; valid while `dirty` is false.
    watermark: usize,
    dirty: bool,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `pack`, merging it into an already loaded pack of the same name.
    ///
    /// Unnamed and empty packs are refused, as is a merge that would
    /// register a response name twice; a refused merge changes nothing.
    pub fn load_pack(&mut self, pack: Pack) -> LoadStatus {
        if pack.name().is_empty() {
            return LoadStatus::Failure(LoadFailure::EmptyName);
        }
        if pack.is_empty() {
            return LoadStatus::Failure(LoadFailure::EmptyPack(pack.name().to_string()));
        }

        if let Some(&idx) = self.index.get(pack.name()) {
            let name = pack.name().to_string();
            let (rules, responses) = (pack.rule_count(), pack.response_count());
            return match self.packs[idx].pack.merge(pack) {
                Ok(()) => {
                    self.dirty = true;
                    debug!(pack = %name, rules, responses, "Pack merged additively");
                    LoadStatus::Additive
                }
                Err(PackError::DuplicateResponse { pack, response }) => {
                    LoadStatus::Failure(LoadFailure::DuplicateResponse { pack, response })
                }
            };
        }

        debug!(
            pack = %pack.name(),
            rules = pack.rule_count(),
            responses = pack.response_count(),
            "Pack loaded"
        );
        self.index.insert(pack.name().to_string(), self.packs.len());
        self.packs.push(LoadedPack {
            pack,
            head_count: 0,
            cursor: 0,
        });
        self.dirty = true;
        LoadStatus::New
    }

    /// Remove the pack registered under `name`. Returns false if there is
    /// none.
    pub fn try_unload_pack(&mut self, name: &str) -> bool {
        let Some(idx) = self.index.remove(name) else {
            return false;
        };
        self.packs.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        self.dirty = true;
        debug!(pack = name, "Pack unloaded");
        true
    }

    pub fn unload_all_packs(&mut self) {
        self.packs.clear();
        self.index.clear();
        self.watermark = 0;
        self.dirty = false;
        debug!("All packs unloaded");
    }

    /// The most specific rule matching `query`, if any.
    pub fn try_query_rule(&mut self, query: &dyn FactStore) -> Option<&Rule> {
        self.try_query_rule_all(&[query])
    }

    /// The most specific rule matching all of `queries` merged together.
    ///
    /// Packs are swept level by level from the highest condition count
    /// down. At each level every pack tests its rules of exactly that
    /// count, in load order, and the first match wins. Rules with no
    /// conditions are never selected.
    pub fn try_query_rule_all(&mut self, queries: &[&dyn FactStore]) -> Option<&Rule> {
        if self.dirty {
            self.refresh_condition_counts();
        }
        for slot in &mut self.packs {
            slot.cursor = 0;
        }

        let mut watermark = self.watermark;
        let mut found = None;
        'sweep: while watermark > 0 {
            let mut next_watermark = 0;
            for (pack_idx, slot) in self.packs.iter_mut().enumerate() {
                while let Some(rule) = slot.pack.try_get_rule(slot.cursor) {
                    if rule.condition_count() != watermark {
                        break;
                    }
                    if rule.check_all(queries) {
                        found = Some((pack_idx, slot.cursor));
                        break 'sweep;
                    }
                    slot.cursor += 1;
                }
                if let Some(rule) = slot.pack.try_get_rule(slot.cursor) {
                    next_watermark = next_watermark.max(rule.condition_count());
                }
            }
            watermark = next_watermark;
        }

        match found {
            Some((pack_idx, rule_idx)) => {
                let slot = &self.packs[pack_idx];
                debug!(
                    pack = %slot.pack.name(),
                    rule = rule_idx,
                    conditions = watermark,
                    "Rule matched"
                );
                slot.pack.try_get_rule(rule_idx)
            }
            None => {
                debug!(packs = self.packs.len(), "No rule matched");
                None
            }
        }
    }

    /// Look a response up by name. The earliest loaded pack that has it
    /// wins.
    pub fn try_query_response(&self, response_id: &str) -> Option<&Response> {
        let found = self
            .packs
            .iter()
            .find_map(|slot| slot.pack.try_get_response(response_id));
        if found.is_none() {
            debug!(response_id, "Response not found");
        }
        found
    }

    pub fn pack(&self, name: &str) -> Option<&Pack> {
        self.index.get(name).map(|&idx| &self.packs[idx].pack)
    }

    /// Loaded pack names, in load order.
    pub fn pack_names(&self) -> impl Iterator<Item = &str> {
        self.packs.iter().map(|slot| slot.pack.name())
    }

    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    fn refresh_condition_counts(&mut self) {
        self.watermark = 0;
        for slot in &mut self.packs {
            slot.head_count = slot
                .pack
                .try_get_rule(0)
                .map_or(0, Rule::condition_count);
            slot.cursor = 0;
            self.watermark = self.watermark.max(slot.head_count);
        }
        self.dirty = false;
    }
}
