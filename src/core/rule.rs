//! Rules: a sorted conjunction of clauses plus the consequences run when
//! they all hold.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::core::clause::Clause;
use crate::core::consequence::{Consequence, EffectTarget};
use crate::schema::fact_store::FactStore;

/// A rule matches a query when every one of its clauses holds.
///
/// Clauses are kept sorted by key so a query can be matched in a single
/// ordered pass over its facts. Rules with more clauses are more specific
/// and win over less specific ones during selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    conditions: Vec<Clause>,
    consequences: Vec<Consequence>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(mut self, clause: Clause) -> Self {
        self.add_condition(clause);
        self
    }

    pub fn with_consequence(mut self, consequence: impl Into<Consequence>) -> Self {
        self.add_consequence(consequence);
        self
    }

    /// Insert `clause` after every clause whose key sorts at or before it.
    pub fn add_condition(&mut self, clause: Clause) -> &mut Self {
        let at = self
            .conditions
            .partition_point(|c| c.key() <= clause.key());
        self.conditions.insert(at, clause);
        self
    }

    pub fn add_consequence(&mut self, consequence: impl Into<Consequence>) -> &mut Self {
        self.consequences.push(consequence.into());
        self
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn conditions(&self) -> &[Clause] {
        &self.conditions
    }

    pub fn consequences(&self) -> &[Consequence] {
        &self.consequences
    }

    /// Match against a single fact store.
    pub fn check(&self, query: &dyn FactStore) -> bool {
        self.check_all(&[query])
    }

    /// Match against several fact stores at once.
    ///
    /// Walks all stores in merged ascending key order alongside the sorted
    /// clauses. A key below the current clause is skipped; a key above it
    /// means no store can still supply the clause, so the rule fails. When
    /// two stores hold the same key, the earlier store in `queries` is
    /// consulted first.
    pub fn check_all(&self, queries: &[&dyn FactStore]) -> bool {
        if self.conditions.is_empty() {
            return true;
        }

        let mut cursors: Vec<_> = queries
            .iter()
            .copied()
            .map(|store| store.iter().peekable())
            .collect();

        // min-heap of (current key, store index)
        let mut heap = BinaryHeap::with_capacity(cursors.len());
        for (idx, cursor) in cursors.iter_mut().enumerate() {
            if let Some(&(key, _)) = cursor.peek() {
                heap.push(Reverse((key, idx)));
            }
        }

        let mut clause_idx = 0;
        while let Some(Reverse((_, idx))) = heap.pop() {
            let Some((key, value)) = cursors[idx].next() else {
                continue;
            };

            match key.cmp(self.conditions[clause_idx].key()) {
                Ordering::Less => {}
                Ordering::Greater => return false,
                Ordering::Equal => {
                    // several clauses may constrain the same fact
                    while let Some(clause) = self.conditions.get(clause_idx) {
                        if clause.key() != key {
                            break;
                        }
                        if !clause.check(value) {
                            return false;
                        }
                        clause_idx += 1;
                    }
                    if clause_idx == self.conditions.len() {
                        return true;
                    }
                }
            }

            if let Some(&(next_key, _)) = cursors[idx].peek() {
                heap.push(Reverse((next_key, idx)));
            }
        }

        false
    }

    /// Per-clause lookup form of [`Rule::check`]. Same answer, but costs a
    /// lookup per clause.
    pub fn check_naive(&self, query: &dyn FactStore) -> bool {
        self.conditions.iter().all(|clause| clause.evaluate(query))
    }

    /// Run every consequence in insertion order.
    pub fn execute(&self, target: &mut dyn EffectTarget) {
        for consequence in &self.consequences {
            consequence.execute(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clause::CompareMode;
    use crate::core::consequence::{StorageChange, Trigger};
    use crate::schema::fact_store::MemoryFactStore;
    use crate::schema::value::Value;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl EffectTarget for Log {
        fn storage_change(&mut self, change: &StorageChange) {
            self.0.push(format!("store:{}", change.len()));
        }

        fn text_response(&mut self, response_id: &str) {
            self.0.push(format!("text:{response_id}"));
        }

        fn trigger(&mut self, trigger: &Trigger) {
            self.0.push(format!("trigger:{}", trigger.concept));
        }
    }

    fn keys(rule: &Rule) -> Vec<&str> {
        rule.conditions().iter().map(Clause::key).collect()
    }

    #[test]
    fn conditions_sorted_by_key() {
        let rule = Rule::new()
            .with_condition(Clause::exists("c"))
            .with_condition(Clause::exists("a"))
            .with_condition(Clause::exists("b"));
        assert_eq!(keys(&rule), vec!["a", "b", "c"]);
        assert_eq!(rule.condition_count(), 3);
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let rule = Rule::new()
            .with_condition(Clause::numeric("gold", CompareMode::AtLeast, 1.0))
            .with_condition(Clause::exists("alpha"))
            .with_condition(Clause::numeric("gold", CompareMode::AtMost, 5.0));
        assert_eq!(keys(&rule), vec!["alpha", "gold", "gold"]);
        assert_eq!(
            rule.conditions()[1],
            Clause::numeric("gold", CompareMode::AtLeast, 1.0)
        );
    }

    #[test]
    fn check_all_clauses_hold() {
        let rule = Rule::new()
            .with_condition(Clause::exists("seenDog"))
            .with_condition(Clause::bool_equals("nearWater", true));
        let query = MemoryFactStore::new()
            .with("aardvark", 1.0)
            .with("nearWater", true)
            .with("seenDog", "yes")
            .with("zzz", false);
        assert!(rule.check(&query));
    }

    #[test]
    fn check_fails_on_missing_key() {
        let rule = Rule::new()
            .with_condition(Clause::exists("seenDog"))
            .with_condition(Clause::exists("nearWater"));
        let query = MemoryFactStore::new().with("seenDog", true);
        assert!(!rule.check(&query));
    }

    #[test]
    fn check_fails_on_wrong_value() {
        let rule = Rule::new().with_condition(Clause::string_equals("Is", "@A"));
        let query = MemoryFactStore::new().with("Is", "@B");
        assert!(!rule.check(&query));
    }

    #[test]
    fn check_fails_on_empty_query() {
        let rule = Rule::new().with_condition(Clause::exists("a"));
        assert!(!rule.check(&MemoryFactStore::new()));
        assert!(!rule.check_all(&[]));
    }

    #[test]
    fn rule_without_conditions_always_matches() {
        let rule = Rule::new();
        assert!(rule.check(&MemoryFactStore::new()));
    }

    #[test]
    fn same_key_clauses_share_one_fact() {
        let rule = Rule::new()
            .with_condition(Clause::numeric("gold", CompareMode::AtLeast, 1.0))
            .with_condition(Clause::numeric("gold", CompareMode::AtMost, 5.0))
            .with_condition(Clause::exists("merchant"));
        let rich = MemoryFactStore::new().with("gold", 9.0).with("merchant", true);
        let fair = MemoryFactStore::new().with("gold", 3.0).with("merchant", true);
        assert!(!rule.check(&rich));
        assert!(rule.check(&fair));
    }

    #[test]
    fn check_all_merges_stores() {
        let rule = Rule::new()
            .with_condition(Clause::exists("a"))
            .with_condition(Clause::exists("m"))
            .with_condition(Clause::exists("z"));
        let first = MemoryFactStore::new().with("a", true).with("z", true);
        let second = MemoryFactStore::new().with("b", true).with("m", true);
        let empty = MemoryFactStore::new();
        assert!(rule.check_all(&[&first, &empty, &second]));
        assert!(!rule.check_all(&[&first, &empty]));
    }

    #[test]
    fn check_all_earlier_store_shadows_later() {
        let rule = Rule::new().with_condition(Clause::string_equals("speaker", "dog"));
        let context = MemoryFactStore::new().with("speaker", "cat");
        let world = MemoryFactStore::new().with("speaker", "dog");
        assert!(!rule.check_all(&[&context, &world]));
        assert!(rule.check_all(&[&world, &context]));
    }

    #[test]
    fn check_agrees_with_naive() {
        let rule = Rule::new()
            .with_condition(Clause::exists("b"))
            .with_condition(Clause::numeric("d", CompareMode::EqualTo, 2.0));
        let stores = [
            MemoryFactStore::new(),
            MemoryFactStore::new().with("b", true),
            MemoryFactStore::new().with("b", true).with("d", 2.0),
            MemoryFactStore::new().with("a", true).with("b", 1.0).with("d", 2.0).with("e", 0.0),
            MemoryFactStore::new().with("b", true).with("d", "2.0"),
        ];
        for store in &stores {
            assert_eq!(rule.check(store), rule.check_naive(store), "store {store:?}");
        }
    }

    #[test]
    fn execute_runs_consequences_in_order() {
        let rule = Rule::new()
            .with_consequence(Consequence::text_response("SeeDog"))
            .with_consequence(StorageChange::new().with_change("DogSeen", 1.0).unwrap())
            .with_consequence(Trigger::new("@A", "Bark"));
        let mut log = Log::default();
        rule.execute(&mut log);
        assert_eq!(log.0, vec!["text:SeeDog", "store:1", "trigger:Bark"]);
    }

    #[test]
    fn check_does_not_touch_store() {
        let rule = Rule::new().with_condition(Clause::exists("a"));
        let query = MemoryFactStore::new().with("a", Value::Bool(true));
        let before = query.clone();
        assert!(rule.check(&query));
        assert!(rule.check(&query));
        assert_eq!(query, before);
    }
}
