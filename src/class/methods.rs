use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::filter::{Callable, PredicateFn};

/// 單一類別的具名方法表
pub struct MethodTable<T, V> {
    actions: FxHashMap<String, Callable<T, V>>,
    predicates: FxHashMap<String, PredicateFn<T>>,
}

impl<T, V> MethodTable<T, V> {
    pub fn new() -> Self {
        Self {
            actions: FxHashMap::default(),
            predicates: FxHashMap::default(),
        }
    }

    /// 定義或覆寫動作方法，回傳是否覆寫了既有定義
    pub fn define_action(&mut self, name: &str, callable: Callable<T, V>) -> bool {
        self.actions.insert(name.to_string(), callable).is_some()
    }

    /// 定義或覆寫謂詞方法
    pub fn define_predicate(&mut self, name: &str, predicate: PredicateFn<T>) -> bool {
        self.predicates.insert(name.to_string(), predicate).is_some()
    }

    pub fn action(&self, name: &str) -> Option<Callable<T, V>> {
        self.actions.get(name).cloned()
    }

    pub fn predicate(&self, name: &str) -> Option<PredicateFn<T>> {
        self.predicates.get(name).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.actions.len() + self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.predicates.is_empty()
    }
}

impl<T, V> Default for MethodTable<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Outcome;

    #[test]
    fn test_define_and_override() {
        let mut table: MethodTable<u32, ()> = MethodTable::new();
        assert!(table.is_empty());

        assert!(!table.define_action("touch", Callable::simple(|_| Ok(Outcome::Continue))));
        assert!(table.define_action("touch", Callable::simple(|_| Ok(Outcome::halt()))));
        assert!(!table.define_predicate("even", Arc::new(|v: &u32| v % 2 == 0)));

        assert_eq!(table.len(), 2);
        assert!(table.action("touch").is_some());
        assert!(table.action("missing").is_none());
        let even = table.predicate("even").unwrap();
        assert!(even(&4));
    }
}
