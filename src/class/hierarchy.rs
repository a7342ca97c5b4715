use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use super::methods::MethodTable;
use super::ClassId;
use crate::error::{CallbackError, CallbackResult};
use crate::filter::{
    Action, ActionRef, Callable, Condition, FilterKind, FilterRecord, Guard, PredicateFn,
    ResolvedGuard,
};

struct ClassEntry<T, V> {
    name: String,
    parent: Option<ClassId>,
    methods: MethodTable<T, V>,
}

/// 類別階層
///
/// 以類別識別碼為鍵保存類別，生命週期與註冊/移除明確綁定。
pub struct ClassHierarchy<T, V> {
    classes: FxHashMap<ClassId, ClassEntry<T, V>>,
    by_name: FxHashMap<String, ClassId>,
    next_id: u32,
}

impl<T, V> ClassHierarchy<T, V> {
    pub fn new() -> Self {
        Self {
            classes: FxHashMap::default(),
            by_name: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// 註冊類別
    pub fn register(&mut self, name: &str, parent: Option<ClassId>) -> CallbackResult<ClassId> {
        if self.by_name.contains_key(name) {
            return Err(CallbackError::DuplicateClass(name.to_string()));
        }
        if let Some(parent) = parent {
            self.entry(parent)?;
        }

        let id = ClassId(self.next_id);
        self.next_id += 1;
        self.classes.insert(
            id,
            ClassEntry {
                name: name.to_string(),
                parent,
                methods: MethodTable::new(),
            },
        );
        self.by_name.insert(name.to_string(), id);

        debug!("註冊類別 {} ({}), 父類別: {:?}", name, id, parent);
        Ok(id)
    }

    /// 移除類別；仍有子類別時失敗
    pub fn remove(&mut self, class: ClassId) -> CallbackResult<String> {
        let name = self.entry(class)?.name.clone();
        if let Some(child) = self.classes.values().find(|entry| entry.parent == Some(class)) {
            return Err(CallbackError::ClassInUse {
                class: name,
                child: child.name.clone(),
            });
        }

        self.classes.remove(&class);
        self.by_name.remove(&name);
        debug!("移除類別 {} ({})", name, class);
        Ok(name)
    }

    pub fn contains(&self, class: ClassId) -> bool {
        self.classes.contains_key(&class)
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, class: ClassId) -> CallbackResult<&str> {
        Ok(&self.entry(class)?.name)
    }

    pub fn parent(&self, class: ClassId) -> CallbackResult<Option<ClassId>> {
        Ok(self.entry(class)?.parent)
    }

    /// 類別本身在前、根類別在後的祖先序列
    pub fn ancestry(&self, class: ClassId) -> CallbackResult<Vec<ClassId>> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            chain.push(id);
            current = self.entry(id)?.parent;
        }
        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn define_action(&mut self, class: ClassId, name: &str, callable: Callable<T, V>) -> CallbackResult<()> {
        let entry = self.entry_mut(class)?;
        if entry.methods.define_action(name, callable) {
            debug!("覆寫方法 {}#{}", entry.name, name);
        }
        Ok(())
    }

    pub fn define_predicate(&mut self, class: ClassId, name: &str, predicate: PredicateFn<T>) -> CallbackResult<()> {
        let entry = self.entry_mut(class)?;
        if entry.methods.define_predicate(name, predicate) {
            debug!("覆寫謂詞 {}#{}", entry.name, name);
        }
        Ok(())
    }

    /// 沿祖先鏈解析動作方法，最近的定義優先
    pub fn resolve_action(&self, class: ClassId, name: &str) -> CallbackResult<Callable<T, V>> {
        for id in self.ancestry(class)? {
            if let Some(callable) = self.entry(id)?.methods.action(name) {
                return Ok(callable);
            }
        }
        Err(self.unknown_method(class, name))
    }

    /// 沿祖先鏈解析謂詞方法
    pub fn resolve_predicate(&self, class: ClassId, name: &str) -> CallbackResult<PredicateFn<T>> {
        for id in self.ancestry(class)? {
            if let Some(predicate) = self.entry(id)?.methods.predicate(name) {
                return Ok(predicate);
            }
        }
        Err(self.unknown_method(class, name))
    }

    /// 在附加時一次性解析動作與守衛，產生不可變的過濾器記錄
    pub fn build_record(
        &self,
        class: ClassId,
        event: Arc<str>,
        kind: FilterKind,
        action: Action<T, V>,
        guards: Vec<Guard<T>>,
    ) -> CallbackResult<FilterRecord<T, V>> {
        let (action_ref, handler) = match action {
            Action::Method(name) => {
                let handler = self.resolve_action(class, &name)?;
                (ActionRef::Method(name), handler)
            }
            Action::Inline(callable) => (ActionRef::Inline, callable),
        };

        let resolved = guards
            .into_iter()
            .map(|guard| self.resolve_guard(class, guard))
            .collect::<CallbackResult<Vec<_>>>()?;

        FilterRecord::new(kind, event, action_ref, handler, resolved)
    }

    fn resolve_guard(&self, class: ClassId, guard: Guard<T>) -> CallbackResult<ResolvedGuard<T>> {
        let must_hold = guard.must_hold();
        match guard.condition() {
            Condition::Method(name) => {
                let predicate = self.resolve_predicate(class, name)?;
                Ok(ResolvedGuard::new(must_hold, Some(name.clone()), predicate))
            }
            Condition::Inline(predicate) => Ok(ResolvedGuard::new(must_hold, None, Arc::clone(predicate))),
        }
    }

    fn unknown_method(&self, class: ClassId, method: &str) -> CallbackError {
        CallbackError::UnknownMethod {
            class: self.display_name(class),
            method: method.to_string(),
        }
    }

    /// 錯誤訊息使用的名稱，未註冊時退回識別碼
    pub(crate) fn display_name(&self, class: ClassId) -> String {
        self.classes
            .get(&class)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| class.to_string())
    }

    fn entry(&self, class: ClassId) -> CallbackResult<&ClassEntry<T, V>> {
        self.classes
            .get(&class)
            .ok_or_else(|| CallbackError::UnknownClass(class.to_string()))
    }

    fn entry_mut(&mut self, class: ClassId) -> CallbackResult<&mut ClassEntry<T, V>> {
        self.classes
            .get_mut(&class)
            .ok_or_else(|| CallbackError::UnknownClass(class.to_string()))
    }
}

impl<T, V> Default for ClassHierarchy<T, V> {
    fn default() -> Self {
        Self::new()
    }
}
