use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::action::{Action, Callable, Outcome};
use super::guard::{Guard, ResolvedGuard};
use crate::error::{CallbackError, CallbackResult, FilterResult};
use crate::execution::Next;

/// 過濾器種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Before,
    After,
    Around,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Before => "before",
            FilterKind::After => "after",
            FilterKind::Around => "around",
        }
    }

    /// before 與 around 共用同一個排序分組
    pub(crate) fn same_group(&self, other: FilterKind) -> bool {
        (*self == FilterKind::After) == (other == FilterKind::After)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 過濾器動作的來源，用於診斷與 skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum ActionRef {
    Method(String),
    Inline,
}

impl ActionRef {
    pub fn method_name(&self) -> Option<&str> {
        match self {
            ActionRef::Method(name) => Some(name),
            ActionRef::Inline => None,
        }
    }
}

/// 附加選項
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachOptions {
    /// 插入到同種類分組的最前面，而非附加到最後
    pub prepend: bool,
}

/// 單個已附加的過濾器
///
/// 建立後不可變。子類別繼承時複製記錄，而非共享。
pub struct FilterRecord<T, V> {
    kind: FilterKind,
    action: ActionRef,
    handler: Callable<T, V>,
    guards: Vec<ResolvedGuard<T>>,
    chain_key: Arc<str>,
}

impl<T, V> FilterRecord<T, V> {
    pub fn new(
        kind: FilterKind,
        chain_key: Arc<str>,
        action: ActionRef,
        handler: Callable<T, V>,
        guards: Vec<ResolvedGuard<T>>,
    ) -> CallbackResult<Self> {
        if handler.is_around() != (kind == FilterKind::Around) {
            return Err(CallbackError::InvalidFilter(format!(
                "{} 過濾器 ({:?}) 的動作形態為 {:?}",
                kind, action, handler
            )));
        }

        Ok(Self {
            kind,
            action,
            handler,
            guards,
            chain_key,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn action(&self) -> &ActionRef {
        &self.action
    }

    pub fn guards(&self) -> &[ResolvedGuard<T>] {
        &self.guards
    }

    /// 所屬事件名稱
    pub fn chain_key(&self) -> &str {
        &self.chain_key
    }

    /// 所有守衛都滿足時才執行
    #[inline]
    pub fn guards_pass(&self, target: &T) -> bool {
        self.guards.iter().all(|guard| guard.passes(target))
    }

    pub(crate) fn call_simple(&self, target: &mut T) -> FilterResult<Outcome<V>> {
        match &self.handler {
            Callable::Simple(f) => f(target),
            Callable::Around(_) => Err(format!("{} 過濾器不接受 around 動作", self.kind).into()),
        }
    }

    pub(crate) fn call_around(&self, target: &mut T, next: Next<'_, T, V>) -> FilterResult<()> {
        match &self.handler {
            Callable::Around(f) => f(target, next),
            Callable::Simple(_) => Err("around 過濾器缺少 around 動作".into()),
        }
    }
}

impl<T, V> Clone for FilterRecord<T, V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            action: self.action.clone(),
            handler: self.handler.clone(),
            guards: self.guards.clone(),
            chain_key: Arc::clone(&self.chain_key),
        }
    }
}

impl<T, V> fmt::Debug for FilterRecord<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRecord")
            .field("kind", &self.kind)
            .field("action", &self.action)
            .field("guards", &self.guards)
            .field("chain_key", &self.chain_key)
            .finish()
    }
}

/// 待附加的過濾器描述
///
/// ```ignore
/// FilterSpec::before(Action::method("normalize"))
///     .guard(Guard::unless_method("archived"))
///     .prepend();
/// ```
pub struct FilterSpec<T, V> {
    pub(crate) kind: FilterKind,
    pub(crate) action: Action<T, V>,
    pub(crate) guards: Vec<Guard<T>>,
    pub(crate) options: AttachOptions,
}

impl<T, V> FilterSpec<T, V> {
    pub fn new(kind: FilterKind, action: Action<T, V>) -> Self {
        Self {
            kind,
            action,
            guards: Vec::new(),
            options: AttachOptions::default(),
        }
    }

    pub fn before(action: Action<T, V>) -> Self {
        Self::new(FilterKind::Before, action)
    }

    pub fn after(action: Action<T, V>) -> Self {
        Self::new(FilterKind::After, action)
    }

    pub fn around(action: Action<T, V>) -> Self {
        Self::new(FilterKind::Around, action)
    }

    pub fn guard(mut self, guard: Guard<T>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn when<F>(self, f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.guard(Guard::when(f))
    }

    pub fn unless<F>(self, f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.guard(Guard::unless(f))
    }

    pub fn prepend(mut self) -> Self {
        self.options.prepend = true;
        self
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }
}

impl<T, V> Clone for FilterSpec<T, V> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            action: self.action.clone(),
            guards: self.guards.clone(),
            options: self.options,
        }
    }
}

impl<T, V> fmt::Debug for FilterSpec<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("kind", &self.kind)
            .field("action", &self.action)
            .field("guards", &self.guards)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn key() -> Arc<str> {
        Arc::from("save")
    }

    #[test]
    fn test_kind_groups() {
        assert!(FilterKind::Before.same_group(FilterKind::Around));
        assert!(FilterKind::After.same_group(FilterKind::After));
        assert!(!FilterKind::After.same_group(FilterKind::Before));
        assert_eq!(FilterKind::Around.to_string(), "around");
    }

    #[test]
    fn test_record_rejects_mismatched_shape() {
        let around: Callable<u32, ()> = Callable::around(|target, next| next.run(target));
        let result = FilterRecord::new(FilterKind::Before, key(), ActionRef::Inline, around, Vec::new());
        assert_matches!(result, Err(CallbackError::InvalidFilter(_)));

        let simple: Callable<u32, ()> = Callable::simple(|_| Ok(Outcome::Continue));
        let result = FilterRecord::new(FilterKind::Around, key(), ActionRef::Inline, simple, Vec::new());
        assert_matches!(result, Err(CallbackError::InvalidFilter(_)));
    }

    #[test]
    fn test_record_guards_and_call() {
        let simple: Callable<u32, ()> = Callable::simple(|value| {
            *value += 1;
            Ok(Outcome::Continue)
        });
        let guard = ResolvedGuard::new(true, None, Arc::new(|value: &u32| *value < 10));
        let record =
            FilterRecord::new(FilterKind::After, key(), ActionRef::Method("bump".into()), simple, vec![guard])
                .unwrap();

        let mut target = 1;
        assert!(record.guards_pass(&target));
        assert_eq!(record.call_simple(&mut target).unwrap(), Outcome::Continue);
        assert_eq!(target, 2);
        assert!(!record.guards_pass(&10));
        assert_eq!(record.chain_key(), "save");
        assert_eq!(record.action().method_name(), Some("bump"));
    }

    #[test]
    fn test_spec_builder() {
        let spec: FilterSpec<u32, ()> = FilterSpec::after(Action::method("audit"))
            .when(|v| *v > 0)
            .guard(Guard::unless_method("archived"))
            .prepend();
        assert_eq!(spec.kind(), FilterKind::After);
        assert_eq!(spec.guards.len(), 2);
        assert!(spec.options.prepend);
    }
}
