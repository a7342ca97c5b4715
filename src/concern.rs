//! 可重用的事件與過濾器組合區塊
//!
//! 一個 `Concern` 是具名的一組事件定義與過濾器附加。定義一次後可以套用到
//! 任意類別；同一區塊重複套用到同一類別時不做任何事。

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::chain::ChainRegistry;
use crate::class::ClassId;
use crate::error::{CallbackError, CallbackResult};
use crate::filter::FilterSpec;

/// 具名的組合區塊
pub struct Concern<T, V> {
    name: String,
    events: Vec<String>,
    filters: Vec<(String, FilterSpec<T, V>)>,
}

impl<T, V> Concern<T, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Vec::new(),
            filters: Vec::new(),
        }
    }

    /// 套用時定義事件
    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    /// 套用時附加過濾器；依加入順序附加
    pub fn filter(mut self, event: impl Into<String>, spec: FilterSpec<T, V>) -> Self {
        self.filters.push((event.into(), spec));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    fn apply(&self, registry: &ChainRegistry<T, V>, class: ClassId) -> CallbackResult<()> {
        for event in &self.events {
            registry.define_event(class, event)?;
        }
        registry.attach_all(class, self.filters.clone())?;
        Ok(())
    }
}

impl<T, V> fmt::Debug for Concern<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Concern")
            .field("name", &self.name)
            .field("events", &self.events)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// 組合區塊註冊表
pub struct ConcernRegistry<T, V> {
    concerns: RwLock<FxHashMap<String, Arc<Concern<T, V>>>>,
    included: Mutex<FxHashSet<(ClassId, String)>>,
}

impl<T, V> ConcernRegistry<T, V> {
    pub fn new() -> Self {
        Self {
            concerns: RwLock::new(FxHashMap::default()),
            included: Mutex::new(FxHashSet::default()),
        }
    }

    /// 定義組合區塊；名稱重複時回傳 `DuplicateDefinition`
    pub fn define(&self, concern: Concern<T, V>) -> CallbackResult<()> {
        let mut concerns = self.concerns.write();
        if concerns.contains_key(concern.name()) {
            return Err(CallbackError::DuplicateDefinition(concern.name().to_string()));
        }

        debug!(
            "定義組合區塊 {} ({} 個事件, {} 個過濾器)",
            concern.name(),
            concern.events.len(),
            concern.filter_count()
        );
        concerns.insert(concern.name().to_string(), Arc::new(concern));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.concerns.read().contains_key(name)
    }

    /// 套用組合區塊到類別，回傳本次是否實際套用
    ///
    /// 類別或任一祖先已套用時不做任何事。套用失敗時不附加任何過濾器，
    /// 也不記錄為已套用；區塊宣告的事件仍保持定義。
    pub fn include(&self, registry: &ChainRegistry<T, V>, class: ClassId, name: &str) -> CallbackResult<bool> {
        let concern = self
            .concerns
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::UnknownConcern(name.to_string()))?;

        let ancestry = registry.ancestry(class)?;
        // 持有鎖直到套用完成，避免同一區塊被並行套用兩次
        let mut included = self.included.lock();
        if let Some(owner) = ancestry
            .iter()
            .find(|id| included.contains(&(**id, name.to_string())))
        {
            if *owner != class {
                debug!("組合區塊 {} 已由祖先 {} 套用，類別 {} 略過", name, owner, class);
            }
            return Ok(false);
        }
        let key = (class, name.to_string());

        concern.apply(registry, class)?;
        included.insert(key);
        debug!("組合區塊 {} 已套用到類別 {}", name, class);
        Ok(true)
    }

    /// 類別已套用的組合區塊名稱（排序）
    pub fn included_in(&self, class: ClassId) -> Vec<String> {
        let mut names = self
            .included
            .lock()
            .iter()
            .filter(|(id, _)| *id == class)
            .map(|(_, name)| name.clone())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    /// 類別移除後清除套用記錄
    pub(crate) fn forget_class(&self, class: ClassId) {
        self.included.lock().retain(|(id, _)| *id != class);
    }
}

impl<T, V> Default for ConcernRegistry<T, V> {
    fn default() -> Self {
        Self::new()
    }
}
