use dashmap::DashMap;
use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};
use std::sync::Arc;
use tracing::debug;

use super::callback_chain::{Chain, ChainDescription};
use crate::class::{ClassHierarchy, ClassId};
use crate::error::{CallbackError, CallbackResult};
use crate::filter::{Action, AttachOptions, Callable, FilterKind, FilterSpec, Guard, PredicateFn};

type ClassChains<T, V> = FxHashMap<Arc<str>, Arc<Chain<T, V>>>;

/// 回調鏈註冊表
///
/// 以類別識別碼為鍵保存每個類別自己的鏈。子類別第一次存取祖先定義的事件時，
/// 從最近的祖先複製一份過濾器快照，之後兩者各自獨立變更。
pub struct ChainRegistry<T, V> {
    classes: RwLock<ClassHierarchy<T, V>>,
    chains: DashMap<ClassId, ClassChains<T, V>, FxBuildHasher>,
}

impl<T, V> ChainRegistry<T, V> {
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(ClassHierarchy::new()),
            chains: DashMap::with_hasher(FxBuildHasher),
        }
    }

    // ===== 類別 =====

    pub fn register_class(&self, name: &str, parent: Option<ClassId>) -> CallbackResult<ClassId> {
        self.classes.write().register(name, parent)
    }

    /// 移除類別及其所有回調鏈
    ///
    /// 兩者在同一個類別寫鎖內移除，`install` 不會替已移除的類別留下鏈。
    pub fn remove_class(&self, class: ClassId) -> CallbackResult<()> {
        let mut classes = self.classes.write();
        let name = classes.remove(class)?;
        let removed = self.chains.remove(&class).map(|(_, chains)| chains.len()).unwrap_or(0);
        drop(classes);

        debug!("類別 {} 已移除，釋放 {} 條回調鏈", name, removed);
        Ok(())
    }

    /// 類別本身在前的祖先序列
    pub fn ancestry(&self, class: ClassId) -> CallbackResult<Vec<ClassId>> {
        self.classes.read().ancestry(class)
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.classes.read().lookup(name)
    }

    pub fn class_name(&self, class: ClassId) -> CallbackResult<String> {
        self.classes.read().name(class).map(str::to_string)
    }

    pub fn define_method(&self, class: ClassId, name: &str, callable: Callable<T, V>) -> CallbackResult<()> {
        self.classes.write().define_action(class, name, callable)
    }

    pub fn define_predicate(&self, class: ClassId, name: &str, predicate: PredicateFn<T>) -> CallbackResult<()> {
        self.classes.write().define_predicate(class, name, predicate)
    }

    // ===== 事件與過濾器 =====

    /// 確保類別上存在該事件的鏈；冪等
    pub fn define_event(&self, class: ClassId, event: &str) -> CallbackResult<()> {
        if self.local_chain(class, event).is_some() {
            return Ok(());
        }
        match self.resolve(class, event) {
            Ok(_) => Ok(()),
            Err(CallbackError::UnknownEvent { .. }) => {
                self.install(class, Chain::new(Arc::from(event)))?;
                debug!("定義事件 {}#{}", self.display_name(class), event);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// 附加過濾器到類別自己的鏈，只遞增該鏈的版本號
    pub fn attach_filter(
        &self,
        class: ClassId,
        event: &str,
        kind: FilterKind,
        action: Action<T, V>,
        guards: Vec<Guard<T>>,
        options: AttachOptions,
    ) -> CallbackResult<u64> {
        let chain = self.resolve(class, event)?;
        let record = self
            .classes
            .read()
            .build_record(class, chain.event_key(), kind, action, guards)?;

        let version = chain.insert(record, options.prepend);
        debug!(
            "附加 {} 過濾器到 {}#{} (version {})",
            kind,
            self.display_name(class),
            event,
            version
        );
        Ok(version)
    }

    pub fn attach(&self, class: ClassId, event: &str, spec: FilterSpec<T, V>) -> CallbackResult<u64> {
        self.attach_filter(class, event, spec.kind, spec.action, spec.guards, spec.options)
    }

    /// 依序附加多個過濾器
    ///
    /// 先解析所有事件、方法與謂詞，全部成功後才寫入；任何一個失敗時不變更任何鏈。
    pub fn attach_all(&self, class: ClassId, specs: Vec<(String, FilterSpec<T, V>)>) -> CallbackResult<usize> {
        let mut chains = Vec::with_capacity(specs.len());
        for (event, spec) in specs {
            chains.push((self.resolve(class, &event)?, spec));
        }

        let staged = {
            let classes = self.classes.read();
            chains
                .into_iter()
                .map(|(chain, spec)| {
                    let record = classes.build_record(class, chain.event_key(), spec.kind, spec.action, spec.guards)?;
                    Ok((chain, record, spec.options.prepend))
                })
                .collect::<CallbackResult<Vec<_>>>()?
        };

        let count = staged.len();
        for (chain, record, prepend) in staged {
            chain.insert(record, prepend);
        }
        debug!("批次附加 {} 個過濾器到 {}", count, self.display_name(class));
        Ok(count)
    }

    /// 移除類別鏈上引用指定方法的過濾器
    pub fn skip_filter(&self, class: ClassId, event: &str, kind: FilterKind, method: &str) -> CallbackResult<u64> {
        let chain = self.resolve(class, event)?;
        let removed = chain.remove_where(|record| {
            record.kind() == kind && record.action().method_name() == Some(method)
        });
        if removed == 0 {
            return Err(CallbackError::UnknownFilter {
                class: self.display_name(class),
                event: event.to_string(),
                kind,
                method: method.to_string(),
            });
        }

        debug!("從 {}#{} 移除 {} 個 {} 過濾器 {}", self.display_name(class), event, removed, kind, method);
        Ok(chain.version())
    }

    /// 清空類別鏈上的所有過濾器，事件保持定義
    pub fn reset_event(&self, class: ClassId, event: &str) -> CallbackResult<u64> {
        let chain = self.resolve(class, event)?;
        Ok(chain.clear())
    }

    /// 取得要執行的鏈，必要時從最近的祖先建立快照
    pub fn resolve(&self, class: ClassId, event: &str) -> CallbackResult<Arc<Chain<T, V>>> {
        if let Some(chain) = self.local_chain(class, event) {
            return Ok(chain);
        }

        let ancestry = self.classes.read().ancestry(class)?;
        for ancestor in ancestry.iter().skip(1) {
            if let Some(source) = self.local_chain(*ancestor, event) {
                let seeded = Chain::seeded(source.event_key(), source.filters());
                debug!(
                    "{}#{} 從 {} 建立繼承快照 ({} 個過濾器)",
                    self.display_name(class),
                    event,
                    self.display_name(*ancestor),
                    seeded.len()
                );
                return self.install(class, seeded);
            }
        }

        Err(CallbackError::UnknownEvent {
            class: self.display_name(class),
            event: event.to_string(),
        })
    }

    /// 類別自身或祖先上定義的事件名稱（排序）
    pub fn events(&self, class: ClassId) -> CallbackResult<Vec<String>> {
        let ancestry = self.classes.read().ancestry(class)?;
        let mut events = ancestry
            .iter()
            .filter_map(|id| self.chains.get(id))
            .flat_map(|chains| chains.keys().map(|key| key.to_string()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        events.sort();
        events.dedup();
        Ok(events)
    }

    pub fn chain_version(&self, class: ClassId, event: &str) -> CallbackResult<u64> {
        Ok(self.resolve(class, event)?.version())
    }

    pub fn chain_len(&self, class: ClassId, event: &str) -> CallbackResult<usize> {
        Ok(self.resolve(class, event)?.len())
    }

    pub fn describe(&self, class: ClassId, event: &str) -> CallbackResult<ChainDescription> {
        Ok(self.resolve(class, event)?.describe())
    }

    /// 已具體化的鏈總數
    pub fn chain_count(&self) -> usize {
        self.chains.iter().map(|entry| entry.value().len()).sum()
    }

    fn local_chain(&self, class: ClassId, event: &str) -> Option<Arc<Chain<T, V>>> {
        self.chains.get(&class).and_then(|chains| chains.get(event).cloned())
    }

    /// 安裝鏈；若其他執行緒已先安裝則沿用既有的
    ///
    /// 持有類別讀鎖直到寫入完成，與 `remove_class` 互斥。
    fn install(&self, class: ClassId, chain: Chain<T, V>) -> CallbackResult<Arc<Chain<T, V>>> {
        let classes = self.classes.read();
        if !classes.contains(class) {
            return Err(CallbackError::UnknownClass(class.to_string()));
        }

        let mut chains = self.chains.entry(class).or_default();
        Ok(Arc::clone(chains.entry(chain.event_key()).or_insert_with(|| Arc::new(chain))))
    }

    fn display_name(&self, class: ClassId) -> String {
        self.classes.read().display_name(class)
    }
}

impl<T, V> Default for ChainRegistry<T, V> {
    fn default() -> Self {
        Self::new()
    }
}
