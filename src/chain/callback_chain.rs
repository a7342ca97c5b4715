use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::compiler::{compile, CompiledProgram};
use crate::filter::{ActionRef, FilterKind, FilterRecord};

struct ChainState<T, V> {
    filters: Vec<FilterRecord<T, V>>,
    version: u64,
    compiled: Option<Arc<CompiledProgram<T, V>>>,
}

/// 單一 (類別, 事件) 的回調鏈
///
/// 每次變更都遞增版本號。編譯結果只有在其版本與鏈版本相同時才會被使用，
/// 重新編譯在寫鎖內完成並發佈，讀者不會看到與版本不符的程式。
pub struct Chain<T, V> {
    event: Arc<str>,
    state: RwLock<ChainState<T, V>>,
}

impl<T, V> Chain<T, V> {
    pub fn new(event: Arc<str>) -> Self {
        Self::seeded(event, Vec::new())
    }

    /// 以祖先鏈的過濾器副本建立新鏈，版本號獨立計算
    pub(crate) fn seeded(event: Arc<str>, filters: Vec<FilterRecord<T, V>>) -> Self {
        Self {
            event,
            state: RwLock::new(ChainState {
                filters,
                version: 0,
                compiled: None,
            }),
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub(crate) fn event_key(&self) -> Arc<str> {
        Arc::clone(&self.event)
    }

    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn len(&self) -> usize {
        self.state.read().filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().filters.is_empty()
    }

    /// 過濾器記錄的副本
    pub fn filters(&self) -> Vec<FilterRecord<T, V>> {
        self.state.read().filters.clone()
    }

    /// 快取的程式是否對應目前版本
    pub fn is_compiled(&self) -> bool {
        let state = self.state.read();
        state
            .compiled
            .as_ref()
            .is_some_and(|program| program.version() == state.version)
    }

    /// 新增過濾器並回傳新版本號
    ///
    /// `prepend` 時插入到同種類分組（before/around 或 after）的最前面。
    pub fn insert(&self, record: FilterRecord<T, V>, prepend: bool) -> u64 {
        let mut state = self.state.write();
        let position = if prepend {
            let kind = record.kind();
            state
                .filters
                .iter()
                .position(|existing| existing.kind().same_group(kind))
                .unwrap_or(if kind == FilterKind::After { state.filters.len() } else { 0 })
        } else {
            state.filters.len()
        };

        state.filters.insert(position, record);
        state.version += 1;
        state.version
    }

    /// 移除符合條件的過濾器，有移除時遞增版本號
    pub fn remove_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&FilterRecord<T, V>) -> bool,
    {
        let mut state = self.state.write();
        let before = state.filters.len();
        state.filters.retain(|record| !predicate(record));
        let removed = before - state.filters.len();
        if removed > 0 {
            state.version += 1;
        }
        removed
    }

    /// 清空過濾器，回傳新版本號
    pub fn clear(&self) -> u64 {
        let mut state = self.state.write();
        state.filters.clear();
        state.version += 1;
        state.version
    }

    /// 取得對應目前版本的編譯程式，必要時重新編譯
    pub fn program(&self) -> Arc<CompiledProgram<T, V>> {
        {
            let state = self.state.read();
            if let Some(program) = &state.compiled {
                if program.version() == state.version {
                    return Arc::clone(program);
                }
            }
        }

        let mut state = self.state.write();
        // 其他執行緒可能已經完成編譯
        if let Some(program) = &state.compiled {
            if program.version() == state.version {
                return Arc::clone(program);
            }
        }

        let program = Arc::new(compile(Arc::clone(&self.event), &state.filters, state.version));
        debug!(
            "編譯回調鏈 {} (version {}, {} 個過濾器, {} 條指令)",
            self.event,
            state.version,
            state.filters.len(),
            program.len()
        );
        state.compiled = Some(Arc::clone(&program));
        program
    }

    pub fn describe(&self) -> ChainDescription {
        let state = self.state.read();
        ChainDescription {
            event: self.event.to_string(),
            version: state.version,
            compiled: state
                .compiled
                .as_ref()
                .is_some_and(|program| program.version() == state.version),
            filters: state
                .filters
                .iter()
                .map(|record| FilterDescription {
                    kind: record.kind(),
                    action: record.action().clone(),
                    guards: record.guards().len(),
                })
                .collect(),
        }
    }
}

/// 鏈的診斷快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainDescription {
    pub event: String,
    pub version: u64,
    pub compiled: bool,
    pub filters: Vec<FilterDescription>,
}

impl ChainDescription {
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDescription {
    pub kind: FilterKind,
    pub action: ActionRef,
    pub guards: usize,
}
