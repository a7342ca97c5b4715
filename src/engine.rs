//! 回調引擎
//!
//! 將鏈註冊表、組合區塊、上下文池與執行器組合成對外使用的介面。
//! 註冊表以 `Arc` 持有，可以由多個引擎共用或注入。

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::chain::{ChainDescription, ChainRegistry};
use crate::class::{CallbackTarget, ClassId};
use crate::concern::{Concern, ConcernRegistry};
use crate::config::{get_config, EngineConfig, HaltPolicy};
use crate::error::CallbackResult;
use crate::execution::{ContextPool, Executor, PoolStats, RunOutcome};
use crate::filter::{Action, AttachOptions, Callable, FilterKind, FilterSpec, Guard};
use crate::monitor::{EngineMetrics, MetricType};

/// 回調引擎
pub struct CallbackEngine<T, V> {
    registry: Arc<ChainRegistry<T, V>>,
    concerns: ConcernRegistry<T, V>,
    pool: ContextPool<V>,
    policy: HaltPolicy,
    metrics_enabled: bool,
}

impl<T, V> CallbackEngine<T, V> {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_registry(Arc::new(ChainRegistry::new()), config)
    }

    /// 使用全局配置建立引擎
    pub fn from_global_config() -> Self {
        Self::new(get_config())
    }

    /// 使用外部提供的註冊表建立引擎
    pub fn with_registry(registry: Arc<ChainRegistry<T, V>>, config: &EngineConfig) -> Self {
        debug!(
            "建立回調引擎 (halt_policy={:?}, pool.initial_capacity={}, pool.max_free={})",
            config.engine.halt_policy, config.pool.initial_capacity, config.pool.max_free
        );
        Self {
            registry,
            concerns: ConcernRegistry::new(),
            pool: ContextPool::new(&config.pool),
            policy: config.engine.halt_policy,
            metrics_enabled: config.metrics.enabled,
        }
    }

    pub fn registry(&self) -> &Arc<ChainRegistry<T, V>> {
        &self.registry
    }

    pub fn halt_policy(&self) -> HaltPolicy {
        self.policy
    }

    // ===== 類別 =====

    pub fn register_class(&self, name: &str, parent: Option<ClassId>) -> CallbackResult<ClassId> {
        self.registry.register_class(name, parent)
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.registry.class_id(name)
    }

    /// 移除類別、其回調鏈與組合區塊套用記錄
    pub fn remove_class(&self, class: ClassId) -> CallbackResult<()> {
        self.registry.remove_class(class)?;
        self.concerns.forget_class(class);
        Ok(())
    }

    pub fn define_method(&self, class: ClassId, name: &str, callable: Callable<T, V>) -> CallbackResult<()> {
        self.registry.define_method(class, name, callable)
    }

    pub fn define_predicate<F>(&self, class: ClassId, name: &str, predicate: F) -> CallbackResult<()>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.registry.define_predicate(class, name, Arc::new(predicate))
    }

    // ===== 事件與過濾器 =====

    pub fn define_event(&self, class: ClassId, event: &str) -> CallbackResult<()> {
        self.registry.define_event(class, event)
    }

    pub fn attach_filter(
        &self,
        class: ClassId,
        event: &str,
        kind: FilterKind,
        action: Action<T, V>,
        guards: Vec<Guard<T>>,
        options: AttachOptions,
    ) -> CallbackResult<u64> {
        self.registry.attach_filter(class, event, kind, action, guards, options)
    }

    pub fn attach(&self, class: ClassId, event: &str, spec: FilterSpec<T, V>) -> CallbackResult<u64> {
        self.registry.attach(class, event, spec)
    }

    pub fn skip_filter(&self, class: ClassId, event: &str, kind: FilterKind, method: &str) -> CallbackResult<u64> {
        self.registry.skip_filter(class, event, kind, method)
    }

    pub fn reset_event(&self, class: ClassId, event: &str) -> CallbackResult<u64> {
        self.registry.reset_event(class, event)
    }

    // ===== 組合區塊 =====

    pub fn define_concern(&self, concern: Concern<T, V>) -> CallbackResult<()> {
        self.concerns.define(concern)
    }

    /// 套用組合區塊，回傳本次是否實際套用
    pub fn include_concern(&self, class: ClassId, name: &str) -> CallbackResult<bool> {
        self.concerns.include(&self.registry, class, name)
    }

    pub fn included_concerns(&self, class: ClassId) -> Vec<String> {
        self.concerns.included_in(class)
    }

    // ===== 執行 =====

    /// 在目標上觸發事件
    ///
    /// 工作單元最多執行一次。中止不是錯誤：回傳 `halted = true` 與中止過濾器提供的值。
    /// 過濾器拋出的錯誤以 `CallbackError::FilterExecution` 回傳，上下文在返回前已歸還。
    pub fn run_event<F>(&self, target: &mut T, event: &str, unit_of_work: F) -> CallbackResult<RunOutcome<V>>
    where
        T: CallbackTarget,
        F: FnOnce(&mut T) -> V,
    {
        let chain = self.registry.resolve(target.class_id(), event)?;
        let stale = !chain.is_compiled();
        let program = chain.program();
        if stale && self.metrics_enabled {
            EngineMetrics::record(event, MetricType::Compiled, None);
        }

        let started = Instant::now();
        let result = Executor::new(&self.pool, self.policy).run(&program, target, unit_of_work);

        match &result {
            Ok(outcome) => trace!(
                "事件 {} 執行完成 (halted={}, {:?})",
                event,
                outcome.halted,
                started.elapsed()
            ),
            Err(err) => debug!("事件 {} 執行失敗: {}", event, err),
        }

        if self.metrics_enabled {
            let metric = match &result {
                Ok(outcome) if outcome.halted => MetricType::Halted,
                Ok(_) => MetricType::Completed,
                Err(_) => MetricType::Failed,
            };
            EngineMetrics::record(event, metric, None);
            EngineMetrics::record(event, MetricType::Latency, Some(started.elapsed()));
        }

        result
    }

    // ===== 診斷 =====

    pub fn pool_stats(&self) -> PoolStats {
        let stats = self.pool.stats();
        if self.metrics_enabled {
            EngineMetrics::record_pool(&stats);
        }
        stats
    }

    pub fn chain_version(&self, class: ClassId, event: &str) -> CallbackResult<u64> {
        self.registry.chain_version(class, event)
    }

    pub fn chain_len(&self, class: ClassId, event: &str) -> CallbackResult<usize> {
        self.registry.chain_len(class, event)
    }

    pub fn describe(&self, class: ClassId, event: &str) -> CallbackResult<ChainDescription> {
        self.registry.describe(class, event)
    }

    pub fn events(&self, class: ClassId) -> CallbackResult<Vec<String>> {
        self.registry.events(class)
    }
}

impl<T, V> Default for CallbackEngine<T, V> {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
