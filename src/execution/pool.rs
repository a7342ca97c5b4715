use parking_lot::Mutex;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::context::ExecutionContext;
use crate::config::PoolConfig;

/// 上下文池統計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// 目前存活的上下文數（使用中 + 空閒）
    pub allocated: usize,
    /// 空閒串列長度
    pub free: usize,
    /// 使用中的上下文數
    pub in_use: usize,
    /// 累計取用次數
    pub acquisitions: u64,
}

/// 執行上下文池
///
/// 單純的空閒串列。取用時優先重用已歸還的上下文，否則配置新的；
/// 池的大小追蹤同時進行中的呼叫峰值，而非累計呼叫次數。
pub struct ContextPool<V> {
    free: Mutex<Vec<ExecutionContext<V>>>,
    allocated: AtomicUsize,
    in_use: AtomicUsize,
    acquisitions: AtomicU64,
    max_free: usize,
}

impl<V> ContextPool<V> {
    pub fn new(config: &PoolConfig) -> Self {
        let free = (0..config.initial_capacity)
            .map(|_| ExecutionContext::new())
            .collect::<Vec<_>>();

        Self {
            allocated: AtomicUsize::new(free.len()),
            free: Mutex::new(free),
            in_use: AtomicUsize::new(0),
            acquisitions: AtomicU64::new(0),
            max_free: config.max_free,
        }
    }

    /// 取得一個已重置的上下文；守衛被丟棄時自動歸還
    pub fn acquire(&self) -> PooledContext<'_, V> {
        let serial = self.acquisitions.fetch_add(1, Ordering::Relaxed) + 1;
        let reused = self.free.lock().pop();
        let mut ctx = match reused {
            Some(ctx) => ctx,
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                ExecutionContext::new()
            }
        };
        ctx.begin(serial);
        self.in_use.fetch_add(1, Ordering::Relaxed);

        PooledContext {
            pool: self,
            ctx: Some(ctx),
        }
    }

    fn release(&self, mut ctx: ExecutionContext<V>) {
        ctx.reset();
        self.in_use.fetch_sub(1, Ordering::Relaxed);

        let mut free = self.free.lock();
        if free.len() < self.max_free {
            free.push(ctx);
        } else {
            self.allocated.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            free: self.free.lock().len(),
            in_use: self.in_use.load(Ordering::Relaxed),
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
        }
    }
}

/// 池中取出的上下文，離開作用域（含 panic 展開）時歸還
pub struct PooledContext<'p, V> {
    pool: &'p ContextPool<V>,
    ctx: Option<ExecutionContext<V>>,
}

impl<V> Deref for PooledContext<'_, V> {
    type Target = ExecutionContext<V>;

    fn deref(&self) -> &Self::Target {
        // 僅在 drop 中被取走
        self.ctx.as_ref().unwrap_or_else(|| unreachable!("pooled context already released"))
    }
}

impl<V> DerefMut for PooledContext<'_, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx.as_mut().unwrap_or_else(|| unreachable!("pooled context already released"))
    }
}

impl<V> Drop for PooledContext<'_, V> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
