//! 執行模組
//!
//! 每次事件觸發從池中取得一個執行上下文，由執行器沿編譯後的程式前進，
//! 結束時（包含失敗路徑）將上下文歸還池中。

pub mod context;
pub mod executor;
pub mod pool;

pub use context::ExecutionContext;
pub use executor::{ChainAborted, Executor, Next, RunOutcome};
pub use pool::{ContextPool, PoolStats, PooledContext};
