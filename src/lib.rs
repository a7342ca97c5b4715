// 模組定義
pub mod chain;
pub mod class;
pub mod concern;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod filter;
pub mod monitor;

// 重新導出常用元素
pub use chain::{ChainDescription, ChainRegistry, FilterDescription};
pub use class::{CallbackTarget, ClassId};
pub use concern::Concern;
pub use crate::config::{EngineConfig, HaltPolicy};
pub use engine::CallbackEngine;
pub use error::{CallbackError, CallbackResult, FilterError, FilterResult};
pub use execution::{Next, PoolStats, RunOutcome};
pub use filter::{Action, AttachOptions, Callable, FilterKind, FilterSpec, Guard, Outcome};
