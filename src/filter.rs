//! 過濾器模組
//!
//! 描述附加到事件上的單個過濾器：種類（before/after/around）、動作與守衛條件。
//! 過濾器記錄建立後即不可變，由所屬的回調鏈擁有。

pub mod action;
pub mod guard;
pub mod record;

// 重新導出常用類型
pub use action::{Action, AroundFn, Callable, Outcome, SimpleFn};
pub use guard::{Condition, Guard, PredicateFn, ResolvedGuard};
pub use record::{ActionRef, AttachOptions, FilterKind, FilterRecord, FilterSpec};
