//! 回調鏈模組
//!
//! - `callback_chain`: 單一 (類別, 事件) 的過濾器序列與版本號
//! - `compiler`: 將過濾器序列編譯為扁平指令列表
//! - `registry`: 以類別識別碼為鍵的鏈註冊表，處理繼承快照

pub mod callback_chain;
pub mod compiler;
pub mod registry;

pub use callback_chain::{Chain, ChainDescription, FilterDescription};
pub use compiler::{compile, CompiledProgram, Step, StepShape};
pub use registry::ChainRegistry;
