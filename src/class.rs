//! 類別階層模組
//!
//! 僅保存回調引擎需要的類別資訊：名稱、父類別與具名方法表。

pub mod hierarchy;
pub mod methods;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use hierarchy::ClassHierarchy;
pub use methods::MethodTable;

/// 類別識別碼，由註冊表配發
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 可觸發事件的目標物件
pub trait CallbackTarget {
    /// 目標所屬的類別
    fn class_id(&self) -> ClassId;
}
