use thiserror::Error;

use crate::filter::FilterKind;

/// 過濾器動作拋出的錯誤類型
pub type FilterError = Box<dyn std::error::Error + Send + Sync>;

/// 過濾器動作結果類型
pub type FilterResult<T> = Result<T, FilterError>;

/// 回調引擎錯誤類型
#[derive(Error, Debug)]
pub enum CallbackError {
    /// 事件未在類別或其祖先上定義
    #[error("未知事件: {class}#{event}")]
    UnknownEvent { class: String, event: String },

    /// 類別未註冊
    #[error("未知類別: {0}")]
    UnknownClass(String),

    /// 類別名稱重複註冊
    #[error("類別已註冊: {0}")]
    DuplicateClass(String),

    /// 類別仍被子類別引用，無法移除
    #[error("類別 {class} 仍被子類別 {child} 繼承")]
    ClassInUse { class: String, child: String },

    /// 方法名稱無法在類別鏈上解析
    #[error("未知方法: {class}#{method}")]
    UnknownMethod { class: String, method: String },

    /// 沒有符合條件的過濾器可以移除
    #[error("找不到過濾器: {class}#{event} {kind} {method}")]
    UnknownFilter {
        class: String,
        event: String,
        kind: FilterKind,
        method: String,
    },

    /// 過濾器種類與動作形態不符
    #[error("無效的過濾器: {0}")]
    InvalidFilter(String),

    /// 重複定義的組合區塊
    #[error("重複定義: {0}")]
    DuplicateDefinition(String),

    /// 組合區塊未定義
    #[error("未知組合區塊: {0}")]
    UnknownConcern(String),

    /// 過濾器動作執行失敗
    #[error("過濾器執行失敗 ({event} {kind}): {source}")]
    FilterExecution {
        event: String,
        kind: FilterKind,
        #[source]
        source: FilterError,
    },

    /// 配置錯誤
    #[error("配置錯誤: {0}")]
    Config(String),
}

impl CallbackError {
    /// 判斷錯誤是否來自過濾器動作本身
    pub fn is_filter_failure(&self) -> bool {
        matches!(self, Self::FilterExecution { .. })
    }
}

/// 回調引擎結果類型別名
pub type CallbackResult<T> = Result<T, CallbackError>;
