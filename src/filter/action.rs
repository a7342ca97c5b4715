use std::fmt;
use std::sync::Arc;

use crate::error::FilterResult;
use crate::execution::Next;

/// before/after 動作的執行結果
///
/// `Halt` 是保留的停止訊號；`False` 僅表示動作回傳了假值，
/// 只有在 `HaltPolicy::LegacyFalsy` 下才會讓 before 過濾器中止鏈。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V> {
    /// 正常完成，繼續執行
    Continue,
    /// 回傳假值
    False,
    /// 明確要求中止，可附帶結果值
    Halt(Option<V>),
}

impl<V> Outcome<V> {
    /// 不帶結果值的中止
    pub fn halt() -> Self {
        Outcome::Halt(None)
    }

    /// 帶結果值的中止
    pub fn halt_with(value: V) -> Self {
        Outcome::Halt(Some(value))
    }

    /// 將布林值轉換為結果（`false` 對應 `Outcome::False`）
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Outcome::Continue
        } else {
            Outcome::False
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Outcome::Halt(_))
    }
}

/// before/after 動作
pub type SimpleFn<T, V> = Arc<dyn Fn(&mut T) -> FilterResult<Outcome<V>> + Send + Sync>;

/// around 動作，透過 `Next` 執行被包裹的部分
pub type AroundFn<T, V> = Arc<dyn Fn(&mut T, Next<'_, T, V>) -> FilterResult<()> + Send + Sync>;

/// 已解析的可呼叫動作
pub enum Callable<T, V> {
    Simple(SimpleFn<T, V>),
    Around(AroundFn<T, V>),
}

impl<T, V> Callable<T, V> {
    /// 建立 before/after 使用的動作
    pub fn simple<F>(f: F) -> Self
    where
        F: Fn(&mut T) -> FilterResult<Outcome<V>> + Send + Sync + 'static,
    {
        Callable::Simple(Arc::new(f))
    }

    /// 建立 around 使用的動作
    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut T, Next<'_, T, V>) -> FilterResult<()> + Send + Sync + 'static,
    {
        Callable::Around(Arc::new(f))
    }

    pub fn is_around(&self) -> bool {
        matches!(self, Callable::Around(_))
    }
}

impl<T, V> Clone for Callable<T, V> {
    fn clone(&self) -> Self {
        match self {
            Callable::Simple(f) => Callable::Simple(Arc::clone(f)),
            Callable::Around(f) => Callable::Around(Arc::clone(f)),
        }
    }
}

impl<T, V> fmt::Debug for Callable<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Simple(_) => f.write_str("Callable::Simple"),
            Callable::Around(_) => f.write_str("Callable::Around"),
        }
    }
}

/// 附加過濾器時提供的動作
///
/// `Method` 在附加時對類別的方法表解析一次，之後執行期間不再按名稱查找。
pub enum Action<T, V> {
    Method(String),
    Inline(Callable<T, V>),
}

impl<T, V> Action<T, V> {
    /// 引用類別上定義的方法
    pub fn method(name: impl Into<String>) -> Self {
        Action::Method(name.into())
    }

    /// 內聯的 before/after 動作
    pub fn inline<F>(f: F) -> Self
    where
        F: Fn(&mut T) -> FilterResult<Outcome<V>> + Send + Sync + 'static,
    {
        Action::Inline(Callable::simple(f))
    }

    /// 內聯的 around 動作
    pub fn around<F>(f: F) -> Self
    where
        F: Fn(&mut T, Next<'_, T, V>) -> FilterResult<()> + Send + Sync + 'static,
    {
        Action::Inline(Callable::around(f))
    }
}

impl<T, V> Clone for Action<T, V> {
    fn clone(&self) -> Self {
        match self {
            Action::Method(name) => Action::Method(name.clone()),
            Action::Inline(callable) => Action::Inline(callable.clone()),
        }
    }
}

impl<T, V> fmt::Debug for Action<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Method(name) => write!(f, "Action::Method({})", name),
            Action::Inline(callable) => write!(f, "Action::Inline({:?})", callable),
        }
    }
}
