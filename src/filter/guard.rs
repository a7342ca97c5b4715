use std::fmt;
use std::sync::Arc;

/// 守衛謂詞
pub type PredicateFn<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// 尚未解析的條件：類別上的具名謂詞或內聯閉包
pub enum Condition<T> {
    Method(String),
    Inline(PredicateFn<T>),
}

impl<T> Clone for Condition<T> {
    fn clone(&self) -> Self {
        match self {
            Condition::Method(name) => Condition::Method(name.clone()),
            Condition::Inline(f) => Condition::Inline(Arc::clone(f)),
        }
    }
}

/// 附加過濾器時指定的守衛
pub enum Guard<T> {
    /// 謂詞必須成立
    If(Condition<T>),
    /// 謂詞必須不成立
    Unless(Condition<T>),
}

impl<T> Guard<T> {
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Guard::If(Condition::Inline(Arc::new(f)))
    }

    pub fn unless<F>(f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Guard::Unless(Condition::Inline(Arc::new(f)))
    }

    pub fn if_method(name: impl Into<String>) -> Self {
        Guard::If(Condition::Method(name.into()))
    }

    pub fn unless_method(name: impl Into<String>) -> Self {
        Guard::Unless(Condition::Method(name.into()))
    }

    pub(crate) fn must_hold(&self) -> bool {
        matches!(self, Guard::If(_))
    }

    pub(crate) fn condition(&self) -> &Condition<T> {
        match self {
            Guard::If(condition) | Guard::Unless(condition) => condition,
        }
    }
}

impl<T> Clone for Guard<T> {
    fn clone(&self) -> Self {
        match self {
            Guard::If(c) => Guard::If(c.clone()),
            Guard::Unless(c) => Guard::Unless(c.clone()),
        }
    }
}

impl<T> fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let polarity = if self.must_hold() { "If" } else { "Unless" };
        match self.condition() {
            Condition::Method(name) => write!(f, "Guard::{}({})", polarity, name),
            Condition::Inline(_) => write!(f, "Guard::{}(<inline>)", polarity),
        }
    }
}

/// 附加時已解析的守衛
///
/// 每次執行都重新求值，不快取結果。
pub struct ResolvedGuard<T> {
    must_hold: bool,
    label: Option<String>,
    predicate: PredicateFn<T>,
}

impl<T> ResolvedGuard<T> {
    pub(crate) fn new(must_hold: bool, label: Option<String>, predicate: PredicateFn<T>) -> Self {
        Self {
            must_hold,
            label,
            predicate,
        }
    }

    /// 對目標求值
    #[inline]
    pub fn passes(&self, target: &T) -> bool {
        (self.predicate)(target) == self.must_hold
    }

    pub fn must_hold(&self) -> bool {
        self.must_hold
    }

    /// 具名謂詞的名稱，內聯謂詞為 `None`
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl<T> Clone for ResolvedGuard<T> {
    fn clone(&self) -> Self {
        Self {
            must_hold: self.must_hold,
            label: self.label.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T> fmt::Debug for ResolvedGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedGuard")
            .field("must_hold", &self.must_hold)
            .field("label", &self.label)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_polarity() {
        let positive = ResolvedGuard::<i32>::new(true, None, Arc::new(|v: &i32| *v > 0));
        let negative = ResolvedGuard::<i32>::new(false, Some("positive".into()), Arc::new(|v: &i32| *v > 0));

        assert!(positive.passes(&1));
        assert!(!positive.passes(&-1));
        assert!(!negative.passes(&1));
        assert!(negative.passes(&-1));
        assert_eq!(negative.label(), Some("positive"));
    }

    #[test]
    fn test_guard_debug() {
        let guard: Guard<i32> = Guard::unless_method("archived");
        assert_eq!(format!("{:?}", guard), "Guard::Unless(archived)");
        assert!(Guard::<i32>::when(|_| true).must_hold());
    }
}
