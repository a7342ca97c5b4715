use thiserror::Error;
use tracing::{trace, warn};

use super::context::ExecutionContext;
use super::pool::ContextPool;
use crate::chain::{CompiledProgram, Step};
use crate::config::HaltPolicy;
use crate::error::{CallbackError, CallbackResult, FilterError, FilterResult};
use crate::filter::{FilterKind, FilterRecord, Outcome};

/// 事件執行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome<V> {
    /// 工作單元或中止過濾器提供的結果
    pub value: Option<V>,
    /// 鏈是否被中止
    pub halted: bool,
}

impl<V> RunOutcome<V> {
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// 未中止時的結果值
    pub fn completed(self) -> Option<V> {
        if self.halted {
            None
        } else {
            self.value
        }
    }
}

/// 巢狀程式失敗時 `Next::run` 回傳的錯誤
///
/// 真正的錯誤已記錄在上下文中，外層 around 返回後由執行器重新拋出。
#[derive(Debug, Error)]
#[error("巢狀過濾器失敗，回調鏈已中止")]
pub struct ChainAborted;

/// 執行器
pub struct Executor<'p, V> {
    pool: &'p ContextPool<V>,
    policy: HaltPolicy,
}

impl<'p, V> Executor<'p, V> {
    pub fn new(pool: &'p ContextPool<V>, policy: HaltPolicy) -> Self {
        Self { pool, policy }
    }

    /// 在目標上執行編譯後的程式
    ///
    /// 工作單元最多執行一次；上下文在所有退出路徑上都會歸還。
    pub fn run<T, F>(
        &self,
        program: &CompiledProgram<T, V>,
        target: &mut T,
        unit_of_work: F,
    ) -> CallbackResult<RunOutcome<V>>
    where
        F: FnOnce(&mut T) -> V,
    {
        let mut ctx = self.pool.acquire();
        let mut unit_of_work = Some(unit_of_work);
        let mut invoke = |target: &mut T| unit_of_work.take().map(|work| work(target));

        trace!(
            "執行事件 {} (version {}, context {})",
            program.event(),
            program.version(),
            ctx.serial()
        );

        let mut frame = Frame {
            program,
            policy: self.policy,
            ctx: &mut *ctx,
            unit: &mut invoke,
        };
        frame.walk(target, 0, program.len())?;

        if let Some(err) = ctx.take_failure() {
            return Err(err);
        }

        Ok(RunOutcome {
            halted: ctx.is_halted(),
            value: ctx.take_value(),
        })
    }
}

/// 一段正在執行的程式區間
struct Frame<'n, T, V> {
    program: &'n CompiledProgram<T, V>,
    policy: HaltPolicy,
    ctx: &'n mut ExecutionContext<V>,
    unit: &'n mut dyn FnMut(&mut T) -> Option<V>,
}

impl<'n, T, V> Frame<'n, T, V> {
    fn reborrow(&mut self) -> Frame<'_, T, V> {
        Frame {
            program: self.program,
            policy: self.policy,
            ctx: &mut *self.ctx,
            unit: &mut *self.unit,
        }
    }

    /// 執行 `[start, end)` 範圍內的步驟，中止時提前返回
    fn walk(&mut self, target: &mut T, start: usize, end: usize) -> CallbackResult<()> {
        let program = self.program;
        let steps = program.steps();
        let mut pc = start;

        while pc < end {
            match &steps[pc] {
                Step::Before(filter) | Step::After(filter) => {
                    if filter.guards_pass(target) {
                        let outcome = filter
                            .call_simple(target)
                            .map_err(|err| self.failure(filter, err))?;
                        if self.apply(filter, outcome) {
                            return Ok(());
                        }
                    }
                    pc += 1;
                }
                Step::Around { filter, end: frame_end } => {
                    if !filter.guards_pass(target) {
                        // 只略過這一層，巢狀步驟照常執行
                        pc += 1;
                        continue;
                    }

                    let mut entered = false;
                    let result = {
                        let next = Next {
                            frame: self.reborrow(),
                            start: pc + 1,
                            end: *frame_end,
                            entered: &mut entered,
                        };
                        filter.call_around(target, next)
                    };

                    if let Some(nested) = self.ctx.take_failure() {
                        return Err(nested);
                    }
                    result.map_err(|err| self.failure(filter, err))?;

                    if !entered {
                        trace!("around 過濾器 {:?} 未呼叫 next，鏈已中止", filter.action());
                        self.ctx.halt(None);
                    }
                    if self.ctx.is_halted() {
                        return Ok(());
                    }
                    pc = *frame_end;
                }
                Step::Invoke => {
                    if let Some(value) = (self.unit)(target) {
                        self.ctx.complete(value);
                    }
                    pc += 1;
                }
            }
        }

        Ok(())
    }

    /// 套用動作結果，回傳是否中止
    fn apply(&mut self, filter: &FilterRecord<T, V>, outcome: Outcome<V>) -> bool {
        match outcome {
            Outcome::Continue => false,
            Outcome::Halt(value) => {
                trace!("{} 過濾器 {:?} 中止事件 {}", filter.kind(), filter.action(), self.program.event());
                self.ctx.halt(value);
                true
            }
            Outcome::False => {
                if filter.kind() == FilterKind::Before && self.policy == HaltPolicy::LegacyFalsy {
                    warn!(
                        "before 過濾器 {:?} 回傳假值，依舊版策略中止事件 {}",
                        filter.action(),
                        self.program.event()
                    );
                    self.ctx.halt(None);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn failure(&self, filter: &FilterRecord<T, V>, source: FilterError) -> CallbackError {
        CallbackError::FilterExecution {
            event: self.program.event().to_string(),
            kind: filter.kind(),
            source,
        }
    }
}

/// around 過濾器的延續
///
/// 呼叫 `run` 會執行這一層包裹的所有步驟（包含工作單元與對應的 after 過濾器）。
/// `run` 會消耗自身，因此同一層最多執行一次。
pub struct Next<'n, T, V> {
    frame: Frame<'n, T, V>,
    start: usize,
    end: usize,
    entered: &'n mut bool,
}

impl<T, V> Next<'_, T, V> {
    pub fn run(mut self, target: &mut T) -> FilterResult<()> {
        *self.entered = true;
        match self.frame.walk(target, self.start, self.end) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.frame.ctx.record_failure(err);
                Err(Box::new(ChainAborted))
            }
        }
    }

    /// 巢狀部分是否已被中止
    pub fn is_halted(&self) -> bool {
        self.frame.ctx.is_halted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::compile;
    use crate::config::PoolConfig;
    use crate::filter::{ActionRef, Callable, ResolvedGuard};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    type Trace = Vec<&'static str>;

    fn record(kind: FilterKind, callable: Callable<Trace, u32>) -> FilterRecord<Trace, u32> {
        FilterRecord::new(kind, Arc::from("save"), ActionRef::Inline, callable, Vec::new()).unwrap()
    }

    fn step(kind: FilterKind, label: &'static str) -> FilterRecord<Trace, u32> {
        record(
            kind,
            Callable::simple(move |trace: &mut Trace| {
                trace.push(label);
                Ok(Outcome::Continue)
            }),
        )
    }

    fn wrap(label: &'static str) -> FilterRecord<Trace, u32> {
        record(
            FilterKind::Around,
            Callable::around(move |trace: &mut Trace, next| {
                trace.push(label);
                next.run(trace)?;
                trace.push(label);
                Ok(())
            }),
        )
    }

    fn run(filters: &[FilterRecord<Trace, u32>], policy: HaltPolicy) -> (CallbackResult<RunOutcome<u32>>, Trace) {
        let pool = ContextPool::new(&PoolConfig::default());
        let program = compile(Arc::from("save"), filters, 1);
        let mut trace = Vec::new();
        let result = Executor::new(&pool, policy).run(&program, &mut trace, |trace| {
            trace.push("unit");
            7
        });
        assert_eq!(pool.stats().in_use, 0);
        (result, trace)
    }

    #[test]
    fn test_before_unit_after_order() {
        let filters = vec![
            step(FilterKind::Before, "b1"),
            step(FilterKind::After, "a1"),
            step(FilterKind::Before, "b2"),
        ];
        let (result, trace) = run(&filters, HaltPolicy::Explicit);
        assert_eq!(trace, vec!["b1", "b2", "unit", "a1"]);
        assert_eq!(result.unwrap(), RunOutcome { value: Some(7), halted: false });
    }

    #[test]
    fn test_around_nesting() {
        let filters = vec![wrap("outer"), step(FilterKind::Before, "b"), wrap("inner"), step(FilterKind::After, "a")];
        let (result, trace) = run(&filters, HaltPolicy::Explicit);
        assert_eq!(trace, vec!["outer", "b", "inner", "unit", "a", "inner", "outer"]);
        assert!(!result.unwrap().halted);
    }

    #[test]
    fn test_around_without_next_halts() {
        let skip = record(
            FilterKind::Around,
            Callable::around(|trace: &mut Trace, _next| {
                trace.push("skip");
                Ok(())
            }),
        );
        let filters = vec![skip, step(FilterKind::Before, "b"), step(FilterKind::After, "a")];
        let (result, trace) = run(&filters, HaltPolicy::Explicit);
        assert_eq!(trace, vec!["skip"]);
        assert_eq!(result.unwrap(), RunOutcome { value: None, halted: true });
    }

    #[test]
    fn test_halt_with_value() {
        let halt = record(FilterKind::Before, Callable::simple(|_| Ok(Outcome::halt_with(99))));
        let filters = vec![halt, step(FilterKind::Before, "b"), step(FilterKind::After, "a")];
        let (result, trace) = run(&filters, HaltPolicy::Explicit);
        assert!(trace.is_empty());
        assert_eq!(result.unwrap(), RunOutcome { value: Some(99), halted: true });
    }

    #[test]
    fn test_falsy_depends_on_policy() {
        let falsy = || record(FilterKind::Before, Callable::simple(|_| Ok(Outcome::False)));

        let (result, trace) = run(&[falsy()], HaltPolicy::Explicit);
        assert_eq!(trace, vec!["unit"]);
        assert!(!result.unwrap().halted);

        let (result, trace) = run(&[falsy()], HaltPolicy::LegacyFalsy);
        assert!(trace.is_empty());
        assert!(result.unwrap().halted);
    }

    #[test]
    fn test_guarded_around_is_elided() {
        let guard = ResolvedGuard::new(true, None, Arc::new(|_: &Trace| false));
        let guarded = FilterRecord::new(
            FilterKind::Around,
            Arc::from("save"),
            ActionRef::Inline,
            Callable::around(|trace: &mut Trace, _next| {
                trace.push("never");
                Ok(())
            }),
            vec![guard],
        )
        .unwrap();
        let filters = vec![guarded, step(FilterKind::Before, "b"), step(FilterKind::After, "a")];
        let (result, trace) = run(&filters, HaltPolicy::Explicit);
        assert_eq!(trace, vec!["b", "unit", "a"]);
        assert!(!result.unwrap().halted);
    }

    #[test]
    fn test_nested_failure_escapes_swallowing_around() {
        let swallow = record(
            FilterKind::Around,
            Callable::around(|trace: &mut Trace, next| {
                let _ = next.run(trace);
                Ok(())
            }),
        );
        let boom = record(FilterKind::Before, Callable::simple(|_| Err("boom".into())));
        let (result, trace) = run(&[swallow, boom, step(FilterKind::After, "a")], HaltPolicy::Explicit);
        assert!(trace.is_empty());
        assert_matches!(result, Err(CallbackError::FilterExecution { kind: FilterKind::Before, .. }));
    }

    #[test]
    fn test_around_reports_nested_halt() {
        let observer = record(
            FilterKind::Around,
            Callable::around(|trace: &mut Trace, next| {
                let halted_before = next.is_halted();
                next.run(trace)?;
                trace.push(if halted_before { "was-halted" } else { "observed" });
                Ok(())
            }),
        );
        let halt = record(FilterKind::Before, Callable::simple(|_| Ok(Outcome::halt())));
        let (result, trace) = run(&[observer, halt], HaltPolicy::Explicit);
        assert_eq!(trace, vec!["observed"]);
        assert!(result.unwrap().halted);
    }
}
