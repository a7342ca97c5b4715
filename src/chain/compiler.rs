use std::sync::Arc;

use crate::filter::{ActionRef, FilterKind, FilterRecord};

/// 編譯後的單一指令
pub enum Step<T, V> {
    /// 工作單元之前執行
    Before(FilterRecord<T, V>),
    /// around 框架；`end` 為框架之後第一條指令的索引
    Around { filter: FilterRecord<T, V>, end: usize },
    /// 呼叫工作單元
    Invoke,
    /// 工作單元之後執行
    After(FilterRecord<T, V>),
}

/// 指令形狀，用於診斷及比較兩次編譯結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepShape {
    Before(ActionRef),
    Around { action: ActionRef, end: usize },
    Invoke,
    After(ActionRef),
}

/// 編譯後的程式
///
/// 不可變，綁定編譯時的鏈版本。執行期間不再做任何結構性計算。
pub struct CompiledProgram<T, V> {
    event: Arc<str>,
    version: u64,
    steps: Vec<Step<T, V>>,
}

impl<T, V> CompiledProgram<T, V> {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// 編譯時的鏈版本
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn steps(&self) -> &[Step<T, V>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn shape(&self) -> Vec<StepShape> {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Before(filter) => StepShape::Before(filter.action().clone()),
                Step::Around { filter, end } => StepShape::Around {
                    action: filter.action().clone(),
                    end: *end,
                },
                Step::Invoke => StepShape::Invoke,
                Step::After(filter) => StepShape::After(filter.action().clone()),
            })
            .collect()
    }
}

/// 將過濾器序列編譯為扁平指令列表
///
/// before 與 around 依附加順序排列在主幹上；每個 around 包裹其後附加的所有過濾器，
/// 先附加者在外層。after 過濾器歸屬於附加當時最內層的框架，工作單元返回後
/// 由內而外展開，同一層內保持附加順序。守衛不在此求值。
pub fn compile<T, V>(event: Arc<str>, filters: &[FilterRecord<T, V>], version: u64) -> CompiledProgram<T, V> {
    let mut steps = Vec::with_capacity(filters.len() + 1);
    let mut root_afters = Vec::new();
    // (around 指令索引, 該層的 after 過濾器)
    let mut frames: Vec<(usize, Vec<FilterRecord<T, V>>)> = Vec::new();

    for filter in filters {
        match filter.kind() {
            FilterKind::Before => steps.push(Step::Before(filter.clone())),
            FilterKind::Around => {
                frames.push((steps.len(), Vec::new()));
                steps.push(Step::Around {
                    filter: filter.clone(),
                    end: 0,
                });
            }
            FilterKind::After => match frames.last_mut() {
                Some((_, afters)) => afters.push(filter.clone()),
                None => root_afters.push(filter.clone()),
            },
        }
    }

    steps.push(Step::Invoke);

    while let Some((index, afters)) = frames.pop() {
        steps.extend(afters.into_iter().map(Step::After));
        let frame_end = steps.len();
        if let Step::Around { end, .. } = &mut steps[index] {
            *end = frame_end;
        }
    }
    steps.extend(root_afters.into_iter().map(Step::After));

    CompiledProgram { event, version, steps }
}
