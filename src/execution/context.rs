use crate::error::CallbackError;

/// 單次呼叫的執行狀態
///
/// 只保存可重用、不帶生命週期的欄位；被借用的目標物件在執行期間
/// 與上下文一起由執行器傳遞，不會被上下文保留。
#[derive(Debug)]
pub struct ExecutionContext<V> {
    serial: u64,
    halted: bool,
    invoked: bool,
    value: Option<V>,
    failure: Option<CallbackError>,
}

impl<V> ExecutionContext<V> {
    pub(crate) fn new() -> Self {
        Self {
            serial: 0,
            halted: false,
            invoked: false,
            value: None,
            failure: None,
        }
    }

    /// 回到中性狀態
    pub(crate) fn reset(&mut self) {
        self.halted = false;
        self.invoked = false;
        self.value = None;
        self.failure = None;
    }

    pub(crate) fn begin(&mut self, serial: u64) {
        self.reset();
        self.serial = serial;
    }

    /// 本上下文最近一次被取用時的序號
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// 工作單元是否已執行
    pub fn invoked(&self) -> bool {
        self.invoked
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub(crate) fn halt(&mut self, value: Option<V>) {
        self.halted = true;
        if value.is_some() {
            self.value = value;
        }
    }

    pub(crate) fn complete(&mut self, value: V) {
        self.invoked = true;
        self.value = Some(value);
    }

    pub(crate) fn take_value(&mut self) -> Option<V> {
        self.value.take()
    }

    /// 記錄巢狀程式的失敗，僅保留第一個
    pub(crate) fn record_failure(&mut self, err: CallbackError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    pub(crate) fn take_failure(&mut self) -> Option<CallbackError> {
        self.failure.take()
    }
}
