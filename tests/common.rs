#![allow(dead_code)]

use callback_chain::{Action, CallbackEngine, CallbackTarget, ClassId, EngineConfig, Outcome};

/// 測試用目標物件
#[derive(Debug)]
pub struct Doc {
    pub class: ClassId,
    pub trace: Vec<String>,
    pub flag: bool,
    pub score: i32,
}

impl Doc {
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            trace: Vec::new(),
            flag: false,
            score: 0,
        }
    }
}

impl CallbackTarget for Doc {
    fn class_id(&self) -> ClassId {
        self.class
    }
}

pub type Engine = CallbackEngine<Doc, i32>;

/// 記錄標籤的 before/after 動作
pub fn mark(label: &'static str) -> Action<Doc, i32> {
    Action::inline(move |doc: &mut Doc| {
        doc.trace.push(label.to_string());
        Ok(Outcome::Continue)
    })
}

/// 前後各記錄一次標籤的 around 動作
pub fn wrap(label: &'static str) -> Action<Doc, i32> {
    Action::around(move |doc: &mut Doc, next| {
        doc.trace.push(format!("{}:in", label));
        next.run(doc)?;
        doc.trace.push(format!("{}:out", label));
        Ok(())
    })
}

/// 工作單元：記錄 "unit" 並回傳固定值
pub fn unit(value: i32) -> impl FnOnce(&mut Doc) -> i32 {
    move |doc: &mut Doc| {
        doc.trace.push("unit".to_string());
        value
    }
}

/// 建立只有一個類別並定義好事件的引擎
pub fn engine_with_events(events: &[&str]) -> (Engine, ClassId) {
    engine_with_config(&EngineConfig::default(), events)
}

pub fn engine_with_config(config: &EngineConfig, events: &[&str]) -> (Engine, ClassId) {
    let engine = Engine::new(config);
    let class = engine.register_class("Record", None).unwrap();
    for event in events {
        engine.define_event(class, event).unwrap();
    }
    (engine, class)
}
