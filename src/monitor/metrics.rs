use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::execution::PoolStats;

/// 監控指標命名空間
pub const METRIC_NAMESPACE: &str = "callback_chain";

/// 監控指標類型
#[derive(Debug, Clone, Copy)]
pub enum MetricType {
    /// 正常完成
    Completed,
    /// 被過濾器中止
    Halted,
    /// 過濾器拋出錯誤
    Failed,
    /// 事件執行延遲
    Latency,
    /// 回調鏈重新編譯
    Compiled,
}

/// 回調引擎監控指標記錄器
pub struct EngineMetrics;

impl EngineMetrics {
    /// 記錄事件指標
    ///
    /// # Arguments
    /// * `event` - 事件名稱 (如 "save", "validate")
    /// * `metric_type` - 指標類型
    /// * `duration` - 可選的持續時間，用於延遲指標
    pub fn record(event: &str, metric_type: MetricType, duration: Option<Duration>) {
        let event = event.to_string();
        match metric_type {
            MetricType::Completed => {
                counter!(format!("{}.run", METRIC_NAMESPACE), "event" => event, "result" => "completed")
                    .increment(1);
            }
            MetricType::Halted => {
                counter!(format!("{}.run", METRIC_NAMESPACE), "event" => event, "result" => "halted")
                    .increment(1);
            }
            MetricType::Failed => {
                counter!(format!("{}.run", METRIC_NAMESPACE), "event" => event, "result" => "failed")
                    .increment(1);
            }
            MetricType::Latency => {
                if let Some(dur) = duration {
                    histogram!(format!("{}.latency_ns", METRIC_NAMESPACE), "event" => event)
                        .record(dur.as_nanos() as f64);
                }
            }
            MetricType::Compiled => {
                counter!(format!("{}.compile", METRIC_NAMESPACE), "event" => event).increment(1);
            }
        }
    }

    /// 記錄上下文池大小
    pub fn record_pool(stats: &PoolStats) {
        gauge!(format!("{}.pool_allocated", METRIC_NAMESPACE)).set(stats.allocated as f64);
        gauge!(format!("{}.pool_free", METRIC_NAMESPACE)).set(stats.free as f64);
    }
}
