// monitor.rs - 日誌與監控指標模組

pub mod logger;
pub mod metrics;

// 重新導出常用元素，使其可直接從 monitor 模組使用
pub use self::logger::init_logging;
pub use self::metrics::{EngineMetrics, MetricType, METRIC_NAMESPACE};
