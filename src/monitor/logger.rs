use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::{CallbackError, CallbackResult};

/// 依配置建立日誌過濾器；`RUST_LOG` 存在時優先使用
fn build_filter(log_config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_config.level.to_lowercase()))
}

/// 初始化全局日誌系統
///
/// 已經有全局訂閱者時回傳 `CallbackError::Config`。
pub fn init_logging(log_config: &LogConfig) -> CallbackResult<()> {
    let filter = build_filter(log_config);

    let result = match log_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };

    result.map_err(|e| CallbackError::Config(format!("設置日誌系統失敗: {}", e)))?;

    info!("日誌系統初始化完成 (level={}, format={})", log_config.level, log_config.format);
    Ok(())
}
