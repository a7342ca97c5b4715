use serde::{Deserialize, Serialize};

use crate::config::validation::{ValidationError, ValidationUtils, Validator};

/// 回調引擎配置結構
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineSettings,
    pub pool: PoolConfig,
    pub log: LogConfig,
    pub metrics: MetricsConfig,
}

impl Validator for EngineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證各個部分的配置
        self.pool.validate()?;
        self.log.validate()?;

        Ok(())
    }
}

/// 中止判定策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltPolicy {
    /// 只有明確的 `Outcome::Halt` 會中止
    #[default]
    Explicit,
    /// 舊版行為：before 過濾器回傳 `Outcome::False` 也會中止
    ///
    /// 只作用於 before 過濾器；after 過濾器回傳假值不會中止，around 過濾器
    /// 仍以不呼叫 `next` 表示中止。
    LegacyFalsy,
}

/// 引擎行為設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub halt_policy: HaltPolicy,
}

/// 執行上下文池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 預先配置的上下文數
    pub initial_capacity: usize,
    /// 空閒串列上限，超出的上下文歸還時直接釋放
    pub max_free: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 4,
            max_free: 64,
        }
    }
}

impl Validator for PoolConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::in_range(self.max_free, 1, 65536, "pool.max_free")?;
        ValidationUtils::in_range(self.initial_capacity, 0, self.max_free, "pool.initial_capacity")?;

        Ok(())
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證日誌級別
        ValidationUtils::not_empty(&self.level, "log.level")?;
        ValidationUtils::one_of(
            &self.level.to_lowercase().as_str(),
            &["trace", "debug", "info", "warn", "error"],
            "log.level",
        )?;

        // 驗證日誌格式
        ValidationUtils::one_of(&self.format.to_lowercase().as_str(), &["pretty", "json"], "log.format")?;

        Ok(())
    }
}

/// 監控指標配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}
