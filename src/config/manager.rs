use config::ConfigError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::loader::{ConfigLoader, Environment};
use crate::config::types::EngineConfig;
use crate::config::validation::Validator;

// 全局配置實例
static CONFIG: OnceCell<EngineConfig> = OnceCell::new();

/// 獲取引擎配置實例
///
/// 尚未初始化時嘗試從環境加載；加載失敗則退回預設配置。
pub fn get_config() -> &'static EngineConfig {
    CONFIG.get_or_init(|| {
        EngineConfig::load_from_env().unwrap_or_else(|err| {
            warn!("無法加載引擎配置，使用預設值: {}", err);
            EngineConfig::default()
        })
    })
}

/// 初始化配置（在應用程序啟動時調用）
pub fn init_config() -> Result<&'static EngineConfig, ConfigError> {
    let engine_config = EngineConfig::load_from_env()?;

    // 嘗試初始化全局配置
    if CONFIG.set(engine_config).is_err() {
        warn!("配置已經被初始化，跳過重複初始化");
    } else {
        debug!("配置初始化成功，環境：{:?}", Environment::from_env());
    }

    Ok(get_config())
}

/// EngineConfig 加載方法實現
impl EngineConfig {
    /// 從環境變數指定的環境加載配置
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let env = Environment::from_env();
        debug!("從環境加載配置: {:?}", env);
        Self::load(env)
    }

    /// 從指定環境加載配置
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        Self::from_config(ConfigLoader::load(env)?)
    }

    /// 從指定目錄加載配置
    pub fn load_from_dir(config_dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        Self::from_config(ConfigLoader::load_from_dir(config_dir, env)?)
    }

    fn from_config(config_source: config::Config) -> Result<Self, ConfigError> {
        // 使用 serde 反序列化配置
        let engine_config: EngineConfig = config_source.try_deserialize()?;

        // 驗證失敗視為配置錯誤
        engine_config
            .validate()
            .map_err(|err| ConfigError::Message(err.to_string()))?;
        debug!("配置驗證通過");

        Ok(engine_config)
    }
}
