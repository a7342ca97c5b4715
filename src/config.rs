/// 配置管理模組
///
/// 本模組負責加載、驗證和管理回調引擎的配置。
/// 支持開發與生產兩種環境，環境變數覆寫文件設定。
// 宣告子模組
pub mod loader;
pub mod manager;
pub mod types;
pub mod validation;

// 重新導出常用組件
pub use loader::{ConfigExt, ConfigLoader, Environment};
pub use manager::{get_config, init_config};
pub use types::*;
pub use validation::{ValidationError, ValidationUtils, Validator};
