//! 配置加载
//!
//! 来源优先级（低到高）：内置默认值、可选配置文件、进程环境变量。
//! 必填项缺失或为空时启动失败。

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::error::{MedError, Result};

/// 服务配置
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// 服务显示名称
    pub project_name: String,
    /// 数据库连接串
    pub database_url: String,
    /// 数据库名称
    pub database_name: String,
    /// 令牌签名密钥
    pub secret_key: String,

    pub host: String,
    pub port: u16,
    /// 图片存储目录
    pub storage_dir: String,
    pub token_ttl_hours: i64,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,

    /// Ollama 兼容的模型服务地址
    pub model_base_url: String,
    pub vision_model: String,
    pub text_model: String,
    pub model_api_key: Option<String>,
    pub openfda_url: String,
    pub request_timeout_secs: u64,
    pub lookup_timeout_secs: u64,
}

impl Settings {
    /// 带默认值的配置构建器
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("storage_dir", "storage/images")?
            .set_default("token_ttl_hours", 12)?
            .set_default("max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("db_max_connections", 10)?
            .set_default("model_base_url", "http://localhost:11434")?
            .set_default("vision_model", "medgemma")?
            .set_default("text_model", "medgemma")?
            .set_default("openfda_url", "https://api.fda.gov/drug/label.json")?
            .set_default("request_timeout_secs", 120)?
            .set_default("lookup_timeout_secs", 15)?)
    }

    /// 从配置文件和环境变量加载
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::defaults()?;
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let config = builder.add_source(Environment::default()).build()?;

        let settings = Self::from_config(config)?;
        info!("Configuration loaded for {}", settings.project_name);
        Ok(settings)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("project_name", &self.project_name),
            ("database_url", &self.database_url),
            ("database_name", &self.database_name),
            ("secret_key", &self.secret_key),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(MedError::Config(format!("{} must not be empty", key)));
            }
        }
        if self.token_ttl_hours <= 0 {
            return Err(MedError::Config("token_ttl_hours must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

// 不输出密钥
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("project_name", &self.project_name)
            .field("database_name", &self.database_name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("model_base_url", &self.model_base_url)
            .field("vision_model", &self.vision_model)
            .field("text_model", &self.text_model)
            .field("openfda_url", &self.openfda_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> ConfigBuilder<DefaultState> {
        Settings::defaults()
            .unwrap()
            .set_override("project_name", "MediNodus API")
            .unwrap()
            .set_override("database_url", "postgres://localhost/medinodus")
            .unwrap()
            .set_override("database_name", "main")
            .unwrap()
            .set_override("secret_key", "s3cret")
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::from_config(required().build().unwrap()).unwrap();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.token_ttl_hours, 12);
        assert_eq!(settings.storage_dir, "storage/images");
        assert!(settings.model_api_key.is_none());
        assert_eq!(settings.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_missing_secret_fails() {
        let config = Settings::defaults()
            .unwrap()
            .set_override("project_name", "MediNodus API")
            .unwrap()
            .set_override("database_url", "postgres://localhost/medinodus")
            .unwrap()
            .set_override("database_name", "main")
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(Settings::from_config(config), Err(MedError::Config(_))));
    }

    #[test]
    fn test_empty_required_value_fails() {
        let config = required().set_override("secret_key", "  ").unwrap().build().unwrap();
        assert!(matches!(Settings::from_config(config), Err(MedError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let settings = Settings::from_config(required().build().unwrap()).unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("postgres://"));
    }
}
