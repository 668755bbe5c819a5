//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::NetworkEnv;

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub keystore: KeystoreConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    #[serde(default)]
    pub ansi: bool,
}

/// 安全存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreBackend {
    Memory,
    File,
}

/// 安全存储配置
#[derive(Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    pub backend: KeystoreBackend,
    pub path: PathBuf,
    /// 加密密钥文本（见 EncryptionKey::from_text）
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for KeystoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeystoreConfig")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// 生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub network: NetworkEnv,
    /// 钱包显示名前缀
    pub wallet_name_prefix: String,
    /// 能力覆盖：None 表示自动探测
    #[serde(default)]
    pub dedicated_thread: Option<bool>,
    #[serde(default)]
    pub restricted_context: Option<bool>,
    #[serde(default)]
    pub constrained_runtime: Option<bool>,
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            ansi: env_flag("LOG_ANSI").unwrap_or(true),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: match std::env::var("WALLET_KEYSTORE").as_deref() {
                Ok("file") => KeystoreBackend::File,
                _ => KeystoreBackend::Memory,
            },
            path: std::env::var("WALLET_KEYSTORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/keystore.bin")),
            encryption_key: std::env::var("WALLET_ENC_KEY").ok(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            network: std::env::var("WALLET_NETWORK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            wallet_name_prefix: std::env::var("WALLET_NAME_PREFIX")
                .unwrap_or_else(|_| "Main".into()),
            dedicated_thread: env_flag("WALLET_DEDICATED_THREAD"),
            restricted_context: env_flag("WALLET_RESTRICTED_CONTEXT"),
            constrained_runtime: env_flag("WALLET_CONSTRAINED_RUNTIME"),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            keystore: KeystoreConfig::default(),
            generation: GenerationConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.keystore.backend == KeystoreBackend::File && self.keystore.encryption_key.is_none()
        {
            anyhow::bail!("WALLET_ENC_KEY must be set when using the file keystore");
        }

        if self.generation.wallet_name_prefix.trim().is_empty() {
            anyhow::bail!("WALLET_NAME_PREFIX must not be empty");
        }

        Ok(())
    }
}
