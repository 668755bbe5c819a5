//! 钱包生成错误定义
//!
//! 四类错误：输入校验、派生、传输、存储。
//! 传输错误由策略降级在本地恢复，其余错误终止本次生成。

use thiserror::Error;

use crate::domain::chain_config::ChainKind;

pub type WalletResult<T> = std::result::Result<T, WalletError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    // ━━━━━━━━━━ 输入校验 ━━━━━━━━━━
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid entropy length: expected {expected} bytes, got {actual}")]
    InvalidEntropyLength { expected: usize, actual: usize },

    #[error("Validation failed: {0}")]
    Validation(String),

    // ━━━━━━━━━━ 派生 ━━━━━━━━━━
    #[error("Derivation failed for {chain}: {message}")]
    Derivation { chain: ChainKind, message: String },

    // ━━━━━━━━━━ 传输（后台线程） ━━━━━━━━━━
    #[error("Background transport failed: {0}")]
    Transport(String),

    /// 后台上下文已有任务在执行
    #[error("Derivation context is busy")]
    Busy,

    #[error("Operation cancelled")]
    Cancelled,

    // ━━━━━━━━━━ 存储 ━━━━━━━━━━
    #[error("Secure store failure: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletError {
    pub fn derivation(chain: ChainKind, message: impl Into<String>) -> Self {
        Self::Derivation {
            chain,
            message: message.into(),
        }
    }

    pub fn storage(message: impl std::fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    pub fn transport(message: impl std::fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    /// 稳定的错误码，供 UI 层映射文案
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMnemonic(_) => "invalid_mnemonic",
            Self::InvalidEntropyLength { .. } => "invalid_entropy_length",
            Self::Validation(_) => "validation_failed",
            Self::Derivation { .. } => "derivation_failed",
            Self::Transport(_) => "transport_failed",
            Self::Busy => "busy",
            Self::Cancelled => "cancelled",
            Self::Storage(_) => "storage_failed",
            Self::Config(_) => "config_error",
        }
    }

    /// 是否属于输入校验错误（在任何派生之前失败）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidMnemonic(_) | Self::InvalidEntropyLength { .. } | Self::Validation(_)
        )
    }

    /// 传输错误可以通过降级到主线程策略重试
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<bip39::Error> for WalletError {
    fn from(err: bip39::Error) -> Self {
        Self::InvalidMnemonic(err.to_string())
    }
}
