//! 后台派生上下文的消息协议
//!
//! 请求 / 响应是带标签的联合类型，在线程边界以 JSON 行传递，
//! 两端都穷尽匹配

use serde::{Deserialize, Serialize};

use crate::domain::chain_config::{ChainKind, NetworkEnv};
use crate::domain::derivation::ChainKeyMaterial;
use crate::error::{WalletError, WalletResult};

/// 请求编号，响应通过它对应到发出的请求
pub type RequestId = u64;

/// 调用方 → 后台上下文
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// 从熵生成（hex 编码的 16 字节）
    Generate {
        id: RequestId,
        entropy: String,
        network: NetworkEnv,
    },
    /// 从已校验的助记词导入
    Import {
        id: RequestId,
        mnemonic: String,
        network: NetworkEnv,
    },
}

impl WorkerRequest {
    pub fn id(&self) -> RequestId {
        match self {
            Self::Generate { id, .. } | Self::Import { id, .. } => *id,
        }
    }
}

impl std::fmt::Debug for WorkerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate { id, network, .. } => write!(f, "Generate#{}({})", id, network),
            Self::Import { id, network, .. } => write!(f, "Import#{}({})", id, network),
        }
    }
}

/// 后台上下文 → 调用方
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerResponse {
    Ready,
    Progress {
        id: RequestId,
        percent: u8,
    },
    Result {
        id: RequestId,
        mnemonic: String,
        materials: Vec<ChainKeyMaterial>,
    },
    Error {
        /// 请求无法解析时为空
        id: Option<RequestId>,
        /// `WalletError::code()`
        code: String,
        message: String,
        /// 派生失败时标明链
        chain: Option<ChainKind>,
    },
}

impl std::fmt::Debug for WorkerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Progress { id, percent } => write!(f, "Progress#{}({}%)", id, percent),
            Self::Result { id, materials, .. } => {
                write!(f, "Result#{}(<redacted>, {} wallets)", id, materials.len())
            }
            Self::Error {
                id, code, chain, ..
            } => write!(f, "Error#{:?}({}, {:?})", id, code, chain),
        }
    }
}

impl WorkerResponse {
    pub fn from_error(id: Option<RequestId>, err: &WalletError) -> Self {
        let (message, chain) = match err {
            WalletError::Derivation { chain, message } => (message.clone(), Some(*chain)),
            other => (other.to_string(), None),
        };
        Self::Error {
            id,
            code: err.code().to_string(),
            message,
            chain,
        }
    }

    /// 该响应是否属于给定请求；无编号的错误属于当前请求
    pub fn belongs_to(&self, request: RequestId) -> bool {
        match self {
            Self::Ready => true,
            Self::Progress { id, .. } | Self::Result { id, .. } => *id == request,
            Self::Error { id, .. } => id.map_or(true, |id| id == request),
        }
    }

    /// 还原后台报告的错误
    ///
    /// 传输失败保持为传输错误，调用方据此降级
    pub fn into_error(code: &str, message: String, chain: Option<ChainKind>) -> WalletError {
        if let Some(chain) = chain {
            return WalletError::Derivation { chain, message };
        }
        match code {
            "transport_failed" => WalletError::Transport(message),
            "invalid_mnemonic" => WalletError::InvalidMnemonic(message),
            "cancelled" => WalletError::Cancelled,
            "busy" => WalletError::Busy,
            "storage_failed" => WalletError::Storage(message),
            _ => WalletError::Validation(message),
        }
    }
}

pub fn encode<T: Serialize>(message: &T) -> WalletResult<String> {
    serde_json::to_string(message)
        .map_err(|e| WalletError::transport(format!("Failed to encode message: {}", e)))
}

pub fn decode<T: for<'de> Deserialize<'de>>(line: &str) -> WalletResult<T> {
    serde_json::from_str(line)
        .map_err(|e| WalletError::transport(format!("Malformed message: {}", e)))
}
