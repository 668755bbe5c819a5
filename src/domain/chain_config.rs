//! 多链配置模块
//!
//! 定义四条受支持的链、所用曲线、派生路径以及网络环境

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// 加密曲线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveType {
    /// secp256k1 曲线 (Ethereum, BNB, Bitcoin)
    Secp256k1,
    /// ed25519 曲线 (Solana)
    Ed25519,
}

/// 链标识
///
/// 声明顺序即进度汇报顺序：Ethereum → Solana → Bitcoin → BNB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Ethereum,
    Solana,
    Bitcoin,
    Bnb,
}

impl ChainKind {
    /// 固定的派生顺序
    pub const ALL: [ChainKind; 4] = [
        ChainKind::Ethereum,
        ChainKind::Solana,
        ChainKind::Bitcoin,
        ChainKind::Bnb,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
            Self::Bitcoin => "bitcoin",
            Self::Bnb => "bnb",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ethereum => "ETH",
            Self::Solana => "SOL",
            Self::Bitcoin => "BTC",
            Self::Bnb => "BNB",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ethereum => "Ethereum",
            Self::Solana => "Solana",
            Self::Bitcoin => "Bitcoin",
            Self::Bnb => "BNB Smart Chain",
        }
    }

    pub fn curve_type(&self) -> CurveType {
        match self {
            Self::Solana => CurveType::Ed25519,
            _ => CurveType::Secp256k1,
        }
    }

    /// EVM 系列共享同一套派生方案
    pub fn is_evm(&self) -> bool {
        matches!(self, Self::Ethereum | Self::Bnb)
    }

    /// BIP44 派生路径（account = 0, index = 0）
    pub fn derivation_path(&self, network: NetworkEnv) -> &'static str {
        match self {
            // BSC 使用与 ETH 相同的派生路径
            Self::Ethereum | Self::Bnb => "m/44'/60'/0'/0/0",
            // SLIP-0010：全部硬化
            Self::Solana => "m/44'/501'/0'/0'",
            // BIP84 native segwit，coin type 按网络区分
            Self::Bitcoin => match network {
                NetworkEnv::Mainnet => "m/84'/0'/0'/0/0",
                NetworkEnv::Testnet => "m/84'/1'/0'/0/0",
            },
        }
    }

    /// 地址格式检查
    pub fn validate_address(&self, address: &str, network: NetworkEnv) -> bool {
        match self {
            Self::Ethereum | Self::Bnb => {
                // 0x + 40 hex chars
                address.len() == 42
                    && address.starts_with("0x")
                    && address[2..].chars().all(|c| c.is_ascii_hexdigit())
            }
            Self::Bitcoin => {
                let prefix = format!("{}1q", network.bitcoin_hrp());
                address.starts_with(&prefix) && address.len() == 42
            }
            Self::Solana => match bs58::decode(address).into_vec() {
                Ok(bytes) => bytes.len() == 32,
                Err(_) => false,
            },
        }
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ChainKind {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "solana" | "sol" => Ok(Self::Solana),
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "bnb" | "bsc" => Ok(Self::Bnb),
            other => Err(WalletError::Validation(format!("Unsupported chain: {}", other))),
        }
    }
}

/// 网络环境（主网 / 测试网）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEnv {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkEnv {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(self, Self::Testnet)
    }

    /// Bitcoin bech32 human readable part
    pub fn bitcoin_hrp(&self) -> &'static str {
        match self {
            Self::Mainnet => "bc",
            Self::Testnet => "tb",
        }
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Self::Mainnet => bitcoin::Network::Bitcoin,
            Self::Testnet => bitcoin::Network::Testnet,
        }
    }
}

impl fmt::Display for NetworkEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for NetworkEnv {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "production" => Ok(Self::Mainnet),
            "testnet" | "test" | "development" => Ok(Self::Testnet),
            other => Err(WalletError::Config(format!("Unknown network: {}", other))),
        }
    }
}
