//! IronVault - 多链钱包生成与导入
//!
//! 一份 128 位熵 → 一条助记词 → ETH / SOL / BTC / BNB 四个钱包，
//! 私钥与助记词只写入本地安全存储

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod runtime;
pub mod service;

// 重新导出常用类型
pub use error::{WalletError, WalletResult};
pub use service::GenerationOrchestrator;

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            ChainKind, Entropy, GenerationState, GenerationStatus, MultiChainWalletResult,
            NetworkEnv, WalletRecord,
        },
        error::{WalletError, WalletResult},
        infrastructure::{SecureKeyStore, SecureStore},
        runtime::{CapabilityDescriptor, CapabilityDetector, StrategyKind},
        service::{GenerationOrchestrator, StatusSubscription},
    };
}
