//! Domain 模块
//!
//! 链配置、派生算法与钱包领域模型

pub mod chain_config;
pub mod derivation;
pub mod generation_status;
pub mod mnemonic;
pub mod slip10;
pub mod wallet;

// 重新导出常用类型
pub use chain_config::{ChainKind, CurveType, NetworkEnv};
pub use derivation::{
    BitcoinDeriver, ChainDeriver, ChainKeyMaterial, DeriverSet, EvmDeriver, SolanaDeriver,
};
pub use generation_status::{GenerationState, GenerationStatus};
pub use mnemonic::{Entropy, EntropySource, FixedEntropySource, OsEntropySource};
pub use wallet::{DerivedWalletSet, MultiChainWalletResult, WalletRecord};
