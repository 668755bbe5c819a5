//! 钱包记录模型
//!
//! 一次生成 / 导入得到四条记录，共享同一助记词来源

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::chain_config::{ChainKind, NetworkEnv};
use crate::domain::derivation::ChainKeyMaterial;

/// 非敏感钱包记录（可序列化进列表索引）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: Uuid,
    pub address: String,
    pub public_key: String,
    pub chain: ChainKind,
    pub network: NetworkEnv,
    /// 余额占位，由外部刷新
    pub balance: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    pub fn from_material(
        material: &ChainKeyMaterial,
        network: NetworkEnv,
        name_prefix: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            address: material.address.clone(),
            public_key: material.public_key.clone(),
            chain: material.chain,
            network,
            balance: "0".to_string(),
            name: format!("{} {}", name_prefix, material.chain.display_name()),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 派生阶段产物：助记词 + 四条链的密钥材料
#[derive(Clone)]
pub struct DerivedWalletSet {
    pub mnemonic: Zeroizing<String>,
    pub materials: Vec<ChainKeyMaterial>,
}

impl DerivedWalletSet {
    pub fn material(&self, chain: ChainKind) -> Option<&ChainKeyMaterial> {
        self.materials.iter().find(|m| m.chain == chain)
    }
}

impl fmt::Debug for DerivedWalletSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedWalletSet")
            .field("mnemonic", &"<redacted>")
            .field("materials", &self.materials)
            .finish()
    }
}

/// 多链钱包结果
#[derive(Clone, PartialEq, Eq)]
pub struct MultiChainWalletResult {
    /// 恢复助记词（展示给用户备份）
    pub mnemonic: Zeroizing<String>,
    pub wallets: Vec<WalletRecord>,
    /// 是否为导入（否则为新建）
    pub imported: bool,
}

impl MultiChainWalletResult {
    pub fn wallet(&self, chain: ChainKind) -> Option<&WalletRecord> {
        self.wallets.iter().find(|w| w.chain == chain)
    }

    pub fn chains(&self) -> Vec<ChainKind> {
        self.wallets.iter().map(|w| w.chain).collect()
    }
}

impl fmt::Debug for MultiChainWalletResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiChainWalletResult")
            .field("mnemonic", &"<redacted>")
            .field("wallets", &self.wallets)
            .field("imported", &self.imported)
            .finish()
    }
}
