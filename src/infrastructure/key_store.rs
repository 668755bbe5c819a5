//! 钱包密钥存储门面
//!
//! 存储布局（每个钱包 id）：
//! - `wallet_pk_{id}`        编码后的私钥（见 hex_codec）
//! - `wallet_id_{id}`        id 镜像
//! - `wallet_mnemonic_{id}`  恢复助记词
//!
//! 设备级：
//! - `primary_mnemonic`      主助记词
//! - `wallet_records`        非敏感 WalletRecord 列表（JSON）

use std::sync::Arc;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::derivation::ChainKeyMaterial;
use crate::domain::wallet::{MultiChainWalletResult, WalletRecord};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::hex_codec;
use crate::infrastructure::secure_store::{SecureStore, StoreOp};

pub const PRIMARY_MNEMONIC_KEY: &str = "primary_mnemonic";
pub const WALLET_RECORDS_KEY: &str = "wallet_records";

pub fn private_key_entry(id: &Uuid) -> String {
    format!("wallet_pk_{}", id)
}

pub fn id_entry(id: &Uuid) -> String {
    format!("wallet_id_{}", id)
}

pub fn mnemonic_entry(id: &Uuid) -> String {
    format!("wallet_mnemonic_{}", id)
}

#[derive(Clone)]
pub struct SecureKeyStore {
    store: Arc<dyn SecureStore>,
}

impl SecureKeyStore {
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &Arc<dyn SecureStore> {
        &self.store
    }

    /// 一次性写入整组钱包
    ///
    /// 所有条目与替换后的记录列表在同一个批次中提交，
    /// 中途失败不会留下部分可见的钱包组
    pub async fn save_wallet_set(
        &self,
        result: &MultiChainWalletResult,
        materials: &[ChainKeyMaterial],
    ) -> WalletResult<()> {
        let mut records = self.list_wallets().await?;
        let mut ops = Vec::with_capacity(result.wallets.len() * 3 + 2);

        for record in &result.wallets {
            let material = materials
                .iter()
                .find(|m| m.chain == record.chain && m.address == record.address)
                .ok_or_else(|| {
                    WalletError::storage(format!(
                        "No key material for {} wallet {}",
                        record.chain, record.id
                    ))
                })?;

            ops.push(StoreOp::put(
                private_key_entry(&record.id),
                hex_codec::encode(&material.private_key),
            ));
            ops.push(StoreOp::put(id_entry(&record.id), record.id.to_string()));
            ops.push(StoreOp::put(
                mnemonic_entry(&record.id),
                result.mnemonic.as_bytes().to_vec(),
            ));
            records.push(record.clone());
        }

        ops.push(StoreOp::put(
            PRIMARY_MNEMONIC_KEY,
            result.mnemonic.as_bytes().to_vec(),
        ));

        let serialized = serde_json::to_vec(&records)
            .map_err(|e| WalletError::storage(format!("Failed to serialize records: {}", e)))?;
        ops.push(StoreOp::put(WALLET_RECORDS_KEY, serialized));

        self.store.write_batch(ops).await?;
        tracing::info!(
            wallets = result.wallets.len(),
            total = records.len(),
            "wallet set persisted"
        );
        Ok(())
    }

    /// 已存储的非敏感记录
    pub async fn list_wallets(&self) -> WalletResult<Vec<WalletRecord>> {
        match self.store.get(WALLET_RECORDS_KEY).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| WalletError::storage(format!("Corrupted wallet records: {}", e))),
            None => Ok(Vec::new()),
        }
    }

    pub async fn has_wallets(&self) -> WalletResult<bool> {
        Ok(!self.list_wallets().await?.is_empty())
    }

    pub async fn load_private_key(&self, id: &Uuid) -> WalletResult<Option<Zeroizing<String>>> {
        Ok(self
            .store
            .get(&private_key_entry(id))
            .await?
            .map(|bytes| Zeroizing::new(hex_codec::decode(&bytes))))
    }

    pub async fn load_mnemonic(&self, id: &Uuid) -> WalletResult<Option<Zeroizing<String>>> {
        self.load_text(&mnemonic_entry(id)).await
    }

    pub async fn primary_mnemonic(&self) -> WalletResult<Option<Zeroizing<String>>> {
        self.load_text(PRIMARY_MNEMONIC_KEY).await
    }

    async fn load_text(&self, key: &str) -> WalletResult<Option<Zeroizing<String>>> {
        Ok(self
            .store
            .get(key)
            .await?
            .map(|bytes| Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned())))
    }
}
