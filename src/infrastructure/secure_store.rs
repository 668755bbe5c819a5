//! 设备安全存储
//!
//! 面向字节的键值存储。`write_batch` 必须整体生效或整体失败。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{WalletError, WalletResult};
use crate::infrastructure::encryption::{decrypt_data, encrypt_data, EncryptionKey};

/// 批量写操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl StoreOp {
    pub fn put(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    fn apply(self, map: &mut BTreeMap<String, Vec<u8>>) {
        match self {
            Self::Put { key, value } => {
                map.insert(key, value);
            }
            Self::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>>;

    /// 原子批量写
    async fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()>;

    async fn keys(&self) -> WalletResult<Vec<String>>;

    async fn put(&self, key: &str, value: Vec<u8>) -> WalletResult<()> {
        self.write_batch(vec![StoreOp::put(key, value)]).await
    }

    async fn delete(&self, key: &str) -> WalletResult<()> {
        self.write_batch(vec![StoreOp::delete(key)]).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 内存实现
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct InMemorySecureStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    batches: AtomicUsize,
}

impl InMemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已提交的批次数
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecureStore for InMemorySecureStore {
    async fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let mut entries = self.entries.write().await;
        for op in ops {
            op.apply(&mut entries);
        }
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn keys(&self) -> WalletResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 加密文件实现
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 整个映射序列化后用 AES-256-GCM 封装，写临时文件再 rename 替换
pub struct EncryptedFileSecureStore {
    path: PathBuf,
    key: EncryptionKey,
    // 内存副本，写入成功后才更新
    cache: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl EncryptedFileSecureStore {
    pub async fn open(path: impl AsRef<Path>, key: EncryptionKey) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(sealed) => Self::unseal(&sealed, &key)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(WalletError::storage(format!(
                    "Failed to read secure store {:?}: {}",
                    path, e
                )))
            }
        };

        tracing::info!(path = ?path, entries = entries.len(), "secure store opened");
        Ok(Self {
            path,
            key,
            cache: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(entries: &BTreeMap<String, Vec<u8>>, key: &EncryptionKey) -> WalletResult<Vec<u8>> {
        let encoded: BTreeMap<&str, String> = entries
            .iter()
            .map(|(k, v)| (k.as_str(), hex::encode(v)))
            .collect();
        let plain = serde_json::to_vec(&encoded)
            .map_err(|e| WalletError::storage(format!("Failed to serialize store: {}", e)))?;
        encrypt_data(&plain, key)
    }

    fn unseal(sealed: &[u8], key: &EncryptionKey) -> WalletResult<BTreeMap<String, Vec<u8>>> {
        let plain = decrypt_data(sealed, key)?;
        let encoded: BTreeMap<String, String> = serde_json::from_slice(&plain)
            .map_err(|e| WalletError::storage(format!("Corrupted secure store: {}", e)))?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                hex::decode(&v)
                    .map(|bytes| (k, bytes))
                    .map_err(|e| WalletError::storage(format!("Corrupted entry: {}", e)))
            })
            .collect()
    }

    async fn persist(&self, entries: &BTreeMap<String, Vec<u8>>) -> WalletResult<()> {
        let sealed = Self::seal(entries, &self.key)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| WalletError::storage(format!("Failed to create dir: {}", e)))?;
            }
        }

        // 先落盘再 rename，断电后不会留下空文件
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| WalletError::storage(format!("Failed to create secure store: {}", e)))?;
        file.write_all(&sealed)
            .await
            .map_err(|e| WalletError::storage(format!("Failed to write secure store: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| WalletError::storage(format!("Failed to sync secure store: {}", e)))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| WalletError::storage(format!("Failed to replace secure store: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl SecureStore for EncryptedFileSecureStore {
    async fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        for op in ops {
            op.apply(&mut next);
        }
        self.persist(&next).await?;
        *cache = next;
        Ok(())
    }

    async fn keys(&self) -> WalletResult<Vec<String>> {
        Ok(self.cache.read().await.keys().cloned().collect())
    }
}
