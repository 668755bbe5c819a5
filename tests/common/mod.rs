//! 测试辅助模块
//! 提供假存储与编排器构造函数

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ironvault::domain::mnemonic::{Entropy, EntropySource, FixedEntropySource};
use ironvault::domain::NetworkEnv;
use ironvault::error::{WalletError, WalletResult};
use ironvault::infrastructure::{InMemorySecureStore, SecureKeyStore, SecureStore, StoreOp};
use ironvault::runtime::{ExecutionStrategy, MainThreadYieldStrategy};
use ironvault::service::{GenerationOrchestrator, OrchestratorSettings};

pub const ABANDON_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const ABANDON_ETH_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D23EC58E053e11f";
pub const ABANDON_BTC_ADDRESS: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
pub const ABANDON_SOL_ADDRESS: &str = "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk";

/// 记录每个批次大小的存储
#[derive(Default)]
pub struct CountingStore {
    inner: InMemorySecureStore,
    batches: Mutex<Vec<usize>>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次 write_batch 的操作数
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecureStore for CountingStore {
    async fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        self.batches.lock().unwrap().push(ops.len());
        self.inner.write_batch(ops).await
    }

    async fn keys(&self) -> WalletResult<Vec<String>> {
        self.inner.keys().await
    }
}

/// 前 `healthy_batches` 个批次成功，之后所有写入失败
pub struct FailingStore {
    inner: InMemorySecureStore,
    healthy_batches: usize,
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn always() -> Self {
        Self::after(0)
    }

    pub fn after(healthy_batches: usize) -> Self {
        Self {
            inner: InMemorySecureStore::new(),
            healthy_batches,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecureStore for FailingStore {
    async fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn write_batch(&self, ops: Vec<StoreOp>) -> WalletResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.healthy_batches {
            return Err(WalletError::storage("simulated device store failure"));
        }
        self.inner.write_batch(ops).await
    }

    async fn keys(&self) -> WalletResult<Vec<String>> {
        self.inner.keys().await
    }
}

pub fn fixed_entropy() -> Entropy {
    Entropy::new([0u8; 16])
}

/// 依次返回给定的熵，最后一个之后一直重复
pub struct SequenceEntropySource {
    queue: Mutex<Vec<Entropy>>,
}

impl SequenceEntropySource {
    pub fn new(entropies: Vec<Entropy>) -> Self {
        assert!(!entropies.is_empty());
        Self {
            queue: Mutex::new(entropies),
        }
    }
}

impl EntropySource for SequenceEntropySource {
    fn next_entropy(&self) -> Entropy {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }
}

/// 固定熵 + 指定存储与策略
pub fn orchestrator_with(
    store: Arc<dyn SecureStore>,
    strategy: Arc<dyn ExecutionStrategy>,
    network: NetworkEnv,
) -> GenerationOrchestrator {
    orchestrator_with_entropy(
        store,
        strategy,
        Arc::new(FixedEntropySource(fixed_entropy())),
        network,
    )
}

pub fn orchestrator_with_entropy(
    store: Arc<dyn SecureStore>,
    strategy: Arc<dyn ExecutionStrategy>,
    entropy: Arc<dyn EntropySource>,
    network: NetworkEnv,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        SecureKeyStore::new(store),
        strategy,
        entropy,
        OrchestratorSettings {
            network,
            wallet_name_prefix: "Main".to_string(),
        },
    )
}

/// 内存存储 + 主线程策略
pub fn simple_orchestrator(network: NetworkEnv) -> (GenerationOrchestrator, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new());
    let orchestrator = orchestrator_with(
        store.clone(),
        Arc::new(MainThreadYieldStrategy::new()),
        network,
    );
    (orchestrator, store)
}
