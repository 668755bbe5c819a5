//! 多链钱包生成编排器
//!
//! 对外入口：持有唯一的生成状态，选择执行策略，统一持久化。
//!
//! - 同一实例同一时刻只运行一次生成 / 导入
//! - 状态经 watch 通道分发，新订阅者立即看到当前状态
//! - 派生过程中状态进度最多到 99，持久化成功后才置为 100

use std::sync::Arc;

use chrono::Utc;
use futures::Stream;
use tokio::sync::{mpsc, watch};

use crate::config::GenerationConfig;
use crate::domain::chain_config::NetworkEnv;
use crate::domain::generation_status::{GenerationState, GenerationStatus};
use crate::domain::mnemonic::{parse_mnemonic, EntropySource, OsEntropySource};
use crate::domain::wallet::{DerivedWalletSet, MultiChainWalletResult, WalletRecord};
use crate::error::{WalletError, WalletResult};
use crate::infrastructure::key_store::SecureKeyStore;
use crate::runtime::capability::{CapabilityDescriptor, StrategyKind};
use crate::runtime::strategy::{build_strategy, DerivationInput, ExecutionStrategy};

/// 派生进行中状态可显示的最大进度
const MAX_LIVE_PROGRESS: u8 = 99;

pub type WalletSetResult = WalletResult<Arc<MultiChainWalletResult>>;

/// 编排器设置
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub network: NetworkEnv,
    pub wallet_name_prefix: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            network: NetworkEnv::Mainnet,
            wallet_name_prefix: "Main".to_string(),
        }
    }
}

impl From<&GenerationConfig> for OrchestratorSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            network: config.network,
            wallet_name_prefix: config.wallet_name_prefix.clone(),
        }
    }
}

struct Inner {
    key_store: SecureKeyStore,
    strategy: Arc<dyn ExecutionStrategy>,
    entropy: Arc<dyn EntropySource>,
    settings: OrchestratorSettings,
    status: watch::Sender<GenerationStatus>,
}

#[derive(Clone)]
pub struct GenerationOrchestrator {
    inner: Arc<Inner>,
}

impl GenerationOrchestrator {
    pub fn new(
        key_store: SecureKeyStore,
        strategy: Arc<dyn ExecutionStrategy>,
        entropy: Arc<dyn EntropySource>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (status, _) = watch::channel(GenerationStatus::idle());
        Self {
            inner: Arc::new(Inner {
                key_store,
                strategy,
                entropy,
                settings,
                status,
            }),
        }
    }

    /// 按配置与能力描述组装
    pub fn from_config(
        config: &GenerationConfig,
        key_store: SecureKeyStore,
        caps: &CapabilityDescriptor,
    ) -> Self {
        Self::new(
            key_store,
            build_strategy(caps),
            Arc::new(OsEntropySource),
            OrchestratorSettings::from(config),
        )
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.inner.strategy.kind()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    pub fn key_store(&self) -> &SecureKeyStore {
        &self.inner.key_store
    }

    pub fn get_status(&self) -> GenerationStatus {
        self.inner.status.borrow().clone()
    }

    /// 订阅状态；首个事件即当前状态，丢弃订阅即退订
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.inner.status.subscribe(),
            replayed: false,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 入口
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 后台开始生成，立即返回当前状态
    ///
    /// 已在生成中时不做任何事，返回进行中的状态
    pub fn start_background_generation(&self) -> GenerationStatus {
        if self.spawn_generation().is_none() {
            tracing::debug!("generation already in progress");
        }
        self.get_status()
    }

    /// 生成一组新钱包；已有生成在进行时等待它的结果
    pub async fn create_wallet_async(&self) -> WalletSetResult {
        match self.spawn_generation() {
            Some(task) => task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "generation task aborted");
                Err(WalletError::Cancelled)
            }),
            None => self.wait_for_completion().await,
        }
    }

    /// 从助记词导入
    ///
    /// 助记词无效时直接返回错误，不改变状态也不写存储；
    /// 已有生成在进行时返回 Busy
    pub async fn import_wallet_from_mnemonic_async(&self, phrase: &str) -> WalletSetResult {
        let mnemonic = parse_mnemonic(phrase).map_err(|e| {
            tracing::warn!(error = %e, "mnemonic import rejected");
            e
        })?;

        if !self.try_begin() {
            return Err(WalletError::Busy);
        }
        tracing::info!(words = mnemonic.word_count(), "importing wallet from mnemonic");

        let this = self.clone();
        tokio::spawn(async move { this.drive(DerivationInput::Import(mnemonic)).await })
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "import task aborted");
                Err(WalletError::Cancelled)
            })
    }

    /// 等待下一次 completed / error
    ///
    /// 调用前已到达终态时立即返回该结果
    pub async fn wait_for_completion(&self) -> WalletSetResult {
        let mut rx = self.inner.status.subscribe();
        loop {
            {
                let status = rx.borrow_and_update();
                match status.state {
                    GenerationState::Completed => {
                        if let Some(result) = &status.result {
                            return Ok(result.clone());
                        }
                    }
                    GenerationState::Error => {
                        return Err(status.error.clone().unwrap_or(WalletError::Cancelled));
                    }
                    GenerationState::Idle | GenerationState::Generating => {}
                }
            }
            rx.changed().await.map_err(|_| WalletError::Cancelled)?;
        }
    }

    /// 终态回到 idle；生成中返回 Busy
    pub fn reset(&self) -> WalletResult<()> {
        let mut rejected = false;
        self.inner.status.send_if_modified(|status| {
            if status.is_generating() {
                rejected = true;
                return false;
            }
            if status.state == GenerationState::Idle {
                return false;
            }
            *status = GenerationStatus::idle();
            true
        });
        if rejected {
            return Err(WalletError::Busy);
        }
        Ok(())
    }

    /// 取消进行中的生成（仅专用线程策略生效）
    pub fn cancel(&self) {
        if self.get_status().is_generating() {
            self.inner.strategy.cancel();
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 内部
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 原子地进入 generating；已在生成中返回 false
    fn try_begin(&self) -> bool {
        self.inner.status.send_if_modified(|status| {
            if !status.state.can_transition_to(&GenerationState::Generating) {
                return false;
            }
            *status = GenerationStatus::generating();
            true
        })
    }

    fn spawn_generation(&self) -> Option<tokio::task::JoinHandle<WalletSetResult>> {
        if !self.try_begin() {
            return None;
        }
        let entropy = self.inner.entropy.next_entropy();
        tracing::info!(
            strategy = %self.strategy_kind(),
            network = %self.inner.settings.network,
            "wallet generation started"
        );

        let this = self.clone();
        Some(tokio::spawn(async move {
            this.drive(DerivationInput::Generate(entropy)).await
        }))
    }

    async fn drive(self, input: DerivationInput) -> WalletSetResult {
        let imported = input.is_import();
        let network = self.inner.settings.network;
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let mut run = self.inner.strategy.run(input, network, progress_tx);
        let outcome = loop {
            tokio::select! {
                Some(percent) = progress_rx.recv() => self.publish_progress(percent),
                outcome = &mut run => break outcome,
            }
        };
        while let Ok(percent) = progress_rx.try_recv() {
            self.publish_progress(percent);
        }

        let outcome = match outcome {
            Ok(set) => self.persist(set, imported).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    wallets = result.wallets.len(),
                    imported,
                    "wallet generation completed"
                );
                self.inner
                    .status
                    .send_replace(GenerationStatus::completed(result.clone()));
                Ok(result)
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.code(), "wallet generation failed");
                self.inner.status.send_modify(|status| {
                    *status = GenerationStatus::failed(e.clone(), status.progress);
                });
                Err(e)
            }
        }
    }

    fn publish_progress(&self, percent: u8) {
        let percent = percent.min(MAX_LIVE_PROGRESS);
        self.inner
            .status
            .send_if_modified(|status| status.advance(percent));
    }

    async fn persist(&self, set: DerivedWalletSet, imported: bool) -> WalletSetResult {
        let settings = &self.inner.settings;
        let now = Utc::now();
        let wallets = set
            .materials
            .iter()
            .map(|m| {
                WalletRecord::from_material(m, settings.network, &settings.wallet_name_prefix, now)
            })
            .collect();

        let result = MultiChainWalletResult {
            mnemonic: set.mnemonic.clone(),
            wallets,
            imported,
        };
        self.inner
            .key_store
            .save_wallet_set(&result, &set.materials)
            .await?;
        Ok(Arc::new(result))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 订阅
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 状态订阅句柄
///
/// 中间状态可能被合并，但看到的进度不会倒退
pub struct StatusSubscription {
    rx: watch::Receiver<GenerationStatus>,
    replayed: bool,
}

impl StatusSubscription {
    pub fn current(&self) -> GenerationStatus {
        self.rx.borrow().clone()
    }

    /// 首次调用立即返回当前状态；编排器全部释放后返回 None
    pub async fn next(&mut self) -> Option<GenerationStatus> {
        if !self.replayed {
            self.replayed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn into_stream(self) -> impl Stream<Item = GenerationStatus> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|status| (status, subscription))
        })
    }
}
