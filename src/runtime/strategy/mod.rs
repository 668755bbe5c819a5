//! 执行策略
//!
//! 三种可互换实现：专用后台线程、受限协作上下文、主线程让出。
//! 策略只负责派生与进度；持久化由编排器统一完成。

mod dedicated_thread;
mod main_thread;
mod restricted;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bip39::Mnemonic;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use crate::domain::chain_config::NetworkEnv;
use crate::domain::derivation::DeriverSet;
use crate::domain::mnemonic::Entropy;
use crate::domain::wallet::DerivedWalletSet;
use crate::error::WalletResult;
use crate::runtime::capability::{select_strategy, CapabilityDescriptor, StrategyKind};
use crate::runtime::protocol::{RequestId, WorkerRequest};

pub use dedicated_thread::{DedicatedThreadStrategy, WorkerBody, WorkerEndpoint};
pub use main_thread::MainThreadYieldStrategy;
pub use restricted::RestrictedContextStrategy;

/// 进度事件流（百分比）
pub type ProgressSink = mpsc::UnboundedSender<u8>;

/// 派生开始（助记词就绪）时的进度
pub const PROGRESS_STARTED: u8 = 10;
/// 每条链完成后的进度，顺序与 ChainKind::ALL 一致
pub const PROGRESS_AFTER_CHAIN: [u8; 4] = [25, 50, 75, 90];
pub const PROGRESS_DONE: u8 = 100;

/// 派生输入
#[derive(Clone)]
pub enum DerivationInput {
    Generate(Entropy),
    /// 已通过校验和检查的助记词
    Import(Mnemonic),
}

impl DerivationInput {
    pub fn is_import(&self) -> bool {
        matches!(self, Self::Import(_))
    }

    pub fn mnemonic(&self) -> Mnemonic {
        match self {
            Self::Generate(entropy) => entropy.to_mnemonic(),
            Self::Import(mnemonic) => mnemonic.clone(),
        }
    }

    pub fn to_request(&self, id: RequestId, network: NetworkEnv) -> WorkerRequest {
        match self {
            Self::Generate(entropy) => WorkerRequest::Generate {
                id,
                entropy: entropy.to_hex().to_string(),
                network,
            },
            Self::Import(mnemonic) => WorkerRequest::Import {
                id,
                mnemonic: mnemonic.to_string(),
                network,
            },
        }
    }
}

impl fmt::Debug for DerivationInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate(_) => f.write_str("Generate(<redacted>)"),
            Self::Import(_) => f.write_str("Import(<redacted>)"),
        }
    }
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// 派生四条链。进度通过 `progress` 发出，且单调不减
    async fn run(
        &self,
        input: DerivationInput,
        network: NetworkEnv,
        progress: ProgressSink,
    ) -> WalletResult<DerivedWalletSet>;

    /// 取消当前任务；不支持取消的策略忽略
    fn cancel(&self) {}
}

/// 只发出严格递增的进度值
///
/// 降级重启后较小的检查点会被吞掉，订阅方看到的序列保持单调
pub struct ProgressReporter {
    sink: ProgressSink,
    last: AtomicU8,
}

impl ProgressReporter {
    pub fn new(sink: ProgressSink) -> Self {
        Self {
            sink,
            last: AtomicU8::new(0),
        }
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(PROGRESS_DONE);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            // 接收方已关闭时进度无人关心
            let _ = self.sink.send(percent);
        }
    }

    pub fn last(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}

/// 协作式流水线：开始前让出一次，每两次派生之间各让出一次
pub(crate) async fn run_cooperative(
    input: &DerivationInput,
    network: NetworkEnv,
    reporter: &ProgressReporter,
) -> WalletResult<DerivedWalletSet> {
    tokio::task::yield_now().await;

    let mnemonic = input.mnemonic();
    let derivers = DeriverSet::new(network);
    reporter.report(PROGRESS_STARTED);

    let mut materials = Vec::with_capacity(derivers.len());
    for (step, deriver) in derivers.iter().enumerate() {
        if step > 0 {
            tokio::task::yield_now().await;
        }
        materials.push(derivers.derive_checked(deriver, &mnemonic)?);
        reporter.report(PROGRESS_AFTER_CHAIN[step]);
    }

    reporter.report(PROGRESS_DONE);
    Ok(DerivedWalletSet {
        mnemonic: Zeroizing::new(mnemonic.to_string()),
        materials,
    })
}

/// 按能力描述构造策略
pub fn build_strategy(caps: &CapabilityDescriptor) -> Arc<dyn ExecutionStrategy> {
    let kind = select_strategy(caps);
    tracing::info!(strategy = %kind, "execution strategy selected");
    match kind {
        StrategyKind::DedicatedThread => Arc::new(DedicatedThreadStrategy::new()),
        StrategyKind::RestrictedContext => Arc::new(RestrictedContextStrategy::new()),
        StrategyKind::MainThreadYield => Arc::new(MainThreadYieldStrategy::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_drops_regressions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reporter = ProgressReporter::new(tx);
        for p in [10, 25, 10, 50, 50, 200] {
            reporter.report(p);
        }
        let mut seen = Vec::new();
        while let Ok(p) = rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(seen, vec![10, 25, 50, 100]);
        assert_eq!(reporter.last(), 100);
    }

    #[test]
    fn test_build_strategy_follows_selection() {
        let constrained = CapabilityDescriptor {
            dedicated_thread_available: true,
            restricted_context_available: true,
            is_constrained_host_runtime: true,
        };
        assert_eq!(
            build_strategy(&constrained).kind(),
            StrategyKind::MainThreadYield
        );

        let restricted = CapabilityDescriptor {
            dedicated_thread_available: false,
            restricted_context_available: true,
            is_constrained_host_runtime: false,
        };
        assert_eq!(
            build_strategy(&restricted).kind(),
            StrategyKind::RestrictedContext
        );
    }

    #[test]
    fn test_input_debug_is_redacted() {
        let input = DerivationInput::Generate(Entropy::new([1u8; 16]));
        assert_eq!(format!("{:?}", input), "Generate(<redacted>)");
        assert!(!input.is_import());
    }
}
