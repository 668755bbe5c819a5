//! 主线程让出策略
//!
//! 在调用方所在的事件循环上顺序派生，检查点之间让出控制权。
//! 一旦开始就会跑完，不支持取消。

use async_trait::async_trait;

use super::{run_cooperative, DerivationInput, ExecutionStrategy, ProgressReporter, ProgressSink};
use crate::domain::chain_config::NetworkEnv;
use crate::domain::wallet::DerivedWalletSet;
use crate::error::WalletResult;
use crate::runtime::capability::StrategyKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct MainThreadYieldStrategy;

impl MainThreadYieldStrategy {
    pub fn new() -> Self {
        Self
    }

    /// 使用外部的进度上报器（供降级重启共享单调进度）
    pub(crate) async fn run_with_reporter(
        &self,
        input: &DerivationInput,
        network: NetworkEnv,
        reporter: &ProgressReporter,
    ) -> WalletResult<DerivedWalletSet> {
        run_cooperative(input, network, reporter).await
    }
}

#[async_trait]
impl ExecutionStrategy for MainThreadYieldStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MainThreadYield
    }

    async fn run(
        &self,
        input: DerivationInput,
        network: NetworkEnv,
        progress: ProgressSink,
    ) -> WalletResult<DerivedWalletSet> {
        tracing::debug!(?input, %network, "running derivation on caller thread");
        let reporter = ProgressReporter::new(progress);
        self.run_with_reporter(&input, network, &reporter).await
    }
}
