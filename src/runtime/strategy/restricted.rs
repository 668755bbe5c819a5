//! 受限上下文策略
//!
//! 派生在独立调度的协作任务中运行，调用方只等待结果。
//! 任务异常终止时在调用方上下文重跑一遍。

use std::sync::Arc;

use async_trait::async_trait;

use super::{run_cooperative, DerivationInput, ExecutionStrategy, ProgressReporter, ProgressSink};
use crate::domain::chain_config::NetworkEnv;
use crate::domain::wallet::DerivedWalletSet;
use crate::error::WalletResult;
use crate::runtime::capability::StrategyKind;

#[derive(Debug, Default, Clone, Copy)]
pub struct RestrictedContextStrategy;

impl RestrictedContextStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionStrategy for RestrictedContextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RestrictedContext
    }

    async fn run(
        &self,
        input: DerivationInput,
        network: NetworkEnv,
        progress: ProgressSink,
    ) -> WalletResult<DerivedWalletSet> {
        let reporter = Arc::new(ProgressReporter::new(progress));

        let task = {
            let reporter = reporter.clone();
            let input = input.clone();
            tokio::spawn(async move { run_cooperative(&input, network, &reporter).await })
        };

        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::warn!(
                    error = %join_err,
                    "restricted context terminated, restarting on caller thread"
                );
                run_cooperative(&input, network, &reporter).await
            }
        }
    }
}
