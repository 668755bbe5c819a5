//! 生成状态机
//!
//! idle → generating → {completed | error}
//!
//! 终态只能经显式 reset 回到 idle；也可以不经 reset 直接开始新一轮 generating。
//! generating 期间不能 reset，也不能开始第二轮。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::wallet::MultiChainWalletResult;
use crate::error::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Idle,
    Generating,
    Completed,
    Error,
}

impl GenerationState {
    /// 是否为终态（需要 reset 才能回到 idle）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn can_transition_to(&self, target: &Self) -> bool {
        use GenerationState::*;

        matches!(
            (self, target),
            (Idle, Generating)
                | (Generating, Completed)
                | (Generating, Error)
                | (Completed, Idle)
                | (Error, Idle)
                // 终态之后允许直接开始新一轮
                | (Completed, Generating)
                | (Error, Generating)
        )
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// 订阅者看到的唯一状态来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStatus {
    pub state: GenerationState,
    /// 0..=100，生成过程中单调不减
    pub progress: u8,
    pub result: Option<Arc<MultiChainWalletResult>>,
    pub error: Option<WalletError>,
}

impl GenerationStatus {
    pub fn idle() -> Self {
        Self {
            state: GenerationState::Idle,
            progress: 0,
            result: None,
            error: None,
        }
    }

    pub fn generating() -> Self {
        Self {
            state: GenerationState::Generating,
            progress: 0,
            result: None,
            error: None,
        }
    }

    pub fn completed(result: Arc<MultiChainWalletResult>) -> Self {
        Self {
            state: GenerationState::Completed,
            progress: 100,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: WalletError, progress: u8) -> Self {
        Self {
            state: GenerationState::Error,
            progress,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.state == GenerationState::Generating
    }

    /// 推进进度；非生成状态或倒退时忽略。返回是否发生变化
    pub fn advance(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if !self.is_generating() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self::idle()
    }
}
