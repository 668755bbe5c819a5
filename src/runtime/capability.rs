//! 执行环境能力探测与策略选择
//!
//! 能力描述在启动时确定一次并复用；探测结果进程内缓存，仅测试可重置

use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// 宿主提供的并发能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// 可以启动独立后台线程
    pub dedicated_thread_available: bool,
    /// 存在受限的协作式上下文
    pub restricted_context_available: bool,
    /// 受限宿主运行时（原生能力模块不可用）
    pub is_constrained_host_runtime: bool,
}

impl CapabilityDescriptor {
    /// 只能在主线程协作让出
    pub fn main_thread_only() -> Self {
        Self {
            dedicated_thread_available: false,
            restricted_context_available: false,
            is_constrained_host_runtime: false,
        }
    }

    /// 按配置覆盖探测值
    pub fn with_overrides(mut self, config: &GenerationConfig) -> Self {
        if let Some(v) = config.dedicated_thread {
            self.dedicated_thread_available = v;
        }
        if let Some(v) = config.restricted_context {
            self.restricted_context_available = v;
        }
        if let Some(v) = config.constrained_runtime {
            self.is_constrained_host_runtime = v;
        }
        self
    }
}

/// 执行策略类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DedicatedThread,
    RestrictedContext,
    MainThreadYield,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DedicatedThread => "dedicated_thread",
            Self::RestrictedContext => "restricted_context",
            Self::MainThreadYield => "main_thread_yield",
        };
        f.write_str(s)
    }
}

/// 选择规则：
/// 1. 受限宿主一律主线程让出
/// 2. 否则 专用线程 > 受限上下文 > 主线程让出
pub fn select_strategy(caps: &CapabilityDescriptor) -> StrategyKind {
    if caps.is_constrained_host_runtime {
        return StrategyKind::MainThreadYield;
    }
    if caps.dedicated_thread_available {
        StrategyKind::DedicatedThread
    } else if caps.restricted_context_available {
        StrategyKind::RestrictedContext
    } else {
        StrategyKind::MainThreadYield
    }
}

static DETECTED: Lazy<Mutex<Option<CapabilityDescriptor>>> = Lazy::new(|| Mutex::new(None));

pub struct CapabilityDetector;

impl CapabilityDetector {
    /// 探测一次，之后返回缓存值
    pub fn detect() -> CapabilityDescriptor {
        let mut cached = DETECTED.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(caps) = *cached {
            return caps;
        }
        let caps = Self::probe();
        tracing::info!(
            dedicated_thread = caps.dedicated_thread_available,
            restricted_context = caps.restricted_context_available,
            constrained = caps.is_constrained_host_runtime,
            "execution capabilities detected"
        );
        *cached = Some(caps);
        caps
    }

    /// 仅供测试：清除缓存
    pub fn reset_for_tests() {
        *DETECTED.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn probe() -> CapabilityDescriptor {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let dedicated_thread_available = cfg!(not(target_family = "wasm")) && parallelism > 1;

        // 当前处于 tokio 运行时中即可派生独立的协作任务
        let restricted_context_available = tokio::runtime::Handle::try_current().is_ok();

        CapabilityDescriptor {
            dedicated_thread_available,
            restricted_context_available,
            is_constrained_host_runtime: cfg!(target_family = "wasm"),
        }
    }
}
