//! 执行运行时
//!
//! 能力探测、后台消息协议与三种执行策略

pub mod capability;
pub mod protocol;
pub mod strategy;

pub use capability::{select_strategy, CapabilityDescriptor, CapabilityDetector, StrategyKind};
pub use strategy::{
    build_strategy, DedicatedThreadStrategy, DerivationInput, ExecutionStrategy,
    MainThreadYieldStrategy, ProgressSink, RestrictedContextStrategy, WorkerBody, WorkerEndpoint,
};
