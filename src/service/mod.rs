pub mod orchestrator; // 生成 / 导入编排

pub use orchestrator::{
    GenerationOrchestrator, OrchestratorSettings, StatusSubscription, WalletSetResult,
};
