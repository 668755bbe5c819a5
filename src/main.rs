//! IronVault 主入口
//!
//! 用法：
//!   ironvault                     生成新钱包组
//!   ironvault generate            同上
//!   ironvault import "<助记词>"   从助记词导入

use std::sync::Arc;

use anyhow::{Context, Result};
use ironvault::{
    config::{Config, KeystoreBackend},
    infrastructure::{
        encryption::EncryptionKey, logging::init_logging, EncryptedFileSecureStore,
        InMemorySecureStore, SecureKeyStore, SecureStore,
    },
    runtime::CapabilityDetector,
    service::GenerationOrchestrator,
};

enum Command {
    Generate,
    Import(String),
}

fn parse_command(args: &[String]) -> Result<Command> {
    match args.first().map(String::as_str) {
        None | Some("generate") => Ok(Command::Generate),
        Some("import") => {
            let phrase = args[1..].join(" ");
            if phrase.trim().is_empty() {
                anyhow::bail!("usage: ironvault import \"<mnemonic phrase>\"");
            }
            Ok(Command::Import(phrase))
        }
        Some(other) => anyhow::bail!("unknown command: {}", other),
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn SecureStore>> {
    match config.keystore.backend {
        KeystoreBackend::Memory => {
            tracing::warn!("using in-memory keystore, wallets are lost on exit");
            Ok(Arc::new(InMemorySecureStore::new()))
        }
        KeystoreBackend::File => {
            let text = config
                .keystore
                .encryption_key
                .as_deref()
                .context("WALLET_ENC_KEY must be set when using the file keystore")?;
            let key = EncryptionKey::from_text(text)?;
            let store = EncryptedFileSecureStore::open(&config.keystore.path, key).await?;
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向的文件优先）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())?;
    config.validate()?;

    // 3. 初始化日志
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("logging init failed: {}", e))?;
    tracing::info!("Starting IronVault");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    // 4. 存储与编排器
    let key_store = SecureKeyStore::new(open_store(&config).await?);
    let caps = CapabilityDetector::detect().with_overrides(&config.generation);
    let orchestrator = GenerationOrchestrator::from_config(&config.generation, key_store, &caps);

    // 5. 执行
    let result = match command {
        Command::Generate => orchestrator.create_wallet_async().await?,
        Command::Import(phrase) => {
            orchestrator
                .import_wallet_from_mnemonic_async(&phrase)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&result.wallets)?);
    tracing::info!(
        wallets = result.wallets.len(),
        imported = result.imported,
        "done; recovery phrase stored in keystore"
    );
    Ok(())
}
