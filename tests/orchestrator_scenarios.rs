//! 编排器端到端场景
//!
//! 固定熵生成、导入校验、原子持久化、进度单调、订阅回放、单飞

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use futures::StreamExt;
use ironvault::domain::mnemonic::Entropy;
use ironvault::domain::{ChainKind, GenerationState, GenerationStatus, NetworkEnv};
use ironvault::error::WalletError;
use ironvault::infrastructure::{SecureKeyStore, SecureStore};
use ironvault::runtime::protocol::{self, WorkerRequest, WorkerResponse};
use ironvault::runtime::{
    DedicatedThreadStrategy, MainThreadYieldStrategy, RestrictedContextStrategy, WorkerEndpoint,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 生成 / 导入
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn test_fixed_entropy_produces_four_chains() {
    for network in [NetworkEnv::Mainnet, NetworkEnv::Testnet] {
        let (orchestrator, _store) = simple_orchestrator(network);
        let result = orchestrator.create_wallet_async().await.unwrap();

        let chains: HashSet<&str> = result.wallets.iter().map(|w| w.chain.tag()).collect();
        assert_eq!(
            chains,
            HashSet::from(["ethereum", "solana", "bitcoin", "bnb"])
        );
        assert_eq!(result.wallets.len(), 4);

        let eth = result.wallet(ChainKind::Ethereum).unwrap();
        let bnb = result.wallet(ChainKind::Bnb).unwrap();
        assert_eq!(eth.address, bnb.address);
        assert_ne!(eth.id, bnb.id);

        let btc = result.wallet(ChainKind::Bitcoin).unwrap();
        let expected_prefix = format!("{}1q", network.bitcoin_hrp());
        assert!(btc.address.starts_with(&expected_prefix), "{}", btc.address);

        for wallet in &result.wallets {
            assert_eq!(wallet.network, network);
            assert_eq!(wallet.balance, "0");
            assert_eq!(wallet.created_at, wallet.updated_at);
        }
    }
}

#[tokio::test]
async fn test_zero_entropy_matches_reference_wallets() {
    let (orchestrator, _store) = simple_orchestrator(NetworkEnv::Mainnet);
    let result = orchestrator.create_wallet_async().await.unwrap();

    assert_eq!(result.mnemonic.as_str(), ABANDON_MNEMONIC);
    assert_eq!(
        result.wallet(ChainKind::Ethereum).unwrap().address,
        ABANDON_ETH_ADDRESS
    );
    assert_eq!(
        result.wallet(ChainKind::Bitcoin).unwrap().address,
        ABANDON_BTC_ADDRESS
    );
    assert_eq!(
        result.wallet(ChainKind::Solana).unwrap().address,
        ABANDON_SOL_ADDRESS
    );
}

#[tokio::test]
async fn test_corrupted_import_has_zero_side_effects() {
    let (orchestrator, store) = simple_orchestrator(NetworkEnv::Mainnet);
    let mut subscription = orchestrator.subscribe();
    assert_eq!(subscription.next().await.unwrap(), GenerationStatus::idle());

    let corrupted = ABANDON_MNEMONIC.replace("about", "abandon");
    let err = orchestrator
        .import_wallet_from_mnemonic_async(&corrupted)
        .await
        .unwrap_err();

    assert!(matches!(err, WalletError::InvalidMnemonic(_)));
    assert_eq!(orchestrator.get_status(), GenerationStatus::idle());
    assert!(store.batch_sizes().is_empty());
    assert!(store.keys().await.unwrap().is_empty());

    // 订阅者没有收到任何变化
    let pending =
        tokio::time::timeout(std::time::Duration::from_millis(50), subscription.next()).await;
    assert!(pending.is_err());
}

#[tokio::test]
async fn test_import_persists_secrets() {
    let (orchestrator, store) = simple_orchestrator(NetworkEnv::Mainnet);
    let result = orchestrator
        .import_wallet_from_mnemonic_async(&format!("  {}  ", ABANDON_MNEMONIC))
        .await
        .unwrap();
    assert!(result.imported);

    let key_store = SecureKeyStore::new(store.clone());
    assert_eq!(
        key_store.primary_mnemonic().await.unwrap().unwrap().as_str(),
        ABANDON_MNEMONIC
    );

    for wallet in &result.wallets {
        let secret = key_store.load_private_key(&wallet.id).await.unwrap().unwrap();
        match wallet.chain {
            ChainKind::Ethereum | ChainKind::Bnb => assert_eq!(secret.len(), 66),
            ChainKind::Solana => assert_eq!(secret.len(), 128),
            ChainKind::Bitcoin => assert_eq!(secret.len(), 52),
        }
        assert_eq!(
            key_store.load_mnemonic(&wallet.id).await.unwrap().unwrap().as_str(),
            ABANDON_MNEMONIC
        );
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 原子性
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn test_wallet_set_written_in_one_batch() {
    let (orchestrator, store) = simple_orchestrator(NetworkEnv::Mainnet);
    orchestrator.create_wallet_async().await.unwrap();

    // 4 × (私钥 + id + 助记词) + 主助记词 + 记录列表
    assert_eq!(store.batch_sizes(), vec![14]);
}

#[tokio::test]
async fn test_storage_failure_leaves_no_partial_set() {
    let store = Arc::new(FailingStore::always());
    let orchestrator = orchestrator_with(
        store.clone(),
        Arc::new(MainThreadYieldStrategy::new()),
        NetworkEnv::Mainnet,
    );

    let err = orchestrator.create_wallet_async().await.unwrap_err();
    assert!(matches!(err, WalletError::Storage(_)));
    assert_eq!(store.attempts(), 1);

    let status = orchestrator.get_status();
    assert_eq!(status.state, GenerationState::Error);
    assert_eq!(status.error, Some(err));
    assert!(status.progress < 100);
    assert!(status.result.is_none());

    let key_store = SecureKeyStore::new(store.clone());
    assert!(key_store.list_wallets().await.unwrap().is_empty());
    assert!(store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_generation_keeps_previous_wallets() {
    let store = Arc::new(FailingStore::after(1));
    let orchestrator = orchestrator_with(
        store.clone(),
        Arc::new(MainThreadYieldStrategy::new()),
        NetworkEnv::Mainnet,
    );

    let first = orchestrator.create_wallet_async().await.unwrap();
    orchestrator.reset().unwrap();
    assert!(orchestrator.create_wallet_async().await.is_err());

    let key_store = SecureKeyStore::new(store.clone());
    let stored = key_store.list_wallets().await.unwrap();
    assert_eq!(stored, first.wallets);
    assert_eq!(
        key_store.primary_mnemonic().await.unwrap().unwrap().as_str(),
        ABANDON_MNEMONIC
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 进度与订阅
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn test_progress_is_monotonic() {
    let (orchestrator, _store) = simple_orchestrator(NetworkEnv::Mainnet);
    let mut statuses = orchestrator.subscribe().into_stream().boxed();

    orchestrator.start_background_generation();

    let mut observed = Vec::new();
    while let Some(status) = statuses.next().await {
        let done = status.state.is_final();
        observed.push(status);
        if done {
            break;
        }
    }

    let generating: Vec<u8> = observed
        .iter()
        .filter(|s| s.state == GenerationState::Generating)
        .map(|s| s.progress)
        .collect();
    assert!(!generating.is_empty());
    assert!(generating[0] <= 10);
    assert!(generating.windows(2).all(|w| w[0] <= w[1]));
    assert!(generating.iter().all(|p| *p < 100));

    let last = observed.last().unwrap();
    assert_eq!(last.state, GenerationState::Completed);
    assert_eq!(last.progress, 100);
}

#[tokio::test]
async fn test_late_subscriber_sees_completed_without_new_run() {
    let (orchestrator, store) = simple_orchestrator(NetworkEnv::Mainnet);
    let result = orchestrator.create_wallet_async().await.unwrap();

    let mut subscription = orchestrator.subscribe();
    let replayed = subscription.next().await.unwrap();
    assert_eq!(replayed.state, GenerationState::Completed);
    assert_eq!(replayed.result.as_deref(), Some(result.as_ref()));

    let waited = orchestrator.wait_for_completion().await.unwrap();
    assert!(Arc::ptr_eq(&waited, &result));
    assert_eq!(store.batch_sizes().len(), 1);
}

#[tokio::test]
async fn test_dropped_subscription_is_harmless() {
    let (orchestrator, _store) = simple_orchestrator(NetworkEnv::Mainnet);
    let subscription = orchestrator.subscribe();
    drop(subscription);

    orchestrator.create_wallet_async().await.unwrap();
    assert_eq!(orchestrator.get_status().state, GenerationState::Completed);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 单飞
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(flavor = "current_thread")]
async fn test_concurrent_creates_share_one_run() {
    let strategy = Arc::new(DedicatedThreadStrategy::new());
    let store = Arc::new(CountingStore::new());
    let orchestrator = orchestrator_with(store.clone(), strategy.clone(), NetworkEnv::Mainnet);

    let (a, b) = tokio::join!(
        orchestrator.create_wallet_async(),
        orchestrator.create_wallet_async()
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(strategy.contexts_spawned(), 1);
    assert_eq!(store.batch_sizes().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_second_start_does_not_disturb_running_generation() {
    let strategy = Arc::new(DedicatedThreadStrategy::new());
    let store = Arc::new(CountingStore::new());
    let orchestrator = orchestrator_with(store.clone(), strategy.clone(), NetworkEnv::Mainnet);

    let first = orchestrator.start_background_generation();
    assert_eq!(first, GenerationStatus::generating());

    let second = orchestrator.start_background_generation();
    assert_eq!(second, first);

    let err = orchestrator
        .import_wallet_from_mnemonic_async(ABANDON_MNEMONIC)
        .await
        .unwrap_err();
    assert_eq!(err, WalletError::Busy);

    orchestrator.wait_for_completion().await.unwrap();
    assert_eq!(strategy.contexts_spawned(), 1);
    assert_eq!(store.batch_sizes().len(), 1);

    let key_store = SecureKeyStore::new(store.clone());
    assert_eq!(key_store.list_wallets().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_reset_while_generating_is_rejected() {
    let (orchestrator, _store) = simple_orchestrator(NetworkEnv::Mainnet);
    orchestrator.start_background_generation();
    assert_eq!(orchestrator.reset().unwrap_err(), WalletError::Busy);

    orchestrator.wait_for_completion().await.unwrap();
    orchestrator.reset().unwrap();
    assert_eq!(orchestrator.get_status().state, GenerationState::Idle);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 策略一致性
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn test_all_strategies_agree() {
    let strategies: Vec<Arc<dyn ironvault::runtime::ExecutionStrategy>> = vec![
        Arc::new(DedicatedThreadStrategy::new()),
        Arc::new(RestrictedContextStrategy::new()),
        Arc::new(MainThreadYieldStrategy::new()),
    ];

    let mut addresses = Vec::new();
    for strategy in strategies {
        let orchestrator = orchestrator_with(
            Arc::new(CountingStore::new()),
            strategy,
            NetworkEnv::Testnet,
        );
        let result = orchestrator.create_wallet_async().await.unwrap();
        let set: Vec<(ChainKind, String)> = result
            .wallets
            .iter()
            .map(|w| (w.chain, w.address.clone()))
            .collect();
        addresses.push(set);
    }

    assert_eq!(addresses[0], addresses[1]);
    assert_eq!(addresses[1], addresses[2]);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 取消
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static STALL_FIRST_REQUEST: AtomicBool = AtomicBool::new(true);

/// 第一个后台线程收到请求后停住直到被取消，之后的线程正常工作
fn stall_first_request_worker(endpoint: WorkerEndpoint) {
    if !STALL_FIRST_REQUEST.swap(false, Ordering::SeqCst) {
        return endpoint.run();
    }
    endpoint.send(&WorkerResponse::Ready);
    if let Ok(line) = endpoint.requests.recv() {
        let id = protocol::decode::<WorkerRequest>(&line)
            .map(|request| request.id())
            .unwrap_or_default();
        endpoint.send(&WorkerResponse::Progress { id, percent: 10 });
        while !endpoint.is_cancelled() {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_generation_persists_nothing() {
    let strategy = Arc::new(DedicatedThreadStrategy::with_worker(
        stall_first_request_worker,
    ));
    let store = Arc::new(CountingStore::new());
    let next = Entropy::new([1u8; 16]);
    let orchestrator = orchestrator_with_entropy(
        store.clone(),
        strategy.clone(),
        Arc::new(SequenceEntropySource::new(vec![
            fixed_entropy(),
            next.clone(),
        ])),
        NetworkEnv::Mainnet,
    );

    orchestrator.start_background_generation();
    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.get_status().progress < 10 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    orchestrator.cancel();
    let err = orchestrator.wait_for_completion().await.unwrap_err();
    assert_eq!(err, WalletError::Cancelled);

    let status = orchestrator.get_status();
    assert_eq!(status.state, GenerationState::Error);
    assert_eq!(status.error, Some(WalletError::Cancelled));
    assert!(status.result.is_none());

    assert!(store.batch_sizes().is_empty());
    let key_store = SecureKeyStore::new(store.clone());
    assert!(key_store.list_wallets().await.unwrap().is_empty());
    assert!(!key_store.has_wallets().await.unwrap());

    // 下一轮拿到的是自己的助记词，不是被取消那一轮的
    let result = orchestrator.create_wallet_async().await.unwrap();
    assert_eq!(result.mnemonic.as_str(), next.to_mnemonic().to_string());
    assert_ne!(result.mnemonic.as_str(), ABANDON_MNEMONIC);
    assert_eq!(store.batch_sizes().len(), 1);
    assert_eq!(key_store.list_wallets().await.unwrap().len(), 4);
    assert_eq!(strategy.contexts_spawned(), 2);
}
