//! 专用后台线程策略
//!
//! - 后台线程按需启动一次，之后复用
//! - 调用方与线程之间只交换 JSON 行（见 protocol）
//! - 同一时刻只处理一个请求，忙时立即拒绝
//! - 线程不可用 / 消息畸形时降级为主线程让出，从头重跑
//! - 支持取消：后台线程在两次派生之间检查取消标志
//! - 每个请求带编号，只接受编号匹配的响应；未正常结束的请求会丢弃所用线程

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

use super::{
    DerivationInput, ExecutionStrategy, MainThreadYieldStrategy, ProgressReporter, ProgressSink,
    PROGRESS_AFTER_CHAIN, PROGRESS_DONE, PROGRESS_STARTED,
};
use crate::domain::chain_config::NetworkEnv;
use crate::domain::derivation::DeriverSet;
use crate::domain::mnemonic::{parse_mnemonic, Entropy};
use crate::domain::wallet::DerivedWalletSet;
use crate::error::{WalletError, WalletResult};
use crate::runtime::capability::StrategyKind;
use crate::runtime::protocol::{self, RequestId, WorkerRequest, WorkerResponse};

/// 等待后台线程就绪的上限
const READY_TIMEOUT: Duration = Duration::from_secs(5);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 后台线程端
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 后台线程持有的通信端点
pub struct WorkerEndpoint {
    pub requests: std::sync::mpsc::Receiver<String>,
    pub responses: mpsc::UnboundedSender<String>,
    pub cancelled: Arc<AtomicBool>,
}

/// 后台线程入口
pub type WorkerBody = fn(WorkerEndpoint);

impl WorkerEndpoint {
    /// 发送一条响应；调用方已离开时返回 false
    pub fn send(&self, response: &WorkerResponse) -> bool {
        match protocol::encode(response) {
            Ok(line) => self.responses.send(line).is_ok(),
            Err(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 默认线程主循环：发出 Ready 后逐条处理请求，直到请求通道关闭
    pub fn run(self) {
        if !self.send(&WorkerResponse::Ready) {
            return;
        }

        while let Ok(line) = self.requests.recv() {
            let request = match protocol::decode::<WorkerRequest>(&line) {
                Ok(request) => request,
                Err(e) => {
                    self.send(&WorkerResponse::from_error(None, &e));
                    continue;
                }
            };

            let id = request.id();
            let response = match self.handle(request) {
                Ok(Some(set)) => WorkerResponse::Result {
                    id,
                    mnemonic: set.mnemonic.to_string(),
                    materials: set.materials,
                },
                Ok(None) => WorkerResponse::from_error(Some(id), &WalletError::Cancelled),
                Err(e) => WorkerResponse::from_error(Some(id), &e),
            };
            if !self.send(&response) {
                break;
            }
        }
        tracing::debug!("derivation worker exiting");
    }

    fn handle(&self, request: WorkerRequest) -> WalletResult<Option<DerivedWalletSet>> {
        let id = request.id();
        let (mnemonic, network) = match request {
            WorkerRequest::Generate {
                entropy, network, ..
            } => {
                let entropy = Entropy::from_hex(&Zeroizing::new(entropy))?;
                (entropy.to_mnemonic(), network)
            }
            WorkerRequest::Import {
                mnemonic, network, ..
            } => (parse_mnemonic(&Zeroizing::new(mnemonic))?, network),
        };
        self.send(&WorkerResponse::Progress {
            id,
            percent: PROGRESS_STARTED,
        });

        let derivers = DeriverSet::new(network);
        let mut materials = Vec::with_capacity(derivers.len());
        for (step, deriver) in derivers.iter().enumerate() {
            if self.is_cancelled() {
                return Ok(None);
            }
            materials.push(derivers.derive_checked(deriver, &mnemonic)?);
            self.send(&WorkerResponse::Progress {
                id,
                percent: PROGRESS_AFTER_CHAIN[step],
            });
        }

        self.send(&WorkerResponse::Progress {
            id,
            percent: PROGRESS_DONE,
        });
        Ok(Some(DerivedWalletSet {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            materials,
        }))
    }
}

fn default_worker(endpoint: WorkerEndpoint) {
    endpoint.run()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 调用方
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct WorkerHandle {
    requests: std::sync::mpsc::Sender<String>,
    responses: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    cancelled: Arc<AtomicBool>,
}

impl WorkerHandle {
    async fn await_ready(&self) -> WalletResult<()> {
        let mut responses = self.responses.lock().await;
        let first = tokio::time::timeout(READY_TIMEOUT, responses.recv())
            .await
            .map_err(|_| WalletError::transport("Worker did not signal readiness"))?
            .ok_or_else(|| WalletError::transport("Worker exited before ready"))?;

        match protocol::decode::<WorkerResponse>(&first)? {
            WorkerResponse::Ready => Ok(()),
            _ => Err(WalletError::transport("Worker sent unexpected first message")),
        }
    }
}

/// 忙标志守卫，离开作用域时释放
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 请求未收到终结响应就结束（取消、超时丢弃）时丢弃所用线程，
/// 其残留响应不会被下一个请求读到
struct InFlight<'a> {
    strategy: &'a DedicatedThreadStrategy,
    worker: Arc<WorkerHandle>,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.strategy.discard(&self.worker);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct DedicatedThreadStrategy {
    body: WorkerBody,
    worker: Mutex<Option<Arc<WorkerHandle>>>,
    busy: AtomicBool,
    active_cancel: Mutex<Option<oneshot::Sender<()>>>,
    spawned: AtomicUsize,
    next_request: AtomicU64,
    fallback: MainThreadYieldStrategy,
}

impl DedicatedThreadStrategy {
    pub fn new() -> Self {
        Self::with_worker(default_worker)
    }

    /// 指定后台线程入口（测试用于模拟崩溃 / 协议错误）
    pub fn with_worker(body: WorkerBody) -> Self {
        Self {
            body,
            worker: Mutex::new(None),
            busy: AtomicBool::new(false),
            active_cancel: Mutex::new(None),
            spawned: AtomicUsize::new(0),
            next_request: AtomicU64::new(0),
            fallback: MainThreadYieldStrategy::new(),
        }
    }

    /// 已启动的后台线程数
    pub fn contexts_spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn spawn_worker(&self) -> WalletResult<Arc<WorkerHandle>> {
        let (request_tx, request_rx) = std::sync::mpsc::channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));

        let endpoint = WorkerEndpoint {
            requests: request_rx,
            responses: response_tx,
            cancelled: cancelled.clone(),
        };
        let body = self.body;
        let index = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;

        std::thread::Builder::new()
            .name(format!("ironvault-derive-{}", index))
            .spawn(move || body(endpoint))
            .map_err(|e| WalletError::transport(format!("Failed to spawn worker: {}", e)))?;
        tracing::info!(worker = index, "derivation worker started");

        Ok(Arc::new(WorkerHandle {
            requests: request_tx,
            responses: tokio::sync::Mutex::new(response_rx),
            cancelled,
        }))
    }

    async fn acquire_worker(&self) -> WalletResult<Arc<WorkerHandle>> {
        let existing = lock(&self.worker).clone();
        if let Some(worker) = existing {
            return Ok(worker);
        }

        let worker = self.spawn_worker()?;
        worker.await_ready().await?;
        *lock(&self.worker) = Some(worker.clone());
        Ok(worker)
    }

    fn discard_worker(&self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.cancelled.store(true, Ordering::SeqCst);
        }
    }

    /// 只丢弃指定线程，槽位里已换成新线程时不动它
    fn discard(&self, worker: &Arc<WorkerHandle>) {
        worker.cancelled.store(true, Ordering::SeqCst);
        let mut slot = lock(&self.worker);
        if slot.as_ref().map_or(false, |current| Arc::ptr_eq(current, worker)) {
            slot.take();
        }
        tracing::debug!("derivation worker discarded after unfinished request");
    }

    async fn run_on_worker(
        &self,
        input: &DerivationInput,
        network: NetworkEnv,
        reporter: &ProgressReporter,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> WalletResult<DerivedWalletSet> {
        // 握手期间取消：未登记的线程随 acquire 一起被丢弃
        let worker = tokio::select! {
            biased;
            _ = &mut *cancel_rx => return Err(WalletError::Cancelled),
            worker = self.acquire_worker() => worker?,
        };

        let id: RequestId = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
        let line = Zeroizing::new(protocol::encode(&input.to_request(id, network))?);
        let mut in_flight = InFlight {
            strategy: self,
            worker: worker.clone(),
            settled: false,
        };
        worker
            .requests
            .send(line.to_string())
            .map_err(|_| WalletError::transport("Worker request channel closed"))?;

        let mut responses = worker.responses.lock().await;
        loop {
            let line = tokio::select! {
                biased;
                _ = &mut *cancel_rx => return Err(WalletError::Cancelled),
                line = responses.recv() => {
                    line.ok_or_else(|| WalletError::transport("Worker exited mid-request"))?
                }
            };

            let response = protocol::decode::<WorkerResponse>(&line)?;
            if !response.belongs_to(id) {
                tracing::debug!(request = id, response = ?response, "skipping stale worker response");
                continue;
            }

            match response {
                WorkerResponse::Ready => continue,
                WorkerResponse::Progress { percent, .. } => reporter.report(percent),
                WorkerResponse::Result {
                    mnemonic,
                    materials,
                    ..
                } => {
                    in_flight.settled = true;
                    return Ok(DerivedWalletSet {
                        mnemonic: Zeroizing::new(mnemonic),
                        materials,
                    });
                }
                WorkerResponse::Error {
                    code,
                    message,
                    chain,
                    ..
                } => {
                    in_flight.settled = true;
                    return Err(WorkerResponse::into_error(&code, message, chain));
                }
            }
        }
    }
}

impl Default for DedicatedThreadStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionStrategy for DedicatedThreadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DedicatedThread
    }

    async fn run(
        &self,
        input: DerivationInput,
        network: NetworkEnv,
        progress: ProgressSink,
    ) -> WalletResult<DerivedWalletSet> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WalletError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        let reporter = ProgressReporter::new(progress);
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        *lock(&self.active_cancel) = Some(cancel_tx);

        let outcome = self
            .run_on_worker(&input, network, &reporter, &mut cancel_rx)
            .await;
        lock(&self.active_cancel).take();

        match outcome {
            Err(e) if e.is_transport() => {
                tracing::warn!(
                    error = %e,
                    "derivation worker unavailable, restarting on caller thread"
                );
                self.discard_worker();
                self.fallback
                    .run_with_reporter(&input, network, &reporter)
                    .await
            }
            other => other,
        }
    }

    fn cancel(&self) {
        let pending = lock(&self.active_cancel).take();
        if let Some(tx) = pending {
            tracing::info!("cancelling derivation worker");
            let _ = tx.send(());
            self.discard_worker();
        }
    }
}
