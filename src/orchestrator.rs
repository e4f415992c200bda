use crate::error::TestError;
use crate::history::ResultStore;
use crate::netinfo::{NetworkInfo, NetworkLookup};
use crate::settings::TestSettings;
use crate::speedtest::{
    ping::PingProgress,
    server::{best_server, find_server, Server},
    transfer::TransferProgress,
    Measurement, SpeedBackend, TestPhase,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events sent from a running test to whoever is presenting it.
#[derive(Debug, Clone)]
pub enum TestUpdate {
    Phase(TestPhase),
    ServerSelected(Server),
    PingProgress(PingProgress),
    PingComplete { avg_ms: f64, jitter_ms: f64 },
    DownloadProgress(TransferProgress),
    DownloadComplete { speed_mbps: f64 },
    UploadProgress(TransferProgress),
    UploadComplete { speed_mbps: f64 },
    /// Sent after the measurement has been recorded and persisted.
    Completed(RunOutcome),
    Failed(TestError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub measurement: Measurement,
    pub info: NetworkInfo,
    pub server: Server,
}

/// State touched by both the UI and the background run.
#[derive(Debug)]
pub struct SharedState {
    pub history: ResultStore,
    pub selected_server: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub candidate_servers: usize,
    /// Limit for a whole run. `None` lets slow links finish however long they take.
    pub timeout: Option<Duration>,
}

impl From<&TestSettings> for RunOptions {
    fn from(settings: &TestSettings) -> Self {
        Self {
            candidate_servers: settings.candidate_servers,
            timeout: settings.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Coordinates measurement runs. At most one run is in flight at a time.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn SpeedBackend>,
    lookup: Arc<dyn NetworkLookup>,
    state: Arc<Mutex<SharedState>>,
    running: Arc<AtomicBool>,
    options: RunOptions,
}

/// Handle to a run started with [`Orchestrator::start`].
pub struct RunHandle {
    cancel_tx: mpsc::Sender<()>,
    handle: JoinHandle<Result<RunOutcome, TestError>>,
}

impl RunHandle {
    /// Aborts the in-flight transfers. The run ends with [`TestError::Cancelled`].
    pub fn cancel(&self) {
        let _ = self.cancel_tx.try_send(());
    }

    pub async fn join(self) -> Result<RunOutcome, TestError> {
        self.handle
            .await
            .map_err(|e| TestError::Other(e.to_string()))?
    }
}

struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn SpeedBackend>,
        lookup: Arc<dyn NetworkLookup>,
        history: ResultStore,
        selected_server: Option<String>,
        options: RunOptions,
    ) -> Self {
        Self {
            backend,
            lookup,
            state: Arc::new(Mutex::new(SharedState {
                history,
                selected_server,
            })),
            running: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the server used by later runs; `None` restores best-server discovery.
    /// The id is not checked against the catalog here.
    pub fn select_server(&self, id: Option<String>) {
        let id = id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        log::info!("selected server: {:?}", id);
        self.state().selected_server = id;
    }

    pub fn selected_server(&self) -> Option<String> {
        self.state().selected_server.clone()
    }

    pub fn history(&self) -> Vec<Measurement> {
        self.state().history.all().to_vec()
    }

    /// Runs `f` against the history while holding the state lock.
    pub fn with_history<R>(&self, f: impl FnOnce(&ResultStore) -> R) -> R {
        f(&self.state().history)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn list_servers(&self) -> Result<Vec<Server>, TestError> {
        self.backend.list_servers(None).await
    }

    fn try_begin(&self) -> Result<RunGuard, TestError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TestError::AlreadyRunning)?;
        Ok(RunGuard(self.running.clone()))
    }

    /// Spawns a run on the runtime and returns immediately.
    pub fn start(&self, update_tx: mpsc::Sender<TestUpdate>) -> Result<RunHandle, TestError> {
        let guard = self.try_begin()?;
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_guarded(guard, update_tx, cancel_rx).await });
        Ok(RunHandle { cancel_tx, handle })
    }

    /// Runs one measurement to completion on the current task.
    pub async fn run_measurement(
        &self,
        update_tx: mpsc::Sender<TestUpdate>,
        cancel_rx: mpsc::Receiver<()>,
    ) -> Result<RunOutcome, TestError> {
        let guard = self.try_begin()?;
        self.run_guarded(guard, update_tx, cancel_rx).await
    }

    async fn run_guarded(
        &self,
        guard: RunGuard,
        update_tx: mpsc::Sender<TestUpdate>,
        mut cancel_rx: mpsc::Receiver<()>,
    ) -> Result<RunOutcome, TestError> {
        let bounded = async {
            match self.options.timeout {
                Some(limit) => tokio::time::timeout(limit, self.measure(&update_tx))
                    .await
                    .unwrap_or_else(|_| Err(TestError::Timeout(limit.as_secs()))),
                None => self.measure(&update_tx).await,
            }
        };
        let result = tokio::select! {
            res = bounded => res,
            _ = cancelled(&mut cancel_rx) => Err(TestError::Cancelled),
        };

        // Recording happens outside the cancellable section so a stop request can
        // never leave a half-recorded run.
        let result = result.and_then(|outcome| {
            self.state().history.record(outcome.measurement)?;
            Ok(outcome)
        });

        drop(guard);

        match &result {
            Ok(outcome) => {
                log::info!(
                    "test complete: {:.2} Mbps down, {:.2} Mbps up, {:.3} ms ping",
                    outcome.measurement.download_mbps,
                    outcome.measurement.upload_mbps,
                    outcome.measurement.ping_ms
                );
                let _ = update_tx.send(TestUpdate::Completed(outcome.clone())).await;
            }
            Err(e) => {
                log::warn!("test failed: {}", e);
                let _ = update_tx.send(TestUpdate::Failed(e.clone())).await;
            }
        }

        result
    }

    async fn measure(&self, update_tx: &mpsc::Sender<TestUpdate>) -> Result<RunOutcome, TestError> {
        let _ = update_tx.send(TestUpdate::Phase(TestPhase::SelectingServer)).await;
        let server = self.choose_server().await?;
        log::info!("using server {}", server.label());
        let _ = update_tx.send(TestUpdate::ServerSelected(server.clone())).await;

        // Ping test
        let _ = update_tx.send(TestUpdate::Phase(TestPhase::Ping)).await;
        let (ping_tx, ping_rx) = mpsc::channel(32);
        let ping = relay(
            self.backend.ping(&server, ping_tx),
            ping_rx,
            update_tx,
            TestUpdate::PingProgress,
        )
        .await?;
        let _ = update_tx
            .send(TestUpdate::PingComplete {
                avg_ms: ping.avg_ms,
                jitter_ms: ping.jitter_ms,
            })
            .await;

        // Download test
        let _ = update_tx.send(TestUpdate::Phase(TestPhase::Download)).await;
        let (download_tx, download_rx) = mpsc::channel(32);
        let download = relay(
            self.backend.download(&server, download_tx),
            download_rx,
            update_tx,
            TestUpdate::DownloadProgress,
        )
        .await?;
        let _ = update_tx
            .send(TestUpdate::DownloadComplete {
                speed_mbps: download.avg_speed_mbps,
            })
            .await;

        // Upload test
        let _ = update_tx.send(TestUpdate::Phase(TestPhase::Upload)).await;
        let (upload_tx, upload_rx) = mpsc::channel(32);
        let upload = relay(
            self.backend.upload(&server, upload_tx),
            upload_rx,
            update_tx,
            TestUpdate::UploadProgress,
        )
        .await?;
        let _ = update_tx
            .send(TestUpdate::UploadComplete {
                speed_mbps: upload.avg_speed_mbps,
            })
            .await;

        let _ = update_tx.send(TestUpdate::Phase(TestPhase::Lookup)).await;
        let info = self.lookup.lookup().await;

        Ok(RunOutcome {
            measurement: Measurement::from_raw(download.avg_speed_mbps, upload.avg_speed_mbps, ping.avg_ms),
            info,
            server,
        })
    }

    async fn choose_server(&self) -> Result<Server, TestError> {
        match self.selected_server() {
            Some(id) => {
                let servers = self.backend.list_servers(Some(&id)).await?;
                find_server(&servers, &id)
            }
            None => {
                let servers = self.backend.list_servers(None).await?;
                let (server, latency) =
                    best_server(self.backend.as_ref(), &servers, self.options.candidate_servers).await?;
                log::debug!("best server {} at {:.1} ms", server.id, latency);
                Ok(server)
            }
        }
    }
}

/// Drives `test` while forwarding its progress reports as [`TestUpdate`]s.
///
/// The relay ends once `test` completes and drops its sender.
async fn relay<T, P, F>(
    test: F,
    mut progress_rx: mpsc::Receiver<P>,
    update_tx: &mpsc::Sender<TestUpdate>,
    wrap: fn(P) -> TestUpdate,
) -> Result<T, TestError>
where
    F: Future<Output = Result<T, TestError>>,
{
    let forward = async {
        while let Some(progress) = progress_rx.recv().await {
            let _ = update_tx.send(wrap(progress)).await;
        }
    };
    let (result, ()) = tokio::join!(test, forward);
    result
}

/// Resolves when a stop is requested. A dropped handle is not a stop request.
async fn cancelled(cancel_rx: &mut mpsc::Receiver<()>) {
    if cancel_rx.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}
