//! # Sync Engine
//!
//! Moves queued scans from `pending.csv` to the registration API.
//!
//! ## Engine Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine Architecture                          │
//! │                                                                         │
//! │  add_code ──► validate ──► append + fsync ──► pending set ──┐          │
//! │                            (under set lock)                 │          │
//! │                                      activated? ──► immediate queue    │
//! │                                                             │          │
//! │  ┌──────────────────────── background loop ────────────────┼───────┐  │
//! │  │  tick (poll_interval)                                   ▼       │  │
//! │  │    ├─ full pass due?  ── refresh token ── sync_all_pending      │  │
//! │  │    │                     gate closed ⇒ next try after backoff   │  │
//! │  │    └─ otherwise       ── drain immediate queue                  │  │
//! │  │  shutdown_rx ──► exit                                           │  │
//! │  └─────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  PASS:                                                                 │
//! │  1. snapshot Pending records (clones, under set lock)                  │
//! │  2. gate: activated AND reachable                                      │
//! │  3. POST /register each, inter_record_delay apart (no lock held)       │
//! │  4. reconcile by id under set lock, rewrite pending.csv once           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record State Machine
//! ```text
//!   Pending ──200 success──► Synced (removed from set and file)
//!      │
//!      └──any failure──► Pending (retry_count+1) ──limit──► Failed (kept)
//! ```
//!
//! Delivery is at-least-once: a crash between a 200 and the rewrite sends
//! the record again on the next pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scanpoint_core::validation::validate_code;
use scanpoint_core::{Clock, Metadata, RecordStatus, SyncRecord, SystemClock};
use scanpoint_store::{QueueRepository, StoreResult};

use crate::activation::ActivationManager;
use crate::api::ApiClient;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::probe::ConnectivityProbe;

// =============================================================================
// Status and Reports
// =============================================================================

/// Snapshot of engine state for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Background loop is running.
    pub running: bool,

    /// Records in the set, failed ones included.
    pub pending_count: usize,

    /// Records that exhausted their retries.
    pub failed_count: usize,

    /// End of the last pass that reached the API.
    pub last_sync: Option<DateTime<Utc>>,

    pub sync_interval_secs: u64,

    /// Result of the most recent gate check.
    pub online: bool,

    /// Records waiting for an immediate send.
    pub queue_size: usize,
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records handed to `sync_single`.
    pub attempted: usize,

    pub synced: usize,

    /// Attempted but not delivered (includes `exhausted`).
    pub failed: usize,

    /// Records that became `Failed` during this pass.
    pub exhausted: usize,

    /// Pending records left alone because the gate was closed.
    pub skipped: usize,

    /// The pass did not run: not activated or unreachable.
    pub gate_closed: bool,

    /// The reconciled set reached disk.
    pub persisted: bool,
}

// =============================================================================
// Event Sink Trait
// =============================================================================

/// Receives engine events (implemented by the UI or CLI front end).
pub trait SyncEventSink: Send + Sync {
    /// Emits a status change.
    fn emit_status(&self, status: &SyncStatus);

    /// A scan was durably queued.
    fn emit_code_added(&self, record: &SyncRecord);

    /// A pass finished.
    fn emit_pass_complete(&self, report: &SyncReport);

    /// Something went wrong that an operator may want to see.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op sink for tests and headless use.
pub struct NoOpSink;

impl SyncEventSink for NoOpSink {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_code_added(&self, _record: &SyncRecord) {}
    fn emit_pass_complete(&self, _report: &SyncReport) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Engine
// =============================================================================

#[derive(Debug, Default)]
struct EngineState {
    last_sync: Option<DateTime<Utc>>,
    online: bool,
}

struct Worker {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

struct EngineInner {
    settings: SyncSettings,
    api: ApiClient,
    activation: Arc<ActivationManager>,
    probe: Arc<dyn ConnectivityProbe>,
    queue: QueueRepository,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn SyncEventSink>,

    /// The pending set. Every durable write happens while this is held.
    pending: Mutex<Vec<SyncRecord>>,

    /// Serializes passes.
    pass_lock: Mutex<()>,

    immediate_tx: mpsc::UnboundedSender<Uuid>,
    immediate_rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    immediate_len: AtomicUsize,
    immediate_ready: Notify,

    state: RwLock<EngineState>,
    stopping: AtomicBool,
    worker: Mutex<Option<Worker>>,
}

/// Offline queue and delivery loop. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn activation(&self) -> &Arc<ActivationManager> {
        &self.inner.activation
    }

    // =========================================================================
    // Capture
    // =========================================================================

    /// Queues a scan. Returns true once it is on disk.
    ///
    /// Validation and storage failures are logged and reported as false;
    /// use [`try_add_code`](Self::try_add_code) for the error itself.
    pub async fn add_code(
        &self,
        code: &str,
        timestamp: DateTime<Utc>,
        metadata: Option<Metadata>,
    ) -> bool {
        match self.try_add_code(code, timestamp, metadata).await {
            Ok(_) => true,
            Err(e) => {
                match e {
                    SyncError::Validation(_) => warn!(error = %e, "Scan rejected"),
                    _ => error!(error = %e, "Failed to queue scan"),
                }
                self.inner.sink.emit_error(&e.to_string(), false);
                false
            }
        }
    }

    /// Queues a scan, returning the stored record.
    ///
    /// Never touches the network. Records of an activated device go on the
    /// immediate queue; reachability is checked when that queue is drained.
    pub async fn try_add_code(
        &self,
        code: &str,
        timestamp: DateTime<Utc>,
        metadata: Option<Metadata>,
    ) -> SyncResult<SyncRecord> {
        let code = validate_code(code)?;
        let metadata = metadata.unwrap_or_default();
        metadata.validate()?;

        let device_id = self.inner.activation.device_id().await;
        let activated = device_id.is_some();
        let record = SyncRecord::new(code, timestamp, device_id.unwrap_or_default(), metadata);

        {
            let mut pending = self.inner.pending.lock().await;
            let row = record.clone();
            self.with_queue(move |queue| queue.append(&row)).await?;
            pending.push(record.clone());
        }

        info!(id = %record.id, code = %record.code, "Scan queued");
        self.inner.sink.emit_code_added(&record);

        if activated {
            self.inner.immediate_len.fetch_add(1, Ordering::SeqCst);
            if self.inner.immediate_tx.send(record.id).is_ok() {
                self.inner.immediate_ready.notify_one();
            } else {
                self.inner.immediate_len.fetch_sub(1, Ordering::SeqCst);
            }
        } else {
            debug!(id = %record.id, "Not activated, scan waits for the next pass");
        }

        Ok(record)
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Gate for every network pass: activated AND reachable.
    pub async fn is_online(&self) -> bool {
        let online = self.inner.activation.is_activated().await
            && self.inner.probe.is_reachable().await;
        self.inner.state.write().await.online = online;
        online
    }

    /// One delivery attempt for one record. Returns true when synced.
    ///
    /// Terminal records are never sent. A record already at the retry
    /// limit is marked failed without a request. Without a credential
    /// nothing is sent and nothing is booked.
    pub async fn sync_single(&self, record: &mut SyncRecord) -> bool {
        match record.status {
            RecordStatus::Synced => return true,
            RecordStatus::Failed => return false,
            RecordStatus::Pending => {}
        }

        let max_retries = self.inner.settings.max_retries;
        if record.attempts_exhausted(max_retries) {
            warn!(id = %record.id, retry_count = record.retry_count, "Retry limit reached");
            if let Err(e) = record.mark_failed() {
                error!(error = %e, "Could not mark record failed");
            }
            return false;
        }

        let Some((token, device_id)) = self.inner.activation.bearer().await else {
            debug!(id = %record.id, "No credential, not sending");
            return false;
        };

        match self.inner.api.register(&token, &device_id, record).await {
            Ok(ack) if ack.success => {
                debug!(id = %record.id, code = %record.code, "Scan delivered");
                record.mark_synced().is_ok()
            }
            Ok(ack) => {
                warn!(id = %record.id, message = ?ack.message, "Scan rejected by server");
                self.book_failure(record)
            }
            Err(SyncError::Unauthorized) => {
                self.inner.activation.revoke("register returned 401").await;
                self.inner
                    .sink
                    .emit_error("Device credential rejected, re-activation required", false);
                self.book_failure(record)
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, category = %e.category(), "Delivery failed");
                self.book_failure(record)
            }
        }
    }

    fn book_failure(&self, record: &mut SyncRecord) -> bool {
        let max_retries = self.inner.settings.max_retries;
        match record.record_failed_attempt(self.inner.clock.now(), max_retries) {
            Ok(RecordStatus::Failed) => {
                let err = SyncError::RetriesExhausted {
                    id: record.id.to_string(),
                };
                warn!(code = %record.code, retry_count = record.retry_count, "{}", err);
                self.inner.sink.emit_error(&err.to_string(), false);
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Attempt booked on terminal record"),
        }
        false
    }

    /// Attempts every pending record once.
    pub async fn sync_all_pending(&self) -> SyncReport {
        self.run_pass(None).await
    }

    /// On-demand pass. Returns `(synced, not synced)`.
    ///
    /// `(0, 0)` when nothing is queued, `(0, pending_count)` when the gate is
    /// closed.
    pub async fn force_sync(&self) -> (usize, usize) {
        let queued = self.inner.pending.lock().await.len();
        if queued == 0 {
            return (0, 0);
        }

        let report = self.run_pass(None).await;
        if report.gate_closed {
            return (0, queued);
        }
        (report.synced, report.failed)
    }

    /// Sends the records queued for immediate delivery.
    pub async fn drain_immediate(&self) -> SyncReport {
        let ids: HashSet<Uuid> = {
            let mut rx = self.inner.immediate_rx.lock().await;
            let mut ids = HashSet::new();
            while let Ok(id) = rx.try_recv() {
                self.inner.immediate_len.fetch_sub(1, Ordering::SeqCst);
                ids.insert(id);
            }
            ids
        };

        if ids.is_empty() {
            return SyncReport::default();
        }
        debug!(count = ids.len(), "Draining immediate queue");
        self.run_pass(Some(ids)).await
    }

    async fn run_pass(&self, only: Option<HashSet<Uuid>>) -> SyncReport {
        let _pass = self.inner.pass_lock.lock().await;
        let mut report = SyncReport::default();

        let queued = self.inner.pending.lock().await.len();
        if queued == 0 {
            debug!("Nothing queued");
            report.persisted = true;
            return report;
        }

        if !self.is_online().await {
            report.gate_closed = true;
            report.skipped = self.snapshot(only.as_ref()).await.len();
            debug!(skipped = report.skipped, "Gate closed, pass skipped");
            return report;
        }

        let snapshot = self.snapshot(only.as_ref()).await;
        if snapshot.is_empty() {
            report.persisted = true;
            return report;
        }

        info!(count = snapshot.len(), "Sync pass starting");

        let delay = self.inner.settings.inter_record_delay();
        let mut attempted = Vec::with_capacity(snapshot.len());

        for (i, mut record) in snapshot.into_iter().enumerate() {
            if self.inner.stopping.load(Ordering::SeqCst) {
                debug!("Stopping, pass cut short");
                break;
            }
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            report.attempted += 1;
            if self.sync_single(&mut record).await {
                report.synced += 1;
            } else {
                report.failed += 1;
                if record.status == RecordStatus::Failed {
                    report.exhausted += 1;
                }
            }
            attempted.push(record);
        }

        report.persisted = match self.reconcile(attempted).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to persist sync results");
                self.inner.sink.emit_error(&e.to_string(), false);
                false
            }
        };

        self.inner.state.write().await.last_sync = Some(self.inner.clock.now());

        info!(
            synced = report.synced,
            failed = report.failed,
            exhausted = report.exhausted,
            "Sync pass complete"
        );
        self.inner.sink.emit_pass_complete(&report);
        let status = self.sync_status().await;
        self.inner.sink.emit_status(&status);

        report
    }

    async fn snapshot(&self, only: Option<&HashSet<Uuid>>) -> Vec<SyncRecord> {
        self.inner
            .pending
            .lock()
            .await
            .iter()
            .filter(|r| r.is_pending())
            .filter(|r| only.map_or(true, |ids| ids.contains(&r.id)))
            .cloned()
            .collect()
    }

    /// Folds attempt results back into the set by id and rewrites the file.
    ///
    /// Records added while the pass ran are kept as they are. Memory is only
    /// updated after the rewrite succeeds.
    async fn reconcile(&self, attempted: Vec<SyncRecord>) -> SyncResult<()> {
        if attempted.is_empty() {
            return Ok(());
        }

        let mut pending = self.inner.pending.lock().await;
        let mut next = pending.clone();

        for record in attempted {
            let Some(pos) = next.iter().position(|r| r.id == record.id) else {
                continue;
            };
            if record.status == RecordStatus::Synced {
                next.remove(pos);
            } else {
                next[pos] = record;
            }
        }

        let rows = next.clone();
        self.with_queue(move |queue| queue.rewrite(&rows)).await?;
        *pending = next;
        Ok(())
    }

    // =========================================================================
    // Collaborator API
    // =========================================================================

    pub async fn sync_status(&self) -> SyncStatus {
        let (pending_count, failed_count) = {
            let pending = self.inner.pending.lock().await;
            let failed = pending
                .iter()
                .filter(|r| r.status == RecordStatus::Failed)
                .count();
            (pending.len(), failed)
        };
        let running = self.is_running().await;
        let state = self.inner.state.read().await;
        SyncStatus {
            running,
            pending_count,
            failed_count,
            last_sync: state.last_sync,
            sync_interval_secs: self.inner.settings.sync_interval_secs,
            online: state.online,
            queue_size: self.inner.immediate_len.load(Ordering::SeqCst),
        }
    }

    /// Copy of the pending set, failed records included.
    pub async fn pending_codes(&self) -> Vec<SyncRecord> {
        self.inner.pending.lock().await.clone()
    }

    /// Drops every `Failed` record. Returns how many were removed.
    pub async fn clear_failed_codes(&self) -> SyncResult<usize> {
        let mut pending = self.inner.pending.lock().await;
        let kept: Vec<SyncRecord> = pending
            .iter()
            .filter(|r| r.status != RecordStatus::Failed)
            .cloned()
            .collect();
        let removed = pending.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let rows = kept.clone();
        self.with_queue(move |queue| queue.rewrite(&rows)).await?;
        *pending = kept;

        info!(removed, "Failed scans cleared");
        Ok(removed)
    }

    /// Writes the pending set as CSV to `destination`.
    ///
    /// Returns false, writing nothing, when the set is empty.
    pub async fn export_pending_data(&self, destination: &Path) -> SyncResult<bool> {
        let pending = self.inner.pending.lock().await;
        if pending.is_empty() {
            return Ok(false);
        }

        let rows = pending.clone();
        let dest: PathBuf = destination.to_path_buf();
        let count = self
            .with_queue(move |queue| queue.export_to(&rows, &dest))
            .await?;

        info!(count, path = %destination.display(), "Pending scans exported");
        Ok(true)
    }

    async fn with_queue<T, F>(&self, op: F) -> SyncResult<T>
    where
        F: FnOnce(&QueueRepository) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let queue = self.inner.queue.clone();
        Ok(tokio::task::spawn_blocking(move || op(&queue)).await??)
    }

    // =========================================================================
    // Background Loop
    // =========================================================================

    /// Spawns the background loop. Calling it twice is a no-op.
    pub async fn start(&self) -> SyncResult<()> {
        let mut worker = self.inner.worker.lock().await;
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("Sync loop already running");
            return Ok(());
        }

        self.inner.stopping.store(false, Ordering::SeqCst);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(self.clone().run_loop(shutdown_rx));
        *worker = Some(Worker {
            shutdown_tx,
            handle,
        });

        info!(
            sync_interval_secs = self.inner.settings.sync_interval_secs,
            poll_interval_secs = self.inner.settings.poll_interval_secs,
            "Sync loop started"
        );
        Ok(())
    }

    /// Stops the loop, waiting at most `shutdown_timeout`.
    ///
    /// A pass in progress stops before its next record and still persists
    /// what it has done.
    pub async fn stop(&self) -> SyncResult<()> {
        let Some(mut worker) = self.inner.worker.lock().await.take() else {
            return Ok(());
        };

        self.inner.stopping.store(true, Ordering::SeqCst);
        let _ = worker.shutdown_tx.send(()).await;

        let result =
            match tokio::time::timeout(self.inner.settings.shutdown_timeout(), &mut worker.handle)
                .await
            {
                Ok(joined) => joined.map_err(SyncError::from),
                Err(_) => {
                    warn!("Sync loop did not stop in time, aborting");
                    worker.handle.abort();
                    Ok(())
                }
            };

        self.inner.stopping.store(false, Ordering::SeqCst);
        info!("Sync loop stopped");
        result
    }

    pub async fn is_running(&self) -> bool {
        self.inner
            .worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    async fn run_loop(self, mut shutdown_rx: mpsc::Receiver<()>) {
        let settings = self.inner.settings.clone();

        let mut ticker = tokio::time::interval(settings.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut backoff = create_backoff(&settings);
        let mut next_full = if settings.sync_on_startup {
            Instant::now()
        } else {
            Instant::now() + settings.sync_interval()
        };

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if Instant::now() >= next_full {
                        let report = self.full_pass().await;
                        let wait = if report.gate_closed {
                            let wait = backoff
                                .next_backoff()
                                .unwrap_or_else(|| settings.max_retry_delay());
                            info!(retry_in_secs = wait.as_secs(), "Offline or not activated, backing off");
                            wait
                        } else {
                            backoff.reset();
                            settings.sync_interval()
                        };
                        next_full = Instant::now() + wait;
                    } else {
                        self.drain_immediate().await;
                    }
                }

                _ = self.inner.immediate_ready.notified() => {
                    self.drain_immediate().await;
                }

                _ = shutdown_rx.recv() => {
                    info!("Sync loop received shutdown");
                    break;
                }
            }
        }
    }

    async fn full_pass(&self) -> SyncReport {
        if self.inner.settings.auto_token_refresh && self.inner.activation.is_activated().await {
            if let Err(e) = self.inner.activation.refresh().await {
                warn!(error = %e, "Token refresh failed");
                self.inner.sink.emit_error(&e.to_string(), e.is_retryable());
            }
        }
        self.sync_all_pending().await
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("queue", &self.inner.queue)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

/// Backoff for skipped passes: `retry_delay` doubling up to `max_retry_delay`.
fn create_backoff(settings: &SyncSettings) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: settings.retry_delay(),
        max_interval: settings.max_retry_delay(),
        multiplier: 2.0,
        max_elapsed_time: None,
        ..Default::default()
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    settings: SyncSettings,
    api: Option<ApiClient>,
    activation: Option<Arc<ActivationManager>>,
    queue: Option<QueueRepository>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn SyncEventSink>>,
}

impl SyncEngineBuilder {
    pub fn new(settings: SyncSettings) -> Self {
        SyncEngineBuilder {
            settings,
            api: None,
            activation: None,
            queue: None,
            probe: None,
            clock: None,
            sink: None,
        }
    }

    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_activation(mut self, activation: Arc<ActivationManager>) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn with_queue(mut self, queue: QueueRepository) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to [`NoOpSink`].
    pub fn with_sink(mut self, sink: Arc<dyn SyncEventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the engine and loads the persisted queue.
    pub async fn build(self) -> SyncResult<SyncEngine> {
        let api = self
            .api
            .ok_or_else(|| SyncError::InvalidConfig("API client required".into()))?;
        let activation = self
            .activation
            .ok_or_else(|| SyncError::InvalidConfig("Activation manager required".into()))?;
        let queue = self
            .queue
            .ok_or_else(|| SyncError::InvalidConfig("Queue repository required".into()))?;
        let probe = self
            .probe
            .ok_or_else(|| SyncError::InvalidConfig("Connectivity probe required".into()))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sink = self.sink.unwrap_or_else(|| Arc::new(NoOpSink));

        let loader = queue.clone();
        let records = tokio::task::spawn_blocking(move || loader.load_all()).await??;

        info!(
            path = %queue.path().display(),
            pending = records.len(),
            "Pending queue loaded"
        );

        let (immediate_tx, immediate_rx) = mpsc::unbounded_channel();

        Ok(SyncEngine {
            inner: Arc::new(EngineInner {
                settings: self.settings,
                api,
                activation,
                probe,
                queue,
                clock,
                sink,
                pending: Mutex::new(records),
                pass_lock: Mutex::new(()),
                immediate_tx,
                immediate_rx: Mutex::new(immediate_rx),
                immediate_len: AtomicUsize::new(0),
                immediate_ready: Notify::new(),
                state: RwLock::new(EngineState::default()),
                stopping: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        })
    }
}
