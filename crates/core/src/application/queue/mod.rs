// Queue Engine - offline write queue
//
// Owns the pending jobs, picks which ones run now (concurrency limit),
// performs them with a per-attempt timeout and retry/backoff, and mirrors
// every durable change into the DurableStore.

pub mod config;
pub mod constants;
mod enqueue;
mod snapshot;


pub use config::QueueConfig;
pub use enqueue::EnqueueOptions;

use crate::application::connectivity::ConnectivityGate;
use crate::application::retry::{self, RetryDecision};
use crate::application::shutdown::{shutdown_channel, ShutdownSender};
use crate::domain::{FlushResult, HttpMethod, HttpRequest, HttpResponse, Job, JobError, JobId};
use crate::error::Result;
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{
    AlwaysOnline, ConnectivityProbe, DurableStore, HttpTransport, IdProvider, RequestTransform,
    TimeProvider, TransportError, UrlTransform,
};
use constants::RESULT_CHANNEL_CAPACITY;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Queue summary for UI indicators ("3 pending changes")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub online: bool,
}

/// What started a flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Explicit `flush()` or connectivity restored: jobs in backoff run now
    Immediate,
    /// Enqueue, retry timer or follow-up batch: backoff is honored
    Scheduled,
}

#[derive(Default)]
struct QueueState {
    /// Insertion-ordered pending jobs
    jobs: Vec<Job>,
    /// Generation of each queued record. A replacement under the same id gets
    /// a fresh one, so a flight of the old record never touches the new one.
    /// Keys always match `jobs` (never persisted)
    generations: HashMap<JobId, u64>,
    next_generation: u64,
    /// Ids currently executing, with the generation that was claimed (never persisted)
    in_flight: HashMap<JobId, u64>,
    /// Earliest instant a failed job may run again (never persisted)
    not_before: HashMap<JobId, Instant>,
    /// Stored snapshot has been merged in
    hydrated: bool,
}

impl QueueState {
    fn stamp(&mut self, job_id: &str) {
        self.next_generation += 1;
        self.generations
            .insert(job_id.to_string(), self.next_generation);
    }

    /// The queued record under `job_id` is still the one claimed as `generation`
    fn is_current(&self, job_id: &str, generation: u64) -> bool {
        self.generations.get(job_id) == Some(&generation)
    }

    fn is_eligible(&self, job: &Job, now: Instant, trigger: Trigger) -> bool {
        if self.in_flight.contains_key(&job.id) {
            return false;
        }
        trigger == Trigger::Immediate
            || self
                .not_before
                .get(&job.id)
                .map_or(true, |ready_at| *ready_at <= now)
    }

    fn remove(&mut self, job_id: &str) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.id != job_id);
        self.generations.remove(job_id);
        self.not_before.remove(job_id);
        self.jobs.len() != before
    }

    fn remove_current(&mut self, job_id: &str, generation: u64) -> bool {
        self.is_current(job_id, generation) && self.remove(job_id)
    }

    fn clear(&mut self) -> usize {
        let cleared = self.jobs.len();
        self.jobs.clear();
        self.generations.clear();
        self.in_flight.clear();
        self.not_before.clear();
        cleared
    }
}

struct Inner {
    config: QueueConfig,
    store: Arc<dyn DurableStore>,
    transport: Arc<dyn HttpTransport>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    url_transform: Option<UrlTransform>,
    request_transform: Option<RequestTransform>,
    gate: ConnectivityGate,
    state: Mutex<QueueState>,
    /// Serializes snapshot writes; each write encodes the state current at that moment
    persist_lock: tokio::sync::Mutex<()>,
    shutdown: ShutdownSender,
    status_tx: watch::Sender<QueueStatus>,
    results_tx: broadcast::Sender<FlushResult>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`QueueEngine`]
pub struct QueueEngineBuilder {
    config: QueueConfig,
    store: Arc<dyn DurableStore>,
    transport: Arc<dyn HttpTransport>,
    probe: Arc<dyn ConnectivityProbe>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    url_transform: Option<UrlTransform>,
    request_transform: Option<RequestTransform>,
}

impl QueueEngineBuilder {
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn id_provider(mut self, id_provider: Arc<dyn IdProvider>) -> Self {
        self.id_provider = id_provider;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn url_transform(mut self, transform: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.url_transform = Some(Arc::new(transform));
        self
    }

    pub fn request_transform(
        mut self,
        transform: impl Fn(&mut HttpRequest) + Send + Sync + 'static,
    ) -> Self {
        self.request_transform = Some(Arc::new(transform));
        self
    }

    /// Build the engine and start listening for connectivity transitions.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> QueueEngine {
        let gate = ConnectivityGate::new(self.probe.as_ref());
        let online = gate.is_online();
        let (shutdown, _) = shutdown_channel();
        let (status_tx, _) = watch::channel(QueueStatus {
            pending: 0,
            in_flight: 0,
            online,
        });
        let (results_tx, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);

        let engine = QueueEngine {
            inner: Arc::new(Inner {
                config: self.config,
                store: self.store,
                transport: self.transport,
                id_provider: self.id_provider,
                time_provider: self.time_provider,
                url_transform: self.url_transform,
                request_transform: self.request_transform,
                gate,
                state: Mutex::new(QueueState::default()),
                persist_lock: tokio::sync::Mutex::new(()),
                shutdown,
                status_tx,
                results_tx,
            }),
        };
        engine.spawn_connectivity_listener();
        engine
    }
}

/// Offline write queue. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct QueueEngine {
    inner: Arc<Inner>,
}

/// Removes a job id from the in-flight set however the attempt ends
struct InFlightGuard<'a> {
    engine: &'a QueueEngine,
    job_id: JobId,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.engine.inner.state();
            // reset() may have cleared the entry and a new flight claimed the id
            if state.in_flight.get(&self.job_id) == Some(&self.generation) {
                state.in_flight.remove(&self.job_id);
            }
        }
        self.engine.publish_status();
    }
}

impl QueueEngine {
    pub fn builder(
        store: Arc<dyn DurableStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> QueueEngineBuilder {
        QueueEngineBuilder {
            config: QueueConfig::default(),
            store,
            transport,
            probe: Arc::new(AlwaysOnline),
            id_provider: Arc::new(UuidProvider),
            time_provider: Arc::new(SystemTimeProvider),
            url_transform: None,
            request_transform: None,
        }
    }

    // ------------------------------------------------------------------
    // Public API
    // ------------------------------------------------------------------

    /// Load the persisted snapshot into memory.
    ///
    /// Idempotent. Jobs enqueued before hydration finishes are kept and win
    /// over stored jobs with the same id or dedupe key. Returns the number of
    /// pending jobs afterwards.
    pub async fn hydrate(&self) -> usize {
        {
            let _write = self.inner.persist_lock.lock().await;
            self.load_snapshot_locked().await;
        }
        self.publish_status();

        let pending = self.status().pending;
        if pending > 0 && self.is_online() {
            self.schedule_flush(Duration::ZERO, Trigger::Scheduled);
        }
        pending
    }

    /// Queue a request for delivery. Returns as soon as the job is persisted;
    /// does not wait for execution.
    pub async fn enqueue(&self, options: EnqueueOptions) -> Result<JobId> {
        let job = enqueue::build_job(
            options,
            &self.inner.config,
            self.inner.id_provider.as_ref(),
            self.inner.time_provider.as_ref(),
        )?;
        let job_id = job.id.clone();
        let method = job.method;
        let url = job.url.clone();

        let replaced = {
            let mut state = self.inner.state();
            let superseded: Vec<JobId> = state
                .jobs
                .iter()
                .filter(|queued| queued.is_superseded_by(&job))
                .map(|queued| queued.id.clone())
                .collect();
            for id in &superseded {
                state.remove(id);
            }
            state.stamp(&job.id);
            state.jobs.push(job);
            superseded.len()
        };
        if replaced > 0 {
            debug!(job_id = %job_id, replaced, "Superseded queued job(s)");
        }

        self.persist().await;
        info!(job_id = %job_id, method = %method, url = %url, "Job enqueued");

        if self.is_online() {
            self.schedule_flush(Duration::ZERO, Trigger::Scheduled);
        }
        Ok(job_id)
    }

    pub async fn post(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<JobId> {
        self.enqueue_method(HttpMethod::Post, url.into(), body, headers)
            .await
    }

    pub async fn put(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<JobId> {
        self.enqueue_method(HttpMethod::Put, url.into(), body, headers)
            .await
    }

    pub async fn patch(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<JobId> {
        self.enqueue_method(HttpMethod::Patch, url.into(), body, headers)
            .await
    }

    pub async fn delete(
        &self,
        url: impl Into<String>,
        body: Option<serde_json::Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<JobId> {
        self.enqueue_method(HttpMethod::Delete, url.into(), body, headers)
            .await
    }

    /// Run one batch of eligible jobs, up to the free concurrency slots.
    ///
    /// No-op while offline. Jobs waiting out a retry backoff are included
    /// (manual retry-now). Never fails: per-job errors become
    /// [`FlushResult`] entries.
    pub async fn flush(&self) -> Vec<FlushResult> {
        self.flush_batch(Trigger::Immediate).await
    }

    async fn flush_batch(&self, trigger: Trigger) -> Vec<FlushResult> {
        if !self.is_online() {
            debug!("Offline, flush skipped");
            return Vec::new();
        }
        self.ensure_hydrated().await;

        let batch = self.claim_batch(trigger);
        if batch.is_empty() {
            return Vec::new();
        }
        debug!(batch_size = batch.len(), ?trigger, "Flushing batch");
        self.publish_status();

        let results = join_all(
            batch
                .into_iter()
                .map(|(job, generation)| self.run_job(job, generation)),
        )
        .await;
        for result in &results {
            // No subscribers is fine
            let _ = self.inner.results_tx.send(result.clone());
        }

        let drain_more = {
            let state = self.inner.state();
            let now = Instant::now();
            state.in_flight.len() < self.inner.config.effective_concurrency()
                && state
                    .jobs
                    .iter()
                    .any(|job| state.is_eligible(job, now, Trigger::Scheduled))
        };
        if drain_more && self.is_online() {
            self.schedule_flush(Duration::ZERO, Trigger::Scheduled);
        }
        results
    }

    /// Drop every pending job (logout / account switch)
    pub async fn reset(&self) -> usize {
        let cleared = {
            let mut state = self.inner.state();
            // The stored snapshot is discarded too
            state.hydrated = true;
            state.clear()
        };
        self.persist().await;
        info!(cleared, "Queue reset");
        cleared
    }

    /// Stop the connectivity listener and every pending timer. Idempotent.
    ///
    /// Requests already on the wire are left to finish.
    pub fn dispose(&self) {
        if !self.inner.shutdown.is_shutdown() {
            self.inner.shutdown.shutdown();
            info!("Queue engine disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shutdown.is_shutdown()
    }

    pub fn is_online(&self) -> bool {
        self.inner.gate.is_online()
    }

    /// Feed a platform online/offline transition into the gate
    pub fn set_online(&self, online: bool) {
        if self.inner.gate.set_online(online) {
            info!(online, "Connectivity changed");
            self.publish_status();
        }
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state();
        QueueStatus {
            pending: state.jobs.len(),
            in_flight: state.in_flight.len(),
            online: self.inner.gate.is_online(),
        }
    }

    /// Current queue contents, in insertion order
    pub fn jobs(&self) -> Vec<Job> {
        self.inner.state().jobs.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<QueueStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Results of every flush, including internally scheduled ones
    pub fn subscribe_results(&self) -> broadcast::Receiver<FlushResult> {
        self.inner.results_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    async fn enqueue_method(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<serde_json::Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<JobId> {
        let mut options = EnqueueOptions::new(method, url);
        options.body = body;
        options.headers = headers.unwrap_or_default();
        self.enqueue(options).await
    }

    /// Mark up to the free slot count of eligible jobs as in flight,
    /// each paired with the generation it was claimed at
    fn claim_batch(&self, trigger: Trigger) -> Vec<(Job, u64)> {
        let now = Instant::now();
        let mut guard = self.inner.state();
        let batch: Vec<(Job, u64)> = {
            let state = &*guard;
            let capacity = self
                .inner
                .config
                .effective_concurrency()
                .saturating_sub(state.in_flight.len());
            state
                .jobs
                .iter()
                .filter(|job| state.is_eligible(job, now, trigger))
                .filter_map(|job| {
                    let generation = state.generations.get(&job.id).copied()?;
                    Some((job.clone(), generation))
                })
                .take(capacity)
                .collect()
        };
        for (job, generation) in &batch {
            guard.in_flight.insert(job.id.clone(), *generation);
            guard.not_before.remove(&job.id);
        }
        batch
    }

    async fn run_job(&self, mut job: Job, generation: u64) -> FlushResult {
        let _in_flight = InFlightGuard {
            engine: self,
            job_id: job.id.clone(),
            generation,
        };

        match self.perform(&mut job, generation).await {
            Ok(response) => {
                self.remove(&job.id, generation).await;
                info!(
                    job_id = %job.id,
                    status = response.status,
                    attempt = job.attempt,
                    "Job delivered"
                );
                FlushResult::delivered(job.id.clone(), response)
            }
            Err(error) => {
                // False once reset() or a replacement took the record away
                let still_queued = self.inner.state().is_current(&job.id, generation);
                let will_retry = match retry::decide(&job) {
                    RetryDecision::Retry(delay) if still_queued => {
                        warn!(job_id = %job.id, attempt = job.attempt, error = %error, "Attempt failed");
                        self.defer(&job.id, delay);
                        self.schedule_flush(delay, Trigger::Scheduled);
                        true
                    }
                    RetryDecision::Retry(_) => {
                        debug!(job_id = %job.id, "Job left the queue while in flight, not retrying");
                        false
                    }
                    RetryDecision::Exhausted => {
                        error!(
                            job_id = %job.id,
                            attempt = job.attempt,
                            error = %error,
                            "Job abandoned after final attempt"
                        );
                        false
                    }
                };
                FlushResult::failed(job.id.clone(), error, will_retry)
            }
        }
    }

    /// One network attempt.
    ///
    /// `Ok` means the job is finished (2xx, or a final non-2xx answer);
    /// `Err` means the attempt failed and `run_job` decides about retrying.
    async fn perform(
        &self,
        job: &mut Job,
        generation: u64,
    ) -> std::result::Result<HttpResponse, JobError> {
        let attempt = job.record_attempt();
        {
            let mut state = self.inner.state();
            if state.is_current(&job.id, generation) {
                if let Some(queued) = state.jobs.iter_mut().find(|queued| queued.id == job.id) {
                    queued.attempt = queued.attempt.max(attempt);
                }
            }
        }
        // Attempt count survives a reload even mid-flight
        self.persist().await;

        let request = self.build_request(job);
        debug!(
            job_id = %job.id,
            attempt,
            method = %request.method,
            url = %request.url,
            "Sending request"
        );

        let sent = tokio::time::timeout(job.timeout(), self.inner.transport.send(request)).await;
        let retries_left = job.has_retries_left();

        let error = match sent {
            Ok(Ok(response)) if response.is_ok() => return Ok(response),
            Ok(Ok(response)) if retry::is_retryable_status(response.status) && retries_left => {
                JobError::RetryableStatus(response.status)
            }
            Ok(Ok(response)) => {
                warn!(
                    job_id = %job.id,
                    status = response.status,
                    attempt,
                    "Server rejected job, dropping it"
                );
                self.remove(&job.id, generation).await;
                return Ok(response);
            }
            Ok(Err(TransportError::Timeout)) | Err(_) => JobError::Timeout(job.timeout_ms),
            Ok(Err(err)) => JobError::Network(err.to_string()),
        };

        if !retries_left {
            self.remove(&job.id, generation).await;
        }
        Err(error)
    }

    fn build_request(&self, job: &Job) -> HttpRequest {
        let url = match &self.inner.url_transform {
            Some(transform) => transform(&job.url),
            None => job.url.clone(),
        };
        let mut request = HttpRequest {
            method: job.method,
            url,
            headers: BTreeMap::new(),
            body: job.encoded_body(),
            timeout: job.timeout(),
        };
        if job.sends_json() {
            request.set_header("Content-Type", "application/json");
        }
        for (name, value) in &job.headers {
            request.set_header(name.clone(), value.clone());
        }
        if let Some(transform) = &self.inner.request_transform {
            transform(&mut request);
        }
        request
    }

    fn defer(&self, job_id: &str, delay: Duration) {
        self.inner
            .state()
            .not_before
            .insert(job_id.to_string(), Instant::now() + delay);
    }

    /// Drop the job unless its record was replaced since it was claimed
    async fn remove(&self, job_id: &str, generation: u64) {
        let removed = self.inner.state().remove_current(job_id, generation);
        if removed {
            self.persist().await;
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    async fn ensure_hydrated(&self) {
        let hydrated = self.inner.state().hydrated;
        if !hydrated {
            let _write = self.inner.persist_lock.lock().await;
            self.load_snapshot_locked().await;
        }
    }

    /// Merge the stored snapshot under the in-memory jobs. Caller holds `persist_lock`.
    async fn load_snapshot_locked(&self) {
        let hydrated = self.inner.state().hydrated;
        if hydrated {
            return;
        }

        let stored = match self.inner.store.get(&self.inner.config.storage_key).await {
            Some(raw) => match snapshot::decode(&raw) {
                Ok(jobs) => jobs,
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable queue snapshot");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut state = self.inner.state();
        if state.hydrated {
            // reset() ran while the store was being read
            return;
        }
        let pending = std::mem::take(&mut state.jobs);
        let mut merged: Vec<Job> = stored
            .into_iter()
            .filter(|stored| !pending.iter().any(|job| stored.is_superseded_by(job)))
            .collect();
        let restored = merged.len();
        for job in &merged {
            state.stamp(&job.id);
        }
        merged.extend(pending);
        state.jobs = merged;
        state.hydrated = true;
        info!(restored, total = state.jobs.len(), "Queue hydrated");
    }

    /// Write the current queue. Failures are logged and the engine keeps
    /// working in memory.
    async fn persist(&self) {
        {
            let _write = self.inner.persist_lock.lock().await;
            self.load_snapshot_locked().await;

            let encoded = {
                let state = self.inner.state();
                snapshot::encode(&state.jobs)
            };
            match encoded {
                Ok(raw) => {
                    if let Err(e) = self.inner.store.set(&self.inner.config.storage_key, &raw).await {
                        warn!(error = %e, "Failed to persist queue, continuing in memory");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode queue snapshot"),
            }
        }
        self.publish_status();
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    fn publish_status(&self) {
        self.inner.status_tx.send_replace(self.status());
    }

    /// Run a flush after `delay` unless the engine is disposed first
    fn schedule_flush(&self, delay: Duration, trigger: Trigger) {
        let mut shutdown = self.inner.shutdown.token();
        if shutdown.is_shutdown() {
            return;
        }
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait() => return,
            }
            if let Some(inner) = inner.upgrade() {
                let engine = QueueEngine { inner };
                let results = engine.flush_batch(trigger).await;
                if !results.is_empty() {
                    debug!(count = results.len(), "Scheduled flush finished");
                }
            }
        });
    }

    fn spawn_connectivity_listener(&self) {
        let inner = Arc::downgrade(&self.inner);
        let mut online_rx = self.inner.gate.subscribe();
        let mut shutdown = self.inner.shutdown.token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = shutdown.wait() => break,
                }
                let online = *online_rx.borrow_and_update();
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let engine = QueueEngine { inner };
                engine.publish_status();
                if online {
                    info!("Back online, scheduling flush");
                    engine.schedule_flush(Duration::ZERO, Trigger::Immediate);
                } else {
                    info!("Offline, queue paused");
                }
            }
            debug!("Connectivity listener stopped");
        });
    }
}
