use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use sheetnest::config::{NestingConfig, NestingConfigOverrides};
use sheetnest::entities::{NestingProgress, NestingResult, Part, Sheet, expand_units, validate_parts};
use sheetnest::optimizer::Optimizer;
use sheetnest::shelf::ShelfPacker;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{oneshot, watch};

use crate::normalize::{BackendOutput, normalize};
use crate::protocol::{ErrorCode, NestRequestPayload, WorkerReply, WorkerRequest};
use crate::worker::{WorkerLink, spawn_worker};

/// Lifecycle of a nesting job.
/// A job goes `Idle -> Running -> {Completed | Cancelled | Failed}` and the coordinator returns to `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Idle => "idle",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Cancelled => "cancelled",
            JobState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The backend a coordinator dispatches jobs to
enum Backend {
    Heuristic,
    Advanced(WorkerLink),
}

struct JobSlot {
    state: JobState,
    last_outcome: Option<JobState>,
    last_error: Option<String>,
    cancel: Option<oneshot::Sender<()>>,
}

/// How a single job ended, before it is reported to the caller
enum JobOutcome {
    Completed(NestingResult),
    Cancelled,
    Failed(String),
    /// The worker's channels closed, later jobs use the heuristic
    WorkerLost(String),
}

/// Runs nesting jobs, one at a time, on either the shelf heuristic or a background optimizer worker.
///
/// A coordinator is cheap to share (`Arc<Coordinator>`): [`Coordinator::cancel`], [`Coordinator::state`]
/// and the progress subscription can be used from other tasks while [`Coordinator::nest`] is pending.
pub struct Coordinator {
    backend: tokio::sync::Mutex<Backend>,
    job: Mutex<JobSlot>,
    progress_tx: watch::Sender<Option<NestingProgress>>,
    advanced_available: AtomicBool,
}

impl Coordinator {
    fn with_backend(backend: Backend) -> Self {
        let advanced_available = matches!(backend, Backend::Advanced(_));
        let (progress_tx, _) = watch::channel(None);
        Coordinator {
            backend: tokio::sync::Mutex::new(backend),
            job: Mutex::new(JobSlot {
                state: JobState::Idle,
                last_outcome: None,
                last_error: None,
                cancel: None,
            }),
            progress_tx,
            advanced_available: AtomicBool::new(advanced_available),
        }
    }

    /// A coordinator which only uses the shelf heuristic
    pub fn heuristic() -> Self {
        Self::with_backend(Backend::Heuristic)
    }

    /// Starts a background worker which builds its optimizer with `factory`.
    /// Falls back to the heuristic if the worker cannot be started or the optimizer fails to load.
    pub async fn with_optimizer<F>(factory: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn Optimizer>> + Send + 'static,
    {
        match spawn_worker(factory) {
            Ok(link) => Self::with_worker(link).await,
            Err(e) => {
                warn!("[COORD] {e:#}, falling back to the shelf heuristic");
                Self::heuristic()
            }
        }
    }

    /// Uses an already running worker, after waiting for its `READY` reply
    pub async fn with_worker(mut link: WorkerLink) -> Self {
        match link.replies.recv().await {
            Some(WorkerReply::Ready(ready)) if ready.advanced_available => {
                info!("[COORD] optimizer worker ready");
                Self::with_backend(Backend::Advanced(link))
            }
            Some(WorkerReply::Ready(_)) => {
                warn!("[COORD] optimizer unavailable, falling back to the shelf heuristic");
                Self::heuristic()
            }
            Some(WorkerReply::Error(e)) => {
                warn!(
                    "[COORD] optimizer failed to load ({:?}: {}), falling back to the shelf heuristic",
                    e.code, e.message
                );
                Self::heuristic()
            }
            Some(other) => {
                warn!("[COORD] expected READY from the worker, got {other:?}, falling back to the shelf heuristic");
                Self::heuristic()
            }
            None => {
                warn!("[COORD] worker exited before announcing itself, falling back to the shelf heuristic");
                Self::heuristic()
            }
        }
    }

    /// Packs `parts` on as many `sheet`s as needed.
    ///
    /// Resolves to `Ok(Some(_))` when the job completes and to `Ok(None)` when it is cancelled or the
    /// optimizer fails (see [`Coordinator::last_outcome`] and [`Coordinator::last_error`]).
    /// Invalid input and a job submitted while another one is running are errors.
    pub async fn nest(
        &self,
        parts: &[Part],
        sheet: &Sheet,
        overrides: &NestingConfigOverrides,
    ) -> Result<Option<NestingResult>> {
        let mut backend = self
            .backend
            .try_lock()
            .map_err(|_| anyhow!("a nesting job is already running"))?;

        sheet.validate()?;
        validate_parts(parts)?;
        let config = NestingConfig::resolve(overrides)?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let worker = match &*backend {
            Backend::Advanced(link) => Some(link.requests.clone()),
            Backend::Heuristic => None,
        };
        let mut guard = self.begin_job(cancel_tx, worker);

        let start = Instant::now();
        info!(
            "[COORD] job started: {} part types, {} units on {}x{} sheets ({})",
            parts.len(),
            expand_units(parts).len(),
            sheet.width,
            sheet.height,
            match &*backend {
                Backend::Heuristic => "heuristic",
                Backend::Advanced(_) => "optimizer",
            }
        );

        let outcome = match &mut *backend {
            Backend::Heuristic => match Self::run_heuristic(parts, sheet, &config, cancel_rx).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    guard.finish(JobState::Failed, Some(format!("{e:#}")));
                    return Err(e);
                }
            },
            Backend::Advanced(link) => self.run_advanced(link, parts, sheet, config, cancel_rx).await,
        };

        let elapsed = start.elapsed().as_millis();
        let result = match outcome {
            JobOutcome::Completed(result) => {
                info!(
                    "[COORD] job completed in {elapsed}ms: {} placements on {} sheets",
                    result.placements.len(),
                    result.sheets_used
                );
                guard.finish(JobState::Completed, None);
                Some(result)
            }
            JobOutcome::Cancelled => {
                info!("[COORD] job cancelled after {elapsed}ms");
                guard.finish(JobState::Cancelled, None);
                None
            }
            JobOutcome::Failed(message) => {
                error!("[COORD] job failed after {elapsed}ms: {message}");
                guard.finish(JobState::Failed, Some(message));
                None
            }
            JobOutcome::WorkerLost(message) => {
                error!("[COORD] job failed after {elapsed}ms: {message}, using the shelf heuristic from now on");
                *backend = Backend::Heuristic;
                self.advanced_available.store(false, Ordering::Relaxed);
                guard.finish(JobState::Failed, Some(message));
                None
            }
        };
        Ok(result)
    }

    async fn run_heuristic(
        parts: &[Part],
        sheet: &Sheet,
        config: &NestingConfig,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> Result<JobOutcome> {
        //lets a cancel issued right after submission land before the packer starts
        tokio::task::yield_now().await;
        if cancel_rx.try_recv().is_ok() {
            return Ok(JobOutcome::Cancelled);
        }
        let packer = ShelfPacker::new(config.spacing)?.with_rotation(config.allows_quarter_turn());
        let result = packer.pack(parts, sheet)?;
        if cancel_rx.try_recv().is_ok() {
            return Ok(JobOutcome::Cancelled);
        }
        Ok(match normalize(BackendOutput::Heuristic(result), parts, sheet) {
            Ok(result) => JobOutcome::Completed(result),
            Err(e) => JobOutcome::Failed(format!("{e:#}")),
        })
    }

    async fn run_advanced(
        &self,
        link: &mut WorkerLink,
        parts: &[Part],
        sheet: &Sheet,
        config: NestingConfig,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> JobOutcome {
        let payload = NestRequestPayload {
            sheet: *sheet,
            parts: parts.to_vec(),
            config,
        };
        if link.requests.send(WorkerRequest::Nest(payload)).is_err() {
            return JobOutcome::WorkerLost("worker request channel closed".to_string());
        }
        link.in_flight += 1;

        let mut last_iteration: Option<u32> = None;
        let mut cancel_open = true;
        loop {
            tokio::select! {
                biased;
                signal = &mut cancel_rx, if cancel_open => match signal {
                    Ok(()) => {
                        let _ = link.requests.send(WorkerRequest::Cancel);
                        return JobOutcome::Cancelled;
                    }
                    Err(_) => cancel_open = false,
                },
                reply = link.replies.recv() => {
                    let Some(reply) = reply else {
                        return JobOutcome::WorkerLost("worker reply channel closed".to_string());
                    };
                    match reply {
                        WorkerReply::Ready(_) => debug!("[COORD] ignoring repeated READY"),
                        WorkerReply::Progress(progress) => {
                            //progress of an abandoned job still running in the worker
                            if link.in_flight > 1 {
                                continue;
                            }
                            let progress = NestingProgress::from(progress);
                            if last_iteration.is_some_and(|last| progress.iteration < last) {
                                debug!("[COORD] dropping out of order progress (iteration {})", progress.iteration);
                                continue;
                            }
                            last_iteration = Some(progress.iteration);
                            self.progress_tx.send_replace(Some(progress));
                        }
                        WorkerReply::Result(payload) => {
                            link.in_flight = link.in_flight.saturating_sub(1);
                            if link.in_flight > 0 {
                                debug!("[COORD] discarding late RESULT of an abandoned job");
                                continue;
                            }
                            return match normalize(BackendOutput::Advanced(payload), parts, sheet) {
                                Ok(result) => JobOutcome::Completed(result),
                                Err(e) => JobOutcome::Failed(format!("{e:#}")),
                            };
                        }
                        WorkerReply::Error(e) => {
                            link.in_flight = link.in_flight.saturating_sub(1);
                            if link.in_flight > 0 {
                                debug!("[COORD] discarding late ERROR of an abandoned job: {}", e.message);
                                continue;
                            }
                            return match e.code {
                                ErrorCode::Cancelled => JobOutcome::Cancelled,
                                _ => JobOutcome::Failed(e.message),
                            };
                        }
                    }
                }
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, JobSlot> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_job(&self, cancel: oneshot::Sender<()>, worker: Option<UnboundedSender<WorkerRequest>>) -> JobGuard<'_> {
        {
            let mut slot = self.slot();
            slot.state = JobState::Running;
            slot.last_error = None;
            slot.cancel = Some(cancel);
        }
        self.progress_tx.send_replace(None);
        JobGuard {
            coordinator: self,
            worker,
            finished: false,
        }
    }

    /// Requests cancellation of the running job.
    /// Returns `false` if no job is running or it was already cancelled.
    pub fn cancel(&self) -> bool {
        match self.slot().cancel.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Receiver of the latest progress of the running job, `None` until the first report.
    /// Only the optimizer path reports progress.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<NestingProgress>> {
        self.progress_tx.subscribe()
    }

    pub fn state(&self) -> JobState {
        self.slot().state
    }

    /// Terminal state of the most recent job
    pub fn last_outcome(&self) -> Option<JobState> {
        self.slot().last_outcome
    }

    /// Error text of the most recent job, if it failed
    pub fn last_error(&self) -> Option<String> {
        self.slot().last_error.clone()
    }

    /// Whether jobs run on the background optimizer rather than the heuristic
    pub fn advanced_available(&self) -> bool {
        self.advanced_available.load(Ordering::Relaxed)
    }
}

/// Returns the coordinator to `Idle` when a job ends, including when its future is dropped mid-way
struct JobGuard<'a> {
    coordinator: &'a Coordinator,
    worker: Option<UnboundedSender<WorkerRequest>>,
    finished: bool,
}

impl JobGuard<'_> {
    fn finish(&mut self, outcome: JobState, error: Option<String>) {
        let mut slot = self.coordinator.slot();
        slot.state = JobState::Idle;
        slot.last_outcome = Some(outcome);
        slot.last_error = error;
        slot.cancel = None;
        self.finished = true;
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!("[COORD] job future dropped before completion, treating it as cancelled");
        if let Some(worker) = &self.worker {
            let _ = worker.send(WorkerRequest::Cancel);
        }
        self.finish(JobState::Cancelled, None);
    }
}
