use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use sheetnest::entities::{NestingProgress, Rotation};
use sheetnest::optimizer::{OptimizeOutcome, Optimizer, OptimizerObserver, OptimizerOutput};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::protocol::{
    ErrorCode, ErrorPayload, NestRequestPayload, NestResultPayload, ProgressPayload, ReadyPayload,
    ResultPlacement, WorkerReply, WorkerRequest,
};

pub const WORKER_THREAD_NAME: &str = "nest-worker";

/// Coordinator side of the channel pair to a background worker.
///
/// The worker does not have to be the in-process thread started by [`spawn_worker`],
/// anything answering the protocol over these channels will do.
pub struct WorkerLink {
    pub requests: UnboundedSender<WorkerRequest>,
    pub replies: UnboundedReceiver<WorkerReply>,
    /// Jobs submitted whose terminal reply has not been received yet
    pub(crate) in_flight: usize,
}

impl WorkerLink {
    pub fn new(requests: UnboundedSender<WorkerRequest>, replies: UnboundedReceiver<WorkerReply>) -> Self {
        WorkerLink {
            requests,
            replies,
            in_flight: 0,
        }
    }
}

/// Starts the background worker thread.
///
/// The thread first builds the optimizer with `factory` and announces the outcome with a `READY` reply.
/// If the factory fails (or panics) the reply carries `advancedAvailable: false` and the thread exits.
pub fn spawn_worker<F>(factory: F) -> Result<WorkerLink>
where
    F: FnOnce() -> Result<Box<dyn Optimizer>> + Send + 'static,
{
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();

    //the thread is detached, it exits once the link (and with it the request channel) is dropped
    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || worker_main(factory, request_rx, reply_tx))
        .context("could not spawn nesting worker thread")?;

    Ok(WorkerLink::new(request_tx, reply_rx))
}

/// A NEST received while another job was running
struct QueuedJob {
    payload: NestRequestPayload,
    cancelled: bool,
}

fn worker_main<F>(factory: F, mut inbox: UnboundedReceiver<WorkerRequest>, outbox: UnboundedSender<WorkerReply>)
where
    F: FnOnce() -> Result<Box<dyn Optimizer>>,
{
    let optimizer = match catch_unwind(AssertUnwindSafe(factory)) {
        Ok(Ok(optimizer)) => optimizer,
        Ok(Err(e)) => {
            warn!("[WORKER] optimizer failed to load: {e:#}");
            let _ = outbox.send(WorkerReply::Ready(ReadyPayload {
                advanced_available: false,
            }));
            return;
        }
        Err(panic) => {
            warn!("[WORKER] optimizer panicked while loading: {}", panic_message(&*panic));
            let _ = outbox.send(WorkerReply::Ready(ReadyPayload {
                advanced_available: false,
            }));
            return;
        }
    };
    info!("[WORKER] optimizer '{}' ready", optimizer.name());
    if outbox
        .send(WorkerReply::Ready(ReadyPayload {
            advanced_available: true,
        }))
        .is_err()
    {
        return;
    }

    let mut queue: VecDeque<QueuedJob> = VecDeque::new();
    loop {
        let job = match queue.pop_front() {
            Some(job) => job,
            None => match inbox.blocking_recv() {
                Some(WorkerRequest::Nest(payload)) => QueuedJob {
                    payload,
                    cancelled: false,
                },
                Some(WorkerRequest::Cancel) => {
                    debug!("[WORKER] no job running, ignoring CANCEL");
                    continue;
                }
                None => break,
            },
        };

        let reply = match job.cancelled {
            true => WorkerReply::Error(ErrorPayload::new(
                ErrorCode::Cancelled,
                "job cancelled before it started",
            )),
            false => run_job(optimizer.as_ref(), &job.payload, &mut inbox, &outbox, &mut queue),
        };
        if outbox.send(reply).is_err() {
            break;
        }
    }
    info!("[WORKER] request channel closed, stopping");
}

fn run_job(
    optimizer: &dyn Optimizer,
    payload: &NestRequestPayload,
    inbox: &mut UnboundedReceiver<WorkerRequest>,
    outbox: &UnboundedSender<WorkerReply>,
    queue: &mut VecDeque<QueuedJob>,
) -> WorkerReply {
    let request = payload.to_optimizer_request();
    let mut observer = WorkerObserver {
        inbox,
        outbox,
        queue,
        cancelled: false,
        last_iteration: None,
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| optimizer.optimize(&request, &mut observer)));
    let cancelled = observer.cancelled;

    match outcome {
        Ok(Ok(OptimizeOutcome::Finished(_))) | Ok(Ok(OptimizeOutcome::Cancelled { .. })) if cancelled => {
            WorkerReply::Error(ErrorPayload::new(ErrorCode::Cancelled, "job cancelled"))
        }
        Ok(Ok(OptimizeOutcome::Finished(output))) => {
            WorkerReply::Result(result_payload(output, payload, optimizer.name()))
        }
        Ok(Ok(OptimizeOutcome::Cancelled { iterations_run })) => {
            WorkerReply::Error(ErrorPayload::new(
                ErrorCode::Cancelled,
                format!("optimizer stopped after {iterations_run} iterations"),
            ))
        }
        Ok(Err(e)) => {
            error!("[WORKER] optimizer failed: {e:#}");
            WorkerReply::Error(ErrorPayload::new(ErrorCode::NestingFailed, format!("{e:#}")))
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            error!("[WORKER] optimizer panicked: {message}");
            WorkerReply::Error(ErrorPayload::new(
                ErrorCode::NestingFailed,
                format!("optimizer panicked: {message}"),
            ))
        }
    }
}

/// Adds the effective footprint of every placement, derived from the requested part dimensions
fn result_payload(output: OptimizerOutput, payload: &NestRequestPayload, algorithm: &str) -> NestResultPayload {
    let parts: HashMap<&str, _> = payload.parts.iter().map(|p| (p.id.as_str(), p)).collect();
    let placements = output
        .placements
        .into_iter()
        .map(|p| {
            let (width, height) = match parts.get(p.part_id.as_str()) {
                Some(part) => match Rotation::from_degrees(p.rotation).is_some_and(|r| r.swaps_axes()) {
                    true => (part.height, part.width),
                    false => (part.width, part.height),
                },
                //unknown ids are rejected by the coordinator
                None => (0.0, 0.0),
            };
            ResultPlacement {
                part_id: p.part_id,
                sheet_index: p.sheet_index,
                x: p.x,
                y: p.y,
                width,
                height,
                rotation: p.rotation,
            }
        })
        .collect();
    NestResultPayload {
        placements,
        sheets_used: output.sheets_used,
        utilization: output.utilization,
        iterations_run: output.iterations_run,
        algorithm: algorithm.to_string(),
    }
}

/// Relays progress to the coordinator and services the inbox while a job runs
struct WorkerObserver<'a> {
    inbox: &'a mut UnboundedReceiver<WorkerRequest>,
    outbox: &'a UnboundedSender<WorkerReply>,
    queue: &'a mut VecDeque<QueuedJob>,
    cancelled: bool,
    last_iteration: Option<u32>,
}

impl WorkerObserver<'_> {
    fn drain_inbox(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(WorkerRequest::Nest(payload)) => {
                    debug!("[WORKER] NEST received while busy, queueing it");
                    self.queue.push_back(QueuedJob {
                        payload,
                        cancelled: false,
                    });
                }
                //a CANCEL targets the most recently submitted job
                Ok(WorkerRequest::Cancel) => match self.queue.back_mut() {
                    Some(queued) => queued.cancelled = true,
                    None => self.cancelled = true,
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.cancelled = true;
                    break;
                }
            }
        }
    }
}

impl OptimizerObserver for WorkerObserver<'_> {
    fn on_progress(&mut self, progress: NestingProgress) {
        if self.last_iteration.is_some_and(|last| progress.iteration < last) {
            return;
        }
        self.last_iteration = Some(progress.iteration);
        let _ = self
            .outbox
            .send(WorkerReply::Progress(ProgressPayload::from(progress)));
    }

    fn cancel_requested(&mut self) -> bool {
        self.drain_inbox();
        self.cancelled
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
