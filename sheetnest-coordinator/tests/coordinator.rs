use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use sheetnest::config::NestingConfigOverrides;
use sheetnest::entities::{NestingProgress, NestingResult, Part, Sheet};
use sheetnest::geometry::{find_collisions, find_out_of_bounds};
use sheetnest::optimizer::{
    OptimizeOutcome, Optimizer, OptimizerObserver, OptimizerOutput, OptimizerPlacement, OptimizerRequest,
};
use sheetnest::shelf_pack;
use sheetnest_coordinator::protocol::{
    NestResultPayload, ProgressPayload, ReadyPayload, ResultPlacement, WorkerReply, WorkerRequest,
};
use sheetnest_coordinator::worker::WorkerLink;
use sheetnest_coordinator::{Coordinator, JobState, NestingSession};
use sheetnest_ga::GAOptimizer;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn parts() -> Vec<Part> {
    vec![
        Part::new("door", 600.0, 400.0, 3),
        Part::new("shelf", 560.0, 300.0, 4),
        Part::new("strip", 1200.0, 60.0, 5),
        Part::new("block", 150.0, 150.0, 8),
    ]
}

fn sheet() -> Sheet {
    Sheet::new(2000.0, 1000.0)
}

fn boxed<O>(optimizer: O) -> impl FnOnce() -> Result<Box<dyn Optimizer>> + Send + 'static
where
    O: Optimizer + 'static,
{
    move || Ok(Box::new(optimizer) as Box<dyn Optimizer>)
}

/// Runs a genetic search, sleeping on every cancellation poll
struct PacedOptimizer {
    delay: Duration,
}

struct PacedObserver<'a> {
    inner: &'a mut dyn OptimizerObserver,
    delay: Duration,
}

impl OptimizerObserver for PacedObserver<'_> {
    fn on_progress(&mut self, progress: NestingProgress) {
        self.inner.on_progress(progress);
    }

    fn cancel_requested(&mut self) -> bool {
        std::thread::sleep(self.delay);
        self.inner.cancel_requested()
    }
}

impl Optimizer for PacedOptimizer {
    fn name(&self) -> &str {
        "paced"
    }

    fn optimize(&self, request: &OptimizerRequest, observer: &mut dyn OptimizerObserver) -> Result<OptimizeOutcome> {
        let mut paced = PacedObserver {
            inner: observer,
            delay: self.delay,
        };
        GAOptimizer::default().optimize(request, &mut paced)
    }
}

struct FailingOptimizer;

impl Optimizer for FailingOptimizer {
    fn name(&self) -> &str {
        "failing"
    }

    fn optimize(&self, _request: &OptimizerRequest, _observer: &mut dyn OptimizerObserver) -> Result<OptimizeOutcome> {
        bail!("solver diverged")
    }
}

struct PanickingOptimizer;

impl Optimizer for PanickingOptimizer {
    fn name(&self) -> &str {
        "panicking"
    }

    fn optimize(&self, _request: &OptimizerRequest, _observer: &mut dyn OptimizerObserver) -> Result<OptimizeOutcome> {
        panic!("boom")
    }
}

/// Places a part nobody asked for
struct GhostOptimizer;

impl Optimizer for GhostOptimizer {
    fn name(&self) -> &str {
        "ghost"
    }

    fn optimize(&self, _request: &OptimizerRequest, _observer: &mut dyn OptimizerObserver) -> Result<OptimizeOutcome> {
        Ok(OptimizeOutcome::Finished(OptimizerOutput {
            placements: vec![OptimizerPlacement {
                part_id: "ghost".into(),
                sheet_index: 0,
                x: 0.0,
                y: 0.0,
                rotation: 0.0,
            }],
            sheets_used: 1,
            utilization: vec![0.1],
            iterations_run: 1,
        }))
    }
}

/// A worker link whose other end is driven by the test
fn scripted_link() -> (WorkerLink, UnboundedReceiver<WorkerRequest>, UnboundedSender<WorkerReply>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    reply_tx
        .send(WorkerReply::Ready(ReadyPayload {
            advanced_available: true,
        }))
        .unwrap();
    (WorkerLink::new(request_tx, reply_rx), request_rx, reply_tx)
}

fn progress(iteration: u32) -> WorkerReply {
    WorkerReply::Progress(ProgressPayload {
        iteration,
        total_iterations: 100,
        current_utilization: 0.5,
    })
}

fn single_placement_result(x: f64, y: f64) -> WorkerReply {
    WorkerReply::Result(NestResultPayload {
        placements: vec![ResultPlacement {
            part_id: "p".into(),
            sheet_index: 0,
            x,
            y,
            width: 10.0,
            height: 10.0,
            rotation: 0.0,
        }],
        sheets_used: 1,
        utilization: vec![0.01],
        iterations_run: 100,
        algorithm: "scripted".into(),
    })
}

fn spawn_nest(
    coordinator: &Arc<Coordinator>,
    parts: Vec<Part>,
    sheet: Sheet,
) -> tokio::task::JoinHandle<Result<Option<NestingResult>>> {
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        coordinator
            .nest(&parts, &sheet, &NestingConfigOverrides::default())
            .await
    })
}

#[tokio::test]
async fn heuristic_coordinator_matches_shelf_pack() {
    init_logger();
    let coordinator = Coordinator::heuristic();
    let result = coordinator
        .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, shelf_pack(&parts(), &sheet(), 2.0).unwrap());
    assert!(!coordinator.advanced_available());
    assert_eq!(coordinator.state(), JobState::Idle);
    assert_eq!(coordinator.last_outcome(), Some(JobState::Completed));
    assert!(coordinator.subscribe_progress().borrow().is_none());
}

#[tokio::test]
async fn heuristic_honors_rotation_steps_without_quarter_turns() {
    let parts = vec![Part::new("tall", 150.0, 50.0, 1)];
    let sheet = Sheet::new(100.0, 200.0);
    let coordinator = Coordinator::heuristic();

    let rotating = coordinator
        .nest(&parts, &sheet, &NestingConfigOverrides::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rotating.placements.len(), 1);

    let fixed = coordinator
        .nest(&parts, &sheet, &NestingConfigOverrides::default().with_rotation_steps(2))
        .await
        .unwrap()
        .unwrap();
    assert!(fixed.placements.is_empty());
    assert_eq!(fixed.sheets_used, 0);
}

#[tokio::test]
async fn failed_optimizer_load_falls_back_to_the_heuristic() {
    init_logger();
    let coordinator = Coordinator::with_optimizer(|| bail!("optimizer module missing")).await;
    assert!(!coordinator.advanced_available());

    let result = coordinator
        .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result, shelf_pack(&parts(), &sheet(), 2.0).unwrap());
}

#[tokio::test]
async fn panicking_optimizer_load_falls_back_to_the_heuristic() {
    let coordinator =
        Coordinator::with_optimizer(|| -> Result<Box<dyn Optimizer>> { panic!("corrupt module") }).await;
    assert!(!coordinator.advanced_available());
    assert!(
        coordinator
            .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn optimizer_session_records_monotonic_progress() {
    init_logger();
    let coordinator = Coordinator::with_optimizer(boxed(GAOptimizer::default())).await;
    assert!(coordinator.advanced_available());

    let overrides = NestingConfigOverrides::default()
        .with_iterations(20)
        .with_population_size(10);
    let mut session = NestingSession::new(parts(), sheet(), overrides);
    let result = session.run(&coordinator).await.unwrap().cloned().unwrap();

    assert_eq!(session.outcome(), Some(JobState::Completed));
    assert_eq!(session.advanced_available(), Some(true));
    assert!(session.error().is_none());
    assert!(session.unplaced().is_empty());

    let iterations: Vec<u32> = session.progress_log().iter().map(|p| p.iteration).collect();
    assert!(!iterations.is_empty());
    assert!(iterations.windows(2).all(|w| w[0] <= w[1]));
    assert!(iterations.iter().all(|&i| i <= 20));

    assert_eq!(result.placements.len(), 20);
    assert!(find_out_of_bounds(&result.placements, &sheet()).is_empty());
    assert!(find_collisions(&result.placements).is_empty());
    assert_eq!(result.utilization.len(), result.sheets_used as usize);
}

#[tokio::test]
async fn cancelled_job_resolves_to_none_and_the_coordinator_is_reusable() {
    init_logger();
    let coordinator = Arc::new(
        Coordinator::with_optimizer(boxed(PacedOptimizer {
            delay: Duration::from_millis(5),
        }))
        .await,
    );
    let mut progress_rx = coordinator.subscribe_progress();

    let overrides = NestingConfigOverrides::default().with_iterations(10_000);
    let job = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.nest(&parts(), &sheet(), &overrides).await })
    };

    progress_rx.wait_for(|p| p.is_some()).await.unwrap();
    assert_eq!(coordinator.state(), JobState::Running);
    assert!(coordinator.cancel());
    assert!(!coordinator.cancel());

    assert_eq!(job.await.unwrap().unwrap(), None);
    assert_eq!(coordinator.last_outcome(), Some(JobState::Cancelled));
    assert!(coordinator.last_error().is_none());
    assert_eq!(coordinator.state(), JobState::Idle);

    //the cancelled job's terminal reply is still on its way and must not leak into this one
    let overrides = NestingConfigOverrides::default().with_iterations(3).with_population_size(4);
    let result = coordinator.nest(&parts(), &sheet(), &overrides).await.unwrap();
    assert!(result.is_some());
    assert_eq!(coordinator.last_outcome(), Some(JobState::Completed));
}

#[tokio::test]
async fn late_terminal_of_a_cancelled_job_is_discarded() {
    let (link, mut requests, replies) = scripted_link();
    let coordinator = Arc::new(Coordinator::with_worker(link).await);
    let parts = vec![Part::new("p", 10.0, 10.0, 1)];
    let sheet = Sheet::new(100.0, 100.0);

    let first = spawn_nest(&coordinator, parts.clone(), sheet);
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Nest(_))));
    assert!(coordinator.cancel());
    assert_eq!(first.await.unwrap().unwrap(), None);
    assert_eq!(requests.recv().await, Some(WorkerRequest::Cancel));

    //the worker finished the first job before it saw the CANCEL
    replies.send(progress(50)).unwrap();
    replies.send(single_placement_result(0.0, 0.0)).unwrap();

    let second = spawn_nest(&coordinator, parts, sheet);
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Nest(_))));
    replies.send(progress(1)).unwrap();
    replies.send(single_placement_result(40.0, 40.0)).unwrap();

    let result = second.await.unwrap().unwrap().unwrap();
    assert_eq!((result.placements[0].x, result.placements[0].y), (40.0, 40.0));
    assert_eq!(
        coordinator.subscribe_progress().borrow().map(|p| p.iteration),
        Some(1)
    );
}

#[tokio::test]
async fn progress_regressions_are_dropped() {
    let (link, mut requests, replies) = scripted_link();
    let coordinator = Arc::new(Coordinator::with_worker(link).await);
    let parts = vec![Part::new("p", 10.0, 10.0, 1)];

    let job = spawn_nest(&coordinator, parts, Sheet::new(100.0, 100.0));
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Nest(_))));
    for iteration in [1, 3, 2] {
        replies.send(progress(iteration)).unwrap();
    }
    replies.send(single_placement_result(0.0, 0.0)).unwrap();

    assert!(job.await.unwrap().unwrap().is_some());
    assert_eq!(
        coordinator.subscribe_progress().borrow().map(|p| p.iteration),
        Some(3)
    );
}

#[tokio::test]
async fn second_job_is_rejected_while_one_is_running() {
    let (link, mut requests, _replies) = scripted_link();
    let coordinator = Arc::new(Coordinator::with_worker(link).await);
    let parts = vec![Part::new("p", 10.0, 10.0, 1)];
    let sheet = Sheet::new(100.0, 100.0);

    let first = spawn_nest(&coordinator, parts.clone(), sheet);
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Nest(_))));

    let err = coordinator
        .nest(&parts, &sheet, &NestingConfigOverrides::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already running"));
    assert_eq!(coordinator.state(), JobState::Running);

    assert!(coordinator.cancel());
    assert_eq!(first.await.unwrap().unwrap(), None);
}

#[tokio::test]
async fn optimizer_error_resolves_to_none_with_error_text() {
    let coordinator = Coordinator::with_optimizer(boxed(FailingOptimizer)).await;
    assert!(coordinator.advanced_available());

    let result = coordinator
        .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
        .await
        .unwrap();
    assert_eq!(result, None);
    assert_eq!(coordinator.last_outcome(), Some(JobState::Failed));
    assert!(coordinator.last_error().unwrap().contains("solver diverged"));
    assert!(coordinator.advanced_available());
}

#[tokio::test]
async fn optimizer_panic_is_reported_and_the_worker_survives() {
    let coordinator = Coordinator::with_optimizer(boxed(PanickingOptimizer)).await;
    for _ in 0..2 {
        let result = coordinator
            .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
            .await
            .unwrap();
        assert_eq!(result, None);
        assert!(coordinator.last_error().unwrap().contains("boom"));
    }
    assert!(coordinator.advanced_available());
}

#[tokio::test]
async fn unexpected_payload_is_a_failure() {
    let coordinator = Coordinator::with_optimizer(boxed(GhostOptimizer)).await;
    let mut session = NestingSession::new(parts(), sheet(), NestingConfigOverrides::default());
    assert!(session.run(&coordinator).await.unwrap().is_none());
    assert_eq!(session.outcome(), Some(JobState::Failed));
    assert!(session.error().unwrap().contains("unexpected payload"));
}

#[tokio::test]
async fn lost_worker_degrades_to_the_heuristic() {
    init_logger();
    let (link, mut requests, replies) = scripted_link();
    let coordinator = Arc::new(Coordinator::with_worker(link).await);
    assert!(coordinator.advanced_available());

    let job = spawn_nest(&coordinator, parts(), sheet());
    assert!(matches!(requests.recv().await, Some(WorkerRequest::Nest(_))));
    drop(replies);

    assert_eq!(job.await.unwrap().unwrap(), None);
    assert_eq!(coordinator.last_outcome(), Some(JobState::Failed));
    assert!(coordinator.last_error().is_some());
    assert!(!coordinator.advanced_available());

    let result = coordinator
        .nest(&parts(), &sheet(), &NestingConfigOverrides::default())
        .await
        .unwrap();
    assert_eq!(result, Some(shelf_pack(&parts(), &sheet(), 2.0).unwrap()));
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_job_starts() {
    let coordinator = Coordinator::heuristic();

    let negative_spacing = NestingConfigOverrides::default().with_spacing(-1.0);
    assert!(coordinator.nest(&parts(), &sheet(), &negative_spacing).await.is_err());

    let bad_sheet = Sheet::new(0.0, 1000.0);
    assert!(
        coordinator
            .nest(&parts(), &bad_sheet, &NestingConfigOverrides::default())
            .await
            .is_err()
    );

    let bad_part = vec![Part::new("", 10.0, 10.0, 1)];
    assert!(
        coordinator
            .nest(&bad_part, &sheet(), &NestingConfigOverrides::default())
            .await
            .is_err()
    );

    let duplicate_ids = vec![Part::new("a", 100.0, 50.0, 1), Part::new("a", 100.0, 50.0, 1)];
    assert!(
        coordinator
            .nest(&duplicate_ids, &sheet(), &NestingConfigOverrides::default())
            .await
            .is_err()
    );

    assert_eq!(coordinator.state(), JobState::Idle);
    assert_eq!(coordinator.last_outcome(), None);
}

#[tokio::test]
async fn cancel_without_a_job_is_a_noop() {
    let coordinator = Coordinator::heuristic();
    assert!(!coordinator.cancel());
    assert_eq!(coordinator.state(), JobState::Idle);
}
