use super::*;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

struct TestTrainer {
    calls: Arc<Mutex<u32>>,
    progress: Vec<u8>,
    gate: Option<Arc<Notify>>,
    fail_first: u32,
    arity_override: Option<usize>,
    panic: bool,
}

impl TestTrainer {
    fn ok() -> Self {
        Self {
            calls: Arc::new(Mutex::new(0)),
            progress: vec![25, 50, 75, 100],
            gate: None,
            fail_first: 0,
            arity_override: None,
            panic: false,
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        let mut trainer = Self::ok();
        trainer.gate = Some(gate);
        trainer
    }

    fn failing_first(times: u32) -> Self {
        let mut trainer = Self::ok();
        trainer.fail_first = times;
        trainer
    }

    fn with_progress(mut self, progress: Vec<u8>) -> Self {
        self.progress = progress;
        self
    }
}

#[async_trait]
impl Trainer for TestTrainer {
    async fn train(
        &self,
        category: Category,
        progress: ProgressReporter,
    ) -> Result<ModelHandle, TrainingError> {
        let call = {
            let mut calls = self.calls.lock().await;
            *calls += 1;
            *calls
        };
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.panic {
            panic!("trainer exploded");
        }
        if call <= self.fail_first {
            return Err(TrainingError::fit(category, "loss diverged"));
        }
        for percent in &self.progress {
            progress.report(*percent);
        }
        let arity = self.arity_override.unwrap_or(registry::arity(category));
        Ok(ModelHandle::new(category, arity, ()))
    }
}

fn drain(rx: &mut broadcast::Receiver<TrainingEvent>) -> Vec<TrainingEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn ensure_trained_caches_model_and_marks_ready() {
    let coordinator = TrainingCoordinator::new(Arc::new(TestTrainer::ok()));
    assert_eq!(coordinator.status(Category::Heart), TrainingStatus::Untrained);

    coordinator
        .ensure_trained(Category::Heart)
        .await
        .expect("train");

    assert_eq!(coordinator.status(Category::Heart), TrainingStatus::Ready);
    let model = coordinator.model(Category::Heart).await.expect("cached model");
    assert_eq!(model.category(), Category::Heart);
    assert_eq!(model.input_arity(), 8);
    assert_eq!(coordinator.status(Category::Liver), TrainingStatus::Untrained);
}

#[tokio::test]
async fn progress_events_are_ordered_and_end_with_ready() {
    let trainer = TestTrainer::ok().with_progress(vec![10, 50, 30, 50, 100, 100]);
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));
    let mut events = coordinator.subscribe_events();

    coordinator
        .ensure_trained(Category::Diabetes)
        .await
        .expect("train");

    let events = drain(&mut events);
    let model_id = coordinator
        .model(Category::Diabetes)
        .await
        .expect("model")
        .id();
    assert_eq!(
        events,
        vec![
            TrainingEvent::Started {
                category: Category::Diabetes
            },
            TrainingEvent::Progress {
                category: Category::Diabetes,
                percent: 10
            },
            TrainingEvent::Progress {
                category: Category::Diabetes,
                percent: 50
            },
            TrainingEvent::Progress {
                category: Category::Diabetes,
                percent: 100
            },
            TrainingEvent::Ready {
                category: Category::Diabetes,
                model_id
            },
        ]
    );
}

#[tokio::test]
async fn progress_is_clamped_to_one_hundred() {
    let trainer = TestTrainer::ok().with_progress(vec![250]);
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));
    let mut events = coordinator.subscribe_events();

    coordinator.ensure_trained(Category::Liver).await.expect("train");

    assert!(drain(&mut events).contains(&TrainingEvent::Progress {
        category: Category::Liver,
        percent: 100
    }));
}

#[tokio::test]
async fn concurrent_callers_share_a_single_run() {
    let gate = Arc::new(Notify::new());
    let trainer = TestTrainer::gated(Arc::clone(&gate));
    let calls = Arc::clone(&trainer.calls);
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));

    let (first, second, ()) = tokio::join!(
        coordinator.ensure_trained(Category::Heart),
        coordinator.ensure_trained(Category::Heart),
        async {
            tokio::task::yield_now().await;
            gate.notify_one();
        }
    );

    first.expect("first caller");
    second.expect("second caller");
    assert_eq!(*calls.lock().await, 1);
    assert_eq!(coordinator.runs_started(Category::Heart), 1);
}

#[tokio::test]
async fn ready_category_is_not_retrained() {
    let trainer = TestTrainer::ok();
    let calls = Arc::clone(&trainer.calls);
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));

    coordinator.ensure_trained(Category::Heart).await.expect("first");
    let first_model = coordinator.model(Category::Heart).await.expect("model").id();
    coordinator.ensure_trained(Category::Heart).await.expect("second");

    assert_eq!(*calls.lock().await, 1);
    assert_eq!(
        coordinator.model(Category::Heart).await.expect("model").id(),
        first_model
    );
}

#[tokio::test]
async fn failure_is_recorded_and_retry_starts_a_new_run() {
    let coordinator = TrainingCoordinator::new(Arc::new(TestTrainer::failing_first(1)));

    let err = coordinator
        .ensure_trained(Category::Liver)
        .await
        .expect_err("first run fails");
    assert_eq!(err, TrainingError::fit(Category::Liver, "loss diverged"));
    assert_eq!(
        coordinator.status(Category::Liver),
        TrainingStatus::Failed(err)
    );
    assert!(coordinator.model(Category::Liver).await.is_none());

    coordinator
        .ensure_trained(Category::Liver)
        .await
        .expect("retry succeeds");
    assert_eq!(coordinator.status(Category::Liver), TrainingStatus::Ready);
    assert_eq!(coordinator.runs_started(Category::Liver), 2);
}

#[tokio::test]
async fn handle_with_wrong_arity_fails_the_run() {
    let mut trainer = TestTrainer::ok();
    trainer.arity_override = Some(3);
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));

    let err = coordinator
        .ensure_trained(Category::Heart)
        .await
        .expect_err("arity mismatch");
    assert!(matches!(err, TrainingError::Fit { category: Category::Heart, .. }));
    assert!(coordinator.model(Category::Heart).await.is_none());
}

#[tokio::test]
async fn panicking_trainer_is_converted_to_failed_status() {
    let mut trainer = TestTrainer::ok();
    trainer.panic = true;
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));

    let err = coordinator
        .ensure_trained(Category::Diabetes)
        .await
        .expect_err("panic is contained");
    assert!(matches!(err, TrainingError::Aborted { .. }));
    assert!(matches!(
        coordinator.status(Category::Diabetes),
        TrainingStatus::Failed(TrainingError::Aborted { .. })
    ));
}

#[tokio::test]
async fn abandoned_caller_still_gets_model_cached() {
    let gate = Arc::new(Notify::new());
    let coordinator = TrainingCoordinator::new(Arc::new(TestTrainer::gated(Arc::clone(&gate))));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        coordinator.ensure_trained(Category::Heart),
    )
    .await;
    assert!(abandoned.is_err(), "gated run cannot finish yet");
    assert_eq!(coordinator.status(Category::Heart), TrainingStatus::Training(0));

    gate.notify_one();
    let mut status = coordinator.subscribe(Category::Heart);
    status
        .wait_for(TrainingStatus::is_terminal)
        .await
        .expect("status channel open");

    assert_eq!(coordinator.status(Category::Heart), TrainingStatus::Ready);
    assert!(coordinator.model(Category::Heart).await.is_some());
    assert_eq!(coordinator.runs_started(Category::Heart), 1);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_runs() {
    let gate = Arc::new(Notify::new());
    let coordinator = TrainingCoordinator::new(Arc::new(TestTrainer::gated(Arc::clone(&gate))));

    let background = Arc::clone(&coordinator);
    let caller = tokio::spawn(async move { background.ensure_trained(Category::Liver).await });
    while coordinator.runs_started(Category::Liver) == 0 {
        tokio::task::yield_now().await;
    }

    gate.notify_one();
    coordinator.shutdown().await;
    assert_eq!(coordinator.status(Category::Liver), TrainingStatus::Ready);
    caller.await.expect("join").expect("trained");
}

#[tokio::test]
async fn caller_waiting_through_shutdown_sees_the_runs_own_failure() {
    let gate = Arc::new(Notify::new());
    let mut trainer = TestTrainer::failing_first(1);
    trainer.gate = Some(Arc::clone(&gate));
    let coordinator = TrainingCoordinator::new(Arc::new(trainer));

    let background = Arc::clone(&coordinator);
    let caller = tokio::spawn(async move { background.ensure_trained(Category::Heart).await });
    while coordinator.runs_started(Category::Heart) == 0 {
        tokio::task::yield_now().await;
    }

    gate.notify_one();
    coordinator.shutdown().await;
    let err = caller.await.expect("join").expect_err("run failed");
    assert_eq!(err, TrainingError::fit(Category::Heart, "loss diverged"));
    assert_eq!(err.category(), Category::Heart);
}

#[tokio::test]
async fn statuses_cover_every_category() {
    let coordinator = TrainingCoordinator::new(Arc::new(TestTrainer::ok()));
    coordinator.ensure_trained(Category::Heart).await.expect("train");

    let statuses = coordinator.statuses();
    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[&Category::Heart], TrainingStatus::Ready);
    assert_eq!(statuses[&Category::Diabetes], TrainingStatus::Untrained);
}
