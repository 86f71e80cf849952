use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicU32, AtomicU8, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{Category, ModelId},
    error::{PredictionError, TrainingError},
    protocol::{TrainingEvent, TrainingStatus},
};
use tokio::{
    sync::{broadcast, watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::registry;

/// Opaque reference to a fitted model. Only the predictor that produced the
/// payload knows how to read it.
#[derive(Clone)]
pub struct ModelHandle {
    id: ModelId,
    category: Category,
    input_arity: usize,
    trained_at: DateTime<Utc>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl ModelHandle {
    pub fn new<T>(category: Category, input_arity: usize, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            id: ModelId::new(),
            category,
            input_arity,
            trained_at: Utc::now(),
            payload: Arc::new(payload),
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn input_arity(&self) -> usize {
        self.input_arity
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("input_arity", &self.input_arity)
            .field("trained_at", &self.trained_at)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Trainer: Send + Sync {
    /// Fits a model for `category`. Implementations report 100 exactly once,
    /// at or before successful completion.
    async fn train(
        &self,
        category: Category,
        progress: ProgressReporter,
    ) -> Result<ModelHandle, TrainingError>;
}

#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, handle: &ModelHandle, features: &[f64])
        -> Result<f64, PredictionError>;
}

/// Progress sink handed to a [`Trainer`]. Values are clamped to 0..=100 and
/// anything lower than what was already published is dropped.
#[derive(Clone)]
pub struct ProgressReporter {
    category: Category,
    last: Arc<AtomicU8>,
    status: Arc<watch::Sender<TrainingStatus>>,
    events: broadcast::Sender<TrainingEvent>,
}

impl ProgressReporter {
    fn new(
        category: Category,
        status: Arc<watch::Sender<TrainingStatus>>,
        events: broadcast::Sender<TrainingEvent>,
    ) -> Self {
        Self {
            category,
            last: Arc::new(AtomicU8::new(0)),
            status,
            events,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        if percent <= previous {
            return;
        }
        let category = self.category;
        let events = &self.events;
        self.status.send_if_modified(|status| match status {
            TrainingStatus::Training(current) if percent > *current => {
                *status = TrainingStatus::Training(percent);
                let _ = events.send(TrainingEvent::Progress { category, percent });
                true
            }
            _ => false,
        });
    }
}

struct CategorySlot {
    status: Arc<watch::Sender<TrainingStatus>>,
    runs_started: AtomicU32,
}

pub struct TrainingCoordinator {
    trainer: Arc<dyn Trainer>,
    slots: HashMap<Category, CategorySlot>,
    models: RwLock<HashMap<Category, ModelHandle>>,
    runs: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<TrainingEvent>,
}

impl TrainingCoordinator {
    pub fn new(trainer: Arc<dyn Trainer>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let slots = Category::ALL
            .into_iter()
            .map(|category| {
                let (status, _) = watch::channel(TrainingStatus::Untrained);
                (
                    category,
                    CategorySlot {
                        status: Arc::new(status),
                        runs_started: AtomicU32::new(0),
                    },
                )
            })
            .collect();
        Arc::new(Self {
            trainer,
            slots,
            models: RwLock::new(HashMap::new()),
            runs: Mutex::new(Vec::new()),
            events,
        })
    }

    fn slot(&self, category: Category) -> &CategorySlot {
        // Every category gets a slot in `new`.
        &self.slots[&category]
    }

    pub fn status(&self, category: Category) -> TrainingStatus {
        self.slot(category).status.borrow().clone()
    }

    pub fn statuses(&self) -> BTreeMap<Category, TrainingStatus> {
        Category::ALL
            .into_iter()
            .map(|category| (category, self.status(category)))
            .collect()
    }

    pub fn subscribe(&self, category: Category) -> watch::Receiver<TrainingStatus> {
        self.slot(category).status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TrainingEvent> {
        self.events.subscribe()
    }

    pub fn runs_started(&self, category: Category) -> u32 {
        self.slot(category).runs_started.load(Ordering::SeqCst)
    }

    pub async fn model(&self, category: Category) -> Option<ModelHandle> {
        self.models.read().await.get(&category).cloned()
    }

    pub fn start(self: &Arc<Self>, category: Category) -> bool {
        let claimed = self
            .slot(category)
            .status
            .send_if_modified(|status| match status {
                TrainingStatus::Untrained | TrainingStatus::Failed(_) => {
                    *status = TrainingStatus::Training(0);
                    true
                }
                TrainingStatus::Training(_) | TrainingStatus::Ready => false,
            });
        if claimed {
            self.spawn_run(category);
        }
        claimed
    }

    /// Resolves once `category` has a cached model or its run failed.
    pub async fn ensure_trained(self: &Arc<Self>, category: Category) -> Result<(), TrainingError> {
        let mut status_rx = self.subscribe(category);
        if !self.start(category) {
            debug!(category = %category, status = ?*status_rx.borrow(), "attaching to existing training state");
        }

        // The sender lives in `slots`, which `self` keeps alive.
        let result = match status_rx.wait_for(TrainingStatus::is_terminal).await {
            Ok(status) => match &*status {
                TrainingStatus::Failed(err) => Err(err.clone()),
                _ => Ok(()),
            },
            Err(_) => Err(TrainingError::Aborted {
                category,
                reason: "status channel closed".to_string(),
            }),
        };
        result
    }

    fn spawn_run(self: &Arc<Self>, category: Category) {
        let slot = self.slot(category);
        let run = slot.runs_started.fetch_add(1, Ordering::SeqCst) + 1;
        info!(category = %category, run, "training started");
        let _ = self.events.send(TrainingEvent::Started { category });

        let reporter = ProgressReporter::new(category, Arc::clone(&slot.status), self.events.clone());
        let trainer = Arc::clone(&self.trainer);
        let fit = tokio::spawn(async move { trainer.train(category, reporter).await });

        let coordinator = Arc::clone(self);
        let supervisor = tokio::spawn(async move {
            let outcome = match fit.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(TrainingError::Aborted {
                    category,
                    reason: join_err.to_string(),
                }),
            };
            coordinator.finish(category, outcome).await;
        });

        let mut runs = self.lock_runs();
        runs.retain(|handle| !handle.is_finished());
        runs.push(supervisor);
    }

    fn lock_runs(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn finish(&self, category: Category, outcome: Result<ModelHandle, TrainingError>) {
        let outcome = outcome.and_then(|handle| {
            let expected = registry::arity(category);
            if handle.category() != category || handle.input_arity() != expected {
                return Err(TrainingError::fit(
                    category,
                    format!(
                        "trainer returned a {} model with {} inputs, expected {expected}",
                        handle.category(),
                        handle.input_arity()
                    ),
                ));
            }
            Ok(handle)
        });

        let slot = self.slot(category);
        match outcome {
            Ok(handle) => {
                let model_id = handle.id();
                self.models.write().await.insert(category, handle);
                slot.status.send_modify(|status| {
                    *status = TrainingStatus::Ready;
                    let _ = self.events.send(TrainingEvent::Ready { category, model_id });
                });
                info!(category = %category, %model_id, "training finished");
            }
            Err(err) => {
                warn!(category = %category, error = %err, "training failed");
                slot.status.send_modify(|status| {
                    *status = TrainingStatus::Failed(err.clone());
                    let _ = self.events.send(TrainingEvent::Failed {
                        category,
                        error: err.clone(),
                    });
                });
            }
        }
    }

    pub async fn shutdown(&self) {
        let runs = std::mem::take(&mut *self.lock_runs());
        for result in futures::future::join_all(runs).await {
            if let Err(err) = result {
                warn!(error = %err, "training supervisor ended abnormally");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/training_tests.rs"]
mod tests;
