use std::{collections::BTreeMap, sync::Arc};

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use shared::{
    domain::{Category, ScoreMode, SessionId},
    error::{ErrorCode, ErrorReport, PredictionError, TrainingError},
    protocol::{PredictionResult, TrainingEvent, TrainingStatus},
};
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    presenter,
    registry,
    training::{Predictor, Trainer, TrainingCoordinator},
    wizard::{self, WizardError, WizardEvent, WizardState},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub score_mode: ScoreMode,
    pub seed: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error("prediction aborted: {0}")]
    Prediction(#[from] PredictionError),
}

impl SubmitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SubmitError::Wizard(err) => err.code(),
            SubmitError::Prediction(_) => ErrorCode::InvariantViolation,
        }
    }
}

impl From<SubmitError> for ErrorReport {
    fn from(value: SubmitError) -> Self {
        ErrorReport::new(value.code(), value.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub wizard: WizardState,
    pub training: BTreeMap<Category, TrainingStatus>,
}

pub struct DiagnosisSession {
    id: SessionId,
    options: SessionOptions,
    coordinator: Arc<TrainingCoordinator>,
    predictor: Arc<dyn Predictor>,
    state: Mutex<WizardState>,
    rng: Mutex<StdRng>,
}

impl DiagnosisSession {
    pub fn new(
        trainer: Arc<dyn Trainer>,
        predictor: Arc<dyn Predictor>,
        options: SessionOptions,
    ) -> Arc<Self> {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let id = SessionId::new();
        info!(session_id = %id, score_mode = ?options.score_mode, "diagnosis session opened");
        Arc::new(Self {
            id,
            options,
            coordinator: TrainingCoordinator::new(trainer),
            predictor,
            state: Mutex::new(WizardState::new()),
            rng: Mutex::new(rng),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn coordinator(&self) -> &Arc<TrainingCoordinator> {
        &self.coordinator
    }

    pub async fn state(&self) -> WizardState {
        self.state.lock().await.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            wizard: self.state().await,
            training: self.coordinator.statuses(),
        }
    }

    pub fn training_status(&self, category: Category) -> TrainingStatus {
        self.coordinator.status(category)
    }

    pub fn subscribe_training(&self) -> broadcast::Receiver<TrainingEvent> {
        self.coordinator.subscribe_events()
    }

    pub fn watch_training(&self, category: Category) -> watch::Receiver<TrainingStatus> {
        self.coordinator.subscribe(category)
    }

    async fn apply(&self, event: WizardEvent) -> Result<WizardState, WizardError> {
        let mut state = self.state.lock().await;
        match wizard::reduce(&state, event) {
            Ok(next) => {
                debug!(
                    session_id = %self.id,
                    step = next.step().number(),
                    revision = next.revision(),
                    "wizard transition"
                );
                *state = next.clone();
                Ok(next)
            }
            Err(err) => {
                debug!(session_id = %self.id, error = %err, "wizard event rejected");
                Err(err)
            }
        }
    }

    pub async fn choose_category(&self, category: Category) -> Result<WizardState, WizardError> {
        let state = self.apply(WizardEvent::ChooseCategory(category)).await?;
        if self.coordinator.start(category) {
            info!(session_id = %self.id, category = %category, "background training launched");
        }
        Ok(state)
    }

    pub async fn edit_field(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<WizardState, WizardError> {
        self.apply(WizardEvent::edit(key, value)).await
    }

    pub async fn go_back(&self) -> Result<WizardState, WizardError> {
        self.apply(WizardEvent::GoBack).await
    }

    pub async fn retry_training(&self) -> Result<bool, WizardError> {
        let category = self
            .state
            .lock()
            .await
            .category()
            .ok_or(WizardError::NoCategory)?;
        Ok(self.coordinator.start(category))
    }

    pub async fn wait_until_trained(&self) -> Result<Result<(), TrainingError>, WizardError> {
        let category = self
            .state
            .lock()
            .await
            .category()
            .ok_or(WizardError::NoCategory)?;
        Ok(self.coordinator.ensure_trained(category).await)
    }

    pub async fn submit(&self) -> Result<PredictionResult, SubmitError> {
        let ticket = {
            let state = self.state.lock().await;
            let status = state
                .category()
                .map(|category| self.coordinator.status(category))
                .unwrap_or_default();
            wizard::submit_ticket(&state, &status).inspect_err(|err| {
                warn!(session_id = %self.id, error = %err, "submit rejected");
            })?
        };

        let Some(handle) = self.coordinator.model(ticket.category).await else {
            return Err(WizardError::NotReady {
                category: ticket.category,
                status: self.coordinator.status(ticket.category),
            }
            .into());
        };

        let features = registry::to_feature_vector(ticket.category, &ticket.values);
        let raw_score = self
            .predictor
            .predict(&handle, &features)
            .await
            .inspect_err(|err| {
                error!(
                    session_id = %self.id,
                    category = %ticket.category,
                    features = features.len(),
                    error = %err,
                    "prediction failed; feature encoding and model disagree"
                );
            })?;

        let result = {
            let mut rng = self.rng.lock().await;
            presenter::present_with_mode(
                self.options.score_mode,
                raw_score,
                ticket.category,
                &ticket.values,
                &mut *rng,
            )
        };

        self.apply(WizardEvent::ResultComputed {
            revision: ticket.revision,
            result: result.clone(),
        })
        .await?;
        info!(
            session_id = %self.id,
            category = %ticket.category,
            tier = %result.risk_tier,
            raw_score,
            "prediction ready"
        );
        Ok(result)
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        info!(session_id = %self.id, "diagnosis session closed");
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
