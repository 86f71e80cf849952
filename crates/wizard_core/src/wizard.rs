use serde::Serialize;
use shared::{
    domain::{Category, WizardStep},
    error::{ErrorCode, ErrorReport},
    protocol::{PredictionResult, TrainingStatus},
};
use thiserror::Error;

use crate::registry::{self, FormValues};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardState {
    step: WizardStep,
    category: Option<Category>,
    values: FormValues,
    revision: u64,
    last_result: Option<PredictionResult>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: WizardStep::SelectCategory,
            category: None,
            values: FormValues::new(),
            revision: 0,
            last_result: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_result(&self) -> Option<&PredictionResult> {
        self.last_result.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
    ChooseCategory(Category),
    EditField { key: String, value: String },
    ResultComputed {
        revision: u64,
        result: PredictionResult,
    },
    GoBack,
}

impl WizardEvent {
    pub fn edit(key: impl Into<String>, value: impl Into<String>) -> Self {
        WizardEvent::EditField {
            key: key.into(),
            value: value.into(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            WizardEvent::ChooseCategory(_) => "choose_category",
            WizardEvent::EditField { .. } => "edit_field",
            WizardEvent::ResultComputed { .. } => "show_result",
            WizardEvent::GoBack => "go_back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WizardError {
    #[error("cannot {action} while on step {}", .step.number())]
    InvalidTransition {
        step: WizardStep,
        action: &'static str,
    },
    #[error("model for {category} is not ready ({status:?})")]
    NotReady {
        category: Category,
        status: TrainingStatus,
    },
    #[error("'{key}' is not a {category} field")]
    UnknownField { category: Category, key: String },
    #[error("result computed for revision {computed} but form is at revision {current}")]
    StaleResult { computed: u64, current: u64 },
    #[error("no category has been chosen")]
    NoCategory,
}

impl WizardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WizardError::InvalidTransition { .. } | WizardError::NoCategory => {
                ErrorCode::InvalidTransition
            }
            WizardError::NotReady { .. } => ErrorCode::NotReady,
            WizardError::UnknownField { .. } => ErrorCode::Validation,
            WizardError::StaleResult { .. } => ErrorCode::Stale,
        }
    }
}

impl From<WizardError> for ErrorReport {
    fn from(value: WizardError) -> Self {
        ErrorReport::new(value.code(), value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTicket {
    pub category: Category,
    pub revision: u64,
    pub values: FormValues,
}

fn invalid(state: &WizardState, event: &WizardEvent) -> WizardError {
    WizardError::InvalidTransition {
        step: state.step,
        action: event.name(),
    }
}

pub fn reduce(state: &WizardState, event: WizardEvent) -> Result<WizardState, WizardError> {
    match (state.step, &event) {
        (WizardStep::SelectCategory, WizardEvent::ChooseCategory(category)) => Ok(WizardState {
            step: WizardStep::EnterData,
            category: Some(*category),
            values: FormValues::new(),
            revision: state.revision + 1,
            last_result: None,
        }),
        // Replaying the selection that got us here changes nothing.
        (WizardStep::EnterData, WizardEvent::ChooseCategory(category))
            if state.category == Some(*category) =>
        {
            Ok(state.clone())
        }
        (WizardStep::EnterData | WizardStep::ShowResult, WizardEvent::EditField { key, value }) => {
            let category = state.category.ok_or(WizardError::NoCategory)?;
            if registry::field(category, key).is_none() {
                return Err(WizardError::UnknownField {
                    category,
                    key: key.clone(),
                });
            }
            let mut next = state.clone();
            if next.values.set(key.as_str(), value.as_str()) {
                next.revision += 1;
            }
            next.last_result = None;
            Ok(next)
        }
        (WizardStep::EnterData, WizardEvent::ResultComputed { revision, result }) => {
            if *revision != state.revision {
                return Err(WizardError::StaleResult {
                    computed: *revision,
                    current: state.revision,
                });
            }
            let mut next = state.clone();
            next.step = WizardStep::ShowResult;
            next.last_result = Some(result.clone());
            Ok(next)
        }
        (WizardStep::EnterData, WizardEvent::GoBack) => Ok(WizardState {
            step: WizardStep::SelectCategory,
            category: None,
            values: FormValues::new(),
            revision: state.revision + 1,
            last_result: None,
        }),
        (WizardStep::ShowResult, WizardEvent::GoBack) => {
            let mut next = state.clone();
            next.step = WizardStep::EnterData;
            next.last_result = None;
            Ok(next)
        }
        _ => Err(invalid(state, &event)),
    }
}

pub fn submit_ticket(
    state: &WizardState,
    status: &TrainingStatus,
) -> Result<SubmitTicket, WizardError> {
    if state.step != WizardStep::EnterData {
        return Err(WizardError::InvalidTransition {
            step: state.step,
            action: "submit",
        });
    }
    let category = state.category.ok_or(WizardError::NoCategory)?;
    if !status.is_ready() {
        return Err(WizardError::NotReady {
            category,
            status: status.clone(),
        });
    }
    Ok(SubmitTicket {
        category,
        revision: state.revision,
        values: state.values.clone(),
    })
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
