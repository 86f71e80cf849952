use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidTransition,
    NotReady,
    Validation,
    Stale,
    TrainingFailed,
    InvariantViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum TrainingError {
    #[error("model fitting failed for {category}: {reason}")]
    Fit { category: Category, reason: String },
    #[error("training run for {category} aborted: {reason}")]
    Aborted { category: Category, reason: String },
}

impl TrainingError {
    pub fn fit(category: Category, reason: impl Into<String>) -> Self {
        Self::Fit {
            category,
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            TrainingError::Fit { category, .. }
            | TrainingError::Aborted { category, .. } => *category,
        }
    }
}

impl From<TrainingError> for ErrorReport {
    fn from(value: TrainingError) -> Self {
        ErrorReport::new(ErrorCode::TrainingFailed, value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("feature vector has {actual} values but the model expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("model trained for {trained} cannot score {requested} input")]
    CategoryMismatch {
        trained: Category,
        requested: Category,
    },
    #[error("model handle was not produced by this predictor")]
    ForeignHandle,
    #[error("model produced a non-finite score")]
    NonFinite,
}

impl From<PredictionError> for ErrorReport {
    fn from(value: PredictionError) -> Self {
        ErrorReport::new(ErrorCode::InvariantViolation, value.to_string())
    }
}
