use serde::{Deserialize, Serialize};

use crate::{
    domain::{Category, ModelId, RiskTier},
    error::TrainingError,
};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum TrainingStatus {
    #[default]
    Untrained,
    Training(u8),
    Ready,
    Failed(TrainingError),
}

impl TrainingStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, TrainingStatus::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrainingStatus::Ready | TrainingStatus::Failed(_))
    }

    pub fn progress(&self) -> Option<u8> {
        match self {
            TrainingStatus::Training(percent) => Some(*percent),
            TrainingStatus::Ready => Some(100),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TrainingEvent {
    Started {
        category: Category,
    },
    Progress {
        category: Category,
        percent: u8,
    },
    Ready {
        category: Category,
        model_id: ModelId,
    },
    Failed {
        category: Category,
        error: TrainingError,
    },
}

impl TrainingEvent {
    pub fn category(&self) -> Category {
        match self {
            TrainingEvent::Started { category }
            | TrainingEvent::Progress { category, .. }
            | TrainingEvent::Ready { category, .. }
            | TrainingEvent::Failed { category, .. } => *category,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingEvent::Ready { .. } | TrainingEvent::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdviceBundle {
    pub lifestyle: Vec<String>,
    pub monitoring: Vec<String>,
    pub consultation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub category: Category,
    pub risk_tier: RiskTier,
    pub percentage: f64,
    pub risk_factor_notes: Vec<String>,
    pub raw_score: f64,
    pub advice: AdviceBundle,
}
