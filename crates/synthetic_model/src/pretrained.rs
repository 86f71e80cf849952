use async_trait::async_trait;
use shared::{
    domain::{Category, RiskTier},
    error::{PredictionError, TrainingError},
};
use tracing::info;
use wizard_core::{registry, ModelHandle, Predictor, ProgressReporter, Trainer};

use crate::network::sigmoid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn scale(&self, value: f64) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        (value - self.min) / (self.max - self.min)
    }
}

const AGE: Bounds = Bounds::new(20.0, 90.0);
const BMI: Bounds = Bounds::new(18.0, 40.0);

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    pub category: Category,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub bounds: Vec<Bounds>,
}

impl LogisticModel {
    pub fn for_category(category: Category) -> Self {
        let (weights, bias, tail): (&[f64], f64, &[Bounds]) = match category {
            Category::Heart => (
                &[0.03, 0.04, 0.02, 0.02, 0.015, -0.02, 0.015, 0.01],
                -2.0,
                &[
                    Bounds::new(90.0, 200.0),
                    Bounds::new(60.0, 120.0),
                    Bounds::new(100.0, 300.0),
                    Bounds::new(20.0, 100.0),
                    Bounds::new(50.0, 190.0),
                    Bounds::new(60.0, 120.0),
                ],
            ),
            Category::Diabetes => (
                &[0.02, 0.03, 0.04, 0.35, 0.025],
                -3.0,
                &[
                    Bounds::new(70.0, 200.0),
                    Bounds::new(4.0, 7.0),
                    Bounds::new(70.0, 200.0),
                ],
            ),
            Category::Liver => (
                &[0.015, 0.02, 0.03, 0.03, -0.25, 0.2],
                -2.5,
                &[
                    Bounds::new(7.0, 200.0),
                    Bounds::new(10.0, 200.0),
                    Bounds::new(3.0, 5.0),
                    Bounds::new(0.3, 2.0),
                ],
            ),
        };
        Self {
            category,
            weights: weights.to_vec(),
            bias,
            bounds: [AGE, BMI].iter().chain(tail).copied().collect(),
        }
    }

    pub fn input_len(&self) -> usize {
        self.weights.len()
    }

    pub fn scale(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .zip(&self.bounds)
            .map(|(value, bounds)| bounds.scale(*value))
            .collect()
    }

    pub fn probability(&self, features: &[f64]) -> Option<f64> {
        if features.len() != self.input_len() {
            return None;
        }
        let z = self
            .scale(features)
            .iter()
            .zip(&self.weights)
            .fold(self.bias, |acc, (x, w)| acc + x * w);
        Some(sigmoid(z))
    }
}

pub fn insights(tier: RiskTier) -> &'static [&'static str] {
    match tier {
        RiskTier::Low => &[
            "Regular health checkups recommended",
            "Maintain current healthy lifestyle",
        ],
        RiskTier::Moderate => &[
            "Schedule follow-up with healthcare provider",
            "Consider lifestyle modifications",
            "Monitor symptoms closely",
        ],
        RiskTier::High => &[
            "Immediate medical consultation recommended",
            "Further diagnostic tests may be needed",
            "Develop management plan with healthcare provider",
        ],
    }
}

/// Hands out the fixed-weight model. Nothing is fitted, so progress jumps
/// straight to 100.
#[derive(Debug, Clone, Copy, Default)]
pub struct PretrainedTrainer;

#[async_trait]
impl Trainer for PretrainedTrainer {
    async fn train(
        &self,
        category: Category,
        progress: ProgressReporter,
    ) -> Result<ModelHandle, TrainingError> {
        let model = LogisticModel::for_category(category);
        if model.input_len() != registry::arity(category) || model.bounds.len() != model.input_len()
        {
            return Err(TrainingError::fit(
                category,
                format!("pretrained weights do not match {} features", registry::arity(category)),
            ));
        }
        info!(category = %category, "loaded pretrained logistic model");
        progress.report(100);
        Ok(ModelHandle::new(category, model.input_len(), model))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticPredictor;

#[async_trait]
impl Predictor for LogisticPredictor {
    async fn predict(
        &self,
        handle: &ModelHandle,
        features: &[f64],
    ) -> Result<f64, PredictionError> {
        let model = handle
            .payload::<LogisticModel>()
            .ok_or(PredictionError::ForeignHandle)?;
        if model.category != handle.category() {
            return Err(PredictionError::CategoryMismatch {
                trained: model.category,
                requested: handle.category(),
            });
        }
        let score = model
            .probability(features)
            .ok_or(PredictionError::ArityMismatch {
                expected: model.input_len(),
                actual: features.len(),
            })?;
        if !score.is_finite() {
            return Err(PredictionError::NonFinite);
        }
        Ok(score)
    }
}

#[cfg(test)]
#[path = "tests/pretrained_tests.rs"]
mod tests;
