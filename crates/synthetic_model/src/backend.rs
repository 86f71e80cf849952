use async_trait::async_trait;
use shared::{
    domain::Category,
    error::{PredictionError, TrainingError},
};
use tracing::{debug, info};
use wizard_core::{registry, ModelHandle, Predictor, ProgressReporter, Trainer};

use crate::{
    network::{layer_sizes, DenseNetwork},
    train::{fit, rng_for, TrainOptions},
};

#[derive(Debug, Clone)]
pub struct SyntheticModel {
    pub category: Category,
    pub network: DenseNetwork,
}

/// Fits a small dense network on random data. The result carries no medical
/// signal; it only exercises the training and prediction plumbing.
#[derive(Debug, Clone, Default)]
pub struct SyntheticTrainer {
    options: TrainOptions,
}

impl SyntheticTrainer {
    pub fn new(options: TrainOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TrainOptions {
        &self.options
    }
}

fn category_seed(seed: Option<u64>, category: Category) -> Option<u64> {
    let salt = match category {
        Category::Heart => 0x68_65_61_72,
        Category::Diabetes => 0x64_69_61_62,
        Category::Liver => 0x6c_69_76_65,
    };
    seed.map(|seed| seed ^ salt)
}

#[async_trait]
impl Trainer for SyntheticTrainer {
    async fn train(
        &self,
        category: Category,
        progress: ProgressReporter,
    ) -> Result<ModelHandle, TrainingError> {
        let options = self.options.clone();
        let sizes = layer_sizes(category);
        info!(
            category = %category,
            epochs = options.epochs,
            samples = options.samples,
            "fitting synthetic model"
        );

        let fitted = tokio::task::spawn_blocking(move || {
            let mut rng = rng_for(category_seed(options.seed, category));
            fit(sizes, &options, &mut rng, |report| {
                debug!(
                    category = %category,
                    epoch = report.epoch + 1,
                    train_loss = report.train_loss,
                    validation_loss = ?report.validation_loss,
                    "epoch finished"
                );
                progress.report(report.percent());
            })
        })
        .await
        .map_err(|err| TrainingError::Aborted {
            category,
            reason: err.to_string(),
        })?
        .map_err(|err| TrainingError::fit(category, err.to_string()))?;

        let input_arity = fitted.input_len();
        Ok(ModelHandle::new(
            category,
            input_arity,
            SyntheticModel {
                category,
                network: fitted,
            },
        ))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticPredictor;

#[async_trait]
impl Predictor for SyntheticPredictor {
    async fn predict(
        &self,
        handle: &ModelHandle,
        features: &[f64],
    ) -> Result<f64, PredictionError> {
        let model = handle
            .payload::<SyntheticModel>()
            .ok_or(PredictionError::ForeignHandle)?;
        if model.category != handle.category() {
            return Err(PredictionError::CategoryMismatch {
                trained: model.category,
                requested: handle.category(),
            });
        }
        let expected = registry::arity(handle.category());
        if features.len() != expected || features.len() != model.network.input_len() {
            return Err(PredictionError::ArityMismatch {
                expected: model.network.input_len(),
                actual: features.len(),
            });
        }
        let score = model
            .network
            .predict(features)
            .filter(|score| score.is_finite())
            .ok_or(PredictionError::NonFinite)?;
        Ok(score.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
