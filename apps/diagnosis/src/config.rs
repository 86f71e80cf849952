use std::{collections::HashMap, fmt, fs, path::Path, str::FromStr};

use anyhow::Context;
use shared::domain::ScoreMode;
use synthetic_model::TrainOptions;
use wizard_core::SessionOptions;

pub const DEFAULT_CONFIG_FILE: &str = "diagnosis.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Synthetic,
    Pretrained,
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(ModelKind::Synthetic),
            "pretrained" | "logistic" => Ok(ModelKind::Pretrained),
            other => Err(format!("unknown model '{other}' (synthetic or pretrained)")),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelKind::Synthetic => "synthetic",
            ModelKind::Pretrained => "pretrained",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub seed: Option<u64>,
    pub epochs: usize,
    pub samples: usize,
    pub validation_split: f64,
    pub learning_rate: f64,
    pub score_mode: ScoreMode,
    pub model: ModelKind,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        let train = TrainOptions::default();
        Self {
            seed: None,
            epochs: train.epochs,
            samples: train.samples,
            validation_split: train.validation_split,
            learning_rate: train.learning_rate,
            score_mode: ScoreMode::Model,
            model: ModelKind::Synthetic,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            epochs: self.epochs,
            samples: self.samples,
            validation_split: self.validation_split,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            score_mode: self.score_mode,
            seed: self.seed,
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "seed" => {
                if let Ok(parsed) = value.parse() {
                    self.seed = Some(parsed);
                }
            }
            "epochs" => {
                if let Ok(parsed) = value.parse() {
                    self.epochs = parsed;
                }
            }
            "samples" => {
                if let Ok(parsed) = value.parse() {
                    self.samples = parsed;
                }
            }
            "validation_split" => {
                if let Ok(parsed) = value.parse::<f64>() {
                    if (0.0..1.0).contains(&parsed) {
                        self.validation_split = parsed;
                    }
                }
            }
            "learning_rate" => {
                if let Ok(parsed) = value.parse::<f64>() {
                    if parsed.is_finite() && parsed > 0.0 {
                        self.learning_rate = parsed;
                    }
                }
            }
            "score_mode" => {
                if let Ok(parsed) = value.parse() {
                    self.score_mode = parsed;
                }
            }
            "model" => {
                if let Ok(parsed) = value.parse() {
                    self.model = parsed;
                }
            }
            "log_filter" => {
                if !value.is_empty() {
                    self.log_filter = value.to_string();
                }
            }
            _ => {}
        }
    }

    pub fn apply_table(&mut self, table: &HashMap<String, String>) {
        for (key, value) in table {
            self.set(key, value);
        }
    }

    /// `DIAGNOSIS_SEED` first, then the `APP__*` variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DIAGNOSIS_SEED") {
            self.set("seed", &v);
        }
        for key in [
            "seed",
            "epochs",
            "samples",
            "validation_split",
            "learning_rate",
            "score_mode",
            "model",
            "log_filter",
        ] {
            let var = format!("APP__{}", key.to_ascii_uppercase());
            if let Some(v) = lookup(&var) {
                self.set(key, &v);
            }
        }
    }
}

pub fn parse_table(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let table: toml::Table = toml::from_str(raw)?;
    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let file = match path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read config '{}'", path.display()))?,
        ),
        None => fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
    };
    if let Some(raw) = file {
        let table = parse_table(&raw).context("config file is not a flat TOML table")?;
        settings.apply_table(&table);
    }

    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
