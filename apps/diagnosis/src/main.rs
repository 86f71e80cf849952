use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use shared::{
    domain::{Category, ScoreMode},
    error::{ErrorCode, ErrorReport, TrainingError},
    protocol::{PredictionResult, TrainingEvent},
};
use synthetic_model::{
    pretrained, LogisticPredictor, PretrainedTrainer, SyntheticPredictor, SyntheticTrainer,
};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wizard_core::{
    registry, DiagnosisSession, FieldKind, Predictor, SessionSnapshot, SubmitError, Trainer,
    WizardError,
};

mod config;

use config::{load_settings, ModelKind, Settings};

#[derive(Parser, Debug)]
#[command(name = "diagnosis", about = "Run one risk-assessment wizard session")]
struct Args {
    /// heart, diabetes or liver
    #[arg(long)]
    category: Option<Category>,
    /// Form value as key=value; repeatable
    #[arg(long = "field", value_parser = parse_field)]
    fields: Vec<(String, String)>,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// model or random-draw
    #[arg(long)]
    score_mode: Option<ScoreMode>,
    /// synthetic or pretrained
    #[arg(long)]
    model: Option<ModelKind>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the form fields and exit
    #[arg(long)]
    list_fields: bool,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    session: &'a SessionSnapshot,
    result: &'a PredictionResult,
    out_of_range: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    insights: Vec<&'static str>,
}

#[derive(Serialize)]
struct JsonFailure {
    error: ErrorReport,
}

fn error_report(err: &anyhow::Error) -> Option<ErrorReport> {
    if let Some(err) = err.downcast_ref::<SubmitError>() {
        return Some(ErrorReport::new(err.code(), err.to_string()));
    }
    if let Some(err) = err.downcast_ref::<WizardError>() {
        return Some(ErrorReport::new(err.code(), err.to_string()));
    }
    err.downcast_ref::<TrainingError>()
        .map(|err| ErrorReport::new(ErrorCode::TrainingFailed, err.to_string()))
}

fn backends(settings: &Settings) -> (Arc<dyn Trainer>, Arc<dyn Predictor>) {
    match settings.model {
        ModelKind::Synthetic => (
            Arc::new(SyntheticTrainer::new(settings.train_options())),
            Arc::new(SyntheticPredictor),
        ),
        ModelKind::Pretrained => (Arc::new(PretrainedTrainer), Arc::new(LogisticPredictor)),
    }
}

fn insights_for(model: ModelKind, result: &PredictionResult) -> &'static [&'static str] {
    match model {
        ModelKind::Pretrained => pretrained::insights(result.risk_tier),
        ModelKind::Synthetic => &[],
    }
}

fn print_fields(category: Category) {
    println!("{category} fields:");
    for spec in registry::fields_for(category) {
        let mut line = format!("  {:<20} {}", spec.key, spec.label);
        if let Some(unit) = spec.unit {
            line.push_str(&format!(" ({unit})"));
        }
        if let Some((min, max)) = spec.valid_range {
            line.push_str(&format!(" [{min}-{max}]"));
        }
        if let FieldKind::Choice(options) = spec.kind {
            line.push_str(&format!(" one of {}", options.join("/")));
        }
        if !spec.required {
            line.push_str(" optional");
        }
        println!("{line}");
    }
}

fn print_result(result: &PredictionResult, insights: &[&str]) {
    println!(
        "{} risk: {} ({:.1}%)",
        result.category, result.risk_tier, result.percentage
    );
    if result.risk_factor_notes.is_empty() {
        println!("No individual risk factors flagged.");
    } else {
        println!("Risk factors:");
        for note in &result.risk_factor_notes {
            println!("  - {note}");
        }
    }
    for (title, lines) in [
        ("Lifestyle", &result.advice.lifestyle),
        ("Monitoring", &result.advice.monitoring),
        ("Consultation", &result.advice.consultation),
    ] {
        println!("{title}:");
        for line in lines {
            println!("  - {line}");
        }
    }
    if !insights.is_empty() {
        println!("Model insights:");
        for line in insights {
            println!("  - {line}");
        }
    }
}

fn spawn_progress_printer(
    mut events: broadcast::Receiver<TrainingEvent>,
    category: Category,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TrainingEvent::Progress { category: c, percent }) if c == category => {
                    eprint!("\rtraining {category} model: {percent:>3}%");
                }
                Ok(event) if event.category() == category && event.is_terminal() => {
                    eprintln!();
                    break;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn diagnose(
    session: &DiagnosisSession,
    category: Category,
    fields: &[(String, String)],
    printer: Option<tokio::task::JoinHandle<()>>,
) -> Result<(PredictionResult, Vec<&'static str>)> {
    session.choose_category(category).await?;
    for (key, value) in fields {
        session
            .edit_field(key.as_str(), value.as_str())
            .await
            .with_context(|| format!("cannot set field '{key}'"))?;
    }

    let state = session.state().await;
    let out_of_range = registry::out_of_range(category, state.values());
    for key in &out_of_range {
        warn!(field = *key, "value outside the documented range");
    }
    let missing: Vec<&str> = registry::fields_for(category)
        .into_iter()
        .filter(|spec| spec.required && state.values().get(spec.key).is_none())
        .map(|spec| spec.key)
        .collect();
    if !missing.is_empty() {
        warn!(fields = ?missing, "required fields left empty; they encode as 0");
    }

    session
        .wait_until_trained()
        .await?
        .context("model training failed")?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = session.submit().await.context("prediction failed")?;
    Ok((result, out_of_range))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        settings.seed = Some(seed);
    }
    if let Some(mode) = args.score_mode {
        settings.score_mode = mode;
    }
    if let Some(model) = args.model {
        settings.model = model;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.list_fields {
        match args.category {
            Some(category) => print_fields(category),
            None => Category::ALL.into_iter().for_each(print_fields),
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(category) = args.category else {
        bail!("--category is required (heart, diabetes or liver)");
    };

    let (trainer, predictor) = backends(&settings);
    let session = DiagnosisSession::new(trainer, predictor, settings.session_options());
    info!(
        session_id = %session.id(),
        category = %category,
        model = %settings.model,
        "starting diagnosis"
    );

    let printer =
        (!args.json).then(|| spawn_progress_printer(session.subscribe_training(), category));

    let outcome = diagnose(&session, category, &args.fields, printer).await;
    let (result, out_of_range) = match outcome {
        Ok(done) => done,
        Err(err) => {
            session.shutdown().await;
            return match error_report(&err).filter(|_| args.json) {
                Some(error) => {
                    println!("{}", serde_json::to_string_pretty(&JsonFailure { error })?);
                    Ok(ExitCode::FAILURE)
                }
                None => Err(err),
            };
        }
    };

    let insights = insights_for(settings.model, &result);
    if args.json {
        let snapshot = session.snapshot().await;
        let output = JsonOutput {
            session: &snapshot,
            result: &result,
            out_of_range,
            insights: insights.to_vec(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_result(&result, insights);
    }

    session.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
