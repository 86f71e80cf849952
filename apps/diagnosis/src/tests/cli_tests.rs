use super::*;

#[test]
fn fields_split_on_first_equals() {
    assert_eq!(
        parse_field("age=65"),
        Ok(("age".to_string(), "65".to_string()))
    );
    assert_eq!(
        parse_field(" note =a=b"),
        Ok(("note".to_string(), "a=b".to_string()))
    );
    assert_eq!(parse_field("weight="), Ok(("weight".to_string(), String::new())));
    assert!(parse_field("age").is_err());
    assert!(parse_field("=65").is_err());
}

#[test]
fn arguments_parse_into_typed_values() {
    let args = Args::try_parse_from([
        "diagnosis",
        "--category",
        "Heart",
        "--field",
        "age=65",
        "--field",
        "systolicBP=150",
        "--score-mode",
        "random_draw",
        "--seed",
        "9",
        "--json",
    ])
    .expect("valid arguments");

    assert_eq!(args.category, Some(Category::Heart));
    assert_eq!(args.fields.len(), 2);
    assert_eq!(args.fields[1], ("systolicBP".to_string(), "150".to_string()));
    assert_eq!(args.score_mode, Some(ScoreMode::RandomDraw));
    assert_eq!(args.seed, Some(9));
    assert!(args.json);
    assert!(!args.list_fields);
}

#[test]
fn unknown_category_is_rejected() {
    assert!(Args::try_parse_from(["diagnosis", "--category", "kidney"]).is_err());
}

#[test]
fn model_option_selects_the_backend() {
    let args = Args::try_parse_from(["diagnosis", "--category", "liver", "--model", "pretrained"])
        .expect("valid arguments");
    assert_eq!(args.model, Some(ModelKind::Pretrained));
    assert!(Args::try_parse_from(["diagnosis", "--model", "oracle"]).is_err());
}

#[test]
fn domain_errors_keep_their_code_through_context() {
    let wizard = anyhow::Error::new(WizardError::UnknownField {
        category: Category::Heart,
        key: "pulse".into(),
    })
    .context("cannot set field 'pulse'");
    let report = error_report(&wizard).expect("wizard error");
    assert_eq!(report.code, ErrorCode::Validation);
    assert!(report.message.contains("pulse"));

    let submit = anyhow::Error::new(SubmitError::from(WizardError::NoCategory))
        .context("prediction failed");
    assert_eq!(
        error_report(&submit).map(|r| r.code),
        Some(ErrorCode::InvalidTransition)
    );

    let training = anyhow::Error::new(TrainingError::fit(Category::Liver, "loss diverged"))
        .context("model training failed");
    assert_eq!(
        error_report(&training).map(|r| r.code),
        Some(ErrorCode::TrainingFailed)
    );

    assert!(error_report(&anyhow::anyhow!("disk full")).is_none());
}

#[test]
fn json_failure_carries_the_stable_code() {
    let error = ErrorReport::new(ErrorCode::NotReady, "model for heart is not ready");
    let json = serde_json::to_value(JsonFailure { error }).expect("serialize");
    assert_eq!(json["error"]["code"], "not_ready");
    assert_eq!(json["error"]["message"], "model for heart is not ready");
}

fn pretrained_session() -> Arc<DiagnosisSession> {
    let settings = Settings {
        model: ModelKind::Pretrained,
        ..Settings::default()
    };
    let (trainer, predictor) = backends(&settings);
    DiagnosisSession::new(trainer, predictor, settings.session_options())
}

#[tokio::test]
async fn unknown_field_surfaces_as_a_validation_report() {
    let session = pretrained_session();
    let fields = vec![("pulse".to_string(), "80".to_string())];

    let err = diagnose(&session, Category::Heart, &fields, None)
        .await
        .expect_err("unknown field");
    let report = error_report(&err).expect("domain error");
    assert_eq!(report.code, ErrorCode::Validation);
    session.shutdown().await;
}

#[tokio::test]
async fn pretrained_model_scores_midpoint_heart_values() {
    let session = pretrained_session();
    let fields: Vec<(String, String)> = [
        ("age", "55"),
        ("weight", "116"),
        ("height", "200"),
        ("systolicBP", "145"),
        ("diastolicBP", "90"),
        ("totalCholesterol", "200"),
        ("hdlCholesterol", "60"),
        ("ldlCholesterol", "120"),
        ("restingHeartRate", "90"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let (result, out_of_range) = diagnose(&session, Category::Heart, &fields, None)
        .await
        .expect("diagnosis");
    assert!(out_of_range.is_empty());
    assert!((result.raw_score - 1.0 / (1.0 + 1.935f64.exp())).abs() < 1e-9);
    assert_eq!(
        insights_for(ModelKind::Pretrained, &result),
        pretrained::insights(result.risk_tier)
    );
    assert!(insights_for(ModelKind::Synthetic, &result).is_empty());
    session.shutdown().await;
}
