//! Evaluator stage: score the fresh model and the last registered one on the
//! test subset, then decide whether the fresh model should be promoted

use retrain_model_core::{ArtifactStore, Model, ModelError};
use retrain_registry::ModelRegistry;
use retrain_trainer::LabeledDataset;
use tracing::info;

use crate::config::{PipelineConfig, Summary};
use crate::data::{labeled, read_table};
use crate::decision::{decide, PromotionGate};
use crate::errors::{PipelineError, Result};
use crate::metrics::{classification_report, ClassificationReport, ConfusionMatrix};
use crate::plot::{render_confusion_matrix, CONFUSION_MATRIX_FILE};
use crate::training::load_model;
use crate::tracking::TrackingSession;

/// Everything the evaluator produces
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub current: ClassificationReport,
    /// Report of the last registered model, tagged with its name and version
    pub last: Option<ClassificationReport>,
    pub gate: PromotionGate,
    pub confusion: ConfusionMatrix,
}

fn score(model: &Model, test: &LabeledDataset, which: &str) -> Result<Vec<i64>> {
    model.predict(&test.features).map_err(|e| match e {
        ModelError::FeatureCount { expected, found, .. } => PipelineError::Evaluation(format!(
            "{which} model expects {expected} features, test set has {found}"
        )),
        other => PipelineError::Evaluation(format!("{which} model: {other}")),
    })
}

/// Score `current` on `test` and compare it with the highest registered
/// version of `model_name`. Registry failures are not retried.
pub fn evaluate(
    test: &LabeledDataset,
    current: &Model,
    registry: &dyn ModelRegistry,
    model_name: &str,
) -> Result<Evaluation> {
    if test.is_empty() {
        return Err(PipelineError::Data("test set has no rows".to_string()));
    }

    let predictions = score(current, test, "current")?;
    let current_report = classification_report(&test.labels, &predictions)?;
    let confusion = ConfusionMatrix::new(&test.labels, &predictions)?;

    let versions = registry
        .search_versions(model_name)
        .map_err(|e| PipelineError::RegistryUnavailable(format!("searching {model_name}: {e}")))?;

    let last_report = match versions.iter().map(|v| v.version).max() {
        Some(version) => {
            let last_model = registry.load(model_name, version).map_err(|e| {
                PipelineError::RegistryUnavailable(format!(
                    "loading {model_name} version {version}: {e}"
                ))
            })?;
            info!("Last registered model loaded: {}/{}", model_name, version);
            let last_predictions = score(&last_model, test, "last registered")?;
            Some(classification_report(&test.labels, &last_predictions)?.tagged(model_name, version))
        }
        None => None,
    };

    let f1_current = current_report.weighted_f1();
    let f1_last = last_report.as_ref().map(ClassificationReport::weighted_f1);
    match f1_last {
        Some(last) => info!("weighted avg f1: current={:.3}, last={:.3}", f1_current, last),
        None => info!("No registered model found. Current model is the best so far."),
    }

    Ok(Evaluation {
        gate: decide(f1_current, f1_last),
        current: current_report,
        last: last_report,
        confusion,
    })
}

/// Evaluate stage: writes both reports, the confusion matrix plot and the
/// promotion gate to `eval_store`
pub fn run_evaluation(
    data_store: &dyn ArtifactStore,
    model_store: &dyn ArtifactStore,
    eval_store: &dyn ArtifactStore,
    registry: &dyn ModelRegistry,
    config: &PipelineConfig,
    session: &TrackingSession,
) -> Result<Evaluation> {
    info!("Data config: {}", Summary(&config.data));
    info!("Model config: {}", Summary(&config.model));
    info!("Evaluation config: {}", Summary(&config.eval));

    info!("Loading test data from: {}", data_store.describe(&config.data.test_file));
    let table = read_table(data_store, &config.data.test_file, &config.data)?;
    let test = labeled(&table, &config.data.label_column)?;

    let model = load_model(model_store, &config.model.model_file)?;
    info!("Model loaded from: {}", model_store.describe(&config.model.model_file));

    let evaluation = evaluate(&test, &model, registry, &config.model.model_name)?;

    let eval = &config.eval;
    eval_store.write(&eval.eval_file, &evaluation.current.to_json_pretty()?)?;
    info!("Metrics of the current model saved at: {}", eval_store.describe(&eval.eval_file));

    let plot = render_confusion_matrix(&evaluation.confusion)?;
    eval_store.write(CONFUSION_MATRIX_FILE, &plot)?;

    if let Some(last) = &evaluation.last {
        eval_store.write(&eval.eval_file_last_model, &last.to_json_pretty()?)?;
        info!(
            "Metrics of the last registered model saved at: {}",
            eval_store.describe(&eval.eval_file_last_model)
        );
    }

    eval_store.write(&eval.better_than_last_file, evaluation.gate.encode().as_bytes())?;
    info!(
        "Promotion gate ({}) recorded at: {}",
        evaluation.gate,
        eval_store.describe(&eval.better_than_last_file)
    );

    session.log_metric("current model accuracy-", evaluation.current.accuracy);
    session.log_metrics(&evaluation.current.weighted_avg_metrics());
    session.log_artifact(CONFUSION_MATRIX_FILE, &plot);
    if let Some(last) = &evaluation.last {
        session.log_metrics(&[
            ("current model f1-", evaluation.current.weighted_f1()),
            ("last model f1-", last.weighted_f1()),
        ]);
    }
    session.log_metric("better than last", evaluation.gate.as_metric());

    Ok(evaluation)
}
