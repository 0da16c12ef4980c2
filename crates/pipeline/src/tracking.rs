//! Experiment tracking
//!
//! Stages record params, metrics and artifacts against a run. Tracking is
//! best effort: a failing tracker is reported with a warning and never
//! fails the stage. [`TrackingSession`] owns the run and ends it when
//! dropped, whichever way the stage exits.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use retrain_model_core::{join_name, ArtifactStore, LocalStore, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Environment variable naming the tracking/registry root directory
pub const TRACKING_DIR_ENV: &str = "RETRAIN_TRACKING_DIR";
/// Root used when [`TRACKING_DIR_ENV`] is not set
pub const DEFAULT_TRACKING_DIR: &str = "mlruns";

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Tracking storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Tracking serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

/// Backend that stores runs
pub trait Tracker {
    /// Open a new run and return its id
    fn start_run(&self, run_name: &str) -> TrackingResult<String>;
    fn log_param(&self, run_id: &str, key: &str, value: &str) -> TrackingResult<()>;
    fn log_metrics(&self, run_id: &str, metrics: &[(&str, f64)]) -> TrackingResult<()>;
    fn log_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> TrackingResult<()>;
    fn end_run(&self, run_id: &str) -> TrackingResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Finished,
}

/// `meta.json` of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub run_name: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// File-backed tracker: `<root>/runs/<run_id>/{meta.json, params.json,
/// metrics.json, artifacts/}`
pub struct FileTracker {
    store: LocalStore,
    lock: Mutex<()>,
}

impl FileTracker {
    pub fn open<P: AsRef<Path>>(root: P) -> TrackingResult<Self> {
        let store = LocalStore::open(root.as_ref().join("runs"))?;
        Ok(Self {
            store,
            lock: Mutex::new(()),
        })
    }

    fn read_json<T: serde::de::DeserializeOwned + Default>(&self, name: &str) -> TrackingResult<T> {
        match self.store.read(name) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(StoreError::NotFound(_)) => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> TrackingResult<()> {
        self.store.write(name, &serde_json::to_vec_pretty(value)?)?;
        Ok(())
    }

    pub fn run_meta(&self, run_id: &str) -> TrackingResult<RunMeta> {
        let bytes = self.store.read(&join_name(run_id, "meta.json"))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn params(&self, run_id: &str) -> TrackingResult<BTreeMap<String, String>> {
        self.read_json(&join_name(run_id, "params.json"))
    }

    pub fn metrics(&self, run_id: &str) -> TrackingResult<BTreeMap<String, f64>> {
        self.read_json(&join_name(run_id, "metrics.json"))
    }
}

impl Tracker for FileTracker {
    fn start_run(&self, run_name: &str) -> TrackingResult<String> {
        let run_id = Uuid::new_v4().simple().to_string();
        let meta = RunMeta {
            run_id: run_id.clone(),
            run_name: run_name.to_string(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
        };
        self.write_json(&join_name(&run_id, "meta.json"), &meta)?;
        Ok(run_id)
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> TrackingResult<()> {
        let _guard = self.lock.lock();
        let name = join_name(run_id, "params.json");
        let mut params: BTreeMap<String, String> = self.read_json(&name)?;
        params.insert(key.to_string(), value.to_string());
        self.write_json(&name, &params)
    }

    fn log_metrics(&self, run_id: &str, metrics: &[(&str, f64)]) -> TrackingResult<()> {
        let _guard = self.lock.lock();
        let name = join_name(run_id, "metrics.json");
        let mut stored: BTreeMap<String, f64> = self.read_json(&name)?;
        for (key, value) in metrics {
            stored.insert(key.to_string(), *value);
        }
        self.write_json(&name, &stored)
    }

    fn log_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> TrackingResult<()> {
        let name = join_name(&join_name(run_id, "artifacts"), name);
        self.store.write(&name, bytes)?;
        Ok(())
    }

    fn end_run(&self, run_id: &str) -> TrackingResult<()> {
        let _guard = self.lock.lock();
        let name = join_name(run_id, "meta.json");
        let mut meta: RunMeta = serde_json::from_slice(&self.store.read(&name)?)?;
        meta.status = RunStatus::Finished;
        meta.end_time = Some(Utc::now());
        self.write_json(&name, &meta)
    }
}

/// What a [`MemoryTracker`] saw for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedRun {
    pub name: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: BTreeMap<String, Vec<u8>>,
    pub ended: bool,
}

/// In-memory tracker; clones share the same runs
#[derive(Debug, Clone, Default)]
pub struct MemoryTracker {
    runs: Arc<Mutex<Vec<RecordedRun>>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().clone()
    }

    fn with_run<F: FnOnce(&mut RecordedRun)>(&self, run_id: &str, f: F) -> TrackingResult<()> {
        let mut runs = self.runs.lock();
        let run = run_id
            .parse::<usize>()
            .ok()
            .and_then(|idx| runs.get_mut(idx))
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        f(run);
        Ok(())
    }
}

impl Tracker for MemoryTracker {
    fn start_run(&self, run_name: &str) -> TrackingResult<String> {
        let mut runs = self.runs.lock();
        runs.push(RecordedRun {
            name: run_name.to_string(),
            ..Default::default()
        });
        Ok((runs.len() - 1).to_string())
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> TrackingResult<()> {
        self.with_run(run_id, |run| {
            run.params.insert(key.to_string(), value.to_string());
        })
    }

    fn log_metrics(&self, run_id: &str, metrics: &[(&str, f64)]) -> TrackingResult<()> {
        self.with_run(run_id, |run| {
            for (key, value) in metrics {
                run.metrics.insert(key.to_string(), *value);
            }
        })
    }

    fn log_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> TrackingResult<()> {
        self.with_run(run_id, |run| {
            run.artifacts.insert(name.to_string(), bytes.to_vec());
        })
    }

    fn end_run(&self, run_id: &str) -> TrackingResult<()> {
        self.with_run(run_id, |run| run.ended = true)
    }
}

/// An open run, or nothing when tracking is disabled
pub struct TrackingSession {
    tracker: Option<Box<dyn Tracker>>,
    run_id: Option<String>,
}

impl TrackingSession {
    /// Start a run. A tracker that cannot start one leaves the session inactive.
    pub fn start(tracker: Box<dyn Tracker>, run_name: &str) -> Self {
        match tracker.start_run(run_name) {
            Ok(run_id) => {
                info!("Tracking run {} started ({})", run_name, run_id);
                Self {
                    tracker: Some(tracker),
                    run_id: Some(run_id),
                }
            }
            Err(e) => {
                warn!("Could not start tracking run {}: {}", run_name, e);
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            tracker: None,
            run_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.run_id.is_some()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    fn with_tracker<F>(&self, what: &str, f: F)
    where
        F: FnOnce(&dyn Tracker, &str) -> TrackingResult<()>,
    {
        if let (Some(tracker), Some(run_id)) = (self.tracker.as_deref(), self.run_id.as_deref()) {
            if let Err(e) = f(tracker, run_id) {
                warn!("Tracking call failed ({}): {}", what, e);
            }
        }
    }

    pub fn log_param(&self, key: &str, value: impl Display) {
        let value = value.to_string();
        self.with_tracker(key, |t, run| t.log_param(run, key, &value));
    }

    pub fn log_metric(&self, key: &str, value: f64) {
        self.log_metrics(&[(key, value)]);
    }

    pub fn log_metrics(&self, metrics: &[(&str, f64)]) {
        self.with_tracker("metrics", |t, run| t.log_metrics(run, metrics));
    }

    pub fn log_artifact(&self, name: &str, bytes: &[u8]) {
        self.with_tracker(name, |t, run| t.log_artifact(run, name, bytes));
    }

    /// End the run now instead of on drop
    pub fn finish(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if let (Some(tracker), Some(run_id)) = (self.tracker.take(), self.run_id.take()) {
            match tracker.end_run(&run_id) {
                Ok(()) => debug!("Tracking run {} ended", run_id),
                Err(e) => warn!("Could not end tracking run {}: {}", run_id, e),
            }
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.end();
    }
}
