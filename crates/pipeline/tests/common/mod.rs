#![allow(dead_code)]

use retrain_model_core::{ArtifactStore, LocalStore, Model};
use retrain_pipeline::PipelineConfig;
use retrain_registry::{ModelRegistry, ModelUri, ModelVersion, RegistryError};
use retrain_trainer::LcgRng;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tempfile::TempDir;

pub const LABEL: &str = "default payment next month";

pub const CONFIG: &str = r#"{
    "data": {
        "data_file": "credit.csv",
        "train_file": "train.csv",
        "test_file": "test.csv",
        "test_train_ratio": 0.25,
        "index_column": "ID",
        "seed": 7
    },
    "train": {"n_estimators": 25, "learning_rate": 0.3},
    "model": {"model_file": "model.json", "model_name": "credit_default"},
    "eval": {
        "eval_file": "eval.json",
        "eval_file_last_model": "eval_last.json",
        "better_than_last_file": "better_than_last.txt"
    },
    "registry": {"model_name": "credit_default_model"}
}"#;

pub fn config() -> PipelineConfig {
    PipelineConfig::from_json_str(CONFIG).expect("sample config is valid")
}

/// Two features, label 1 when `limit + 0.5 * age > 0.8`
pub fn credit_csv(rows: usize, seed: u64) -> String {
    let mut rng = LcgRng::new(seed);
    let mut out = format!("ID,LIMIT_BAL,AGE,{LABEL}\n");
    for id in 1..=rows {
        let limit = rng.next_below(1000) as f64 / 1000.0;
        let age = rng.next_below(1000) as f64 / 1000.0;
        let label = u8::from(limit + 0.5 * age > 0.8);
        out.push_str(&format!("{id},{limit:.3},{age:.3},{label}\n"));
    }
    out
}

/// Every directory a pipeline run touches, under one temp dir
pub struct Workspace {
    pub dir: TempDir,
    pub input: LocalStore,
    pub data: LocalStore,
    pub models: LocalStore,
    pub eval: LocalStore,
    pub staging: LocalStore,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let open = |name: &str| LocalStore::open(dir.path().join(name)).expect("store");
        let ws = Self {
            input: open("input"),
            data: open("data"),
            models: open("models"),
            eval: open("eval"),
            staging: open("registry_dir"),
            dir,
        };
        ws.input
            .write("credit.csv", credit_csv(240, 11).as_bytes())
            .expect("write dataset");
        ws
    }

    pub fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    pub fn registry_root(&self) -> std::path::PathBuf {
        self.dir.path().join("mlruns").join("registry")
    }
}

pub fn top_level_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Model that always predicts the negative class
pub fn always_negative(feature_count: usize) -> Model {
    Model::new(Vec::new(), 0, feature_count, [0, 1])
}

/// Registry wrapper that counts calls per method
pub struct CountingRegistry<R> {
    pub inner: R,
    calls: RefCell<BTreeMap<&'static str, usize>>,
}

impl<R> CountingRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            calls: RefCell::new(BTreeMap::new()),
        }
    }

    fn tick(&self, method: &'static str) {
        *self.calls.borrow_mut().entry(method).or_insert(0) += 1;
    }

    /// Calls made to `method` so far
    pub fn count(&self, method: &str) -> usize {
        self.calls.borrow().get(method).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls.borrow().values().sum()
    }
}

impl<R: ModelRegistry> ModelRegistry for CountingRegistry<R> {
    fn search_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        self.tick("search_versions");
        self.inner.search_versions(name)
    }

    fn load(&self, name: &str, version: u64) -> Result<Model, RegistryError> {
        self.tick("load");
        self.inner.load(name, version)
    }

    fn save_local(
        &self,
        model: &Model,
        store: &dyn ArtifactStore,
        dir: &str,
    ) -> Result<(), RegistryError> {
        self.tick("save_local");
        self.inner.save_local(model, store, dir)
    }

    fn load_local(&self, store: &dyn ArtifactStore, dir: &str) -> Result<Model, RegistryError> {
        self.tick("load_local");
        self.inner.load_local(store, dir)
    }

    fn log_model(&self, model: &Model, name: &str) -> Result<ModelUri, RegistryError> {
        self.tick("log_model");
        self.inner.log_model(model, name)
    }

    fn register(&self, uri: &ModelUri, name: &str) -> Result<ModelVersion, RegistryError> {
        self.tick("register");
        self.inner.register(uri, name)
    }
}

/// Registry whose backend is unreachable
pub struct UnreachableRegistry;

fn unreachable_error() -> RegistryError {
    RegistryError::Unavailable {
        path: "mlruns/registry".into(),
        source: io::Error::new(io::ErrorKind::ConnectionRefused, "registry offline"),
    }
}

impl ModelRegistry for UnreachableRegistry {
    fn search_versions(&self, _: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        Err(unreachable_error())
    }
    fn load(&self, _: &str, _: u64) -> Result<Model, RegistryError> {
        Err(unreachable_error())
    }
    fn save_local(&self, _: &Model, _: &dyn ArtifactStore, _: &str) -> Result<(), RegistryError> {
        Err(unreachable_error())
    }
    fn load_local(&self, _: &dyn ArtifactStore, _: &str) -> Result<Model, RegistryError> {
        Err(unreachable_error())
    }
    fn log_model(&self, _: &Model, _: &str) -> Result<ModelUri, RegistryError> {
        Err(unreachable_error())
    }
    fn register(&self, _: &ModelUri, _: &str) -> Result<ModelVersion, RegistryError> {
        Err(unreachable_error())
    }
}
