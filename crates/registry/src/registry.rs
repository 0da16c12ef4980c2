//! Registry trait and the file-backed implementation
//!
//! Layout under the registry root:
//!
//! ```text
//! models/<name>/version-<n>/{model.json, model.meta.json, version.json}
//! staged/<id>/<name>/{model.json, model.meta.json}
//! ```
//!
//! `log_model` writes into `staged/`, `register` copies a staged model into
//! the next free version directory. Version directories are created with an
//! exclusive `create_dir`, so two registrations can never share a number.

use chrono::Utc;
use retrain_model_core::gbdt::FORMAT_VERSION;
use retrain_model_core::{join_name, ArtifactStore, LocalStore, Model, VERSION};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{RegistryError, Result};
use crate::types::{ModelUri, ModelVersion, NativeModelMeta};

/// Serialized model inside a native model directory
pub const MODEL_FILE: &str = "model.json";
/// Hash and shape sidecar inside a native model directory
pub const META_FILE: &str = "model.meta.json";
const VERSION_FILE: &str = "version.json";
const VERSION_PREFIX: &str = "version-";
const NATIVE_FORMAT: &str = "retrain-gbdt";

/// Operations the pipeline needs from a model registry
pub trait ModelRegistry {
    /// All registered versions of `name`, ascending. Unknown names yield an empty list.
    fn search_versions(&self, name: &str) -> Result<Vec<ModelVersion>>;

    /// Load a registered version
    fn load(&self, name: &str, version: u64) -> Result<Model>;

    /// Persist `model` in the registry's native layout at `dir` inside `store`
    fn save_local(&self, model: &Model, store: &dyn ArtifactStore, dir: &str) -> Result<()>;

    /// Read back a model written by [`ModelRegistry::save_local`]
    fn load_local(&self, store: &dyn ArtifactStore, dir: &str) -> Result<Model>;

    /// Log a model as an artifact named `name`; the URI can later be registered
    fn log_model(&self, model: &Model, name: &str) -> Result<ModelUri>;

    /// Register a logged model under `name` as a new version
    fn register(&self, uri: &ModelUri, name: &str) -> Result<ModelVersion>;
}

/// Logical model names become directory names
fn check_model_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidRegistration(format!(
            "invalid model name {name:?}"
        )))
    }
}

fn parse_version_dir(name: &str) -> Option<u64> {
    name.strip_prefix(VERSION_PREFIX)?.parse().ok()
}

fn unavailable(path: &Path) -> impl FnOnce(std::io::Error) -> RegistryError + '_ {
    move |source| RegistryError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}

/// Write the native layout into `store`
pub(crate) fn write_native(model: &Model, store: &dyn ArtifactStore, dir: &str) -> Result<()> {
    let bytes = model.to_bytes()?;
    let meta = NativeModelMeta {
        format: NATIVE_FORMAT.to_string(),
        format_version: FORMAT_VERSION,
        model_hash: model.hash_hex()?,
        tree_count: model.num_trees(),
        feature_count: model.feature_count,
        library_version: VERSION.to_string(),
        saved_at: Utc::now(),
    };
    let meta_bytes = serde_json::to_vec_pretty(&meta)?;
    store.replace_contents(dir, &[(MODEL_FILE, &bytes), (META_FILE, &meta_bytes)])?;
    Ok(())
}

/// Read the native layout from `store`, checking the recorded hash
pub(crate) fn read_native(store: &dyn ArtifactStore, dir: &str) -> Result<Model> {
    let meta_bytes = store.read(&join_name(dir, META_FILE))?;
    let meta: NativeModelMeta = serde_json::from_slice(&meta_bytes)?;
    if meta.format != NATIVE_FORMAT {
        return Err(RegistryError::CorruptArtifact(format!(
            "{} has format {:?}",
            store.describe(dir),
            meta.format
        )));
    }

    let model = Model::from_bytes(&store.read(&join_name(dir, MODEL_FILE))?)?;
    let actual = model.hash_hex()?;
    if actual != meta.model_hash {
        return Err(RegistryError::CorruptArtifact(format!(
            "{}: hash {} does not match recorded {}",
            store.describe(dir),
            actual,
            meta.model_hash
        )));
    }
    Ok(model)
}

/// File-backed registry rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    /// Open (creating if needed) a registry rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("models")).map_err(unavailable(&root))?;
        fs::create_dir_all(root.join("staged")).map_err(unavailable(&root))?;
        debug!("Opened model registry at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join("models").join(name)
    }

    fn version_dir(&self, name: &str, version: u64) -> PathBuf {
        self.model_dir(name).join(format!("{VERSION_PREFIX}{version}"))
    }

    fn staged_dir(&self, id: &str) -> PathBuf {
        self.root.join("staged").join(id)
    }

    /// Numbers of every `version-<n>` directory of `name`, ascending,
    /// including registrations that never completed
    fn version_numbers(&self, name: &str) -> Result<Vec<u64>> {
        let dir = self.model_dir(name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&dir)(e)),
        };

        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(unavailable(&dir))?;
            if let Some(number) = entry.file_name().to_str().and_then(parse_version_dir) {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn read_version(&self, name: &str, version: u64) -> Result<ModelVersion> {
        let path = self.version_dir(name, version).join(VERSION_FILE);
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                RegistryError::ModelNotFound(format!("{name} version {version}"))
            }
            _ => RegistryError::Unavailable { path: path.clone(), source: e },
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ModelRegistry for LocalRegistry {
    fn search_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        check_model_name(name)?;
        let numbers = self.version_numbers(name)?;

        let mut versions = Vec::with_capacity(numbers.len());
        for number in numbers {
            match self.read_version(name, number) {
                Ok(version) => versions.push(version),
                // A directory without its record is a registration still in flight
                Err(RegistryError::ModelNotFound(_)) => {
                    warn!("Skipping incomplete registration {} version {}", name, number)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(versions)
    }

    fn load(&self, name: &str, version: u64) -> Result<Model> {
        check_model_name(name)?;
        let dir = self.version_dir(name, version);
        if !dir.is_dir() {
            return Err(RegistryError::ModelNotFound(format!(
                "{name} version {version}"
            )));
        }
        let store = LocalStore::open(&dir)?;
        let model = read_native(&store, "")?;
        debug!("Loaded {} version {} ({} trees)", name, version, model.num_trees());
        Ok(model)
    }

    fn save_local(&self, model: &Model, store: &dyn ArtifactStore, dir: &str) -> Result<()> {
        write_native(model, store, dir)?;
        debug!("Saved model to {}", store.describe(dir));
        Ok(())
    }

    fn load_local(&self, store: &dyn ArtifactStore, dir: &str) -> Result<Model> {
        read_native(store, dir)
    }

    fn log_model(&self, model: &Model, name: &str) -> Result<ModelUri> {
        check_model_name(name)?;
        let id = Uuid::new_v4().simple().to_string();
        let store = LocalStore::open(self.staged_dir(&id))?;
        write_native(model, &store, name)?;
        let uri = ModelUri::new(id, name);
        info!("Logged model artifact {}", uri);
        Ok(uri)
    }

    fn register(&self, uri: &ModelUri, name: &str) -> Result<ModelVersion> {
        check_model_name(name)?;
        let staged_root = self.staged_dir(&uri.staged_id);
        if !staged_root.join(&uri.name).is_dir() {
            return Err(RegistryError::InvalidRegistration(format!(
                "no logged model at {uri}"
            )));
        }
        let staged = LocalStore::open(&staged_root)?;
        let model = read_native(&staged, &uri.name)?;

        let model_dir = self.model_dir(name);
        fs::create_dir_all(&model_dir).map_err(unavailable(&model_dir))?;
        // Incomplete directories still hold their number
        let next = self.version_numbers(name)?.last().map_or(1, |n| n + 1);

        let dir = self.version_dir(name, next);
        fs::create_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => RegistryError::VersionConflict(format!(
                "{name} version {next} was created concurrently"
            )),
            _ => RegistryError::Unavailable { path: dir.clone(), source: e },
        })?;

        let target = LocalStore::open(&dir)?;
        for file in [MODEL_FILE, META_FILE] {
            let bytes = staged.read(&join_name(&uri.name, file))?;
            target.write(file, &bytes)?;
        }
        let version = ModelVersion {
            name: name.to_string(),
            version: next,
            source: uri.to_string(),
            model_hash: model.hash_hex()?,
            registered_at: Utc::now(),
        };
        // Written last: its presence marks the version as complete
        target.write(VERSION_FILE, &serde_json::to_vec_pretty(&version)?)?;

        info!("Registered {} version {} from {}", name, next, uri);
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrain_model_core::{MemoryStore, Node, Tree};
    use tempfile::tempdir;

    fn model(bias: i64) -> Model {
        let tree = Tree::new(
            vec![
                Node::split(0, 500_000, 1, 2),
                Node::leaf(-200_000),
                Node::leaf(300_000),
            ],
            100_000,
        );
        Model::new(vec![tree], bias, 1, [0, 1])
    }

    #[test]
    fn model_names_are_validated() {
        assert!(check_model_name("credit_default-v2.1").is_ok());
        for bad in ["", ".hidden", "a/b", "..", "a b"] {
            assert!(check_model_name(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn native_layout_roundtrips_through_memory_store() {
        let store = MemoryStore::new();
        let m = model(400_000);
        write_native(&m, &store, "out").unwrap();
        assert_eq!(store.list("out").unwrap(), vec!["out/model.json", "out/model.meta.json"]);
        assert_eq!(read_native(&store, "out").unwrap(), m);

        let meta: NativeModelMeta =
            serde_json::from_slice(&store.read("out/model.meta.json").unwrap()).unwrap();
        assert_eq!(meta.library_version, VERSION);
        assert_eq!(meta.tree_count, 1);
    }

    #[test]
    fn tampered_model_fails_hash_check() {
        let store = MemoryStore::new();
        write_native(&model(400_000), &store, "").unwrap();
        let other = model(100_000).to_bytes().unwrap();
        store.write(MODEL_FILE, &other).unwrap();
        assert!(matches!(
            read_native(&store, ""),
            Err(RegistryError::CorruptArtifact(_))
        ));
    }

    #[test]
    fn versions_start_at_one_and_increase() {
        let dir = tempdir().unwrap();
        let registry = LocalRegistry::open(dir.path()).unwrap();
        assert!(registry.search_versions("credit").unwrap().is_empty());

        let first = registry.log_model(&model(1), "model").unwrap();
        let second = registry.log_model(&model(2), "model").unwrap();
        assert_ne!(first, second);

        assert_eq!(registry.register(&first, "credit").unwrap().version, 1);
        assert_eq!(registry.register(&second, "credit").unwrap().version, 2);

        let versions: Vec<u64> = registry
            .search_versions("credit")
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(registry.load("credit", 2).unwrap(), model(2));
    }

    #[test]
    fn incomplete_version_dir_is_skipped_over() {
        let dir = tempdir().unwrap();
        let registry = LocalRegistry::open(dir.path()).unwrap();
        let uri = registry.log_model(&model(1), "model").unwrap();
        registry.register(&uri, "credit").unwrap();

        // A half-finished registration holds version 2 without its record
        fs::create_dir(registry.version_dir("credit", 2)).unwrap();
        assert_eq!(registry.search_versions("credit").unwrap().len(), 1);

        let third = registry.register(&uri, "credit").unwrap();
        assert_eq!(third.version, 3);
        assert_eq!(registry.register(&uri, "credit").unwrap().version, 4);

        let versions: Vec<u64> = registry
            .search_versions("credit")
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(versions, vec![1, 3, 4]);
    }

    #[test]
    fn unknown_uri_and_version_are_reported() {
        let dir = tempdir().unwrap();
        let registry = LocalRegistry::open(dir.path()).unwrap();
        assert!(matches!(
            registry.register(&ModelUri::new("missing", "model"), "credit"),
            Err(RegistryError::InvalidRegistration(_))
        ));
        assert!(matches!(
            registry.load("credit", 1),
            Err(RegistryError::ModelNotFound(_))
        ));
    }
}
