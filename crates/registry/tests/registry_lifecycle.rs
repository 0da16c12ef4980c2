use retrain_model_core::{LocalStore, Model, Node, Tree};
use retrain_registry::{LocalRegistry, ModelRegistry, RegistryError, META_FILE, MODEL_FILE};
use std::fs;
use tempfile::tempdir;

fn stump(threshold: i64) -> Model {
    let tree = Tree::new(
        vec![
            Node::split(0, threshold, 1, 2),
            Node::leaf(-500_000),
            Node::leaf(500_000),
        ],
        1_000_000,
    );
    Model::new(vec![tree], 500_000, 2, [0, 1])
}

#[test]
fn save_local_then_register_from_a_fresh_handle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let registry = LocalRegistry::open(dir.path().join("registry"))?;
    let staging = LocalStore::open(dir.path().join("staging"))?;

    let model = stump(250_000);
    registry.save_local(&model, &staging, "credit_default")?;
    let reloaded = registry.load_local(&staging, "credit_default")?;
    assert_eq!(reloaded, model);

    let uri = registry.log_model(&reloaded, "model")?;
    let version = registry.register(&uri, "credit_default")?;
    assert_eq!(version.version, 1);
    assert_eq!(version.source, uri.to_string());
    assert_eq!(version.model_hash, model.hash_hex()?);

    let reopened = LocalRegistry::open(dir.path().join("registry"))?;
    let versions = reopened.search_versions("credit_default")?;
    assert_eq!(versions, vec![version]);
    assert_eq!(reopened.load("credit_default", 1)?, model);
    Ok(())
}

#[test]
fn save_local_overwrites_previous_files_but_keeps_subdirectories() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let registry = LocalRegistry::open(dir.path().join("registry"))?;
    let staging = LocalStore::open(dir.path().join("staging"))?;

    let target = dir.path().join("staging/credit_default");
    fs::create_dir_all(target.join("history"))?;
    fs::write(target.join("stale.bin"), b"old")?;
    fs::write(target.join("history/notes.txt"), b"keep")?;

    registry.save_local(&stump(100_000), &staging, "credit_default")?;

    let mut files: Vec<String> = fs::read_dir(&target)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files, vec!["history", MODEL_FILE, META_FILE]);
    assert_eq!(fs::read(target.join("history/notes.txt"))?, b"keep");
    Ok(())
}

#[test]
fn corrupted_registered_model_is_not_loaded() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let registry = LocalRegistry::open(dir.path())?;
    let uri = registry.log_model(&stump(1), "model")?;
    registry.register(&uri, "credit_default")?;

    let model_path = dir.path().join("models/credit_default/version-1").join(MODEL_FILE);
    fs::write(&model_path, stump(2).to_bytes()?)?;

    match registry.load("credit_default", 1) {
        Err(RegistryError::CorruptArtifact(_)) => Ok(()),
        other => panic!("expected corrupt artifact, got {other:?}"),
    }
}
