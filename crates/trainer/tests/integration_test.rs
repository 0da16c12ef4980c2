//! Integration tests for the deterministic trainer
//!
//! Identical inputs must produce byte-identical models, and a trained
//! model must survive a serialize/load cycle with unchanged predictions.

use anyhow::Result;
use retrain_model_core::Model;
use retrain_trainer::{shuffled_indices, GbdtTrainer, LabeledDataset, Table, TrainingParams};

/// Two noisy clusters: label 1 when income is low and the bill is high.
fn synthetic_table(rows: usize) -> Table {
    let mut csv = String::from("ID,income,bill,age,default payment next month\n");
    for i in 0..rows {
        let income = 10_000 + (i * 7_919) % 90_000;
        let bill = (i * 104_729) % 50_000;
        let age = 21 + (i * 31) % 50;
        let label = u8::from(income < 40_000 && bill > 15_000);
        csv.push_str(&format!("{i},{income},{bill}.5,{age},{label}\n"));
    }
    Table::parse(&csv).expect("synthetic csv parses")
}

fn synthetic_dataset(rows: usize) -> LabeledDataset {
    let mut table = synthetic_table(rows);
    table.drop_column("ID");
    LabeledDataset::from_table(&table, "default payment next month").expect("label column present")
}

#[test]
fn test_cross_run_determinism() -> Result<()> {
    let dataset = synthetic_dataset(200);
    let params = TrainingParams::new(20, 0.1)?;

    let mut encodings = Vec::new();
    for _ in 0..3 {
        let model = GbdtTrainer::new(params.clone()).train(&dataset)?;
        encodings.push(model.to_bytes()?);
    }

    assert_eq!(encodings[0], encodings[1]);
    assert_eq!(encodings[1], encodings[2]);
    Ok(())
}

#[test]
fn test_model_roundtrip_predictions() -> Result<()> {
    let dataset = synthetic_dataset(300);
    let model = GbdtTrainer::new(TrainingParams::new(30, 0.2)?).train(&dataset)?;

    let restored = Model::from_bytes(&model.to_bytes()?)?;

    assert_eq!(
        model.predict(&dataset.features)?,
        restored.predict(&dataset.features)?
    );
    assert_eq!(model.hash_hex()?, restored.hash_hex()?);
    Ok(())
}

#[test]
fn test_fits_training_data() -> Result<()> {
    let dataset = synthetic_dataset(300);
    let model = GbdtTrainer::new(TrainingParams::new(50, 0.3)?).train(&dataset)?;

    let predictions = model.predict(&dataset.features)?;
    let correct = predictions
        .iter()
        .zip(&dataset.labels)
        .filter(|(p, y)| p == y)
        .count();

    assert!(
        correct * 100 >= dataset.len() * 90,
        "training accuracy too low: {correct}/{}",
        dataset.len()
    );
    Ok(())
}

#[test]
fn test_more_trees_changes_model() -> Result<()> {
    let dataset = synthetic_dataset(100);
    let small = GbdtTrainer::new(TrainingParams::new(2, 0.1)?).train(&dataset)?;
    let large = GbdtTrainer::new(TrainingParams::new(4, 0.1)?).train(&dataset)?;

    assert_eq!(small.num_trees(), 2);
    assert_eq!(large.num_trees(), 4);
    assert_eq!(small.trees[..], large.trees[..2]);
    assert_ne!(small.hash_hex()?, large.hash_hex()?);
    Ok(())
}

#[test]
fn test_shuffle_determinism() {
    let table = synthetic_table(50);
    let a = table.select_rows(&shuffled_indices(table.len(), 42));
    let b = table.select_rows(&shuffled_indices(table.len(), 42));
    let c = table.select_rows(&shuffled_indices(table.len(), 7));

    assert_eq!(a, b);
    assert_ne!(a, c);
}
