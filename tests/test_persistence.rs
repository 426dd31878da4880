//! Integration test: loading raw data and persisting prepared runs

use elections_prep::preprocessing::{DataPreparer, PipelineConfig};
use elections_prep::utils::{DataLoader, DataSaver, DataSource, RunManifest, MANIFEST_FILE};
use elections_prep::PrepError;
use polars::prelude::*;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

fn write_raw_csv(n: usize) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(file, "Occupation,Avg_income,Vote").unwrap();
    for i in 0..n {
        let occupation = if i % 4 == 0 { "Services" } else { "Industry" };
        let income = if i % 9 == 5 { String::new() } else { format!("{}", 1000 + (i * 37) % 500) };
        let vote = if i % 4 == 0 { "Purples" } else { "Browns" };
        writeln!(file, "{},{},{}", occupation, income, vote).unwrap();
    }
    file
}

fn prepared_run(n: usize) -> (elections_prep::preprocessing::PreparedData, PipelineConfig) {
    let raw_file = write_raw_csv(n);
    let raw = DataLoader::new().load_csv(raw_file.path()).unwrap();
    let config = PipelineConfig::new().with_n_features(2);
    (DataPreparer::new(config.clone()).prepare(&raw).unwrap(), config)
}

#[tokio::test]
async fn test_async_load_local_csv() {
    let raw_file = write_raw_csv(40);
    let source = DataSource::parse(raw_file.path().to_str().unwrap());
    let df = DataLoader::new().load(&source).await.unwrap();

    assert_eq!(df.shape(), (40, 3));
    assert!(df.column("Avg_income").unwrap().null_count() > 0);
}

#[test]
fn test_persist_run_writes_six_tables_and_manifest() {
    let (data, config) = prepared_run(100);
    let dir = tempdir().unwrap();

    let manifest = DataSaver::persist_run(dir.path(), &data, &config).unwrap();
    assert_eq!(manifest.files.len(), 6);

    for name in [
        "train_original.csv",
        "validate_original.csv",
        "test_original.csv",
        "train.csv",
        "validate.csv",
        "test.csv",
    ] {
        assert!(dir.path().join(name).exists(), "{} missing", name);
    }
    assert!(dir.path().join(MANIFEST_FILE).exists());

    // No staging directories are left behind
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".staging"))
        .count();
    assert_eq!(leftovers, 0);

    let loaded = RunManifest::load(dir.path()).unwrap();
    assert_eq!(loaded.run_id, manifest.run_id);
    assert_eq!(loaded.label_column, "Vote");
    assert_eq!(loaded.config, config);
}

#[test]
fn test_persisted_tables_keep_column_order() {
    let (data, config) = prepared_run(100);
    let dir = tempdir().unwrap();
    DataSaver::persist_run(dir.path(), &data, &config).unwrap();

    let loader = DataLoader::new();
    let train = loader.load_csv(dir.path().join("train.csv")).unwrap();
    let test = loader.load_csv(dir.path().join("test.csv")).unwrap();
    let original = loader.load_csv(dir.path().join("train_original.csv")).unwrap();

    assert_eq!(train.get_column_names(), data.prepared.train.get_column_names());
    assert_eq!(train.get_column_names(), test.get_column_names());
    assert_eq!(train.height(), 60);
    assert_eq!(test.height(), 20);
    assert_eq!(original.get_column_names(), data.original.train.get_column_names());
    assert_eq!(original.column("Occupation").unwrap().dtype(), &DataType::String);
}

#[test]
fn test_failed_persist_publishes_no_manifest() {
    let (data, config) = prepared_run(60);
    let dir = tempdir().unwrap();
    // A directory squatting on a target file name makes the final move fail
    std::fs::create_dir_all(dir.path().join("test.csv").join("blocker")).unwrap();

    let result = DataSaver::persist_run(dir.path(), &data, &config);
    assert!(result.is_err());
    assert!(!dir.path().join(MANIFEST_FILE).exists());
    assert!(matches!(RunManifest::load(dir.path()), Err(PrepError::Persistence(_))));
}

#[test]
fn test_rerun_replaces_previous_manifest() {
    let (data, config) = prepared_run(60);
    let dir = tempdir().unwrap();

    let first = DataSaver::persist_run(dir.path(), &data, &config).unwrap();
    let second = DataSaver::persist_run(dir.path(), &data, &config).unwrap();
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(RunManifest::load(dir.path()).unwrap().run_id, second.run_id);
}
