//! Data loading and run persistence

use crate::error::{PrepError, Result};
use crate::preprocessing::{Partition, Partitions, PipelineConfig, PreparationReport, PreparedData};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the file that marks a persisted run as complete
pub const MANIFEST_FILE: &str = "manifest.json";

/// Cell values read as missing in every column
pub const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Where the raw table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Local(PathBuf),
    Remote(String),
}

impl DataSource {
    /// `http://` and `https://` strings are remote, anything else is a path
    pub fn parse(input: &str) -> Self {
        let lower = input.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Remote(input.to_string())
        } else {
            DataSource::Local(PathBuf::from(input))
        }
    }

    fn separator(&self) -> u8 {
        let name = match self {
            DataSource::Local(path) => path.to_string_lossy().to_lowercase(),
            DataSource::Remote(url) => url.to_lowercase(),
        };
        if name.ends_with(".tsv") { b'\t' } else { b',' }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Local(path) => write!(f, "{}", path.display()),
            DataSource::Remote(url) => f.write_str(url),
        }
    }
}

/// Loader for the raw delimited table
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned for schema inference
    infer_schema_length: usize,
    /// Timeout for remote sources
    timeout: Duration,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            infer_schema_length: 10_000,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the timeout for remote sources
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load the raw table from a local file or a remote URL
    pub async fn load(&self, source: &DataSource) -> Result<DataFrame> {
        let start = Instant::now();
        let bytes = match source {
            DataSource::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| PrepError::DataLoad(format!("cannot read {}: {}", path.display(), e)))?,
            DataSource::Remote(url) => self.fetch(url).await?,
        };

        let df = self.parse_bytes(bytes, source.separator())?;
        info!(
            source = %source,
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded raw table"
        );
        Ok(df)
    }

    /// Load a local delimited file without a runtime
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let source = DataSource::Local(path.to_path_buf());
        let bytes = fs::read(path)
            .map_err(|e| PrepError::DataLoad(format!("cannot read {}: {}", path.display(), e)))?;
        self.parse_bytes(bytes, source.separator())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PrepError::DataLoad(format!("failed to create HTTP client: {}", e)))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| PrepError::DataLoad(format!("download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PrepError::DataLoad(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PrepError::DataLoad(format!("failed to read response: {}", e)))?;
        debug!(url = %url, size = bytes.len(), "Downloaded raw table");
        Ok(bytes.to_vec())
    }

    fn parse_bytes(&self, bytes: Vec<u8>, separator: u8) -> Result<DataFrame> {
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(PrepError::DataLoad("source is empty".to_string()));
        }

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(separator)
                    .with_null_values(Some(NullValues::AllColumns(
                        NA_TOKENS.iter().map(|t| (*t).into()).collect(),
                    ))),
            )
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| PrepError::DataLoad(e.to_string()))
    }
}

/// Record written last into a completed run directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub label_column: String,
    /// Persisted file name and its row count
    pub files: Vec<(String, usize)>,
    /// Column order shared by the prepared files
    pub prepared_columns: Vec<String>,
    pub config: PipelineConfig,
    pub report: PreparationReport,
}

impl RunManifest {
    /// Read the manifest of a completed run
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let content = fs::read_to_string(&path)
            .map_err(|e| PrepError::Persistence(format!("no manifest at {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Writes tables and completed runs to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .map_err(|e| PrepError::Persistence(format!("cannot create {}: {}", path.display(), e)))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(|e| PrepError::Persistence(e.to_string()))
    }

    /// File stem used for a partition
    pub fn file_name(partition: Partition, original: bool) -> String {
        if original {
            format!("{}_original.csv", partition.name())
        } else {
            format!("{}.csv", partition.name())
        }
    }

    /// Persist all six partitions of a run into `dir`.
    ///
    /// Files are staged in a scratch directory first; `manifest.json` is
    /// published only after every table is in place. On failure the scratch
    /// directory is removed and no manifest is written.
    pub fn persist_run(dir: impl AsRef<Path>, data: &PreparedData, config: &PipelineConfig) -> Result<RunManifest> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let staging = dir.join(format!(".staging-{}", run_id));
        fs::create_dir_all(&staging)?;

        let result = Self::stage_and_publish(dir, &staging, &run_id, data, config);
        if let Err(e) = &result {
            warn!(error = %e, staging = %staging.display(), "Persisting run failed, discarding staged files");
        }
        if let Err(e) = fs::remove_dir_all(&staging) {
            debug!(error = %e, "Staging directory already removed");
        }
        result
    }

    fn stage_and_publish(
        dir: &Path,
        staging: &Path,
        run_id: &str,
        data: &PreparedData,
        config: &PipelineConfig,
    ) -> Result<RunManifest> {
        // A stale manifest from an earlier run would mark a half-written run as complete
        let manifest_path = dir.join(MANIFEST_FILE);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path)?;
        }

        let mut files = Vec::with_capacity(6);
        for (parts, original) in [(&data.original, true), (&data.prepared, false)] {
            files.extend(Self::stage_partitions(staging, parts, original)?);
        }

        let manifest = RunManifest {
            run_id: run_id.to_string(),
            label_column: config.label_column.clone(),
            files,
            prepared_columns: data
                .prepared
                .train
                .get_column_names()
                .into_iter()
                .map(|c| c.to_string())
                .collect(),
            config: config.clone(),
            report: data.report.clone(),
        };

        for (name, _) in &manifest.files {
            fs::rename(staging.join(name), dir.join(name))?;
        }

        let staged_manifest = staging.join(MANIFEST_FILE);
        fs::write(&staged_manifest, serde_json::to_string_pretty(&manifest)?)?;
        fs::rename(&staged_manifest, &manifest_path)?;

        info!(dir = %dir.display(), run_id = %run_id, files = manifest.files.len(), "Run persisted");
        Ok(manifest)
    }

    fn stage_partitions(staging: &Path, parts: &Partitions, original: bool) -> Result<Vec<(String, usize)>> {
        Partition::ALL
            .iter()
            .map(|&partition| {
                let name = Self::file_name(partition, original);
                let mut df = parts.get(partition).clone();
                Self::save_csv(&mut df, staging.join(&name))?;
                Ok((name, df.height()))
            })
            .collect()
    }
}
