//! Command-line interface for preparing the elections dataset.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::preprocessing::{
    identify_feature_types, ColumnType, DataPreparer, FitScope, OutlierStrategy, PipelineConfig,
    DEFAULT_LABEL,
};
use crate::utils::{DataLoader, DataSaver, DataSource};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<14} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "elections-prep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Leakage-safe preparation of the elections vote dataset")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Rows the scaler learns from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScalerScope {
    Train,
    All,
}

impl From<ScalerScope> for FitScope {
    fn from(scope: ScalerScope) -> Self {
        match scope {
            ScalerScope::Train => FitScope::TrainOnly,
            ScalerScope::All => FitScope::AllPartitions,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Partition, clean and select features, then persist the six tables
    Prepare {
        /// Input data file or http(s) URL
        #[arg(short, long)]
        data: String,

        /// Output directory for the persisted run
        #[arg(short, long, default_value = "prepared")]
        output: PathBuf,

        /// Label column name
        #[arg(short, long)]
        label: Option<String>,

        /// Number of features to keep
        #[arg(short, long)]
        k: Option<usize>,

        /// Seed for partitioning
        #[arg(long, conflicts_with = "unseeded")]
        seed: Option<u64>,

        /// Draw the partition seed from entropy
        #[arg(long)]
        unseeded: bool,

        /// Rows the scaler is fitted on
        #[arg(long, value_enum)]
        scaler_scope: Option<ScalerScope>,

        /// Clip numeric values beyond this many train standard deviations
        #[arg(long)]
        clip_outliers: Option<f64>,

        /// JSON pipeline configuration; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Timeout in seconds for remote sources
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Show data information
    Info {
        /// Input data file or http(s) URL
        #[arg(short, long)]
        data: String,

        /// Label column name
        #[arg(short, long, default_value = DEFAULT_LABEL)]
        label: String,

        /// Timeout in seconds for remote sources
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

/// Options of the `prepare` command
#[derive(Debug, Clone, Default)]
pub struct PrepareArgs {
    pub label: Option<String>,
    pub k: Option<usize>,
    pub seed: Option<u64>,
    pub unseeded: bool,
    pub scaler_scope: Option<ScalerScope>,
    pub clip_outliers: Option<f64>,
    pub config: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl PrepareArgs {
    /// Merge the flags over the file (or default) configuration
    pub fn to_config(&self) -> crate::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(label) = &self.label {
            config = config.with_label(label.clone());
        }
        if let Some(k) = self.k {
            config = config.with_n_features(k);
        }
        if let Some(seed) = self.seed {
            config = config.with_random_state(seed);
        }
        if self.unseeded {
            config = config.unseeded();
        }
        if let Some(scope) = self.scaler_scope {
            config = config.with_scaler_scope(scope.into());
        }
        if let Some(threshold) = self.clip_outliers {
            config = config.with_outliers(OutlierStrategy::Clip { threshold });
        }

        config.validate()?;
        Ok(config)
    }

    fn loader(&self) -> DataLoader {
        match self.timeout {
            Some(timeout) => DataLoader::new().with_timeout(timeout),
            None => DataLoader::new(),
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_prepare(data: &str, output: &PathBuf, args: &PrepareArgs) -> anyhow::Result<()> {
    section("Prepare");

    let config = args.to_config()?;
    kv("Label", &config.label_column);
    kv("Features", &config.n_features.to_string());
    kv(
        "Seed",
        &config.random_state.map_or_else(|| "entropy".to_string(), |s| s.to_string()),
    );
    kv("Scaler fit", &format!("{:?}", config.scaler_fit_scope));
    println!();

    step_run("Loading data");
    let source = DataSource::parse(data);
    let raw = args.loader().load(&source).await?;
    step_done(&format!("{} rows × {} cols", raw.height(), raw.width()));

    step_run("Preparing");
    let start = Instant::now();
    let prepared = DataPreparer::new(config.clone()).prepare(&raw)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Persisting → {}", output.display()));
    let manifest = DataSaver::persist_run(output, &prepared, &config)?;
    step_done(&format!("{} files", manifest.files.len()));

    section("Partitions");
    for (name, rows) in &manifest.files {
        println!("  {:<24} {:>8}", muted(name), rows);
    }

    section("Selected features");
    let report = &prepared.report;
    for name in &report.selected_features {
        let score = report.feature_scores.get(name).copied().unwrap_or(0.0);
        println!("  {:<32} {}", name, dim(&format!("{:.4}", score)));
    }

    println!();
    Ok(())
}

pub async fn cmd_info(data: &str, label: &str, timeout: Duration) -> anyhow::Result<()> {
    section("Data Info");

    let source = DataSource::parse(data);
    let df = DataLoader::new().with_timeout(timeout).load(&source).await?;
    let (_, types) = identify_feature_types(&df, label)?;

    kv("Source", &source.to_string());
    kv("Rows", &df.height().to_string());
    kv("Columns", &df.width().to_string());
    kv("Numeric", &types.numeric().len().to_string());
    kv("Categorical", &types.categorical().len().to_string());
    println!();

    println!("  {:<32} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(52)));

    for col in df.get_columns() {
        let tag = match types.get(col.name().as_str()) {
            Some(ColumnType::Numeric) => "numeric",
            Some(ColumnType::Categorical) => "categorical",
            None => "label",
        };
        println!(
            "  {:<32} {:<12} {:>6}",
            col.name().as_str(),
            muted(tag),
            col.null_count()
        );
    }

    println!();
    Ok(())
}
