//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart::SvgChartAdapter;
use crate::domain::config::{build_pipeline_config, PipelineConfig};
use crate::domain::correlation::build_monthly_correlations;
use crate::domain::error::CorrnetError;
use crate::domain::network::{build_network_metrics, NetworkReport};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{CorrelationStore, MetricsStore, ObservationSource};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "corrnet",
    about = "Monthly asset correlation networks from daily log-returns"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct StageArgs {
    /// INI configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override [pipeline] min_days_per_asset
    #[arg(long)]
    pub min_days: Option<usize>,
    /// Override [pipeline] corr_threshold
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the monthly correlation edge list from daily observations
    Correlations {
        #[command(flatten)]
        args: StageArgs,
    },
    /// Build monthly network metrics and charts from the edge list
    Network {
        #[command(flatten)]
        args: StageArgs,
        /// Skip writing the density / average-degree charts
        #[arg(long)]
        no_charts: bool,
    },
    /// Run both stages in sequence
    Run {
        #[command(flatten)]
        args: StageArgs,
        #[arg(long)]
        no_charts: bool,
    },
    /// Validate a configuration file and print the resolved settings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Csv,
    Sqlite,
    Postgres,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!(
                "unknown backend '{other}' (expected csv, sqlite or postgres)"
            )),
        }
    }
}

/// Where the three pipeline tables live.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub backend: Backend,
    pub observations: PathBuf,
    pub correlations: PathBuf,
    pub metrics: PathBuf,
}

/// Which stages a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stages {
    Correlations,
    Network { charts: bool },
    Both { charts: bool },
}

impl Stages {
    /// Keep chart output only if `enabled` also permits it.
    pub fn allow_charts(self, enabled: bool) -> Self {
        match self {
            Self::Correlations => Self::Correlations,
            Self::Network { charts } => Self::Network {
                charts: charts && enabled,
            },
            Self::Both { charts } => Self::Both {
                charts: charts && enabled,
            },
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Correlations { args } => run_stages(&args, Stages::Correlations),
        Command::Network { args, no_charts } => {
            run_stages(&args, Stages::Network { charts: !no_charts })
        }
        Command::Run { args, no_charts } => run_stages(&args, Stages::Both { charts: !no_charts }),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, CorrnetError> {
    match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading config");
            FileConfigAdapter::from_file(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

/// Pipeline parameters from the `[pipeline]` section with CLI overrides
/// applied on top.
pub fn resolve_pipeline_config(
    config: &dyn ConfigPort,
    min_days: Option<usize>,
    threshold: Option<f64>,
) -> Result<PipelineConfig, CorrnetError> {
    let mut pipeline = build_pipeline_config(config)?;
    if let Some(n) = min_days {
        pipeline = pipeline.with_min_days(n);
    }
    if let Some(t) = threshold {
        pipeline = pipeline.with_threshold(t);
    }
    pipeline.validate()?;
    Ok(pipeline)
}

pub fn build_storage_settings(config: &dyn ConfigPort) -> Result<StorageSettings, CorrnetError> {
    let backend = match config.get_string("storage", "backend") {
        Some(s) if !s.trim().is_empty() => {
            s.parse::<Backend>()
                .map_err(|reason| CorrnetError::ConfigInvalid {
                    section: "storage".into(),
                    key: "backend".into(),
                    reason,
                })?
        }
        _ => Backend::Csv,
    };

    let path_or = |key: &str, default: &str| {
        PathBuf::from(
            config
                .get_string("storage", key)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default.to_string()),
        )
    };

    Ok(StorageSettings {
        backend,
        observations: path_or("observations", "data/ohlc_daily.csv"),
        correlations: path_or("correlations", "data/monthly_correlations.csv"),
        metrics: path_or("metrics", "data/temporal_network_metrics.csv"),
    })
}

pub fn reports_dir(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("report", "reports_dir")
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("reports"))
}

/// Build and replace the correlation edge list. Returns the number of
/// edges written.
pub fn run_correlation_stage(
    source: &dyn ObservationSource,
    store: &dyn CorrelationStore,
    config: &PipelineConfig,
) -> Result<usize, CorrnetError> {
    let observations = source.fetch_observations()?;
    tracing::info!(rows = observations.len(), "loaded daily observations");

    let edges = build_monthly_correlations(&observations, config.min_days_per_asset)?;
    store.replace_correlations(&edges)?;
    Ok(edges.len())
}

/// Result of the network stage: the metrics report and any chart files.
#[derive(Debug, Clone)]
pub struct NetworkStageOutput {
    pub report: NetworkReport,
    pub charts: Vec<PathBuf>,
}

/// Build and replace the metrics table, then render charts when a chart
/// port is given and at least one month produced a row.
pub fn run_network_stage(
    store: &dyn CorrelationStore,
    metrics_store: &dyn MetricsStore,
    charts: Option<&dyn ReportPort>,
    config: &PipelineConfig,
) -> Result<NetworkStageOutput, CorrnetError> {
    let edges = store.fetch_correlations()?;
    tracing::info!(rows = edges.len(), "loaded correlation edges");

    let report = build_network_metrics(&edges, config.corr_threshold, config.node_universe)?;
    metrics_store.replace_metrics(&report.metrics)?;

    let charts = match charts {
        Some(port) => port.write_charts(&report)?,
        None => Vec::new(),
    };
    Ok(NetworkStageOutput { report, charts })
}

/// Run the requested stages against one storage backend.
pub fn run_pipeline<S>(
    storage: &S,
    charts: &dyn ReportPort,
    config: &PipelineConfig,
    stages: Stages,
) -> Result<(), CorrnetError>
where
    S: ObservationSource + CorrelationStore + MetricsStore,
{
    if matches!(stages, Stages::Correlations | Stages::Both { .. }) {
        let rows = run_correlation_stage(storage, storage, config)?;
        eprintln!("Done building monthly_correlations.");
        eprintln!("Rows inserted: {}", rows);
    }

    let with_charts = match stages {
        Stages::Correlations => return Ok(()),
        Stages::Network { charts } | Stages::Both { charts } => charts,
    };

    let chart_port = with_charts.then_some(charts);
    let output = run_network_stage(storage, storage, chart_port, config)?;
    eprintln!("Done building temporal_network_metrics.");
    eprintln!("Rows inserted: {}", output.report.metrics.len());
    if let Some(dir) = output.charts.first().and_then(|p| p.parent()) {
        eprintln!("Figures saved in: {}", display_dir(dir));
    }
    Ok(())
}

fn display_dir(dir: &Path) -> String {
    dir.canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf())
        .display()
        .to_string()
}

fn run_stages(args: &StageArgs, stages: Stages) -> ExitCode {
    match execute_stages(args, stages) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Resolve configuration and storage, then run `stages`.
pub fn execute_stages(args: &StageArgs, stages: Stages) -> Result<(), CorrnetError> {
    let config = load_config(args.config.as_ref())?;
    let pipeline = resolve_pipeline_config(&config, args.min_days, args.threshold)?;
    let storage = build_storage_settings(&config)?;
    let charts = SvgChartAdapter::new(reports_dir(&config));
    let stages = stages.allow_charts(config.get_bool("report", "charts", true));

    tracing::info!(
        backend = ?storage.backend,
        min_days_per_asset = pipeline.min_days_per_asset,
        corr_threshold = pipeline.corr_threshold,
        node_universe = %pipeline.node_universe,
        "starting pipeline"
    );

    match storage.backend {
        Backend::Csv => {
            let adapter = CsvAdapter::new(storage.observations, storage.correlations, storage.metrics);
            run_pipeline(&adapter, &charts, &pipeline, stages)
        }
        Backend::Sqlite => run_sqlite(&config, &charts, &pipeline, stages),
        Backend::Postgres => run_postgres(&config, &charts, &pipeline, stages),
    }
}

#[cfg(feature = "sqlite")]
fn run_sqlite(
    config: &dyn ConfigPort,
    charts: &dyn ReportPort,
    pipeline: &PipelineConfig,
    stages: Stages,
) -> Result<(), CorrnetError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    run_pipeline(&adapter, charts, pipeline, stages)
}

#[cfg(not(feature = "sqlite"))]
fn run_sqlite(
    _config: &dyn ConfigPort,
    _charts: &dyn ReportPort,
    _pipeline: &PipelineConfig,
    _stages: Stages,
) -> Result<(), CorrnetError> {
    Err(CorrnetError::ConfigInvalid {
        section: "storage".into(),
        key: "backend".into(),
        reason: "sqlite feature is required for the sqlite backend".into(),
    })
}

#[cfg(feature = "postgres")]
fn run_postgres(
    config: &dyn ConfigPort,
    charts: &dyn ReportPort,
    pipeline: &PipelineConfig,
    stages: Stages,
) -> Result<(), CorrnetError> {
    use crate::adapters::postgres_adapter::PostgresAdapter;

    let adapter = PostgresAdapter::from_config(config)?;
    run_pipeline(&adapter, charts, pipeline, stages)
}

#[cfg(not(feature = "postgres"))]
fn run_postgres(
    _config: &dyn ConfigPort,
    _charts: &dyn ReportPort,
    _pipeline: &PipelineConfig,
    _stages: Stages,
) -> Result<(), CorrnetError> {
    Err(CorrnetError::ConfigInvalid {
        section: "storage".into(),
        key: "backend".into(),
        reason: "postgres feature is required for the postgres backend".into(),
    })
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let result = load_config(Some(config_path)).and_then(|config| {
        let pipeline = resolve_pipeline_config(&config, None, None)?;
        let storage = build_storage_settings(&config)?;
        let charts = config.get_bool("report", "charts", true);
        Ok((pipeline, storage, reports_dir(&config), charts))
    });

    match result {
        Ok((pipeline, storage, reports, charts)) => {
            eprintln!("\n[pipeline]");
            eprintln!("  min_days_per_asset: {}", pipeline.min_days_per_asset);
            eprintln!("  corr_threshold:     {}", pipeline.corr_threshold);
            eprintln!("  node_universe:      {}", pipeline.node_universe);
            eprintln!("\n[storage]");
            eprintln!("  backend: {:?}", storage.backend);
            if storage.backend == Backend::Csv {
                eprintln!("  observations: {}", storage.observations.display());
                eprintln!("  correlations: {}", storage.correlations.display());
                eprintln!("  metrics:      {}", storage.metrics.display());
            }
            eprintln!("\n[report]");
            eprintln!("  reports_dir: {}", reports.display());
            eprintln!("  charts:      {}", charts);
            eprintln!("\nConfiguration is valid.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
