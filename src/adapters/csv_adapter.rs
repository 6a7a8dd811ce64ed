//! CSV file adapter for observations, correlation edges and metrics.
//!
//! Files carry a header row. Absent values are empty fields. Dates are
//! `YYYY-MM-DD`.

use crate::domain::correlation::MonthlyCorrelationEdge;
use crate::domain::error::CorrnetError;
use crate::domain::network::MonthlyNetworkMetrics;
use crate::domain::observation::DailyObservation;
use crate::ports::data_port::{CorrelationStore, MetricsStore, ObservationSource};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const OBSERVATION_HEADER: [&str; 3] = ["asset_id", "day", "log_return"];
pub const CORRELATION_HEADER: [&str; 4] = ["month", "asset_i", "asset_j", "corr"];
pub const METRICS_HEADER: [&str; 8] = [
    "month",
    "n_assets",
    "n_edges",
    "density",
    "avg_degree",
    "max_degree",
    "avg_clustering",
    "lcc_size",
];

pub struct CsvAdapter {
    observations_path: PathBuf,
    correlations_path: PathBuf,
    metrics_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(observations_path: PathBuf, correlations_path: PathBuf, metrics_path: PathBuf) -> Self {
        Self {
            observations_path,
            correlations_path,
            metrics_path,
        }
    }

    /// Adapter over `ohlc_daily.csv`, `monthly_correlations.csv` and
    /// `temporal_network_metrics.csv` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(
            dir.join("ohlc_daily.csv"),
            dir.join("monthly_correlations.csv"),
            dir.join("temporal_network_metrics.csv"),
        )
    }

    pub fn correlations_path(&self) -> &Path {
        &self.correlations_path
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> CorrnetError {
    CorrnetError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    }
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> CorrnetError {
    CorrnetError::Database {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

/// Locate each expected column in the header row. Each entry lists the
/// names accepted for that column.
fn column_positions(
    headers: &csv::StringRecord,
    expected: &[&[&str]],
) -> Result<Vec<usize>, CorrnetError> {
    expected
        .iter()
        .map(|names| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim()))
                .ok_or_else(|| CorrnetError::Database {
                    reason: format!("missing column {}", names[0]),
                })
        })
        .collect()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Empty field is absent; anything else must parse as a number.
fn parse_optional_f64(value: &str) -> Result<Option<f64>, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| format!("non-numeric value '{}'", trimmed))
}

fn format_optional_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ObservationSource for CsvAdapter {
    fn fetch_observations(&self) -> Result<Vec<DailyObservation>, CorrnetError> {
        let path = &self.observations_path;
        let content = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
        parse_observations(&content).map_err(|e| match e {
            CorrnetError::Database { reason } => read_error(path, reason),
            other => other,
        })
    }
}

/// Parse observation CSV text. The id column may be named `asset_id` or
/// `asset_address`.
pub fn parse_observations(content: &str) -> Result<Vec<DailyObservation>, CorrnetError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| CorrnetError::Database {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    let cols = column_positions(
        &headers,
        &[&["asset_id", "asset_address"], &["day"], &["log_return"]],
    )?;

    let mut observations = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 1;
        let record = result.map_err(|e| CorrnetError::InvalidObservation {
            row,
            reason: format!("CSV parse error: {}", e),
        })?;
        let field = |i: usize, name: &str| {
            record
                .get(cols[i])
                .ok_or_else(|| CorrnetError::InvalidObservation {
                    row,
                    reason: format!("missing {} column", name),
                })
        };

        let asset_id = field(0, "asset_id")?.trim().to_string();
        let day_str = field(1, "day")?;
        let day = parse_date(day_str).ok_or_else(|| CorrnetError::InvalidObservation {
            row,
            reason: format!("invalid day '{}' for asset {}", day_str, asset_id),
        })?;
        let log_return = parse_optional_f64(field(2, "log_return")?).map_err(|reason| {
            CorrnetError::InvalidObservation {
                row,
                reason: format!("{} for asset {} on {}", reason, asset_id, day),
            }
        })?;

        observations.push(DailyObservation {
            asset_id,
            day,
            log_return,
        });
    }

    Ok(observations)
}

/// Parse correlation edge CSV text.
pub fn parse_correlations(content: &str) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| CorrnetError::Database {
            reason: format!("CSV header error: {}", e),
        })?
        .clone();
    let cols = column_positions(
        &headers,
        &[&["month"], &["asset_i"], &["asset_j"], &["corr"]],
    )?;

    let mut edges = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 1;
        let record = result.map_err(|e| CorrnetError::InvalidEdge {
            row,
            reason: format!("CSV parse error: {}", e),
        })?;
        let field = |i: usize| record.get(cols[i]).unwrap_or("");

        let month = parse_date(field(0)).ok_or_else(|| CorrnetError::InvalidEdge {
            row,
            reason: format!("invalid month '{}'", field(0)),
        })?;
        let corr =
            parse_optional_f64(field(3)).map_err(|reason| CorrnetError::InvalidEdge { row, reason })?;

        edges.push(MonthlyCorrelationEdge {
            month,
            asset_i: field(1).trim().to_string(),
            asset_j: field(2).trim().to_string(),
            corr,
        });
    }

    Ok(edges)
}

/// Serialize observations as CSV with a header row. Absent returns are
/// written as empty fields.
pub fn write_observations<W: Write>(
    out: W,
    observations: &[DailyObservation],
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    wtr.write_record(OBSERVATION_HEADER)?;
    for obs in observations {
        wtr.write_record([
            obs.asset_id.clone(),
            obs.day.format("%Y-%m-%d").to_string(),
            format_optional_f64(obs.log_return),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize edges as CSV into `out`, with or without the header row.
pub fn write_correlations<W: Write>(
    out: W,
    edges: &[MonthlyCorrelationEdge],
    with_header: bool,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    if with_header {
        wtr.write_record(CORRELATION_HEADER)?;
    }
    for edge in edges {
        wtr.write_record([
            edge.month.format("%Y-%m-%d").to_string(),
            edge.asset_i.clone(),
            edge.asset_j.clone(),
            format_optional_f64(edge.corr),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize metrics rows as CSV into `out`, with or without the header row.
pub fn write_metrics<W: Write>(
    out: W,
    metrics: &[MonthlyNetworkMetrics],
    with_header: bool,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(out);
    if with_header {
        wtr.write_record(METRICS_HEADER)?;
    }
    for m in metrics {
        wtr.write_record([
            m.month.format("%Y-%m-%d").to_string(),
            m.n_assets.to_string(),
            m.n_edges.to_string(),
            m.density.to_string(),
            m.avg_degree.to_string(),
            m.max_degree.to_string(),
            m.avg_clustering.to_string(),
            m.lcc_size.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

impl CorrelationStore for CsvAdapter {
    fn replace_correlations(&self, edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError> {
        let path = &self.correlations_path;
        write_correlations(create_file(path)?, edges, true).map_err(|e| write_error(path, e))
    }

    fn fetch_correlations(&self) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
        let path = &self.correlations_path;
        let content = fs::read_to_string(path).map_err(|e| read_error(path, e))?;
        parse_correlations(&content).map_err(|e| match e {
            CorrnetError::Database { reason } => read_error(path, reason),
            other => other,
        })
    }
}

impl MetricsStore for CsvAdapter {
    fn replace_metrics(&self, metrics: &[MonthlyNetworkMetrics]) -> Result<(), CorrnetError> {
        let path = &self.metrics_path;
        write_metrics(create_file(path)?, metrics, true).map_err(|e| write_error(path, e))
    }
}

fn create_file(path: &Path) -> Result<fs::File, CorrnetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::File::create(path).map_err(|e| write_error(path, e))
}
