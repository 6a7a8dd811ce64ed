//! PostgreSQL storage adapter.
//!
//! Same tables as the SQLite adapter. Output tables are dropped, recreated
//! and bulk-loaded with `COPY ... FROM STDIN WITH (FORMAT csv)` inside one
//! transaction.

use crate::adapters::csv_adapter::{write_correlations, write_metrics};
use crate::domain::correlation::MonthlyCorrelationEdge;
use crate::domain::error::CorrnetError;
use crate::domain::network::MonthlyNetworkMetrics;
use crate::domain::observation::DailyObservation;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{CorrelationStore, MetricsStore, ObservationSource};
use chrono::NaiveDate;
use postgres::types::FromSql;
use postgres::{Client, Config, NoTls, Row};
use std::cell::RefCell;
use std::io::Write;

pub struct PostgresAdapter {
    client: RefCell<Client>,
}

fn db_error(e: postgres::Error) -> CorrnetError {
    CorrnetError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Parse `connection_string`, filling in `env_password` when the string
/// carries no password of its own.
fn connection_config(
    connection_string: &str,
    env_password: Option<String>,
) -> Result<Config, CorrnetError> {
    let mut pg_config: Config =
        connection_string
            .parse()
            .map_err(|e: postgres::Error| CorrnetError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;
    if pg_config.get_password().is_none() {
        if let Some(password) = env_password {
            pg_config.password(password);
        }
    }
    Ok(pg_config)
}

/// Read column `idx` of `row`, reporting NULLs and type mismatches through
/// `on_error` instead of panicking.
fn column<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    on_error: impl FnOnce(String) -> CorrnetError,
) -> Result<T, CorrnetError> {
    row.try_get(idx).map_err(|e| on_error(e.to_string()))
}

fn encode_error(e: csv::Error) -> CorrnetError {
    CorrnetError::Database {
        reason: format!("failed to encode COPY buffer: {}", e),
    }
}

impl PostgresAdapter {
    /// Connects using `[postgres] connection_string`. The password is left to
    /// libpq conventions (`PGPASSWORD`) and never read from the config file.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CorrnetError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| CorrnetError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let pg_config =
            connection_config(&connection_string, std::env::var("PGPASSWORD").ok())?;
        let client = pg_config
            .connect(NoTls)
            .map_err(|e| CorrnetError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    fn copy_in(&self, ddl: &str, copy_sql: &str, buffer: &[u8]) -> Result<(), CorrnetError> {
        let mut client = self.client.borrow_mut();
        let mut tx = client.transaction().map_err(db_error)?;
        tx.batch_execute(ddl).map_err(db_error)?;

        if !buffer.is_empty() {
            let mut writer = tx.copy_in(copy_sql).map_err(db_error)?;
            writer.write_all(buffer)?;
            writer.finish().map_err(db_error)?;
        }

        tx.commit().map_err(db_error)
    }
}

impl ObservationSource for PostgresAdapter {
    fn fetch_observations(&self) -> Result<Vec<DailyObservation>, CorrnetError> {
        let rows = self
            .client
            .borrow_mut()
            .query(
                "SELECT asset_address::text, day::date, log_return::double precision \
                 FROM ohlc_daily",
                &[],
            )
            .map_err(db_error)?;

        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                let invalid = |reason: String| CorrnetError::InvalidObservation {
                    row: idx + 1,
                    reason,
                };
                Ok(DailyObservation {
                    asset_id: column(row, 0, invalid)?,
                    day: column::<NaiveDate>(row, 1, invalid)?,
                    log_return: column(row, 2, invalid)?,
                })
            })
            .collect()
    }
}

impl CorrelationStore for PostgresAdapter {
    fn replace_correlations(&self, edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError> {
        let mut buffer = Vec::new();
        write_correlations(&mut buffer, edges, false).map_err(encode_error)?;

        self.copy_in(
            "DROP TABLE IF EXISTS monthly_correlations;
             CREATE TABLE monthly_correlations (
                 month      DATE NOT NULL,
                 asset_i    TEXT NOT NULL,
                 asset_j    TEXT NOT NULL,
                 corr       DOUBLE PRECISION
             );",
            "COPY monthly_correlations (month, asset_i, asset_j, corr) \
             FROM STDIN WITH (FORMAT csv)",
            &buffer,
        )
    }

    fn fetch_correlations(&self) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
        let rows = self
            .client
            .borrow_mut()
            .query(
                "SELECT month, asset_i, asset_j, corr FROM monthly_correlations \
                 ORDER BY month, asset_i, asset_j",
                &[],
            )
            .map_err(db_error)?;

        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                let invalid = |reason: String| CorrnetError::InvalidEdge {
                    row: idx + 1,
                    reason,
                };
                Ok(MonthlyCorrelationEdge {
                    month: column(row, 0, invalid)?,
                    asset_i: column(row, 1, invalid)?,
                    asset_j: column(row, 2, invalid)?,
                    corr: column(row, 3, invalid)?,
                })
            })
            .collect()
    }
}

impl MetricsStore for PostgresAdapter {
    fn replace_metrics(&self, metrics: &[MonthlyNetworkMetrics]) -> Result<(), CorrnetError> {
        let mut buffer = Vec::new();
        write_metrics(&mut buffer, metrics, false).map_err(encode_error)?;

        self.copy_in(
            "DROP TABLE IF EXISTS temporal_network_metrics;
             CREATE TABLE temporal_network_metrics (
                 month          DATE PRIMARY KEY,
                 n_assets       INTEGER,
                 n_edges        INTEGER,
                 density        DOUBLE PRECISION,
                 avg_degree     DOUBLE PRECISION,
                 max_degree     INTEGER,
                 avg_clustering DOUBLE PRECISION,
                 lcc_size       INTEGER
             );",
            "COPY temporal_network_metrics (month, n_assets, n_edges, density, avg_degree, \
             max_degree, avg_clustering, lcc_size) FROM STDIN WITH (FORMAT csv)",
            &buffer,
        )
    }
}
