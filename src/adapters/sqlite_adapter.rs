//! SQLite storage adapter.
//!
//! Reads observations from `ohlc_daily` and owns `monthly_correlations` and
//! `temporal_network_metrics`, both dropped and recreated on every write.

use crate::domain::correlation::MonthlyCorrelationEdge;
use crate::domain::error::CorrnetError;
use crate::domain::network::MonthlyNetworkMetrics;
use crate::domain::observation::DailyObservation;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{CorrelationStore, MetricsStore, ObservationSource};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> CorrnetError {
    CorrnetError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            value.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, CorrnetError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| CorrnetError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| CorrnetError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, CorrnetError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| CorrnetError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, CorrnetError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| CorrnetError::Database {
                reason: e.to_string(),
            })
    }

    /// Create the observation table if it does not exist yet.
    pub fn initialize_schema(&self) -> Result<(), CorrnetError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlc_daily (
                    asset_address TEXT NOT NULL,
                    day TEXT NOT NULL,
                    log_return REAL
                );
                CREATE INDEX IF NOT EXISTS idx_ohlc_daily_day ON ohlc_daily(day);",
            )
            .map_err(query_error)
    }

    pub fn insert_observations(&self, observations: &[DailyObservation]) -> Result<(), CorrnetError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for obs in observations {
            tx.execute(
                "INSERT INTO ohlc_daily (asset_address, day, log_return) VALUES (?1, ?2, ?3)",
                params![obs.asset_id, obs.day.format("%Y-%m-%d").to_string(), obs.log_return],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)
    }

    /// Stored metrics rows, ordered by month.
    pub fn fetch_metrics(&self) -> Result<Vec<MonthlyNetworkMetrics>, CorrnetError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT month, n_assets, n_edges, density, avg_degree, max_degree,
                        avg_clustering, lcc_size
                 FROM temporal_network_metrics ORDER BY month ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let month: String = row.get(0)?;
                Ok(MonthlyNetworkMetrics {
                    month: parse_stored_date(&month)?,
                    n_assets: row.get::<_, i64>(1)? as usize,
                    n_edges: row.get::<_, i64>(2)? as usize,
                    density: row.get(3)?,
                    avg_degree: row.get(4)?,
                    max_degree: row.get::<_, i64>(5)? as usize,
                    avg_clustering: row.get(6)?,
                    lcc_size: row.get::<_, i64>(7)? as usize,
                })
            })
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }
}

impl ObservationSource for SqliteAdapter {
    fn fetch_observations(&self) -> Result<Vec<DailyObservation>, CorrnetError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT asset_address, day, log_return FROM ohlc_daily")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let day: String = row.get(1)?;
                Ok(DailyObservation {
                    asset_id: row.get(0)?,
                    day: parse_stored_date(&day)?,
                    log_return: row.get(2)?,
                })
            })
            .map_err(query_error)?;

        let mut observations = Vec::new();
        for (idx, row) in rows.enumerate() {
            observations.push(row.map_err(|e| CorrnetError::InvalidObservation {
                row: idx + 1,
                reason: e.to_string(),
            })?);
        }
        Ok(observations)
    }
}

impl CorrelationStore for SqliteAdapter {
    fn replace_correlations(&self, edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute_batch(
            "DROP TABLE IF EXISTS monthly_correlations;
             CREATE TABLE monthly_correlations (
                month TEXT NOT NULL,
                asset_i TEXT NOT NULL,
                asset_j TEXT NOT NULL,
                corr REAL
             );",
        )
        .map_err(query_error)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO monthly_correlations (month, asset_i, asset_j, corr)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(query_error)?;
            for edge in edges {
                stmt.execute(params![
                    edge.month.format("%Y-%m-%d").to_string(),
                    edge.asset_i,
                    edge.asset_j,
                    edge.corr
                ])
                .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)
    }

    fn fetch_correlations(&self) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT month, asset_i, asset_j, corr FROM monthly_correlations
                 ORDER BY month, asset_i, asset_j",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                let month: String = row.get(0)?;
                Ok(MonthlyCorrelationEdge {
                    month: parse_stored_date(&month)?,
                    asset_i: row.get(1)?,
                    asset_j: row.get(2)?,
                    corr: row.get(3)?,
                })
            })
            .map_err(query_error)?;

        let mut edges = Vec::new();
        for (idx, row) in rows.enumerate() {
            edges.push(row.map_err(|e| CorrnetError::InvalidEdge {
                row: idx + 1,
                reason: e.to_string(),
            })?);
        }
        Ok(edges)
    }
}

impl MetricsStore for SqliteAdapter {
    fn replace_metrics(&self, metrics: &[MonthlyNetworkMetrics]) -> Result<(), CorrnetError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute_batch(
            "DROP TABLE IF EXISTS temporal_network_metrics;
             CREATE TABLE temporal_network_metrics (
                month TEXT PRIMARY KEY,
                n_assets INTEGER,
                n_edges INTEGER,
                density REAL,
                avg_degree REAL,
                max_degree INTEGER,
                avg_clustering REAL,
                lcc_size INTEGER
             );",
        )
        .map_err(query_error)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO temporal_network_metrics (
                        month, n_assets, n_edges, density, avg_degree,
                        max_degree, avg_clustering, lcc_size
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(query_error)?;
            for m in metrics {
                stmt.execute(params![
                    m.month.format("%Y-%m-%d").to_string(),
                    m.n_assets as i64,
                    m.n_edges as i64,
                    m.density,
                    m.avg_degree,
                    m.max_degree as i64,
                    m.avg_clustering,
                    m.lcc_size as i64
                ])
                .map_err(query_error)?;
            }
        }

        tx.commit().map_err(query_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(CorrnetError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn observations_round_trip_with_absent_returns() {
        let adapter = seeded();
        adapter
            .insert_observations(&[
                DailyObservation::new("0xaaa", d(2024, 1, 2), Some(0.01)),
                DailyObservation::new("0xbbb", d(2024, 1, 2), None),
            ])
            .unwrap();

        let mut fetched = adapter.fetch_observations().unwrap();
        fetched.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].asset_id, "0xaaa");
        assert_eq!(fetched[0].log_return, Some(0.01));
        assert_eq!(fetched[1].log_return, None);
    }

    #[test]
    fn unreadable_observation_row_is_invalid_observation() {
        let adapter = seeded();
        adapter
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO ohlc_daily (asset_address, day, log_return) VALUES ('0xaaa', 'not-a-date', 0.1)",
                [],
            )
            .unwrap();

        match adapter.fetch_observations() {
            Err(CorrnetError::InvalidObservation { row, .. }) => assert_eq!(row, 1),
            other => panic!("expected InvalidObservation, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_edge_row_is_invalid_edge() {
        let adapter = seeded();
        adapter.replace_correlations(&[]).unwrap();
        adapter
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO monthly_correlations (month, asset_i, asset_j, corr) VALUES ('2024-01-01', 'A', 'B', 'high')",
                [],
            )
            .unwrap();

        assert!(matches!(
            adapter.fetch_correlations(),
            Err(CorrnetError::InvalidEdge { row: 1, .. })
        ));
    }

    #[test]
    fn replace_correlations_drops_previous_table() {
        let adapter = seeded();
        let edge = MonthlyCorrelationEdge {
            month: d(2024, 1, 1),
            asset_i: "A".into(),
            asset_j: "B".into(),
            corr: Some(0.6),
        };
        adapter
            .replace_correlations(&[edge.clone(), edge.clone()])
            .unwrap();
        assert_eq!(adapter.fetch_correlations().unwrap().len(), 2);

        adapter.replace_correlations(&[edge.clone()]).unwrap();
        assert_eq!(adapter.fetch_correlations().unwrap(), vec![edge]);

        adapter.replace_correlations(&[]).unwrap();
        assert!(adapter.fetch_correlations().unwrap().is_empty());
    }

    #[test]
    fn absent_correlation_stored_as_null() {
        let adapter = seeded();
        let edge = MonthlyCorrelationEdge {
            month: d(2024, 1, 1),
            asset_i: "A".into(),
            asset_j: "B".into(),
            corr: None,
        };
        adapter.replace_correlations(&[edge]).unwrap();
        assert_eq!(adapter.fetch_correlations().unwrap()[0].corr, None);
    }

    #[test]
    fn metrics_replace_and_fetch() {
        let adapter = seeded();
        let row = MonthlyNetworkMetrics {
            month: d(2024, 2, 1),
            n_assets: 4,
            n_edges: 3,
            density: 0.5,
            avg_degree: 1.5,
            max_degree: 3,
            avg_clustering: 0.0,
            lcc_size: 4,
        };
        adapter.replace_metrics(&[row.clone()]).unwrap();
        adapter.replace_metrics(&[row.clone()]).unwrap();
        assert_eq!(adapter.fetch_metrics().unwrap(), vec![row]);
    }
}
