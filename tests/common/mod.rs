#![allow(dead_code)]

use chrono::NaiveDate;
use corrnet::domain::correlation::MonthlyCorrelationEdge;
use corrnet::domain::error::CorrnetError;
use corrnet::domain::network::{MonthlyNetworkMetrics, NetworkReport};
pub use corrnet::domain::observation::DailyObservation;
use corrnet::ports::data_port::{CorrelationStore, MetricsStore, ObservationSource};
use corrnet::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::path::PathBuf;

/// In-memory stand-in for all three pipeline tables.
pub struct MemoryStorage {
    pub observations: Vec<DailyObservation>,
    pub correlations: RefCell<Vec<MonthlyCorrelationEdge>>,
    pub metrics: RefCell<Vec<MonthlyNetworkMetrics>>,
    pub replace_calls: RefCell<usize>,
    pub fetch_error: Option<String>,
}

impl MemoryStorage {
    pub fn new(observations: Vec<DailyObservation>) -> Self {
        Self {
            observations,
            correlations: RefCell::new(Vec::new()),
            metrics: RefCell::new(Vec::new()),
            replace_calls: RefCell::new(0),
            fetch_error: None,
        }
    }

    pub fn with_correlations(self, edges: Vec<MonthlyCorrelationEdge>) -> Self {
        *self.correlations.borrow_mut() = edges;
        self
    }

    pub fn with_fetch_error(mut self, reason: &str) -> Self {
        self.fetch_error = Some(reason.to_string());
        self
    }

    pub fn edges(&self) -> Vec<MonthlyCorrelationEdge> {
        self.correlations.borrow().clone()
    }

    pub fn metric_rows(&self) -> Vec<MonthlyNetworkMetrics> {
        self.metrics.borrow().clone()
    }
}

impl ObservationSource for MemoryStorage {
    fn fetch_observations(&self) -> Result<Vec<DailyObservation>, CorrnetError> {
        if let Some(reason) = &self.fetch_error {
            return Err(CorrnetError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.observations.clone())
    }
}

impl CorrelationStore for MemoryStorage {
    fn replace_correlations(&self, edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError> {
        *self.replace_calls.borrow_mut() += 1;
        *self.correlations.borrow_mut() = edges.to_vec();
        Ok(())
    }

    fn fetch_correlations(&self) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
        Ok(self.correlations.borrow().clone())
    }
}

impl MetricsStore for MemoryStorage {
    fn replace_metrics(&self, metrics: &[MonthlyNetworkMetrics]) -> Result<(), CorrnetError> {
        *self.metrics.borrow_mut() = metrics.to_vec();
        Ok(())
    }
}

/// Records every report it is asked to chart.
pub struct MockChartPort {
    pub calls: RefCell<Vec<NetworkReport>>,
}

impl MockChartPort {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ReportPort for MockChartPort {
    fn write_charts(&self, report: &NetworkReport) -> Result<Vec<PathBuf>, CorrnetError> {
        self.calls.borrow_mut().push(report.clone());
        if report.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![PathBuf::from("charts/density.svg")])
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn obs(asset: &str, day: NaiveDate, log_return: f64) -> DailyObservation {
    DailyObservation::new(asset, day, Some(log_return))
}

/// One asset's returns on consecutive days of `month` starting at day 1.
pub fn series(asset: &str, year: i32, month: u32, returns: &[f64]) -> Vec<DailyObservation> {
    returns
        .iter()
        .enumerate()
        .map(|(i, &r)| obs(asset, date(year, month, i as u32 + 1), r))
        .collect()
}

/// January 2024, 15 days each: X and Y move together exactly, Z is a
/// symmetric parabola with zero correlation to both.
pub fn xyz_observations() -> Vec<DailyObservation> {
    let centred: Vec<f64> = (0..15).map(|i| i as f64 - 7.0).collect();
    let x: Vec<f64> = centred.iter().map(|c| 0.001 * c).collect();
    let y: Vec<f64> = centred.iter().map(|c| 0.002 * c + 0.0005).collect();
    let z: Vec<f64> = centred.iter().map(|c| 0.0001 * c * c).collect();

    let mut all = series("X", 2024, 1, &x);
    all.extend(series("Y", 2024, 1, &y));
    all.extend(series("Z", 2024, 1, &z));
    all
}

pub fn edge(month: NaiveDate, a: &str, b: &str, corr: Option<f64>) -> MonthlyCorrelationEdge {
    MonthlyCorrelationEdge {
        month,
        asset_i: a.to_string(),
        asset_j: b.to_string(),
        corr,
    }
}

/// Both directions of the pair `a`/`b`.
pub fn edge_pair(month: NaiveDate, a: &str, b: &str, corr: Option<f64>) -> Vec<MonthlyCorrelationEdge> {
    vec![edge(month, a, b, corr), edge(month, b, a, corr)]
}
