//! Chart output port trait.

use crate::domain::error::CorrnetError;
use crate::domain::network::NetworkReport;
use std::path::PathBuf;

/// Port for rendering the density and average-degree time series.
pub trait ReportPort {
    /// Write one chart per series and return the paths written. An empty
    /// report writes nothing.
    fn write_charts(&self, report: &NetworkReport) -> Result<Vec<PathBuf>, CorrnetError>;
}
