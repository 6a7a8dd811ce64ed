//! Storage port traits for the three pipeline tables.

use crate::domain::correlation::MonthlyCorrelationEdge;
use crate::domain::error::CorrnetError;
use crate::domain::network::MonthlyNetworkMetrics;
use crate::domain::observation::DailyObservation;

/// Source of daily log-return observations, in no particular order.
pub trait ObservationSource {
    fn fetch_observations(&self) -> Result<Vec<DailyObservation>, CorrnetError>;
}

/// Storage for the monthly correlation edge list.
pub trait CorrelationStore {
    /// Drop any previously stored edges and store `edges` in their place.
    fn replace_correlations(&self, edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError>;

    fn fetch_correlations(&self) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError>;
}

/// Sink for the per-month network metrics table.
pub trait MetricsStore {
    /// Drop any previously stored rows and store `metrics` in their place.
    fn replace_metrics(&self, metrics: &[MonthlyNetworkMetrics]) -> Result<(), CorrnetError>;
}
