//! Monthly correlation networks and their summary metrics.

use crate::domain::correlation::{validate_edges, MonthlyCorrelationEdge};
use crate::domain::error::CorrnetError;
use crate::domain::graph::Graph;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which assets become graph nodes for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeUniverse {
    /// Every asset appearing in the month's correlation edge list, so assets
    /// with no surviving edge still count as isolated nodes.
    #[default]
    Correlated,
    /// Only assets incident to at least one surviving edge.
    Edges,
}

impl FromStr for NodeUniverse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correlated" => Ok(Self::Correlated),
            "edges" => Ok(Self::Edges),
            other => Err(format!(
                "unknown node universe '{other}' (expected 'correlated' or 'edges')"
            )),
        }
    }
}

impl fmt::Display for NodeUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correlated => write!(f, "correlated"),
            Self::Edges => write!(f, "edges"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyNetworkMetrics {
    pub month: NaiveDate,
    pub n_assets: usize,
    pub n_edges: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub max_degree: usize,
    pub avg_clustering: f64,
    pub lcc_size: usize,
}

impl MonthlyNetworkMetrics {
    pub fn from_graph(month: NaiveDate, graph: &Graph) -> Self {
        let n_assets = graph.node_count();
        let degrees: Vec<usize> = graph.nodes().map(|n| graph.degree(n)).collect();
        let avg_degree = if degrees.is_empty() {
            0.0
        } else {
            degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
        };

        Self {
            month,
            n_assets,
            n_edges: graph.edge_count(),
            density: graph.density(),
            avg_degree,
            max_degree: degrees.iter().copied().max().unwrap_or(0),
            avg_clustering: graph.average_clustering(),
            lcc_size: graph.largest_component_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub month: NaiveDate,
    pub value: f64,
}

/// Metrics rows sorted by month, plus the threshold they were built with.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkReport {
    pub corr_threshold: f64,
    pub metrics: Vec<MonthlyNetworkMetrics>,
}

impl NetworkReport {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn density_series(&self) -> Vec<SeriesPoint> {
        self.series(|m| m.density)
    }

    pub fn avg_degree_series(&self) -> Vec<SeriesPoint> {
        self.series(|m| m.avg_degree)
    }

    fn series(&self, value: impl Fn(&MonthlyNetworkMetrics) -> f64) -> Vec<SeriesPoint> {
        self.metrics
            .iter()
            .map(|m| SeriesPoint {
                month: m.month,
                value: value(m),
            })
            .collect()
    }
}

/// Threshold each month's correlations into a graph and summarise it.
///
/// Absent correlations never form edges. Months where no edge reaches
/// `|corr| >= corr_threshold` produce no row.
pub fn build_network_metrics(
    edges: &[MonthlyCorrelationEdge],
    corr_threshold: f64,
    universe: NodeUniverse,
) -> Result<NetworkReport, CorrnetError> {
    validate_edges(edges)?;

    let mut by_month: BTreeMap<NaiveDate, Vec<&MonthlyCorrelationEdge>> = BTreeMap::new();
    for edge in edges {
        by_month.entry(edge.month).or_default().push(edge);
    }

    let mut metrics = Vec::new();
    for (month, month_edges) in &by_month {
        match build_month_graph(month_edges, corr_threshold, universe) {
            Some(graph) => metrics.push(MonthlyNetworkMetrics::from_graph(*month, &graph)),
            None => {
                tracing::debug!(%month, corr_threshold, "skipping month: no edge above threshold");
            }
        }
    }
    metrics.sort_by_key(|m| m.month);

    tracing::info!(
        months = by_month.len(),
        rows = metrics.len(),
        corr_threshold,
        %universe,
        "built network metrics"
    );
    Ok(NetworkReport {
        corr_threshold,
        metrics,
    })
}

fn build_month_graph(
    edges: &[&MonthlyCorrelationEdge],
    corr_threshold: f64,
    universe: NodeUniverse,
) -> Option<Graph> {
    let surviving: Vec<&MonthlyCorrelationEdge> = edges
        .iter()
        .copied()
        .filter(|e| e.corr.is_some_and(|c| c.abs() >= corr_threshold))
        .collect();
    if surviving.is_empty() {
        return None;
    }

    let mut graph = Graph::new();
    if universe == NodeUniverse::Correlated {
        for e in edges {
            graph.add_node(&e.asset_i);
            graph.add_node(&e.asset_j);
        }
    }
    for e in surviving {
        graph.add_edge(&e.asset_i, &e.asset_j);
    }

    if graph.node_count() == 0 {
        return None;
    }
    Some(graph)
}
