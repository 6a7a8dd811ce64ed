//! Monthly pairwise correlation edge lists.
//!
//! Observations are bucketed by calendar month into a sparse
//! asset -> (day -> return) mapping. Assets with fewer than
//! `min_days_per_asset` valid returns in a month are dropped; months left
//! with fewer than two assets emit nothing. Every surviving ordered pair
//! (i, j), i != j, becomes one edge carrying the Pearson correlation over
//! the days both assets have values.

use crate::domain::error::CorrnetError;
use crate::domain::observation::{is_month_start, validate_observations, DailyObservation};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Tolerance applied when checking that an ingested correlation lies in [-1, 1].
const CORR_BOUND_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCorrelationEdge {
    pub month: NaiveDate,
    pub asset_i: String,
    pub asset_j: String,
    /// `None` when the pair has fewer than two overlapping days or either
    /// side has zero variance over the overlap.
    pub corr: Option<f64>,
}

/// Per-asset return series within one month, keyed by day.
type MonthSeries = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

/// Build the edge list for every month present in `observations`.
///
/// Edges come out ordered by month, then `asset_i`, then `asset_j`.
pub fn build_monthly_correlations(
    observations: &[DailyObservation],
    min_days_per_asset: usize,
) -> Result<Vec<MonthlyCorrelationEdge>, CorrnetError> {
    validate_observations(observations)?;

    let months = group_by_month(observations);
    let mut edges = Vec::new();

    for (month, series) in &months {
        let month_edges = correlate_month(*month, series, min_days_per_asset);
        if month_edges.is_empty() {
            tracing::debug!(%month, assets = series.len(), "skipping month: fewer than 2 eligible assets");
            continue;
        }
        edges.extend(month_edges);
    }

    tracing::info!(
        months = months.len(),
        edges = edges.len(),
        min_days_per_asset,
        "built monthly correlations"
    );
    Ok(edges)
}

fn group_by_month(observations: &[DailyObservation]) -> BTreeMap<NaiveDate, MonthSeries> {
    let mut months: BTreeMap<NaiveDate, MonthSeries> = BTreeMap::new();
    for obs in observations {
        let series = months
            .entry(obs.month())
            .or_default()
            .entry(obs.asset_id.clone())
            .or_default();
        if let Some(r) = obs.log_return {
            series.insert(obs.day, r);
        }
    }
    months
}

fn correlate_month(
    month: NaiveDate,
    series: &MonthSeries,
    min_days_per_asset: usize,
) -> Vec<MonthlyCorrelationEdge> {
    let eligible: Vec<(&String, &BTreeMap<NaiveDate, f64>)> = series
        .iter()
        .filter(|(_, days)| days.len() >= min_days_per_asset)
        .collect();

    if eligible.len() < 2 {
        return Vec::new();
    }

    let n = eligible.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let corr = pairwise_correlation(eligible[i].1, eligible[j].1);
            matrix[i][j] = corr;
            matrix[j][i] = corr;
        }
    }

    let mut edges = Vec::with_capacity(n * (n - 1));
    for (i, (asset_i, _)) in eligible.iter().enumerate() {
        for (j, (asset_j, _)) in eligible.iter().enumerate() {
            if i == j {
                continue;
            }
            edges.push(MonthlyCorrelationEdge {
                month,
                asset_i: (*asset_i).clone(),
                asset_j: (*asset_j).clone(),
                corr: matrix[i][j],
            });
        }
    }
    edges
}

/// Pearson correlation over the days present in both series.
fn pairwise_correlation(
    a: &BTreeMap<NaiveDate, f64>,
    b: &BTreeMap<NaiveDate, f64>,
) -> Option<f64> {
    let (small, large, swapped) = if a.len() <= b.len() {
        (a, b, false)
    } else {
        (b, a, true)
    };

    let mut xs = Vec::with_capacity(small.len());
    let mut ys = Vec::with_capacity(small.len());
    for (day, &v) in small {
        if let Some(&w) = large.get(day) {
            if swapped {
                xs.push(w);
                ys.push(v);
            } else {
                xs.push(v);
                ys.push(w);
            }
        }
    }

    pearson(&xs, &ys)
}

/// Sample Pearson correlation of two equal-length slices.
///
/// Returns `None` for fewer than two points, mismatched lengths, or a
/// constant series.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    if is_constant(x) || is_constant(y) {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().map(|v| v / n).sum::<f64>();
    let mean_y = y.iter().map(|v| v / n).sum::<f64>();

    // Deviations are scaled to at most 1 in magnitude so the squared sums
    // stay finite for large inputs; r is invariant to the scaling.
    let scale_x = max_abs_deviation(x, mean_x);
    let scale_y = max_abs_deviation(y, mean_y);
    if scale_x == 0.0 || scale_y == 0.0 || !scale_x.is_finite() || !scale_y.is_finite() {
        return None;
    }

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = (xi - mean_x) / scale_x;
        let dy = (yi - mean_y) / scale_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = var_x.sqrt() * var_y.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

fn max_abs_deviation(values: &[f64], mean: f64) -> f64 {
    values
        .iter()
        .map(|v| (v - mean).abs())
        .fold(0.0, f64::max)
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Rejects edge rows the network stage cannot interpret: blank asset ids,
/// self-edges, months not on the first of the month, and correlations that
/// are non-finite or outside [-1, 1].
pub fn validate_edges(edges: &[MonthlyCorrelationEdge]) -> Result<(), CorrnetError> {
    for (idx, edge) in edges.iter().enumerate() {
        let row = idx + 1;
        if edge.asset_i.trim().is_empty() || edge.asset_j.trim().is_empty() {
            return Err(CorrnetError::InvalidEdge {
                row,
                reason: "empty asset id".into(),
            });
        }
        if edge.asset_i == edge.asset_j {
            return Err(CorrnetError::InvalidEdge {
                row,
                reason: format!("self-edge on asset {}", edge.asset_i),
            });
        }
        if !is_month_start(edge.month) {
            return Err(CorrnetError::InvalidEdge {
                row,
                reason: format!("month {} is not the first day of a month", edge.month),
            });
        }
        if let Some(c) = edge.corr {
            if !c.is_finite() || c.abs() > 1.0 + CORR_BOUND_TOLERANCE {
                return Err(CorrnetError::InvalidEdge {
                    row,
                    reason: format!("correlation {} outside [-1, 1]", c),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(asset: &str, month: u32, values: &[f64]) -> Vec<DailyObservation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| DailyObservation::new(asset, d(2024, month, i as u32 + 1), Some(v)))
            .collect()
    }

    #[test]
    fn pearson_perfect_positive() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_perfect_negative() {
        let x = [1.0, 2.0, 3.0];
        let y = [3.0, 2.0, 1.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_known_value() {
        // cov = 8, var_x = 10, var_y = 10 => r = 0.8
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn pearson_undefined_cases() {
        assert_eq!(pearson(&[1.0], &[2.0]), None);
        assert_eq!(pearson(&[1.0, 2.0], &[1.0]), None);
        assert_eq!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]), None);
    }

    #[test]
    fn pairwise_uses_only_overlapping_days() {
        let mut a = BTreeMap::new();
        let mut b = BTreeMap::new();
        a.insert(d(2024, 1, 1), 1.0);
        a.insert(d(2024, 1, 2), 2.0);
        a.insert(d(2024, 1, 3), 3.0);
        a.insert(d(2024, 1, 4), 100.0);
        b.insert(d(2024, 1, 1), 10.0);
        b.insert(d(2024, 1, 2), 20.0);
        b.insert(d(2024, 1, 3), 30.0);
        b.insert(d(2024, 1, 5), -7.0);
        assert_relative_eq!(pairwise_correlation(&a, &b).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pairwise_correlation(&b, &a).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pairwise_single_overlap_is_absent() {
        let mut a = BTreeMap::new();
        let mut b = BTreeMap::new();
        a.insert(d(2024, 1, 1), 1.0);
        a.insert(d(2024, 1, 2), 2.0);
        b.insert(d(2024, 1, 2), 5.0);
        b.insert(d(2024, 1, 3), 6.0);
        assert_eq!(pairwise_correlation(&a, &b), None);
    }

    #[test]
    fn two_assets_emit_both_directions() {
        let mut obs = series("A", 1, &[0.1, 0.2, 0.3]);
        obs.extend(series("B", 1, &[0.3, 0.1, 0.2]));
        let edges = build_monthly_correlations(&obs, 3).unwrap();

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].asset_i, "A");
        assert_eq!(edges[0].asset_j, "B");
        assert_eq!(edges[1].asset_i, "B");
        assert_eq!(edges[1].asset_j, "A");
        assert_eq!(edges[0].corr, edges[1].corr);
        assert_eq!(edges[0].month, d(2024, 1, 1));
    }

    #[test]
    fn month_with_one_eligible_asset_is_skipped() {
        let a: Vec<f64> = (0..15).map(|i| i as f64 * 0.01).collect();
        let mut obs = series("A", 1, &a);
        obs.extend(series("B", 1, &[0.1, 0.2, 0.3]));
        let edges = build_monthly_correlations(&obs, 10).unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn absent_returns_do_not_count_toward_min_days() {
        let mut obs = series("A", 1, &[0.1, 0.2, 0.3]);
        obs.extend(series("B", 1, &[0.3, 0.1, 0.2]));
        obs.push(DailyObservation::new("B", d(2024, 1, 20), None));
        obs.push(DailyObservation::new("A", d(2024, 1, 20), None));

        assert_eq!(build_monthly_correlations(&obs, 3).unwrap().len(), 2);
        assert!(build_monthly_correlations(&obs, 4).unwrap().is_empty());
    }

    #[test]
    fn zero_variance_asset_yields_absent_corr() {
        let mut obs = series("A", 1, &[0.1, 0.2, 0.3]);
        obs.extend(series("FLAT", 1, &[0.0, 0.0, 0.0]));
        let edges = build_monthly_correlations(&obs, 3).unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.corr.is_none()));
    }

    #[test]
    fn months_are_independent_and_ordered() {
        let mut obs = series("B", 2, &[0.1, 0.2, 0.4]);
        obs.extend(series("A", 2, &[0.2, 0.4, 0.8]));
        obs.extend(series("A", 1, &[0.1, 0.2, 0.3]));
        obs.extend(series("C", 1, &[0.3, 0.2, 0.1]));
        let edges = build_monthly_correlations(&obs, 3).unwrap();

        let keys: Vec<(NaiveDate, &str, &str)> = edges
            .iter()
            .map(|e| (e.month, e.asset_i.as_str(), e.asset_j.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d(2024, 1, 1), "A", "C"),
                (d(2024, 1, 1), "C", "A"),
                (d(2024, 2, 1), "A", "B"),
                (d(2024, 2, 1), "B", "A"),
            ]
        );
        assert_relative_eq!(edges[0].corr.unwrap(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(edges[2].corr.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(build_monthly_correlations(&[], 10).unwrap().is_empty());
    }

    #[test]
    fn duplicate_rows_abort_the_build() {
        let mut obs = series("A", 1, &[0.1, 0.2]);
        obs.push(DailyObservation::new("A", d(2024, 1, 1), Some(0.5)));
        assert!(matches!(
            build_monthly_correlations(&obs, 1),
            Err(CorrnetError::DuplicateObservation { .. })
        ));
    }

    #[test]
    fn validate_edges_rejects_bad_rows() {
        let good = MonthlyCorrelationEdge {
            month: d(2024, 1, 1),
            asset_i: "A".into(),
            asset_j: "B".into(),
            corr: Some(0.4),
        };
        assert!(validate_edges(std::slice::from_ref(&good)).is_ok());

        let self_edge = MonthlyCorrelationEdge {
            asset_j: "A".into(),
            ..good.clone()
        };
        assert!(matches!(
            validate_edges(&[good.clone(), self_edge]),
            Err(CorrnetError::InvalidEdge { row: 2, .. })
        ));

        let mid_month = MonthlyCorrelationEdge {
            month: d(2024, 1, 15),
            ..good.clone()
        };
        assert!(validate_edges(&[mid_month]).is_err());

        let out_of_range = MonthlyCorrelationEdge {
            corr: Some(1.5),
            ..good.clone()
        };
        assert!(validate_edges(&[out_of_range]).is_err());

        let blank_i = MonthlyCorrelationEdge {
            asset_i: "".into(),
            ..good.clone()
        };
        assert!(matches!(
            validate_edges(&[good.clone(), blank_i]),
            Err(CorrnetError::InvalidEdge { row: 2, .. })
        ));
        let blank_j = MonthlyCorrelationEdge {
            asset_j: "  ".into(),
            ..good.clone()
        };
        assert!(validate_edges(&[blank_j]).is_err());

        let absent = MonthlyCorrelationEdge { corr: None, ..good };
        assert!(validate_edges(&[absent]).is_ok());
    }

    #[test]
    fn pearson_handles_large_magnitudes() {
        let r = pearson(&[1e160, 2e160, 3e160], &[2e160, 4e160, 6e160]);
        assert_relative_eq!(r.unwrap(), 1.0, epsilon = 1e-12);
        let r = pearson(&[1e160, 2e160, 3e160], &[-1e160, -2e160, -3e160]);
        assert_relative_eq!(r.unwrap(), -1.0, epsilon = 1e-12);
        let r = pearson(&[1e-200, 2e-200, 3e-200], &[3e-200, 2e-200, 1e-200]);
        assert_relative_eq!(r.unwrap(), -1.0, epsilon = 1e-12);
    }
}
