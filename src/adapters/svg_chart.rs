//! SVG line charts for the monthly network series.

use crate::domain::error::CorrnetError;
use crate::domain::network::{NetworkReport, SeriesPoint};
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::PathBuf;

pub const DENSITY_CHART_FILE: &str = "network_density_over_time.svg";
pub const AVG_DEGREE_CHART_FILE: &str = "average_degree_over_time.svg";

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 60.0;
const LINE_COLOR: &str = "#2563eb";

pub struct SvgChartAdapter {
    reports_dir: PathBuf,
}

impl SvgChartAdapter {
    pub fn new(reports_dir: PathBuf) -> Self {
        Self { reports_dir }
    }
}

impl ReportPort for SvgChartAdapter {
    fn write_charts(&self, report: &NetworkReport) -> Result<Vec<PathBuf>, CorrnetError> {
        if report.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(&self.reports_dir)?;

        let threshold = report.corr_threshold;
        let charts = [
            (
                DENSITY_CHART_FILE,
                generate_line_svg(
                    &report.density_series(),
                    &format!("Network density over time (|corr| >= {})", threshold),
                    "Network density",
                ),
            ),
            (
                AVG_DEGREE_CHART_FILE,
                generate_line_svg(
                    &report.avg_degree_series(),
                    &format!("Average degree over time (|corr| >= {})", threshold),
                    "Average degree",
                ),
            ),
        ];

        let mut written = Vec::with_capacity(charts.len());
        for (file, svg) in charts {
            let path = self.reports_dir.join(file);
            fs::write(&path, svg)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render `points` as a line chart with a marker per month. Returns an
/// empty string when there is nothing to plot.
pub fn generate_line_svg(points: &[SeriesPoint], title: &str, y_label: &str) -> String {
    if points.is_empty() {
        return String::new();
    }

    let min_value = points
        .iter()
        .map(|p| p.value)
        .fold(f64::INFINITY, f64::min)
        .min(0.0);
    let max_value = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let range = if max_value - min_value > 0.0 {
        max_value - min_value
    } else {
        1.0
    };

    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x_scale = |i: usize| -> f64 {
        if points.len() == 1 {
            MARGIN_LEFT + plot_width / 2.0
        } else {
            MARGIN_LEFT + (i as f64 / (points.len() - 1) as f64) * plot_width
        }
    };
    let y_scale =
        |v: f64| -> f64 { MARGIN_TOP + plot_height - ((v - min_value) / range) * plot_height };

    let mut path_data = String::new();
    let mut markers = String::new();
    for (i, point) in points.iter().enumerate() {
        let x = x_scale(i);
        let y = y_scale(point.value);
        if i == 0 {
            path_data.push_str(&format!("M {:.1} {:.1}", x, y));
        } else {
            path_data.push_str(&format!(" L {:.1} {:.1}", x, y));
        }
        markers.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"3\" fill=\"{}\"><title>{}: {:.4}</title></circle>\n",
            x,
            y,
            LINE_COLOR,
            point.month.format("%Y-%m"),
            point.value
        ));
    }

    let axis_bottom = CHART_HEIGHT - MARGIN_BOTTOM;
    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"22\" text-anchor=\"middle\" font-size=\"14\" fill=\"#111\">{}</text>\n",
        CHART_WIDTH / 2.0,
        escape_xml(title)
    ));
    svg.push_str(&format!(
        "  <text x=\"15\" y=\"{}\" text-anchor=\"middle\" font-size=\"11\" fill=\"#666\" transform=\"rotate(-90 15 {})\">{}</text>\n",
        MARGIN_TOP + plot_height / 2.0,
        MARGIN_TOP + plot_height / 2.0,
        escape_xml(y_label)
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT, MARGIN_TOP, MARGIN_LEFT, axis_bottom
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        axis_bottom,
        CHART_WIDTH - MARGIN_RIGHT,
        axis_bottom
    ));
    for (value, y) in [
        (max_value, MARGIN_TOP + 5.0),
        ((max_value + min_value) / 2.0, MARGIN_TOP + plot_height / 2.0),
        (min_value, axis_bottom - 5.0),
    ] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{:.3}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            value
        ));
    }

    // Month labels, rotated like a dense x axis.
    let label_step = (points.len() / 12).max(1);
    for (i, point) in points.iter().enumerate() {
        if i % label_step != 0 && i != points.len() - 1 {
            continue;
        }
        let x = x_scale(i);
        let y = axis_bottom + 15.0;
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\" transform=\"rotate(-45 {:.1} {:.1})\">{}</text>\n",
            x,
            y,
            x,
            y,
            point.month.format("%Y-%m")
        ));
    }

    svg.push_str(&format!(
        "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>\n",
        path_data, LINE_COLOR
    ));
    svg.push_str(&markers);
    svg.push_str("</svg>");
    svg
}
