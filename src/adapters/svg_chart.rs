//! SVG line-chart renderer.

use std::fs;
use std::path::Path;

use crate::domain::error::YieldtraderError;
use crate::domain::performance::ChartData;
use crate::ports::chart_port::ChartPort;

const CHART_WIDTH: f64 = 900.0;
const CHART_HEIGHT: f64 = 450.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 80.0;
const LEGEND_ROW: f64 = 16.0;

const PALETTE: [&str; 6] = [
    "#2563eb", "#dc2626", "#16a34a", "#d97706", "#7c3aed", "#0891b2",
];

pub struct SvgChartAdapter;

impl ChartPort for SvgChartAdapter {
    fn render(&self, chart: &ChartData, output_path: &Path) -> Result<(), YieldtraderError> {
        let svg = generate_svg(chart)?;
        fs::write(output_path, svg).map_err(|e| YieldtraderError::Render {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })?;
        tracing::info!(path = %output_path.display(), "chart written");
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn fmt_value(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// One `<path>` per series sharing a single y-axis. NaN values break the
/// line instead of being drawn.
pub fn generate_svg(chart: &ChartData) -> Result<String, YieldtraderError> {
    if chart.dates.is_empty() {
        return Err(YieldtraderError::Render {
            reason: "chart has no dates".into(),
        });
    }
    if !chart.is_aligned() {
        return Err(YieldtraderError::Render {
            reason: "series length does not match dates".into(),
        });
    }

    let finite = || {
        chart
            .series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .filter(|v| v.is_finite())
    };
    let min = finite().fold(f64::INFINITY, f64::min);
    let max = finite().fold(f64::NEG_INFINITY, f64::max);
    let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 1.0) };
    let range = (max - min).max(f64::EPSILON);

    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let n = chart.dates.len();

    let x_scale =
        |i: usize| -> f64 { MARGIN_LEFT + (i as f64 / (n - 1).max(1) as f64) * plot_width };
    let y_scale = |v: f64| -> f64 { MARGIN_TOP + plot_height - ((v - min) / range) * plot_height };

    let mut svg = String::new();
    svg.push_str(&format!(
        r##"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"##,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));
    svg.push_str("\n  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    svg.push_str(&format!(
        "  <text x=\"{}\" y=\"22\" text-anchor=\"middle\" font-size=\"15\" fill=\"#111\">{}</text>\n",
        CHART_WIDTH / 2.0,
        escape(&chart.title)
    ));
    if !chart.subtitle.is_empty() {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"42\" text-anchor=\"middle\" font-size=\"11\" fill=\"#666\">{}</text>\n",
            CHART_WIDTH / 2.0,
            escape(&chart.subtitle)
        ));
    }

    // axes
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    svg.push_str(&format!(
        "  <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"#ccc\" stroke-width=\"1\"/>\n",
        MARGIN_LEFT,
        CHART_HEIGHT - MARGIN_BOTTOM,
        CHART_WIDTH - MARGIN_RIGHT,
        CHART_HEIGHT - MARGIN_BOTTOM
    ));
    for (value, y) in [
        (max, MARGIN_TOP + 5.0),
        ((max + min) / 2.0, MARGIN_TOP + plot_height / 2.0),
        (min, CHART_HEIGHT - MARGIN_BOTTOM - 5.0),
    ] {
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" text-anchor=\"end\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            MARGIN_LEFT - 5.0,
            y,
            fmt_value(value)
        ));
    }

    let date_y = CHART_HEIGHT - MARGIN_BOTTOM + 15.0;
    for i in [0, n / 2, n - 1] {
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{}\" text-anchor=\"middle\" font-size=\"10\" fill=\"#666\">{}</text>\n",
            x_scale(i),
            date_y,
            escape(&chart.dates[i])
        ));
        if n == 1 {
            break;
        }
    }

    for (idx, series) in chart.series.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];

        let mut path_data = String::new();
        let mut pen_down = false;
        for (i, &v) in series.values.iter().enumerate() {
            if !v.is_finite() {
                pen_down = false;
                continue;
            }
            let cmd = if pen_down { " L" } else { " M" };
            path_data.push_str(&format!("{} {:.1} {:.1}", cmd, x_scale(i), y_scale(v)));
            pen_down = true;
        }
        if !path_data.is_empty() {
            svg.push_str(&format!(
                "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"/>\n",
                path_data.trim_start(),
                color
            ));
        }

        let legend_y = date_y + 15.0 + idx as f64 * LEGEND_ROW;
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"10\" height=\"10\" fill=\"{}\"/>\n",
            MARGIN_LEFT,
            legend_y - 9.0,
            color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"11\" fill=\"#333\">{}</text>\n",
            MARGIN_LEFT + 15.0,
            legend_y,
            escape(&series.label)
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}
