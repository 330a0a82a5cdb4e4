use std::path::Path;

use chrono::{Datelike, NaiveDate};
use tracing::info;

use crate::error::Result;
use crate::types::{BenchmarkIndex, CumulativeIndex};

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 360.0;
const PADDING: f64 = 40.0;
const PORTFOLIO_COLOR: &str = "#d62728";
const BENCHMARK_COLOR: &str = "#1f77b4";

struct Line<'a> {
    label: String,
    color: &'static str,
    dash: bool,
    points: &'a [(NaiveDate, f64)],
}

/// SVG line chart of the portfolio against the benchmark. A synthetic
/// benchmark is drawn dashed and labelled as such.
pub fn render_chart(portfolio: &CumulativeIndex, benchmark: &BenchmarkIndex) -> String {
    let lines = [
        Line {
            label: "Portfolio".to_string(),
            color: PORTFOLIO_COLOR,
            dash: false,
            points: portfolio.points(),
        },
        Line {
            label: benchmark.label(),
            color: BENCHMARK_COLOR,
            dash: benchmark.source.is_synthetic(),
            points: benchmark.index.points(),
        },
    ];

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#555}}</style>"#,
        w = WIDTH,
        h = HEIGHT
    );
    svg.push_str(&format!(
        r#"<text x="{x:.2}" y="20" text-anchor="middle" font-size="13">Performance comparison</text>"#,
        x = WIDTH / 2.0
    ));

    let all = lines.iter().flat_map(|l| l.points.iter());
    let (first, last, min_v, max_v) = match extent(all) {
        Some(extent) => extent,
        None => {
            svg.push_str("</svg>");
            return svg;
        }
    };

    let x_of = |date: NaiveDate| {
        let span = (last - first).num_days().max(1) as f64;
        PADDING + (date - first).num_days() as f64 / span * (WIDTH - 2.0 * PADDING)
    };
    let y_of = |value: f64| {
        let span = (max_v - min_v).max(1e-9);
        HEIGHT - PADDING - (value - min_v) / span * (HEIGHT - 2.0 * PADDING)
    };

    // growth of one unit: 1.0 is break-even
    if (min_v..=max_v).contains(&1.0) {
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#bbbbbb" stroke-width="1" stroke-dasharray="4 3" />"##,
            x1 = PADDING,
            x2 = WIDTH - PADDING,
            y = y_of(1.0)
        ));
    }

    add_value_axis(&mut svg, min_v, max_v, &y_of);
    add_time_axis(&mut svg, first, last, &x_of);

    for line in &lines {
        if line.points.is_empty() {
            continue;
        }
        let coords = line
            .points
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(d, v)| format!("{:.2},{:.2}", x_of(*d), y_of(*v)))
            .collect::<Vec<_>>()
            .join(" ");
        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="1.6" stroke-dasharray="{dash}" points="{coords}" />"#,
            color = line.color,
            dash = if line.dash { "5 3" } else { "0" },
            coords = coords
        ));
    }

    for (i, line) in lines.iter().enumerate() {
        let y = PADDING + 4.0 + i as f64 * 14.0;
        svg.push_str(&format!(
            r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="2" stroke-dasharray="{dash}" />"#,
            x1 = PADDING + 8.0,
            x2 = PADDING + 26.0,
            y = y,
            color = line.color,
            dash = if line.dash { "5 3" } else { "0" }
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}">{label}</text>"#,
            x = PADDING + 30.0,
            y = y + 3.5,
            label = escape(&line.label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn write_chart(path: &Path, svg: &str) -> Result<()> {
    std::fs::write(path, svg)?;
    info!("chart written to {}", path.display());
    Ok(())
}

fn extent<'a, I>(points: I) -> Option<(NaiveDate, NaiveDate, f64, f64)>
where
    I: Iterator<Item = &'a (NaiveDate, f64)>,
{
    points
        .filter(|(_, v)| v.is_finite())
        .fold(None, |acc, (d, v)| match acc {
            None => Some((*d, *d, *v, *v)),
            Some((first, last, lo, hi)) => {
                Some(((*d).min(first), (*d).max(last), v.min(lo), v.max(hi)))
            }
        })
}

fn add_time_axis<F>(svg: &mut String, first: NaiveDate, last: NaiveDate, x_of: &F)
where
    F: Fn(NaiveDate) -> f64,
{
    let axis_y = HEIGHT - PADDING;
    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#000" stroke-width="1" />"##,
        x1 = PADDING,
        x2 = WIDTH - PADDING,
        y = axis_y
    ));

    let months = (last.year() - first.year()) * 12 + last.month() as i32 - first.month() as i32;
    // at most about twelve labels
    let step = (months / 12 + 1).max(1) as u32;
    let mut tick = NaiveDate::from_ymd_opt(first.year(), first.month(), 1);
    let mut n = 0;
    while let Some(date) = tick {
        if date > last {
            break;
        }
        if date >= first && n % step == 0 {
            let x = x_of(date);
            svg.push_str(&format!(
                r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="#e5e5e5" stroke-width="0.5" />"##,
                x = x,
                y1 = PADDING,
                y2 = axis_y
            ));
            svg.push_str(&format!(
                r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
                x = x,
                y = axis_y + 16.0,
                label = date.format("%Y-%m")
            ));
        }
        n += 1;
        tick = next_month(date);
    }
}

fn add_value_axis<F: Fn(f64) -> f64>(svg: &mut String, min_v: f64, max_v: f64, y_of: &F) {
    for i in 0..=4 {
        let value = min_v + (max_v - min_v) * i as f64 / 4.0;
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{value:.2}</text>"#,
            x = PADDING - 4.0,
            y = y_of(value) + 3.0,
            value = value
        ));
    }
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
