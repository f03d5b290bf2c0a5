//! SVG price chart written to `{chart_dir}/{instrument}_{timestamp}.svg`.
//!
//! Close price over the whole window, with the EMA pair and the Bollinger
//! envelope drawn wherever indicators are defined.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::domain::error::TechSignalError;
use crate::domain::ohlcv::Bar;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::ports::chart_port::ChartPort;

const WIDTH: f64 = 900.0;
const HEIGHT: f64 = 400.0;
const PADDING: f64 = 40.0;

pub struct SvgChartAdapter {
    dir: PathBuf,
}

impl SvgChartAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

struct Scale {
    min: f64,
    scale_x: f64,
    scale_y: f64,
}

impl Scale {
    fn new(len: usize, min: f64, max: f64) -> Self {
        let plot_width = WIDTH - 2.0 * PADDING;
        let plot_height = HEIGHT - 2.0 * PADDING;
        let range = max - min;
        Self {
            min,
            scale_x: if len > 1 {
                plot_width / (len - 1) as f64
            } else {
                0.0
            },
            scale_y: if range > 0.0 { plot_height / range } else { 1.0 },
        }
    }

    fn point(&self, i: usize, value: f64) -> (f64, f64) {
        (
            PADDING + i as f64 * self.scale_x,
            HEIGHT - PADDING - (value - self.min) * self.scale_y,
        )
    }
}

fn polyline(scale: &Scale, values: &[Option<f64>], color: &str, dashed: bool) -> String {
    let points: Vec<String> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| scale.point(i, v)))
        .map(|(x, y)| format!("{:.1},{:.1}", x, y))
        .collect();
    if points.is_empty() {
        return String::new();
    }
    let dash = if dashed {
        r#" stroke-dasharray="4 3""#
    } else {
        ""
    };
    format!(
        r#"  <polyline fill="none" stroke="{}" stroke-width="1"{} points="{}"/>
"#,
        color,
        dash,
        points.join(" ")
    )
}

pub fn render_svg(instrument: &str, bars: &[Bar], snapshots: &[Option<IndicatorSnapshot>]) -> String {
    let series = |f: fn(&IndicatorSnapshot) -> f64| -> Vec<Option<f64>> {
        (0..bars.len())
            .map(|i| snapshots.get(i).and_then(Option::as_ref).map(f))
            .collect()
    };
    let close: Vec<Option<f64>> = bars.iter().map(|b| Some(b.close)).collect();
    let ema_fast = series(|s| s.ema_fast);
    let ema_slow = series(|s| s.ema_slow);
    let bb_upper = series(|s| s.bb_upper);
    let bb_lower = series(|s| s.bb_lower);

    let all = [&close, &ema_fast, &ema_slow, &bb_upper, &bb_lower];
    let values = all.iter().flat_map(|s| s.iter().flatten().copied());
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let scale = Scale::new(bars.len(), min, max);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}">
  <rect width="100%" height="100%" fill="white"/>
  <text x="{p:.0}" y="{t:.0}" font-family="sans-serif" font-size="14">{name}</text>
  <line x1="{p:.0}" y1="{p:.0}" x2="{p:.0}" y2="{b:.0}" stroke="black"/>
  <line x1="{p:.0}" y1="{b:.0}" x2="{r:.0}" y2="{b:.0}" stroke="black"/>
"#,
        w = WIDTH,
        h = HEIGHT,
        p = PADDING,
        t = PADDING - 15.0,
        b = HEIGHT - PADDING,
        r = WIDTH - PADDING,
        name = instrument,
    );
    svg.push_str(&polyline(&scale, &bb_upper, "gray", true));
    svg.push_str(&polyline(&scale, &bb_lower, "gray", true));
    svg.push_str(&polyline(&scale, &ema_slow, "red", false));
    svg.push_str(&polyline(&scale, &ema_fast, "orange", false));
    svg.push_str(&polyline(&scale, &close, "blue", false));

    if let Some(last) = bars.last() {
        let (x, y) = scale.point(bars.len() - 1, last.close);
        svg.push_str(&format!(
            r#"  <circle cx="{:.1}" cy="{:.1}" r="3" fill="blue"/>
  <text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="11">{:.2}</text>
"#,
            x,
            y,
            x - 30.0,
            y - 8.0,
            last.close
        ));
    }
    svg.push_str("</svg>\n");
    svg
}

impl ChartPort for SvgChartAdapter {
    fn render(
        &self,
        instrument: &str,
        bars: &[Bar],
        snapshots: &[Option<IndicatorSnapshot>],
    ) -> Result<String, TechSignalError> {
        let Some(last) = bars.last() else {
            return Err(TechSignalError::Chart {
                reason: format!("no bars to chart for {}", instrument),
            });
        };
        let chart_error = |e: std::io::Error| TechSignalError::Chart {
            reason: e.to_string(),
        };
        fs::create_dir_all(&self.dir).map_err(chart_error)?;
        let path = self.dir.join(format!(
            "{}_{}.svg",
            instrument,
            last.timestamp.format("%Y%m%d_%H%M%S")
        ));
        fs::write(&path, render_svg(instrument, bars, snapshots)).map_err(chart_error)?;
        debug!(instrument, path = %path.display(), "chart written");
        Ok(path.display().to_string())
    }
}
