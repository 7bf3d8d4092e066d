//! Chart Plotter Module
//! Builds the dissertation figures on any plotters drawing area.
//!
//! Figures:
//! 1. Regression scatter with fitted line, 95% band and an r/p box
//! 2. Row of scatter panels (device vs reference heart rate)
//! 3. Row of histogram panels (counts or percentages)
//! 4. Bar chart with value labels and a dashed trend line

use crate::stats::LinearFit;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use thiserror::Error;

/// Errors that can occur during figure generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to draw chart: {0}")]
    Drawing(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

type Result<T> = core::result::Result<T, PlotError>;

fn draw_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Scatter / regression colour (matplotlib C0)
pub const POINT_COLOR: RGBColor = RGBColor(31, 119, 180);
/// Bar fill colour
pub const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);
const GRID_COLOR: RGBColor = RGBColor(225, 225, 225);
const LIGHT_GRID_COLOR: RGBColor = RGBColor(242, 242, 242);

/// Scatter plot of `y` against `x` with a least-squares line.
pub struct RegressionPlot<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub x: &'a [f64],
    pub y: &'a [f64],
    /// Shared axis range of both axes.
    pub range: (f64, f64),
    /// Lines shown in the annotation box.
    pub annotation: Vec<String>,
    /// Data coordinate of the annotation box's top-left corner.
    pub annotation_at: (f64, f64),
}

/// One panel of a scatter row.
pub struct ScatterPanel {
    pub title: String,
    pub subtitle: String,
    pub points: Vec<(f64, f64)>,
}

/// One panel of a histogram row. Bars are `(left edge, right edge, height)`.
pub struct HistogramPanel {
    pub title: String,
    pub bars: Vec<(f64, f64, f64)>,
}

/// Bar chart of yearly values.
pub struct BarChart<'a> {
    pub title: &'a str,
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub years: &'a [i32],
    pub values: &'a [f64],
    /// Whole-number data: integer labels on bars and y ticks.
    pub integer_values: bool,
}

/// Creates the figures used in the reports.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Draw a regression scatter with a 95% confidence band.
    pub fn draw_regression<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        plot: &RegressionPlot,
    ) -> Result<()> {
        if plot.x.len() != plot.y.len() || plot.x.is_empty() {
            return Err(PlotError::InvalidData(
                "x and y must be non-empty and of equal length".to_string(),
            ));
        }

        area.fill(&WHITE).map_err(draw_err)?;

        let (lo, hi) = plot.range;
        let mut chart = ChartBuilder::on(area)
            .caption(plot.title, ("sans-serif", 18))
            .margin(20)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(lo..hi, lo..hi)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_desc(plot.x_label)
            .y_desc(plot.y_label)
            .axis_desc_style(("sans-serif", 13))
            .bold_line_style(GRID_COLOR)
            .light_line_style(LIGHT_GRID_COLOR)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(
                plot.x
                    .iter()
                    .zip(plot.y)
                    .map(|(&x, &y)| Circle::new((x, y), 4, POINT_COLOR.mix(0.7).filled())),
            )
            .map_err(draw_err)?;

        if let Some(fit) = LinearFit::fit(plot.x, plot.y) {
            let x_min = plot.x.iter().copied().fold(f64::INFINITY, f64::min);
            let x_max = plot.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let steps = 100;
            let xs: Vec<f64> = (0..=steps)
                .map(|i| x_min + (x_max - x_min) * i as f64 / steps as f64)
                .collect();

            let band: Vec<(f64, f64, f64)> = xs
                .iter()
                .filter_map(|&x| fit.confidence_band(x, 0.95).map(|(l, u)| (x, l, u)))
                .collect();
            if !band.is_empty() {
                let mut outline: Vec<(f64, f64)> = band.iter().map(|&(x, _, u)| (x, u)).collect();
                outline.extend(band.iter().rev().map(|&(x, l, _)| (x, l)));
                chart
                    .draw_series(std::iter::once(Polygon::new(outline, RED.mix(0.15))))
                    .map_err(draw_err)?;
            }

            chart
                .draw_series(LineSeries::new(
                    xs.iter().map(|&x| (x, fit.predict(x))),
                    RED.stroke_width(2),
                ))
                .map_err(draw_err)?;
        }

        if !plot.annotation.is_empty() {
            let line_h = 17;
            let width = plot
                .annotation
                .iter()
                .map(|l| l.chars().count() as i32 * 7)
                .max()
                .unwrap_or(0)
                + 16;
            let height = line_h * plot.annotation.len() as i32 + 10;

            let corner = plot.annotation_at;
            chart
                .draw_series(std::iter::once(
                    EmptyElement::at(corner)
                        + Rectangle::new([(0, 0), (width, height)], WHITE.filled())
                        + Rectangle::new([(0, 0), (width, height)], RGBColor(128, 128, 128)),
                ))
                .map_err(draw_err)?;
            chart
                .draw_series(plot.annotation.iter().enumerate().map(|(i, line)| {
                    EmptyElement::at(corner)
                        + Text::new(
                            line.clone(),
                            (8, 6 + line_h * i as i32),
                            ("sans-serif", 13).into_font(),
                        )
                }))
                .map_err(draw_err)?;
        }

        area.present().map_err(draw_err)?;
        Ok(())
    }

    /// Draw scatter panels side by side on a shared 40-180 bpm scale.
    pub fn draw_scatter_row<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        panels: &[ScatterPanel],
        x_label: &str,
        y_label: &str,
    ) -> Result<()> {
        if panels.is_empty() {
            return Err(PlotError::InvalidData("no panels to draw".to_string()));
        }

        area.fill(&WHITE).map_err(draw_err)?;
        let cells = area.split_evenly((1, panels.len()));

        for (i, (cell, panel)) in cells.iter().zip(panels).enumerate() {
            let cell = cell
                .titled(&panel.title, ("sans-serif", 12))
                .map_err(draw_err)?;
            let mut chart = ChartBuilder::on(&cell)
                .caption(&panel.subtitle, ("sans-serif", 11))
                .margin(6)
                .x_label_area_size(34)
                .y_label_area_size(if i == 0 { 44 } else { 30 })
                .build_cartesian_2d(40f64..180f64, 40f64..180f64)
                .map_err(draw_err)?;

            let mut mesh = chart.configure_mesh();
            mesh.x_desc(x_label)
                .x_labels(5)
                .y_labels(5)
                .label_style(("sans-serif", 9))
                .axis_desc_style(("sans-serif", 10))
                .disable_mesh();
            if i == 0 {
                mesh.y_desc(y_label);
            }
            mesh.draw().map_err(draw_err)?;

            chart
                .draw_series(
                    panel
                        .points
                        .iter()
                        .filter(|(x, y)| (40.0..=180.0).contains(x) && (40.0..=180.0).contains(y))
                        .map(|&p| Circle::new(p, 1, POINT_COLOR.mix(0.4).filled())),
                )
                .map_err(draw_err)?;
        }

        area.present().map_err(draw_err)?;
        Ok(())
    }

    /// Draw histogram panels side by side. `y_max` fixes the y limit, otherwise it follows the data.
    pub fn draw_histogram_row<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        panels: &[HistogramPanel],
        x_label: &str,
        y_label: &str,
        y_max: Option<f64>,
    ) -> Result<()> {
        if panels.is_empty() {
            return Err(PlotError::InvalidData("no panels to draw".to_string()));
        }

        area.fill(&WHITE).map_err(draw_err)?;
        let cells = area.split_evenly((1, panels.len()));

        for (i, (cell, panel)) in cells.iter().zip(panels).enumerate() {
            let x_min = panel.bars.first().map(|b| b.0).unwrap_or(0.0);
            let x_max = panel.bars.last().map(|b| b.1).unwrap_or(1.0);
            let top = y_max.unwrap_or_else(|| {
                let highest = panel.bars.iter().map(|b| b.2).fold(0.0, f64::max);
                if highest > 0.0 {
                    highest * 1.05
                } else {
                    1.0
                }
            });

            let mut chart = ChartBuilder::on(cell)
                .caption(&panel.title, ("sans-serif", 12))
                .margin(6)
                .x_label_area_size(34)
                .y_label_area_size(if i == 0 { 52 } else { 40 })
                .build_cartesian_2d(x_min..x_max, 0f64..top)
                .map_err(draw_err)?;

            let count_formatter = |v: &f64| format!("{:.0}", v);
            let mut mesh = chart.configure_mesh();
            mesh.x_desc(x_label)
                .x_labels(5)
                .y_labels(5)
                .y_label_formatter(&count_formatter)
                .label_style(("sans-serif", 9))
                .axis_desc_style(("sans-serif", 10))
                .disable_mesh();
            if i == 0 {
                mesh.y_desc(y_label);
            }
            mesh.draw().map_err(draw_err)?;

            chart
                .draw_series(panel.bars.iter().map(|&(l, r, h)| {
                    Rectangle::new([(l, 0.0), (r, h.min(top))], POINT_COLOR.filled())
                }))
                .map_err(draw_err)?;
            chart
                .draw_series(
                    panel
                        .bars
                        .iter()
                        .map(|&(l, r, h)| Rectangle::new([(l, 0.0), (r, h.min(top))], WHITE)),
                )
                .map_err(draw_err)?;
        }

        area.present().map_err(draw_err)?;
        Ok(())
    }

    /// Draw yearly bars with value labels and a dashed least-squares trend line.
    pub fn draw_bar_chart<DB: DrawingBackend>(
        area: &DrawingArea<DB, Shift>,
        bars: &BarChart,
    ) -> Result<()> {
        if bars.years.len() != bars.values.len() || bars.years.is_empty() {
            return Err(PlotError::InvalidData(
                "years and values must be non-empty and of equal length".to_string(),
            ));
        }

        area.fill(&WHITE).map_err(draw_err)?;

        let first = bars.years.iter().copied().min().unwrap_or(0) as f64;
        let last = bars.years.iter().copied().max().unwrap_or(0) as f64;
        let highest = bars.values.iter().copied().fold(0.0, f64::max);
        let top = if highest > 0.0 { highest * 1.15 } else { 1.0 };

        let mut chart = ChartBuilder::on(area)
            .caption(bars.title, ("sans-serif", 16))
            .margin(20)
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d((first - 0.6)..(last + 0.6), 0f64..top)
            .map_err(draw_err)?;

        let integer = bars.integer_values;
        let y_formatter = move |v: &f64| {
            if integer {
                format!("{:.0}", v)
            } else {
                format!("{:.1}", v)
            }
        };
        chart
            .configure_mesh()
            .x_desc(bars.x_label)
            .y_desc(bars.y_label)
            .axis_desc_style(("sans-serif", 12))
            .x_labels(bars.years.len() + 2)
            .x_label_formatter(&|v| format!("{:.0}", v))
            .y_label_formatter(&y_formatter)
            .disable_x_mesh()
            .bold_line_style(GRID_COLOR)
            .light_line_style(TRANSPARENT)
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(bars.years.iter().zip(bars.values).map(|(&year, &v)| {
                let x = year as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], BAR_COLOR.filled())
            }))
            .map_err(draw_err)?;
        chart
            .draw_series(bars.years.iter().zip(bars.values).map(|(&year, &v)| {
                let x = year as f64;
                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], BLACK)
            }))
            .map_err(draw_err)?;

        let label_style = TextStyle::from(("sans-serif", 11).into_font())
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        chart
            .draw_series(bars.years.iter().zip(bars.values).map(|(&year, &v)| {
                let label = if integer {
                    format!("{}", v.round() as i64)
                } else {
                    format!("{:.1}", v)
                };
                EmptyElement::at((year as f64, v)) + Text::new(label, (0, -3), label_style.clone())
            }))
            .map_err(draw_err)?;

        let xs: Vec<f64> = bars.years.iter().map(|&y| y as f64).collect();
        if let Some(fit) = LinearFit::fit(&xs, bars.values) {
            let segments = Self::dash_segments(first, last, 0.18, 0.12);
            chart
                .draw_series(segments.into_iter().map(|(a, b)| {
                    PathElement::new(vec![(a, fit.predict(a)), (b, fit.predict(b))], RED.stroke_width(2))
                }))
                .map_err(draw_err)?
                .label("Trend Line")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .label_font(("sans-serif", 12))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(draw_err)?;
        }

        area.present().map_err(draw_err)?;
        Ok(())
    }

    /// Split `[start, end]` into dashes of length `dash` separated by `gap`.
    fn dash_segments(start: f64, end: f64, dash: f64, gap: f64) -> Vec<(f64, f64)> {
        let mut segments = Vec::new();
        let mut x = start;
        while x < end {
            segments.push((x, (x + dash).min(end)));
            x += dash + gap;
        }
        segments
    }
}
