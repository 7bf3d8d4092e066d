//! Charts module - figure rendering to PDF

mod pdf;
mod plotter;

pub use pdf::PdfDocument;
pub use plotter::{BarChart, ChartPlotter, HistogramPanel, RegressionPlot, ScatterPanel};
