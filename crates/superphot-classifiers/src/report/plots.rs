use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use plotly::common::{ColorScale, ColorScalePalette};
use plotly::layout::{Axis, Layout};
use plotly::{HeatMap, Plot};

use crate::evaluation::ConfusionReport;

/// Heatmap of a normalised confusion matrix. Axis labels carry the number of
/// objects behind each true and predicted class.
pub fn plot_confusion_matrix(report: &ConfusionReport) -> Plot {
    let classes = report.matrix.classes();
    let rows = report.matrix.row_totals();
    let cols = report.matrix.column_totals();

    let predicted: Vec<String> = classes
        .iter()
        .zip(&cols)
        .map(|(c, n)| format!("{} ({})", c, n))
        .collect();
    let truth: Vec<String> = classes
        .iter()
        .zip(&rows)
        .map(|(c, n)| format!("{} ({})", c, n))
        .collect();
    // plotly draws the first row at the bottom; reverse so the diagonal runs
    // top-left to bottom-right
    let z: Vec<Vec<f64>> = report.normalized.rows().rev().map(|r| r.to_vec()).collect();
    let truth: Vec<String> = truth.into_iter().rev().collect();

    let trace = HeatMap::new(predicted, truth, z)
        .color_scale(ColorScale::Palette(ColorScalePalette::Blues));

    let layout = Layout::new()
        .title(report.title().as_str())
        .x_axis(Axis::new().title("Predicted Label"))
        .y_axis(Axis::new().title("True Label"));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

/// Write the confusion matrix heatmap as a standalone HTML page.
pub fn write_confusion_matrix<P: AsRef<Path>>(report: &ConfusionReport, path: P) -> Result<()> {
    let html = plot_confusion_matrix(report).to_html();
    std::fs::write(&path, html).with_context(|| {
        format!(
            "Failed to write confusion matrix to {}",
            path.as_ref().display()
        )
    })?;
    info!("Confusion matrix saved to {}", path.as_ref().display());
    Ok(())
}
