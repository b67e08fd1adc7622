//! Visualization tool: validates chart parameters against the dataset
//! schema and renders one of five chart kinds to a PNG file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Result};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use serde::Deserialize;
use tracing::{info, warn};

use super::{Tool, FAILURE_MARKER};
use crate::dataset::{ColumnValues, DataFrame};

const CHART_WIDTH: u32 = 1280;
const CHART_HEIGHT: u32 = 720;
const HISTOGRAM_BINS: usize = 30;
const MULTI_HISTOGRAM_CAP: usize = 30;
const BOXPLOT_AUTO_COLUMNS: usize = 5;
const BAR_TOP_GROUPS: usize = 20;

const TEAL: RGBColor = RGBColor(0, 128, 128);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const ORANGE: RGBColor = RGBColor(255, 140, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Histogram,
    MultiHistogram,
    Scatter,
    Boxplot,
    Bar,
}

pub struct VizTool {
    df: Arc<DataFrame>,
    output_dir: PathBuf,
}

impl VizTool {
    pub fn new(df: Arc<DataFrame>, output_dir: PathBuf) -> Self {
        Self { df, output_dir }
    }

    /// Render a chart. Returns the image path on success, a
    /// `[FAILURE]`-marked string on any validation or render error. The
    /// drawing canvas is scoped to this call and released on every exit
    /// path; there is no shared figure state between calls.
    pub fn render(&self, kind: ChartKind, columns: &[String], title: Option<&str>) -> String {
        let title = title.unwrap_or("Data Visualization");
        match self.try_render(kind, columns, title) {
            Ok(path) => {
                info!(path = %path.display(), ?kind, "chart rendered");
                path.display().to_string()
            }
            Err(e) => format!("{FAILURE_MARKER} {e}"),
        }
    }

    fn try_render(&self, kind: ChartKind, columns: &[String], title: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let path = self.output_dir.join(format!("visualization_{ts}.png"));

        match kind {
            ChartKind::Histogram => self.draw_histogram(&path, columns, title)?,
            ChartKind::MultiHistogram => self.draw_multi_histogram(&path, columns, title)?,
            ChartKind::Scatter => self.draw_scatter(&path, columns, title)?,
            ChartKind::Boxplot => self.draw_boxplot(&path, columns, title)?,
            ChartKind::Bar => self.draw_bar(&path, columns, title)?,
        }
        Ok(path)
    }

    /// True when the column exists, is numeric and holds at least one
    /// value. A numeric column of only nulls cannot be plotted.
    fn plottable(&self, name: &str) -> bool {
        self.df
            .column(name)
            .is_some_and(|c| c.is_numeric() && !c.numeric_values().is_empty())
    }

    /// Non-null numeric values of a named column, or a descriptive error.
    fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let col = self
            .df
            .column(name)
            .ok_or_else(|| anyhow!("column '{name}' does not exist in the dataset"))?;
        if !col.is_numeric() {
            bail!("column '{name}' is not numeric");
        }
        let values = col.numeric_values();
        if values.is_empty() {
            bail!("column '{name}' has no numeric values");
        }
        Ok(values)
    }

    fn draw_histogram(&self, path: &Path, columns: &[String], title: &str) -> Result<()> {
        let Some(name) = columns.first() else {
            bail!("a histogram requires one column to be specified");
        };
        let values = self.numeric_column(name)?;

        let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        draw_histogram_on(&root, &values, title, name, "Count")?;
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_multi_histogram(&self, path: &Path, columns: &[String], title: &str) -> Result<()> {
        let mut targets: Vec<String> = if columns.is_empty() {
            self.df
                .numeric_column_names()
                .into_iter()
                .filter(|c| self.plottable(c))
                .map(String::from)
                .collect()
        } else {
            columns
                .iter()
                .filter(|c| {
                    let ok = self.plottable(c);
                    if !ok {
                        warn!(column = %c, "skipping unusable column for multi-histogram");
                    }
                    ok
                })
                .cloned()
                .collect()
        };
        if targets.len() > MULTI_HISTOGRAM_CAP {
            warn!(
                requested = targets.len(),
                cap = MULTI_HISTOGRAM_CAP,
                "limiting the number of histograms"
            );
            targets.truncate(MULTI_HISTOGRAM_CAP);
        }
        if targets.is_empty() {
            bail!("No valid numeric columns were found for the histograms");
        }

        let cols = targets.len().min(3);
        let rows = targets.len().div_ceil(cols);

        let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let (title_area, grid_area) = root.split_vertically(40);
        title_area
            .titled(title, ("sans-serif", 24))
            .map_err(draw_err)?;
        let panels = grid_area.split_evenly((rows, cols));
        for (name, panel) in targets.iter().zip(panels.iter()) {
            let values = self.numeric_column(name)?;
            draw_histogram_on(panel, &values, name, "", "")?;
        }
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_scatter(&self, path: &Path, columns: &[String], title: &str) -> Result<()> {
        let (Some(x_name), Some(y_name)) = (columns.first(), columns.get(1)) else {
            bail!("a scatter plot requires two columns (x axis and y axis)");
        };
        let xs = self.numeric_column(x_name)?;
        let ys = self.numeric_column(y_name)?;
        let points: Vec<(f64, f64)> = paired_rows(&self.df, x_name, y_name);
        if points.is_empty() {
            bail!("columns '{x_name}' and '{y_name}' share no complete rows");
        }
        let (x_min, x_max) = padded_range(&xs);
        let (y_min, y_max) = padded_range(&ys);

        let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .x_desc(x_name.as_str())
            .y_desc(y_name.as_str())
            .draw()
            .map_err(draw_err)?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, PURPLE.mix(0.6).filled())),
            )
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_boxplot(&self, path: &Path, columns: &[String], title: &str) -> Result<()> {
        let targets: Vec<String> = if columns.is_empty() {
            self.df
                .numeric_column_names()
                .into_iter()
                .filter(|c| self.plottable(c))
                .take(BOXPLOT_AUTO_COLUMNS)
                .map(String::from)
                .collect()
        } else {
            columns
                .iter()
                .filter(|c| {
                    let ok = self.plottable(c);
                    if !ok {
                        warn!(column = %c, "skipping unusable column for boxplot");
                    }
                    ok
                })
                .cloned()
                .collect()
        };
        if targets.is_empty() {
            bail!("No valid numeric columns were provided or found for the boxplot");
        }

        let series: Vec<(String, Vec<f64>)> = targets
            .iter()
            .map(|name| Ok((name.clone(), self.numeric_column(name)?)))
            .collect::<Result<_>>()?;
        let all: Vec<f64> = series.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        let (y_min, y_max) = padded_range(&all);
        let n = series.len();
        let labels: Vec<String> = series.iter().map(|(name, _)| name.clone()).collect();

        let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..n as f64, y_min..y_max)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|x| {
                labels
                    .get(x.floor() as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .y_desc("Value distribution")
            .draw()
            .map_err(draw_err)?;
        for (i, (_, values)) in series.iter().enumerate() {
            draw_box_and_whiskers(&mut chart, i as f64 + 0.5, values)?;
        }
        root.present().map_err(draw_err)?;
        Ok(())
    }

    fn draw_bar(&self, path: &Path, columns: &[String], title: &str) -> Result<()> {
        let (Some(cat_name), Some(val_name)) = (columns.first(), columns.get(1)) else {
            bail!("a bar chart requires two columns (a category and a value)");
        };
        if self.df.column(cat_name).is_none() {
            bail!("column '{cat_name}' does not exist in the dataset");
        }
        self.numeric_column(val_name)?;

        // sum per category, keep the largest groups only
        let mut groups = sum_by_category(&self.df, cat_name, val_name);
        groups.truncate(BAR_TOP_GROUPS);
        if groups.is_empty() {
            bail!("columns '{cat_name}' and '{val_name}' share no complete rows");
        }
        let max_sum = groups.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);
        let y_max = if max_sum <= 0.0 { 1.0 } else { max_sum * 1.05 };
        let n = groups.len();

        let root = BitMapBackend::new(path, (CHART_WIDTH, CHART_HEIGHT)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let labels: Vec<String> = groups.iter().map(|(k, _)| k.clone()).collect();
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..n as f64, 0f64..y_max)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|x| {
                labels
                    .get(x.floor() as usize)
                    .cloned()
                    .unwrap_or_default()
            })
            .x_desc(cat_name.as_str())
            .y_desc(format!("Sum of {val_name}"))
            .draw()
            .map_err(draw_err)?;
        chart
            .draw_series(groups.iter().enumerate().map(|(i, (_, v))| {
                Rectangle::new(
                    [(i as f64 + 0.15, 0.0), (i as f64 + 0.85, *v)],
                    ORANGE.filled(),
                )
            }))
            .map_err(draw_err)?;
        root.present().map_err(draw_err)?;
        Ok(())
    }
}

impl Tool for VizTool {
    fn name(&self) -> &str {
        "generate_visualization"
    }

    fn description(&self) -> &str {
        "Creates a chart from the loaded dataset and saves it as a PNG image. Supported chart \
         kinds: histogram (one column), multi_histogram (zero or more numeric columns), scatter \
         (x and y columns), boxplot (zero or more numeric columns), bar (category and value \
         columns). Returns the image file path."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "chart_kind": {
                    "type": "string",
                    "enum": ["histogram", "multi_histogram", "scatter", "boxplot", "bar"],
                    "description": "Which chart to draw."
                },
                "columns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Dataset columns to plot, in order."
                },
                "title": {
                    "type": "string",
                    "description": "Chart title. A default is used when omitted."
                }
            },
            "required": ["chart_kind", "columns"]
        })
    }

    fn invoke(&self, args_json: &str) -> String {
        #[derive(Deserialize)]
        struct Args {
            chart_kind: ChartKind,
            #[serde(default)]
            columns: Vec<String>,
            #[serde(default)]
            title: Option<String>,
        }
        match serde_json::from_str::<Args>(args_json) {
            Ok(args) => self.render(args.chart_kind, &args.columns, args.title.as_deref()),
            Err(e) => format!("{FAILURE_MARKER} invalid tool arguments: {e}"),
        }
    }
}

/// One box-and-whiskers glyph centered on `x`, from our quartile helpers.
/// Whiskers reach the farthest points within 1.5 IQR of the box.
fn draw_box_and_whiskers(
    chart: &mut ChartContext<BitMapBackend, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    x: f64,
    values: &[f64],
) -> Result<()> {
    use crate::dataset::stats;

    let q1 = stats::quantile(values, 0.25).unwrap_or(0.0);
    let q2 = stats::quantile(values, 0.5).unwrap_or(0.0);
    let q3 = stats::quantile(values, 0.75).unwrap_or(0.0);
    let iqr = q3 - q1;
    let lo = values
        .iter()
        .copied()
        .filter(|v| *v >= q1 - 1.5 * iqr)
        .fold(f64::INFINITY, f64::min);
    let hi = values
        .iter()
        .copied()
        .filter(|v| *v <= q3 + 1.5 * iqr)
        .fold(f64::NEG_INFINITY, f64::max);
    let half = 0.3;

    let box_style = TEAL.mix(0.4).filled();
    let line = TEAL.stroke_width(2);
    chart
        .draw_series([Rectangle::new([(x - half, q1), (x + half, q3)], box_style)])
        .map_err(draw_err)?;
    chart
        .draw_series([
            PathElement::new(vec![(x - half, q2), (x + half, q2)], line.clone()),
            PathElement::new(vec![(x, q3), (x, hi)], line.clone()),
            PathElement::new(vec![(x, lo), (x, q1)], line.clone()),
            PathElement::new(vec![(x - half / 2.0, hi), (x + half / 2.0, hi)], line.clone()),
            PathElement::new(vec![(x - half / 2.0, lo), (x + half / 2.0, lo)], line),
        ])
        .map_err(draw_err)?;
    Ok(())
}

fn draw_histogram_on(
    area: &DrawingArea<BitMapBackend, plotters::coord::Shift>,
    values: &[f64],
    caption: &str,
    x_desc: &str,
    y_desc: &str,
) -> Result<()> {
    let (min, max) = padded_range(values);
    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &v in values {
        let mut bin = ((v - min) / width) as usize;
        if bin >= HISTOGRAM_BINS {
            bin = HISTOGRAM_BINS - 1;
        }
        counts[bin] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(1).max(1) as f64 * 1.05;

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(8)
        .x_label_area_size(35)
        .y_label_area_size(45)
        .build_cartesian_2d(min..max, 0f64..y_max)
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(draw_err)?;
    chart
        .draw_series(counts.iter().enumerate().map(|(i, &c)| {
            let x0 = min + i as f64 * width;
            Rectangle::new([(x0, 0.0), (x0 + width, c as f64)], TEAL.mix(0.7).filled())
        }))
        .map_err(draw_err)?;
    Ok(())
}

/// Rows where both columns hold a value, as (x, y) pairs. Reads the
/// numeric storage directly so values keep their full precision.
fn paired_rows(df: &DataFrame, x_name: &str, y_name: &str) -> Vec<(f64, f64)> {
    let (Some(x_col), Some(y_col)) = (df.column(x_name), df.column(y_name)) else {
        return Vec::new();
    };
    let (ColumnValues::Numeric(xs), ColumnValues::Numeric(ys)) = (&x_col.values, &y_col.values)
    else {
        return Vec::new();
    };
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

/// Sums of the value column grouped by category, sorted descending.
fn sum_by_category(df: &DataFrame, cat_name: &str, val_name: &str) -> Vec<(String, f64)> {
    let (Some(cat), Some(val)) = (df.column(cat_name), df.column(val_name)) else {
        return Vec::new();
    };
    let ColumnValues::Numeric(values) = &val.values else {
        return Vec::new();
    };
    let mut sums: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    for (row, v) in values.iter().enumerate() {
        let (Some(key), Some(v)) = (cat.cell(row), *v) else {
            continue;
        };
        *sums.entry(key).or_insert(0.0) += v;
    }
    let mut pairs: Vec<(String, f64)> = sums.into_iter().collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

/// Axis range with a small margin; degenerate spans get a unit of padding.
fn padded_range(values: &[f64]) -> (f64, f64) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn draw_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("chart rendering failed: {e}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnValues};

    fn frame() -> Arc<DataFrame> {
        Arc::new(DataFrame::from_columns(vec![
            Column {
                name: "age".into(),
                values: ColumnValues::Numeric((0..40).map(|i| Some(20.0 + i as f64)).collect()),
            },
            Column {
                name: "income".into(),
                values: ColumnValues::Numeric((0..40).map(|i| Some(900.0 + 25.0 * i as f64)).collect()),
            },
            Column {
                name: "score".into(),
                values: ColumnValues::Numeric((0..40).map(|i| Some((i % 7) as f64)).collect()),
            },
            Column {
                name: "city".into(),
                values: ColumnValues::Text(
                    (0..40).map(|i| Some(format!("city-{}", i % 25))).collect(),
                ),
            },
            Column {
                name: "notes".into(),
                values: ColumnValues::Text((0..40).map(|_| Some("n/a".into())).collect()),
            },
        ]))
    }

    fn tool() -> (VizTool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (VizTool::new(frame(), dir.path().to_path_buf()), dir)
    }

    #[test]
    fn histogram_renders_to_a_png() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Histogram, &["age".into()], Some("Ages"));
        assert!(!out.contains(FAILURE_MARKER), "got: {out}");
        let path = PathBuf::from(&out);
        assert!(path.exists());
        assert!(out.contains("visualization_"));
    }

    #[test]
    fn histogram_requires_a_column() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Histogram, &[], None);
        assert!(out.starts_with(FAILURE_MARKER));
    }

    #[test]
    fn missing_column_fails_descriptively() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Histogram, &["salary".into()], None);
        assert!(out.contains("column 'salary' does not exist"));
    }

    #[test]
    fn scatter_with_one_column_fails() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Scatter, &["age".into()], None);
        assert!(out.starts_with(FAILURE_MARKER));
        assert!(out.contains("two columns"));
    }

    #[test]
    fn scatter_renders_with_two_columns() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Scatter, &["age".into(), "income".into()], None);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
    }

    #[test]
    fn boxplot_with_no_columns_uses_numeric_columns() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Boxplot, &[], Some("Spread"));
        assert!(PathBuf::from(&out).exists(), "got: {out}");
    }

    #[test]
    fn boxplot_skips_non_numeric_but_renders_the_rest() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Boxplot, &["city".into(), "age".into()], None);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
    }

    #[test]
    fn boxplot_with_only_invalid_columns_fails() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Boxplot, &["city".into(), "notes".into()], None);
        assert!(out.contains("No valid numeric columns"));
    }

    #[test]
    fn bar_aggregates_and_renders() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::Bar, &["city".into(), "income".into()], None);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
    }

    #[test]
    fn bar_keeps_only_the_largest_groups() {
        let groups = sum_by_category(&frame(), "city", "income");
        assert_eq!(groups.len(), 25);
        let mut top = groups.clone();
        top.truncate(BAR_TOP_GROUPS);
        assert_eq!(top.len(), 20);
        assert!(top[0].1 >= top[19].1);
    }

    #[test]
    fn multi_histogram_defaults_to_all_numeric_columns() {
        let (tool, _dir) = tool();
        let out = tool.render(ChartKind::MultiHistogram, &[], Some("Distributions"));
        assert!(PathBuf::from(&out).exists(), "got: {out}");
    }

    #[test]
    fn multi_histogram_caps_the_number_of_panels() {
        let dir = tempfile::tempdir().unwrap();
        let cols: Vec<Column> = (0..40)
            .map(|i| Column {
                name: format!("m{i:02}"),
                values: ColumnValues::Numeric((0..12).map(|j| Some((i + j) as f64)).collect()),
            })
            .collect();
        let tool = VizTool::new(
            Arc::new(DataFrame::from_columns(cols)),
            dir.path().to_path_buf(),
        );
        let out = tool.render(ChartKind::MultiHistogram, &[], None);
        assert!(!out.contains(FAILURE_MARKER), "got: {out}");
        assert!(PathBuf::from(&out).exists());
    }

    #[test]
    fn all_null_numeric_columns_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let df = Arc::new(DataFrame::from_columns(vec![
            Column {
                name: "blank".into(),
                values: ColumnValues::Numeric(vec![None, None, None]),
            },
            Column {
                name: "age".into(),
                values: ColumnValues::Numeric(vec![Some(1.0), Some(2.0), Some(3.0)]),
            },
        ]));
        let tool = VizTool::new(df, dir.path().to_path_buf());

        let out = tool.render(ChartKind::Boxplot, &["blank".into(), "age".into()], None);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
        let out = tool.render(ChartKind::MultiHistogram, &[], None);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
        let out = tool.render(ChartKind::Boxplot, &["blank".into()], None);
        assert!(out.contains("No valid numeric columns"), "got: {out}");
    }

    #[test]
    fn scatter_pairs_keep_full_precision() {
        let df = DataFrame::from_columns(vec![
            Column {
                name: "x".into(),
                values: ColumnValues::Numeric(vec![Some(0.123_456_789_1), None]),
            },
            Column {
                name: "y".into(),
                values: ColumnValues::Numeric(vec![Some(2.0), Some(3.0)]),
            },
        ]);
        let points = paired_rows(&df, "x", "y");
        assert_eq!(points, vec![(0.123_456_789_1, 2.0)]);
    }

    #[test]
    fn aggregation_keeps_full_precision() {
        let df = DataFrame::from_columns(vec![
            Column {
                name: "grp".into(),
                values: ColumnValues::Text(vec![Some("a".into()), Some("a".into())]),
            },
            Column {
                name: "v".into(),
                values: ColumnValues::Numeric(vec![Some(1.0e-7), Some(1.0e-7)]),
            },
        ]);
        let sums = sum_by_category(&df, "grp", "v");
        assert_eq!(sums.len(), 1);
        assert!((sums[0].1 - 2.0e-7).abs() < 1e-15);
    }

    #[test]
    fn multi_histogram_without_numeric_columns_fails() {
        let dir = tempfile::tempdir().unwrap();
        let df = Arc::new(DataFrame::from_columns(vec![Column {
            name: "name".into(),
            values: ColumnValues::Text(vec![Some("a".into()), Some("b".into())]),
        }]));
        let tool = VizTool::new(df, dir.path().to_path_buf());
        let out = tool.render(ChartKind::MultiHistogram, &[], None);
        assert!(out.contains("No valid numeric columns"));
    }

    #[test]
    fn invoke_parses_json_arguments() {
        let (tool, _dir) = tool();
        let out = tool.invoke(r#"{"chart_kind": "histogram", "columns": ["age"], "title": "T"}"#);
        assert!(PathBuf::from(&out).exists(), "got: {out}");
        let out = tool.invoke(r#"{"chart_kind": "pie", "columns": []}"#);
        assert!(out.starts_with(FAILURE_MARKER));
    }
}
