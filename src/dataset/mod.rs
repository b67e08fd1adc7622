//! In-memory tabular dataset loaded from CSV, immutable for one request.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};

pub mod stats;

/// Column storage. A column is numeric iff every non-empty cell parses as
/// f64 and at least one cell is non-empty; otherwise it stays textual.
#[derive(Debug, Clone)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

impl Column {
    pub fn is_numeric(&self) -> bool {
        matches!(self.values, ColumnValues::Numeric(_))
    }

    /// Non-null numeric values, in row order. Empty for text columns.
    pub fn numeric_values(&self) -> Vec<f64> {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter_map(|x| *x).collect(),
            ColumnValues::Text(_) => Vec::new(),
        }
    }

    /// Cell rendered as display text; None for missing cells.
    pub fn cell(&self, row: usize) -> Option<String> {
        match &self.values {
            ColumnValues::Numeric(v) => v.get(row).and_then(|x| x.map(format_number)),
            ColumnValues::Text(v) => v.get(row).and_then(|x| x.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DataFrame {
    columns: Vec<Column>,
    n_rows: usize,
}

impl DataFrame {
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open CSV file: {}", path.display()))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read CSV header: {}", path.display()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            bail!("CSV file has no columns: {}", path.display());
        }

        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for (row_idx, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("malformed CSV record at row {}", row_idx + 1))?;
            for (col_idx, cell) in cells.iter_mut().enumerate() {
                let raw = record.get(col_idx).unwrap_or("").trim();
                cell.push(if raw.is_empty() {
                    None
                } else {
                    Some(raw.to_string())
                });
            }
        }

        let n_rows = cells.first().map_or(0, Vec::len);
        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column {
                name,
                values: type_column(raw),
            })
            .collect();

        Ok(Self { columns, n_rows })
    }

    /// Build a frame directly from typed columns. Intended for tests.
    pub fn from_columns(columns: Vec<Column>) -> Self {
        let n_rows = columns
            .iter()
            .map(|c| match &c.values {
                ColumnValues::Numeric(v) => v.len(),
                ColumnValues::Text(v) => v.len(),
            })
            .max()
            .unwrap_or(0);
        Self { columns, n_rows }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// One-line schema summary for prompts and logs.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            "{} rows x {} columns: ",
            self.n_rows,
            self.columns.len()
        );
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                format!(
                    "{} ({})",
                    c.name,
                    if c.is_numeric() { "numeric" } else { "text" }
                )
            })
            .collect();
        out.push_str(&parts.join(", "));
        out
    }
}

fn type_column(raw: Vec<Option<String>>) -> ColumnValues {
    let mut any_value = false;
    let all_numeric = raw.iter().flatten().all(|s| {
        any_value = true;
        s.parse::<f64>().is_ok()
    });
    if any_value && all_numeric {
        ColumnValues::Numeric(
            raw.into_iter()
                .map(|s| s.and_then(|s| s.parse::<f64>().ok()))
                .collect(),
        )
    } else {
        ColumnValues::Text(raw)
    }
}

/// Trim trailing zeros so integers render without a decimal point.
pub fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        let s = format!("{x:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_and_types_columns() {
        let f = write_csv("age,income,city\n31,1200.5,Lisbon\n44,980,Porto\n27,,Braga\n");
        let df = DataFrame::from_csv_path(f.path()).unwrap();
        assert_eq!(df.shape(), (3, 3));
        assert!(df.column("age").unwrap().is_numeric());
        assert!(df.column("income").unwrap().is_numeric());
        assert!(!df.column("city").unwrap().is_numeric());
        assert_eq!(df.column("income").unwrap().numeric_values(), vec![1200.5, 980.0]);
    }

    #[test]
    fn mixed_cells_stay_textual() {
        let f = write_csv("code\n12\nabc\n");
        let df = DataFrame::from_csv_path(f.path()).unwrap();
        assert!(!df.column("code").unwrap().is_numeric());
    }

    #[test]
    fn missing_file_is_descriptive() {
        let err = DataFrame::from_csv_path(Path::new("/nonexistent/data.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/data.csv"));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.23456789), "1.234568");
    }
}
