//! CSV Data Loader Module
//! Handles CSV file loading, column extraction and CSV output using Polars.

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Column '{0}' not found")]
    MissingColumn(String),
    #[error("No data loaded")]
    NoData,
}

/// Handles CSV file loading with Polars.
pub struct DataLoader {
    df: Option<DataFrame>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { df: None }
    }

    /// Build a loader around an already materialised DataFrame.
    #[cfg(test)]
    pub fn from_dataframe(df: DataFrame) -> Self {
        Self { df: Some(df) }
    }

    /// Load a CSV file using Polars.
    pub fn load_csv(&mut self, file_path: &Path) -> Result<&DataFrame, LoaderError> {
        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        log::info!(
            "loaded {:?} ({} rows x {} columns)",
            file_path,
            df.height(),
            df.width()
        );

        self.df = Some(df);
        self.df.as_ref().ok_or(LoaderError::NoData)
    }

    /// Get list of column names from loaded DataFrame.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .as_ref()
            .map(|df| {
                df.get_column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names().iter().any(|c| c == column)
    }

    /// Get the number of rows in the DataFrame.
    pub fn row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Get the number of columns in the DataFrame.
    pub fn column_count(&self) -> usize {
        self.df.as_ref().map(|df| df.width()).unwrap_or(0)
    }

    /// Get a reference to the loaded DataFrame.
    pub fn dataframe(&self) -> Option<&DataFrame> {
        self.df.as_ref()
    }

    fn column(&self, column: &str) -> Result<&Column, LoaderError> {
        let df = self.df.as_ref().ok_or(LoaderError::NoData)?;
        df.column(column)
            .map_err(|_| LoaderError::MissingColumn(column.to_string()))
    }

    /// Numeric column with nulls and NaN mapped to `None`.
    pub fn column_f64(&self, column: &str) -> Result<Vec<Option<f64>>, LoaderError> {
        let values = self.column(column)?.cast(&DataType::Float64)?;
        let values = values.f64()?;

        Ok(values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Any column in its textual representation, nulls mapped to `None`.
    pub fn column_text(&self, column: &str) -> Result<Vec<Option<String>>, LoaderError> {
        let values = self.column(column)?.cast(&DataType::String)?;
        let series = values.as_materialized_series();
        let values = series.str()?;

        Ok(values
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect())
    }

    /// Unique non-null values of a column in order of first appearance.
    pub fn unique_values(&self, column: &str) -> Result<Vec<String>, LoaderError> {
        let mut seen = Vec::new();
        for value in self.column_text(column)?.into_iter().flatten() {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        Ok(seen)
    }
}

/// Write a DataFrame to CSV with a header row.
pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<(), LoaderError> {
    write_csv(df, path, QuoteStyle::Necessary)
}

/// Write a table whose first column is an unnamed index. Nothing is quoted,
/// so the header starts with a bare comma.
pub fn save_index_csv(df: &mut DataFrame, path: &Path) -> Result<(), LoaderError> {
    write_csv(df, path, QuoteStyle::Never)
}

fn write_csv(df: &mut DataFrame, path: &Path, quote_style: QuoteStyle) -> Result<(), LoaderError> {
    let mut file = File::create(path).map_err(|source| LoaderError::WriteError {
        path: path.to_path_buf(),
        source,
    })?;

    CsvWriter::new(&mut file)
        .include_header(true)
        .with_quote_style(quote_style)
        .finish(df)?;

    log::info!("saved {:?} ({} rows)", path, df.height());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loader() -> DataLoader {
        let df = DataFrame::new(vec![
            Column::new("device".into(), vec!["AW", "FB", "AW"]),
            Column::new("heart_rate".into(), vec![Some(70.0), None, Some(f64::NAN)]),
            Column::new("age".into(), vec![25i64, 31, 25]),
        ])
        .expect("valid frame");
        DataLoader::from_dataframe(df)
    }

    #[test]
    fn numeric_column_drops_nulls_and_nan() {
        let loader = sample_loader();
        let hr = loader.column_f64("heart_rate").expect("column exists");
        assert_eq!(hr, vec![Some(70.0), None, None]);
    }

    #[test]
    fn integer_column_as_text() {
        let loader = sample_loader();
        let age = loader.column_text("age").expect("column exists");
        assert_eq!(
            age,
            vec![Some("25".to_string()), Some("31".to_string()), Some("25".to_string())]
        );
    }

    #[test]
    fn unique_values_keep_first_appearance_order() {
        let loader = sample_loader();
        assert_eq!(loader.unique_values("device").unwrap(), vec!["AW", "FB"]);
    }

    #[test]
    fn index_table_header_starts_with_bare_comma() {
        let mut df = DataFrame::new(vec![
            Column::new("".into(), ["mean", "std"]),
            Column::new("age".into(), [32.5, 9.35]),
        ])
        .expect("valid frame");
        let path = std::env::temp_dir().join("hr_analysis_index_table.csv");

        save_index_csv(&mut df, &path).expect("saved");
        let text = std::fs::read_to_string(&path).expect("readable");
        std::fs::remove_file(&path).ok();

        assert!(text.starts_with(",age\nmean,32.5\n"), "{text:?}");
    }

    #[test]
    fn missing_column_is_reported() {
        let loader = sample_loader();
        assert!(matches!(
            loader.column_f64("BMI"),
            Err(LoaderError::MissingColumn(name)) if name == "BMI"
        ));
        assert!(!loader.has_column("BMI"));
        assert_eq!(loader.column_count(), 3);
    }
}
