//! CSV-backed data service.
//!
//! Column typing is inferred per file: a column where every non-empty cell
//! parses as a number becomes a Float64 column (empty cells become nulls),
//! everything else stays text.

use std::path::{Path, PathBuf};

use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use cre_model::{EngineError, Result};

use crate::frame_utils::parse_f64;
use crate::service::DataService;

#[derive(Debug, Clone)]
pub struct CsvDataService {
    root: PathBuf,
}

impl CsvDataService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

impl DataService for CsvDataService {
    fn get_dataset(&self, path: &str) -> Result<DataFrame> {
        read_csv_dataset(&self.resolve(path))
    }

    fn get_dataset_metadata(&self, path: &str) -> Result<DataFrame> {
        let full_path = self.resolve(path);
        let file_meta = std::fs::metadata(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::DatasetNotFound {
                    path: path.to_string(),
                }
            } else {
                EngineError::io(full_path.clone(), e)
            }
        })?;

        let dataset_name = full_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        let columns: Vec<Column> = vec![
            Series::new("dataset_name".into(), vec![dataset_name]).into(),
            Series::new("dataset_size".into(), vec![file_meta.len() as i64]).into(),
            Series::new(
                "dataset_location".into(),
                vec![full_path.to_string_lossy().to_string()],
            )
            .into(),
        ];
        Ok(DataFrame::new(columns)?)
    }
}

fn read_csv_dataset(path: &Path) -> Result<DataFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| EngineError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EngineError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }

    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        let cells: Vec<&str> = rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect();
        columns.push(build_column(header, &cells));
    }
    Ok(DataFrame::new(columns)?)
}

fn build_column(name: &str, cells: &[&str]) -> Column {
    let mut any_value = false;
    let numeric = cells.iter().all(|cell| {
        if cell.is_empty() {
            return true;
        }
        any_value = true;
        parse_f64(cell).is_some()
    });

    if numeric && any_value {
        let values: Vec<Option<f64>> = cells.iter().map(|cell| parse_f64(cell)).collect();
        Series::new(name.into(), values).into()
    } else {
        let values: Vec<String> = cells.iter().map(|cell| cell.to_string()).collect();
        Series::new(name.into(), values).into()
    }
}
