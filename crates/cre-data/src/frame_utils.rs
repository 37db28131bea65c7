//! Row-wise DataFrame helpers shared by the engine crates.

use std::collections::BTreeSet;

use polars::prelude::{
    AnyValue, BooleanChunked, DataFrame, DataType, IdxCa, IdxSize, NewChunkedArray,
};

use cre_model::{EngineError, Result};

pub fn any_to_string(value: AnyValue) -> String {
    match value {
        AnyValue::String(value) => value.to_string(),
        AnyValue::StringOwned(value) => value.to_string(),
        AnyValue::Null => String::new(),
        AnyValue::Float64(value) => format_numeric(value),
        AnyValue::Float32(value) => format_numeric(value as f64),
        _ => value.to_string(),
    }
}

pub fn any_to_f64(value: AnyValue) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Float32(value) => Some(value as f64),
        AnyValue::Float64(value) => Some(value),
        AnyValue::Int8(value) => Some(value as f64),
        AnyValue::Int16(value) => Some(value as f64),
        AnyValue::Int32(value) => Some(value as f64),
        AnyValue::Int64(value) => Some(value as f64),
        AnyValue::UInt8(value) => Some(value as f64),
        AnyValue::UInt16(value) => Some(value as f64),
        AnyValue::UInt32(value) => Some(value as f64),
        AnyValue::UInt64(value) => Some(value as f64),
        AnyValue::String(value) => parse_f64(value),
        AnyValue::StringOwned(value) => parse_f64(&value),
        _ => None,
    }
}

pub fn parse_f64(value: &str) -> Option<f64> {
    if value.trim().is_empty() {
        return None;
    }
    value.trim().parse::<f64>().ok()
}

pub fn format_numeric(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    value.to_string()
}

pub fn column_value_string(df: &DataFrame, name: &str, idx: usize) -> String {
    match df.column(name) {
        Ok(series) => any_to_string(series.get(idx).unwrap_or(AnyValue::Null)),
        Err(_) => String::new(),
    }
}

pub fn dtype_is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

/// String rendering of every row of a column; nulls become empty strings.
pub fn column_string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| EngineError::missing_column(name))?;
    let mut values = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        values.push(any_to_string(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(values)
}

/// Distinct non-null values of a column, rendered as text.
pub fn unique_text_values(df: &DataFrame, name: &str) -> Result<BTreeSet<String>> {
    let column = df
        .column(name)
        .map_err(|_| EngineError::missing_column(name))?;
    let mut values = BTreeSet::new();
    for idx in 0..df.height() {
        let value = column.get(idx).unwrap_or(AnyValue::Null);
        if matches!(value, AnyValue::Null) {
            continue;
        }
        values.insert(any_to_string(value));
    }
    Ok(values)
}

pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    Ok(df.filter(&mask)?)
}

pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let indices: Vec<IdxSize> = indices.iter().map(|&idx| idx as IdxSize).collect();
    let idx = IdxCa::from_vec("take".into(), indices);
    Ok(df.take(&idx)?)
}

/// Stable sort by the named columns. Numeric-typed columns compare
/// numerically with nulls last; everything else compares as text.
pub fn sort_rows_by_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    enum SortKey {
        Number(Option<f64>),
        Text(String),
    }

    let mut keys: Vec<Vec<SortKey>> = Vec::with_capacity(columns.len());
    for name in columns {
        let column = df
            .column(name)
            .map_err(|_| EngineError::missing_column(name))?;
        let numeric = dtype_is_numeric(column.dtype());
        let mut column_keys = Vec::with_capacity(df.height());
        for idx in 0..df.height() {
            let value = column.get(idx).unwrap_or(AnyValue::Null);
            if numeric {
                column_keys.push(SortKey::Number(any_to_f64(value)));
            } else {
                column_keys.push(SortKey::Text(any_to_string(value)));
            }
        }
        keys.push(column_keys);
    }

    let mut order: Vec<usize> = (0..df.height()).collect();
    order.sort_by(|&a, &b| {
        for column_keys in &keys {
            let ordering = match (&column_keys[a], &column_keys[b]) {
                (SortKey::Number(left), SortKey::Number(right)) => match (left, right) {
                    (Some(left), Some(right)) => {
                        left.partial_cmp(right).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                },
                (SortKey::Text(left), SortKey::Text(right)) => left.cmp(right),
                _ => std::cmp::Ordering::Equal,
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });

    take_rows(df, &order)
}

/// A column name guaranteed not to collide with the frame's columns, for
/// short-lived derived columns.
pub fn synthetic_column_name(df: &DataFrame, stem: &str) -> String {
    let existing: BTreeSet<String> = column_names(df).into_iter().collect();
    let mut candidate = format!("_{stem}");
    let mut counter = 0usize;
    while existing.contains(&candidate) {
        counter += 1;
        candidate = format!("_{stem}_{counter}");
    }
    candidate
}
