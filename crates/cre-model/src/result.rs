use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::DataFrame;

/// Outcome of an operation evaluation.
///
/// Scalar variants apply to every row of the evaluated dataset
/// (broadcast); column variants carry one entry per row; `Frame` carries a
/// grouped table with the grouping columns first.
#[derive(Debug, Clone)]
pub enum OperationResult {
    Number(Option<f64>),
    Text(String),
    Bool(bool),
    /// A value set broadcast to every row, e.g. ungrouped `distinct`.
    ValueSet(BTreeSet<String>),
    /// Study-wide value frequencies.
    ValueCounts(BTreeMap<String, u64>),
    /// Per-row study-day offsets; `None` where either date is unparseable.
    DayOffsets(Vec<Option<i64>>),
    /// Per-row validity flags from a dictionary check.
    Validity(Vec<bool>),
    /// Per-group value sets keyed by the grouping-column values, in
    /// grouping order.
    GroupedSets(BTreeMap<Vec<String>, BTreeSet<String>>),
    Frame(DataFrame),
}

impl OperationResult {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            OperationResult::Number(value) => *value,
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OperationResult::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OperationResult::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_value_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            OperationResult::ValueSet(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_value_counts(&self) -> Option<&BTreeMap<String, u64>> {
        match self {
            OperationResult::ValueCounts(counts) => Some(counts),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            OperationResult::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}
