//! Operation evaluation.
//!
//! The dispatcher resolves an [`OperationId`] to its typed evaluator.
//! Grouped aggregates hash-group on the rendered grouping-column values
//! and emit one row per group, grouping columns first with their storage
//! types preserved.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{AnyValue, Column, DataFrame, NamedFrom, Series};
use tracing::debug;

use cre_data::{
    CacheService, CacheValue, DataService, StandardsLibrary, any_to_f64, column_value_string,
    keys, unique_text_values,
};
use cre_dictionary::DictionaryValidityIndex;
use cre_model::{EngineError, OperationId, OperationParams, OperationResult, Result};

/// Reference start date column used by the study-day operation.
pub const REFERENCE_START_COLUMN: &str = "RFSTDTC";

pub struct OperationEngine {
    data_service: Arc<dyn DataService>,
    cache: Arc<dyn CacheService>,
    library: Option<Arc<dyn StandardsLibrary>>,
}

impl OperationEngine {
    pub fn new(data_service: Arc<dyn DataService>, cache: Arc<dyn CacheService>) -> Self {
        Self {
            data_service,
            cache,
            library: None,
        }
    }

    pub fn with_library(mut self, library: Arc<dyn StandardsLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    /// Evaluates one operation against the dataset in `params`. Temporary
    /// derived columns an evaluator attaches are dropped before returning.
    pub fn evaluate(
        &self,
        operation: OperationId,
        params: &mut OperationParams,
    ) -> Result<OperationResult> {
        match operation {
            OperationId::Min => self.numeric_aggregate(params, slice_min),
            OperationId::Max => self.numeric_aggregate(params, slice_max),
            OperationId::Mean => self.numeric_aggregate(params, slice_mean),
            OperationId::Distinct => self.distinct(params),
            OperationId::MinDate => self.date_extreme(params, false),
            OperationId::MaxDate => self.date_extreme(params, true),
            OperationId::Dy => self.study_day(params),
            OperationId::ExtractMetadata => self.extract_metadata(params),
            OperationId::VariableExists => Ok(OperationResult::Bool(
                params.dataframe.column(&params.target).is_ok(),
            )),
            OperationId::VariableValueCount => self.variable_value_count(params),
            OperationId::VariableNames => self.variable_names(params),
            OperationId::ValidMeddraCodeReferences => {
                let path = required_meddra_path(params)?;
                let index = self.validity_index();
                let valid =
                    index.validate_code_references(&mut params.dataframe, &params.domain, &path)?;
                Ok(OperationResult::Validity(valid))
            }
            OperationId::ValidMeddraTermReferences => {
                let path = required_meddra_path(params)?;
                let index = self.validity_index();
                let valid =
                    index.validate_term_references(&mut params.dataframe, &params.domain, &path)?;
                Ok(OperationResult::Validity(valid))
            }
            OperationId::ValidMeddraCodeTermPairs => {
                let path = required_meddra_path(params)?;
                let index = self.validity_index();
                let valid = index.validate_code_term_pairs(
                    &params.dataframe,
                    &params.domain,
                    &params.target,
                    &path,
                )?;
                Ok(OperationResult::Validity(valid))
            }
            OperationId::ValidWhodrugReferences => {
                let path = params.whodrug_path.clone().ok_or_else(|| {
                    EngineError::missing_configuration(
                        "cannot run the operation without a WhoDrug dictionary path",
                    )
                })?;
                let index = self.validity_index();
                let valid =
                    index.validate_whodrug_references(&params.dataframe, &params.target, &path)?;
                Ok(OperationResult::Validity(valid))
            }
        }
    }

    /// Parses the operation identifier from its string form first.
    pub fn evaluate_named(
        &self,
        operation: &str,
        params: &mut OperationParams,
    ) -> Result<OperationResult> {
        self.evaluate(operation.parse()?, params)
    }

    fn validity_index(&self) -> DictionaryValidityIndex {
        DictionaryValidityIndex::new(Arc::clone(&self.cache))
    }

    fn numeric_aggregate(
        &self,
        params: &OperationParams,
        aggregate: fn(&[f64]) -> Option<f64>,
    ) -> Result<OperationResult> {
        if params.grouping.is_empty() {
            let values = numeric_values(&params.dataframe, &params.target)?;
            return Ok(OperationResult::Number(aggregate(&values)));
        }

        let groups = group_rows(&params.dataframe, &params.grouping)?;
        let target_column = params
            .dataframe
            .column(&params.target)
            .map_err(|_| EngineError::missing_column(&params.target))?;

        let mut aggregates: Vec<Option<f64>> = Vec::with_capacity(groups.len());
        for rows in groups.values() {
            let numbers: Vec<f64> = rows
                .iter()
                .filter_map(|&idx| any_to_f64(target_column.get(idx).unwrap_or(AnyValue::Null)))
                .collect();
            aggregates.push(aggregate(&numbers));
        }

        let mut columns = grouping_columns(&params.dataframe, &params.grouping, &groups)?;
        columns.push(Series::new(params.target.as_str().into(), aggregates).into());
        Ok(OperationResult::Frame(DataFrame::new(columns)?))
    }

    fn distinct(&self, params: &OperationParams) -> Result<OperationResult> {
        if params.grouping.is_empty() {
            let values = unique_text_values(&params.dataframe, &params.target)?;
            return Ok(OperationResult::ValueSet(values));
        }

        let groups = group_rows(&params.dataframe, &params.grouping)?;
        let target_column = params
            .dataframe
            .column(&params.target)
            .map_err(|_| EngineError::missing_column(&params.target))?;

        let mut grouped: BTreeMap<Vec<String>, BTreeSet<String>> = BTreeMap::new();
        for (key, rows) in &groups {
            let mut values = BTreeSet::new();
            for &idx in rows {
                let value = target_column.get(idx).unwrap_or(AnyValue::Null);
                if matches!(value, AnyValue::Null) {
                    continue;
                }
                values.insert(cre_data::any_to_string(value));
            }
            grouped.insert(key.clone(), values);
        }
        Ok(OperationResult::GroupedSets(grouped))
    }

    fn date_extreme(&self, params: &OperationParams, use_max: bool) -> Result<OperationResult> {
        if params.grouping.is_empty() {
            let timestamps = parsed_timestamps(&params.dataframe, &params.target)?;
            return Ok(OperationResult::Text(extreme_iso(&timestamps, use_max)));
        }

        let groups = group_rows(&params.dataframe, &params.grouping)?;
        let timestamps = parsed_timestamps(&params.dataframe, &params.target)?;

        let mut extremes: Vec<String> = Vec::with_capacity(groups.len());
        for rows in groups.values() {
            let group_timestamps: Vec<Option<NaiveDateTime>> =
                rows.iter().map(|&idx| timestamps[idx]).collect();
            extremes.push(extreme_iso(&group_timestamps, use_max));
        }

        let mut columns = grouping_columns(&params.dataframe, &params.grouping, &groups)?;
        columns.push(Series::new(params.target.as_str().into(), extremes).into());
        Ok(OperationResult::Frame(DataFrame::new(columns)?))
    }

    /// Study day of the target timestamp relative to the reference start:
    /// negative day counts stay as-is, non-negative ones shift up by one
    /// because there is no day zero.
    fn study_day(&self, params: &OperationParams) -> Result<OperationResult> {
        let targets = parsed_timestamps(&params.dataframe, &params.target)?;
        let references = parsed_timestamps(&params.dataframe, REFERENCE_START_COLUMN)?;

        let offsets = targets
            .iter()
            .zip(&references)
            .map(|(target, reference)| match (target, reference) {
                (Some(target), Some(reference)) => {
                    let seconds = target.signed_duration_since(*reference).num_seconds();
                    let days = seconds.div_euclid(86_400);
                    Some(if days < 0 { days } else { days + 1 })
                }
                _ => None,
            })
            .collect();
        Ok(OperationResult::DayOffsets(offsets))
    }

    /// Reads one field of the single-row dataset metadata record and
    /// broadcasts it.
    fn extract_metadata(&self, params: &OperationParams) -> Result<OperationResult> {
        let metadata = self.data_service.get_dataset_metadata(&params.dataset_path)?;
        if metadata.column(&params.target).is_err() {
            return Err(EngineError::missing_column(&params.target));
        }
        if metadata.height() == 0 {
            return Ok(OperationResult::Text(String::new()));
        }
        Ok(OperationResult::Text(column_value_string(
            &metadata,
            &params.target,
            0,
        )))
    }

    /// Study-wide value counts, cached per (directory, operation, target).
    /// The cache is bypassed entirely against a non-production data source
    /// so synthetic data never contaminates later runs.
    fn variable_value_count(&self, params: &OperationParams) -> Result<OperationResult> {
        let cache_key = keys::study_value_count_key(&params.directory_path, &params.target);
        if self.data_service.is_cacheable()
            && let Some(value) = self.cache.get(&cache_key)
            && let Some(counts) = value.as_counts()
        {
            debug!(key = cache_key.as_str(), "study value count cache hit");
            return Ok(OperationResult::ValueCounts(counts.clone()));
        }

        let scanner = crate::scanner::StudyScanner::new(Arc::clone(&self.data_service));
        let counts = scanner.collect_variable_value_counts(
            &params.target,
            &params.directory_path,
            &params.datasets,
        )?;
        if self.data_service.is_cacheable() {
            self.cache.add(&cache_key, CacheValue::Counts(counts.clone()));
        }
        Ok(OperationResult::ValueCounts(counts))
    }

    /// Names of the standard-defined variables, from the library cache or
    /// the injected standards library.
    fn variable_names(&self, params: &OperationParams) -> Result<OperationResult> {
        let standard = params.standard.as_deref().ok_or_else(|| {
            EngineError::missing_configuration("variable_names requires a standard name")
        })?;
        let version = params.standard_version.as_deref().ok_or_else(|| {
            EngineError::missing_configuration("variable_names requires a standard version")
        })?;

        let cache_key = keys::library_variables_key(standard, version);
        if let Some(value) = self.cache.get(&cache_key)
            && let Some(names) = value.as_names()
        {
            return Ok(OperationResult::ValueSet(names.clone()));
        }

        let library = self.library.as_ref().ok_or_else(|| {
            EngineError::missing_configuration("no standards library configured")
        })?;
        let names = library.variable_names(standard, version)?;
        self.cache.add(&cache_key, CacheValue::Names(names.clone()));
        Ok(OperationResult::ValueSet(names))
    }
}

fn required_meddra_path(params: &OperationParams) -> Result<String> {
    params.meddra_path.clone().ok_or_else(|| {
        EngineError::missing_configuration(
            "cannot run the operation without a MedDRA dictionary path",
        )
    })
}

fn numeric_values(df: &DataFrame, target: &str) -> Result<Vec<f64>> {
    let column = df
        .column(target)
        .map_err(|_| EngineError::missing_column(target))?;
    let mut values = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        if let Some(number) = any_to_f64(column.get(idx).unwrap_or(AnyValue::Null)) {
            values.push(number);
        }
    }
    Ok(values)
}

fn slice_min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn slice_max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn slice_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Row indices per group, keyed by the rendered grouping values. The key
/// order is deterministic, so grouped outputs are reproducible.
fn group_rows(df: &DataFrame, grouping: &[String]) -> Result<BTreeMap<Vec<String>, Vec<usize>>> {
    for name in grouping {
        if df.column(name).is_err() {
            return Err(EngineError::missing_column(name));
        }
    }
    let mut groups: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
    for idx in 0..df.height() {
        let key: Vec<String> = grouping
            .iter()
            .map(|name| column_value_string(df, name, idx))
            .collect();
        groups.entry(key).or_default().push(idx);
    }
    Ok(groups)
}

/// One column per grouping variable holding each group's first-row value,
/// with the source storage type preserved.
fn grouping_columns(
    df: &DataFrame,
    grouping: &[String],
    groups: &BTreeMap<Vec<String>, Vec<usize>>,
) -> Result<Vec<Column>> {
    let mut columns = Vec::with_capacity(grouping.len() + 1);
    for name in grouping {
        let source = df
            .column(name)
            .map_err(|_| EngineError::missing_column(name))?;
        let values: Vec<AnyValue> = groups
            .values()
            .map(|rows| source.get(rows[0]).unwrap_or(AnyValue::Null))
            .collect();
        let series =
            Series::from_any_values_and_dtype(name.as_str().into(), &values, source.dtype(), false)?;
        columns.push(series.into());
    }
    Ok(columns)
}

fn parsed_timestamps(df: &DataFrame, target: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    let column = df
        .column(target)
        .map_err(|_| EngineError::missing_column(target))?;
    let mut timestamps = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let raw = cre_data::any_to_string(column.get(idx).unwrap_or(AnyValue::Null));
        timestamps.push(parse_timestamp(&raw));
    }
    Ok(timestamps)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(parsed.and_time(NaiveTime::MIN));
    }
    None
}

fn extreme_iso(timestamps: &[Option<NaiveDateTime>], use_max: bool) -> String {
    let mut present = timestamps.iter().flatten();
    let first = match present.next() {
        Some(first) => *first,
        None => return String::new(),
    };
    let extreme = present.fold(first, |current, &candidate| {
        if use_max {
            current.max(candidate)
        } else {
            current.min(candidate)
        }
    });
    extreme.format("%Y-%m-%dT%H:%M:%S").to_string()
}
