//! Concurrent whole-study scans.
//!
//! One task runs per distinct domain; the physical files of a split domain
//! are stacked inside that task before counting, so a value is never
//! counted twice across files. Tasks share no mutable state and every
//! merge is a commutative reduction, so results do not depend on task
//! completion order. A failing task fails the whole scan; no partial
//! results are surfaced.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use polars::prelude::DataFrame;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use cre_data::{
    DataService, column_string_values, corresponding_datasets, distinct_domain_datasets,
    is_split_dataset, resolve_domain_placeholder, study_file_path, unique_text_values,
};
use cre_model::{DatasetDescriptor, Result};

use crate::merge::{
    IDENTIFIER_VARIABLE_COLUMN, REFERENCE_DOMAIN_COLUMN, SUBJECT_COLUMN,
    SUBJECT_REFERENCE_COLUMN,
};

/// Referenced columns per referenced domain, extracted from a study.
pub type ReferenceData = BTreeMap<String, BTreeMap<String, Vec<String>>>;

pub struct StudyScanner {
    data_service: Arc<dyn DataService>,
}

impl StudyScanner {
    pub fn new(data_service: Arc<dyn DataService>) -> Self {
        Self { data_service }
    }

    /// Column names present in any dataset of the study.
    pub fn collect_all_variables(
        &self,
        study_path: &str,
        datasets: &[DatasetDescriptor],
    ) -> Result<BTreeSet<String>> {
        debug!(dataset_count = datasets.len(), "scanning study variables");
        let variable_sets: Vec<BTreeSet<String>> = datasets
            .par_iter()
            .map(|descriptor| -> Result<BTreeSet<String>> {
                let df = self
                    .data_service
                    .get_dataset(&study_file_path(study_path, &descriptor.filename))?;
                Ok(cre_data::column_names(&df).into_iter().collect())
            })
            .collect::<Result<_>>()?;
        Ok(variable_sets.into_iter().flatten().collect())
    }

    /// Value frequencies of `target` across the study. Each distinct value
    /// contributes one occurrence per logical domain; a `--` placeholder in
    /// the target resolves per domain before counting.
    pub fn collect_variable_value_counts(
        &self,
        target: &str,
        study_path: &str,
        datasets: &[DatasetDescriptor],
    ) -> Result<BTreeMap<String, u64>> {
        let distinct = distinct_domain_datasets(datasets);
        debug!(
            target,
            domain_count = distinct.len(),
            "scanning study value counts"
        );
        let counters: Vec<BTreeMap<String, u64>> = distinct
            .par_iter()
            .map(|descriptor| self.domain_value_counts(target, study_path, datasets, descriptor))
            .collect::<Result<_>>()?;

        let mut merged: BTreeMap<String, u64> = BTreeMap::new();
        for counter in counters {
            for (value, count) in counter {
                *merged.entry(value).or_insert(0) += count;
            }
        }
        Ok(merged)
    }

    /// Columns a relationship dataset references, loaded per referenced
    /// domain. A dataset carrying RDOMAIN/IDVAR names its domains and
    /// variables directly; one keyed by RSUBJID resolves against the DM
    /// dataset's subject identifiers, re-labelled RSUBJID.
    pub fn collect_reference_data(
        &self,
        dataset: &DataFrame,
        study_path: &str,
        datasets: &[DatasetDescriptor],
    ) -> Result<ReferenceData> {
        if dataset.column(REFERENCE_DOMAIN_COLUMN).is_ok() {
            let domains: Vec<String> = unique_text_values(dataset, REFERENCE_DOMAIN_COLUMN)?
                .into_iter()
                .collect();
            let variables: Vec<String> =
                if dataset.column(IDENTIFIER_VARIABLE_COLUMN).is_ok() {
                    unique_text_values(dataset, IDENTIFIER_VARIABLE_COLUMN)?
                        .into_iter()
                        .collect()
                } else {
                    Vec::new()
                };

            let entries: Vec<Option<(String, BTreeMap<String, Vec<String>>)>> = domains
                .par_iter()
                .map(|domain| self.domain_column_data(domain, &variables, study_path, datasets))
                .collect::<Result<_>>()?;
            return Ok(entries.into_iter().flatten().collect());
        }

        if dataset.column(SUBJECT_REFERENCE_COLUMN).is_ok() {
            let subject_column = SUBJECT_COLUMN.to_string();
            let Some(entry) =
                self.domain_column_data("DM", &[subject_column], study_path, datasets)?
            else {
                return Ok(ReferenceData::new());
            };
            let (domain, mut columns) = entry;
            if let Some(values) = columns.remove(SUBJECT_COLUMN) {
                columns.insert(SUBJECT_REFERENCE_COLUMN.to_string(), values);
            }
            return Ok(ReferenceData::from([(domain, columns)]));
        }

        Ok(ReferenceData::new())
    }

    fn domain_value_counts(
        &self,
        target: &str,
        study_path: &str,
        datasets: &[DatasetDescriptor],
        descriptor: &DatasetDescriptor,
    ) -> Result<BTreeMap<String, u64>> {
        let df = if is_split_dataset(datasets, &descriptor.domain) {
            let files: Vec<String> = corresponding_datasets(datasets, &descriptor.domain)
                .into_iter()
                .map(|entry| study_file_path(study_path, &entry.filename))
                .collect();
            self.data_service.join_split_datasets(&files)?
        } else {
            self.data_service
                .get_dataset(&study_file_path(study_path, &descriptor.filename))?
        };

        let variable = resolve_domain_placeholder(target, &descriptor.domain);
        if df.column(&variable).is_err() {
            return Ok(BTreeMap::new());
        }
        Ok(unique_text_values(&df, &variable)?
            .into_iter()
            .map(|value| (value, 1))
            .collect())
    }

    fn domain_column_data(
        &self,
        domain: &str,
        variables: &[String],
        study_path: &str,
        datasets: &[DatasetDescriptor],
    ) -> Result<Option<(String, BTreeMap<String, Vec<String>>)>> {
        let Some(descriptor) = datasets.iter().find(|entry| entry.domain == domain) else {
            return Ok(None);
        };
        let df = self
            .data_service
            .get_dataset(&study_file_path(study_path, &descriptor.filename))?;

        let mut columns = BTreeMap::new();
        for variable in variables {
            if df.column(variable).is_ok() {
                columns.insert(variable.clone(), column_string_values(&df, variable)?);
            }
        }
        Ok(Some((domain.to_string(), columns)))
    }
}
