//! Row-wise dictionary validity predicates.
//!
//! Each predicate renders a composite key per row and tests membership in
//! a derived index. Indices are built at most once per dictionary path per
//! process and cached independently per index kind; the raw term tree is
//! expected in the cache under the dictionary path itself (see
//! [`crate::registry::install_dictionary`]).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use polars::prelude::{DataFrame, NamedFrom, Series};
use tracing::debug;

use cre_data::{
    CacheService, CacheValue, column_string_values, column_value_string, synthetic_column_name,
};
use cre_model::{EngineError, HierarchyLevel, Result};

use crate::meddra;

pub struct DictionaryValidityIndex {
    cache: Arc<dyn CacheService>,
}

impl DictionaryValidityIndex {
    pub fn new(cache: Arc<dyn CacheService>) -> Self {
        Self { cache }
    }

    /// Per-row check that the five code columns of `domain` form a known
    /// SOC→LLT code chain.
    pub fn validate_code_references(
        &self,
        df: &mut DataFrame,
        domain: &str,
        meddra_path: &str,
    ) -> Result<Vec<bool>> {
        let columns = hierarchy_columns(domain, HierarchyLevel::code_suffix);
        let hierarchies = self.code_hierarchy_set(meddra_path)?;
        membership_by_path(df, &columns, "codes", &hierarchies)
    }

    /// Per-row check that the five display-term columns of `domain` form a
    /// known SOC→LLT term chain.
    pub fn validate_term_references(
        &self,
        df: &mut DataFrame,
        domain: &str,
        meddra_path: &str,
    ) -> Result<Vec<bool>> {
        let columns = hierarchy_columns(domain, HierarchyLevel::term_suffix);
        let hierarchies = self.term_hierarchy_set(meddra_path)?;
        membership_by_path(df, &columns, "terms", &hierarchies)
    }

    /// Per-row check that the (code, term) pair behind `target` is valid at
    /// the level `target` names. Either the code or the display variant of
    /// a level resolves to the same column pair.
    pub fn validate_code_term_pairs(
        &self,
        df: &DataFrame,
        domain: &str,
        target: &str,
        meddra_path: &str,
    ) -> Result<Vec<bool>> {
        let (level, code_column, term_column) =
            resolve_target_variable(domain, target).ok_or_else(|| {
                EngineError::missing_configuration(format!(
                    "variable {target} does not name a MedDRA hierarchy column of domain {domain}"
                ))
            })?;

        let pairs = self.code_term_pair_sets(meddra_path)?;
        let empty = HashSet::new();
        let level_pairs = pairs.get(&level).unwrap_or(&empty);

        let codes = column_string_values(df, &code_column)?;
        let terms = column_string_values(df, &term_column)?;
        Ok(codes
            .into_iter()
            .zip(terms)
            .map(|pair| level_pairs.contains(&pair))
            .collect())
    }

    /// Per-row check of `target` against the WhoDrug ATC-text codes.
    pub fn validate_whodrug_references(
        &self,
        df: &DataFrame,
        target: &str,
        whodrug_path: &str,
    ) -> Result<Vec<bool>> {
        let value = self.cache.get(whodrug_path).ok_or_else(|| {
            EngineError::missing_configuration(format!(
                "no WhoDrug terms installed for {whodrug_path}"
            ))
        })?;
        let dictionary = value.as_whodrug().ok_or_else(|| {
            EngineError::missing_configuration(format!(
                "cached terms for {whodrug_path} are not a WhoDrug tree"
            ))
        })?;
        let codes = dictionary.atc_text_codes();

        let values = column_string_values(df, target)?;
        Ok(values.into_iter().map(|value| codes.contains(&value)).collect())
    }

    fn code_hierarchy_set(&self, meddra_path: &str) -> Result<HashSet<String>> {
        let key = meddra::code_hierarchies_key(meddra_path);
        if let Some(value) = self.cache.get(&key)
            && let Some(paths) = value.as_paths()
        {
            debug!(key = key.as_str(), "dictionary index cache hit");
            return Ok(paths.clone());
        }
        let value = self.meddra_dictionary(meddra_path)?;
        let dictionary = meddra_tree(&value, meddra_path)?;
        let hierarchies = meddra::code_hierarchies(dictionary);
        self.cache.add(&key, CacheValue::Paths(hierarchies.clone()));
        Ok(hierarchies)
    }

    fn term_hierarchy_set(&self, meddra_path: &str) -> Result<HashSet<String>> {
        let key = meddra::term_hierarchies_key(meddra_path);
        if let Some(value) = self.cache.get(&key)
            && let Some(paths) = value.as_paths()
        {
            debug!(key = key.as_str(), "dictionary index cache hit");
            return Ok(paths.clone());
        }
        let value = self.meddra_dictionary(meddra_path)?;
        let dictionary = meddra_tree(&value, meddra_path)?;
        let hierarchies = meddra::term_hierarchies(dictionary);
        self.cache.add(&key, CacheValue::Paths(hierarchies.clone()));
        Ok(hierarchies)
    }

    fn code_term_pair_sets(
        &self,
        meddra_path: &str,
    ) -> Result<BTreeMap<HierarchyLevel, HashSet<(String, String)>>> {
        let key = meddra::code_term_pairs_key(meddra_path);
        if let Some(value) = self.cache.get(&key)
            && let Some(pairs) = value.as_level_pairs()
        {
            debug!(key = key.as_str(), "dictionary index cache hit");
            return Ok(pairs.clone());
        }
        let value = self.meddra_dictionary(meddra_path)?;
        let dictionary = meddra_tree(&value, meddra_path)?;
        let pairs = meddra::code_term_pairs(dictionary);
        self.cache.add(&key, CacheValue::LevelPairs(pairs.clone()));
        Ok(pairs)
    }

    fn meddra_dictionary(&self, meddra_path: &str) -> Result<Arc<CacheValue>> {
        self.cache.get(meddra_path).ok_or_else(|| {
            EngineError::missing_configuration(format!(
                "no MedDRA terms installed for {meddra_path}"
            ))
        })
    }
}

fn meddra_tree<'a>(
    value: &'a CacheValue,
    meddra_path: &str,
) -> Result<&'a cre_model::MedDraDictionary> {
    value.as_meddra().ok_or_else(|| {
        EngineError::missing_configuration(format!(
            "cached terms for {meddra_path} are not a MedDRA tree"
        ))
    })
}

fn hierarchy_columns(domain: &str, suffix: fn(&HierarchyLevel) -> &'static str) -> Vec<String> {
    HierarchyLevel::ALL
        .iter()
        .map(|level| format!("{domain}{}", suffix(level)))
        .collect()
}

/// Resolves a target variable to its level and (code, term) column pair.
fn resolve_target_variable(
    domain: &str,
    target: &str,
) -> Option<(HierarchyLevel, String, String)> {
    for level in HierarchyLevel::ALL {
        let code_column = format!("{domain}{}", level.code_suffix());
        let term_column = format!("{domain}{}", level.term_suffix());
        if target == code_column || target == term_column {
            return Some((level, code_column, term_column));
        }
    }
    None
}

/// Joins the named columns with "/" into a short-lived derived column,
/// tests membership, and drops the column again.
fn membership_by_path(
    df: &mut DataFrame,
    columns: &[String],
    stem: &str,
    valid_paths: &HashSet<String>,
) -> Result<Vec<bool>> {
    for name in columns {
        if df.column(name).is_err() {
            return Err(EngineError::missing_column(name));
        }
    }

    let mut composite = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let parts: Vec<String> = columns
            .iter()
            .map(|name| column_value_string(df, name, idx))
            .collect();
        composite.push(parts.join("/"));
    }

    let column_name = synthetic_column_name(df, stem);
    df.with_column(Series::new(column_name.as_str().into(), composite))?;
    let result = column_string_values(df, &column_name)?
        .into_iter()
        .map(|path| valid_paths.contains(&path))
        .collect();
    df.drop_in_place(&column_name)?;
    Ok(result)
}
