//! Consumed service interfaces and their in-memory implementations.
//!
//! Services are injected at construction and owned by the orchestrating
//! caller; nothing here reaches for ambient global instances.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::DataFrame;

use cre_model::{EngineError, Result};

/// Loads study datasets. `is_cacheable` distinguishes production sources
/// from stand-ins whose data changes between runs; whole-study scan
/// results must not be cached for the latter.
pub trait DataService: Send + Sync {
    fn get_dataset(&self, path: &str) -> Result<DataFrame>;

    /// Single-row record describing one dataset (name, size, location).
    fn get_dataset_metadata(&self, path: &str) -> Result<DataFrame>;

    /// Loads the physical files of one logical domain and stacks them into
    /// a single frame.
    fn join_split_datasets(&self, paths: &[String]) -> Result<DataFrame> {
        let mut frames = paths.iter().map(|path| self.get_dataset(path));
        let Some(first) = frames.next() else {
            return Ok(DataFrame::empty());
        };
        let mut joined = first?;
        for frame in frames {
            joined = joined.vstack(&frame?)?;
        }
        Ok(joined)
    }

    fn is_cacheable(&self) -> bool {
        true
    }
}

/// Datasets preloaded into memory, keyed by path.
#[derive(Debug, Default)]
pub struct InMemoryDataService {
    datasets: BTreeMap<String, DataFrame>,
    metadata: BTreeMap<String, DataFrame>,
}

impl InMemoryDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&mut self, path: impl Into<String>, dataset: DataFrame) {
        self.datasets.insert(path.into(), dataset);
    }

    pub fn insert_metadata(&mut self, path: impl Into<String>, metadata: DataFrame) {
        self.metadata.insert(path.into(), metadata);
    }
}

impl DataService for InMemoryDataService {
    fn get_dataset(&self, path: &str) -> Result<DataFrame> {
        self.datasets
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::DatasetNotFound {
                path: path.to_string(),
            })
    }

    fn get_dataset_metadata(&self, path: &str) -> Result<DataFrame> {
        self.metadata
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::DatasetNotFound {
                path: path.to_string(),
            })
    }
}

/// Non-production stand-in used for ad-hoc runs over synthetic data.
/// Identical to [`InMemoryDataService`] except that whole-study scan
/// results computed against it are never cached.
#[derive(Debug, Default)]
pub struct DummyDataService {
    inner: InMemoryDataService,
}

impl DummyDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_dataset(&mut self, path: impl Into<String>, dataset: DataFrame) {
        self.inner.insert_dataset(path, dataset);
    }

    pub fn insert_metadata(&mut self, path: impl Into<String>, metadata: DataFrame) {
        self.inner.insert_metadata(path, metadata);
    }
}

impl DataService for DummyDataService {
    fn get_dataset(&self, path: &str) -> Result<DataFrame> {
        self.inner.get_dataset(path)
    }

    fn get_dataset_metadata(&self, path: &str) -> Result<DataFrame> {
        self.inner.get_dataset_metadata(path)
    }

    fn is_cacheable(&self) -> bool {
        false
    }
}

/// Standards-library lookups backing the `variable_names` operation.
/// Retrieval of the underlying metadata (network or bundled files) belongs
/// to the implementor.
pub trait StandardsLibrary: Send + Sync {
    fn variable_names(&self, standard: &str, version: &str) -> Result<BTreeSet<String>>;
}

/// A fixed in-memory standards library.
#[derive(Debug, Default)]
pub struct StaticStandardsLibrary {
    variables: BTreeMap<(String, String), BTreeSet<String>>,
}

impl StaticStandardsLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        standard: impl Into<String>,
        version: impl Into<String>,
        names: BTreeSet<String>,
    ) {
        self.variables
            .insert((standard.into(), version.into()), names);
    }
}

impl StandardsLibrary for StaticStandardsLibrary {
    fn variable_names(&self, standard: &str, version: &str) -> Result<BTreeSet<String>> {
        self.variables
            .get(&(standard.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| {
                EngineError::missing_configuration(format!(
                    "no variable metadata for standard {standard} version {version}"
                ))
            })
    }
}
