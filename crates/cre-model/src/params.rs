use polars::prelude::DataFrame;

/// One study dataset as listed in the study-wide descriptor list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatasetDescriptor {
    pub domain: String,
    pub filename: String,
}

impl DatasetDescriptor {
    pub fn new(domain: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            filename: filename.into(),
        }
    }
}

/// The (name-column, value-column) pair a relationship dataset uses to
/// reference parent columns indirectly, e.g. ("IDVAR", "IDVARVAL").
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelationshipColumns {
    pub name_column: String,
    pub value_column: String,
}

impl RelationshipColumns {
    pub fn new(name_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            name_column: name_column.into(),
            value_column: value_column.into(),
        }
    }
}

/// How a relationship dataset (SUPP--, RELREC-style) refers back to its
/// parent domain.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RelationshipDescriptor {
    pub domain_name: String,
    pub relationship_columns: RelationshipColumns,
}

impl RelationshipDescriptor {
    pub fn new(domain_name: impl Into<String>, relationship_columns: RelationshipColumns) -> Self {
        Self {
            domain_name: domain_name.into(),
            relationship_columns,
        }
    }
}

/// Inputs of a single operation evaluation.
///
/// Built per call and discarded after; the dataset handle is owned here so
/// an operation may attach temporary derived columns without them leaking
/// past the evaluation.
#[derive(Debug, Clone)]
pub struct OperationParams {
    /// Target variable the operation reads.
    pub target: String,
    /// Grouping variables, possibly empty.
    pub grouping: Vec<String>,
    pub dataframe: DataFrame,
    /// Domain code of the dataset under evaluation (e.g. "AE").
    pub domain: String,
    pub dataset_path: String,
    /// Study directory the dataset descriptors are relative to.
    pub directory_path: String,
    pub datasets: Vec<DatasetDescriptor>,
    pub meddra_path: Option<String>,
    pub whodrug_path: Option<String>,
    pub standard: Option<String>,
    pub standard_version: Option<String>,
}

impl OperationParams {
    pub fn new(target: impl Into<String>, dataframe: DataFrame, domain: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            grouping: Vec::new(),
            dataframe,
            domain: domain.into(),
            dataset_path: String::new(),
            directory_path: String::new(),
            datasets: Vec::new(),
            meddra_path: None,
            whodrug_path: None,
            standard: None,
            standard_version: None,
        }
    }

    pub fn with_grouping(mut self, grouping: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.grouping = grouping.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dataset_path(mut self, path: impl Into<String>) -> Self {
        self.dataset_path = path.into();
        self
    }

    pub fn with_directory_path(mut self, path: impl Into<String>) -> Self {
        self.directory_path = path.into();
        self
    }

    pub fn with_datasets(mut self, datasets: impl IntoIterator<Item = DatasetDescriptor>) -> Self {
        self.datasets = datasets.into_iter().collect();
        self
    }

    pub fn with_meddra_path(mut self, path: impl Into<String>) -> Self {
        self.meddra_path = Some(path.into());
        self
    }

    pub fn with_whodrug_path(mut self, path: impl Into<String>) -> Self {
        self.whodrug_path = Some(path.into());
        self
    }

    pub fn with_standard(mut self, standard: impl Into<String>, version: impl Into<String>) -> Self {
        self.standard = Some(standard.into());
        self.standard_version = Some(version.into());
        self
    }
}
