pub mod merge;
pub mod meta_filter;
pub mod operations;
pub mod scanner;

pub use merge::{
    filter_by_match_keys, filter_by_reference_columns, filter_by_reference_domain,
    is_numeric_column, is_numeric_value, merge_matched_datasets, merge_on_relationship_columns,
    merge_relationship_datasets, reconcile_numeric_columns, require_unique_row,
};
pub use meta_filter::{
    DefineVariableMetadata, LibraryVariableMetadata, filter_columns_by_variable_metadata,
};
pub use operations::{OperationEngine, REFERENCE_START_COLUMN};
pub use scanner::{ReferenceData, StudyScanner};
