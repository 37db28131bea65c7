pub mod cache;
pub mod csv_service;
pub mod frame_utils;
pub mod keys;
pub mod service;
pub mod split;

pub use cache::{CacheService, CacheValue, InMemoryCacheService};
pub use csv_service::CsvDataService;
pub use frame_utils::{
    any_to_f64, any_to_string, column_names, column_string_values, column_value_string,
    dtype_is_numeric, filter_rows, format_numeric, parse_f64, sort_rows_by_columns,
    synthetic_column_name, take_rows, unique_text_values,
};
pub use service::{
    DataService, DummyDataService, InMemoryDataService, StandardsLibrary, StaticStandardsLibrary,
};
pub use split::{
    corresponding_datasets, distinct_domain_datasets, is_split_dataset,
    resolve_domain_placeholder, study_file_path,
};
