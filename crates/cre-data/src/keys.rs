//! Cache-key builders.
//!
//! The cache is one flat string keyspace; these helpers namespace keys by
//! operation kind and source path so unrelated studies and operations
//! never collide.

pub fn operations_cache_key(directory_path: &str, operation_name: &str) -> String {
    format!("operations/{directory_path}/{operation_name}")
}

pub fn study_value_count_key(directory_path: &str, target: &str) -> String {
    operations_cache_key(directory_path, &format!("study_value_count_{target}"))
}

pub fn study_variables_key(directory_path: &str) -> String {
    operations_cache_key(directory_path, "study_variables")
}

pub fn library_variables_key(standard: &str, version: &str) -> String {
    format!("library/{standard}/{version}/variables")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_namespace_by_directory_and_operation() {
        let a = study_value_count_key("/studies/one", "AESEQ");
        let b = study_value_count_key("/studies/two", "AESEQ");
        let c = study_value_count_key("/studies/one", "AETERM");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, "operations//studies/one/study_value_count_AESEQ");
    }

    #[test]
    fn library_keys_include_version() {
        assert_ne!(
            library_variables_key("sdtmig", "3-4"),
            library_variables_key("sdtmig", "3-3")
        );
    }
}
