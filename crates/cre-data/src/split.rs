//! Split-dataset helpers.
//!
//! One logical domain may be physically stored across several files; the
//! descriptor list carries one entry per file, repeating the domain code.

use cre_model::DatasetDescriptor;

pub fn is_split_dataset(datasets: &[DatasetDescriptor], domain: &str) -> bool {
    datasets
        .iter()
        .filter(|descriptor| descriptor.domain == domain)
        .count()
        > 1
}

/// Every file of one logical domain, in descriptor order.
pub fn corresponding_datasets<'a>(
    datasets: &'a [DatasetDescriptor],
    domain: &str,
) -> Vec<&'a DatasetDescriptor> {
    datasets
        .iter()
        .filter(|descriptor| descriptor.domain == domain)
        .collect()
}

/// One descriptor per distinct domain, keeping first-appearance order.
pub fn distinct_domain_datasets(datasets: &[DatasetDescriptor]) -> Vec<&DatasetDescriptor> {
    let mut seen: Vec<&str> = Vec::new();
    let mut distinct = Vec::new();
    for descriptor in datasets {
        if seen.contains(&descriptor.domain.as_str()) {
            continue;
        }
        seen.push(&descriptor.domain);
        distinct.push(descriptor);
    }
    distinct
}

/// Resolves a domain placeholder ("--SEQ" with domain "AE" becomes
/// "AESEQ"). Only the first placeholder is replaced.
pub fn resolve_domain_placeholder(variable: &str, domain: &str) -> String {
    variable.replacen("--", domain, 1)
}

pub fn study_file_path(study_path: &str, filename: &str) -> String {
    format!("{study_path}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptors() -> Vec<DatasetDescriptor> {
        vec![
            DatasetDescriptor::new("QS", "qs_1.csv"),
            DatasetDescriptor::new("AE", "ae.csv"),
            DatasetDescriptor::new("QS", "qs_2.csv"),
        ]
    }

    #[test]
    fn detects_split_domains() {
        let datasets = descriptors();
        assert!(is_split_dataset(&datasets, "QS"));
        assert!(!is_split_dataset(&datasets, "AE"));
    }

    #[test]
    fn corresponding_datasets_keep_order() {
        let datasets = descriptors();
        let files: Vec<&str> = corresponding_datasets(&datasets, "QS")
            .into_iter()
            .map(|descriptor| descriptor.filename.as_str())
            .collect();
        assert_eq!(files, vec!["qs_1.csv", "qs_2.csv"]);
    }

    #[test]
    fn distinct_domains_deduplicate() {
        let datasets = descriptors();
        let domains: Vec<&str> = distinct_domain_datasets(&datasets)
            .into_iter()
            .map(|descriptor| descriptor.domain.as_str())
            .collect();
        assert_eq!(domains, vec!["QS", "AE"]);
    }

    #[test]
    fn placeholder_resolves_once() {
        assert_eq!(resolve_domain_placeholder("--SEQ", "AE"), "AESEQ");
        assert_eq!(resolve_domain_placeholder("USUBJID", "AE"), "USUBJID");
        assert_eq!(resolve_domain_placeholder("--TEST--", "QS"), "QSTEST--");
    }
}
