//! Column selection by variable metadata.
//!
//! Rules that target "all collected, expected variables" resolve their
//! column list here: a column qualifies when its definition metadata and
//! its library metadata both match the requested origin type and core
//! status.

use std::collections::BTreeMap;

/// Per-variable definition metadata, as supplied by the study definition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DefineVariableMetadata {
    pub name: String,
    #[serde(default)]
    pub origin_type: Option<String>,
}

impl DefineVariableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin_type: None,
        }
    }

    pub fn with_origin_type(mut self, origin_type: impl Into<String>) -> Self {
        self.origin_type = Some(origin_type.into());
        self
    }
}

/// Per-variable standards-library metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LibraryVariableMetadata {
    #[serde(default)]
    pub core_status: Option<String>,
}

impl LibraryVariableMetadata {
    pub fn with_core_status(core_status: impl Into<String>) -> Self {
        Self {
            core_status: Some(core_status.into()),
        }
    }
}

/// Keeps the columns whose define origin type and library core status both
/// equal the requested values. A column with no define metadata never
/// qualifies.
pub fn filter_columns_by_variable_metadata(
    columns: &[String],
    define_metadata: &[DefineVariableMetadata],
    library_metadata: &BTreeMap<String, LibraryVariableMetadata>,
    origin_type: Option<&str>,
    core_status: Option<&str>,
) -> Vec<String> {
    columns
        .iter()
        .filter(|column| {
            let Some(define) = define_metadata
                .iter()
                .find(|entry| entry.name == **column)
            else {
                return false;
            };
            let origin_matches = define.origin_type.as_deref() == origin_type;
            let core_matches = library_metadata
                .get(*column)
                .and_then(|entry| entry.core_status.as_deref())
                == core_status;
            origin_matches && core_matches
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_origin_and_core_must_match() {
        let columns = vec![
            "AETERM".to_string(),
            "AESEV".to_string(),
            "AEUNKNOWN".to_string(),
        ];
        let define = vec![
            DefineVariableMetadata::new("AETERM").with_origin_type("Collected"),
            DefineVariableMetadata::new("AESEV").with_origin_type("Derived"),
        ];
        let library = BTreeMap::from([
            (
                "AETERM".to_string(),
                LibraryVariableMetadata::with_core_status("Exp"),
            ),
            (
                "AESEV".to_string(),
                LibraryVariableMetadata::with_core_status("Exp"),
            ),
        ]);

        let selected = filter_columns_by_variable_metadata(
            &columns,
            &define,
            &library,
            Some("Collected"),
            Some("Exp"),
        );
        assert_eq!(selected, vec!["AETERM".to_string()]);
    }

    #[test]
    fn missing_define_metadata_never_qualifies() {
        let columns = vec!["AETERM".to_string()];
        let selected = filter_columns_by_variable_metadata(
            &columns,
            &[],
            &BTreeMap::new(),
            None,
            None,
        );
        assert!(selected.is_empty());
    }
}
