use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Identifier of a rule operation.
///
/// Rule files reference operations by their snake_case string form; parsing
/// an unknown identifier is an [`EngineError::UnsupportedOperation`], which
/// is fatal to that single evaluation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationId {
    Min,
    Max,
    Mean,
    Distinct,
    MinDate,
    MaxDate,
    Dy,
    ExtractMetadata,
    VariableExists,
    VariableValueCount,
    VariableNames,
    ValidMeddraCodeReferences,
    ValidMeddraTermReferences,
    ValidMeddraCodeTermPairs,
    ValidWhodrugReferences,
}

impl OperationId {
    pub const ALL: [OperationId; 15] = [
        OperationId::Min,
        OperationId::Max,
        OperationId::Mean,
        OperationId::Distinct,
        OperationId::MinDate,
        OperationId::MaxDate,
        OperationId::Dy,
        OperationId::ExtractMetadata,
        OperationId::VariableExists,
        OperationId::VariableValueCount,
        OperationId::VariableNames,
        OperationId::ValidMeddraCodeReferences,
        OperationId::ValidMeddraTermReferences,
        OperationId::ValidMeddraCodeTermPairs,
        OperationId::ValidWhodrugReferences,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationId::Min => "min",
            OperationId::Max => "max",
            OperationId::Mean => "mean",
            OperationId::Distinct => "distinct",
            OperationId::MinDate => "min_date",
            OperationId::MaxDate => "max_date",
            OperationId::Dy => "dy",
            OperationId::ExtractMetadata => "extract_metadata",
            OperationId::VariableExists => "variable_exists",
            OperationId::VariableValueCount => "variable_value_count",
            OperationId::VariableNames => "variable_names",
            OperationId::ValidMeddraCodeReferences => "valid_meddra_code_references",
            OperationId::ValidMeddraTermReferences => "valid_meddra_term_references",
            OperationId::ValidMeddraCodeTermPairs => "valid_meddra_code_term_pairs",
            OperationId::ValidWhodrugReferences => "valid_whodrug_references",
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|op| op.as_str() == raw)
            .copied()
            .ok_or_else(|| EngineError::UnsupportedOperation {
                operation: raw.to_string(),
            })
    }
}
