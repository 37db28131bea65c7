//! Parsed dictionary term trees.
//!
//! Term trees are produced by external terms factories (one per dictionary
//! type) and cached per dictionary path; the engine only derives validity
//! indices from them.

use std::collections::{BTreeMap, BTreeSet};

/// The five MedDRA hierarchy levels, root first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Soc,
    Hlgt,
    Hlt,
    Pt,
    Llt,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 5] = [
        HierarchyLevel::Soc,
        HierarchyLevel::Hlgt,
        HierarchyLevel::Hlt,
        HierarchyLevel::Pt,
        HierarchyLevel::Llt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Soc => "soc",
            HierarchyLevel::Hlgt => "hlgt",
            HierarchyLevel::Hlt => "hlt",
            HierarchyLevel::Pt => "pt",
            HierarchyLevel::Llt => "llt",
        }
    }

    /// Variable suffix of the code column at this level ("AE" + "SOCCD" =
    /// "AESOCCD").
    pub fn code_suffix(&self) -> &'static str {
        match self {
            HierarchyLevel::Soc => "SOCCD",
            HierarchyLevel::Hlgt => "HLGTCD",
            HierarchyLevel::Hlt => "HLTCD",
            HierarchyLevel::Pt => "PTCD",
            HierarchyLevel::Llt => "LLTCD",
        }
    }

    /// Variable suffix of the display-term column at this level. The PT
    /// display variable is the decoded term ("--DECOD").
    pub fn term_suffix(&self) -> &'static str {
        match self {
            HierarchyLevel::Soc => "SOC",
            HierarchyLevel::Hlgt => "HLGT",
            HierarchyLevel::Hlt => "HLT",
            HierarchyLevel::Pt => "DECOD",
            HierarchyLevel::Llt => "LLT",
        }
    }

    pub fn parent(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Soc => None,
            HierarchyLevel::Hlgt => Some(HierarchyLevel::Soc),
            HierarchyLevel::Hlt => Some(HierarchyLevel::Hlgt),
            HierarchyLevel::Pt => Some(HierarchyLevel::Hlt),
            HierarchyLevel::Llt => Some(HierarchyLevel::Pt),
        }
    }
}

/// One coded MedDRA term. `parent_code` points at the term one level up;
/// SOC terms carry none.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MedDraTerm {
    pub code: String,
    pub term: String,
    #[serde(default)]
    pub parent_code: Option<String>,
}

impl MedDraTerm {
    pub fn new(code: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            term: term.into(),
            parent_code: None,
        }
    }

    pub fn with_parent(mut self, parent_code: impl Into<String>) -> Self {
        self.parent_code = Some(parent_code.into());
        self
    }
}

/// A complete MedDRA term tree, terms listed per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MedDraDictionary {
    pub terms: BTreeMap<HierarchyLevel, Vec<MedDraTerm>>,
}

impl MedDraDictionary {
    pub fn terms_at(&self, level: HierarchyLevel) -> &[MedDraTerm] {
        self.terms.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, level: HierarchyLevel, term: MedDraTerm) {
        self.terms.entry(level).or_default().push(term);
    }
}

/// WhoDrug record families. Reference validation reads the ATC-text
/// records; the other families ride along for completeness of the tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WhoDrugRecordKind {
    AtcText,
    AtcClassification,
    DrugDictionary,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WhoDrugRecord {
    pub code: String,
    pub name: String,
}

impl WhoDrugRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WhoDrugDictionary {
    pub records: BTreeMap<WhoDrugRecordKind, Vec<WhoDrugRecord>>,
}

impl WhoDrugDictionary {
    pub fn records_of(&self, kind: WhoDrugRecordKind) -> &[WhoDrugRecord] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, kind: WhoDrugRecordKind, record: WhoDrugRecord) {
        self.records.entry(kind).or_default().push(record);
    }

    /// Codes of the ATC-text records, the reference set for WhoDrug checks.
    pub fn atc_text_codes(&self) -> BTreeSet<String> {
        self.records_of(WhoDrugRecordKind::AtcText)
            .iter()
            .map(|record| record.code.clone())
            .collect()
    }
}

/// A parsed term tree of either supported dictionary type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "dictionary", rename_all = "snake_case")]
pub enum TermDictionary {
    Meddra(MedDraDictionary),
    Whodrug(WhoDrugDictionary),
}
