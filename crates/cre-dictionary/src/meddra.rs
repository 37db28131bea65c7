//! Derived MedDRA validity indices.
//!
//! A term is only part of a hierarchy chain when every ancestor up to its
//! SOC resolves; orphaned terms contribute no chain but still contribute
//! their (code, term) pair at their own level.

use std::collections::{BTreeMap, HashMap, HashSet};

use cre_model::{HierarchyLevel, MedDraDictionary, MedDraTerm};

pub fn code_hierarchies_key(dictionary_path: &str) -> String {
    format!("meddra_valid_code_hierarchies_{dictionary_path}")
}

pub fn term_hierarchies_key(dictionary_path: &str) -> String {
    format!("meddra_valid_term_hierarchies_{dictionary_path}")
}

pub fn code_term_pairs_key(dictionary_path: &str) -> String {
    format!("meddra_code_term_pairs_{dictionary_path}")
}

/// Every fully-resolvable SOC→LLT chain in the dictionary.
fn hierarchy_chains(dictionary: &MedDraDictionary) -> Vec<[&MedDraTerm; 5]> {
    let soc = level_index(dictionary, HierarchyLevel::Soc);
    let hlgt = level_index(dictionary, HierarchyLevel::Hlgt);
    let hlt = level_index(dictionary, HierarchyLevel::Hlt);
    let pt = level_index(dictionary, HierarchyLevel::Pt);

    let mut chains = Vec::new();
    for llt_term in dictionary.terms_at(HierarchyLevel::Llt) {
        let Some(pt_term) = parent_of(llt_term, &pt) else {
            continue;
        };
        let Some(hlt_term) = parent_of(pt_term, &hlt) else {
            continue;
        };
        let Some(hlgt_term) = parent_of(hlt_term, &hlgt) else {
            continue;
        };
        let Some(soc_term) = parent_of(hlgt_term, &soc) else {
            continue;
        };
        chains.push([soc_term, hlgt_term, hlt_term, pt_term, llt_term]);
    }
    chains
}

fn level_index(
    dictionary: &MedDraDictionary,
    level: HierarchyLevel,
) -> HashMap<&str, &MedDraTerm> {
    dictionary
        .terms_at(level)
        .iter()
        .map(|term| (term.code.as_str(), term))
        .collect()
}

fn parent_of<'a>(
    term: &MedDraTerm,
    parents: &HashMap<&str, &'a MedDraTerm>,
) -> Option<&'a MedDraTerm> {
    parents.get(term.parent_code.as_deref()?).copied()
}

/// "/"-joined SOC→LLT code chains.
pub fn code_hierarchies(dictionary: &MedDraDictionary) -> HashSet<String> {
    hierarchy_chains(dictionary)
        .iter()
        .map(|chain| {
            chain
                .iter()
                .map(|term| term.code.as_str())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

/// "/"-joined SOC→LLT display-term chains.
pub fn term_hierarchies(dictionary: &MedDraDictionary) -> HashSet<String> {
    hierarchy_chains(dictionary)
        .iter()
        .map(|chain| {
            chain
                .iter()
                .map(|term| term.term.as_str())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

/// Valid (code, term) pairs per hierarchy level.
pub fn code_term_pairs(
    dictionary: &MedDraDictionary,
) -> BTreeMap<HierarchyLevel, HashSet<(String, String)>> {
    let mut pairs: BTreeMap<HierarchyLevel, HashSet<(String, String)>> = BTreeMap::new();
    for level in HierarchyLevel::ALL {
        let level_pairs = dictionary
            .terms_at(level)
            .iter()
            .map(|term| (term.code.clone(), term.term.clone()))
            .collect();
        pairs.insert(level, level_pairs);
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> MedDraDictionary {
        let mut dictionary = MedDraDictionary::default();
        dictionary.insert(
            HierarchyLevel::Soc,
            MedDraTerm::new("10", "Cardiac disorders"),
        );
        dictionary.insert(
            HierarchyLevel::Hlgt,
            MedDraTerm::new("20", "Arrhythmias").with_parent("10"),
        );
        dictionary.insert(
            HierarchyLevel::Hlt,
            MedDraTerm::new("30", "Rate disorders").with_parent("20"),
        );
        dictionary.insert(
            HierarchyLevel::Pt,
            MedDraTerm::new("40", "Bradycardia").with_parent("30"),
        );
        dictionary.insert(
            HierarchyLevel::Llt,
            MedDraTerm::new("50", "Heart rate low").with_parent("40"),
        );
        // an orphan: parent code resolves nowhere
        dictionary.insert(
            HierarchyLevel::Llt,
            MedDraTerm::new("51", "Unlinked term").with_parent("99"),
        );
        dictionary
    }

    #[test]
    fn full_chains_only() {
        let chains = code_hierarchies(&dictionary());
        assert_eq!(chains, HashSet::from(["10/20/30/40/50".to_string()]));
    }

    #[test]
    fn term_chains_use_display_terms() {
        let chains = term_hierarchies(&dictionary());
        assert!(chains.contains(
            "Cardiac disorders/Arrhythmias/Rate disorders/Bradycardia/Heart rate low"
        ));
    }

    #[test]
    fn pairs_cover_orphans_too() {
        let pairs = code_term_pairs(&dictionary());
        let llt = pairs.get(&HierarchyLevel::Llt).expect("llt pairs");
        assert!(llt.contains(&("50".to_string(), "Heart rate low".to_string())));
        assert!(llt.contains(&("51".to_string(), "Unlinked term".to_string())));
        let pt = pairs.get(&HierarchyLevel::Pt).expect("pt pairs");
        assert_eq!(pt.len(), 1);
    }

    #[test]
    fn keys_namespace_by_path() {
        assert_ne!(code_hierarchies_key("/a"), code_hierarchies_key("/b"));
        assert_ne!(code_hierarchies_key("/a"), term_hierarchies_key("/a"));
    }
}
