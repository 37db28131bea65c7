//! WhoDrug reference sets.

use std::collections::BTreeSet;

use cre_model::WhoDrugDictionary;

/// Codes a WhoDrug reference may point at: the ATC-text record codes.
pub fn atc_text_codes(dictionary: &WhoDrugDictionary) -> BTreeSet<String> {
    dictionary.atc_text_codes()
}
