pub mod meddra;
pub mod registry;
pub mod validity;
pub mod whodrug;

pub use registry::{
    MEDDRA, MedDraTermsFactory, TermsFactory, TermsFactoryRegistry, WHODRUG,
    WhoDrugTermsFactory, install_dictionary,
};
pub use validity::DictionaryValidityIndex;
