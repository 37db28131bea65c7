//! Terms-factory registry.
//!
//! Each dictionary type (MedDRA, WhoDrug, …) has a factory that produces a
//! parsed term tree from a dictionary path. Factories register under their
//! type name and may be added at runtime; the [`TermsFactory`] trait is the
//! capability contract, enforced by the compiler rather than a runtime
//! class check.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use cre_data::{CacheService, CacheValue};
use cre_model::{EngineError, Result, TermDictionary};

pub const MEDDRA: &str = "meddra";
pub const WHODRUG: &str = "whodrug";

pub trait TermsFactory: Send + Sync + std::fmt::Debug {
    /// Registry name of the dictionary type this factory handles.
    fn dictionary_type(&self) -> &'static str;

    /// Produces a parsed term tree for the dictionary at `dictionary_path`.
    fn load_terms(&self, dictionary_path: &str) -> Result<TermDictionary>;
}

#[derive(Debug, Default)]
pub struct TermsFactoryRegistry {
    factories: BTreeMap<String, Arc<dyn TermsFactory>>,
}

impl TermsFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in MedDRA and WhoDrug factories.
    pub fn with_default_factories() -> Self {
        let mut registry = Self::new();
        let defaults: [Arc<dyn TermsFactory>; 2] =
            [Arc::new(MedDraTermsFactory), Arc::new(WhoDrugTermsFactory)];
        for factory in defaults {
            if let Err(error) = registry.register(factory) {
                tracing::warn!(%error, "skipping default terms factory");
            }
        }
        registry
    }

    /// Registers a factory under its type name, replacing any previous
    /// factory of that name.
    pub fn register(&mut self, factory: Arc<dyn TermsFactory>) -> Result<()> {
        let name = factory.dictionary_type();
        if name.trim().is_empty() {
            return Err(EngineError::Registry {
                message: "dictionary type name must not be empty".to_string(),
            });
        }
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn get(&self, dictionary_type: &str) -> Result<Arc<dyn TermsFactory>> {
        self.factories
            .get(dictionary_type)
            .cloned()
            .ok_or_else(|| EngineError::Registry {
                message: format!(
                    "unknown dictionary type {dictionary_type}; registered types: {}",
                    self.dictionary_types().join(", ")
                ),
            })
    }

    pub fn dictionary_types(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

/// Loads a term tree through the registry and installs it into the cache
/// under its dictionary path, where the validity index expects it.
pub fn install_dictionary(
    registry: &TermsFactoryRegistry,
    cache: &dyn CacheService,
    dictionary_type: &str,
    dictionary_path: &str,
) -> Result<()> {
    let factory = registry.get(dictionary_type)?;
    match factory.load_terms(dictionary_path)? {
        TermDictionary::Meddra(dictionary) => {
            cache.add(dictionary_path, CacheValue::Meddra(dictionary));
        }
        TermDictionary::Whodrug(dictionary) => {
            cache.add(dictionary_path, CacheValue::Whodrug(dictionary));
        }
    }
    Ok(())
}

fn read_term_tree(dictionary_path: &str) -> Result<TermDictionary> {
    let path = Path::new(dictionary_path);
    let file = File::open(path).map_err(|e| EngineError::io(path, e))?;
    serde_json::from_reader(file).map_err(|e| EngineError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Reads a MedDRA term tree persisted as JSON. Parsing the distributed
/// ASCII release into that tree is the installer's job, not the engine's.
#[derive(Debug)]
pub struct MedDraTermsFactory;

impl TermsFactory for MedDraTermsFactory {
    fn dictionary_type(&self) -> &'static str {
        MEDDRA
    }

    fn load_terms(&self, dictionary_path: &str) -> Result<TermDictionary> {
        match read_term_tree(dictionary_path)? {
            tree @ TermDictionary::Meddra(_) => Ok(tree),
            TermDictionary::Whodrug(_) => Err(EngineError::Registry {
                message: format!("{dictionary_path} holds a WhoDrug tree, expected MedDRA"),
            }),
        }
    }
}

/// Reads a WhoDrug term tree persisted as JSON.
#[derive(Debug)]
pub struct WhoDrugTermsFactory;

impl TermsFactory for WhoDrugTermsFactory {
    fn dictionary_type(&self) -> &'static str {
        WHODRUG
    }

    fn load_terms(&self, dictionary_path: &str) -> Result<TermDictionary> {
        match read_term_tree(dictionary_path)? {
            tree @ TermDictionary::Whodrug(_) => Ok(tree),
            TermDictionary::Meddra(_) => Err(EngineError::Registry {
                message: format!("{dictionary_path} holds a MedDRA tree, expected WhoDrug"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cre_model::{MedDraDictionary, WhoDrugDictionary};

    #[derive(Debug)]
    struct UnnamedFactory;

    impl TermsFactory for UnnamedFactory {
        fn dictionary_type(&self) -> &'static str {
            ""
        }

        fn load_terms(&self, _dictionary_path: &str) -> Result<TermDictionary> {
            Ok(TermDictionary::Meddra(MedDraDictionary::default()))
        }
    }

    #[derive(Debug)]
    struct CustomFactory;

    impl TermsFactory for CustomFactory {
        fn dictionary_type(&self) -> &'static str {
            "loinc"
        }

        fn load_terms(&self, _dictionary_path: &str) -> Result<TermDictionary> {
            Ok(TermDictionary::Whodrug(WhoDrugDictionary::default()))
        }
    }

    #[test]
    fn default_registry_knows_both_dictionary_types() {
        let registry = TermsFactoryRegistry::with_default_factories();
        assert!(registry.get(MEDDRA).is_ok());
        assert!(registry.get(WHODRUG).is_ok());
        assert_eq!(registry.dictionary_types(), vec![MEDDRA, WHODRUG]);
    }

    #[test]
    fn empty_type_name_is_rejected() {
        let mut registry = TermsFactoryRegistry::new();
        let err = registry.register(Arc::new(UnnamedFactory)).unwrap_err();
        assert!(matches!(err, EngineError::Registry { .. }));
    }

    #[test]
    fn unknown_type_lists_registered_names() {
        let registry = TermsFactoryRegistry::with_default_factories();
        let err = registry.get("snomed").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("snomed"));
        assert!(message.contains(MEDDRA));
    }

    #[test]
    fn factories_may_be_registered_at_runtime() {
        let mut registry = TermsFactoryRegistry::with_default_factories();
        registry.register(Arc::new(CustomFactory)).expect("register");
        assert!(registry.get("loinc").is_ok());
    }

    #[test]
    fn install_puts_the_parsed_tree_into_the_cache() {
        use cre_data::InMemoryCacheService;
        use cre_model::{HierarchyLevel, MedDraTerm};

        let mut dictionary = MedDraDictionary::default();
        dictionary.insert(HierarchyLevel::Soc, MedDraTerm::new("10", "Cardiac disorders"));
        let tree = TermDictionary::Meddra(dictionary);

        let dir = std::env::temp_dir().join(format!("cre-dictionary-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("meddra.json");
        std::fs::write(&path, serde_json::to_string(&tree).unwrap()).unwrap();
        let path = path.to_string_lossy().to_string();

        let registry = TermsFactoryRegistry::with_default_factories();
        let cache = InMemoryCacheService::new();
        install_dictionary(&registry, &cache, MEDDRA, &path).expect("install");

        let cached = cache.get(&path).expect("installed terms");
        assert!(cached.as_meddra().is_some());

        // the same file refuses to load as WhoDrug
        let err = install_dictionary(&registry, &cache, WHODRUG, &path).unwrap_err();
        assert!(matches!(err, EngineError::Registry { .. }));
    }
}
