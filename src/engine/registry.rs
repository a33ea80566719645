use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::engine::strategy::{Cpp, ExecutionStrategy, Java, JavaScript, Python, TypeScript};

/// Immutable table of registered languages.
///
/// Built exactly once per process and never mutated afterwards, so it can be
/// read from any number of concurrent requests without synchronization. The
/// backing map is ordered, which keeps the supported-language listing sorted
/// for error messages.
pub struct LanguageRegistry {
    strategies: BTreeMap<&'static str, Arc<dyn ExecutionStrategy>>,
}

impl LanguageRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static LanguageRegistry {
        static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();
        REGISTRY.get_or_init(LanguageRegistry::with_builtin_languages)
    }

    fn with_builtin_languages() -> Self {
        let strategies: Vec<Arc<dyn ExecutionStrategy>> = vec![
            Arc::new(Python),
            Arc::new(JavaScript),
            Arc::new(TypeScript),
            Arc::new(Java),
            Arc::new(Cpp),
        ];

        Self {
            strategies: strategies.into_iter().map(|s| (s.id(), s)).collect(),
        }
    }

    /// Look up a language identifier, case-insensitively after trimming.
    pub fn resolve(&self, language: &str) -> Option<Arc<dyn ExecutionStrategy>> {
        let normalized = language.trim().to_lowercase();
        self.strategies.get(normalized.as_str()).cloned()
    }

    /// Registered identifiers in sorted order.
    pub fn supported_languages(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_languages() {
        let registry = LanguageRegistry::global();
        for id in ["python", "javascript", "typescript", "java", "cpp"] {
            let strategy = registry.resolve(id).unwrap();
            assert_eq!(strategy.id(), id);
        }
    }

    #[test]
    fn resolve_trims_and_lowercases() {
        let registry = LanguageRegistry::global();
        assert_eq!(registry.resolve("  Python ").unwrap().id(), "python");
        assert_eq!(registry.resolve("JAVA").unwrap().id(), "java");
    }

    #[test]
    fn unknown_language_is_a_miss() {
        let registry = LanguageRegistry::global();
        assert!(registry.resolve("ruby").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn supported_languages_are_sorted() {
        let ids = LanguageRegistry::global().supported_languages();
        assert_eq!(ids, vec!["cpp", "java", "javascript", "python", "typescript"]);
    }
}
