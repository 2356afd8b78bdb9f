use std::sync::Arc;

use analysis_core::{RegistryError, TextAnalyzer};

use crate::{LexicalAnalyzer, MlProxyAnalyzer, SemanticAnalyzer, StylisticAnalyzer, SyntacticAnalyzer};

pub type AnalyzerFactory = fn() -> Arc<dyn TextAnalyzer>;

/// Startup-time table from analyzer identifier to constructor.
///
/// Registration order is preserved and is the order the ensemble reports
/// and iterates analyzers in.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    entries: Vec<(&'static str, AnalyzerFactory)>,
}

fn lexical() -> Arc<dyn TextAnalyzer> {
    Arc::new(LexicalAnalyzer::new())
}

fn syntactic() -> Arc<dyn TextAnalyzer> {
    Arc::new(SyntacticAnalyzer::new())
}

fn semantic() -> Arc<dyn TextAnalyzer> {
    Arc::new(SemanticAnalyzer::new())
}

fn stylistic() -> Arc<dyn TextAnalyzer> {
    Arc::new(StylisticAnalyzer::new())
}

fn ml() -> Arc<dyn TextAnalyzer> {
    Arc::new(MlProxyAnalyzer::new())
}

impl AnalyzerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in analyzers.
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ("lexical", lexical as AnalyzerFactory),
                ("syntactic", syntactic),
                ("semantic", semantic),
                ("stylistic", stylistic),
                ("ml", ml),
            ],
        }
    }

    pub fn register(&mut self, name: &'static str, factory: AnalyzerFactory) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::DuplicateAnalyzer(name.to_string()));
        }
        self.entries.push((name, factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn TextAnalyzer>, RegistryError> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| RegistryError::UnknownAnalyzer {
                name: name.to_string(),
                available: self.names().iter().map(|s| s.to_string()).collect(),
            })
    }

    /// Instantiates the named analyzers, in the order given.
    pub fn create_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn TextAnalyzer>>, RegistryError> {
        let analyzers = names
            .iter()
            .map(|n| self.create(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Instantiated {} analyzers", analyzers.len());
        Ok(analyzers)
    }

    /// Instantiates every registered analyzer.
    pub fn create_every(&self) -> Vec<Arc<dyn TextAnalyzer>> {
        self.entries.iter().map(|(_, factory)| factory()).collect()
    }

    /// `(name, description)` for every registered analyzer.
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        self.entries
            .iter()
            .map(|(name, factory)| (*name, factory().description()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, AnalyzerEstimate, MetricSet};

    struct Echo;

    impl TextAnalyzer for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn analyze(&self, _text: &str) -> Result<MetricSet, AnalysisError> {
            Ok(MetricSet::new(1.0))
        }

        fn predict(&self, metrics: MetricSet) -> AnalyzerEstimate {
            AnalyzerEstimate::new(self.name(), 0.5, metrics)
        }
    }

    fn echo() -> Arc<dyn TextAnalyzer> {
        Arc::new(Echo)
    }

    #[test]
    fn builtin_names_match_analyzers() {
        let registry = AnalyzerRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["lexical", "syntactic", "semantic", "stylistic", "ml"]
        );
        for name in registry.names() {
            assert_eq!(registry.create(name).unwrap().name(), name);
        }
        assert!(registry.describe().iter().all(|(_, d)| !d.is_empty()));
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = AnalyzerRegistry::builtin().create_all(&["lexical", "neural"]).err().unwrap();
        match err {
            RegistryError::UnknownAnalyzer { name, available } => {
                assert_eq!(name, "neural");
                assert_eq!(available.len(), 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn custom_analyzers_can_be_registered_once() {
        let mut registry = AnalyzerRegistry::builtin();
        registry.register("echo", echo).unwrap();
        assert!(registry.contains("echo"));
        assert_eq!(registry.create_every().len(), 6);
        assert_eq!(
            registry.register("echo", echo),
            Err(RegistryError::DuplicateAnalyzer("echo".into()))
        );
    }
}
