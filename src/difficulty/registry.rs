//! Registry mapping each ruleset to its difficulty calculator.
//!
//! The set of rulesets is closed; the registry is filled once at start-up and
//! shared read-only afterwards.

use super::builtin::RosuCalculator;
use super::calculator::DifficultyCalculator;
use crate::error::DifficultyError;
use crate::request::Ruleset;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry holding the calculator for every supported ruleset.
#[derive(Debug, Default)]
pub struct RulesetRegistry {
    calculators: HashMap<Ruleset, Arc<dyn DifficultyCalculator>>,
}

impl RulesetRegistry {
    /// Creates a registry with the rosu-pp calculators for all four rulesets.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        for ruleset in Ruleset::ALL {
            registry.register(Arc::new(RosuCalculator::new(ruleset)));
        }

        registry
    }

    /// Creates a registry with no calculators.
    pub fn empty() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    /// Registers a calculator, replacing any previous one for its ruleset.
    pub fn register(&mut self, calculator: Arc<dyn DifficultyCalculator>) {
        self.calculators.insert(calculator.ruleset(), calculator);
    }

    /// Returns the calculator for the given ruleset.
    pub fn resolve(
        &self,
        ruleset: Ruleset,
    ) -> Result<Arc<dyn DifficultyCalculator>, DifficultyError> {
        self.calculators
            .get(&ruleset)
            .cloned()
            .ok_or(DifficultyError::UnknownRuleset(ruleset.id() as i32))
    }

    /// Returns all registered rulesets with their calculator names.
    pub fn calculators_with_names(&self) -> Vec<(Ruleset, &str)> {
        let mut names: Vec<_> = self
            .calculators
            .iter()
            .map(|(ruleset, calc)| (*ruleset, calc.display_name()))
            .collect();
        names.sort_by_key(|(ruleset, _)| *ruleset);
        names
    }
}
