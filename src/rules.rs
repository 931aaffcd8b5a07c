// 🏷️ Classification Rules - Rules as Data
// Ordered pattern rules mapping free-text service names to categories.
// First matching rule wins, so the order of the list IS the tie-break.

use crate::category::{Category, MegaCategory};
use crate::error::RevenueError;
use anyhow::{Context as AnyhowContext, Result};
use log::{debug, error};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRule {
    /// Rule ID for tracking
    pub id: String,

    /// Case-insensitive regular expression searched anywhere in the name
    pub pattern: String,

    /// Category assigned on match
    pub category: Category,

    /// Description/notes about this rule
    #[serde(default)]
    pub description: Option<String>,
}

impl ClassificationRule {
    pub fn new(id: &str, pattern: &str, category: Category) -> Self {
        ClassificationRule {
            id: id.to_string(),
            pattern: pattern.to_string(),
            category,
            description: None,
        }
    }

    fn compile(&self) -> std::result::Result<Regex, RevenueError> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| RevenueError::InvalidRule {
                id: self.id.clone(),
                reason: e.to_string(),
            })
    }
}

/// Default rule order.
///
/// "Pensat" is checked before "ProBrows", so a name mentioning both lands in
/// Pensat. DermaPen has no category of its own and counts as Microneedling.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new("pensat", r"Pensat", Category::Pensat),
        ClassificationRule::new("probrows", r"ProBrows", Category::ProBrows),
        ClassificationRule::new("epilat", r"Epilat", Category::Epilat),
        // Oxigenera, Oxygenera, Oxigenare, Oxygenare, Oxygen Pro...
        ClassificationRule::new("oxygenera", r"Ox[iy]gen[ae]r[ae]|Oxygen", Category::Oxygenera),
        ClassificationRule::new("laminare", r"Laminare", Category::Laminare),
        ClassificationRule::new("microneedling", r"Microneedling|DermaPen", Category::Microneedling),
        ClassificationRule::new("peeling", r"Peeling", Category::Peeling),
        ClassificationRule::new("tratament", r"Tratament", Category::Tratament),
        ClassificationRule::new("pure_solution", r"Pure Solution", Category::PureSolution),
    ]
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub mega_category: MegaCategory,
    pub rule_id: Option<String>,
}

impl Classification {
    fn unmatched() -> Self {
        Classification {
            category: Category::Other,
            mega_category: MegaCategory::Altele,
            rule_id: None,
        }
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

struct CompiledRule {
    rule: ClassificationRule,
    regex: Regex,
}

pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Engine with the built-in rule order
    pub fn with_default_rules() -> std::result::Result<Self, RevenueError> {
        Self::from_rules(default_rules())
    }

    /// Infallible form of `with_default_rules`. A built-in rule that does not
    /// compile leaves the whole engine empty (everything is `Other`) rather
    /// than shifting the match order.
    pub fn new() -> Self {
        match Self::with_default_rules() {
            Ok(engine) => engine,
            Err(e) => {
                error!("Built-in classification rules rejected: {}", e);
                RuleEngine { rules: Vec::new() }
            }
        }
    }

    /// Load an ordered rule list from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<ClassificationRule> = serde_json::from_str(&content)
            .context("Failed to parse rules JSON")?;

        Ok(RuleEngine::from_rules(rules)?)
    }

    /// Create engine from a list of rules, keeping the given order
    pub fn from_rules(rules: Vec<ClassificationRule>) -> std::result::Result<Self, RevenueError> {
        let compiled = rules
            .into_iter()
            .map(|rule| {
                let regex = rule.compile()?;
                Ok(CompiledRule { rule, regex })
            })
            .collect::<std::result::Result<Vec<_>, RevenueError>>()?;

        Ok(RuleEngine { rules: compiled })
    }

    /// Classify a service name. Total: unmatched names are `Other`.
    pub fn classify(&self, service_name: &str) -> Classification {
        for compiled in &self.rules {
            if compiled.regex.is_match(service_name) {
                debug!("'{}' matched rule {}", service_name, compiled.rule.id);
                let category = compiled.rule.category;
                return Classification {
                    category,
                    mega_category: category.mega_category(),
                    rule_id: Some(compiled.rule.id.clone()),
                };
            }
        }

        Classification::unmatched()
    }

    /// Rules in match order
    pub fn rules(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_compile() {
        let engine = RuleEngine::with_default_rules().unwrap();
        assert_eq!(engine.rule_count(), default_rules().len());
        assert_eq!(RuleEngine::new().rule_count(), engine.rule_count());
    }

    #[test]
    fn test_default_rule_order_kept() {
        let engine = RuleEngine::with_default_rules().unwrap();
        let ids: Vec<String> = engine.rules().map(|r| r.id.clone()).collect();
        let expected: Vec<String> = default_rules().into_iter().map(|r| r.id).collect();

        assert_eq!(ids, expected);
    }

    #[test]
    fn test_one_bad_rule_fails_whole_list() {
        let mut rules = default_rules();
        rules[0].pattern = "(unclosed".to_string();

        assert!(RuleEngine::from_rules(rules).is_err());
    }

    #[test]
    fn test_case_insensitive_match() {
        let engine = RuleEngine::new();

        assert_eq!(engine.classify("EPILAT inghinal").category, Category::Epilat);
        assert_eq!(engine.classify("laminare sprancene").category, Category::Laminare);
    }

    #[test]
    fn test_oxygen_spellings() {
        let engine = RuleEngine::new();

        for name in ["Oxigenera", "Oxygenare faciala", "Tratament Oxygen Pro"] {
            assert_eq!(engine.classify(name).category, Category::Oxygenera, "{}", name);
        }
    }

    #[test]
    fn test_dermapen_is_microneedling() {
        let engine = RuleEngine::new();
        let result = engine.classify("DermaPen 4");

        assert_eq!(result.category, Category::Microneedling);
        assert_eq!(result.mega_category, MegaCategory::Tratamente);
    }

    #[test]
    fn test_overlap_resolves_to_first_rule() {
        let engine = RuleEngine::new();
        let result = engine.classify("Pensat + ProBrows");

        assert_eq!(result.category, Category::Pensat);
        assert_eq!(result.rule_id, Some("pensat".to_string()));
    }

    #[test]
    fn test_custom_order_changes_tie_break() {
        let engine = RuleEngine::from_rules(vec![
            ClassificationRule::new("probrows", "ProBrows", Category::ProBrows),
            ClassificationRule::new("pensat", "Pensat", Category::Pensat),
        ])
        .unwrap();

        assert_eq!(engine.classify("Pensat + ProBrows").category, Category::ProBrows);
    }

    #[test]
    fn test_no_match() {
        let engine = RuleEngine::new();
        let result = engine.classify("Masaj relaxare");

        assert_eq!(result.category, Category::Other);
        assert_eq!(result.mega_category, MegaCategory::Altele);
        assert_eq!(result.rule_id, None);
    }

    #[test]
    fn test_empty_engine_is_total() {
        let engine = RuleEngine::from_rules(Vec::new()).unwrap();
        assert_eq!(engine.classify("Pensat").category, Category::Other);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = RuleEngine::from_rules(vec![ClassificationRule::new("bad", "(", Category::Other)]);
        assert!(matches!(result, Err(RevenueError::InvalidRule { .. })));
    }

    #[test]
    fn test_rules_from_json() {
        let json = r#"[
            {"id": "probrows", "pattern": "ProBrows", "category": "ProBrows"},
            {"id": "pure", "pattern": "pure sol", "category": "Pure Solution", "description": "short form"}
        ]"#;
        let rules: Vec<ClassificationRule> = serde_json::from_str(json).unwrap();
        let engine = RuleEngine::from_rules(rules).unwrap();

        assert_eq!(engine.classify("Pure Solution Detox").category, Category::PureSolution);
        assert_eq!(engine.rules().next().unwrap().id, "probrows");
    }
}
