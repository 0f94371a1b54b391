//! Risk categories and the compiled catalogue used to scan plans

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::search::Action;

/// Issue severity, ordered from least to most serious
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    #[default]
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{}' (low, medium, high, critical)", other)),
        }
    }
}

/// A configurable risk category
///
/// Patterns are case-insensitive regexes matched against the normalized
/// action descriptor (lowercase, punctuation replaced by spaces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    pub category: String,
    pub severity: Severity,
    pub patterns: Vec<String>,
    #[serde(default, rename = "suggested-alternative", skip_serializing_if = "Option::is_none")]
    pub suggested_alternative: Option<String>,
}

impl RiskRule {
    fn builtin(category: &str, severity: Severity, patterns: &[&str], alternative: &str) -> Self {
        Self {
            category: category.to_string(),
            severity,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            suggested_alternative: Some(alternative.to_string()),
        }
    }

    /// Built-in categories
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::builtin(
                "irreversible",
                Severity::Critical,
                &[r"\b(delete|drop|destroy|wipe|purge|truncate|shred|erase)\b", r"\brm\s+rf\b"],
                "Archive or soft-delete instead, and keep a restorable backup",
            ),
            Self::builtin(
                "credential",
                Severity::High,
                &[r"\b(password|passwd|credentials?|secrets?|api\s?keys?|private\s+key|ssh\s+key|tokens?)\b"],
                "Use a scoped, short-lived credential issued by a secrets manager",
            ),
            Self::builtin(
                "privilege",
                Severity::High,
                &[r"\b(sudo|chmod|chown|escalate|privileges?|grant\s+admin|root\s+access)\b"],
                "Run with the least privilege the step needs",
            ),
            Self::builtin(
                "financial",
                Severity::Medium,
                &[r"\b(pay|payment|purchase|charge|transfer|refund|invoice|wire)\b"],
                "Require explicit confirmation of the amount before paying",
            ),
            Self::builtin(
                "external-communication",
                Severity::Low,
                &[r"\b(email|send|post|publish|tweet|sms|notify)\b"],
                "Draft the message for review instead of sending it",
            ),
        ]
    }
}

#[derive(Debug, Error)]
pub enum RiskCatalogError {
    #[error("Invalid pattern '{pattern}' in risk category '{category}': {source}")]
    Pattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: RiskRule,
    patterns: Vec<Regex>,
}

/// A risk hit for one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskMatch<'a> {
    pub category: &'a str,
    pub severity: Severity,
    pub suggested_alternative: Option<&'a str>,
}

/// Compiled set of risk categories
#[derive(Debug, Clone)]
pub struct RiskCatalog {
    rules: Vec<CompiledRule>,
}

impl RiskCatalog {
    pub fn new(rules: &[RiskRule]) -> Result<Self, RiskCatalogError> {
        debug!(rule_count = rules.len(), "RiskCatalog::new: called");
        let rules = rules
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .map_err(|source| RiskCatalogError::Pattern {
                                category: rule.category.clone(),
                                pattern: p.clone(),
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledRule {
                    rule: rule.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>, RiskCatalogError>>()?;
        Ok(Self { rules })
    }

    /// A catalogue with no categories; nothing is ever flagged
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.rule.category.as_str())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.categories().any(|c| c == category)
    }

    /// Every category the action falls into, in catalogue order
    pub fn classify(&self, action: &Action) -> Vec<RiskMatch<'_>> {
        let text = action.normalized();
        self.rules
            .iter()
            .filter(|r| r.patterns.iter().any(|p| p.is_match(&text)))
            .map(|r| RiskMatch {
                category: &r.rule.category,
                severity: r.rule.severity,
                suggested_alternative: r.rule.suggested_alternative.as_deref(),
            })
            .collect()
    }

    /// True when the action falls into any of `categories`
    pub fn matches_any(&self, action: &Action, categories: &[String]) -> bool {
        if categories.is_empty() {
            return false;
        }
        self.classify(action)
            .iter()
            .any(|m| categories.iter().any(|c| c == m.category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> RiskCatalog {
        RiskCatalog::new(&RiskRule::defaults()).unwrap()
    }

    fn categories_of(tool: &str, input: &str) -> Vec<String> {
        builtin()
            .classify(&Action::new(tool, input))
            .iter()
            .map(|m| m.category.to_string())
            .collect()
    }

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("severe".parse::<Severity>().is_err());
        assert_eq!(Severity::default(), Severity::High);
    }

    #[test]
    fn test_default_categories() {
        let catalog = builtin();
        let names: Vec<&str> = catalog.categories().collect();
        assert_eq!(
            names,
            vec!["irreversible", "credential", "privilege", "financial", "external-communication"]
        );
    }

    #[test]
    fn test_classify_matches_snake_case_tools() {
        assert_eq!(categories_of("delete_database", "prod"), vec!["irreversible"]);
        assert_eq!(categories_of("run_shell", "rm -rf /tmp/x"), vec!["irreversible"]);
        assert_eq!(categories_of("read_secret", "API_KEY"), vec!["credential"]);
        assert_eq!(categories_of("send_email", "bob"), vec!["external-communication"]);
        assert_eq!(categories_of("pay_invoice", "42"), vec!["financial"]);
        assert!(categories_of("search_flights", "SFO").is_empty());
        assert!(categories_of("book_hotel", "NYC").is_empty());
    }

    #[test]
    fn test_multiple_categories() {
        let cats = categories_of("sudo", "delete users");
        assert_eq!(cats, vec!["irreversible", "privilege"]);
    }

    #[test]
    fn test_matches_any() {
        let catalog = builtin();
        let action = Action::new("drop_table", "users");
        assert!(catalog.matches_any(&action, &["irreversible".to_string()]));
        assert!(!catalog.matches_any(&action, &["financial".to_string()]));
        assert!(!catalog.matches_any(&action, &[]));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let rules = vec![RiskRule {
            category: "broken".to_string(),
            severity: Severity::Low,
            patterns: vec!["(".to_string()],
            suggested_alternative: None,
        }];
        let err = RiskCatalog::new(&rules).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_rules_roundtrip_yaml() {
        let yaml = serde_yaml::to_string(&RiskRule::defaults()).unwrap();
        assert!(yaml.contains("suggested-alternative"));
        let back: Vec<RiskRule> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, RiskRule::defaults());
    }
}
