//! Versioned rule table driving the local triage engine.
//!
//! The table is data, not code: weights, override rules, and thresholds
//! live in JSON so they can be updated without redeploying the engine.
//! Every result records which table version produced it.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::Result;
use crate::models::SeverityLevel;

const DEFAULT_TABLE_JSON: &str = include_str!("tables/default.json");

static EMBEDDED: OnceLock<RuleTable> = OnceLock::new();

/// A multi-symptom override: when every listed symptom is present, the
/// classification is forced to at least the given severity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombinationRule {
    pub symptoms: Vec<String>,
    pub severity: SeverityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct Thresholds {
    /// Cumulative weight at or above which the score tier is `high`
    high: u32,
    /// Cumulative weight at or above which the score tier is `medium`
    medium: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
struct Modifiers {
    age_under_5: u32,
    age_over_60: u32,
    prolonged_duration: u32,
}

/// What triggered a classification, kept for explanation text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A single symptom from the hard emergency list
    EmergencySymptom(String),
    /// A combination override rule
    Combination(Vec<String>),
    /// Cumulative weight scoring
    Score { total: u32 },
}

/// Outcome of evaluating a symptom set against the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub severity: SeverityLevel,
    pub trigger: Trigger,
}

/// The versioned scoring table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleTable {
    pub version: String,
    weights: HashMap<String, u32>,
    emergency_symptoms: HashSet<String>,
    combinations: Vec<CombinationRule>,
    thresholds: Thresholds,
    modifiers: Modifiers,
    #[serde(default = "default_symptom_weight")]
    default_weight: u32,
}

const fn default_symptom_weight() -> u32 {
    1
}

impl RuleTable {
    /// Parse a rule table from raw JSON
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The rule table shipped with this build
    pub fn embedded() -> &'static Self {
        EMBEDDED.get_or_init(|| {
            Self::from_json(DEFAULT_TABLE_JSON).expect("embedded rule table is valid JSON")
        })
    }

    /// Weight for a symptom; unknown symptoms fall back to the default
    /// weight rather than being ignored (fail-safe toward caution).
    fn weight_of(&self, symptom_id: &str) -> u32 {
        self.weights
            .get(symptom_id)
            .copied()
            .unwrap_or(self.default_weight)
    }

    fn tier_for(&self, total: u32) -> SeverityLevel {
        if total >= self.thresholds.high {
            SeverityLevel::High
        } else if total >= self.thresholds.medium {
            SeverityLevel::Medium
        } else {
            SeverityLevel::Low
        }
    }

    /// Evaluate a non-empty symptom set.
    ///
    /// Precedence: single-symptom emergency override, then the most severe
    /// of any matching combination rule and the cumulative-weight tier.
    /// Ties resolve to the more severe outcome.
    pub fn evaluate(&self, symptom_ids: &[&str], prolonged: bool, age: Option<u32>) -> Evaluation {
        if let Some(id) = symptom_ids
            .iter()
            .find(|id| self.emergency_symptoms.contains(**id))
        {
            return Evaluation {
                severity: SeverityLevel::Emergency,
                trigger: Trigger::EmergencySymptom((*id).to_string()),
            };
        }

        let mut combination: Option<&CombinationRule> = None;
        for rule in &self.combinations {
            let matched = rule
                .symptoms
                .iter()
                .all(|symptom| symptom_ids.contains(&symptom.as_str()));
            if matched && combination.is_none_or(|best| rule.severity > best.severity) {
                combination = Some(rule);
            }
        }

        let mut total: u32 = symptom_ids.iter().map(|id| self.weight_of(id)).sum();
        if let Some(age) = age {
            if age < 5 {
                total += self.modifiers.age_under_5;
            } else if age > 60 {
                total += self.modifiers.age_over_60;
            }
        }
        if prolonged {
            total += self.modifiers.prolonged_duration;
        }
        let scored = self.tier_for(total);

        match combination {
            Some(rule) if rule.severity >= scored => Evaluation {
                severity: rule.severity,
                trigger: Trigger::Combination(rule.symptoms.clone()),
            },
            _ => Evaluation {
                severity: scored,
                trigger: Trigger::Score { total },
            },
        }
    }
}
