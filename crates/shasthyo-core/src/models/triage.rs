//! Triage request/result value objects

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::UserId;
use super::symptom::SymptomRef;

/// A unique identifier for a triage result, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(Uuid);

impl ResultId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResultId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Severity classification tiers, least to most severe.
///
/// The derived ordering matters: tie-breaking always resolves toward the
/// more severe tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Emergency,
}

impl SeverityLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "emergency" => Ok(Self::Emergency),
            other => Err(format!("unknown severity level: {other}")),
        }
    }
}

/// How long the symptoms have been present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymptomDuration {
    #[serde(rename = "less_than_day")]
    LessThanDay,
    #[serde(rename = "one_to_three_days")]
    OneToThreeDays,
    #[serde(rename = "more_than_3_days")]
    MoreThanThreeDays,
    #[serde(rename = "more_than_week")]
    MoreThanWeek,
}

impl SymptomDuration {
    /// Prolonged symptoms weigh extra in the rule table
    pub const fn is_prolonged(self) -> bool {
        matches!(self, Self::MoreThanThreeDays | Self::MoreThanWeek)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LessThanDay => "less_than_day",
            Self::OneToThreeDays => "one_to_three_days",
            Self::MoreThanThreeDays => "more_than_3_days",
            Self::MoreThanWeek => "more_than_week",
        }
    }
}

impl FromStr for SymptomDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "less_than_day" => Ok(Self::LessThanDay),
            "one_to_three_days" => Ok(Self::OneToThreeDays),
            "more_than_3_days" => Ok(Self::MoreThanThreeDays),
            "more_than_week" => Ok(Self::MoreThanWeek),
            other => Err(format!("unknown duration: {other}")),
        }
    }
}

/// One triage submission, constructed per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageRequest {
    pub user_id: UserId,
    pub symptoms: Vec<SymptomRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<SymptomDuration>,
}

/// The outcome of a triage, local or authoritative.
///
/// Immutable once created. A server-confirmed result for a submission that
/// was first classified offline is a *new* record with its own ID; the
/// provisional local result is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    /// Unique identifier
    pub id: ResultId,
    /// Severity classification
    pub severity_level: SeverityLevel,
    /// Why this classification was made (bilingual)
    #[serde(rename = "ai_explanation")]
    pub explanation: String,
    /// Guidance in Bangla
    #[serde(rename = "guidance_bangla")]
    pub guidance_bn: String,
    /// Guidance in English
    #[serde(rename = "guidance_english")]
    pub guidance_en: String,
    /// True for provisional, locally computed results
    pub is_offline_result: bool,
    /// Version of the rule table that produced an offline result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_version: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A past triage record fetched from the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub symptoms: Vec<SymptomRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<SymptomDuration>,
    pub severity_level: SeverityLevel,
    #[serde(rename = "ai_explanation", default)]
    pub explanation: Option<String>,
    #[serde(rename = "guidance_bangla", default)]
    pub guidance_bn: Option<String>,
    #[serde(rename = "guidance_english", default)]
    pub guidance_en: Option<String>,
    pub is_offline_result: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_least_to_most_severe() {
        assert!(SeverityLevel::Low < SeverityLevel::Medium);
        assert!(SeverityLevel::Medium < SeverityLevel::High);
        assert!(SeverityLevel::High < SeverityLevel::Emergency);
    }

    #[test]
    fn severity_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&SeverityLevel::Emergency).unwrap(),
            "\"emergency\""
        );
        assert_eq!("medium".parse::<SeverityLevel>().unwrap(), SeverityLevel::Medium);
    }

    #[test]
    fn duration_uses_backend_ids() {
        assert_eq!(
            serde_json::to_string(&SymptomDuration::MoreThanThreeDays).unwrap(),
            "\"more_than_3_days\""
        );
        assert!(SymptomDuration::MoreThanWeek.is_prolonged());
        assert!(!SymptomDuration::LessThanDay.is_prolonged());
    }

    #[test]
    fn triage_result_uses_backend_field_names() {
        let result = TriageResult {
            id: ResultId::new(),
            severity_level: SeverityLevel::Low,
            explanation: "because".to_string(),
            guidance_bn: "বিশ্রাম নিন".to_string(),
            guidance_en: "Rest".to_string(),
            is_offline_result: true,
            rule_version: Some("2026.1".to_string()),
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("ai_explanation").is_some());
        assert!(json.get("guidance_bangla").is_some());
        assert!(json.get("guidance_english").is_some());
        assert!(json.get("explanation").is_none());
    }
}
