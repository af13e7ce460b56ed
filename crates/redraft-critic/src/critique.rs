use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

use crate::blocks::{find_fenced_json, find_outer_object, find_tagged_block, TaggedBlock};

/// How serious an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" | "major" => Ok(Severity::High),
            "critical" | "blocker" => Ok(Severity::Critical),
            other => Err(format!("Unknown severity: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single problem found in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default = "default_category")]
    pub category: String,
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_severity() -> Severity {
    Severity::Medium
}

impl Issue {
    pub fn new(category: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            category: category.into(),
            description: description.into(),
            severity,
        }
    }
}

#[derive(Error, Debug)]
pub enum CritiqueParseError {
    #[error("No critique found in critic output")]
    NoCritiqueFound,

    #[error("Failed to parse critique JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("Score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),

    #[error("Invalid critique format: {0}")]
    InvalidFormat(String),
}

/// A scored review of one document version.
///
/// Fields are read-only once built; construction validates the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCritique")]
pub struct Critique {
    overall_score: f64,
    issues: Vec<Issue>,
    missing_sections: BTreeSet<String>,
    suggested_corrections: BTreeMap<String, String>,
}

/// Critique as it arrives from a model, before validation
#[derive(Debug, Deserialize)]
pub struct RawCritique {
    #[serde(alias = "score")]
    overall_score: f64,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    missing_sections: BTreeSet<String>,
    #[serde(default)]
    suggested_corrections: CorrectionsWire,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorrectionsWire {
    Map(BTreeMap<String, String>),
    List(Vec<CorrectionPair>),
}

impl Default for CorrectionsWire {
    fn default() -> Self {
        CorrectionsWire::Map(BTreeMap::new())
    }
}

#[derive(Debug, Deserialize)]
struct CorrectionPair {
    #[serde(alias = "from")]
    original: String,
    #[serde(alias = "to")]
    replacement: String,
}

impl TryFrom<RawCritique> for Critique {
    type Error = CritiqueParseError;

    fn try_from(raw: RawCritique) -> Result<Self, Self::Error> {
        let suggested_corrections = match raw.suggested_corrections {
            CorrectionsWire::Map(map) => map,
            CorrectionsWire::List(pairs) => pairs
                .into_iter()
                .map(|pair| (pair.original, pair.replacement))
                .collect(),
        };

        if suggested_corrections.keys().any(|k| k.is_empty()) {
            return Err(CritiqueParseError::InvalidFormat(
                "suggested correction with empty original fragment".into(),
            ));
        }
        if raw.issues.iter().any(|i| i.description.trim().is_empty()) {
            return Err(CritiqueParseError::InvalidFormat(
                "issue with empty description".into(),
            ));
        }

        Ok(Critique::new(raw.overall_score)?
            .with_issues(raw.issues)
            .with_missing_sections(raw.missing_sections)
            .with_corrections(suggested_corrections))
    }
}

impl Critique {
    /// Create a critique with the given score and nothing else
    pub fn new(overall_score: f64) -> Result<Self, CritiqueParseError> {
        if !overall_score.is_finite() || !(0.0..=1.0).contains(&overall_score) {
            return Err(CritiqueParseError::ScoreOutOfRange(overall_score));
        }
        Ok(Self {
            overall_score,
            issues: Vec::new(),
            missing_sections: BTreeSet::new(),
            suggested_corrections: BTreeMap::new(),
        })
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn with_issues(mut self, issues: impl IntoIterator<Item = Issue>) -> Self {
        self.issues.extend(issues);
        self
    }

    pub fn with_missing_section(mut self, section: impl Into<String>) -> Self {
        self.missing_sections.insert(section.into());
        self
    }

    pub fn with_missing_sections(mut self, sections: impl IntoIterator<Item = String>) -> Self {
        self.missing_sections.extend(sections);
        self
    }

    pub fn with_correction(mut self, original: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.suggested_corrections
            .insert(original.into(), replacement.into());
        self
    }

    pub fn with_corrections(mut self, corrections: impl IntoIterator<Item = (String, String)>) -> Self {
        self.suggested_corrections.extend(corrections);
        self
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn missing_sections(&self) -> &BTreeSet<String> {
        &self.missing_sections
    }

    pub fn suggested_corrections(&self) -> &BTreeMap<String, String> {
        &self.suggested_corrections
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    /// Parse a critique from critic output.
    ///
    /// Looks for, in order:
    /// ```text
    /// <critique>
    /// {"overall_score": 0.72, "issues": [...], "missing_sections": [...], "suggested_corrections": {...}}
    /// </critique>
    /// ```
    /// then a ```json fenced block, then the outermost `{…}` in the output.
    pub fn parse(critic_output: &str) -> Result<Self, CritiqueParseError> {
        debug!(output_len = critic_output.len(), "Parsing critique");

        let payload = Self::locate_payload(critic_output)?;
        let raw: RawCritique = serde_json::from_str(payload)?;
        let critique = Critique::try_from(raw)?;

        debug!(
            score = critique.overall_score,
            issues = critique.issues.len(),
            "Parsed critique"
        );
        Ok(critique)
    }

    fn locate_payload(output: &str) -> Result<&str, CritiqueParseError> {
        match find_tagged_block(output, "critique") {
            TaggedBlock::Found(block) => return Ok(block),
            TaggedBlock::Unterminated => {
                return Err(CritiqueParseError::InvalidFormat(
                    "Unterminated critique block".to_string(),
                ))
            }
            TaggedBlock::Absent => {}
        }

        find_fenced_json(output)
            .or_else(|| find_outer_object(output))
            .ok_or(CritiqueParseError::NoCritiqueFound)
    }

    /// Get a short description of the critique for logging
    pub fn short_description(&self) -> String {
        let mut text = format!("score {:.2}", self.overall_score);
        let mut parts = Vec::new();
        if !self.issues.is_empty() {
            parts.push(format!(
                "{} {}",
                self.issues.len(),
                if self.issues.len() == 1 { "issue" } else { "issues" }
            ));
        }
        if !self.missing_sections.is_empty() {
            parts.push(format!("{} missing", self.missing_sections.len()));
        }
        if !parts.is_empty() {
            text.push_str(&format!(" ({})", parts.join(", ")));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_critique_block() {
        let output = r#"
The letter is mostly sound but omits the fee schedule.

<critique>
{"overall_score": 0.62,
 "issues": [{"category": "completeness", "description": "No fee schedule", "severity": "High"}],
 "missing_sections": ["Fees"],
 "suggested_corrections": {"Dear Sir": "Dear Ms. Patel"}}
</critique>
"#;

        let critique = Critique::parse(output).unwrap();
        assert!((critique.overall_score() - 0.62).abs() < 1e-9);
        assert_eq!(critique.issues().len(), 1);
        assert_eq!(critique.issues()[0].severity, Severity::High);
        assert!(critique.missing_sections().contains("Fees"));
        assert_eq!(
            critique.suggested_corrections().get("Dear Sir").map(String::as_str),
            Some("Dear Ms. Patel")
        );
    }

    #[test]
    fn test_parse_fenced_json_with_defaults() {
        let output = "```json\n{\"score\": 0.9, \"issues\": [{\"description\": \"Tone is stiff\"}]}\n```";
        let critique = Critique::parse(output).unwrap();
        assert_eq!(critique.issues()[0].category, "general");
        assert_eq!(critique.issues()[0].severity, Severity::Medium);
        assert!(critique.missing_sections().is_empty());
    }

    #[test]
    fn test_parse_bare_object() {
        let critique = Critique::parse("Result: {\"overall_score\": 1.0}").unwrap();
        assert_eq!(critique.overall_score(), 1.0);
    }

    #[test]
    fn test_parse_correction_list_form() {
        let output = r#"<critique>{"overall_score": 0.4, "suggested_corrections": [{"original": "teh", "replacement": "the"}]}</critique>"#;
        let critique = Critique::parse(output).unwrap();
        assert_eq!(
            critique.suggested_corrections().get("teh").map(String::as_str),
            Some("the")
        );
    }

    #[test]
    fn test_score_out_of_range_is_rejected() {
        let result = Critique::parse(r#"<critique>{"overall_score": 8.5}</critique>"#);
        assert!(matches!(result, Err(CritiqueParseError::ScoreOutOfRange(s)) if s == 8.5));

        assert!(matches!(
            Critique::new(-0.1),
            Err(CritiqueParseError::ScoreOutOfRange(_))
        ));
        assert!(Critique::new(f64::NAN).is_err());
    }

    #[test]
    fn test_unknown_severity_is_schema_mismatch() {
        let output = r#"<critique>{"overall_score": 0.5, "issues": [{"description": "x", "severity": "catastrophic"}]}</critique>"#;
        assert!(matches!(
            Critique::parse(output),
            Err(CritiqueParseError::JsonParseError(_))
        ));
    }

    #[test]
    fn test_missing_score_is_schema_mismatch() {
        let output = r#"<critique>{"issues": []}</critique>"#;
        assert!(Critique::parse(output).is_err());
    }

    #[test]
    fn test_no_critique_found() {
        let result = Critique::parse("Looks fine to me.");
        assert!(matches!(result, Err(CritiqueParseError::NoCritiqueFound)));
    }

    #[test]
    fn test_unterminated_block() {
        let result = Critique::parse("<critique>{\"overall_score\": 0.5}");
        assert!(matches!(result, Err(CritiqueParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Critique>(r#"{"overall_score": 1.5}"#).is_err());
        let critique: Critique = serde_json::from_str(r#"{"overall_score": 0.5}"#).unwrap();
        assert_eq!(critique.overall_score(), 0.5);
    }

    #[test]
    fn test_short_description() {
        let critique = Critique::new(0.7)
            .unwrap()
            .with_issue(Issue::new("clarity", "Ambiguous scope", Severity::Low))
            .with_missing_section("Termination");
        assert_eq!(critique.short_description(), "score 0.70 (1 issue, 1 missing)");
        assert_eq!(critique.highest_severity(), Some(Severity::Low));
        assert_eq!(Critique::new(0.9).unwrap().short_description(), "score 0.90");
    }
}
