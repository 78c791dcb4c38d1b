//! Data models for the trust analytics client.
//!
//! This module contains the payload returned by the analysis service,
//! the observable upload session, and the report wrapper written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Columns every uploaded dataset must carry for the service to produce
/// meaningful output. Shown to the user as guidance, not checked locally.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    "date",
    "model_decision",
    "human_decision",
    "confidence_note",
];

/// Per-week trust statistics computed by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyMetric {
    /// Week label (e.g. `2024-01-01/2024-01-07`).
    pub week: String,
    /// Fraction of decisions where the human overrode the model.
    pub override_rate: f64,
    /// Fraction of decisions where the human agreed with the model.
    pub trust_score: f64,
    /// Number of decisions recorded in the week.
    pub total_cases: u64,
    /// Mean sentiment of the confidence notes, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_sentiment: Option<f64>,
}

/// Influence coefficients of the override model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MlWeights {
    pub sentiment_weight: f64,
    pub skepticism_weight: f64,
}

/// Tier label the service attaches to each risk case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "LOW"),
            RiskTier::Medium => write!(f, "MEDIUM"),
            RiskTier::High => write!(f, "HIGH"),
        }
    }
}

/// A high-risk decision exemplar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCase {
    /// Free-text note left by the human reviewer.
    pub confidence_note: String,
    /// Predicted probability that the human overrides the model.
    pub override_risk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<RiskTier>,
}

/// A recurring feedback theme with a supporting quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagExplanation {
    pub theme: String,
    pub count: u64,
    pub example: String,
}

/// Priority ranking of a week for intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPriority {
    pub week: String,
    pub priority_score: f64,
}

/// Extended indicators some service versions include.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedAnalysis {
    pub trust_volatility: f64,
    pub trust_decay_rate: f64,
    pub human_ai_alignment_index: f64,
    /// `HEALTHY`, `AT RISK` or `CRITICAL`.
    pub system_health: String,
    #[serde(default)]
    pub intervention_priority: Vec<InterventionPriority>,
    pub counterfactual_trust_gain: f64,
}

/// The complete response of the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub metrics: Vec<WeeklyMetric>,
    pub ml_weights: MlWeights,
    pub rag_explanations: Vec<RagExplanation>,
    pub top_risks: Vec<RiskCase>,
    pub executive_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_analysis: Option<AdvancedAnalysis>,
}

impl AnalysisPayload {
    /// Check that every fraction in the payload is finite and within [0, 1].
    ///
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        for metric in &self.metrics {
            check_fraction("override_rate", &metric.week, metric.override_rate)?;
            check_fraction("trust_score", &metric.week, metric.trust_score)?;
        }

        for (index, case) in self.top_risks.iter().enumerate() {
            check_fraction(
                "override_risk",
                &format!("top_risks[{}]", index),
                case.override_risk,
            )?;
        }

        Ok(())
    }
}

fn check_fraction(field: &str, owner: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} of {} is out of range: {}", field, owner, value))
    }
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl UploadState {
    /// Whether the session has settled (success or error).
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Success | UploadState::Error)
    }
}

/// Snapshot of the upload session, published to observers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UploadSession {
    /// Submission counter; bumped on every accepted submission and reset.
    pub attempt: u64,
    pub state: UploadState,
    pub file_name: Option<String>,
    /// Displayed progress, 0 to 100.
    pub progress: f64,
    pub error_message: Option<String>,
}

/// Metadata about a generated dashboard report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Name of the uploaded file.
    pub file_name: String,
    /// Analysis endpoint the file was submitted to.
    pub endpoint: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Wall-clock duration of the upload in seconds.
    pub duration_seconds: f64,
}

/// The complete dashboard report.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub summary: crate::analysis::DashboardSummary,
    pub payload: AnalysisPayload,
}

impl DashboardReport {
    /// Build a report, deriving the summary from the payload.
    pub fn new(metadata: ReportMetadata, payload: AnalysisPayload) -> Self {
        Self {
            summary: crate::analysis::DashboardSummary::from_payload(&payload),
            metadata,
            payload,
        }
    }
}
