//! Trust metric aggregation.
//!
//! Pure functions that turn the analysis payload into display-ready values:
//! summary statistics, the trust-failure risk score and chart series.
//! Nothing here is cached; every call recomputes from its arguments.

use crate::models::{AnalysisPayload, RiskCase, WeeklyMetric};
use serde::Serialize;
use std::fmt;

/// Risk scores strictly above this are classified as high.
pub const HIGH_RISK_THRESHOLD: u8 = 60;

/// Risk scores strictly above this (and up to the high threshold) are medium.
pub const MEDIUM_RISK_THRESHOLD: u8 = 30;

/// Average trust above this trends up.
const TRUST_TREND_THRESHOLD: f64 = 0.6;

/// Average override rate below this trends up.
const OVERRIDE_TREND_THRESHOLD: f64 = 0.3;

/// Classification of the aggregate trust-failure risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify a 0-100 risk score.
    pub fn from_score(score: u8) -> Self {
        if score > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if score > MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Start and end colour of the risk meter for this band.
    pub fn meter_gradient(&self) -> (&'static str, &'static str) {
        match self {
            RiskLevel::High => ("hsl(0, 84%, 60%)", "hsl(30, 84%, 60%)"),
            RiskLevel::Medium => ("hsl(30, 84%, 60%)", "hsl(60, 84%, 60%)"),
            RiskLevel::Low => ("hsl(187, 92%, 50%)", "hsl(120, 60%, 50%)"),
        }
    }

    /// Returns an emoji representation of the level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Direction indicator shown next to a stat card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
        }
    }
}

/// One point of the weekly chart, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub week: String,
    pub trust_score: f64,
    pub override_rate: f64,
}

fn mean(values: impl Iterator<Item = f64>, len: usize) -> f64 {
    values.sum::<f64>() / len.max(1) as f64
}

/// Mean trust score across all weeks; 0 for an empty list.
pub fn average_trust_score(metrics: &[WeeklyMetric]) -> f64 {
    mean(metrics.iter().map(|m| m.trust_score), metrics.len())
}

/// Mean override rate across all weeks; 0 for an empty list.
pub fn average_override_rate(metrics: &[WeeklyMetric]) -> f64 {
    mean(metrics.iter().map(|m| m.override_rate), metrics.len())
}

/// Total number of decisions across all weeks.
pub fn total_decisions(metrics: &[WeeklyMetric]) -> u64 {
    metrics.iter().map(|m| m.total_cases).sum()
}

/// Scale each week's fractions to percentages for charting.
pub fn chart_series(metrics: &[WeeklyMetric]) -> Vec<ChartPoint> {
    metrics
        .iter()
        .map(|m| ChartPoint {
            week: m.week.clone(),
            trust_score: m.trust_score * 100.0,
            override_rate: m.override_rate * 100.0,
        })
        .collect()
}

/// Mean override risk of the top cases, scaled to a 0-100 integer.
pub fn trust_failure_risk_score(cases: &[RiskCase]) -> u8 {
    let avg = mean(cases.iter().map(|c| c.override_risk), cases.len());
    (avg.max(0.0) * 100.0).round().min(100.0) as u8
}

/// A single case's override risk as a whole percentage.
pub fn case_risk_percent(case: &RiskCase) -> u8 {
    (case.override_risk.max(0.0) * 100.0).round().min(100.0) as u8
}

pub fn trust_trend(avg_trust: f64) -> Trend {
    if avg_trust > TRUST_TREND_THRESHOLD {
        Trend::Up
    } else {
        Trend::Down
    }
}

pub fn override_trend(avg_override: f64) -> Trend {
    if avg_override < OVERRIDE_TREND_THRESHOLD {
        Trend::Up
    } else {
        Trend::Down
    }
}

/// Format an influence coefficient for display.
pub fn format_weight(weight: f64) -> String {
    format!("{:.2}", weight)
}

/// Split an executive summary into sentence-like units.
///
/// Splits on the literal `". "`, so abbreviations and decimals are cut
/// too. Each retained unit ends with exactly one period.
pub fn segment_narrative(text: &str) -> Vec<String> {
    text.split(". ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.ends_with('.') {
                s.to_string()
            } else {
                format!("{}.", s)
            }
        })
        .collect()
}

/// Everything the dashboard displays, derived from one payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub average_trust_score: f64,
    pub average_override_rate: f64,
    pub total_decisions: u64,
    pub trust_trend: Trend,
    pub override_trend: Trend,
    pub chart_series: Vec<ChartPoint>,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    /// Start and end colour of the risk meter.
    pub meter_gradient: (&'static str, &'static str),
    pub sentiment_weight: String,
    pub skepticism_weight: String,
    pub narrative: Vec<String>,
}

impl DashboardSummary {
    pub fn from_payload(payload: &AnalysisPayload) -> Self {
        let average_trust_score = average_trust_score(&payload.metrics);
        let average_override_rate = average_override_rate(&payload.metrics);
        let risk_score = trust_failure_risk_score(&payload.top_risks);
        let risk_level = RiskLevel::from_score(risk_score);

        Self {
            average_trust_score,
            average_override_rate,
            total_decisions: total_decisions(&payload.metrics),
            trust_trend: trust_trend(average_trust_score),
            override_trend: override_trend(average_override_rate),
            chart_series: chart_series(&payload.metrics),
            risk_score,
            risk_level,
            meter_gradient: risk_level.meter_gradient(),
            sentiment_weight: format_weight(payload.ml_weights.sentiment_weight),
            skepticism_weight: format_weight(payload.ml_weights.skepticism_weight),
            narrative: segment_narrative(&payload.executive_summary),
        }
    }
}
