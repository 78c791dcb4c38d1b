//! Dashboard report generation.
//!
//! Renders the analysis payload and its derived summary as a Markdown
//! dashboard or as JSON.

use crate::analysis::{case_risk_percent, ChartPoint, DashboardSummary, RiskLevel};
use crate::config::ReportConfig;
use crate::models::{
    AdvancedAnalysis, DashboardReport, RagExplanation, ReportMetadata, RiskCase,
    REQUIRED_COLUMNS,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &DashboardReport, config: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# TrustScope Dashboard\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report, config));
    output.push_str(&generate_analytics_section(&report.summary));

    if config.include_chart_table {
        output.push_str(&generate_chart_section(&report.summary.chart_series));
    }

    output.push_str(&generate_insights_section(report, config.meter_width));

    if config.include_advanced {
        if let Some(ref advanced) = report.payload.advanced_analysis {
            output.push_str(&generate_advanced_section(advanced));
        }
    }

    output.push_str(&generate_summary_section(&report.summary.narrative));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.file_name));
    section.push_str(&format!("- **Analysis Service:** {}\n", metadata.endpoint));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Upload Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push_str(&format!(
        "- **Expected Columns:** {}\n",
        REQUIRED_COLUMNS.join(", ")
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &DashboardReport, config: &ReportConfig) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Trust Analytics](#trust-analytics)\n");

    if config.include_chart_table {
        toc.push_str("- [Weekly Trend](#weekly-trend)\n");
    }

    toc.push_str("- [AI-Powered Insights](#ai-powered-insights)\n");

    if config.include_advanced && report.payload.advanced_analysis.is_some() {
        toc.push_str("- [Advanced Analysis](#advanced-analysis)\n");
    }

    toc.push_str("- [Executive Summary](#executive-summary)\n\n");

    toc
}

/// Generate the stat-card table.
fn generate_analytics_section(summary: &DashboardSummary) -> String {
    let mut section = String::new();

    section.push_str("## Trust Analytics\n\n");
    section.push_str("| Metric | Value | Trend |\n");
    section.push_str("|:---|:---:|:---:|\n");
    section.push_str(&format!(
        "| Average Trust Score | {:.1}% | {} |\n",
        summary.average_trust_score * 100.0,
        summary.trust_trend.arrow()
    ));
    section.push_str(&format!(
        "| Override Rate | {:.1}% | {} |\n",
        summary.average_override_rate * 100.0,
        summary.override_trend.arrow()
    ));
    section.push_str(&format!(
        "| Total Decisions | {} | · |\n\n",
        summary.total_decisions
    ));

    section
}

/// Generate the weekly chart-series table.
fn generate_chart_section(series: &[ChartPoint]) -> String {
    let mut section = String::new();

    section.push_str("## Weekly Trend\n\n");

    if series.is_empty() {
        section.push_str("No weekly metrics were returned.\n\n");
        return section;
    }

    section.push_str("| Week | Trust Score | Override Rate |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for point in series {
        section.push_str(&format!(
            "| {} | {:.1}% | {:.1}% |\n",
            point.week, point.trust_score, point.override_rate
        ));
    }
    section.push('\n');

    section
}

/// Render the risk score as a fixed-width text meter.
pub fn risk_meter(score: u8, width: usize) -> String {
    let filled = (usize::from(score.min(100)) * width + 50) / 100;
    format!(
        "[{}{}] {}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        score
    )
}

/// Generate the AI insights section.
fn generate_insights_section(report: &DashboardReport, meter_width: usize) -> String {
    let summary = &report.summary;
    let mut section = String::new();

    section.push_str("## AI-Powered Insights\n\n");

    section.push_str(&generate_rag_block(&report.payload.rag_explanations));

    section.push_str("### Predictive ML Insights\n\n");
    section.push_str(&format!(
        "**Trust Failure Risk:** {} {}\n\n",
        summary.risk_level.emoji(),
        summary.risk_level
    ));
    section.push_str(&format!(
        "`{}`\n\n",
        risk_meter(summary.risk_score, meter_width)
    ));
    section.push_str(&format!(
        "- **Skepticism Influence:** {}\n",
        summary.skepticism_weight
    ));
    section.push_str(&format!(
        "- **Sentiment Influence:** {}\n\n",
        summary.sentiment_weight
    ));

    section.push_str(&generate_risk_cases_block(&report.payload.top_risks));

    section
}

fn generate_rag_block(themes: &[RagExplanation]) -> String {
    let mut block = String::new();

    block.push_str("### Language & RAG Insights\n\n");

    if themes.is_empty() {
        block.push_str("No recurring feedback themes were found.\n\n");
        return block;
    }

    for theme in themes {
        block.push_str(&format!("- **{}** ({})\n", theme.theme, theme.count));
        block.push_str(&format!("  > Example: “{}”\n", theme.example));
    }
    block.push('\n');

    block
}

fn generate_risk_cases_block(cases: &[RiskCase]) -> String {
    let mut block = String::new();

    block.push_str("### High-Risk Decisions\n\n");

    if cases.is_empty() {
        block.push_str("No high-risk decisions were reported.\n\n");
        return block;
    }

    for case in cases {
        let tier = case
            .risk_tier
            .map(|t| format!(" ({})", t))
            .unwrap_or_default();
        block.push_str(&format!(
            "- “{}” - Risk Score: {}%{}\n",
            case.confidence_note,
            case_risk_percent(case),
            tier
        ));
    }
    block.push('\n');

    block
}

/// Generate the advanced analysis section.
fn generate_advanced_section(advanced: &AdvancedAnalysis) -> String {
    let mut section = String::new();

    section.push_str("## Advanced Analysis\n\n");
    section.push_str(&format!("- **System Health:** {}\n", advanced.system_health));
    section.push_str(&format!(
        "- **Human-AI Alignment Index:** {:.2}\n",
        advanced.human_ai_alignment_index
    ));
    section.push_str(&format!(
        "- **Trust Volatility:** {:.3}\n",
        advanced.trust_volatility
    ));
    section.push_str(&format!(
        "- **Trust Decay Rate:** {:.3}\n",
        advanced.trust_decay_rate
    ));
    section.push_str(&format!(
        "- **Counterfactual Trust Gain:** {:.3}\n\n",
        advanced.counterfactual_trust_gain
    ));

    if !advanced.intervention_priority.is_empty() {
        section.push_str("### Intervention Priority\n\n");
        section.push_str("| Week | Priority |\n");
        section.push_str("|:---|:---:|\n");

        for entry in &advanced.intervention_priority {
            section.push_str(&format!(
                "| {} | {:.2} |\n",
                entry.week, entry.priority_score
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the executive summary section.
fn generate_summary_section(narrative: &[String]) -> String {
    let mut section = String::new();

    section.push_str("## Executive Summary\n\n");

    if narrative.is_empty() {
        section.push_str("No executive summary was provided.\n\n");
        return section;
    }

    for sentence in narrative {
        section.push_str(&format!("- {}\n", sentence));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by TrustScope*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DashboardReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// One-line console summary of the risk outcome.
pub fn risk_headline(summary: &DashboardSummary) -> String {
    let level: RiskLevel = summary.risk_level;
    format!(
        "{} Trust failure risk: {}% ({})",
        level.emoji(),
        summary.risk_score,
        level
    )
}
