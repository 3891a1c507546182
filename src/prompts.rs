// Prompt texts for the commentary paragraphs of the executive report.

use crate::schema::{TenantChangeRow, TenantRevenueRow};
use crate::utils::{format_thousands, percent_of};
use std::collections::BTreeMap;

pub const SYSTEM_PROMPT: &str = r#"You are a data analyst assistant. Your task is to analyze and describe
the provided data in a factual manner. Follow these rules:
1. Only use information explicitly provided in the data
2. Do not make assumptions beyond what's in the numbers
3. Avoid speculative language like "might", "could", "possibly"
4. State exact percentages and values from the data
5. If no notable patterns exist, say so directly
6. Use clear, concise business language"#;

pub fn with_system_prompt(prompt: &str) -> String {
    format!("{}\n\n{}", SYSTEM_PROMPT, prompt)
}

pub fn annual_revenue_prompt(total_by_year: &BTreeMap<i32, f64>) -> String {
    let grand_total: f64 = total_by_year.values().sum();
    let data = total_by_year
        .iter()
        .map(|(year, revenue)| {
            format!(
                "- {}: ${} ({:.1}% of total)",
                year,
                format_thousands(*revenue, 0),
                percent_of(*revenue, grand_total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze these annual revenue trends using ONLY the provided data:
{data}

Required analysis:
1. Year-over-year changes in total revenue
2. Property performance relative to each other
3. Notable percentage contributions
4. State "No notable changes" if under 5% variance

Output format:
- Start with overall trend summary
- Bullet points of key observations
- End with largest contributor percentage"#
    )
}

pub fn tenant_distribution_prompt(property: &str, tenants: &[&TenantRevenueRow]) -> String {
    let total: f64 = tenants.iter().map(|t| t.revenue).sum();
    let breakdown = tenants
        .iter()
        .map(|t| {
            format!(
                "{}: ${} ({:.1}%)",
                t.tenant,
                format_thousands(t.revenue, 0),
                percent_of(t.revenue, total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze tenant distribution for {property} using:
Total property revenue: ${total}
Tenant breakdown:
{breakdown}

Required analysis:
1. Top 3 tenant contributions as percentages
2. Concentration risk assessment
3. Compare top/bottom performer amounts
4. State "Balanced distribution" if top 3 < 60%

Output format:
- Summary statement
- Key percentages
- Risk assessment"#,
        total = format_thousands(total, 0),
    )
}

pub fn revenue_change_prompt(
    property: &str,
    years: &str,
    gains: &[&TenantChangeRow],
    losses: &[&TenantChangeRow],
) -> String {
    let growth = gains
        .iter()
        .map(|r| format!("{}: +${}", r.tenant, format_thousands(r.revenue_change, 0)))
        .collect::<Vec<_>>()
        .join("\n");
    let decline = losses
        .iter()
        .map(|r| format!("{}: -${}", r.tenant, format_thousands(r.revenue_change.abs(), 0)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze revenue changes for {property} ({years}):
Significant Changes:
Growth Contributors:
{growth}
Significant Losses:
{decline}

Required analysis:
1. Largest absolute changes
2. Net impact calculation
3. Notable loss/gain ratios
4. State "No significant changes" if all < $1k

Output format:
- Net change summary
- Top 3 contributors
- Loss mitigation suggestions"#
    )
}
