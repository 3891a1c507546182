use crate::aggregation::{descending, top_properties, top_tenants, total_revenue_by_year};
use crate::commentary::CommentaryGenerator;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::prompts;
use crate::schema::{
    AnnualRevenueRow, ChangeKey, ChartCategory, ChartReferences, TenantChangeRow,
    TenantChangeSet, TenantRevenueRow,
};
use crate::utils::{file_safe, format_currency};
use log::{debug, error, info, warn};
use std::fmt::Write as _;
use std::path::Path;

pub const REVENUE_PLACEHOLDER: &str = "*Revenue commentary not available*";
pub const TENANT_PLACEHOLDER: &str = "*Tenant analysis unavailable*";
pub const CHANGE_PLACEHOLDER: &str = "*Change analysis unavailable*";

/// Builds the executive markup report from the analysis tables, asking the
/// commentary generator for one paragraph per subsection.
pub struct ReportAssembler<'a> {
    generator: &'a dyn CommentaryGenerator,
    config: &'a ReportConfig,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(generator: &'a dyn CommentaryGenerator, config: &'a ReportConfig) -> Self {
        Self { generator, config }
    }

    pub fn assemble(
        &self,
        annual: &[AnnualRevenueRow],
        tenants: &[TenantRevenueRow],
        changes: &TenantChangeSet,
        charts: &ChartReferences,
    ) -> String {
        let mut md = String::from("# Executive Sales Report\n\n");
        md.push_str(&self.annual_section(annual, charts));
        md.push_str("## Tenant Performance\n");
        md.push_str(&self.tenant_section(tenants, charts));
        md.push_str(&self.changes_section(changes, charts));

        info!("Assembled report markup ({} chars)", md.len());
        md
    }

    fn commentary(&self, prompt: &str, placeholder: &str, section: &str) -> String {
        match self.generator.generate(prompt) {
            Ok(text) => text,
            Err(e) => {
                warn!("No commentary for {}: {}", section, e);
                placeholder.to_string()
            }
        }
    }

    fn annual_section(&self, annual: &[AnnualRevenueRow], charts: &ChartReferences) -> String {
        let totals = total_revenue_by_year(annual);
        let leaders = top_properties(annual, self.config.top_properties);

        let commentary = self.commentary(
            &prompts::annual_revenue_prompt(&totals),
            REVENUE_PLACEHOLDER,
            "annual revenue",
        );

        let mut md = String::from("## Annual Revenue Overview\n");
        if let Some(path) = charts.paths(ChartCategory::AnnualRevenue).first() {
            let _ = writeln!(md, "![Annual Revenue by Property]({})", path);
        }
        let _ = writeln!(md, "\n{}\n", commentary);

        md.push_str("- Total Revenue by Year:\n");
        for (year, revenue) in &totals {
            let _ = writeln!(md, "  - **{}**: {}", year, format_currency(*revenue, 2));
        }
        let _ = writeln!(
            md,
            "\n- Top {} Properties by Total Revenue:",
            self.config.top_properties
        );
        for (property, revenue) in &leaders {
            let _ = writeln!(md, "  - **{}**: {}", property, format_currency(*revenue, 2));
        }
        md.push('\n');
        md
    }

    fn tenant_section(&self, tenants: &[TenantRevenueRow], charts: &ChartReferences) -> String {
        let mut md = String::from("\n## Top Tenants by Property\n");

        for path in charts.paths(ChartCategory::TopTenants) {
            let property = property_from_chart_path(path);
            let top = top_tenants(tenants, &property, self.config.top_tenants);
            if top.is_empty() {
                debug!("No tenant rows for '{}' from chart {}", property, path);
                continue;
            }

            let commentary = self.commentary(
                &prompts::tenant_distribution_prompt(&property, &top),
                TENANT_PLACEHOLDER,
                &property,
            );
            let _ = writeln!(md, "\n### {}", property);
            let _ = writeln!(md, "![Top Tenants - {}]({})", property, path);
            let _ = writeln!(md, "{}", commentary);
        }
        md
    }

    fn changes_section(&self, changes: &TenantChangeSet, charts: &ChartReferences) -> String {
        let mut md = String::from("\n## Significant Revenue Changes\n");

        for (key, rows) in changes {
            match self.change_entry(key, rows, charts) {
                Ok(section) => md.push_str(&section),
                Err(e) => {
                    error!("Skipping {} due to error: {}", key, e);
                    eprintln!("Skipping {} due to error: {}", key, e);
                }
            }
        }
        md
    }

    fn change_entry(
        &self,
        key: &ChangeKey,
        rows: &[TenantChangeRow],
        charts: &ChartReferences,
    ) -> Result<String> {
        if let Some(bad) = rows.iter().find(|r| !r.revenue_change.is_finite()) {
            return Err(ReportError::Subsection {
                key: key.to_string(),
                details: format!("non-finite revenue change for tenant '{}'", bad.tenant),
            });
        }

        let years = key.years_label();
        let (gains, losses) = significant_changes(
            rows,
            self.config.top_changes,
            self.config.significant_change_threshold,
        );
        let commentary = self.commentary(
            &prompts::revenue_change_prompt(&key.property, &years, &gains, &losses),
            CHANGE_PLACEHOLDER,
            &key.to_string(),
        );

        let pattern = format!(
            "top10_changes_{}_{}.png",
            file_safe(&key.property),
            file_safe(&years)
        );
        let chart = charts
            .paths(ChartCategory::RevenueChanges)
            .iter()
            .find(|p| p.contains(&pattern));

        let mut md = String::new();
        let _ = writeln!(md, "\n### {} ({})", key.property, years);
        if let Some(path) = chart {
            let _ = writeln!(md, "![Revenue Changes - {} ({})]({})", key.property, years, path);
        }
        let _ = writeln!(md, "{}", commentary);
        Ok(md)
    }
}

/// Recovers the property name from a `top_tenants_{property}.png` path.
pub fn property_from_chart_path(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.split('_').skip(2).collect::<Vec<_>>().join(" ")
}

/// Up to `n` largest gains above `threshold` and up to `n` largest losses
/// below `-threshold`.
pub fn significant_changes(
    rows: &[TenantChangeRow],
    n: usize,
    threshold: f64,
) -> (Vec<&TenantChangeRow>, Vec<&TenantChangeRow>) {
    let mut ordered: Vec<&TenantChangeRow> = rows.iter().collect();
    ordered.sort_by(|a, b| descending(a.revenue_change, b.revenue_change));

    let gains = ordered
        .iter()
        .take(n)
        .filter(|r| r.revenue_change > threshold)
        .copied()
        .collect();
    let losses = ordered
        .iter()
        .rev()
        .take(n)
        .filter(|r| r.revenue_change < -threshold)
        .copied()
        .collect();
    (gains, losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::top_tenants_chart_file;
    use crate::commentary::{GenerationError, NoCommentary};
    use std::cell::RefCell;

    struct Canned {
        prompts: RefCell<Vec<String>>,
    }

    impl CommentaryGenerator for Canned {
        fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(format!("Commentary #{}", self.prompts.borrow().len()))
        }
    }

    fn change(tenant: &str, prev: f64, curr: f64) -> TenantChangeRow {
        TenantChangeRow {
            tenant: tenant.to_string(),
            revenue_curr: curr,
            revenue_prev: prev,
            revenue_change: curr - prev,
        }
    }

    fn sample() -> (Vec<AnnualRevenueRow>, Vec<TenantRevenueRow>, TenantChangeSet) {
        let annual = vec![
            AnnualRevenueRow {
                property: "Harbor Plaza".to_string(),
                year: 2022,
                revenue: 100.0,
                revenue_change: None,
            },
            AnnualRevenueRow {
                property: "Harbor Plaza".to_string(),
                year: 2023,
                revenue: 1500.0,
                revenue_change: Some(1400.0),
            },
        ];
        let tenants = vec![TenantRevenueRow {
            property: "Harbor Plaza".to_string(),
            tenant: "Acme".to_string(),
            revenue: 1600.0,
        }];
        let mut changes = TenantChangeSet::new();
        changes.insert(
            ChangeKey::new("Harbor Plaza", 2022, 2023),
            vec![change("Acme", 100.0, 1500.0)],
        );
        (annual, tenants, changes)
    }

    fn sample_charts() -> ChartReferences {
        let mut charts = ChartReferences::default();
        charts.push(ChartCategory::AnnualRevenue, "visualizations/annual_revenue.png");
        charts.push(
            ChartCategory::TopTenants,
            "visualizations/top_tenants_Harbor_Plaza.png",
        );
        charts.push(
            ChartCategory::RevenueChanges,
            "visualizations/top10_changes_Harbor_Plaza_2022_to_2023.png",
        );
        charts
    }

    #[test]
    fn test_property_from_chart_path() {
        assert_eq!(
            property_from_chart_path("visualizations/top_tenants_Harbor_Plaza.png"),
            "Harbor Plaza"
        );
        assert_eq!(property_from_chart_path("top_tenants_A.png"), "A");
        assert_eq!(
            property_from_chart_path(&top_tenants_chart_file("Unit: A")),
            "Unit: A"
        );
    }

    #[test]
    fn test_significant_changes_threshold() {
        let rows = vec![
            change("big_up", 0.0, 5000.0),
            change("small_up", 0.0, 500.0),
            change("big_down", 3000.0, 0.0),
            change("flat", 10.0, 10.0),
        ];
        let (gains, losses) = significant_changes(&rows, 3, 1000.0);
        assert_eq!(gains.len(), 1);
        assert_eq!(gains[0].tenant, "big_up");
        assert_eq!(losses.len(), 1);
        assert_eq!(losses[0].tenant, "big_down");
    }

    #[test]
    fn test_assemble_structure_with_commentary() {
        let (annual, tenants, changes) = sample();
        let config = ReportConfig::default();
        let generator = Canned {
            prompts: RefCell::new(Vec::new()),
        };

        let md = ReportAssembler::new(&generator, &config).assemble(
            &annual,
            &tenants,
            &changes,
            &sample_charts(),
        );

        assert!(md.starts_with("# Executive Sales Report\n"));
        assert!(md.contains("## Annual Revenue Overview\n![Annual Revenue by Property](visualizations/annual_revenue.png)"));
        assert!(md.contains("  - **2022**: $100.00"));
        assert!(md.contains("  - **2023**: $1,500.00"));
        assert!(md.contains("  - **Harbor Plaza**: $1,600.00"));
        assert!(md.contains("\n### Harbor Plaza\n![Top Tenants - Harbor Plaza](visualizations/top_tenants_Harbor_Plaza.png)\n"));
        assert!(md.contains("\n### Harbor Plaza (2022 to 2023)\n![Revenue Changes - Harbor Plaza (2022 to 2023)]"));
        assert!(!md.contains("unavailable"));
        assert_eq!(generator.prompts.borrow().len(), 3);
        assert!(generator.prompts.borrow()[2].contains("Acme: +$1,400"));
    }

    #[test]
    fn test_failing_generator_uses_placeholders() {
        let (annual, tenants, changes) = sample();
        let config = ReportConfig::default();

        let md = ReportAssembler::new(&NoCommentary, &config).assemble(
            &annual,
            &tenants,
            &changes,
            &sample_charts(),
        );

        assert!(md.contains(REVENUE_PLACEHOLDER));
        assert!(md.contains(TENANT_PLACEHOLDER));
        assert!(md.contains(CHANGE_PLACEHOLDER));
    }

    struct Unreachable;

    impl CommentaryGenerator for Unreachable {
        fn generate(&self, _prompt: &str) -> std::result::Result<String, GenerationError> {
            Err(GenerationError::Connection("connection refused".to_string()))
        }
    }

    #[test]
    fn test_connection_error_keeps_report_complete() {
        let (annual, tenants, changes) = sample();
        let config = ReportConfig::default();

        let md = ReportAssembler::new(&Unreachable, &config).assemble(
            &annual,
            &tenants,
            &changes,
            &sample_charts(),
        );

        assert!(md.contains("## Annual Revenue Overview\n![Annual Revenue by Property](visualizations/annual_revenue.png)\n\n*Revenue commentary not available*\n"));
        assert!(md.contains("### Harbor Plaza\n![Top Tenants - Harbor Plaza](visualizations/top_tenants_Harbor_Plaza.png)\n*Tenant analysis unavailable*\n"));
        assert!(md.contains("## Significant Revenue Changes"));
        assert!(md.trim_end().ends_with(CHANGE_PLACEHOLDER));
    }

    #[test]
    fn test_non_finite_change_entry_is_skipped() {
        let (annual, tenants, mut changes) = sample();
        changes.insert(
            ChangeKey::new("Broken", 2022, 2023),
            vec![change("X", 0.0, f64::NAN)],
        );
        let config = ReportConfig::default();

        let md = ReportAssembler::new(&NoCommentary, &config).assemble(
            &annual,
            &tenants,
            &changes,
            &ChartReferences::default(),
        );

        assert!(!md.contains("### Broken"));
        assert!(md.contains("### Harbor Plaza (2022 to 2023)\n*Change analysis unavailable*"));
        assert!(!md.contains("![Annual Revenue"));
    }

    #[test]
    fn test_tenant_chart_without_rows_is_skipped() {
        let (annual, _, changes) = sample();
        let config = ReportConfig::default();

        let md = ReportAssembler::new(&NoCommentary, &config).assemble(
            &annual,
            &[],
            &changes,
            &sample_charts(),
        );
        assert!(!md.contains("### Harbor Plaza\n"));
    }

    #[test]
    fn test_tenant_section_for_property_with_colon() {
        let tenants = vec![TenantRevenueRow {
            property: "Unit: A".to_string(),
            tenant: "Acme".to_string(),
            revenue: 900.0,
        }];
        let mut charts = ChartReferences::default();
        charts.push(
            ChartCategory::TopTenants,
            format!("visualizations/{}", top_tenants_chart_file("Unit: A")),
        );
        let config = ReportConfig::default();

        let md = ReportAssembler::new(&NoCommentary, &config).assemble(
            &[],
            &tenants,
            &TenantChangeSet::new(),
            &charts,
        );
        assert!(md.contains("### Unit: A\n"));
        assert!(md.contains("![Top Tenants - Unit: A](visualizations/top_tenants_Unit:_A.png)"));
    }
}
