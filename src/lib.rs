//! # Tenant Revenue Report
//!
//! Turns a wide tenant/property revenue spreadsheet (one column per reporting
//! date) into an executive sales report.
//!
//! ## Core Concepts
//!
//! - **Wide input**: one row per (tenant, property), one revenue column per date
//! - **Long records**: one [`RevenueRecord`] per (tenant, property, date)
//! - **Annual revenue**: revenue per property and year with the change against
//!   the property's previous reported year
//! - **Tenant changes**: per property and consecutive year pair, every tenant's
//!   revenue in both years and the difference, missing years counted as zero
//! - **Report**: markup text with commentary paragraphs and chart references,
//!   converted into a Word document
//!
//! ## Example
//!
//! ```rust,ignore
//! use tenant_revenue_report::*;
//!
//! let config = ReportConfig {
//!     input_path: "sales.xlsx".into(),
//!     output_dir: "./output".into(),
//!     ..ReportConfig::default()
//! };
//!
//! let charts = SvgChartRenderer::new(config.image_dir.clone(), config.top_tenants);
//! let pipeline = ReportPipeline::new(&config, &NoCommentary, &charts);
//! let outcome = pipeline.run(RegeneratePolicy::Always).unwrap();
//! println!("{}", outcome.document_path.display());
//! ```

pub mod aggregation;
pub mod changes;
pub mod charts;
pub mod commentary;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod markup;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod schema;
pub mod utils;

#[cfg(feature = "ollama")]
pub mod llm;

pub use aggregation::{
    compute_annual_revenue, compute_tenant_revenue, top_properties, top_tenants,
    total_revenue_by_year,
};
pub use changes::{compute_all_changes, change_for_year_pair, TenantAnnualRevenue};
pub use charts::{ChartRenderer, NoCharts, SvgChartRenderer};
pub use commentary::{CommentaryGenerator, GenerationError, GenerationSettings, NoCommentary};
pub use config::ReportConfig;
pub use document::{convert_markdown_file, ConversionSummary, DocxWriter};
pub use error::{ReportError, Result};
pub use export::{export_analysis_results, sheet_name_for, write_markdown_report};
pub use ingestion::{load_revenue_records, load_wide_table, reshape_to_long, WideTable};
pub use markup::{parse_markup, Block, MarkupDocument, TextRun};
pub use pipeline::{prompt_user, RegeneratePolicy, ReportPipeline, ReportSource, RunOutcome};
pub use report::ReportAssembler;
pub use schema::*;

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The three analysis tables every report is built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueAnalysis {
    pub annual: Vec<AnnualRevenueRow>,
    pub tenants: Vec<TenantRevenueRow>,
    pub changes: TenantChangeSet,
}

impl RevenueAnalysis {
    pub fn from_records(records: &[RevenueRecord]) -> Self {
        let analysis = Self {
            annual: compute_annual_revenue(records),
            tenants: compute_tenant_revenue(records),
            changes: compute_all_changes(records),
        };
        info!(
            "Analysed {} records: {} annual rows, {} tenant rows, {} change tables",
            records.len(),
            analysis.annual.len(),
            analysis.tenants.len(),
            analysis.changes.len()
        );
        analysis
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let records = load_revenue_records(path)?;
        Ok(Self::from_records(&records))
    }
}

pub fn analyze_records(records: &[RevenueRecord]) -> RevenueAnalysis {
    RevenueAnalysis::from_records(records)
}

pub fn analyze_file(path: &Path) -> Result<RevenueAnalysis> {
    RevenueAnalysis::from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(tenant: &str, property: &str, y: i32, m: u32, revenue: f64) -> RevenueRecord {
        RevenueRecord::new(
            tenant,
            property,
            NaiveDate::from_ymd_opt(y, m, 1),
            revenue,
        )
    }

    #[test]
    fn test_analysis_tables_agree() {
        let records = vec![
            record("T1", "A", 2022, 1, 60.0),
            record("T1", "A", 2022, 2, 40.0),
            record("T1", "A", 2023, 1, 150.0),
            record("T2", "A", 2022, 1, 80.0),
        ];

        let analysis = analyze_records(&records);

        let a2023 = analysis
            .annual
            .iter()
            .find(|r| r.property == "A" && r.year == 2023)
            .unwrap();
        assert_eq!(a2023.revenue, 150.0);
        assert_eq!(a2023.revenue_change, Some(-30.0));

        let table = analysis
            .changes
            .get(&ChangeKey::new("A", 2022, 2023))
            .unwrap();
        let net: f64 = table.iter().map(|r| r.revenue_change).sum();
        assert!((net - a2023.revenue_change.unwrap()).abs() < 1e-9);

        let tenant_total: f64 = analysis.tenants.iter().map(|t| t.revenue).sum();
        let annual_total: f64 = analysis.annual.iter().map(|r| r.revenue).sum();
        assert!((tenant_total - annual_total).abs() < 1e-9);
    }
}
