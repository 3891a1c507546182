use crate::error::{ReportError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a report run needs, passed explicitly into the pipeline.
/// Every field is optional in a JSON config file; missing fields take the
/// values from `Default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReportConfig {
    #[schemars(description = "Wide-format spreadsheet (.xlsx, .xls, .ods or .csv) with 'tenant', 'property' and one column per reporting date")]
    pub input_path: PathBuf,

    #[schemars(description = "Directory receiving the workbook, charts, markup report and Word document")]
    pub output_dir: PathBuf,

    #[schemars(description = "Model identifier passed to the commentary endpoint")]
    pub model_name: String,

    #[schemars(description = "Sampling temperature for commentary generation (0.0 - 2.0)")]
    pub temperature: f64,

    #[schemars(description = "Optional cap on generated tokens per commentary paragraph")]
    pub max_tokens: Option<u32>,

    #[schemars(description = "Base URL of the local text-generation endpoint")]
    pub endpoint: String,

    #[schemars(description = "Timeout in seconds for a single commentary request")]
    pub request_timeout_secs: u64,

    pub report_file: String,
    pub document_file: String,
    pub workbook_file: String,

    #[schemars(description = "Chart directory, relative to output_dir")]
    pub image_dir: String,

    pub log_file: PathBuf,

    #[schemars(description = "Number of properties listed in the annual overview")]
    pub top_properties: usize,

    #[schemars(description = "Number of tenants charted and described per property")]
    pub top_tenants: usize,

    #[schemars(description = "Number of gains and losses described per year pair")]
    pub top_changes: usize,

    #[schemars(description = "Absolute revenue change a tenant must exceed to be called out")]
    pub significant_change_threshold: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("./1k_lines_sales_data.xlsx"),
            output_dir: PathBuf::from("./output"),
            model_name: "phi4:latest".to_string(),
            temperature: 0.1,
            max_tokens: None,
            endpoint: "http://localhost:11434".to_string(),
            request_timeout_secs: 120,
            report_file: "executive_report.md".to_string(),
            document_file: "executive_report.docx".to_string(),
            workbook_file: "analysis_results.xlsx".to_string(),
            image_dir: "visualizations".to_string(),
            log_file: PathBuf::from("./report_generator.log"),
            top_properties: 5,
            top_tenants: 10,
            top_changes: 3,
            significant_change_threshold: 1000.0,
        }
    }
}

impl ReportConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ReportConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ReportError::Config(format!(
                "temperature {} must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        if self.top_properties == 0 || self.top_tenants == 0 || self.top_changes == 0 {
            return Err(ReportError::Config(
                "top_properties, top_tenants and top_changes must be at least 1".to_string(),
            ));
        }
        if self.significant_change_threshold < 0.0 {
            return Err(ReportError::Config(format!(
                "significant_change_threshold {} must not be negative",
                self.significant_change_threshold
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ReportError::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(&self.report_file)
    }

    pub fn document_path(&self) -> PathBuf {
        self.output_dir.join(&self.document_file)
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.output_dir.join(&self.workbook_file)
    }

    pub fn image_path(&self) -> PathBuf {
        self.output_dir.join(&self.image_dir)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReportConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
