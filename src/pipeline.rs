use crate::charts::ChartRenderer;
use crate::commentary::CommentaryGenerator;
use crate::config::ReportConfig;
use crate::document::{convert_markdown_file_to, ConversionSummary};
use crate::error::Result;
use crate::export::{export_analysis_results_to, write_markdown_report};
use crate::report::ReportAssembler;
use crate::RevenueAnalysis;
use log::info;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// What to do when a markup report from an earlier run already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RegeneratePolicy {
    Always,
    Never,
    #[default]
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportSource {
    Generated,
    Reused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub report_path: PathBuf,
    pub document_path: PathBuf,
    pub source: ReportSource,
    pub conversion: ConversionSummary,
}

/// Drives one report run: analysis, workbook, charts, markup report and the
/// Word conversion.
pub struct ReportPipeline<'a> {
    config: &'a ReportConfig,
    generator: &'a dyn CommentaryGenerator,
    charts: &'a dyn ChartRenderer,
}

impl<'a> ReportPipeline<'a> {
    pub fn new(
        config: &'a ReportConfig,
        generator: &'a dyn CommentaryGenerator,
        charts: &'a dyn ChartRenderer,
    ) -> Self {
        Self {
            config,
            generator,
            charts,
        }
    }

    /// Loads the input and returns the markup report text. The workbook and
    /// chart files are written as side effects.
    pub fn generate_report(&self) -> Result<String> {
        let analysis = RevenueAnalysis::from_file(&self.config.input_path)?;
        let RevenueAnalysis {
            annual,
            tenants,
            changes,
        } = &analysis;

        export_analysis_results_to(annual, changes, &self.config.workbook_path())?;
        let charts = self
            .charts
            .render(annual, tenants, changes, &self.config.output_dir)?;

        Ok(ReportAssembler::new(self.generator, self.config)
            .assemble(annual, tenants, changes, &charts))
    }

    pub fn run(&self, policy: RegeneratePolicy) -> Result<RunOutcome> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        self.run_with_io(policy, &mut stdin.lock(), &mut stdout.lock())
    }

    /// `run` with the console streams supplied by the caller, so the
    /// regenerate question can be answered from any reader.
    pub fn run_with_io<R: BufRead, W: Write>(
        &self,
        policy: RegeneratePolicy,
        input: &mut R,
        output: &mut W,
    ) -> Result<RunOutcome> {
        std::fs::create_dir_all(&self.config.output_dir)?;
        let report_path = self.config.report_path();

        let regenerate = if report_path.exists() {
            writeln!(output, "\nExisting report found: {}", report_path.display())?;
            info!("Found existing report at {}", report_path.display());
            let regenerate = match policy {
                RegeneratePolicy::Always => true,
                RegeneratePolicy::Never => false,
                RegeneratePolicy::Ask => {
                    prompt_user("Do you want to regenerate the report?", input, output)?
                }
            };
            if regenerate {
                writeln!(output, "Regenerating report...")?;
                info!("Regenerating report");
            } else {
                writeln!(output, "Using existing report...")?;
                info!("Using existing report");
            }
            regenerate
        } else {
            writeln!(output, "No existing report found - generating new report...")?;
            info!("Generating new report");
            true
        };

        let source = if regenerate {
            let markup = self.generate_report()?;
            write_markdown_report(&report_path, &markup)?;
            ReportSource::Generated
        } else {
            ReportSource::Reused
        };

        writeln!(output, "\nConverting markdown to Word document...")?;
        info!("Starting markdown to Word conversion");
        let document_path = self.config.document_path();
        let conversion =
            convert_markdown_file_to(&report_path, &self.config.output_dir, &document_path)?;
        info!(
            "Conversion successful. DOCX saved to {}",
            document_path.display()
        );

        Ok(RunOutcome {
            report_path,
            document_path,
            source,
            conversion,
        })
    }
}

/// Asks a yes/no question until the answer is `y`, `yes`, `n` or `no`
/// (case-insensitive). End of input counts as no.
pub fn prompt_user<R: BufRead, W: Write>(
    question: &str,
    input: &mut R,
    output: &mut W,
) -> std::io::Result<bool> {
    loop {
        write!(output, "{} [y/n]: ", question)?;
        output.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Ok(false);
        }
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please enter 'y' or 'n'")?,
        }
    }
}
