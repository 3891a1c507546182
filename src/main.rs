use clap::Parser;
use log::{error, info};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tenant_revenue_report::llm::OllamaClient;
use tenant_revenue_report::{
    RegeneratePolicy, ReportConfig, ReportPipeline, ReportSource, Result, SvgChartRenderer,
};

/// Builds the executive sales report from a tenant revenue spreadsheet.
#[derive(Parser, Debug)]
#[command(name = "revenue-report", version, about)]
struct Cli {
    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input spreadsheet (.xlsx, .xls, .ods or .csv)
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Model name sent to the commentary endpoint
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Base URL of the Ollama-compatible endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Whether to rebuild an existing markup report
    #[arg(long, value_enum, default_value_t = RegeneratePolicy::Ask)]
    regenerate: RegeneratePolicy,

    /// Print the JSON schema of the configuration file and exit
    #[arg(long)]
    print_config_schema: bool,
}

fn build_config(cli: &Cli) -> Result<ReportConfig> {
    let mut config = match &cli.config {
        Some(path) => ReportConfig::from_json_file(path)?,
        None => ReportConfig::default(),
    };

    if let Some(input) = &cli.input {
        config.input_path = input.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.model_name = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        config.temperature = temperature;
    }
    if cli.max_tokens.is_some() {
        config.max_tokens = cli.max_tokens;
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Log records go to `path` as `timestamp - LEVEL - message`. `RUST_LOG`
/// overrides the default `info` level.
fn init_logging(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .map_err(std::io::Error::other)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.print_config_schema {
        return match ReportConfig::schema_as_json() {
            Ok(schema) => {
                println!("{}", schema);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Could not produce config schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    println!("=== Report Generation System ===");

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.log_file) {
        eprintln!(
            "Could not open log file {}: {}",
            config.log_file.display(),
            e
        );
    }

    let start = Instant::now();
    let generator = match OllamaClient::from_config(&config) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("{}", e);
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let charts = SvgChartRenderer::new(config.image_dir.clone(), config.top_tenants);
    let pipeline = ReportPipeline::new(&config, &generator, &charts);

    let code = match pipeline.run(cli.regenerate) {
        Ok(outcome) => {
            if outcome.source == ReportSource::Generated {
                println!("Report saved to: {}", outcome.report_path.display());
            }
            println!("\nConversion complete!");
            println!(
                "Word document saved to: {}",
                outcome.document_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_load_failure() {
                println!("Failed to load and preprocess data.  Check the file and its format.");
            }
            eprintln!("Report generation failed: {}", e);
            error!("Report generation failed: {}", e);
            ExitCode::FAILURE
        }
    };

    let elapsed = start.elapsed().as_secs_f64();
    info!("Completed in {:.2} seconds", elapsed);
    println!("Completed in {:.2} seconds", elapsed);
    code
}
