//! promobatch - batch promo-price extraction CLI

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use promobatch::client::OpenAiClient;
use promobatch::tabular::OutputFormat;
use promobatch::{Config, Pipeline, RunOptions, RunSummary};

#[derive(Parser)]
#[command(name = "promobatch", version)]
#[command(about = "Extract promo pricing from product feeds via an LLM batch job", long_about = None)]
struct Cli {
    /// Path to the input table (json, csv, tsv, xlsx, or xls)
    #[arg(short = 'I', long)]
    input_file: PathBuf,

    /// Output file name without extension
    #[arg(short = 'O', long)]
    output_name: PathBuf,

    /// Output file format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Path to the prompt template file (optional)
    #[arg(short, long)]
    prompt_file: Option<PathBuf>,

    /// Process at most this many records (0 = unlimited)
    #[arg(short = 'n', long, default_value_t = 0)]
    limit: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promobatch=info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(summary) => {
            println!(
                "Processed {} records ({} prompted, {} skipped, {} parse failures); wrote {} rows to {}",
                summary.input_records,
                summary.submitted,
                summary.skipped_empty,
                summary.parse_failures,
                summary.output_rows,
                summary.output_path.display(),
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> promobatch::Result<RunSummary> {
    let config = Config::from_env()?;
    let client = OpenAiClient::new(&config.api_key, &config.api_base)?;
    let pipeline = Pipeline::new(client, config);

    pipeline
        .run(&RunOptions {
            input: cli.input_file,
            output_base: cli.output_name,
            format: cli.format,
            prompt_file: cli.prompt_file,
            limit: cli.limit,
        })
        .await
}
