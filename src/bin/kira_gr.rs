use std::fs;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_genome_resolver::config::{ConfigLoader, ResolverConfig};
use kira_genome_resolver::domain::GenomeDocument;
use kira_genome_resolver::error::{ErrorKind, ResolverError};
use kira_genome_resolver::ledger::ResolutionRecord;
use kira_genome_resolver::output::{self, JsonOutput, OutputMode};
use kira_genome_resolver::pipeline::{GenomePipeline, LogSink, PipelineOptions};
use kira_genome_resolver::remote::HttpRemoteClient;
use kira_genome_resolver::store::ArchiveCacheStore;

#[derive(Parser)]
#[command(name = "kira-gr")]
#[command(about = "Resolve genome identifiers and cache their antiSMASH results")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve, fetch and extract antiSMASH data for a genome list")]
    Resolve(ResolveArgs),
    #[command(about = "Show the resolution ledger of a dataset")]
    Status(DatasetArgs),
    #[command(about = "Drop one identifier from the ledger so it is resolved again")]
    Forget(ForgetArgs),
}

#[derive(Args)]
struct DatasetArgs {
    #[arg(long)]
    dataset: String,
}

#[derive(Args)]
struct ResolveArgs {
    input: String,

    #[command(flatten)]
    dataset: DatasetArgs,

    #[arg(long)]
    force_reresolve: bool,

    #[arg(long)]
    output: Option<String>,
}

#[derive(Args)]
struct ForgetArgs {
    original_id: String,

    #[command(flatten)]
    dataset: DatasetArgs,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ResolverError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ResolverError) -> u8 {
    match error.kind() {
        ErrorKind::Configuration => 2,
        ErrorKind::Transport | ErrorKind::Parse | ErrorKind::Integrity => 3,
        ErrorKind::Extraction | ErrorKind::Local => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, config, output_mode),
        Commands::Status(args) => run_status(args, config, output_mode),
        Commands::Forget(args) => run_forget(args, config),
    }
}

fn build_pipeline(
    config: &ResolverConfig,
    dataset: &str,
    force_reresolve: bool,
) -> miette::Result<GenomePipeline<HttpRemoteClient>> {
    let dataset = dataset.trim();
    if dataset.is_empty() || dataset.contains(['/', '\\']) || dataset == ".." {
        return Err(ResolverError::InvalidInput(format!("invalid dataset id {dataset:?}")).into());
    }
    let client = HttpRemoteClient::new(&config.http)?;
    let store = ArchiveCacheStore::for_dataset(&config.cache_root()?, dataset);
    let options = PipelineOptions {
        force_reresolve: force_reresolve || config.force_reresolve,
    };
    Ok(GenomePipeline::new(
        client,
        config.endpoints.clone(),
        store,
        options,
    ))
}

fn run_resolve(
    args: ResolveArgs,
    config: ResolverConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let content = fs::read_to_string(&args.input)
        .map_err(|err| ResolverError::InvalidInput(format!("{}: {err}", args.input)))?;
    let mut document = GenomeDocument::parse(&content)?;
    let pipeline = build_pipeline(&config, &args.dataset.dataset, args.force_reresolve)?;

    let report = match output_mode {
        OutputMode::Json => pipeline.run(&mut document.genomes, &JsonOutput)?,
        OutputMode::Human => pipeline.run(&mut document.genomes, &LogSink)?,
    };

    if let Some(path) = &args.output {
        fs::write(path, document.to_json()?).into_diagnostic()?;
        info!(path = %path, "wrote updated genome records");
    }

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => output::print_summary(&report),
    }
    Ok(())
}

fn run_status(
    args: DatasetArgs,
    config: ResolverConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let pipeline = build_pipeline(&config, &args.dataset, false)?;
    let ledger = pipeline.open_ledger()?;
    let records: Vec<ResolutionRecord> = ledger.records().cloned().collect();
    match output_mode {
        OutputMode::Json => JsonOutput::print_status(&records).into_diagnostic()?,
        OutputMode::Human => output::print_status(&records),
    }
    Ok(())
}

fn run_forget(args: ForgetArgs, config: ResolverConfig) -> miette::Result<()> {
    let pipeline = build_pipeline(&config, &args.dataset.dataset, false)?;
    match pipeline.forget(&args.original_id)? {
        Some(_) => println!("forgot {}", args.original_id),
        None => println!("{} is not in the ledger", args.original_id),
    }
    Ok(())
}
