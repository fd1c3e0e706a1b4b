/// quakeledger command line.
///
/// `query` runs the event pipeline against Postgres (or a TOML fixture
/// catalog) and writes QuakeML; `import-ruptures` loads an OpenQuake
/// rupture export into the Postgres catalog.

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use quakeledger::catalog::{with_catalog, MemoryCatalog, PostgresCatalog};
use quakeledger::config::{Config, DEFAULT_CONFIG_PATH};
use quakeledger::ingest::ruptures::{parse_rupture_csv, RuptureImportOptions};
use quakeledger::logging::{self, Component};
use quakeledger::model::{Event, IngestError, QueryError, QueryType};
use quakeledger::quakeml::QuakeMlWriter;
use quakeledger::query::{EventQuery, QueryParams};

#[derive(Parser)]
#[command(name = "quakeledger", version, about = "Earthquake catalog queries and disaggregation sampling")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Select events and write them as QuakeML.
    Query(QueryArgs),
    /// Import an OpenQuake rupture export as stochastic events.
    ImportRuptures(ImportArgs),
}

#[derive(Args)]
struct QueryArgs {
    #[arg(allow_negative_numbers = true)]
    lonmin: f64,
    #[arg(allow_negative_numbers = true)]
    lonmax: f64,
    #[arg(allow_negative_numbers = true)]
    latmin: f64,
    #[arg(allow_negative_numbers = true)]
    latmax: f64,
    mmin: f64,
    mmax: f64,
    #[arg(allow_negative_numbers = true)]
    zmin: f64,
    #[arg(allow_negative_numbers = true)]
    zmax: f64,
    /// Rate threshold (stochastic) or exceedance-probability tier (deaggregation).
    p: f64,
    /// observed, expert, stochastic or deaggregation.
    etype: String,
    /// Target longitude; required for deaggregation.
    #[arg(allow_negative_numbers = true, requires = "tlat")]
    tlon: Option<f64>,
    /// Target latitude; required for deaggregation.
    #[arg(allow_negative_numbers = true)]
    tlat: Option<f64>,

    /// Keep only the N highest-magnitude events (0 keeps all).
    #[arg(long)]
    num_events: Option<usize>,
    /// Base seed for disaggregation sampling.
    #[arg(long)]
    seed: Option<u64>,
    /// QuakeML output file.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Read the catalog from a TOML fixture instead of Postgres.
    #[arg(long)]
    fixture: Option<PathBuf>,
    /// Also print the selected events as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ImportArgs {
    /// Tab-delimited rupture export.
    csv: PathBuf,
    /// Prepended to each rupid to form the event id.
    #[arg(long, default_value = "peru_")]
    prefix: String,
    #[arg(long)]
    agency: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("quakeledger: {}", e);
            return ExitCode::FAILURE;
        }
    };
    // Validated by Config::load.
    let level = config.logging.level().unwrap_or(logging::LogLevel::Info);
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.timestamps);

    let result = match cli.command {
        Command::Query(args) => run_query(&config, args),
        Command::ImportRuptures(args) => run_import(&config, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Component::System, None, &e.to_string());
            eprintln!("quakeledger: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_query(config: &Config, args: QueryArgs) -> Result<(), Box<dyn Error>> {
    let params = QueryParams {
        lonmin: args.lonmin,
        lonmax: args.lonmax,
        latmin: args.latmin,
        latmax: args.latmax,
        mmin: args.mmin,
        mmax: args.mmax,
        zmin: args.zmin,
        zmax: args.zmax,
        probability: args.p,
        etype: args.etype.parse::<QueryType>()?,
        target: args.tlon.zip(args.tlat),
        num_events: args.num_events,
    };
    let seed = args.seed.unwrap_or(config.sampling.seed);

    let events: Vec<Event> = match &args.fixture {
        Some(path) => {
            let mut catalog = MemoryCatalog::load(path)?;
            EventQuery::new(&mut catalog).with_seed(seed).run(&params)?
        }
        None => {
            let url = config.database_url()?;
            with_catalog(&url, |catalog: &mut PostgresCatalog| -> Result<_, QueryError> {
                EventQuery::new(catalog).with_seed(seed).run(&params)
            })?
        }
    };

    let output = args.output.unwrap_or_else(|| PathBuf::from(&config.output.path));
    let writer = QuakeMlWriter::new(output, config.output.provider.clone());
    writer.write(&events)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    }
    Ok(())
}

fn run_import(config: &Config, args: ImportArgs) -> Result<(), Box<dyn Error>> {
    let text = fs::read_to_string(&args.csv)?;
    let options = RuptureImportOptions {
        prefix: args.prefix,
        agency: args.agency,
    };
    let events = parse_rupture_csv(&text, &options)?;
    logging::info(
        Component::Ingest,
        None,
        &format!("Parsed {} ruptures from {}", events.len(), args.csv.display()),
    );

    let url = config.database_url()?;
    let inserted = with_catalog(&url, |catalog: &mut PostgresCatalog| -> Result<_, IngestError> {
        Ok(catalog.insert_events(&events)?)
    })?;
    logging::info(Component::Ingest, None, &format!("Inserted {} events", inserted));
    Ok(())
}
