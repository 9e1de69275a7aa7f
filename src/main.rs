use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use exio_tradekit::{AttributionMode, AttributionOptions, FlowType, MrioModel, Result, RunSpec};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    let model = MrioModel::load(&args.data_dir)?;
    let spec = RunSpec::new(args.year, args.country, args.flow_type.into());
    let opts = AttributionOptions {
        mode: if args.comprehensive {
            AttributionMode::Comprehensive
        } else {
            AttributionMode::Selective
        },
        factor_quota: args.factor_quota,
        impact_epsilon: args.epsilon,
        chunk_size: args.chunk_size,
    };

    let summary = exio_tradekit::run(&spec, &opts, &model, &args.ref_dir, &args.out_dir)?;
    println!(
        "{} trade flows, {} final-demand flows, {} factor associations ({} sectors, {} factors)",
        summary.trade_rows,
        summary.final_demand_rows,
        summary.association_rows,
        summary.sectors,
        summary.factors
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Extract MRIO trade flows and environmental factor impacts."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline for one (year, country, flow type).
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Dataset year.
    #[arg(long)]
    year: i32,

    /// Focal country code, e.g. US.
    #[arg(long)]
    country: String,

    /// Flow direction relative to the focal country.
    #[arg(long, value_enum, default_value_t = FlowTypeArg::Imports)]
    flow_type: FlowTypeArg,

    /// Directory holding the long-form model CSVs (flows.csv plus
    /// per-extension tables).
    #[arg(long)]
    data_dir: PathBuf,

    /// Directory for the shared reference catalogs (industry.csv,
    /// factor.csv).
    #[arg(long, default_value = "reference")]
    ref_dir: PathBuf,

    /// Directory for the run's output tables.
    #[arg(long, default_value = "output")]
    out_dir: PathBuf,

    /// Attribute every factor instead of the bounded priority set.
    #[arg(long)]
    comprehensive: bool,

    /// Factor quota in selective mode.
    #[arg(long, default_value_t = 50)]
    factor_quota: usize,

    /// Minimum |impact_value| kept in the association table.
    #[arg(long, default_value_t = 0.001)]
    epsilon: f64,

    /// Trade rows joined per batch during attribution.
    #[arg(long, default_value_t = 10_000)]
    chunk_size: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum FlowTypeArg {
    Imports,
    Exports,
    Domestic,
}

impl From<FlowTypeArg> for FlowType {
    fn from(value: FlowTypeArg) -> Self {
        match value {
            FlowTypeArg::Imports => FlowType::Imports,
            FlowTypeArg::Exports => FlowType::Exports,
            FlowTypeArg::Domestic => FlowType::Domestic,
        }
    }
}
