//! CSET CLI: run, inspect, and graph recipes.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cset",
    version,
    about = "Convective scale evaluation toolkit: run YAML recipes of diagnostic operators"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: cset::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    cset::logging::init_logging(cli.verbose);
    if let Err(e) = cset::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
