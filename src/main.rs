//! jalm-provision: compile JALM intents into client deployments.

use clap::Parser;
use jalm_provision::cli::Cli;

fn main() {
    let cli = Cli::parse();
    jalm_provision::telemetry::init_tracing(cli.log_json, cli.log_level.into());
    if let Err(e) = jalm_provision::cli::dispatch(cli.command) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
