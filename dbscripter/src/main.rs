//! dbscripter binary entry point.
//!
//! Exports every table, view, procedure, function, trigger, index and table
//! type of one SQL Server database as individual `.sql` files.
//!
//! # Security Guarantees
//! - Read-only catalog queries only
//! - The password is never logged or written to the report

use clap::Parser;
use dbscripter::{Cli, ExitStatus, run};
use dbscripter_core::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.json_logs) {
        eprintln!("{}", e);
        std::process::exit(ExitStatus::RuntimeFailure.code());
    }

    let status = run(&cli).await;
    std::process::exit(status.code());
}
