//! retitle: rename every file in a directory after what it contains.
//!
//! Exit status:
//!   0  the directory was readable (per-file failures are in the report)
//!   1  configuration or output error
//!   2  the directory is missing or unreadable

mod cli;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use retitle_core::Error;

use crate::cli::{build_runner, Cli};

const EXIT_CONFIG: u8 = 1;
const EXIT_DIRECTORY: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let _log_guard = logging::init_tracing(cli.verbose);

    let runner = match build_runner(&cli) {
        Ok(runner) => runner,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let cancel = runner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            cancel.cancel();
        }
    });

    let summary = match runner.run(&cli.directory).await {
        Ok(summary) => summary,
        Err(e @ Error::DirectoryUnavailable { .. }) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_DIRECTORY);
        }
        Err(e) => {
            error!(error = %e, "Run failed");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: could not serialize summary: {}", e);
                return ExitCode::from(EXIT_CONFIG);
            }
        }
    } else {
        for line in summary.report_lines() {
            println!("{}", line);
        }
        println!("{}", summary.totals_line());
    }

    info!(run_id = %summary.run_id, "Done");
    ExitCode::SUCCESS
}
