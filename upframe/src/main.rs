//! Upframe demonstration runner
//!
//! Runs built-in scenarios that exercise the frame stack through its public
//! API and reports what each one observed.

mod runner;

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Run upframe demonstration scenarios")]
struct Args {
    /// Log filter, overriding the UPFRAME_LOG environment variable
    #[arg(long)]
    log: Option<String>,

    /// List the available scenarios and exit
    #[arg(long)]
    list: bool,

    /// Scenarios to run; all of them when omitted
    scenarios: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args
        .log
        .clone()
        .or_else(|| std::env::var("UPFRAME_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    println!("Upframe v{}", env!("CARGO_PKG_VERSION"));

    if args.list {
        for scenario in runner::SCENARIOS {
            println!("  {:<12} {}", scenario.name, scenario.about);
        }
        return ExitCode::SUCCESS;
    }

    match runner::run(&args.scenarios) {
        Ok(passed) => {
            info!("{} scenario(s) completed", passed);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Scenario run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
