use std::process::ExitCode;

use colored::Colorize;

use quizforge::errors::get_exit_code;
use quizforge::{cli, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    match cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(get_exit_code(&e))
        }
    }
}
