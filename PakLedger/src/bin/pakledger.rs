//! `PakLedger` CLI entry point

use std::process::ExitCode;

fn main() -> ExitCode {
    match pakledger::cli::run_cli() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
