use std::process::ExitCode;

use clap::Parser;
use tcore::TcoreError;
use tcore::cli::{self, Cli};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_filter = cli::resolve_env_filter(&cli);

    if let Err(err) = tcore::telemetry::install(&env_filter) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    match cli::run_with_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            let code = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<TcoreError>())
                .map_or(1, TcoreError::exit_code);
            ExitCode::from(code)
        }
    }
}
