use rpdl_core::logging;
use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    // Open the log file before the sandbox goes up.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", err);
    }

    ExitCode::from(cli::run_from_args())
}
