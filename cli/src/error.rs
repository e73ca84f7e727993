use std::process::ExitCode;

use wongus_bridge::Error;

pub type CliResult<T> = anyhow::Result<T>;

/// Exit status when the host could not be reached or went away
const EXIT_HOST_GONE: u8 = 2;

/// Convert a CliResult to an ExitCode, printing errors to stderr
///
/// Errors the host reported exit with 1; a closed or shut-down channel
/// exits with 2 so scripts can tell "the host said no" from "no host".
pub fn to_exit_code(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            for cause in e.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<Error>() {
        Some(Error::Shutdown | Error::Channel(_)) => EXIT_HOST_GONE,
        _ => 1,
    }
}
