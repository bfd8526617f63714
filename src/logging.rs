use std::{fs::File, path::Path, sync::Mutex};
use tracing::Level;

use crate::errors::{Result, VerifyError};

/// Log level for the number of `-v` flags given.
pub fn level(verbosity: u64) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber. Logs go to stderr, or to `log_file` when
/// one is given.
pub fn init(verbosity: u64, log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level(verbosity))
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|err| VerifyError::io(path, err))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
