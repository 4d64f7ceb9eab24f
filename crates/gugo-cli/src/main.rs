mod cli;
mod logging;
mod shutdown;

use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "gugo failed");
            ExitCode::FAILURE
        }
    }
}
