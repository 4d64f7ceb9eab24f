use crate::{logging, shutdown};
use anyhow::Context;
use clap::Parser;
use gugo_core::Orchestrator;
use gugo_core::config::AppConfig;
use gugo_core::daemon::{CronSchedule, run_on_schedule};
use gugo_core::git::SystemGit;
use gugo_providers::SourceRegistry;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app;
mod args;

use args::Cli;

pub async fn run() -> anyhow::Result<ExitCode> {
    app::run().await
}
