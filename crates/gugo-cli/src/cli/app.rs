use super::*;

pub async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cancel = CancellationToken::new();
    shutdown::spawn_listener(cancel.clone());

    let config = AppConfig::load(&cli.config)?;
    let git = SystemGit::new();
    git.preflight().await.context("checking git installation")?;

    let concurrency = config.resolve_concurrency(cli.concurrency);
    info!(
        config = %cli.config.display(),
        mirrors = config.mirrors.len(),
        concurrency = concurrency.get(),
        "loaded config"
    );
    let mut orchestrator = Orchestrator::new(
        config.mirrors,
        Arc::new(SourceRegistry::new()),
        Arc::new(git),
        concurrency,
    );
    if let Some(path) = cli.lock {
        orchestrator = orchestrator.with_lock_file(path);
    }

    match cli.cron {
        Some(schedule) => {
            let orchestrator = &orchestrator;
            let cancel_ref = &cancel;
            run_on_schedule(&schedule, cli.run_before_cron, &cancel, move || async move {
                orchestrator.run(cancel_ref).await?;
                Ok::<(), anyhow::Error>(())
            })
            .await;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            if single_run_succeeded(orchestrator.run(&cancel).await) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Mirror-level errors are logged by the orchestrator as they happen; only
/// the exit status is derived here.
pub(super) fn single_run_succeeded(result: gugo_core::Result<bool>) -> bool {
    match result {
        Ok(true) => true,
        Ok(false) => {
            warn!("run skipped");
            true
        }
        Err(err) => {
            debug!(error = %err, "run finished with mirror errors");
            false
        }
    }
}
