use super::*;

#[derive(Parser, Debug)]
#[command(
    name = "gugo",
    author,
    version,
    about = "Mirror every repository of GitHub and GitLab accounts into local bare clones"
)]
pub(super) struct Cli {
    #[arg(short, long, help = "Enable debug logging")]
    pub(super) verbose: bool,
    #[arg(
        short,
        long,
        default_value = gugo_core::config::DEFAULT_CONFIG_FILE,
        help = "Path to the YAML config file"
    )]
    pub(super) config: PathBuf,
    #[arg(
        long,
        help = "Repositories mirrored at once per mirror (defaults to config, then CPU count)"
    )]
    pub(super) concurrency: Option<usize>,
    #[arg(long, value_name = "EXPR", help = "Run on a cron schedule instead of once")]
    pub(super) cron: Option<CronSchedule>,
    #[arg(
        long,
        requires = "cron",
        help = "Run once immediately before waiting for the first cron execution"
    )]
    pub(super) run_before_cron: bool,
    #[arg(long, value_name = "PATH", help = "Lock file guarding against concurrent processes")]
    pub(super) lock: Option<PathBuf>,
}
