use anyhow::{Context, Result};
use clap::Parser;
use downtime_tracker::cli::{self, Cli};
use downtime_tracker::{telemetry, ui, TrackerConfig, TrackerError};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = TrackerConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    cli.apply_overrides(&mut config);
    telemetry::init_tracing_with(&config.log, cli.verbose);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    if let Err(e) = cli::run(cli, &config, &mut stdin.lock(), &mut stdout.lock()) {
        let mut stderr = std::io::stderr();
        let _ = match e.downcast_ref::<TrackerError>() {
            Some(err) if err.is_warning() => ui::warning(&mut stderr, &err.to_string()),
            _ => ui::error(&mut stderr, &format!("{e:#}")),
        };
        std::process::exit(1);
    }

    Ok(())
}
