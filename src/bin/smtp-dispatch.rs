use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use smtp_dispatch::{
    dispatch::{ConsoleReport, Dispatcher},
    recipients::RecipientSource,
    Config, Error,
};
use tracing_subscriber::EnvFilter;

/// Exit status when a recipient failed
const EXIT_FAILED_RECIPIENTS: u8 = 1;
/// Exit status when the run could not start
const EXIT_CONFIGURATION: u8 = 2;

#[derive(Debug, Parser)]
#[command(version, about = "Send one message to every recipient of a list through an SMTP relay")]
struct Opt {
    /// Path to the TOML configuration
    #[arg(long, short)]
    config: PathBuf,

    /// Show the subject and the first recipients, send nothing
    #[arg(long)]
    dry_run: bool,

    /// Log the SMTP exchange
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let opt = Opt::parse();

    let default_level = if opt.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&opt) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED_RECIPIENTS),
        Err(err) => {
            eprintln!("smtp-dispatch: {err}");
            ExitCode::from(EXIT_CONFIGURATION)
        }
    }
}

/// Returns whether every recipient was delivered to
fn run(opt: &Opt) -> Result<bool, Error> {
    let config = Config::from_path(&opt.config)?;
    let recipients = config.recipients().recipients()?;
    tracing::info!(
        "loaded {} recipient(s) from {}",
        recipients.len(),
        config.recipients().path().display()
    );

    let mut dispatcher = Dispatcher::new(config.transport()?);
    let summary = dispatcher.run(
        &recipients,
        config.relay(),
        config.content(),
        config.pacing(),
        opt.dry_run,
        &mut ConsoleReport::new(io::stdout().lock()),
    )?;

    Ok(summary.is_success())
}
