use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use color_eyre::Result;
use minitel_sender::{
    cli,
    config::Config,
    link::serial::SerialConnector,
    logging,
    signals::{RunFlags, SignalBridge},
    supervisor::Supervisor,
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(command) = &cli.command {
        cli::handle_command(command)?;

        return Ok(ExitCode::SUCCESS);
    }

    logging::init(cli.log_settings()).await?;

    let config = if let Some(config_path) = &cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)?
    } else {
        debug!("Default config");
        Config::default()
    };
    config.validate()?;

    let flags = Arc::new(RunFlags::default());
    let _signals = SignalBridge::spawn(flags.clone())?;

    let outcome = Supervisor::new(SerialConnector, cli.transmission_config(), config, flags)
        .run()
        .await;

    Ok(ExitCode::from(outcome.exit_code()))
}
