use anyhow::Context;
use clap::Parser;
use daemon::cli::{Cli, CliCommand};
use daemon::config::{default_config_path, load_config};
use daemon::{Service, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    let config = load_config(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    if cli.subcommand() == CliCommand::Check {
        println!("Configuration at {} is valid", config_path.display());
        return Ok(());
    }

    logger::setup_logger(config.logging(), cli.log_level.as_deref())?;
    let service = Service::new(&config_path, config)?;

    match cli.subcommand() {
        CliCommand::Once => {
            let status = service.run_once().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        _ => {
            service
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for ctrl-c: {}", e);
                    }
                })
                .await?;
        }
    }
    Ok(())
}
