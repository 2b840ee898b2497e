//! `scanpost` CLI 진입점

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use clap::Parser;
use colored::Colorize;

use scanpost_core::config::GeneralConfig;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG_FILE};
use crate::commands::FlagOverrides;
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let writer = OutputWriter::new(cli.output);

    let flags = FlagOverrides {
        log_level: cli.log_level.as_deref(),
        base_url: cli.base_url.as_deref(),
    };
    let loaded = commands::load_config(cli.config.as_deref(), &flags).await;

    // 설정 로드에 실패해도 로깅은 초기화
    let general = match &loaded {
        Ok(loaded) => loaded.config.general.clone(),
        Err(_) => GeneralConfig {
            log_level: cli.log_level.clone().unwrap_or_else(|| "warn".to_owned()),
            ..GeneralConfig::default()
        },
    };
    logging::init_tracing(&general)?;
    scanpost_core::metrics::describe_all();

    let source = cli
        .config
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_owned());

    let result = match cli.command {
        Commands::Scan(args) => match loaded {
            Ok(loaded) => commands::scan::execute(args, loaded, &writer).await,
            Err(e) => Err(e),
        },
        Commands::Validate(args) => commands::validate::execute(args, &writer).await,
        Commands::Health(args) => match loaded {
            Ok(loaded) => commands::health::execute(args, loaded, &writer).await,
            Err(e) => Err(e),
        },
        Commands::Config(args) => commands::config::execute(args, loaded, &source, &writer),
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(e.exit_code());
    }
    Ok(())
}

fn report_error(e: &CliError) {
    tracing::debug!(error = %e, exit_code = e.exit_code(), "command failed");
    eprintln!("{} {e}", "error:".red().bold());
}
