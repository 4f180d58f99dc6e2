mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        // Default to run when no subcommand is given.
        None | Some(Command::Run) => {
            init_tracing(cli.json_logs);
            let config = cli.resolve_config();
            cli::run::run(config).await
        }
        Some(Command::Stats { json }) => cli::stats::print(*json),
        Some(Command::Config(ConfigCommand::Validate)) => {
            init_cli_tracing();
            let config = cli.load_config_strict()?;
            if !cli::config::validate(&config, &cli.config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            init_cli_tracing();
            let config = cli.resolve_config();
            cli::config::show(&config)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Quiet logging for one-shot utility commands.
fn init_cli_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
