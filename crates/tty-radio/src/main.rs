//! `radio`: terminal UI, server launcher and scripting interface.
//!
//! Without a subcommand the terminal UI starts.  `ui` and `server` embed the
//! HTTP server unless one already answers on the configured address; every
//! other command talks to a running server.

mod commands;
mod ui;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tty_radio_daemon::{logging, server_running, Daemon, DEFAULT_LOG_FILTER};
use tty_radio_proto::client::ApiClient;
use tty_radio_proto::config::{Config, Theme};
use tty_radio_proto::volume::{parse_volume, Volume, VolumeFormat};

#[derive(Debug, Parser)]
#[command(
    name = "radio",
    about = "Internet radio in the terminal, backed by mpg123",
    version,
    infer_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the interactive terminal UI (starts a server if none is running)
    Ui {
        /// Color theme: auto, miami_vice, light or nocolor
        #[arg(long, value_name = "NAME")]
        theme: Option<Theme>,
        /// Start volume 0..32000, overrides the config file
        #[arg(long, value_name = "INT", value_parser = parse_vol_arg)]
        vol: Option<Volume>,
    },
    /// Run the server without the terminal UI
    Server {
        /// Start volume 0..32000, overrides the config file
        #[arg(long, value_name = "INT", value_parser = parse_vol_arg)]
        vol: Option<Volume>,
    },
    /// Start or re-start playback, optionally of the first stream matching SEARCH
    #[command(alias = "start")]
    Play {
        /// Limit the search to one station (see `radio stations`)
        #[arg(long)]
        station: Option<String>,
        /// Words of a stream name; case and whitespace are ignored
        search: Vec<String>,
    },
    /// Pause playback
    Pause,
    /// Stop playback
    Stop,
    /// Toggle between play and pause
    Toggle {
        /// Stop instead of pause
        #[arg(long)]
        stop: bool,
    },
    /// Print the player status
    Status {
        /// Print the current song, or the stream name when there is none
        #[arg(long)]
        song: bool,
        /// Print the stream name; with --song, stream name then song
        #[arg(long)]
        stream: bool,
        /// Fail silently if no server is running
        #[arg(long)]
        quiet: bool,
    },
    /// List stations and their streams as JSON
    Stations,
    /// Show or change the volume; a change restarts an active stream
    Volume {
        /// 0..32000, 0.0..1.0 or 0..100 (optionally with %), see --format
        #[arg(long, allow_hyphen_values = true)]
        value: Option<String>,
        /// Reset to the volume from the config file
        #[arg(long)]
        reset: bool,
        /// Format used to parse --value and to print the volume
        #[arg(long)]
        format: Option<VolumeFormat>,
    },
    /// Print or write the complete configuration
    Config {
        /// Overwrite the config file with the complete configuration
        #[arg(long)]
        write: bool,
        /// With --write, keep a backup of an existing config file (default)
        #[arg(long, overrides_with = "no_backup")]
        backup: bool,
        #[arg(long, overrides_with = "backup")]
        no_backup: bool,
        /// Use the defaults instead of the current configuration
        #[arg(long)]
        default: bool,
    },
}

fn parse_vol_arg(raw: &str) -> Result<Volume, String> {
    parse_volume(raw, Some(VolumeFormat::Int)).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    match run(Cli::parse()).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.downcast_ref::<commands::QuietExit>().is_some() => Ok(ExitCode::FAILURE),
        Err(e) => Err(e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Commands::Ui {
        theme: None,
        vol: None,
    });

    let log_name = match command {
        Commands::Server { .. } => "daemon.log",
        _ => "radio.log",
    };
    let log_path = logging::init(log_name, DEFAULT_LOG_FILTER)?;
    tracing::debug!("radio {:?}, log at {}", command, log_path.display());

    let config = tty_radio_daemon::load_config()?;
    let client = ApiClient::new(config.server.base_url());

    match command {
        Commands::Ui { theme, vol } => run_ui(config, client, theme, vol).await,
        Commands::Server { vol } => tty_radio_daemon::run_server(&config, vol).await,
        Commands::Play { station, search } => {
            commands::play(&client, station.as_deref(), &search).await
        }
        Commands::Pause => commands::pause(&client).await,
        Commands::Stop => commands::stop(&client).await,
        Commands::Toggle { stop } => commands::toggle(&client, stop).await,
        Commands::Status {
            song,
            stream,
            quiet,
        } => commands::status(&client, song, stream, quiet).await,
        Commands::Stations => commands::stations(&client).await,
        Commands::Volume {
            value,
            reset,
            format,
        } => commands::volume(&client, &config, value.as_deref(), reset, format).await,
        Commands::Config {
            write,
            backup,
            no_backup,
            default,
        } => commands::config(write, backup || !no_backup, default),
    }
}

async fn run_ui(
    config: Config,
    client: ApiClient,
    theme: Option<Theme>,
    vol: Option<Volume>,
) -> anyhow::Result<()> {
    let daemon = if server_running(&client).await? {
        tracing::info!("Attaching to server at {}", client.base_url());
        None
    } else {
        Some(Daemon::launch(&config, vol).await?)
    };

    let theme = theme.unwrap_or(config.ui.theme).resolve();
    let result = ui::run(client, theme, config.ui.compact_titles).await;

    if let Some(daemon) = daemon {
        daemon.shutdown().await;
    }
    result
}
