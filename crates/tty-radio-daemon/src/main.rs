use tty_radio_daemon::{load_config, logging, run_server, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_path = logging::init("daemon.log", DEFAULT_LOG_FILTER)?;
    eprintln!("radiod log: {}", log_path.display());
    tracing::info!("radiod starting");

    let config = load_config()?;
    run_server(&config, None).await
}
