use std::path::PathBuf;

use tty_radio_proto::platform;

/// Send `tracing` output to `<data_dir>/<file_name>`.  `RUST_LOG` overrides
/// `default_filter`.  Returns the log path.
pub fn init(file_name: &str, default_filter: &str) -> anyhow::Result<PathBuf> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join(file_name);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(log_path)
}
