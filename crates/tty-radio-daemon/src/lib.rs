pub mod decoder;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod session;
pub mod sources;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use decoder::mpg123::Mpg123Launcher;
use session::{PlaybackSession, SessionConfig};
use tty_radio_proto::client::ApiClient;
use tty_radio_proto::config::Config;
use tty_radio_proto::platform;
use tty_radio_proto::volume::Volume;

pub const DEFAULT_LOG_FILTER: &str = "info,tty_radio_daemon=debug,hyper_util=warn,reqwest=warn";

/// A running server: catalog, session, heartbeat and HTTP listener.
pub struct Daemon {
    session: Arc<PlaybackSession>,
    cancel: CancellationToken,
    http: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl Daemon {
    /// Load the catalog, bind the listener and start serving.  `volume`
    /// overrides the configured start volume.
    pub async fn launch(config: &Config, volume: Option<Volume>) -> anyhow::Result<Self> {
        let catalog = sources::load_catalog(&config.stations).await?;

        if platform::find_decoder_binary(&config.decoder.binary).is_none() {
            warn!(
                "Decoder '{}' not found; playback will fail until it is installed",
                config.decoder.binary
            );
        }
        let launcher = Mpg123Launcher::new(&config.decoder);
        let session = Arc::new(PlaybackSession::new(
            Arc::new(catalog),
            Arc::new(launcher),
            volume.unwrap_or(config.server.volume),
            SessionConfig {
                metadata_timeout: config.decoder.metadata_timeout(),
                heartbeat_interval: Duration::from_secs(2),
            },
        ));

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;
        info!("HTTP API server listening on http://{}", addr);

        let cancel = CancellationToken::new();
        let heartbeat = session.spawn_heartbeat(cancel.child_token());
        let http = {
            let session = Arc::clone(&session);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = http::serve(listener, session, cancel).await {
                    error!("HTTP server error: {}", e);
                }
            })
        };

        Ok(Self {
            session,
            cancel,
            http,
            heartbeat,
        })
    }

    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// Stop playback, then the heartbeat and the HTTP listener.
    pub async fn shutdown(self) {
        info!("Shutting down");
        self.session.shutdown().await;
        self.cancel.cancel();
        let _ = self.heartbeat.await;
        if tokio::time::timeout(Duration::from_secs(3), self.http).await.is_err() {
            warn!("HTTP server did not drain in time");
        }
    }
}

/// The config file, or an error naming what is wrong with it.
pub fn load_config() -> anyhow::Result<Config> {
    Config::load().map_err(|e| anyhow::anyhow!("Error in config: {}", e))
}

/// True when something already answers the status endpoint.
pub async fn server_running(client: &ApiClient) -> anyhow::Result<bool> {
    match client.status().await {
        Ok(_) => Ok(true),
        Err(e) if e.is_connection() => Ok(false),
        Err(e) => anyhow::bail!("Error contacting server at {}: {}", client.base_url(), e),
    }
}

/// Serve until ctrl-c.  Refuses to start when a server already answers on
/// the configured address.
pub async fn run_server(config: &Config, volume: Option<Volume>) -> anyhow::Result<()> {
    let client = ApiClient::new(config.server.base_url());
    if server_running(&client).await? {
        anyhow::bail!("Server already running");
    }
    let daemon = Daemon::launch(config, volume).await?;
    eprintln!("radio server listening on {}", config.server.base_url());

    tokio::signal::ctrl_c().await?;
    daemon.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::fake::FakeLauncher;
    use tty_radio_proto::catalog::StationCatalog;
    use tty_radio_proto::stations::default_favorites;

    #[tokio::test]
    async fn test_second_server_is_refused() {
        let catalog = StationCatalog::new(vec![default_favorites()]).unwrap();
        let session = Arc::new(PlaybackSession::new(
            Arc::new(catalog),
            Arc::new(FakeLauncher::new()),
            Volume::default(),
            SessionConfig::default(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(http::serve(listener, session, cancel.clone()));

        let mut config = Config::default();
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
        assert!(server_running(&ApiClient::new(config.server.base_url())).await.unwrap());

        let err = run_server(&config, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Server already running");

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_nothing_listening() {
        let client = ApiClient::new("http://127.0.0.1:9");
        assert!(!server_running(&client).await.unwrap());
    }
}
