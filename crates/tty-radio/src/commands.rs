//! Scripting interface: one function per subcommand, all talking to a running
//! server through [`ApiClient`].

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::info;

use tty_radio_proto::client::{ApiClient, ClientError};
use tty_radio_proto::config::Config;
use tty_radio_proto::protocol::StatusData;
use tty_radio_proto::volume::{format_volume, parse_volume, VolumeFormat};

/// Ends the command with exit code 1 and no message.
#[derive(Debug, thiserror::Error)]
#[error("exiting quietly")]
pub struct QuietExit;

/// Check that a server answers before running a command.
async fn connect(client: &ApiClient, quiet: bool) -> anyhow::Result<StatusData> {
    match client.status().await {
        Ok(status) => Ok(status),
        Err(e) if quiet => {
            info!("status --quiet: {}", e);
            Err(QuietExit.into())
        }
        Err(ClientError::Connection(_)) => anyhow::bail!("Cannot connect to server"),
        Err(e) => Err(e).context("Error connecting to server"),
    }
}

pub async fn play(client: &ApiClient, station: Option<&str>, search: &[String]) -> anyhow::Result<()> {
    let status = connect(client, false).await?;

    if !search.is_empty() {
        let query = search.join(" ");
        let found = client.find(&query, station).await?;
        println!("Playing station: {}", found.stream);
        if status.currently_streaming {
            client.stop().await?;
        }
        client.play(Some(&found.station), Some(&found.stream)).await?;
        return Ok(());
    }

    if status.stream.is_none() {
        anyhow::bail!("No active stream. Specify a stream name");
    }
    if status.is_playing() {
        client.stop().await?;
    }
    client.play(None, None).await?;
    Ok(())
}

pub async fn pause(client: &ApiClient) -> anyhow::Result<()> {
    connect(client, false).await?;
    client.pause().await?;
    Ok(())
}

pub async fn stop(client: &ApiClient) -> anyhow::Result<()> {
    connect(client, false).await?;
    client.stop().await?;
    Ok(())
}

pub async fn toggle(client: &ApiClient, stop: bool) -> anyhow::Result<()> {
    let status = connect(client, false).await?;
    if status.stream.is_none() {
        println!("Not tuned into a stream");
        return Ok(());
    }
    if status.is_playing() {
        if stop {
            client.stop().await?;
        } else {
            client.pause().await?;
        }
    } else {
        client.play(None, None).await?;
    }
    Ok(())
}

pub async fn status(client: &ApiClient, song: bool, stream: bool, quiet: bool) -> anyhow::Result<()> {
    let status = connect(client, quiet).await?;
    if song {
        println!("{}", render_song(&status, stream));
    } else if stream {
        println!("{}", status.stream.as_deref().unwrap_or_default());
    } else {
        println!("{}", serde_json::to_string(&status)?);
    }
    Ok(())
}

pub async fn stations(client: &ApiClient) -> anyhow::Result<()> {
    connect(client, false).await?;
    println!("{}", serde_json::to_string(&client.stations().await?)?);
    Ok(())
}

pub async fn volume(
    client: &ApiClient,
    config: &Config,
    value: Option<&str>,
    reset: bool,
    format: Option<VolumeFormat>,
) -> anyhow::Result<()> {
    let mut status = connect(client, false).await?;

    let requested = if reset {
        Some(config.server.volume)
    } else {
        value
            .map(|raw| parse_volume(raw, format))
            .transpose()
            .context("Invalid value")?
    };
    if let Some(volume) = requested {
        if volume != status.volume {
            status = client.set_volume(volume).await?;
        }
    }

    let out_format = if reset { None } else { format };
    println!("{}", format_volume(status.volume, out_format));
    Ok(())
}

pub fn config(write: bool, backup: bool, default: bool) -> anyhow::Result<()> {
    let config = if default {
        Config::default()
    } else {
        Config::load()?
    };
    if !write {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let path = Config::config_path();
    if backup && path.exists() {
        let backup_path = backup_path(&path);
        std::fs::copy(&path, &backup_path)
            .with_context(|| format!("Failed to back up {}", path.display()))?;
        println!("Backed up {} to {}", path.display(), backup_path.display());
    }
    config.save()?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// `config.toml~`, or `config.toml~N` for the first free N.
fn backup_path(path: &Path) -> PathBuf {
    let base = path.as_os_str().to_owned();
    let mut candidate = base.clone();
    candidate.push("~");
    let mut i = 0;
    while Path::new(&candidate).exists() {
        i += 1;
        candidate = base.clone();
        candidate.push(format!("~{}", i));
    }
    PathBuf::from(candidate)
}

/// One line for status bars: the song, falling back to the stream name.
/// With `show_stream` the stream name comes first, on its own line.  Empty
/// when nothing is streaming.
pub fn render_song(status: &StatusData, show_stream: bool) -> String {
    if !status.currently_streaming {
        return String::new();
    }
    let stream_name = status
        .stream_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .or(status.stream.as_deref())
        .unwrap_or_default();
    let song = status.song.as_deref().filter(|s| !s.is_empty());

    match (show_stream, song) {
        (true, Some(song)) => format!("{}\n{}", stream_name, song),
        (true, None) => stream_name.to_string(),
        (false, Some(song)) => song.to_string(),
        (false, None) => stream_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tty_radio_proto::volume::Volume;

    fn status(stream_name: Option<&str>, song: Option<&str>) -> StatusData {
        StatusData {
            station: Some("favs".into()),
            stream: Some("WCPE Classical".into()),
            paused: false,
            currently_streaming: true,
            stream_name: stream_name.map(str::to_string),
            song: song.map(str::to_string),
            volume: Volume::default(),
        }
    }

    #[test]
    fn test_render_song() {
        assert_eq!(render_song(&status(Some("WCPE"), Some("Bach")), false), "Bach");
        assert_eq!(render_song(&status(Some("WCPE"), Some("Bach")), true), "WCPE\nBach");
        assert_eq!(render_song(&status(Some("WCPE"), Some("")), false), "WCPE");
        assert_eq!(render_song(&status(None, None), false), "WCPE Classical");

        let mut stopped = status(Some("WCPE"), Some("Bach"));
        stopped.currently_streaming = false;
        assert_eq!(render_song(&stopped, true), "");
    }

    #[tokio::test]
    async fn test_quiet_status_without_server() {
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = super::status(&client, true, false, true).await.unwrap_err();
        assert!(err.downcast_ref::<QuietExit>().is_some());

        let err = super::status(&client, false, false, false).await.unwrap_err();
        assert!(err.downcast_ref::<QuietExit>().is_none());
        assert_eq!(err.to_string(), "Cannot connect to server");
    }

    #[test]
    fn test_backup_path_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert_eq!(backup_path(&path), dir.path().join("config.toml~"));

        std::fs::write(dir.path().join("config.toml~"), "").unwrap();
        std::fs::write(dir.path().join("config.toml~1"), "").unwrap();
        assert_eq!(backup_path(&path), dir.path().join("config.toml~2"));
    }
}
