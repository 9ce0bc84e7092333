//! Catalog loaders: favorites file, m3u playlists and the SomaFM channel list.

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use tty_radio_proto::catalog::{Station, StationCatalog, Stream};
use tty_radio_proto::config::StationsConfig;
use tty_radio_proto::stations::{
    default_favorites, ensure_favorites_file, load_station_from_m3u, load_stations_from_toml,
};

pub const SOMA_STATION: &str = "soma";

/// Build the catalog: favorites first, then playlists, then SomaFM.  Only a
/// broken favorites file is fatal; remote and playlist sources are skipped
/// with a warning.
pub async fn load_catalog(config: &StationsConfig) -> anyhow::Result<StationCatalog> {
    let mut stations = load_favorites(config)?;

    for path in &config.m3u {
        match load_station_from_m3u(path) {
            Ok(station) => {
                info!("Loaded {} streams from {}", station.streams.len(), path.display());
                stations.push(station);
            }
            Err(e) => warn!("Skipping playlist {}: {}", path.display(), e),
        }
    }

    if config.soma {
        match fetch_soma(&config.soma_url).await {
            Ok(station) => {
                info!("Loaded {} SomaFM channels", station.streams.len());
                stations.push(station);
            }
            Err(e) => warn!("SomaFM unavailable: {:#}", e),
        }
    }

    let mut seen = std::collections::HashSet::new();
    stations.retain(|s| {
        let fresh = seen.insert(s.name.clone());
        if !fresh {
            warn!("Ignoring duplicate station '{}'", s.name);
        }
        fresh
    });

    StationCatalog::new(stations).context("invalid station catalog")
}

fn load_favorites(config: &StationsConfig) -> anyhow::Result<Vec<Station>> {
    let path = &config.favorites;
    if let Err(e) = ensure_favorites_file(path) {
        warn!("Cannot write {}: {}, using built-in favorites", path.display(), e);
        return Ok(vec![default_favorites()]);
    }
    let stations = load_stations_from_toml(path)
        .with_context(|| format!("failed to read favorites from {}", path.display()))?;
    info!("Loaded {} stations from {}", stations.len(), path.display());
    Ok(stations)
}

// ── SomaFM ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SomaChannels {
    channels: Vec<SomaChannel>,
}

#[derive(Debug, Deserialize)]
struct SomaChannel {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    xlimage: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    playlists: Vec<SomaPlaylist>,
}

#[derive(Debug, Deserialize)]
struct SomaPlaylist {
    url: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    quality: String,
}

async fn fetch_soma(url: &str) -> anyhow::Result<Station> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await
        .context("Failed to fetch SomaFM channels")?;

    if !response.status().is_success() {
        anyhow::bail!("SomaFM returned status: {}", response.status());
    }

    let body = response
        .text()
        .await
        .context("Failed to read SomaFM channels")?;
    parse_soma_channels(&body)
}

/// Channels without an mp3 playlist are dropped; the best mp3 quality wins.
pub fn parse_soma_channels(json: &str) -> anyhow::Result<Station> {
    let parsed: SomaChannels = serde_json::from_str(json).context("Failed to parse SomaFM channels")?;

    let mut streams: Vec<Stream> = Vec::new();
    for channel in parsed.channels {
        let best = channel
            .playlists
            .iter()
            .filter(|p| p.format == "mp3")
            .min_by_key(|p| quality_rank(&p.quality));
        let Some(playlist) = best else {
            continue;
        };
        if streams.iter().any(|s| s.name == channel.title) {
            continue;
        }
        streams.push(Stream {
            name: channel.title,
            url: playlist.url.clone(),
            art: channel.xlimage.or(channel.image),
            desc: channel.description,
        });
    }

    Ok(Station {
        name: SOMA_STATION.to_string(),
        ui_name: "SomaFM".to_string(),
        streams,
    })
}

fn quality_rank(quality: &str) -> u8 {
    match quality {
        "highest" => 0,
        "high" => 1,
        "low" => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNELS: &str = r#"{
        "channels": [
            {
                "id": "groovesalad",
                "title": "Groove Salad",
                "description": "A nicely chilled plate of ambient/downtempo beats.",
                "image": "https://api.somafm.com/img/groovesalad120.png",
                "playlists": [
                    { "url": "https://api.somafm.com/groovesalad130.pls", "format": "aac", "quality": "highest" },
                    { "url": "https://api.somafm.com/groovesalad64.pls", "format": "mp3", "quality": "low" },
                    { "url": "https://api.somafm.com/groovesalad256.pls", "format": "mp3", "quality": "highest" }
                ]
            },
            {
                "id": "aaconly",
                "title": "AAC Only",
                "playlists": [
                    { "url": "https://api.somafm.com/aaconly.pls", "format": "aac", "quality": "high" }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_soma_channels() {
        let station = parse_soma_channels(CHANNELS).unwrap();
        assert_eq!(station.name, "soma");
        assert_eq!(station.streams.len(), 1);
        let s = &station.streams[0];
        assert_eq!(s.name, "Groove Salad");
        assert_eq!(s.url, "https://api.somafm.com/groovesalad256.pls");
        assert_eq!(s.art.as_deref(), Some("https://api.somafm.com/img/groovesalad120.png"));
    }

    #[test]
    fn test_parse_soma_rejects_garbage() {
        assert!(parse_soma_channels("<html>").is_err());
    }

    #[tokio::test]
    async fn test_load_catalog_offline() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = dir.path().join("jazz.m3u");
        std::fs::write(&playlist, "#EXTINF:-1,Jazz24\nhttp://example.com/jazz24.mp3\n").unwrap();

        let config = StationsConfig {
            favorites: dir.path().join("stations.toml"),
            m3u: vec![playlist, dir.path().join("missing.m3u")],
            soma: false,
            soma_url: String::new(),
        };
        let catalog = load_catalog(&config).await.unwrap();
        let names: Vec<_> = catalog.list_stations().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["favs", "jazz"]);
        let (st, _) = catalog.find_stream("bagel", None).unwrap();
        assert_eq!(st.name, "favs");
        assert!(config.favorites.exists());
    }
}
