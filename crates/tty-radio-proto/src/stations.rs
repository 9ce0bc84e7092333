//! Station files on disk: the favorites TOML and m3u playlists.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::catalog::{Station, Stream};

pub const FAVORITES_STATION: &str = "favs";

// ── TOML station loader ───────────────────────────────────────────────────────

/// Intermediate struct that matches the TOML `[[station]]` table, so the file
/// schema can keep `ui_name` optional while `Station` always carries one.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<TomlStation>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TomlStation {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ui_name: Option<String>,
    #[serde(default)]
    stream: Vec<Stream>,
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<Vec<Station>> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<Vec<Station>> {
    let file: TomlStationFile = toml::from_str(content)?;
    let stations = file
        .station
        .into_iter()
        .map(|s| Station {
            ui_name: s.ui_name.unwrap_or_else(|| s.name.clone()),
            name: s.name,
            streams: s.stream,
        })
        .collect();
    Ok(stations)
}

pub fn stations_to_toml(stations: &[Station]) -> anyhow::Result<String> {
    let file = TomlStationFile {
        station: stations
            .iter()
            .map(|s| TomlStation {
                name: s.name.clone(),
                ui_name: Some(s.ui_name.clone()),
                stream: s.streams.clone(),
            })
            .collect(),
    };
    Ok(toml::to_string_pretty(&file)?)
}

/// The station written on first run.
pub fn default_favorites() -> Station {
    Station {
        name: FAVORITES_STATION.to_string(),
        ui_name: "Favorites".to_string(),
        streams: vec![
            Stream {
                name: "BAGeL Radio".to_string(),
                url: "https://ais-sa3.cdnstream1.com/2606_128.mp3".to_string(),
                art: None,
                desc: Some("What we play is up to us".to_string()),
            },
            Stream {
                name: "WCPE Classical".to_string(),
                url: "http://audio-mp3.ibiblio.org:8000/wcpe.mp3".to_string(),
                art: None,
                desc: Some("Classical Music 24 hours a day".to_string()),
            },
        ],
    }
}

/// Write the default favorites to `path` unless the file already exists.
pub fn ensure_favorites_file(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, stations_to_toml(&[default_favorites()])?)?;
    info!("Wrote default favorites to {}", path.display());
    Ok(())
}

// ── m3u loader ────────────────────────────────────────────────────────────────

/// Parse an extended m3u playlist into streams.  `#EXTINF:<len>,<title>` names
/// the next URL line; a URL without one is named after itself.
pub fn parse_m3u_from_str(content: &str) -> Vec<Stream> {
    let mut streams = Vec::new();
    let mut pending_name: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            if let Some(comma_idx) = rest.find(',') {
                pending_name = Some(rest[comma_idx + 1..].trim().to_string());
            }
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let url = line.to_string();
        let name = pending_name.take().unwrap_or_else(|| url.clone());
        if streams.iter().any(|s: &Stream| s.name == name) {
            continue;
        }
        streams.push(Stream {
            name,
            url,
            art: None,
            desc: None,
        });
    }

    streams
}

/// Load a playlist as a station keyed by the file stem.
pub fn load_station_from_m3u(path: &Path) -> anyhow::Result<Station> {
    let content = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("playlist path has no file name: {}", path.display()))?;
    Ok(Station {
        ui_name: name.clone(),
        name,
        streams: parse_m3u_from_str(&content),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml_stations() {
        let stations = parse_stations_from_toml_str(
            r#"
            [[station]]
            name = "favs"
            ui_name = "Favorites"

            [[station.stream]]
            name = "BAGeL Radio"
            url = "https://ais-sa3.cdnstream1.com/2606_128.mp3"

            [[station.stream]]
            name = "WCPE Classical"
            url = "http://audio-mp3.ibiblio.org:8000/wcpe.mp3"
            desc = "Classical"

            [[station]]
            name = "misc"
            "#,
        )
        .unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].ui_name, "Favorites");
        assert_eq!(stations[0].streams[1].desc.as_deref(), Some("Classical"));
        assert_eq!(stations[1].ui_name, "misc");
        assert!(stations[1].streams.is_empty());
    }

    #[test]
    fn test_favorites_file_is_seeded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stations.toml");

        ensure_favorites_file(&path).unwrap();
        let stations = load_stations_from_toml(&path).unwrap();
        assert_eq!(stations, vec![default_favorites()]);

        std::fs::write(&path, "").unwrap();
        ensure_favorites_file(&path).unwrap();
        assert!(load_stations_from_toml(&path).unwrap().is_empty());
    }

    #[test]
    fn test_parse_m3u() {
        let streams = parse_m3u_from_str(
            "#EXTM3U\n\
             #EXTINF:-1,Groove Salad\n\
             http://ice1.somafm.com/groovesalad-128-mp3\n\
             \n\
             http://example.com/raw.mp3\n\
             #EXTINF:-1,Groove Salad\n\
             http://ice2.somafm.com/groovesalad-128-mp3\n",
        );
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].name, "Groove Salad");
        assert_eq!(streams[0].url, "http://ice1.somafm.com/groovesalad-128-mp3");
        assert_eq!(streams[1].name, "http://example.com/raw.mp3");
    }
}
