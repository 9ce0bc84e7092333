use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::platform;
use super::volume::Volume;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub stations: StationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Volume used when the server starts.
    #[serde(default)]
    pub volume: Volume,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Executable name or path of the mpg123-compatible decoder.
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub pause_strategy: PauseStrategy,
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,
}

/// How a paused stream is held.
///
/// `Respawn` kills the decoder and starts a fresh one on resume, which keeps
/// working after arbitrarily long pauses.  `Signal` stops the process with
/// SIGSTOP/SIGCONT and is only honoured on unix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseStrategy {
    #[default]
    Respawn,
    Signal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,
    /// Hide stream descriptions in the stream list.
    #[serde(default)]
    pub compact_titles: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "miami_vice")]
    MiamiVice,
    #[serde(rename = "light")]
    Light,
    #[serde(rename = "nocolor")]
    NoColor,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown theme '{0}' (expected auto, miami_vice, light or nocolor)")]
pub struct UnknownTheme(String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "miami_vice" | "miamivice" => Ok(Self::MiamiVice),
            "light" => Ok(Self::Light),
            "nocolor" | "no_color" | "none" => Ok(Self::NoColor),
            other => Err(UnknownTheme(other.to_string())),
        }
    }
}

impl Theme {
    /// Replace `Auto` by a concrete theme using the terminal's `COLORFGBG`.
    pub fn resolve(self) -> Self {
        self.resolve_with(std::env::var("COLORFGBG").ok().as_deref())
    }

    pub fn resolve_with(self, colorfgbg: Option<&str>) -> Self {
        if self != Self::Auto {
            return self;
        }
        // "fg;bg" or "fg;default;bg"; a low background index means dark.
        let bg = colorfgbg
            .and_then(|v| v.rsplit(';').next())
            .and_then(|bg| bg.parse::<u8>().ok());
        match bg {
            Some(bg) if bg == 7 || bg >= 9 => Self::Light,
            _ => Self::MiamiVice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationsConfig {
    /// Favorites TOML file, seeded on first run.
    #[serde(default = "default_favorites")]
    pub favorites: PathBuf,
    /// Extra m3u playlists, each loaded as its own station.
    #[serde(default)]
    pub m3u: Vec<PathBuf>,
    #[serde(default = "default_soma")]
    pub soma: bool,
    #[serde(default = "default_soma_url")]
    pub soma_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            volume: Volume::default(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            extra_args: Vec::new(),
            pause_strategy: PauseStrategy::default(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            terminate_grace_ms: default_terminate_grace_ms(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            favorites: default_favorites(),
            m3u: Vec::new(),
            soma: default_soma(),
            soma_url: default_soma_url(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7887
}

fn default_binary() -> String {
    "mpg123".to_string()
}

fn default_metadata_timeout_ms() -> u64 {
    5000
}

fn default_terminate_grace_ms() -> u64 {
    1500
}

fn default_soma() -> bool {
    true
}

fn default_soma_url() -> String {
    "https://somafm.com/channels.json".to_string()
}

fn default_favorites() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl DecoderConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first when it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
