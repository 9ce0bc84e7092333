//! PlaybackSession: the player state machine.
//!
//! Binds the selected (station, stream) to at most one decoder process.  All
//! mutations serialize on `gate`; `status()` never touches it and instead
//! reads the snapshot published at the end of every mutation plus the
//! metadata watch channel.
//!
//! ```text
//!   Stopped --play--> Playing --pause--> Paused --play--> Playing
//!      ^                 |                  |
//!      +------stop-------+-------stop-------+
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::{DecoderError, DecoderHandle, DecoderLauncher, VolumeChange};
use crate::metadata::MetadataSnapshot;
use tty_radio_proto::catalog::{CatalogError, StationCatalog};
use tty_radio_proto::protocol::{NowPlaying, StatusData, StreamDetail};
use tty_radio_proto::volume::{Volume, VolumeError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    NotFound(#[from] CatalogError),
    #[error("already playing '{0}'")]
    AlreadyPlaying(String),
    #[error("no stream selected")]
    NoActiveStream,
    #[error(transparent)]
    InvalidVolume(#[from] VolumeError),
    #[error(transparent)]
    Decoder(#[from] DecoderError),
}

/// Coarse classification used by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidVolume,
    SpawnFailed,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyPlaying(_) | Self::NoActiveStream => ErrorKind::InvalidState,
            Self::InvalidVolume(_) => ErrorKind::InvalidVolume,
            Self::Decoder(_) => ErrorKind::SpawnFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound for `now_playing(wait = true)`.
    pub metadata_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(2),
        }
    }
}

/// A resolved, playable stream.
#[derive(Debug, Clone, PartialEq)]
struct Target {
    station: String,
    stream: String,
    url: String,
}

struct SessionInner {
    station: Option<String>,
    stream: Option<String>,
    /// Present iff Playing or Paused.
    decoder: Option<Box<dyn DecoderHandle>>,
    /// The stream `decoder` was started for.
    active: Option<Target>,
    paused: bool,
    volume: Volume,
}

impl SessionInner {
    fn state(&self) -> PlayState {
        match (&self.decoder, self.paused) {
            (None, _) => PlayState::Stopped,
            (Some(_), false) => PlayState::Playing,
            (Some(_), true) => PlayState::Paused,
        }
    }
}

/// What `status()` reads without taking the gate.
#[derive(Debug, Clone, Default)]
struct Published {
    station: Option<String>,
    stream: Option<String>,
    paused: bool,
    streaming: bool,
    volume: Volume,
}

pub struct PlaybackSession {
    catalog: Arc<StationCatalog>,
    launcher: Arc<dyn DecoderLauncher>,
    config: SessionConfig,
    gate: Mutex<SessionInner>,
    published: RwLock<Published>,
    metadata: Arc<watch::Sender<MetadataSnapshot>>,
}

impl PlaybackSession {
    pub fn new(
        catalog: Arc<StationCatalog>,
        launcher: Arc<dyn DecoderLauncher>,
        volume: Volume,
        config: SessionConfig,
    ) -> Self {
        let (metadata, _) = watch::channel(MetadataSnapshot::default());
        Self {
            catalog,
            launcher,
            config,
            gate: Mutex::new(SessionInner {
                station: None,
                stream: None,
                decoder: None,
                active: None,
                paused: false,
                volume,
            }),
            published: RwLock::new(Published {
                volume,
                ..Published::default()
            }),
            metadata: Arc::new(metadata),
        }
    }

    pub fn catalog(&self) -> &StationCatalog {
        &self.catalog
    }

    // ── reads ─────────────────────────────────────────────────────────────────

    pub async fn status(&self) -> StatusData {
        let published = self.published.read().await.clone();
        let meta = self.metadata.borrow().clone();
        StatusData {
            station: published.station,
            stream: published.stream,
            paused: published.paused,
            currently_streaming: published.streaming,
            stream_name: meta.stream_name,
            song: meta.song,
            volume: published.volume,
        }
    }

    /// Latest metadata.  With `wait`, blocks until the first item arrives for
    /// the current stream or the metadata timeout elapses; a timeout yields
    /// whatever is there, usually nothing.
    pub async fn now_playing(&self, wait: bool) -> NowPlaying {
        let streaming = self.published.read().await.streaming;
        let mut rx = self.metadata.subscribe();
        if wait && streaming {
            let waited =
                tokio::time::timeout(self.config.metadata_timeout, rx.wait_for(|s| !s.is_empty()))
                    .await;
            if waited.is_err() {
                debug!("No metadata within {:?}", self.config.metadata_timeout);
            }
        }
        let snapshot = rx.borrow().clone();
        NowPlaying {
            stream_name: snapshot.stream_name,
            song: snapshot.song,
        }
    }

    /// Catalog data for one stream, with live metadata when it is the stream
    /// currently held by the decoder.
    pub async fn stream_detail(&self, station: &str, stream: &str) -> Result<StreamDetail, SessionError> {
        let (st, s) = self.catalog.stream(station, stream)?;
        let published = self.published.read().await.clone();
        let is_active = published.streaming
            && published.station.as_deref() == Some(station)
            && published.stream.as_deref() == Some(stream);
        let meta = if is_active {
            self.metadata.borrow().clone()
        } else {
            MetadataSnapshot::default()
        };
        Ok(StreamDetail {
            station: st.name.clone(),
            name: s.name.clone(),
            url: s.url.clone(),
            art: s.art.clone(),
            desc: s.desc.clone(),
            meta_name: meta.stream_name,
            meta_song: meta.song,
        })
    }

    // ── mutations ─────────────────────────────────────────────────────────────

    /// Record a selection without playing.  While streaming, re-selecting the
    /// current stream (or just its station) changes nothing; any other stream
    /// ends the current one and leaves the session stopped.
    pub async fn select(&self, station: &str, stream: Option<&str>) -> Result<StatusData, SessionError> {
        self.catalog.get_station(station)?;
        if let Some(stream) = stream {
            self.catalog.stream(station, stream)?;
        }

        let mut inner = self.gate.lock().await;
        let same_as_current = inner.station.as_deref() == Some(station)
            && (stream.is_none() || stream == inner.stream.as_deref());

        match inner.state() {
            PlayState::Stopped => {}
            _ if same_as_current => {
                drop(inner);
                return Ok(self.status().await);
            }
            state => {
                info!("Selection changed while {:?}, dropping current stream", state);
                self.release(&mut inner).await;
            }
        }

        if inner.station.as_deref() != Some(station) || stream.is_some() {
            inner.stream = stream.map(str::to_string);
        }
        inner.station = Some(station.to_string());
        debug!("Selected {:?} / {:?}", inner.station, inner.stream);
        self.publish(&inner).await;
        drop(inner);
        Ok(self.status().await)
    }

    pub async fn play(&self, station: Option<&str>, stream: Option<&str>) -> Result<StatusData, SessionError> {
        let mut inner = self.gate.lock().await;
        let target = self.resolve(&inner, station, stream)?;

        match inner.state() {
            PlayState::Playing => {
                let current = inner.stream.clone().unwrap_or_default();
                return Err(SessionError::AlreadyPlaying(current));
            }
            PlayState::Paused if inner.active.as_ref() == Some(&target) => {
                let resumed = match inner.decoder.as_mut() {
                    Some(decoder) => decoder.resume().await,
                    None => Ok(()),
                };
                if let Err(e) = resumed {
                    warn!("Resume failed: {}", e);
                    self.release(&mut inner).await;
                    self.publish(&inner).await;
                    return Err(e.into());
                }
                inner.paused = false;
                info!("Resumed {}", target.stream);
            }
            PlayState::Paused => {
                self.release(&mut inner).await;
                self.start(&mut inner, target).await?;
            }
            PlayState::Stopped => self.start(&mut inner, target).await?,
        }

        self.publish(&inner).await;
        drop(inner);
        Ok(self.status().await)
    }

    /// Pausing twice is fine; pausing with nothing streaming is not.
    pub async fn pause(&self) -> Result<StatusData, SessionError> {
        let mut inner = self.gate.lock().await;
        match inner.state() {
            PlayState::Stopped => return Err(SessionError::NoActiveStream),
            PlayState::Paused => {}
            PlayState::Playing => {
                let paused = match inner.decoder.as_mut() {
                    Some(decoder) => decoder.pause().await,
                    None => Ok(()),
                };
                if let Err(e) = paused {
                    warn!("Pause failed: {}", e);
                    self.release(&mut inner).await;
                    self.publish(&inner).await;
                    return Err(e.into());
                }
                inner.paused = true;
                info!("Paused {:?}", inner.stream);
            }
        }
        self.publish(&inner).await;
        drop(inner);
        Ok(self.status().await)
    }

    /// Always succeeds; the selection is kept.
    pub async fn stop(&self) -> StatusData {
        let mut inner = self.gate.lock().await;
        if inner.decoder.is_some() {
            self.release(&mut inner).await;
            info!("Stopped");
        }
        self.publish(&inner).await;
        drop(inner);
        self.status().await
    }

    pub async fn set_volume(&self, value: i64) -> Result<StatusData, SessionError> {
        let volume = Volume::new(value)?;
        let mut inner = self.gate.lock().await;
        inner.volume = volume;

        let state = inner.state();
        let change = match inner.decoder.as_mut() {
            Some(decoder) => Some(decoder.set_volume(volume).await),
            None => None,
        };
        if state == PlayState::Playing && change == Some(VolumeChange::RestartRequired) {
            if let Some(target) = inner.active.clone() {
                debug!("Restarting decoder for volume {}", volume);
                self.release(&mut inner).await;
                self.start(&mut inner, target).await?;
            }
        }

        info!("Volume set to {}", volume);
        self.publish(&inner).await;
        drop(inner);
        Ok(self.status().await)
    }

    /// Stop any decoder.  Called before the server exits.
    pub async fn shutdown(&self) {
        self.stop().await;
    }

    // ── liveness ──────────────────────────────────────────────────────────────

    /// Turn a decoder that died on its own into an implicit stop.
    pub(crate) async fn check_liveness(&self) {
        let mut inner = self.gate.lock().await;
        let alive = match inner.decoder.as_mut() {
            Some(decoder) => decoder.is_alive(),
            None => return,
        };
        if !alive {
            warn!("Decoder for {:?} died, stopping session", inner.stream);
            self.release(&mut inner).await;
            self.publish(&inner).await;
        }
    }

    pub fn spawn_heartbeat(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(session.config.heartbeat_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => session.check_liveness().await,
                }
            }
            debug!("Heartbeat stopped");
        })
    }

    // ── internals ─────────────────────────────────────────────────────────────

    fn resolve(
        &self,
        inner: &SessionInner,
        station: Option<&str>,
        stream: Option<&str>,
    ) -> Result<Target, SessionError> {
        let (station, stream) = match (station, stream) {
            (Some(station), Some(stream)) => (station, stream),
            (Some(station), None) => {
                self.catalog.get_station(station)?;
                match (inner.station.as_deref(), inner.stream.as_deref()) {
                    (Some(selected), Some(stream)) if selected == station => (station, stream),
                    _ => return Err(SessionError::NoActiveStream),
                }
            }
            (None, Some(stream)) => match inner.station.as_deref() {
                Some(station) => (station, stream),
                None => return Err(SessionError::NoActiveStream),
            },
            (None, None) => match (inner.station.as_deref(), inner.stream.as_deref()) {
                (Some(station), Some(stream)) => (station, stream),
                _ => return Err(SessionError::NoActiveStream),
            },
        };
        let (st, s) = self.catalog.stream(station, stream)?;
        Ok(Target {
            station: st.name.clone(),
            stream: s.name.clone(),
            url: s.url.clone(),
        })
    }

    /// Spawn a decoder for `target`.  The selection follows the target even
    /// when the spawn fails, leaving the session Stopped.
    async fn start(&self, inner: &mut SessionInner, target: Target) -> Result<(), SessionError> {
        self.metadata.send_replace(MetadataSnapshot::default());
        inner.station = Some(target.station.clone());
        inner.stream = Some(target.stream.clone());
        inner.paused = false;

        match self
            .launcher
            .start(&target.url, inner.volume, Arc::clone(&self.metadata))
            .await
        {
            Ok(decoder) => {
                info!("Playing {} / {}", target.station, target.stream);
                inner.decoder = Some(decoder);
                inner.active = Some(target);
                Ok(())
            }
            Err(e) => {
                warn!("Could not start {}: {}", target.url, e);
                inner.decoder = None;
                inner.active = None;
                self.publish(inner).await;
                Err(e.into())
            }
        }
    }

    /// Terminate the decoder (if any) and clear per-stream state.
    async fn release(&self, inner: &mut SessionInner) {
        if let Some(mut decoder) = inner.decoder.take() {
            decoder.terminate().await;
        }
        inner.active = None;
        inner.paused = false;
        self.metadata.send_replace(MetadataSnapshot::default());
    }

    async fn publish(&self, inner: &SessionInner) {
        let state = inner.state();
        *self.published.write().await = Published {
            station: inner.station.clone(),
            stream: inner.stream.clone(),
            paused: state == PlayState::Paused,
            streaming: state != PlayState::Stopped,
            volume: inner.volume,
        };
    }
}
