//! Deterministic in-process decoder for tests.

use async_trait::async_trait;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{DecoderError, DecoderHandle, DecoderLauncher, VolumeChange};
use crate::metadata::{spawn_reader, MetadataSnapshot};
use tty_radio_proto::volume::Volume;

#[derive(Debug, Clone, PartialEq)]
pub struct FakeProcess {
    pub url: String,
    pub volume: Volume,
    pub alive: bool,
    pub paused: bool,
}

#[derive(Default)]
struct LauncherState {
    processes: Vec<Arc<Mutex<FakeProcess>>>,
    fail_next: bool,
    fail_pause: bool,
    panicking_reader: bool,
    metadata: Option<(MetadataSnapshot, Duration)>,
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    state: Arc<Mutex<LauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every started process reports `snapshot` after `delay`.
    pub fn with_metadata(self, snapshot: MetadataSnapshot, delay: Duration) -> Self {
        self.state.lock().unwrap().metadata = Some((snapshot, delay));
        self
    }

    /// Every started process feeds a metadata reader whose output panics.
    pub fn with_panicking_reader(self) -> Self {
        self.state.lock().unwrap().panicking_reader = true;
        self
    }

    pub fn fail_next_start(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    pub fn fail_next_pause(&self) {
        self.state.lock().unwrap().fail_pause = true;
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().processes.len()
    }

    pub fn alive_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .processes
            .iter()
            .filter(|p| p.lock().unwrap().alive)
            .count()
    }

    pub fn last(&self) -> Option<FakeProcess> {
        let state = self.state.lock().unwrap();
        state.processes.last().map(|p| p.lock().unwrap().clone())
    }

    /// Simulate the most recent process dying on its own.
    pub fn crash_last(&self) {
        if let Some(p) = self.state.lock().unwrap().processes.last() {
            p.lock().unwrap().alive = false;
        }
    }
}

#[async_trait]
impl DecoderLauncher for FakeLauncher {
    async fn start(
        &self,
        url: &str,
        volume: Volume,
        metadata: Arc<watch::Sender<MetadataSnapshot>>,
    ) -> Result<Box<dyn DecoderHandle>, DecoderError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next) {
            return Err(DecoderError::BinaryNotFound("fake".to_string()));
        }
        let process = Arc::new(Mutex::new(FakeProcess {
            url: url.to_string(),
            volume,
            alive: true,
            paused: false,
        }));
        state.processes.push(Arc::clone(&process));

        let reader = if state.panicking_reader {
            Some(spawn_reader(PanickingOutput, metadata))
        } else {
            state.metadata.clone().map(|(snapshot, delay)| {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    metadata.send_replace(snapshot);
                })
            })
        };
        Ok(Box::new(FakeHandle {
            process,
            launcher: Arc::clone(&self.state),
            reader,
        }))
    }
}

pub struct FakeHandle {
    process: Arc<Mutex<FakeProcess>>,
    launcher: Arc<Mutex<LauncherState>>,
    /// Delivers the scripted metadata; dies with the process.
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl DecoderHandle for FakeHandle {
    fn is_alive(&mut self) -> bool {
        self.process.lock().unwrap().alive
    }

    async fn pause(&mut self) -> Result<(), DecoderError> {
        if std::mem::take(&mut self.launcher.lock().unwrap().fail_pause) {
            return Err(DecoderError::Signal("fake pause failure".to_string()));
        }
        self.process.lock().unwrap().paused = true;
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), DecoderError> {
        self.process.lock().unwrap().paused = false;
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> VolumeChange {
        self.process.lock().unwrap().volume = volume;
        VolumeChange::RestartRequired
    }

    async fn terminate(&mut self) {
        self.process.lock().unwrap().alive = false;
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
    }

    fn volume(&self) -> Volume {
        self.process.lock().unwrap().volume
    }
}

/// Decoder output whose first read panics.
pub struct PanickingOutput;

impl AsyncRead for PanickingOutput {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        panic!("decoder output exploded");
    }
}
