//! mpg123 subprocess driver.
//!
//! The decoder is started as `mpg123 [extra args] -f <scale> -@ <url>` with
//! stdout discarded and stderr piped into the metadata reader.  mpg123 cannot
//! change its output scale at runtime, so every volume change needs a
//! restart.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{DecoderError, DecoderHandle, DecoderLauncher, VolumeChange};
use crate::metadata::{self, MetadataSnapshot};
use tty_radio_proto::config::{DecoderConfig, PauseStrategy};
use tty_radio_proto::platform;
use tty_radio_proto::volume::Volume;

#[derive(Debug, Clone)]
pub struct Mpg123Launcher {
    binary: String,
    extra_args: Vec<String>,
    pause_strategy: PauseStrategy,
    terminate_grace: Duration,
}

impl Mpg123Launcher {
    pub fn new(config: &DecoderConfig) -> Self {
        let mut pause_strategy = config.pause_strategy;
        if cfg!(not(unix)) && pause_strategy == PauseStrategy::Signal {
            warn!("Signal pause strategy needs unix signals, falling back to respawn");
            pause_strategy = PauseStrategy::Respawn;
        }
        Self {
            binary: config.binary.clone(),
            extra_args: config.extra_args.clone(),
            pause_strategy,
            terminate_grace: config.terminate_grace(),
        }
    }

    fn resolve_binary(&self) -> Result<PathBuf, DecoderError> {
        platform::find_decoder_binary(&self.binary)
            .ok_or_else(|| DecoderError::BinaryNotFound(self.binary.clone()))
    }

    fn spawn(
        &self,
        url: &str,
        volume: Volume,
        sink: &Arc<watch::Sender<MetadataSnapshot>>,
    ) -> Result<Running, DecoderError> {
        let binary = self.resolve_binary()?;
        let mut child = Command::new(&binary)
            .args(&self.extra_args)
            .arg("-f")
            .arg(volume.get().to_string())
            .arg("-@")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let reader = match child.stderr.take() {
            Some(stderr) => Some(metadata::spawn_reader(stderr, Arc::clone(sink))),
            None => None,
        };
        info!(
            "Started {} (pid {:?}) for {} at volume {}",
            binary.display(),
            child.id(),
            url,
            volume
        );
        Ok(Running {
            child,
            reader,
            volume,
            suspended: false,
        })
    }
}

#[async_trait]
impl DecoderLauncher for Mpg123Launcher {
    async fn start(
        &self,
        url: &str,
        volume: Volume,
        metadata: Arc<watch::Sender<MetadataSnapshot>>,
    ) -> Result<Box<dyn DecoderHandle>, DecoderError> {
        let running = self.spawn(url, volume, &metadata)?;
        Ok(Box::new(Mpg123Handle {
            launcher: self.clone(),
            url: url.to_string(),
            volume,
            metadata,
            process: Some(running),
            paused: false,
        }))
    }
}

/// A live mpg123 child plus the task draining its stderr.
struct Running {
    child: Child,
    reader: Option<JoinHandle<()>>,
    /// Scale factor the process was started with.
    volume: Volume,
    /// Stopped with SIGSTOP.
    suspended: bool,
}

impl Running {
    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if let Some(code) = status.code() {
                    warn!("Decoder exited with code: {}", code);
                } else {
                    warn!("Decoder terminated by signal");
                }
                false
            }
            Err(e) => {
                warn!("Decoder liveness check failed: {}", e);
                false
            }
        }
    }

    #[cfg(unix)]
    fn signal(&self, sig: nix::sys::signal::Signal) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            return false;
        };
        match kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {} to decoder {}: {}", sig, pid, e);
                false
            }
        }
    }

    fn suspend(&mut self) -> Result<(), DecoderError> {
        #[cfg(unix)]
        {
            if !self.signal(nix::sys::signal::Signal::SIGSTOP) {
                return Err(DecoderError::Signal("SIGSTOP was not delivered".to_string()));
            }
            self.suspended = true;
        }
        Ok(())
    }

    fn cont(&mut self) {
        #[cfg(unix)]
        {
            self.signal(nix::sys::signal::Signal::SIGCONT);
        }
        self.suspended = false;
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL.  Always reaps the child and
    /// the reader task.
    async fn shutdown(mut self, grace: Duration) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;
            if self.suspended {
                self.signal(Signal::SIGCONT);
            }
            self.signal(Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Decoder exited: {}", status),
            Ok(Err(e)) => warn!("Waiting for decoder failed: {}", e),
            Err(_) => {
                warn!("Decoder ignored SIGTERM for {:?}, killing", grace);
                if let Err(e) = self.child.kill().await {
                    error!("Failed to kill decoder: {}", e);
                }
            }
        }

        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }
    }
}

pub struct Mpg123Handle {
    launcher: Mpg123Launcher,
    url: String,
    volume: Volume,
    metadata: Arc<watch::Sender<MetadataSnapshot>>,
    /// `None` after terminate, or while paused with the respawn strategy.
    process: Option<Running>,
    paused: bool,
}

impl Mpg123Handle {
    async fn respawn(&mut self) -> Result<(), DecoderError> {
        if let Some(old) = self.process.take() {
            old.shutdown(self.launcher.terminate_grace).await;
        }
        let running = self.launcher.spawn(&self.url, self.volume, &self.metadata)?;
        self.process = Some(running);
        Ok(())
    }
}

#[async_trait]
impl DecoderHandle for Mpg123Handle {
    fn is_alive(&mut self) -> bool {
        match self.process.as_mut() {
            Some(running) => running.is_alive(),
            None => self.paused,
        }
    }

    async fn pause(&mut self) -> Result<(), DecoderError> {
        if self.paused {
            return Ok(());
        }
        match self.launcher.pause_strategy {
            PauseStrategy::Respawn => {
                if let Some(running) = self.process.take() {
                    running.shutdown(self.launcher.terminate_grace).await;
                }
            }
            PauseStrategy::Signal => {
                if let Some(running) = self.process.as_mut() {
                    running.suspend()?;
                }
            }
        }
        self.paused = true;
        debug!("Decoder paused ({:?})", self.launcher.pause_strategy);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), DecoderError> {
        if !self.paused {
            return Ok(());
        }
        let volume = self.volume;
        let can_continue = self
            .process
            .as_ref()
            .is_some_and(|r| r.suspended && r.volume == volume);

        if can_continue {
            if let Some(running) = self.process.as_mut() {
                running.cont();
            }
        } else {
            self.respawn().await?;
        }
        self.paused = false;
        debug!("Decoder resumed");
        Ok(())
    }

    async fn set_volume(&mut self, volume: Volume) -> VolumeChange {
        self.volume = volume;
        VolumeChange::RestartRequired
    }

    async fn terminate(&mut self) {
        self.paused = false;
        if let Some(running) = self.process.take() {
            running.shutdown(self.launcher.terminate_grace).await;
            info!("Decoder for {} terminated", self.url);
        }
    }

    fn volume(&self) -> Volume {
        self.volume
    }
}
