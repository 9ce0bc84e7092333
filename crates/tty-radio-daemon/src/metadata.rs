//! Decoder output parsing.
//!
//! mpg123 reports ICY metadata on stderr, one item per line:
//!
//! ```text
//! ICY-NAME: BAGeL Radio
//! ICY-META: StreamTitle='Artist - Title';StreamUrl='';
//! ```
//!
//! The reader task folds those lines into a [`MetadataSnapshot`] published
//! through a `watch` channel owned by the session.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// Last-seen metadata for the current stream.  `None` means nothing was
/// reported yet, `Some("")` means the stream reported an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub stream_name: Option<String>,
    pub song: Option<String>,
}

impl MetadataSnapshot {
    pub fn is_empty(&self) -> bool {
        self.stream_name.is_none() && self.song.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLine {
    StreamName(String),
    Song(String),
}

pub fn parse_line(line: &str) -> Option<MetadataLine> {
    let line = line.trim();
    if let Some(name) = line.strip_prefix("ICY-NAME:") {
        return Some(MetadataLine::StreamName(name.trim().to_string()));
    }
    let meta = line.strip_prefix("ICY-META:")?;
    let start = meta.find("StreamTitle='")? + "StreamTitle='".len();
    let rest = &meta[start..];
    let title = match rest.find("';") {
        Some(end) => &rest[..end],
        None => rest.trim_end_matches(';').trim_end_matches('\''),
    };
    Some(MetadataLine::Song(title.trim().to_string()))
}

/// Drain `output` line by line until EOF, updating `sink`.  The returned task
/// is aborted and awaited by whoever owns the decoder process; aborting it
/// also aborts the read loop.  A panic in the read loop is logged when it
/// happens and ends the reader without taking the decoder down.
pub fn spawn_reader<R>(output: R, sink: Arc<watch::Sender<MetadataSnapshot>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let read_loop = AbortOnDrop(tokio::spawn(read_lines(output, sink)));
    tokio::spawn(async move {
        let mut read_loop = read_loop;
        match (&mut read_loop.0).await {
            Ok(()) => {}
            Err(e) if e.is_panic() => error!("Metadata reader panicked: {}", e),
            Err(e) => debug!("Metadata reader cancelled: {}", e),
        }
    })
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn read_lines<R>(output: R, sink: Arc<watch::Sender<MetadataSnapshot>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                match parse_line(line) {
                    Some(MetadataLine::StreamName(name)) => {
                        debug!("ICY name: {}", name);
                        sink.send_modify(|s| s.stream_name = Some(name));
                    }
                    Some(MetadataLine::Song(song)) => {
                        debug!("ICY title: {}", song);
                        sink.send_modify(|s| s.song = Some(song));
                    }
                    None => trace!("decoder: {}", line),
                }
            }
            Err(e) => {
                warn!("Decoder output read failed: {}", e);
                break;
            }
        }
    }
    debug!("Metadata reader reached end of decoder output");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::fake::PanickingOutput;
    use std::io::Cursor;

    #[test]
    fn test_parse_icy_lines() {
        assert_eq!(
            parse_line("ICY-NAME: BAGeL Radio"),
            Some(MetadataLine::StreamName("BAGeL Radio".into()))
        );
        assert_eq!(
            parse_line("ICY-META: StreamTitle='Low - Words';StreamUrl='';"),
            Some(MetadataLine::Song("Low - Words".into()))
        );
        assert_eq!(
            parse_line("ICY-META: StreamTitle='It's Alright';"),
            Some(MetadataLine::Song("It's Alright".into()))
        );
        assert_eq!(
            parse_line("ICY-META: StreamTitle='';"),
            Some(MetadataLine::Song("".into()))
        );
        assert_eq!(parse_line("ICY-META: StreamUrl='x';"), None);
        assert_eq!(parse_line("Playing MPEG stream 1 of 1: 2606_128.mp3 ..."), None);
    }

    #[tokio::test]
    async fn test_reader_updates_snapshot() {
        let (tx, mut rx) = watch::channel(MetadataSnapshot::default());
        let output = Cursor::new(
            b"High Performance MPEG 1.0/2.0/2.5 Audio Player\n\
              ICY-NAME: WCPE\r\n\
              \xff\xfe garbage\n\
              ICY-META: StreamTitle='Bach - Toccata';\n"
                .to_vec(),
        );

        spawn_reader(output, Arc::new(tx)).await.unwrap();

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.stream_name.as_deref(), Some("WCPE"));
        assert_eq!(snapshot.song.as_deref(), Some("Bach - Toccata"));
    }

    #[tokio::test]
    async fn test_reader_without_metadata_keeps_none() {
        let (tx, rx) = watch::channel(MetadataSnapshot::default());
        spawn_reader(Cursor::new(b"no icy here\n".to_vec()), Arc::new(tx))
            .await
            .unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_reader_panic_ends_task() {
        let (tx, rx) = watch::channel(MetadataSnapshot::default());
        let reader = spawn_reader(PanickingOutput, Arc::new(tx));

        tokio::time::timeout(std::time::Duration::from_secs(2), reader)
            .await
            .unwrap()
            .unwrap();
        assert!(rx.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_abort_stops_read_loop() {
        let (tx, rx) = watch::channel(MetadataSnapshot::default());
        let (mut writer, output) = tokio::io::duplex(64);
        let reader = spawn_reader(output, Arc::new(tx));

        reader.abort();
        assert!(reader.await.unwrap_err().is_cancelled());

        use tokio::io::AsyncWriteExt;
        tokio::task::yield_now().await;
        let _ = writer.write_all(b"ICY-NAME: Too Late\n").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.borrow().is_empty());
    }
}
