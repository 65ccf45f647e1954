//! Buffered file log sink
//!
//! The tracing writer only appends formatted lines to an in-memory queue.
//! A background task drains the queue into `<folder>/<prefix>_latest.log`
//! once per second, and the daemon flushes one last time before exiting.
//!
//! Opening the sink rotates a previous `<prefix>_latest.log` to
//! `<prefix>_<local timestamp>.log`, so each run starts a fresh file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

/// File name prefix of the daemon's log files
pub const LOG_FILE_PREFIX: &str = "dnsmon";

/// How often queued log lines are written out
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// In-memory log queue backed by a file
#[derive(Clone)]
pub struct BufferedLogSink {
    queue: Arc<Mutex<Vec<u8>>>,
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl BufferedLogSink {
    /// Rotate any previous log in `folder` and create a fresh one
    pub fn open(folder: &Path, prefix: &str) -> io::Result<Self> {
        let path = folder.join(format!("{prefix}_latest.log"));

        if path.exists() {
            let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S-%f");
            fs::rename(&path, folder.join(format!("{prefix}_{stamp}.log")))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        Ok(Self {
            queue: Arc::new(Mutex::new(Vec::new())),
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every queued line to the file
    pub fn flush(&self) -> io::Result<()> {
        let pending = std::mem::take(&mut *lock(&self.queue));
        if pending.is_empty() {
            return Ok(());
        }

        let mut file = lock(&self.file);
        file.write_all(&pending)?;
        file.flush()
    }

    /// Flush every [`FLUSH_INTERVAL`] until `cancel` fires
    ///
    /// Lines queued after the last tick are left for the caller's final
    /// [`flush`](Self::flush).
    pub async fn run_flusher(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Err(e) = self.flush() {
                eprintln!("Failed to write log file {}: {}", self.path.display(), e);
            }
        }
    }
}

impl<'a> MakeWriter<'a> for BufferedLogSink {
    type Writer = QueueWriter;

    fn make_writer(&'a self) -> Self::Writer {
        QueueWriter {
            queue: Arc::clone(&self.queue),
        }
    }
}

/// Writer handed to the fmt layer for each event
pub struct QueueWriter {
    queue: Arc<Mutex<Vec<u8>>>,
}

impl Write for QueueWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.queue).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_open_creates_latest_file() {
        let dir = TempDir::new().unwrap();
        let sink = BufferedLogSink::open(dir.path(), LOG_FILE_PREFIX).unwrap();

        assert_eq!(sink.path(), dir.path().join("dnsmon_latest.log"));
        assert_eq!(log_files(dir.path()), vec!["dnsmon_latest.log"]);
    }

    #[test]
    fn test_previous_log_is_rotated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dnsmon_latest.log"), "previous run\n").unwrap();

        let sink = BufferedLogSink::open(dir.path(), LOG_FILE_PREFIX).unwrap();

        let files = log_files(dir.path());
        assert_eq!(files.len(), 2);
        let rotated = files
            .iter()
            .find(|name| *name != "dnsmon_latest.log")
            .unwrap();
        assert!(rotated.starts_with("dnsmon_20"), "unexpected name {rotated}");
        assert_eq!(
            fs::read_to_string(dir.path().join(rotated)).unwrap(),
            "previous run\n"
        );
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "");
    }

    #[test]
    fn test_lines_are_queued_until_flush() {
        let dir = TempDir::new().unwrap();
        let sink = BufferedLogSink::open(dir.path(), LOG_FILE_PREFIX).unwrap();

        sink.make_writer().write_all(b"first line\n").unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "");

        sink.flush().unwrap();
        sink.make_writer().write_all(b"second line\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(
            fs::read_to_string(sink.path()).unwrap(),
            "first line\nsecond line\n"
        );
    }

    #[test]
    fn test_open_fails_for_missing_folder() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        assert!(BufferedLogSink::open(&missing, LOG_FILE_PREFIX).is_err());
    }

    #[test]
    fn test_tracing_events_reach_the_file() {
        let dir = TempDir::new().unwrap();
        let sink = BufferedLogSink::open(dir.path(), LOG_FILE_PREFIX).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(host = "www.example.com", "Host record is current");
        });
        sink.flush().unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        assert!(contents.contains("Host record is current"), "{contents}");
        assert!(contents.contains("host=\"www.example.com\""), "{contents}");
    }

    #[tokio::test]
    async fn test_flusher_writes_periodically() {
        let dir = TempDir::new().unwrap();
        let sink = BufferedLogSink::open(dir.path(), LOG_FILE_PREFIX).unwrap();
        let cancel = CancellationToken::new();
        let flusher = tokio::spawn(sink.clone().run_flusher(cancel.clone()));

        sink.make_writer().write_all(b"queued\n").unwrap();
        tokio::time::sleep(FLUSH_INTERVAL + Duration::from_millis(500)).await;

        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "queued\n");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), flusher)
            .await
            .expect("flusher stops on cancellation")
            .unwrap();
    }
}
