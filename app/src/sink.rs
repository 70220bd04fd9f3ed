//! Media sink writing the live stream to a file or stdout.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use relaydeck_engine::MediaSink;
use relaydeck_ipc::ChannelId;

/// Writes every appended chunk to an underlying writer.
pub struct WriterSink {
    out: Mutex<Box<dyn Write + Send>>,
    written: AtomicU64,
}

impl WriterSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            written: AtomicU64::new(0),
        }
    }

    /// Sink writing to `path`, created or truncated.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Sink writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MediaSink for WriterSink {
    async fn wait_ready(&self) {}

    fn attach(&self, channel_id: &ChannelId, stream_url: &str) {
        info!(%channel_id, %stream_url, "Writing stream");
    }

    fn append(&self, chunk: Bytes) {
        if let Err(e) = self.out.lock().write_all(&chunk) {
            warn!("Failed to write media chunk: {}", e);
            return;
        }
        self.written.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    }

    fn detach(&self) {
        if let Err(e) = self.out.lock().flush() {
            warn!("Failed to flush output: {}", e);
        }
        debug!(bytes = self.written(), "Output detached");
    }
}
