//! TCP connection to the upstream frame feed, and the thread that decodes it.
//!
//! Reads block on the socket, so the pipeline gets its own OS thread. Closing
//! the feed marks it as closing and shuts the socket down from outside. The
//! blocked read then ends with EOF or, when unread bytes were still queued, a
//! reset; after a close both read as end of stream, so `Pipeline::run` ends
//! cleanly either way.

use std::io::{self, BufReader, ErrorKind, Read};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use adsb_core::config::SourceConfig;
use adsb_core::{AdsbError, Clock, Pipeline, PipelineStats, Result, StateStore};

/// Connect to the feed, trying each resolved address in turn.
pub fn connect(source: &SourceConfig) -> Result<TcpStream> {
    let timeout = Duration::from_secs_f64(source.timeout_secs);
    let mut last_err = None;

    for addr in (source.host.as_str(), source.port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                info!(%addr, "connected to feed");
                return Ok(stream);
            }
            Err(e) => {
                debug!(%addr, error = %e, "connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(AdsbError::Io(last_err.unwrap_or_else(|| {
        io::Error::new(
            ErrorKind::AddrNotAvailable,
            format!("{} resolved to no addresses", source.address()),
        )
    })))
}

/// Shuts the feed socket down. Cheap to clone; safe to call more than once.
#[derive(Debug, Clone)]
pub struct FeedCloser {
    stream: Arc<TcpStream>,
    closing: Arc<AtomicBool>,
}

impl FeedCloser {
    pub fn close(&self) {
        // Set before the shutdown so the reader sees it when its read fails.
        self.closing.store(true, Ordering::SeqCst);
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            // Already closed by the peer
            debug!(error = %e, "feed shutdown");
        }
    }
}

/// Socket reader that turns any read error after a local close into EOF.
struct ClosableReader {
    stream: TcpStream,
    closing: Arc<AtomicBool>,
}

impl Read for ClosableReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            Err(e) if self.closing.load(Ordering::SeqCst) => {
                debug!(error = %e, "read ended by close");
                Ok(0)
            }
            other => other,
        }
    }
}

/// A running pipeline thread.
#[derive(Debug)]
pub struct FeedHandle {
    closer: FeedCloser,
    store: StateStore,
    thread: JoinHandle<Result<PipelineStats>>,
}

/// Run `pipeline` over `stream` on a dedicated thread.
pub fn spawn(stream: TcpStream, mut pipeline: Pipeline, clock: Arc<dyn Clock>) -> Result<FeedHandle> {
    let closer = FeedCloser {
        stream: Arc::new(stream.try_clone()?),
        closing: Arc::new(AtomicBool::new(false)),
    };
    let store = pipeline.store().clone();
    let source = ClosableReader {
        stream,
        closing: Arc::clone(&closer.closing),
    };

    let thread = thread::Builder::new()
        .name("adsb-pipeline".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(source);
            pipeline.run(&mut reader, clock.as_ref())
        })?;

    Ok(FeedHandle {
        closer,
        store,
        thread,
    })
}

impl FeedHandle {
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Handle that shuts the socket down; the pipeline thread finishes on its next read.
    pub fn closer(&self) -> FeedCloser {
        self.closer.clone()
    }

    /// Wait for the pipeline thread and return its final counters.
    pub fn join(self) -> Result<PipelineStats> {
        self.thread.join().map_err(|_| {
            AdsbError::Io(io::Error::new(ErrorKind::Other, "pipeline thread panicked"))
        })?
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
