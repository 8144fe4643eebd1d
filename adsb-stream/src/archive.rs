//! JSON-lines archive of accepted messages.
//!
//! The pipeline thread hands records to a channel; a writer thread appends
//! them to the file so disk latency never stalls decoding.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use adsb_core::{AdsbError, ArchiveRecord, RecordSink, Result};

pub struct JsonLinesArchive {
    tx: Option<Sender<ArchiveRecord>>,
    writer: Option<JoinHandle<()>>,
}

impl JsonLinesArchive {
    /// Open `path` for appending (created if missing) and start the writer.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (tx, rx) = mpsc::channel();

        let writer = thread::Builder::new()
            .name("adsb-archive".to_string())
            .spawn(move || write_loop(file, rx))?;

        debug!(path = %path.display(), "archive opened");
        Ok(JsonLinesArchive {
            tx: Some(tx),
            writer: Some(writer),
        })
    }
}

fn write_loop(file: File, rx: Receiver<ArchiveRecord>) {
    let mut out = BufWriter::new(file);
    while let Ok(first) = rx.recv() {
        // Write whatever is queued, then flush once.
        for record in std::iter::once(first).chain(rx.try_iter()) {
            if let Err(e) = write_record(&mut out, &record) {
                warn!(error = %e, "archive write failed");
            }
        }
        if let Err(e) = out.flush() {
            warn!(error = %e, "archive flush failed");
        }
    }
}

fn write_record<W: Write>(out: &mut W, record: &ArchiveRecord) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}

impl RecordSink for JsonLinesArchive {
    fn record(&mut self, record: &ArchiveRecord) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| AdsbError::Io(io::Error::new(ErrorKind::BrokenPipe, "archive closed")))?;
        tx.send(record.clone()).map_err(|_| {
            AdsbError::Io(io::Error::new(ErrorKind::BrokenPipe, "archive writer stopped"))
        })
    }
}

impl Drop for JsonLinesArchive {
    fn drop(&mut self) {
        // Closing the channel ends the writer after it drains.
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                warn!("archive writer panicked");
            }
        }
    }
}

/// Read archived records with `start <= timestamp <= end`.
/// Malformed lines are skipped.
pub fn read_records(path: &Path, start: Option<u64>, end: Option<u64>) -> Result<Vec<ArchiveRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ArchiveRecord = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed archive line");
                continue;
            }
        };
        if start.is_some_and(|s| record.timestamp < s) || end.is_some_and(|e| record.timestamp > e) {
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
