//! Per-batch debug output.
//!
//! Writes one JSON object per batch to a file (JSON Lines). Enabled on a
//! component's src-side probe; not registrable as a client handler.

use crate::batch::Batch;
use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct DumpRecord<'a> {
    probe: &'a str,
    #[serde(flatten)]
    batch: &'a Batch,
}

/// JSON Lines writer for batches crossing a probe.
#[derive(Debug)]
pub struct BatchDump {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl BatchDump {
    /// Create (or truncate) the dump file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one record for `batch`.
    pub fn write(&mut self, probe: &str, batch: &Batch) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &DumpRecord { probe, batch })?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Path of the dump file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.written
    }
}
