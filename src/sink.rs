//! Where extracted records go. The walk opens one output unit at its root
//! and appends each node's survivors to it as they are produced.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::ExtractResult;
use crate::record::CombinationRecord;

pub trait RecordSink {
    /// Starts a fresh output unit for the walk rooted at `root`.
    fn begin(&mut self, root: &str) -> ExtractResult<()>;

    /// Appends the surviving records of one node.
    fn append(&mut self, node: &str, records: &[CombinationRecord]) -> ExtractResult<()>;

    fn finish(&mut self) -> ExtractResult<()> {
        Ok(())
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub root: Option<String>,
    pub records: Vec<CombinationRecord>,
    /// Node paths in the order they were appended.
    pub nodes: Vec<String>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }
}

impl RecordSink for MemorySink {
    fn begin(&mut self, root: &str) -> ExtractResult<()> {
        self.root = Some(root.to_string());
        self.records.clear();
        self.nodes.clear();
        Ok(())
    }

    fn append(&mut self, node: &str, records: &[CombinationRecord]) -> ExtractResult<()> {
        self.nodes.push(node.to_string());
        self.records.extend_from_slice(records);
        Ok(())
    }
}

/// One JSON object per line. `begin` truncates the file.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: usize,
}

impl JsonLinesSink {
    pub fn new(path: impl AsRef<Path>) -> JsonLinesSink {
        JsonLinesSink {
            path: path.as_ref().to_path_buf(),
            writer: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }

    fn writer(&mut self) -> ExtractResult<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            ),
        };
        Ok(self.writer.insert(writer))
    }
}

impl RecordSink for JsonLinesSink {
    fn begin(&mut self, root: &str) -> ExtractResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.writer = Some(BufWriter::new(File::create(&self.path)?));
        self.written = 0;
        log::debug!("writing records for {} to {}", root, self.path.display());
        Ok(())
    }

    fn append(&mut self, node: &str, records: &[CombinationRecord]) -> ExtractResult<()> {
        let writer = self.writer()?;
        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        self.written += records.len();
        log::debug!("{}: appended {} records ({} total)", node, records.len(), self.written);
        Ok(())
    }

    fn finish(&mut self) -> ExtractResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
