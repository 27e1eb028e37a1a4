//! Event sources and the bounded chunk reader.
//!
//! RULE: A source can be opened any number of times.
//! Each pass opens its own reader and walks the whole log once.
//! A row that breaks the table structure aborts the job; a row whose
//! fields are merely unusable is left for the parser to drop.

use crate::{
    error::{MetricsError, MetricsResult},
    event::{parse_timestamp, RawEventRow},
};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const COL_TIMESTAMP:  &str = "event_timestamp";
pub const COL_EVENT_TYPE: &str = "event_type";
pub const COL_EVENT_DATA: &str = "event_data";

/// Anything the pipeline can read an event log from.
pub trait EventSource {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> String;

    /// Open a fresh reader positioned at the header row.
    fn open(&self) -> MetricsResult<Box<dyn Read + '_>>;
}

/// An event log CSV on disk.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    /// Fails immediately when the file does not exist.
    pub fn new(path: impl AsRef<Path>) -> MetricsResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(MetricsError::MissingInput {
                path: path.display().to_string(),
            });
        }
        Ok(Self { path })
    }
}

impl EventSource for CsvFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn open(&self) -> MetricsResult<Box<dyn Read + '_>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// An event log held in memory (tests, generated logs).
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    csv:  String,
}

impl InMemorySource {
    pub fn new(name: &str, csv: impl Into<String>) -> Self {
        Self { name: name.to_string(), csv: csv.into() }
    }
}

impl EventSource for InMemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn open(&self) -> MetricsResult<Box<dyn Read + '_>> {
        Ok(Box::new(self.csv.as_bytes()))
    }
}

/// Reads an event log `chunk_size` rows at a time.
pub struct ChunkReader<'a> {
    reader:      csv::Reader<Box<dyn Read + 'a>>,
    record:      StringRecord,
    chunk_size:  usize,
    chunk_index: u64,
    idx_ts:      usize,
    idx_type:    usize,
    idx_data:    usize,
    done:        bool,
}

impl<'a> ChunkReader<'a> {
    /// Open `source` and resolve the required columns from its header.
    pub fn open(source: &'a dyn EventSource, chunk_size: usize) -> MetricsResult<Self> {
        if chunk_size == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "chunk_size must be at least 1".into(),
            });
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source.open()?);
        let headers = reader.headers()?.clone();
        let column = |name: &str| -> MetricsResult<usize> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| MetricsError::MissingColumn {
                    column:      name.to_string(),
                    source_name: source.name(),
                })
        };

        Ok(Self {
            idx_ts:      column(COL_TIMESTAMP)?,
            idx_type:    column(COL_EVENT_TYPE)?,
            idx_data:    column(COL_EVENT_DATA)?,
            reader,
            record:      StringRecord::new(),
            chunk_size,
            chunk_index: 0,
            done:        false,
        })
    }

    /// Read the next chunk. Returns Ok(None) once the log is exhausted.
    pub fn next_chunk(&mut self) -> MetricsResult<Option<Vec<RawEventRow>>> {
        if self.done {
            return Ok(None);
        }
        let mut rows = Vec::with_capacity(self.chunk_size);
        while rows.len() < self.chunk_size {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|source| MetricsError::ChunkRead {
                    chunk: self.chunk_index,
                    source,
                })?;
            if !more {
                self.done = true;
                break;
            }
            rows.push(RawEventRow {
                event_timestamp: self.record.get(self.idx_ts).and_then(parse_timestamp),
                event_type:      self.record.get(self.idx_type).unwrap_or_default().to_string(),
                event_data:      self.record.get(self.idx_data).unwrap_or_default().to_string(),
            });
        }
        if rows.is_empty() {
            return Ok(None);
        }
        self.chunk_index += 1;
        Ok(Some(rows))
    }

    /// Chunks handed out so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunk_index
    }
}

impl Iterator for ChunkReader<'_> {
    type Item = MetricsResult<Vec<RawEventRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(rows)) => Some(Ok(rows)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
