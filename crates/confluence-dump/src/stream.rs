//! Record stream dump files: resumable aggregation progress.
//!
//! Layout: preamble (`CWRD` + version), header (period, timestep, one
//! entry per registered record with its methods), then append-only
//! frames. Each frame is the dump timestamp, the window-start
//! timestamp, the contribution counter, and every accumulator's raw
//! running state.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use confluence_core::DumpError;
use confluence_records::{
    AccumulatorState, AggregationMethod, RecordSource, RecordStream, StreamSnapshot,
};

use crate::codec::{
    read_f64_run, read_frame_timestamp, read_i64_le, read_length_prefixed_str, read_preamble,
    read_timestamp, read_u32_le, read_u64_le, read_u8, write_f64_run, write_i64_le,
    write_length_prefixed_str, write_preamble, write_timestamp, write_u32_le, write_u64_le,
    write_u8,
};
use crate::STREAM_MAGIC;

// ── Header ──────────────────────────────────────────────────────

/// One registered record as recorded in a dump or output header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    /// Record name.
    pub name: String,
    /// Record units.
    pub units: String,
    /// Which of the component's value families the record reads.
    pub source: RecordSource,
    /// Values per instantaneous sample.
    pub len: u64,
    /// Aggregation methods, in registration order.
    pub methods: Vec<AggregationMethod>,
}

impl RecordEntry {
    pub(crate) fn encode(&self, w: &mut dyn Write) -> Result<(), DumpError> {
        write_length_prefixed_str(w, &self.name)?;
        write_length_prefixed_str(w, &self.units)?;
        write_u8(w, self.source.code())?;
        write_u64_le(w, self.len)?;
        write_u32_le(w, self.methods.len() as u32)?;
        for &method in &self.methods {
            write_u8(w, method.code())?;
        }
        Ok(())
    }

    pub(crate) fn decode(r: &mut dyn Read) -> Result<Self, DumpError> {
        let name = read_length_prefixed_str(r)?;
        let units = read_length_prefixed_str(r)?;
        let code = read_u8(r)?;
        let source = RecordSource::from_code(code).ok_or(DumpError::MalformedFile {
            detail: format!("unknown record source code {code}"),
        })?;
        let len = read_u64_le(r)?;
        let count = read_u32_le(r)? as usize;
        let mut methods = Vec::with_capacity(count);
        for _ in 0..count {
            let code = read_u8(r)?;
            methods.push(AggregationMethod::from_code(code).ok_or(
                DumpError::MalformedFile {
                    detail: format!("unknown aggregation method code {code}"),
                },
            )?);
        }
        Ok(Self {
            name,
            units,
            source,
            len,
            methods,
        })
    }
}

/// Collect one header entry per record registered with a stream.
pub fn record_entries(stream: &RecordStream) -> Vec<RecordEntry> {
    stream
        .records()
        .map(|registered| RecordEntry {
            name: registered.record.name.clone(),
            units: registered.record.units.clone(),
            source: registered.record.source,
            len: registered.len as u64,
            methods: registered.methods(),
        })
        .collect()
}

/// The configuration a stream dump was written against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamDumpHeader {
    /// Aggregation period in seconds.
    pub period_seconds: i64,
    /// Owning component timestep in seconds.
    pub timestep_seconds: i64,
    /// One entry per registered record, in registration order.
    pub records: Vec<RecordEntry>,
}

impl StreamDumpHeader {
    /// Build the header for a stream's registration.
    pub fn from_stream(stream: &RecordStream) -> Self {
        Self {
            period_seconds: stream.period().num_seconds(),
            timestep_seconds: stream.timestep().num_seconds(),
            records: record_entries(stream),
        }
    }

    /// Check a stored header against the current configuration.
    pub fn check_matches(&self, expected: &StreamDumpHeader) -> Result<(), DumpError> {
        if self.period_seconds != expected.period_seconds {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "dump written for a {}s period, configuration requires {}s",
                    self.period_seconds, expected.period_seconds
                ),
            });
        }
        if self.timestep_seconds != expected.timestep_seconds {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "dump written for a {}s timestep, configuration requires {}s",
                    self.timestep_seconds, expected.timestep_seconds
                ),
            });
        }
        if self.records != expected.records {
            return Err(DumpError::Incompatible {
                reason: "dump records do not match the stream's registration".into(),
            });
        }
        Ok(())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<(), DumpError> {
        write_i64_le(w, self.period_seconds)?;
        write_i64_le(w, self.timestep_seconds)?;
        write_u32_le(w, self.records.len() as u32)?;
        for entry in &self.records {
            entry.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut dyn Read) -> Result<Self, DumpError> {
        let period_seconds = read_i64_le(r)?;
        let timestep_seconds = read_i64_le(r)?;
        let count = read_u32_le(r)? as usize;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(RecordEntry::decode(r)?);
        }
        Ok(Self {
            period_seconds,
            timestep_seconds,
            records,
        })
    }
}

// ── Frames ──────────────────────────────────────────────────────

/// One dumped snapshot of a stream's progress.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamFrame {
    /// Instant the dump was taken.
    pub timestamp: DateTime<Utc>,
    /// The resumable progress at that instant.
    pub snapshot: StreamSnapshot,
}

fn encode_frame(
    w: &mut dyn Write,
    header: &StreamDumpHeader,
    timestamp: DateTime<Utc>,
    snapshot: &StreamSnapshot,
) -> Result<(), DumpError> {
    let expected: usize = header.records.iter().map(|r| r.methods.len()).sum();
    if snapshot.accumulators.len() != expected {
        return Err(DumpError::Incompatible {
            reason: format!(
                "snapshot carries {} accumulators, header declares {expected}",
                snapshot.accumulators.len(),
            ),
        });
    }
    write_timestamp(w, timestamp)?;
    write_timestamp(w, snapshot.window_start)?;
    write_u64_le(w, snapshot.trigger_tracker)?;
    let mut states = snapshot.accumulators.iter();
    for entry in &header.records {
        for &method in &entry.methods {
            let state = states.next().expect("count checked above");
            if state.record != entry.name
                || state.method != method
                || state.values.len() as u64 != entry.len
            {
                return Err(DumpError::Incompatible {
                    reason: format!(
                        "snapshot accumulator ({}, {}) does not match the header",
                        state.record, state.method
                    ),
                });
            }
            write_u64_le(w, state.count)?;
            write_f64_run(w, &state.values)?;
        }
    }
    Ok(())
}

fn decode_frame(
    r: &mut dyn Read,
    header: &StreamDumpHeader,
) -> Result<Option<StreamFrame>, DumpError> {
    let Some(timestamp) = read_frame_timestamp(r)? else {
        return Ok(None);
    };
    let window_start = read_timestamp(r)?;
    let trigger_tracker = read_u64_le(r)?;
    let mut accumulators = Vec::new();
    for entry in &header.records {
        for &method in &entry.methods {
            let count = read_u64_le(r)?;
            let values = read_f64_run(r, entry.len as usize)?;
            accumulators.push(AccumulatorState {
                record: entry.name.clone(),
                method,
                count,
                values,
            });
        }
    }
    Ok(Some(StreamFrame {
        timestamp,
        snapshot: StreamSnapshot {
            window_start,
            trigger_tracker,
            accumulators,
        },
    }))
}

// ── Writer / reader over byte streams ───────────────────────────

/// Writes a stream dump to any byte sink, header first.
pub struct StreamDumpWriter<W: Write> {
    writer: W,
    header: StreamDumpHeader,
    frames_written: u64,
}

impl<W: Write> StreamDumpWriter<W> {
    /// Create a writer, immediately writing the preamble and header.
    pub fn new(mut writer: W, header: StreamDumpHeader) -> Result<Self, DumpError> {
        write_preamble(&mut writer, &STREAM_MAGIC)?;
        header.encode(&mut writer)?;
        Ok(Self {
            writer,
            header,
            frames_written: 0,
        })
    }

    /// Append one snapshot taken at `timestamp`.
    pub fn append(
        &mut self,
        timestamp: DateTime<Utc>,
        snapshot: &StreamSnapshot,
    ) -> Result<(), DumpError> {
        encode_frame(&mut self.writer, &self.header, timestamp, snapshot)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads a stream dump from any byte source.
pub struct StreamDumpReader<R: Read> {
    reader: R,
    header: StreamDumpHeader,
}

impl<R: Read> StreamDumpReader<R> {
    /// Open a dump, decoding the preamble and header.
    pub fn open(mut reader: R) -> Result<Self, DumpError> {
        read_preamble(&mut reader, &STREAM_MAGIC)?;
        let header = StreamDumpHeader::decode(&mut reader)?;
        Ok(Self { reader, header })
    }

    /// The header the dump was written against.
    pub fn header(&self) -> &StreamDumpHeader {
        &self.header
    }

    /// Read the next frame, `None` on clean end-of-file.
    pub fn next_frame(&mut self) -> Result<Option<StreamFrame>, DumpError> {
        decode_frame(&mut self.reader, &self.header)
    }
}

/// Pick the frame to restore, as for state dumps: last at `at`, or the
/// latest overall.
pub fn select_frame(
    frames: Vec<StreamFrame>,
    at: Option<DateTime<Utc>>,
) -> Result<StreamFrame, DumpError> {
    if frames.is_empty() {
        return Err(DumpError::Empty);
    }
    match at {
        None => Ok(frames.into_iter().last().expect("non-empty")),
        Some(requested) => frames
            .into_iter()
            .filter(|f| f.timestamp == requested)
            .last()
            .ok_or(DumpError::TimestampNotFound { requested }),
    }
}

// ── Path-level file handle ──────────────────────────────────────

/// A stream dump file on disk, open for appending frames.
#[derive(Debug)]
pub struct StreamDumpFile {
    path: PathBuf,
    file: File,
    header: StreamDumpHeader,
}

impl StreamDumpFile {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: &Path, header: &StreamDumpHeader) -> Result<Self, DumpError> {
        let mut file = File::create(path)?;
        write_preamble(&mut file, &STREAM_MAGIC)?;
        header.encode(&mut file)?;
        tracing::debug!(path = %path.display(), "created stream dump");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Reuse an existing file, validating its header first.
    pub fn reuse(path: &Path, header: &StreamDumpHeader) -> Result<Self, DumpError> {
        let mut reader = BufReader::new(File::open(path)?);
        read_preamble(&mut reader, &STREAM_MAGIC)?;
        let stored = StreamDumpHeader::decode(&mut reader)?;
        stored.check_matches(header)?;
        drop(reader);
        let file = OpenOptions::new().append(true).open(path)?;
        tracing::debug!(path = %path.display(), "reusing stream dump");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Apply the snapshot writing policy for a run.
    pub fn open_or_create(
        path: &Path,
        header: &StreamDumpHeader,
        overwrite: bool,
    ) -> Result<Self, DumpError> {
        if overwrite || !path.exists() {
            Self::create(path, header)
        } else {
            Self::reuse(path, header)
        }
    }

    /// Append one snapshot taken at `timestamp`.
    pub fn append(
        &mut self,
        timestamp: DateTime<Utc>,
        snapshot: &StreamSnapshot,
    ) -> Result<(), DumpError> {
        encode_frame(&mut self.file, &self.header, timestamp, snapshot)?;
        self.file.flush()?;
        Ok(())
    }

    /// Where the file lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load one frame from a dump on disk.
    pub fn load(
        path: &Path,
        expected: &StreamDumpHeader,
        at: Option<DateTime<Utc>>,
    ) -> Result<StreamFrame, DumpError> {
        let mut reader = StreamDumpReader::open(BufReader::new(File::open(path)?))?;
        reader.header().check_matches(expected)?;
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            frames.push(frame);
        }
        select_frame(frames, at)
    }
}
