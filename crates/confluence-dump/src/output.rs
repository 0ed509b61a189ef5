//! Record output files: the engine-side append-only output sink.
//!
//! Layout: preamble (`CWRF` + version), header (period, one entry per
//! record with its methods), then one frame per window closure: the
//! closing timestamp followed by every (record, method) aggregate in
//! header order. Downstream format conversion is a collaborator
//! concern.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use confluence_core::DumpError;
use confluence_records::{RecordSink, RecordStream, WindowAggregate};

use crate::codec::{
    read_f64_run, read_frame_timestamp, read_i64_le, read_preamble, read_u32_le, write_f64_run,
    write_i64_le, write_preamble, write_timestamp, write_u32_le,
};
use crate::stream::{record_entries, RecordEntry};
use crate::OUTPUT_MAGIC;

// ── Header ──────────────────────────────────────────────────────

/// The configuration a record output file was written against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordFileHeader {
    /// Aggregation period in seconds.
    pub period_seconds: i64,
    /// One entry per record, in registration order.
    pub records: Vec<RecordEntry>,
}

impl RecordFileHeader {
    /// Build the header for a stream's registration.
    pub fn from_stream(stream: &RecordStream) -> Self {
        Self {
            period_seconds: stream.period().num_seconds(),
            records: record_entries(stream),
        }
    }

    /// Check a stored header against the current configuration.
    pub fn check_matches(&self, expected: &RecordFileHeader) -> Result<(), DumpError> {
        if self.period_seconds != expected.period_seconds {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "output file written for a {}s period, configuration requires {}s",
                    self.period_seconds, expected.period_seconds
                ),
            });
        }
        if self.records != expected.records {
            return Err(DumpError::Incompatible {
                reason: "output file records do not match the stream's registration".into(),
            });
        }
        Ok(())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<(), DumpError> {
        write_i64_le(w, self.period_seconds)?;
        write_u32_le(w, self.records.len() as u32)?;
        for entry in &self.records {
            entry.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut dyn Read) -> Result<Self, DumpError> {
        let period_seconds = read_i64_le(r)?;
        let count = read_u32_le(r)? as usize;
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(RecordEntry::decode(r)?);
        }
        Ok(Self {
            period_seconds,
            records,
        })
    }
}

// ── Frames ──────────────────────────────────────────────────────

/// One closed window as stored in an output file.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordFrame {
    /// Closing timestamp of the window.
    pub closing: DateTime<Utc>,
    /// One aggregate per (record, method) pair, in header order.
    pub values: Vec<Vec<f64>>,
}

// ── Reader ──────────────────────────────────────────────────────

/// Reads a record output file from any byte source.
pub struct RecordFileReader<R: Read> {
    reader: R,
    header: RecordFileHeader,
}

impl<R: Read> RecordFileReader<R> {
    /// Open an output file, decoding the preamble and header.
    pub fn open(mut reader: R) -> Result<Self, DumpError> {
        read_preamble(&mut reader, &OUTPUT_MAGIC)?;
        let header = RecordFileHeader::decode(&mut reader)?;
        Ok(Self { reader, header })
    }

    /// The header the file was written against.
    pub fn header(&self) -> &RecordFileHeader {
        &self.header
    }

    /// Read the next closed window, `None` on clean end-of-file.
    pub fn next_frame(&mut self) -> Result<Option<RecordFrame>, DumpError> {
        let Some(closing) = read_frame_timestamp(&mut self.reader)? else {
            return Ok(None);
        };
        let mut values = Vec::new();
        for entry in &self.header.records {
            for _ in &entry.methods {
                values.push(read_f64_run(&mut self.reader, entry.len as usize)?);
            }
        }
        Ok(Some(RecordFrame { closing, values }))
    }

    /// Read every remaining closed window.
    pub fn read_all(&mut self) -> Result<Vec<RecordFrame>, DumpError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Open a record output file on disk and read all its windows.
pub fn load_record_file(path: &Path) -> Result<(RecordFileHeader, Vec<RecordFrame>), DumpError> {
    let mut reader = RecordFileReader::open(BufReader::new(File::open(path)?))?;
    let frames = reader.read_all()?;
    Ok((reader.header().clone(), frames))
}

// ── File sink ───────────────────────────────────────────────────

/// A [`RecordSink`] appending closed windows to a file on disk.
pub struct RecordFileSink {
    path: PathBuf,
    file: File,
    header: RecordFileHeader,
}

impl RecordFileSink {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: &Path, header: &RecordFileHeader) -> Result<Self, DumpError> {
        let mut file = File::create(path)?;
        write_preamble(&mut file, &OUTPUT_MAGIC)?;
        header.encode(&mut file)?;
        tracing::debug!(path = %path.display(), "created record output file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Reuse an existing file, validating its header first.
    pub fn reuse(path: &Path, header: &RecordFileHeader) -> Result<Self, DumpError> {
        let mut reader = BufReader::new(File::open(path)?);
        read_preamble(&mut reader, &OUTPUT_MAGIC)?;
        let stored = RecordFileHeader::decode(&mut reader)?;
        stored.check_matches(header)?;
        drop(reader);
        let file = OpenOptions::new().append(true).open(path)?;
        tracing::debug!(path = %path.display(), "reusing record output file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Apply the snapshot writing policy for a run.
    pub fn open_or_create(
        path: &Path,
        header: &RecordFileHeader,
        overwrite: bool,
    ) -> Result<Self, DumpError> {
        if overwrite || !path.exists() {
            Self::create(path, header)
        } else {
            Self::reuse(path, header)
        }
    }

    /// Where the file lives.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for RecordFileSink {
    fn emit(
        &mut self,
        closing: DateTime<Utc>,
        aggregates: &[WindowAggregate<'_>],
    ) -> Result<(), DumpError> {
        let expected: usize = self.header.records.iter().map(|r| r.methods.len()).sum();
        if aggregates.len() != expected {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "{} aggregates emitted, header declares {expected}",
                    aggregates.len(),
                ),
            });
        }
        write_timestamp(&mut self.file, closing)?;
        let mut emitted = aggregates.iter();
        for entry in &self.header.records {
            for &method in &entry.methods {
                let aggregate = emitted.next().expect("count checked above");
                if aggregate.record != entry.name
                    || aggregate.method != method
                    || aggregate.values.len() as u64 != entry.len
                {
                    return Err(DumpError::Incompatible {
                        reason: format!(
                            "aggregate ({}, {}) does not match the output header",
                            aggregate.record, aggregate.method
                        ),
                    });
                }
                write_f64_run(&mut self.file, &aggregate.values)?;
            }
        }
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use confluence_records::{AggregationMethod, MemorySink, Record, RecordSource};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    }

    fn temp_path(stem: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "confluence_{}_{stem}_{n}.cfr",
            std::process::id()
        ))
    }

    fn sample_stream() -> RecordStream {
        let mut stream = RecordStream::new(
            TimeDelta::hours(2),
            TimeDelta::hours(1),
            t0(),
            Box::new(MemorySink::new()),
        )
        .unwrap();
        stream.add_record(
            Record::new("output_x", "1", RecordSource::Output),
            1,
            &[AggregationMethod::Sum, AggregationMethod::Point],
        );
        stream
    }

    #[test]
    fn stream_emissions_land_in_the_file() {
        let path = temp_path("emit");
        let mut stream = sample_stream();
        let header = RecordFileHeader::from_stream(&stream);
        let sink = RecordFileSink::create(&path, &header).unwrap();
        stream.set_sink(Box::new(sink));

        for t in 0..6 {
            stream.update("output_x", &[t as f64]).unwrap();
        }

        let (stored, frames) = load_record_file(&path).unwrap();
        assert_eq!(stored, header);
        assert_eq!(frames.len(), 3);
        // Windows close at 2h, 4h, 6h with sums 0+1, 2+3, 4+5.
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.closing, t0() + TimeDelta::hours(2 * (i as i64 + 1)));
            assert_eq!(frame.values[0], vec![(4 * i) as f64 + 1.0]);
            assert_eq!(frame.values[1], vec![(2 * i) as f64 + 1.0]);
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reuse_appends_after_existing_windows() {
        let path = temp_path("append");
        let stream = sample_stream();
        let header = RecordFileHeader::from_stream(&stream);

        {
            let mut stream = sample_stream();
            stream.set_sink(Box::new(RecordFileSink::create(&path, &header).unwrap()));
            stream.update("output_x", &[1.0]).unwrap();
            stream.update("output_x", &[1.0]).unwrap();
        }
        {
            let mut stream = sample_stream();
            stream.reset(t0() + TimeDelta::hours(2));
            stream.set_sink(Box::new(
                RecordFileSink::open_or_create(&path, &header, false).unwrap(),
            ));
            stream.update("output_x", &[2.0]).unwrap();
            stream.update("output_x", &[2.0]).unwrap();
        }

        let (_, frames) = load_record_file(&path).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].values[0], vec![2.0]);
        assert_eq!(frames[1].values[0], vec![4.0]);
        assert_eq!(frames[1].closing, t0() + TimeDelta::hours(4));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn drifted_header_refused_on_reuse() {
        let path = temp_path("drift");
        let stream = sample_stream();
        let header = RecordFileHeader::from_stream(&stream);
        RecordFileSink::create(&path, &header).unwrap();

        let mut other = header.clone();
        other.records[0].name = "output_y".into();
        assert!(matches!(
            RecordFileSink::reuse(&path, &other),
            Err(DumpError::Incompatible { .. })
        ));

        std::fs::remove_file(&path).ok();
    }
}
