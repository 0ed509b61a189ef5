//! State dump files: per-component history snapshots.
//!
//! Layout: preamble (`CWSD` + version), header (category, solver
//! history, spatial shape, one entry per declared state), then
//! append-only frames. Each frame is a timestamp followed by every
//! state's slots, oldest to newest with the scratch slot last, each
//! `slot_len` f64 values.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use confluence_core::{Category, ComponentDescriptor, DumpError, SpaceShape};
use confluence_state::State;

use crate::codec::{
    read_f64_run, read_frame_timestamp, read_length_prefixed_str, read_preamble, read_u32_le,
    read_u64_le, write_f64_run, write_length_prefixed_str, write_preamble, write_timestamp,
    write_u32_le, write_u64_le, write_u8,
};
use crate::STATE_MAGIC;

// ── Header ──────────────────────────────────────────────────────

/// One declared state as recorded in a dump header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDumpEntry {
    /// State name.
    pub name: String,
    /// State units.
    pub units: String,
    /// Divisions per grid cell.
    pub divisions: u32,
}

/// The configuration a state dump was written against.
///
/// Restoring validates the stored header against the current
/// configuration and refuses on any drift.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDumpHeader {
    /// Category of the dumped component.
    pub category: Category,
    /// Number of past steps retained beyond the current one.
    pub solver_history: u32,
    /// Spatial shape of the dumped component.
    pub shape: SpaceShape,
    /// One entry per declared state, in declaration order.
    pub states: Vec<StateDumpEntry>,
}

impl StateDumpHeader {
    /// Build the header for a component's declaration.
    pub fn from_descriptor(descriptor: &ComponentDescriptor, shape: &SpaceShape) -> Self {
        Self {
            category: descriptor.category,
            solver_history: descriptor.solver_history as u32,
            shape: shape.clone(),
            states: descriptor
                .states
                .iter()
                .map(|s| StateDumpEntry {
                    name: s.name.clone(),
                    units: s.units.clone(),
                    divisions: s.divisions as u32,
                })
                .collect(),
        }
    }

    /// Values per slot for one entry.
    pub fn slot_len(&self, entry: &StateDumpEntry) -> usize {
        self.shape.cell_count() * entry.divisions as usize
    }

    /// Slots per state, the scratch slot included.
    pub fn depth(&self) -> usize {
        self.solver_history as usize + 1
    }

    /// Check a stored header against the current configuration.
    pub fn check_matches(&self, expected: &StateDumpHeader) -> Result<(), DumpError> {
        if self.category != expected.category {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "dump written for {} component, configuration is {}",
                    self.category, expected.category
                ),
            });
        }
        if self.solver_history != expected.solver_history {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "dump carries solver history {}, configuration requires {}",
                    self.solver_history, expected.solver_history
                ),
            });
        }
        if self.shape != expected.shape {
            return Err(DumpError::Incompatible {
                reason: format!(
                    "dump written over shape {}, configuration over {}",
                    self.shape, expected.shape
                ),
            });
        }
        if self.states != expected.states {
            return Err(DumpError::Incompatible {
                reason: "dump state variables do not match the declared states".into(),
            });
        }
        Ok(())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<(), DumpError> {
        write_u8(w, self.category.code())?;
        write_u32_le(w, self.solver_history)?;
        write_u32_le(w, self.shape.ndim() as u32)?;
        for &dim in self.shape.dims() {
            write_u64_le(w, dim as u64)?;
        }
        write_u32_le(w, self.states.len() as u32)?;
        for entry in &self.states {
            write_length_prefixed_str(w, &entry.name)?;
            write_length_prefixed_str(w, &entry.units)?;
            write_u32_le(w, entry.divisions)?;
        }
        Ok(())
    }

    fn decode(r: &mut dyn Read) -> Result<Self, DumpError> {
        let code = crate::codec::read_u8(r)?;
        let category = Category::from_code(code).ok_or(DumpError::MalformedFile {
            detail: format!("unknown category code {code}"),
        })?;
        let solver_history = read_u32_le(r)?;
        let ndim = read_u32_le(r)? as usize;
        let mut dims = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            dims.push(read_u64_le(r)? as usize);
        }
        let shape = SpaceShape::new(&dims).map_err(|e| DumpError::MalformedFile {
            detail: format!("invalid shape in header: {e}"),
        })?;
        let count = read_u32_le(r)? as usize;
        let mut states = Vec::with_capacity(count);
        for _ in 0..count {
            states.push(StateDumpEntry {
                name: read_length_prefixed_str(r)?,
                units: read_length_prefixed_str(r)?,
                divisions: read_u32_le(r)?,
            });
        }
        Ok(Self {
            category,
            solver_history,
            shape,
            states,
        })
    }
}

// ── Frames ──────────────────────────────────────────────────────

/// One snapshot of every state at a point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct StateFrame {
    /// Instant of the last committed step.
    pub timestamp: DateTime<Utc>,
    /// Per header entry: slots oldest to newest, scratch last.
    pub slots: Vec<Vec<Vec<f64>>>,
}

fn encode_frame(
    w: &mut dyn Write,
    header: &StateDumpHeader,
    timestamp: DateTime<Utc>,
    states: &[&State],
) -> Result<(), DumpError> {
    if states.len() != header.states.len() {
        return Err(DumpError::Incompatible {
            reason: format!(
                "{} states supplied, header declares {}",
                states.len(),
                header.states.len()
            ),
        });
    }
    for (entry, state) in header.states.iter().zip(states) {
        if state.depth() != header.depth() || state.slot_len() != header.slot_len(entry) {
            return Err(DumpError::Incompatible {
                reason: format!("state '{}' does not match the dump header", entry.name),
            });
        }
    }
    write_timestamp(w, timestamp)?;
    for state in states {
        for slot in state.slots() {
            write_f64_run(w, slot)?;
        }
    }
    Ok(())
}

fn decode_frame(
    r: &mut dyn Read,
    header: &StateDumpHeader,
) -> Result<Option<StateFrame>, DumpError> {
    let Some(timestamp) = read_frame_timestamp(r)? else {
        return Ok(None);
    };
    let depth = header.depth();
    let mut slots = Vec::with_capacity(header.states.len());
    for entry in &header.states {
        let slot_len = header.slot_len(entry);
        let mut state_slots = Vec::with_capacity(depth);
        for _ in 0..depth {
            state_slots.push(read_f64_run(r, slot_len)?);
        }
        slots.push(state_slots);
    }
    Ok(Some(StateFrame { timestamp, slots }))
}

// ── Writer / reader over byte streams ───────────────────────────

/// Writes a state dump to any byte sink, header first.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code a `File`.
pub struct StateDumpWriter<W: Write> {
    writer: W,
    header: StateDumpHeader,
    frames_written: u64,
}

impl<W: Write> StateDumpWriter<W> {
    /// Create a writer, immediately writing the preamble and header.
    pub fn new(mut writer: W, header: StateDumpHeader) -> Result<Self, DumpError> {
        write_preamble(&mut writer, &STATE_MAGIC)?;
        header.encode(&mut writer)?;
        Ok(Self {
            writer,
            header,
            frames_written: 0,
        })
    }

    /// Append one frame; `states` follow the header's entry order.
    pub fn append(&mut self, timestamp: DateTime<Utc>, states: &[&State]) -> Result<(), DumpError> {
        encode_frame(&mut self.writer, &self.header, timestamp, states)?;
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

/// Reads a state dump from any byte source.
pub struct StateDumpReader<R: Read> {
    reader: R,
    header: StateDumpHeader,
}

impl<R: Read> StateDumpReader<R> {
    /// Open a dump, decoding the preamble and header.
    pub fn open(mut reader: R) -> Result<Self, DumpError> {
        read_preamble(&mut reader, &STATE_MAGIC)?;
        let header = StateDumpHeader::decode(&mut reader)?;
        Ok(Self { reader, header })
    }

    /// The header the dump was written against.
    pub fn header(&self) -> &StateDumpHeader {
        &self.header
    }

    /// Read the next frame, `None` on clean end-of-file.
    pub fn next_frame(&mut self) -> Result<Option<StateFrame>, DumpError> {
        decode_frame(&mut self.reader, &self.header)
    }
}

/// Pick the frame to restore: the last one matching `at`, or the last
/// frame overall when no timestamp is requested.
///
/// Later frames shadow earlier ones at the same timestamp, so a
/// re-dumped instant resolves to its most recent snapshot.
pub fn select_frame(
    frames: Vec<StateFrame>,
    at: Option<DateTime<Utc>>,
) -> Result<StateFrame, DumpError> {
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

/// A state dump file on disk, open for appending frames.
///
/// `overwrite=true` recreates the file; `overwrite=false` reuses an
/// existing file after validating its header against the current
/// configuration, or creates one if absent.
#[derive(Debug)]
pub struct StateDumpFile {
    path: PathBuf,
    file: File,
    header: StateDumpHeader,
}

impl StateDumpFile {
    /// Create (or truncate) the file and write the header.
    pub fn create(path: &Path, header: &StateDumpHeader) -> Result<Self, DumpError> {
        let mut file = File::create(path)?;
        write_preamble(&mut file, &STATE_MAGIC)?;
        header.encode(&mut file)?;
        tracing::debug!(path = %path.display(), "created state dump");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Reuse an existing file, validating its header first.
    pub fn reuse(path: &Path, header: &StateDumpHeader) -> Result<Self, DumpError> {
        let mut reader = BufReader::new(File::open(path)?);
        read_preamble(&mut reader, &STATE_MAGIC)?;
        let stored = StateDumpHeader::decode(&mut reader)?;
        stored.check_matches(header)?;
        drop(reader);
        let file = OpenOptions::new().append(true).open(path)?;
        tracing::debug!(path = %path.display(), "reusing state dump");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            header: header.clone(),
        })
    }

    /// Apply the snapshot writing policy for a run.
    pub fn open_or_create(
        path: &Path,
        header: &StateDumpHeader,
        overwrite: bool,
    ) -> Result<Self, DumpError> {
        if overwrite || !path.exists() {
            Self::create(path, header)
        } else {
            Self::reuse(path, header)
        }
    }

    /// Append one frame; `states` follow the header's entry order.
    pub fn append(&mut self, timestamp: DateTime<Utc>, states: &[&State]) -> Result<(), DumpError> {
        encode_frame(&mut self.file, &self.header, timestamp, states)?;
        self.file.flush()?;
        Ok(())
    }

    /// Where the file lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load one frame from a dump on disk.
    ///
    /// The stored header must match `expected`; the frame is the last
    /// one at `at`, or the latest overall when `at` is `None`.
    pub fn load(
        path: &Path,
        expected: &StateDumpHeader,
        at: Option<DateTime<Utc>>,
    ) -> Result<StateFrame, DumpError> {
        let mut reader = StateDumpReader::open(BufReader::new(File::open(path)?))?;
        reader.header().check_matches(expected)?;
        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            frames.push(frame);
        }
        select_frame(frames, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use confluence_core::StateDef;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    }

    fn temp_path(stem: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "confluence_{}_{stem}_{n}.cfd",
            std::process::id()
        ))
    }

    fn header() -> StateDumpHeader {
        let descriptor = ComponentDescriptor {
            category: Category::Surfacelayer,
            solver_history: 1,
            inwards: vec![],
            outwards: vec![],
            inputs: vec![],
            parameters: vec![],
            constants: vec![],
            states: vec![
                StateDef::new("state_a", "1"),
                StateDef::with_divisions("state_b", "kg m-2", 2),
            ],
            outputs: vec![],
        };
        let shape = SpaceShape::new(&[3]).unwrap();
        StateDumpHeader::from_descriptor(&descriptor, &shape)
    }

    fn filled_states() -> Vec<State> {
        let mut a = State::new(1, 3);
        a.current_mut().copy_from_slice(&[1.0, 2.0, 3.0]);
        a.rotate();
        a.current_mut().copy_from_slice(&[4.0, 5.0, 6.0]);
        let mut b = State::new(1, 6);
        b.current_mut().fill(-0.5);
        b.rotate();
        vec![a, b]
    }

    #[test]
    fn header_round_trips() {
        let mut buf = Vec::new();
        header().encode(&mut buf).unwrap();
        let decoded = StateDumpHeader::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, header());
        assert_eq!(decoded.slot_len(&decoded.states[1]), 6);
        assert_eq!(decoded.depth(), 2);
    }

    #[test]
    fn frames_round_trip_bitwise() {
        let states = filled_states();
        let refs: Vec<&State> = states.iter().collect();

        let mut writer = StateDumpWriter::new(Vec::new(), header()).unwrap();
        writer.append(t0(), &refs).unwrap();
        writer.append(t0() + TimeDelta::hours(1), &refs).unwrap();
        assert_eq!(writer.frames_written(), 2);
        let buf = writer.into_inner();

        let mut reader = StateDumpReader::open(buf.as_slice()).unwrap();
        let first = reader.next_frame().unwrap().unwrap();
        assert_eq!(first.timestamp, t0());
        for (state, slots) in states.iter().zip(&first.slots) {
            for (expected, got) in state.slots().iter().zip(slots) {
                assert_eq!(*expected, got.as_slice());
            }
        }
        assert!(reader.next_frame().unwrap().is_some());
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn rebuilt_state_matches_dumped_state() {
        let states = filled_states();
        let refs: Vec<&State> = states.iter().collect();
        let mut writer = StateDumpWriter::new(Vec::new(), header()).unwrap();
        writer.append(t0(), &refs).unwrap();
        let buf = writer.into_inner();

        let mut reader = StateDumpReader::open(buf.as_slice()).unwrap();
        let frame = reader.next_frame().unwrap().unwrap();
        let rebuilt = State::from_slots(3, &frame.slots[0]);
        assert_eq!(rebuilt.current(), states[0].current());
        assert_eq!(rebuilt.last(), states[0].last());
    }

    #[test]
    fn mismatched_states_rejected_at_append() {
        let states = filled_states();
        let refs: Vec<&State> = states.iter().take(1).collect();
        let mut writer = StateDumpWriter::new(Vec::new(), header()).unwrap();
        let err = writer.append(t0(), &refs).unwrap_err();
        assert!(matches!(err, DumpError::Incompatible { .. }));
    }

    #[test]
    fn select_frame_prefers_latest() {
        let states = filled_states();
        let refs: Vec<&State> = states.iter().collect();
        let mut writer = StateDumpWriter::new(Vec::new(), header()).unwrap();
        writer.append(t0(), &refs).unwrap();
        writer.append(t0() + TimeDelta::hours(2), &refs).unwrap();
        let buf = writer.into_inner();

        let mut reader = StateDumpReader::open(buf.as_slice()).unwrap();
        let mut frames = Vec::new();
        while let Some(f) = reader.next_frame().unwrap() {
            frames.push(f);
        }

        let latest = select_frame(frames.clone(), None).unwrap();
        assert_eq!(latest.timestamp, t0() + TimeDelta::hours(2));
        let exact = select_frame(frames.clone(), Some(t0())).unwrap();
        assert_eq!(exact.timestamp, t0());
        let missing = select_frame(frames, Some(t0() + TimeDelta::hours(5)));
        assert!(matches!(missing, Err(DumpError::TimestampNotFound { .. })));
        assert!(matches!(select_frame(vec![], None), Err(DumpError::Empty)));
    }

    #[test]
    fn file_reuse_validates_header_and_appends() {
        let path = temp_path("state_reuse");
        let states = filled_states();
        let refs: Vec<&State> = states.iter().collect();

        {
            let mut file = StateDumpFile::create(&path, &header()).unwrap();
            file.append(t0(), &refs).unwrap();
        }
        {
            // overwrite=false keeps the existing frame and appends.
            let mut file = StateDumpFile::open_or_create(&path, &header(), false).unwrap();
            file.append(t0() + TimeDelta::hours(1), &refs).unwrap();
        }
        let frame = StateDumpFile::load(&path, &header(), None).unwrap();
        assert_eq!(frame.timestamp, t0() + TimeDelta::hours(1));
        let first = StateDumpFile::load(&path, &header(), Some(t0())).unwrap();
        assert_eq!(first.timestamp, t0());

        // overwrite=true starts over.
        {
            let mut file = StateDumpFile::open_or_create(&path, &header(), true).unwrap();
            file.append(t0() + TimeDelta::hours(3), &refs).unwrap();
        }
        let frame = StateDumpFile::load(&path, &header(), None).unwrap();
        assert_eq!(frame.timestamp, t0() + TimeDelta::hours(3));
        assert!(StateDumpFile::load(&path, &header(), Some(t0())).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn incompatible_header_refused_on_reuse() {
        let path = temp_path("state_incompat");
        StateDumpFile::create(&path, &header()).unwrap();

        let mut other = header();
        other.solver_history = 3;
        let err = StateDumpFile::reuse(&path, &other).unwrap_err();
        assert!(matches!(err, DumpError::Incompatible { .. }));

        std::fs::remove_file(&path).ok();
    }
}
