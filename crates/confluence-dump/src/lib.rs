//! Binary snapshot and record output files for Confluence runs.
//!
//! Three little-endian formats share one framing style: a four-byte
//! magic, a format version, a header describing the configuration the
//! file was written against, and append-only frames. Reuse of an
//! existing file validates the stored header against the current
//! configuration and refuses on any drift; restore picks a frame by
//! exact timestamp or defaults to the latest.
//!
//! | Magic  | File | Frame payload |
//! |--------|------|---------------|
//! | `CWSD` | state dump | every state's history slots |
//! | `CWRD` | stream dump | window start, counters, raw accumulators |
//! | `CWRF` | record output | finalised aggregates per window closure |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod output;
pub mod state;
pub mod stream;

/// Format version shared by the three file formats.
pub const FORMAT_VERSION: u8 = 1;

/// Magic bytes of a state dump file.
pub const STATE_MAGIC: [u8; 4] = *b"CWSD";

/// Magic bytes of a record stream dump file.
pub const STREAM_MAGIC: [u8; 4] = *b"CWRD";

/// Magic bytes of a record output file.
pub const OUTPUT_MAGIC: [u8; 4] = *b"CWRF";

pub use output::{
    load_record_file, RecordFileHeader, RecordFileReader, RecordFileSink, RecordFrame,
};
pub use state::{
    StateDumpEntry, StateDumpFile, StateDumpHeader, StateDumpReader, StateDumpWriter, StateFrame,
};
pub use stream::{
    record_entries, RecordEntry, StreamDumpFile, StreamDumpHeader, StreamDumpReader,
    StreamDumpWriter, StreamFrame,
};
