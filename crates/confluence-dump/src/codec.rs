//! Binary encode/decode primitives for the dump formats.
//!
//! All integers are little-endian. Strings are length-prefixed with a
//! `u32` length. The formats stay deliberately plain: no compression,
//! no alignment padding, no self-describing schema.

use std::io::{Read, Write};

use chrono::{DateTime, TimeZone, Utc};

use confluence_core::DumpError;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), DumpError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), DumpError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), DumpError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian i64.
pub fn write_i64_le(w: &mut dyn Write, v: i64) -> Result<(), DumpError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian f64.
pub fn write_f64_le(w: &mut dyn Write, v: f64) -> Result<(), DumpError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), DumpError> {
    write_u32_le(w, s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a timestamp as i64 unix seconds.
pub fn write_timestamp(w: &mut dyn Write, t: DateTime<Utc>) -> Result<(), DumpError> {
    write_i64_le(w, t.timestamp())
}

/// Write a run of f64 values without a length prefix.
///
/// The count is implied by the enclosing header.
pub fn write_f64_run(w: &mut dyn Write, values: &[f64]) -> Result<(), DumpError> {
    for &v in values {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, DumpError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, DumpError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, DumpError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a little-endian i64.
pub fn read_i64_le(r: &mut dyn Read) -> Result<i64, DumpError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Read a little-endian f64.
pub fn read_f64_le(r: &mut dyn Read) -> Result<f64, DumpError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, DumpError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| DumpError::MalformedFile {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read an i64-unix-seconds timestamp.
pub fn read_timestamp(r: &mut dyn Read) -> Result<DateTime<Utc>, DumpError> {
    let seconds = read_i64_le(r)?;
    decode_timestamp(seconds)
}

/// Turn unix seconds into a datetime, rejecting out-of-range values.
pub fn decode_timestamp(seconds: i64) -> Result<DateTime<Utc>, DumpError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or(DumpError::MalformedFile {
            detail: format!("timestamp {seconds} out of range"),
        })
}

/// Read a run of f64 values whose count is implied by the header.
pub fn read_f64_run(r: &mut dyn Read, count: usize) -> Result<Vec<f64>, DumpError> {
    let mut bytes = vec![0u8; count * 8];
    r.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().expect("chunks of 8")))
        .collect())
}

// ── File framing ────────────────────────────────────────────────

/// Write a file preamble: magic bytes plus format version.
pub fn write_preamble(w: &mut dyn Write, magic: &[u8; 4]) -> Result<(), DumpError> {
    w.write_all(magic)?;
    write_u8(w, crate::FORMAT_VERSION)?;
    Ok(())
}

/// Read and validate a file preamble.
pub fn read_preamble(r: &mut dyn Read, magic: &[u8; 4]) -> Result<(), DumpError> {
    let mut found = [0u8; 4];
    r.read_exact(&mut found)?;
    if &found != magic {
        return Err(DumpError::BadMagic);
    }
    let version = read_u8(r)?;
    if version != crate::FORMAT_VERSION {
        return Err(DumpError::UnsupportedVersion {
            found: version as u32,
        });
    }
    Ok(())
}

/// Read the leading 8-byte timestamp of a frame, distinguishing clean
/// end-of-file (no bytes available) from a truncated frame header.
///
/// Returns `Ok(None)` on clean EOF.
pub fn read_frame_timestamp(r: &mut dyn Read) -> Result<Option<DateTime<Utc>>, DumpError> {
    let mut buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(DumpError::MalformedFile {
                    detail: format!("truncated frame header: got {filled} of 8 timestamp bytes"),
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DumpError::Io(e)),
        }
    }
    decode_timestamp(i64::from_le_bytes(buf)).map(Some)
}
