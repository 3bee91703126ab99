//! The checkpoint file format.
//!
//! A checkpoint is the fixed header followed by the engine state written
//! through the ordered binary contract of `malsim_core::util::checkpoint`.
//! The header carries a magic number, a bool, a marker byte, negative zero
//! and a quiet NaN so that any platform drift in primitive encodings is
//! caught before the state is interpreted. Mismatches are fatal.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use malsim_core::util::checkpoint::Checkpoint;
use malsim_core::Population;

use crate::error::{IoError, Result};

/// "OMCP" in little-endian.
const MAGIC: u32 = 0x5043_4D4F;
const MARKER_BYTE: u8 = 0xA5;

fn write_header(w: &mut dyn Write) -> Result<()> {
    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&[1u8])?; // bool true
    w.write_all(&[MARKER_BYTE])?;
    w.write_all(&(-0.0f64).to_le_bytes())?;
    w.write_all(&f64::NAN.to_le_bytes())?;
    Ok(())
}

fn read_header(r: &mut dyn Read) -> Result<()> {
    let mut buf = [0u8; 4 + 1 + 1 + 8 + 8];
    r.read_exact(&mut buf)
        .map_err(|_| IoError::Checkpoint("short read in header".into()))?;
    let magic = u32::from_le_bytes(buf[0..4].try_into().expect("fixed size"));
    let flag = buf[4];
    let marker = buf[5];
    let neg_zero = f64::from_le_bytes(buf[6..14].try_into().expect("fixed size"));
    let nan = f64::from_le_bytes(buf[14..22].try_into().expect("fixed size"));
    // Bitwise checks: numeric equality is not the same for -0.0 and NaN.
    if magic != MAGIC
        || flag != 1
        || marker != MARKER_BYTE
        || neg_zero.to_bits() != (-0.0f64).to_bits()
        || nan.to_bits() != f64::NAN.to_bits()
    {
        return Err(IoError::Checkpoint("invalid header".into()));
    }
    Ok(())
}

/// Serialize the whole simulation state to `path`.
pub fn save(population: &Population, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_header(&mut w)?;
    population.write_ckpt(&mut w)?;
    w.flush()?;
    tracing::info!(path = %path.display(), "checkpoint written");
    Ok(())
}

/// Restore simulation state from `path` into a freshly-constructed
/// population (same scenario and seed as the original run).
pub fn load(population: &mut Population, path: &Path) -> Result<()> {
    let mut r = BufReader::new(File::open(path)?);
    read_header(&mut r)?;
    population.read_ckpt(&mut r)?;
    tracing::info!(path = %path.display(), "checkpoint restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        assert!(read_header(&mut &buf[..]).is_ok());
    }

    #[test]
    fn test_corrupt_magic_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        assert!(read_header(&mut &buf[..]).is_err());
    }

    #[test]
    fn test_corrupt_nan_payload_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        // Flip a bit inside the NaN payload: numeric comparison would not
        // notice, the bitwise check must.
        let last = buf.len() - 2;
        buf[last] ^= 0x01;
        assert!(read_header(&mut &buf[..]).is_err());
    }

    #[test]
    fn test_truncated_header_rejected() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        buf.truncate(10);
        assert!(read_header(&mut &buf[..]).is_err());
    }
}
