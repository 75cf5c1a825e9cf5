//! Versioned binary format for cached grid-polygon conversions.
//!
//! Layout: magic `GPCV`, version byte, flags byte (bit 0: gzip payload).
//! The payload holds a `u32`-prefixed JSON key list, a kind byte (0 single,
//! 1 levels), `u32` levels/rows/cols, then width-tagged little-endian index
//! data and, for levels, width-tagged count data. Weights and the coverage
//! mask are rebuilt on read.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use ndarray::{Array2, Array3};

use crate::conv::{GridPolyConv, IndexRaster};
use crate::raster::IndexWidth;
use crate::vector::PolyKey;

const MAGIC: &[u8; 4] = b"GPCV";
const VERSION: u8 = 1;
const FLAG_GZIP: u8 = 0b0000_0001;

const KIND_SINGLE: u8 = 0;
const KIND_LEVELS: u8 = 1;

/// Encode a conversion; `compress` gzips the payload.
pub(crate) fn write_conv_bytes<K: PolyKey>(conv: &GridPolyConv<K>, compress: bool) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(MAGIC).context("[io::gpc] Failed to write magic bytes")?;
    out.write_all(&[VERSION, if compress { FLAG_GZIP } else { 0 }])
        .context("[io::gpc] Failed to write header")?;

    if compress {
        let mut encoder = GzEncoder::new(out, Compression::default());
        write_payload(&mut encoder, conv)?;
        out = encoder.finish().context("[io::gpc] Failed to finish gzip stream")?;
    } else {
        write_payload(&mut out, conv)?;
    }
    Ok(out)
}

/// Decode a conversion written by [`write_conv_bytes`].
pub(crate) fn read_conv_bytes<K: PolyKey>(bytes: &[u8]) -> Result<GridPolyConv<K>> {
    let mut reader = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).context("[io::gpc] Failed to read magic bytes")?;
    ensure!(&magic == MAGIC, "[io::gpc] Invalid magic: expected 'GPCV'");

    let mut header = [0u8; 2];
    reader.read_exact(&mut header).context("[io::gpc] Failed to read header")?;
    let [version, flags] = header;
    ensure!(version == VERSION, "[io::gpc] Unsupported version {version} (expected {VERSION})");
    ensure!(flags & !FLAG_GZIP == 0, "[io::gpc] Unknown flags {flags:#04x}");

    if flags & FLAG_GZIP != 0 {
        read_payload(&mut GzDecoder::new(reader))
    } else {
        read_payload(&mut reader)
    }
}

fn write_payload<W: Write, K: PolyKey>(writer: &mut W, conv: &GridPolyConv<K>) -> Result<()> {
    let keys = serde_json::to_vec(conv.poly_idx()).context("[io::gpc] Failed to encode polygon keys")?;
    writer.write_all(&u32::try_from(keys.len()).context("[io::gpc] Key list too long")?.to_le_bytes())
        .context("[io::gpc] Failed to write key length")?;
    writer.write_all(&keys).context("[io::gpc] Failed to write polygon keys")?;

    let raster = conv.raster();
    let (nrow, ncol) = raster.shape();
    let kind = match raster {
        IndexRaster::Single(_) => KIND_SINGLE,
        IndexRaster::Levels { .. } => KIND_LEVELS,
    };
    writer.write_all(&[kind]).context("[io::gpc] Failed to write kind")?;
    for dim in [raster.num_levels(), nrow, ncol] {
        let dim = u32::try_from(dim).context("[io::gpc] Dimension exceeds u32")?;
        writer.write_all(&dim.to_le_bytes()).context("[io::gpc] Failed to write dimensions")?;
    }

    write_values(writer, raster.view().iter().copied(), raster.max_index())
        .context("[io::gpc] Failed to write index data")?;
    if let Some(count) = raster.count() {
        let max = count.iter().copied().max().unwrap_or(0);
        write_values(writer, count.iter().copied(), max).context("[io::gpc] Failed to write count data")?;
    }
    Ok(())
}

fn read_payload<R: Read, K: PolyKey>(reader: &mut R) -> Result<GridPolyConv<K>> {
    let mut b4 = [0u8; 4];
    reader.read_exact(&mut b4).context("[io::gpc] Failed to read key length")?;
    let key_len = u32::from_le_bytes(b4) as usize;
    let keys = read_exact_vec(reader, key_len).context("[io::gpc] Failed to read polygon keys")?;
    let poly_idx: Vec<K> = serde_json::from_slice(&keys).context("[io::gpc] Failed to decode polygon keys")?;

    let mut kind = [0u8; 1];
    reader.read_exact(&mut kind).context("[io::gpc] Failed to read kind")?;

    let mut dims = [0usize; 3];
    for d in &mut dims {
        reader.read_exact(&mut b4).context("[io::gpc] Failed to read dimensions")?;
        *d = u32::from_le_bytes(b4) as usize;
    }
    let [nlev, nrow, ncol] = dims;
    let len = nlev
        .checked_mul(nrow)
        .and_then(|n| n.checked_mul(ncol))
        .context("[io::gpc] Dimensions overflow")?;

    let raster = match kind[0] {
        KIND_SINGLE => {
            ensure!(nlev == 1, "[io::gpc] Single raster must have one level; found {nlev}");
            let index = read_values(reader, len).context("[io::gpc] Failed to read index data")?;
            IndexRaster::Single(Array2::from_shape_vec((nrow, ncol), index)?)
        }
        KIND_LEVELS => {
            let index = read_values(reader, len).context("[io::gpc] Failed to read index data")?;
            let count = read_values(reader, len).context("[io::gpc] Failed to read count data")?;
            IndexRaster::Levels {
                index: Array3::from_shape_vec((nlev, nrow, ncol), index)?,
                count: Array3::from_shape_vec((nlev, nrow, ncol), count)?,
            }
        }
        other => bail!("[io::gpc] Unknown raster kind {other}"),
    };

    let mut trailing = [0u8; 1];
    ensure!(
        reader.read(&mut trailing).context("[io::gpc] Failed to check for trailing data")? == 0,
        "[io::gpc] Trailing data after payload"
    );

    GridPolyConv::new(poly_idx, raster).context("[io::gpc] Invalid conversion")
}

/// Width byte followed by values in the narrowest width holding `max`.
fn write_values<W: Write>(writer: &mut W, values: impl Iterator<Item = u32>, max: u32) -> Result<()> {
    let width = IndexWidth::for_max(max);
    writer.write_all(&[width.bytes()])?;
    for v in values {
        match width {
            IndexWidth::U8 => writer.write_all(&[v as u8])?,
            IndexWidth::U16 => writer.write_all(&(v as u16).to_le_bytes())?,
            IndexWidth::U32 => writer.write_all(&v.to_le_bytes())?,
        }
    }
    Ok(())
}

fn read_values<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u32>> {
    let mut tag = [0u8; 1];
    reader.read_exact(&mut tag)?;
    let width = IndexWidth::from_bytes(tag[0]).with_context(|| format!("invalid value width {}", tag[0]))?;
    let nbytes = len.checked_mul(width.bytes() as usize).context("value data too large")?;
    let raw = read_exact_vec(reader, nbytes)?;

    Ok(match width {
        IndexWidth::U8 => raw.into_iter().map(u32::from).collect(),
        IndexWidth::U16 => raw.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]]) as u32).collect(),
        IndexWidth::U32 => raw.chunks_exact(4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect(),
    })
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(len as u64).read_to_end(&mut buf)?;
    ensure!(buf.len() == len, "unexpected end of data: wanted {len} bytes, got {}", buf.len());
    Ok(buf)
}

impl<K: PolyKey> GridPolyConv<K> {
    /// Serialize with a gzip-compressed payload.
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(write_conv_bytes(self, true)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(read_conv_bytes(bytes)?)
    }

    pub fn write_to_path(&self, path: &Path) -> crate::Result<()> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read_from_path(path: &Path) -> crate::Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
