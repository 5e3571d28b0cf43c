//! Pluggable decompression backends for [`crate::ChunkedStream`].
//!
//! A [`Decompressor`] turns one compressed chunk into exactly `uncompressed_size` bytes. The
//! chunk stream checks the size afterwards, so implementations only need to report codec
//! failures.

use crate::error::{CodecError, Result};

/// Interface for chunk decompression algorithms.
pub trait Decompressor: Send + Sync + std::fmt::Debug {
    /// Short algorithm name used in log output and error messages.
    fn name(&self) -> &'static str;

    /// Replaces the contents of `out` with the decompressed form of `data`.
    ///
    /// `uncompressed_size` is the size recorded in the chunk table and may be used to size
    /// `out` up front.
    fn decompress(&self, data: &[u8], uncompressed_size: usize, out: &mut Vec<u8>) -> Result<()>;
}

impl<D: Decompressor + ?Sized> Decompressor for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn decompress(&self, data: &[u8], uncompressed_size: usize, out: &mut Vec<u8>) -> Result<()> {
        (**self).decompress(data, uncompressed_size, out)
    }
}

// --- Pass-through ---

/// Treats every chunk as already decompressed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Decompressor for NoCompression {
    fn name(&self) -> &'static str {
        "none"
    }

    fn decompress(&self, data: &[u8], _uncompressed_size: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.extend_from_slice(data);
        Ok(())
    }
}

// --- Zlib ---

#[cfg(feature = "flate2")]
/// Zlib-wrapped deflate, via `flate2`.
///
/// Available when the `flate2` feature is enabled (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibDecompressor;

#[cfg(feature = "flate2")]
impl Decompressor for ZlibDecompressor {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decompress(&self, data: &[u8], uncompressed_size: usize, out: &mut Vec<u8>) -> Result<()> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        out.clear();
        out.reserve(uncompressed_size);
        // One byte past the expected size is enough to detect a mismatch.
        ZlibDecoder::new(data)
            .take(uncompressed_size as u64 + 1)
            .read_to_end(out)
            .map_err(|e| CodecError::Compression(format!("zlib: {e}")))?;
        Ok(())
    }
}

// --- LZ4 ---

#[cfg(feature = "lz4_flex")]
/// Raw LZ4 blocks, via `lz4_flex`.
///
/// Available when the `lz4_flex` feature is enabled. Blocks carry no size prefix; the size
/// comes from the chunk table.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Decompressor;

#[cfg(feature = "lz4_flex")]
impl Decompressor for Lz4Decompressor {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn decompress(&self, data: &[u8], uncompressed_size: usize, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        out.resize(uncompressed_size, 0);
        match lz4_flex::block::decompress_into(data, out) {
            Ok(written) => {
                out.truncate(written);
                Ok(())
            }
            Err(e) => {
                out.clear();
                Err(CodecError::Compression(format!("lz4: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_through_replaces_output() {
        let mut out = vec![9, 9, 9, 9];
        NoCompression.decompress(b"ab", 2, &mut out).unwrap();
        assert_eq!(out, b"ab");
    }

    #[cfg(feature = "flate2")]
    #[test]
    fn zlib_rejects_garbage() {
        let mut out = Vec::new();
        let err = ZlibDecompressor
            .decompress(&[0xde, 0xad, 0xbe, 0xef], 4, &mut out)
            .unwrap_err();
        assert!(matches!(err, CodecError::Compression(_)));
    }

    #[cfg(feature = "flate2")]
    #[test]
    fn zlib_stops_one_byte_past_expected_size() {
        use flate2::Compression;
        use flate2::write::ZlibEncoder;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&[0u8; 64 * 1024]).unwrap();
        let packed = encoder.finish().unwrap();

        let mut out = Vec::new();
        ZlibDecompressor.decompress(&packed, 16, &mut out).unwrap();
        assert_eq!(out.len(), 17);
    }

    #[cfg(feature = "lz4_flex")]
    #[test]
    fn lz4_block_round_trip() {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbbbbbbbb".to_vec();
        let packed = lz4_flex::block::compress(&data);
        let mut out = Vec::new();
        Lz4Decompressor.decompress(&packed, data.len(), &mut out).unwrap();
        assert_eq!(out, data);
    }
}
