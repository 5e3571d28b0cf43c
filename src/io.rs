//! Low-level stream helpers shared by the codec and the stream adapters.

use crate::error::{CodecError, Result};
use std::io::{self, Read, Seek, SeekFrom};

/// Reads until `buf` is full or the stream ends, returning the number of bytes read.
///
/// Unlike `Read::read_exact`, hitting the end of the stream early is not an error.
pub fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Length of a seekable stream. The stream position is left unchanged.
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> io::Result<u64> {
    let current = stream.stream_position()?;
    let end = stream.seek(SeekFrom::End(0))?;
    if current != end {
        stream.seek(SeekFrom::Start(current))?;
    }
    Ok(end)
}

/// Resolves `pos` against a view whose address zero is `origin`, returning the absolute target.
/// The stream is not moved.
///
/// # Errors
/// [`CodecError::Bounds`] if the target lies before `origin` or outside `u64`.
pub fn seek_target<S: Seek + ?Sized>(stream: &mut S, origin: u64, pos: SeekFrom) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => origin.checked_add(offset),
        SeekFrom::Current(delta) => stream.stream_position()?.checked_add_signed(delta),
        SeekFrom::End(delta) => stream_len(stream)?.checked_add_signed(delta),
    };
    target.filter(|t| *t >= origin).ok_or_else(|| {
        CodecError::bounds(format!("seek {pos:?} leaves the view starting at {origin}"))
    })
}
