//! A copy-on-write overlay that turns any readable stream into a writable one.
//!
//! Writes to a [`TransactionStream`] are kept in memory as *patches* keyed by address and never
//! reach the backing stream until [`TransactionStream::apply_changes`] is called. Reads see the
//! backing bytes with the patches laid over them.
//!
//! ```rust
//! use layoutio::TransactionStream;
//! use std::io::{Cursor, Read, Seek, SeekFrom, Write};
//!
//! let mut stream = TransactionStream::new(Cursor::new(b"XXXXXX".to_vec()))?;
//! stream.seek(SeekFrom::Start(2))?;
//! stream.write_all(b"AB")?;
//!
//! let mut head = [0u8; 4];
//! stream.seek(SeekFrom::Start(0))?;
//! stream.read_exact(&mut head)?;
//! assert_eq!(&head, b"XXAB");
//!
//! stream.discard_changes();
//! stream.read_exact(&mut head)?;
//! assert_eq!(&head, b"XXXX");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{CodecError, Result};
use crate::io::{read_up_to, stream_len};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, trace};

/// Buffers writes over a backing stream until they are applied or discarded.
#[derive(Debug)]
pub struct TransactionStream<S> {
    source: S,
    /// Non-overlapping, non-adjacent patches keyed by start address.
    patches: BTreeMap<u64, Vec<u8>>,
    length: u64,
    source_len: u64,
    position: u64,
}

/// End address of a patch. Writes are checked before they become patches, so this cannot
/// overflow.
fn patch_end(start: u64, bytes: &[u8]) -> u64 {
    start + bytes.len() as u64
}

/// Writes each patch at its address, then restores the destination's position.
fn write_patches<D: Write + Seek + ?Sized>(
    patches: &BTreeMap<u64, Vec<u8>>,
    destination: &mut D,
) -> Result<()> {
    let restore = destination.stream_position()?;
    for (address, bytes) in patches {
        destination.seek(SeekFrom::Start(*address))?;
        destination.write_all(bytes)?;
    }
    destination.seek(SeekFrom::Start(restore))?;
    Ok(())
}

impl<S: Read + Seek> TransactionStream<S> {
    /// Wraps `source`. Its current length becomes the logical length.
    pub fn new(mut source: S) -> Result<Self> {
        let source_len = stream_len(&mut source)?;
        Ok(Self {
            source,
            patches: BTreeMap::new(),
            length: source_len,
            source_len,
            position: 0,
        })
    }

    /// Logical length: the backing length, extended by writes past it or changed by
    /// [`Self::set_len`].
    pub fn len(&self) -> u64 {
        self.length
    }

    /// Logical length is zero.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Sets the logical length. Reads are clamped to it; the backing stream is unaffected.
    pub fn set_len(&mut self, len: u64) {
        self.length = len;
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether any writes are pending.
    pub fn has_changes(&self) -> bool {
        !self.patches.is_empty()
    }

    /// Number of pending patches after coalescing.
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }

    /// Shared access to the backing stream.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Releases the backing stream. Pending changes are dropped.
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Drops all pending changes and rewinds to the start.
    pub fn discard_changes(&mut self) {
        debug!(patches = self.patches.len(), "discarding pending changes");
        self.patches.clear();
        self.length = self.source_len;
        self.position = 0;
    }

    /// Writes every pending patch to `destination` at its address and clears the patch set.
    /// The destination's position is restored afterwards.
    pub fn apply_changes_to<D: Write + Seek + ?Sized>(&mut self, destination: &mut D) -> Result<()> {
        write_patches(&self.patches, destination)?;
        debug!(patches = self.patches.len(), "applied pending changes");
        self.patches.clear();
        Ok(())
    }

    /// Merges this stream's pending patches into `target`. Where they overlap, this stream's
    /// bytes win. Neither backing stream is touched.
    pub fn copy_changes<T: Read + Seek>(&self, target: &mut TransactionStream<T>) {
        for (address, bytes) in &self.patches {
            target.insert_patch(*address, bytes);
        }
    }

    /// Records `bytes` at `address`, merging with every patch it overlaps or touches.
    fn insert_patch(&mut self, address: u64, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let end = patch_end(address, bytes);

        let merged: Vec<u64> = self
            .patches
            .range(..=end)
            .rev()
            .take_while(|(start, existing)| patch_end(**start, existing) >= address)
            .map(|(start, _)| *start)
            .collect();

        if merged.is_empty() {
            self.patches.insert(address, bytes.to_vec());
        } else {
            let begin = merged.iter().copied().min().unwrap_or(address).min(address);
            let mut combined_end = end;
            let mut old = Vec::with_capacity(merged.len());
            for start in &merged {
                if let Some(existing) = self.patches.remove(start) {
                    combined_end = combined_end.max(patch_end(*start, &existing));
                    old.push((*start, existing));
                }
            }
            let mut patch = vec![0u8; (combined_end - begin) as usize];
            for (start, existing) in old {
                let at = (start - begin) as usize;
                patch[at..at + existing.len()].copy_from_slice(&existing);
            }
            let at = (address - begin) as usize;
            patch[at..at + bytes.len()].copy_from_slice(bytes);
            trace!(
                address = begin,
                len = patch.len(),
                merged = merged.len(),
                "coalesced patch"
            );
            self.patches.insert(begin, patch);
        }

        self.length = self.length.max(end);
    }

    /// Reads at the current position: backing bytes first, then patch bytes past the end of the
    /// backing stream, stopping at the first byte neither can supply. Patches are then laid over
    /// the result.
    fn read_inner(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = self.position;
        let wanted = self.length.saturating_sub(start).min(buf.len() as u64);
        if wanted == 0 {
            return Ok(0);
        }
        let limit = start + wanted;

        // Backing bytes.
        let mut covered = start;
        if start < self.source_len {
            let from_source = (self.source_len.min(limit) - start) as usize;
            self.source.seek(SeekFrom::Start(start))?;
            covered += read_up_to(&mut self.source, &mut buf[..from_source])? as u64;
        }

        // Patches continue the readable range past the backing end.
        while covered < limit {
            let next = self
                .patches
                .range(..=covered)
                .next_back()
                .map(|(s, bytes)| patch_end(*s, bytes))
                .filter(|end| *end > covered);
            match next {
                Some(end) => covered = end.min(limit),
                None => break,
            }
        }
        if covered == start {
            return Ok(0);
        }

        // Overlay.
        let first = self
            .patches
            .range(..=start)
            .next_back()
            .map_or(start, |(s, _)| *s);
        for (address, bytes) in self.patches.range(first..covered) {
            let end = patch_end(*address, bytes);
            if end <= start {
                continue;
            }
            let lo = (*address).max(start);
            let hi = end.min(covered);
            let (src, dst, n) = (
                (lo - address) as usize,
                (lo - start) as usize,
                (hi - lo) as usize,
            );
            buf[dst..dst + n].copy_from_slice(&bytes[src..src + n]);
        }

        let read = covered - start;
        self.position = covered;
        Ok(read as usize)
    }
}

impl<S: Read + Write + Seek> TransactionStream<S> {
    /// Writes every pending patch to the backing stream and clears the patch set.
    ///
    /// On failure the patches are kept, so the call can be retried.
    pub fn apply_changes(&mut self) -> Result<()> {
        write_patches(&self.patches, &mut self.source)?;
        self.source.flush()?;
        debug!(patches = self.patches.len(), "applied pending changes to the source");
        self.patches.clear();
        self.source_len = stream_len(&mut self.source)?;
        Ok(())
    }
}

impl<S: Read + Seek> Read for TransactionStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_inner(buf)?)
    }
}

impl<S: Read + Seek> Write for TransactionStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.position.checked_add(buf.len() as u64).ok_or_else(|| {
            CodecError::bounds(format!(
                "write of {} bytes at {} overflows the stream",
                buf.len(),
                self.position
            ))
        })?;
        self.insert_patch(self.position, buf);
        self.position = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: Read + Seek> Seek for TransactionStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(delta) => i128::from(self.length) + i128::from(delta),
            SeekFrom::Current(delta) => i128::from(self.position) + i128::from(delta),
        };
        self.position = u64::try_from(target).map_err(|_| {
            CodecError::bounds(format!("seek to {target} is before the start of the stream"))
        })?;
        Ok(self.position)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}
