#![allow(missing_docs)]

use flate2::Compression;
use flate2::write::ZlibEncoder;
use layoutio::{
    ByteOrder, ChunkLocator, ChunkTable, ChunkedStream, CodecError, EndianReader, NoCompression,
    ZlibDecompressor,
};
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Builds a backing stream from `(data, compress)` pairs and the matching table.
fn chunked(parts: &[(Vec<u8>, bool)]) -> (Vec<u8>, Vec<ChunkLocator>) {
    let mut backing = vec![0xFF; 3];
    let mut table = Vec::new();
    for (data, compress) in parts {
        let offset = backing.len() as u64;
        if *compress {
            let packed = zlib(data);
            table.push(ChunkLocator::compressed(
                offset,
                packed.len() as u64,
                data.len() as u64,
            ));
            backing.extend_from_slice(&packed);
        } else {
            table.push(ChunkLocator::stored(offset, data.len() as u64));
            backing.extend_from_slice(data);
        }
    }
    (backing, table)
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

#[test]
fn test_read_across_chunk_boundary() {
    let a = pattern(100, 0);
    let b = pattern(50, 100);
    let (backing, table) = chunked(&[(a.clone(), true), (b.clone(), true)]);
    let mut stream = ChunkedStream::new(Cursor::new(backing), table, ZlibDecompressor);

    assert_eq!(stream.len().unwrap(), 150);
    stream.seek(SeekFrom::Start(90)).unwrap();
    let mut buf = vec![0u8; 120];
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(n, 60);
    assert_eq!(&buf[..10], &a[90..]);
    assert_eq!(&buf[10..60], &b[..]);
    assert_eq!(stream.position(), 150);
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_stored_and_compressed_chunks_mix() {
    let parts = [
        (pattern(10, 1), false),
        (pattern(30, 2), true),
        (pattern(5, 3), false),
    ];
    let expected: Vec<u8> = parts.iter().flat_map(|(d, _)| d.clone()).collect();
    let (backing, table) = chunked(&parts);
    let mut stream = ChunkedStream::new(Cursor::new(backing), table, ZlibDecompressor);

    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, expected);
    assert_eq!(stream.chunk_count().unwrap(), 3);

    // Backwards seeks land in earlier chunks.
    stream.seek(SeekFrom::End(-40)).unwrap();
    let mut byte = [0u8; 1];
    stream.read_exact(&mut byte).unwrap();
    assert_eq!(byte[0], expected[5]);
}

#[test]
fn test_seek_bounds() {
    let (backing, table) = chunked(&[(pattern(8, 0), false)]);
    let mut stream = ChunkedStream::new(Cursor::new(backing), table, NoCompression);

    assert_eq!(stream.seek(SeekFrom::Start(8)).unwrap(), 8);
    let err = stream.seek(SeekFrom::Start(9)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = stream.seek(SeekFrom::Current(-20)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    // A failed seek leaves the position alone.
    assert_eq!(stream.position(), 8);
}

#[test]
fn test_writes_are_unsupported() {
    let (backing, table) = chunked(&[(pattern(4, 0), false)]);
    let mut stream = ChunkedStream::new(Cursor::new(backing), table, NoCompression);
    assert_eq!(stream.write(b"x").unwrap_err().kind(), ErrorKind::Unsupported);
    assert_eq!(stream.flush().unwrap_err().kind(), ErrorKind::Unsupported);
    assert!(stream.set_len(0).unwrap_err().is_unsupported());
}

#[test]
fn test_size_mismatch_is_compression_error() {
    let data = pattern(16, 0);
    let packed = zlib(&data);
    let table = vec![ChunkLocator::compressed(0, packed.len() as u64, 20)];
    let mut stream = ChunkedStream::new(Cursor::new(packed), table, ZlibDecompressor);

    let mut reader = EndianReader::new(&mut stream, ByteOrder::LittleEndian);
    assert!(matches!(reader.read_u32(), Err(CodecError::Compression(_))));
}

/// A table stored in the backing stream itself: a `u32` count, then `(offset, size)` pairs.
struct HeaderTable;

impl ChunkTable<Cursor<Vec<u8>>> for HeaderTable {
    fn read_chunks(&mut self, base: &mut Cursor<Vec<u8>>) -> layoutio::Result<Vec<ChunkLocator>> {
        let mut reader = EndianReader::new(base, ByteOrder::LittleEndian);
        let count = reader.read_u32()?;
        (0..count)
            .map(|_| -> layoutio::Result<ChunkLocator> {
                let offset = reader.read_u32()?;
                let size = reader.read_u32()?;
                Ok(ChunkLocator::stored(u64::from(offset), u64::from(size)))
            })
            .collect()
    }
}

#[test]
fn test_table_is_read_lazily() {
    let mut backing = Vec::new();
    backing.extend_from_slice(&2u32.to_le_bytes());
    backing.extend_from_slice(&20u32.to_le_bytes());
    backing.extend_from_slice(&3u32.to_le_bytes());
    backing.extend_from_slice(&23u32.to_le_bytes());
    backing.extend_from_slice(&2u32.to_le_bytes());
    backing.extend_from_slice(b"abcde");

    let mut stream = ChunkedStream::new(Cursor::new(backing), HeaderTable, NoCompression);
    assert!(!stream.is_initialized());

    let mut text = String::new();
    stream.read_to_string(&mut text).unwrap();
    assert_eq!(text, "abcde");
    assert!(stream.is_initialized());

    stream.seek(SeekFrom::Start(1)).unwrap();
    let mut reader = EndianReader::new(&mut stream, ByteOrder::BigEndian);
    assert_eq!(reader.read_u16().unwrap(), u16::from_be_bytes([b'b', b'c']));
    drop(reader);
    // Going back re-materialized the first chunk.
    assert_eq!(stream.into_inner().position(), 23);
}

#[test]
fn test_empty_table() {
    let mut stream = ChunkedStream::new(
        Cursor::new(Vec::<u8>::new()),
        Vec::<ChunkLocator>::new(),
        NoCompression,
    );
    assert!(stream.is_empty().unwrap());
    let mut buf = [0u8; 4];
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
}
