#![allow(missing_docs)]

use layoutio::{ByteOrder, EndianReader, EndianWriter, Structure, TransactionStream};
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

/// 255 bytes counting up from zero.
fn counting() -> TransactionStream<Cursor<Vec<u8>>> {
    TransactionStream::new(Cursor::new((0..255u8).collect())).unwrap()
}

fn read_at<S: Read + Seek>(stream: &mut TransactionStream<S>, at: u64, len: usize) -> Vec<u8> {
    stream.seek(SeekFrom::Start(at)).unwrap();
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).unwrap();
    buf
}

fn write_at<S: Read + Seek>(stream: &mut TransactionStream<S>, at: u64, bytes: &[u8]) {
    stream.seek(SeekFrom::Start(at)).unwrap();
    stream.write_all(bytes).unwrap();
}

/// Two patches: descending runs at 5..10 and 20..25.
fn patched() -> TransactionStream<Cursor<Vec<u8>>> {
    let mut stream = counting();
    write_at(&mut stream, 5, &[9, 8, 7, 6, 5]);
    assert_eq!(stream.position(), 10);
    write_at(&mut stream, 20, &[24, 23, 22, 21, 20]);
    assert_eq!(stream.position(), 25);
    stream
}

fn expected_patched() -> Vec<u8> {
    let mut expected: Vec<u8> = (0..255u8).collect();
    expected[5..10].copy_from_slice(&[9, 8, 7, 6, 5]);
    expected[20..25].copy_from_slice(&[24, 23, 22, 21, 20]);
    expected
}

#[test]
fn test_full_read_sees_patches() {
    let mut stream = patched();
    assert_eq!(stream.len(), 255);
    assert_eq!(read_at(&mut stream, 0, 255), expected_patched());
    assert_eq!(stream.position(), 255);
    // The backing bytes are untouched.
    assert_eq!(stream.get_ref().get_ref()[5], 5);
}

#[test]
fn test_reads_aligned_to_patch_edges() {
    let mut stream = patched();
    let expected = expected_patched();
    for (at, len) in [(5, 5), (5, 10), (0, 10), (5, 20)] {
        assert_eq!(read_at(&mut stream, at, len), &expected[at as usize..at as usize + len]);
        assert_eq!(stream.position(), at + len as u64);
    }
}

#[test]
fn test_reads_starting_or_ending_inside_patches() {
    let mut stream = patched();
    let expected = expected_patched();
    for (at, len) in [(6, 3), (7, 8), (0, 8), (7, 16), (22, 1)] {
        assert_eq!(read_at(&mut stream, at, len), &expected[at as usize..at as usize + len]);
    }
}

#[test]
fn test_writes_past_end_extend_length() {
    let mut stream = TransactionStream::new(Cursor::new(b"abc".to_vec())).unwrap();
    write_at(&mut stream, 3, b"de");
    assert_eq!(stream.len(), 5);

    let mut all = Vec::new();
    stream.seek(SeekFrom::Start(0)).unwrap();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, b"abcde");
}

#[test]
fn test_read_stops_at_gap_past_backing_end() {
    let mut stream = TransactionStream::new(Cursor::new(b"abc".to_vec())).unwrap();
    write_at(&mut stream, 6, b"xy");
    assert_eq!(stream.len(), 8);

    stream.seek(SeekFrom::Start(1)).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(stream.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"bc");
    assert_eq!(stream.read(&mut buf).unwrap(), 0);

    stream.seek(SeekFrom::Start(6)).unwrap();
    assert_eq!(stream.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"xy");
}

#[test]
fn test_overlapping_and_adjacent_writes_coalesce() {
    let mut stream = counting();
    write_at(&mut stream, 10, &[0xA; 4]);
    write_at(&mut stream, 20, &[0xB; 4]);
    assert_eq!(stream.patch_count(), 2);

    // Adjacent to the first patch.
    write_at(&mut stream, 14, &[0xC; 2]);
    assert_eq!(stream.patch_count(), 2);

    // Bridges both.
    write_at(&mut stream, 12, &[0xD; 10]);
    assert_eq!(stream.patch_count(), 1);

    let mut expected: Vec<u8> = (0..255u8).collect();
    expected[10..12].fill(0xA);
    expected[12..22].fill(0xD);
    expected[22..24].fill(0xB);
    assert_eq!(read_at(&mut stream, 0, 255), expected);
}

#[test]
fn test_discard_restores_source_view() {
    let mut stream = patched();
    write_at(&mut stream, 300, b"tail");
    assert_eq!(stream.len(), 304);
    assert!(stream.has_changes());

    stream.discard_changes();
    assert!(!stream.has_changes());
    assert_eq!(stream.len(), 255);
    assert_eq!(stream.position(), 0);
    assert_eq!(read_at(&mut stream, 0, 255), (0..255u8).collect::<Vec<_>>());
}

#[test]
fn test_apply_changes_to_source() {
    let mut stream = patched();
    stream.apply_changes().unwrap();
    assert!(!stream.has_changes());
    assert_eq!(stream.get_ref().get_ref(), &expected_patched());
    assert_eq!(read_at(&mut stream, 0, 255), expected_patched());
}

#[test]
fn test_apply_changes_to_other_destination() {
    let mut stream = patched();
    let mut destination = Cursor::new(vec![0u8; 30]);
    destination.set_position(3);
    stream.apply_changes_to(&mut destination).unwrap();

    assert_eq!(destination.position(), 3);
    let bytes = destination.into_inner();
    assert_eq!(&bytes[5..10], &[9, 8, 7, 6, 5]);
    assert_eq!(&bytes[20..25], &[24, 23, 22, 21, 20]);
    assert_eq!(bytes[0], 0);
    assert!(!stream.has_changes());
}

#[test]
fn test_copy_changes_prefers_source_bytes() {
    let source = patched();
    let mut target = counting();
    write_at(&mut target, 8, &[0xEE; 4]);
    write_at(&mut target, 250, &[0xFF; 10]);

    source.copy_changes(&mut target);
    assert!(source.has_changes());
    assert_eq!(target.len(), 260);

    let mut expected = expected_patched();
    expected[10..12].fill(0xEE);
    expected[250..].fill(0xFF);
    expected.extend_from_slice(&[0xFF; 5]);
    assert_eq!(read_at(&mut target, 0, 260), expected);
}

#[test]
fn test_set_len_clamps_reads() {
    let mut stream = counting();
    stream.set_len(4);
    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, [0, 1, 2, 3]);
}

#[test]
fn test_negative_seek_is_rejected() {
    let mut stream = counting();
    let err = stream.seek(SeekFrom::Current(-1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(stream.seek(SeekFrom::End(-5)).unwrap(), 250);
}

#[test]
fn test_write_past_address_space_is_rejected() {
    let mut stream = counting();
    stream.seek(SeekFrom::Start(u64::MAX - 1)).unwrap();
    let err = stream.write_all(&[1, 2, 3, 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(stream.patch_count(), 0);
    assert_eq!(stream.len(), 255);

    // The last two addresses are still writable.
    stream.write_all(&[1, 2]).unwrap();
    assert_eq!(stream.len(), u64::MAX);
}

#[derive(Debug, Default, PartialEq, Structure)]
struct Entry {
    #[layout(offset = 0)]
    id: u16,
    #[layout(offset = 2, byte_order = "big")]
    value: u32,
}

#[test]
fn test_structures_over_a_read_only_source() {
    // `&[u8]` cursors cannot be written; the overlay makes them editable.
    let bytes = [1u8, 0, 0, 0, 0, 2];
    let stream = TransactionStream::new(Cursor::new(&bytes[..])).unwrap();
    let mut writer = EndianWriter::new(stream, ByteOrder::LittleEndian);
    writer.write_object(&Entry { id: 7, value: 0x0102_0304 }).unwrap();

    let mut stream = writer.into_inner();
    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut reader = EndianReader::new(stream, ByteOrder::LittleEndian);
    assert_eq!(
        reader.read_object::<Entry>().unwrap(),
        Entry { id: 7, value: 0x0102_0304 }
    );
    assert_eq!(bytes, [1, 0, 0, 0, 0, 2]);
}
