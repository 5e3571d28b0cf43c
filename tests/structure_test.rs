#![allow(missing_docs)]

use layoutio::engine::{self, plan};
use layoutio::{
    ByteOrder, CodecConfig, CodecError, EndianReader, EndianWriter, LayoutEnum, LayoutError,
    Structure,
};
use proptest::prelude::*;
use std::io::Cursor;

// --- MOCK DATA STRUCTURES ---

#[derive(Debug, Default, Clone, Copy, PartialEq, LayoutEnum)]
#[repr(u16)]
enum Mode {
    #[default]
    Off = 0,
    On = 1,
    Auto = 7,
}

#[derive(Debug, Default, Clone, PartialEq, Structure)]
struct Point {
    #[layout(offset = 0)]
    x: i16,
    #[layout(offset = 2)]
    y: i16,
}

#[derive(Debug, Default, Clone, PartialEq, Structure)]
#[layout(fixed_size = 32)]
struct Record {
    #[layout(offset = 0)]
    id: u32,
    #[layout(offset = 4, store = "u8")]
    mode: Mode,
    #[layout(offset = 5, byte_order = "big")]
    flags: u16,
    #[layout(offset = 8, byte_order = "big")]
    origin: Point,
    #[layout(offset = 12, fixed_length = 8, trim, pad = ' ')]
    label: String,
    #[layout(offset = 20)]
    weight: Option<f32>,
    #[layout(offset = 24, store = "u16")]
    total: i64,
    // Not part of the layout.
    cached: Option<String>,
}

fn sample() -> Record {
    Record {
        id: 0xDEAD_BEEF,
        mode: Mode::Auto,
        flags: 0x0102,
        origin: Point { x: -1, y: 300 },
        label: "sensor".into(),
        weight: Some(2.5),
        total: 65_535,
        cached: None,
    }
}

fn write_le<T: Structure>(value: &T) -> Vec<u8> {
    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
    writer.write_object(value).unwrap();
    writer.into_inner().into_inner()
}

fn read_le<T: Structure>(bytes: Vec<u8>) -> layoutio::Result<T> {
    EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian).read_object()
}

// --- TESTS ---

#[test]
fn test_record_wire_format() {
    let bytes = write_le(&sample());
    assert_eq!(bytes.len(), 32);
    assert_eq!(&bytes[0..4], &[0xEF, 0xBE, 0xAD, 0xDE]);
    assert_eq!(bytes[4], 7);
    assert_eq!(&bytes[5..7], &[0x01, 0x02]);
    assert_eq!(bytes[7], 0);
    // The nested point takes the field's big-endian order as its ambient order.
    assert_eq!(&bytes[8..12], &[0xFF, 0xFF, 0x01, 0x2C]);
    assert_eq!(&bytes[12..20], b"sensor  ");
    assert_eq!(&bytes[24..26], &[0xFF, 0xFF]);
    assert!(bytes[26..].iter().all(|b| *b == 0));
}

#[test]
fn test_record_round_trip() {
    let original = sample();
    let decoded: Record = read_le(write_le(&original)).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn test_none_writes_default() {
    let record = Record {
        weight: None,
        ..sample()
    };
    let decoded: Record = read_le(write_le(&record)).unwrap();
    assert_eq!(decoded.weight, Some(0.0));
}

#[test]
fn test_fields_without_offset_keep_defaults() {
    let decoded: Record = read_le(write_le(&Record {
        cached: Some("ignored".into()),
        ..sample()
    }))
    .unwrap();
    assert_eq!(decoded.cached, None);
}

#[test]
fn test_fixed_size_positions_cursor() {
    let mut bytes = write_le(&sample());
    bytes.extend_from_slice(&[0xAB, 0xCD]);
    let mut reader = EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian);
    let _: Record = reader.read_object().unwrap();
    assert_eq!(reader.position().unwrap(), 32);
    assert_eq!(reader.read_u8().unwrap(), 0xAB);
}

#[test]
fn test_consecutive_objects() {
    let records = vec![sample(), Record { id: 2, ..sample() }];
    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
    writer.write_objects(&records, None).unwrap();
    let bytes = writer.into_inner().into_inner();
    assert_eq!(bytes.len(), 64);

    let mut reader = EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian);
    let decoded: Vec<Record> = reader.read_objects(2, None).unwrap();
    assert_eq!(decoded, records);
}

#[test]
fn test_unknown_enum_value() {
    let mut bytes = write_le(&sample());
    bytes[4] = 3;
    match read_le::<Record>(bytes) {
        Err(CodecError::Conversion { field, from, to }) => {
            assert_eq!(field, "mode");
            assert_eq!(from, "u16");
            assert_eq!(to, "Mode");
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_ambient_order_applies_without_override() {
    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::BigEndian);
    writer.write_object(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(writer.into_inner().into_inner(), [0, 1, 0, 2]);
}

// --- STORED TYPE CONVERSIONS ---

#[derive(Debug, Default, PartialEq, Structure)]
struct Narrow {
    #[layout(offset = 0, store = "u16")]
    value: u8,
}

#[derive(Debug, Default, PartialEq, Structure)]
struct Widened {
    #[layout(offset = 0, store = "u8")]
    value: u32,
}

#[derive(Debug, Default, PartialEq, Structure)]
struct HalfStored {
    #[layout(offset = 0, store = "f16")]
    value: f32,
}

#[test]
fn test_lossy_read_is_conversion_error() {
    assert_eq!(read_le::<Narrow>(vec![200, 0]).unwrap().value, 200);
    let err = read_le::<Narrow>(vec![0x2C, 0x01]).unwrap_err();
    assert!(matches!(err, CodecError::Conversion { from: "u16", to: "u8", .. }));
}

#[test]
fn test_lossy_write_is_conversion_error() {
    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
    let err = writer.write_object(&Widened { value: 300 }).unwrap_err();
    assert!(matches!(err, CodecError::Conversion { from: "u32", to: "u8", .. }));
    assert_eq!(write_le(&Widened { value: 255 }), [255]);
}

#[test]
fn test_half_float_storage() {
    let bytes = write_le(&HalfStored { value: 1.0 });
    assert_eq!(bytes, [0x00, 0x3C]);
    assert_eq!(read_le::<HalfStored>(bytes).unwrap().value, 1.0);

    let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
    assert!(writer.write_object(&HalfStored { value: 0.1 }).is_err());
}

// --- DATA LENGTH ---

#[derive(Debug, Default, PartialEq, Structure)]
#[layout(fixed_size = 16)]
struct Block {
    #[layout(offset = 0, data_length)]
    size: i16,
    #[layout(offset = 2)]
    tag: u8,
}

#[test]
fn test_data_length_moves_cursor() {
    let bytes = vec![6, 0, 7, 9, 9, 9, 0xAB];
    let mut reader = EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian);
    let block: Block = reader.read_object().unwrap();
    assert_eq!(block, Block { size: 6, tag: 7 });
    // The data length takes precedence over the fixed size.
    assert_eq!(reader.position().unwrap(), 6);
    assert_eq!(reader.read_u8().unwrap(), 0xAB);
}

#[test]
fn test_data_length_pads_on_write() {
    assert_eq!(write_le(&Block { size: 5, tag: 1 }), [5, 0, 1, 0, 0]);
}

#[test]
fn test_negative_data_length_is_rejected() {
    let err = read_le::<Block>(vec![0xFF, 0xFF, 1]).unwrap_err();
    assert!(matches!(
        err.as_layout(),
        Some(LayoutError::InvalidDataLength { field, .. }) if field == "size"
    ));
}

#[test]
fn test_zero_data_length_is_rejected() {
    let err = read_le::<Block>(vec![0, 0, 1]).unwrap_err();
    assert!(matches!(
        err.as_layout(),
        Some(LayoutError::InvalidDataLength { field, .. }) if field == "size"
    ));
}

// --- STRINGS ---

#[derive(Debug, Default, PartialEq, Structure)]
struct Names {
    #[layout(offset = 0, null_terminated, max_length = 6)]
    short: String,
    #[layout(offset = 6, length_prefixed)]
    long: String,
    #[layout(offset = 20, null_terminated)]
    tail: String,
}

#[test]
fn test_string_rules_in_layout() {
    let names = Names {
        short: "abc".into(),
        long: "prefixed".into(),
        tail: "end".into(),
    };
    let bytes = write_le(&names);
    assert_eq!(&bytes[..6], b"abc\0\0\0");
    assert_eq!(&bytes[6..10], &[8, 0, 0, 0]);
    assert_eq!(&bytes[10..18], b"prefixed");
    assert_eq!(&bytes[18..20], &[0, 0]);
    assert_eq!(&bytes[20..], b"end\0");
    assert_eq!(read_le::<Names>(bytes).unwrap(), names);
}

// --- LAYOUT DEFECTS ---

#[derive(Debug, Default, Structure)]
struct Ambiguous {
    #[layout(offset = 0, min_version = 1.0)]
    #[layout(offset = 4, min_version = 2.0)]
    value: u32,
}

#[derive(Debug, Default, Structure)]
struct Unframed {
    #[layout(offset = 0)]
    name: String,
}

#[test]
fn test_overlapping_offsets_fail_every_time() {
    for _ in 0..2 {
        let mut reader = EndianReader::new(Cursor::new(vec![0u8; 8]), ByteOrder::LittleEndian);
        let err = reader.read_object_versioned::<Ambiguous>(3.0).unwrap_err();
        assert!(matches!(
            err.as_layout(),
            Some(LayoutError::AmbiguousLayout { owner, .. }) if owner == "Ambiguous"
        ));
    }
}

#[test]
fn test_string_without_rule_is_rejected() {
    let err = read_le::<Unframed>(vec![0; 4]).unwrap_err();
    assert!(matches!(
        err.as_layout(),
        Some(LayoutError::UnsupportedStringRule { field, .. }) if field == "name"
    ));
}

// --- PLAN CACHE ---

#[derive(Debug, Default, Clone, PartialEq, Structure)]
struct Cached {
    #[layout(offset = 0)]
    a: u32,
    #[layout(offset = 6, max_version = 5.0, since = 2.0)]
    #[layout(offset = 4, min_version = 5.0)]
    b: u16,
}

#[test]
fn test_compiled_and_uncached_agree() {
    let value = Cached { a: 9, b: 0x1234 };
    let expected: [&[u8]; 4] = [
        &[9, 0, 0, 0],
        &[9, 0, 0, 0],
        &[9, 0, 0, 0, 0, 0, 0x34, 0x12],
        &[9, 0, 0, 0, 0x34, 0x12],
    ];
    for (version, expected) in [None, Some(1.0), Some(3.0), Some(5.0)].into_iter().zip(expected) {
        let mut compiled = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
        engine::write(&mut compiled, &value, version).unwrap();
        let mut uncached = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
        engine::write_uncached(&mut uncached, &value, version).unwrap();
        let compiled = compiled.into_inner().into_inner();
        assert_eq!(compiled, expected);
        assert_eq!(compiled, uncached.into_inner().into_inner());

        let mut reader = EndianReader::new(Cursor::new(compiled.clone()), ByteOrder::LittleEndian);
        let a: Cached = engine::populate(&mut reader, version).unwrap();
        let mut reader = EndianReader::new(Cursor::new(compiled), ByteOrder::LittleEndian);
        let b: Cached = engine::populate_uncached(&mut reader, version).unwrap();
        assert_eq!(a, b);
    }
    assert!(plan::is_compiled::<Cached>(Some(5.0)));
    // Negative zero shares the plan of zero.
    let mut reader = EndianReader::new(Cursor::new(vec![0u8; 4]), ByteOrder::LittleEndian);
    let _: Cached = engine::populate(&mut reader, Some(-0.0)).unwrap();
    assert!(plan::is_compiled::<Cached>(Some(0.0)));
}

#[test]
fn test_populate_into_keeps_absent_fields() {
    let mut value = Cached { a: 0, b: 77 };
    let mut reader = EndianReader::new(Cursor::new(vec![1, 0, 0, 0]), ByteOrder::LittleEndian);
    engine::populate_into(&mut reader, &mut value, Some(1.0)).unwrap();
    assert_eq!(value, Cached { a: 1, b: 77 });
}

#[derive(Debug, Default, Structure)]
struct Partial {
    #[layout(offset = 0, min_version = 2.0)]
    a: u32,
}

#[test]
fn test_present_field_without_offset_is_missing_layout() {
    let mut reader = EndianReader::new(Cursor::new(vec![0u8; 4]), ByteOrder::LittleEndian);
    let err = reader.read_object_versioned::<Partial>(1.0).unwrap_err();
    assert!(matches!(
        err.as_layout(),
        Some(LayoutError::MissingLayout { field, version: Some(v), .. }) if field == "a" && *v == 1.0
    ));
    let mut reader = EndianReader::new(Cursor::new(vec![5, 0, 0, 0]), ByteOrder::LittleEndian);
    assert_eq!(reader.read_object_versioned::<Partial>(2.0).unwrap().a, 5);
}

#[test]
fn test_plan_cache_can_be_disabled() {
    #[derive(Debug, Default, Structure)]
    struct Local {
        #[layout(offset = 0)]
        a: u8,
    }

    let config = CodecConfig::default().with_plan_cache(false);
    let mut reader = EndianReader::with_config(Cursor::new(vec![1u8]), &config);
    let local: Local = reader.read_object_versioned(42.0).unwrap();
    assert_eq!(local.a, 1);
    assert!(!plan::is_compiled::<Local>(Some(42.0)));

    let mut reader = EndianReader::new(Cursor::new(vec![1u8]), ByteOrder::LittleEndian);
    let _: Local = reader.read_object_versioned(42.0).unwrap();
    assert!(plan::is_compiled::<Local>(Some(42.0)));
}


// --- ROUND TRIPS ---

#[derive(Debug, Default, Clone, PartialEq, Structure)]
#[layout(fixed_size = 40)]
struct Sample {
    #[layout(offset = 0, version_field, store = "u8")]
    version: u16,
    #[layout(offset = 1, store = "u8")]
    mode: Mode,
    #[layout(offset = 2, byte_order = "big")]
    count: i32,
    #[layout(offset = 6)]
    origin: Point,
    #[layout(offset = 10, fixed_length = 10)]
    name: String,
    #[layout(offset = 20)]
    ratio: Option<f64>,
    #[layout(offset = 28, max_version = 2.0)]
    #[layout(offset = 32, min_version = 2.0)]
    score: u32,
    #[layout(offset = 36, since = 2.0)]
    extra: u16,
}

fn samples() -> impl Strategy<Value = Sample> {
    (
        1u16..=3,
        prop_oneof![Just(Mode::Off), Just(Mode::On), Just(Mode::Auto)],
        any::<i32>(),
        (any::<i16>(), any::<i16>()),
        "[a-zA-Z0-9 ]{0,9}[a-zA-Z0-9]",
        proptest::option::of(-1.0e9f64..1.0e9),
        any::<u32>(),
        any::<u16>(),
    )
        .prop_map(|(version, mode, count, (x, y), name, ratio, score, extra)| Sample {
            version,
            mode,
            count,
            origin: Point { x, y },
            name,
            ratio,
            score,
            extra,
        })
}

/// What a written sample reads back as at `version`.
fn as_read(mut sample: Sample, version: u16) -> Sample {
    sample.version = version;
    if version < 2 {
        sample.extra = 0;
    }
    // Nullable fields always read back as present.
    sample.ratio = sample.ratio.or(Some(0.0));
    sample
}

proptest! {
    #[test]
    fn prop_structure_round_trip(sample in samples()) {
        let bytes = write_le(&sample);
        prop_assert_eq!(bytes.len(), 40);
        let version = sample.version;
        prop_assert_eq!(read_le::<Sample>(bytes).unwrap(), as_read(sample, version));
    }

    #[test]
    fn prop_explicit_version_round_trip(sample in samples(), version in 1u16..=3) {
        let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
        writer.write_object_versioned(&sample, f64::from(version)).unwrap();
        let bytes = writer.into_inner().into_inner();
        prop_assert_eq!(bytes[0], version as u8);
        prop_assert_eq!(read_le::<Sample>(bytes).unwrap(), as_read(sample, version));
    }
}

#[derive(Debug, Default, PartialEq, Structure)]
struct Padded {
    #[layout(offset = 0, fixed_length = 8)]
    name: String,
    #[layout(offset = 8, fixed_length = 4, pad = '.')]
    code: String,
}

#[test]
fn test_fixed_length_padding_round_trips() {
    let value = Padded {
        name: "abc".into(),
        code: "x".into(),
    };
    let bytes = write_le(&value);
    assert_eq!(bytes, b"abc     x...");
    assert_eq!(read_le::<Padded>(bytes).unwrap(), value);
}
