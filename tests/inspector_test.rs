#![allow(missing_docs)]

use layoutio::{ByteOrder, LayoutEnum, LayoutReport, Structure};

#[derive(Debug, Default, Clone, Copy, LayoutEnum)]
#[repr(i32)]
enum Kind {
    #[default]
    A = -1,
    B = 1,
}

#[derive(Debug, Default, Structure)]
struct Vector {
    #[layout(offset = 0)]
    x: f32,
    #[layout(offset = 4)]
    y: f32,
}

#[derive(Debug, Default, Structure)]
#[layout(byte_order = "big")]
#[layout(fixed_size = 64, min_version = 2.0)]
struct Node {
    #[layout(offset = 0, version_field, store = "u8")]
    version: u16,
    #[layout(offset = 1, store = "u8")]
    kind: Kind,
    #[layout(offset = 4)]
    #[layout(data_length, max_version = 2.0)]
    size: u32,
    #[layout(offset = 8)]
    position: Vector,
    #[layout(offset = 16, fixed_length = 12)]
    name: String,
    #[layout(offset = 28, null_terminated, since = 3.0)]
    comment: String,
}

#[test]
fn test_report_lists_fields_in_offset_order() {
    let report = LayoutReport::for_type::<Node>(Some(1.0)).unwrap();
    assert_eq!(report.type_name, "Node");
    assert_eq!(report.byte_order, Some(ByteOrder::BigEndian));
    assert_eq!(report.fixed_size, None);
    assert_eq!(report.data_length_field.as_deref(), Some("size"));

    let names: Vec<_> = report.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["version", "kind", "size", "position", "name"]);

    let kind = &report.fields[1];
    assert_eq!(kind.wire_type, "enum(u8)");
    assert_eq!(kind.size, Some(1));
    assert_eq!(report.fields[3].wire_type, "struct");
    assert_eq!(report.fields[4].wire_type, "string[12]");
    assert_eq!(report.fields[4].size, Some(12));
}

#[test]
fn test_report_tracks_version() {
    let report = LayoutReport::for_type::<Node>(Some(3.0)).unwrap();
    assert_eq!(report.fixed_size, Some(64));
    assert_eq!(report.data_length_field, None);
    let comment = report.fields.last().unwrap();
    assert_eq!(comment.name, "comment");
    assert_eq!(comment.wire_type, "cstring");
    assert_eq!(comment.size, None);
}

#[test]
fn test_report_display() {
    let text = LayoutReport::for_type::<Vector>(None).unwrap().to_string();
    assert!(text.starts_with("=== LAYOUT REPORT: Vector ==="));
    assert!(text.contains("[FIELDS]"));
    assert!(text.contains("├── @0x0000 x : f32 | Size: 4b"));
    assert!(text.contains("└── @0x0004 y : f32 | Size: 4b"));
}

#[test]
fn test_report_serializes_to_json() {
    let report = LayoutReport::for_type::<Node>(Some(2.0)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["type_name"], "Node");
    assert_eq!(json["version"], 2.0);
    assert_eq!(json["fixed_size"], 64);
    assert_eq!(json["fields"][0]["wire_type"], "u8");
    assert_eq!(json["fields"][2]["offset"], 4);
}
