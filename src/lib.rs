//! # layoutio
//!
//! A schema-driven binary codec for reading and writing structured records whose on-disk layout
//! is declared, field by field, next to the Rust type that holds them.
//!
//! ## Overview
//!
//! Many binary formats evolve over time: fields move, change width, or appear and disappear
//! between versions, and the same record may be stored little-endian in one file and big-endian
//! in another. Instead of hand-writing a parser per version, layoutio lets each field declare
//! *where* it lives for *which* versions, and populates instances from that description.
//!
//! ### Key Features
//!
//! *   **Declarative Layouts:** `#[derive(Structure)]` turns `#[layout(...)]` attributes into a
//!     validated [`layout::TypeLayout`]: offsets, byte order, stored type, string framing and
//!     total size, each optionally scoped to a version range.
//! *   **Self-Describing Versions:** A type may mark one field as its version number. It is read
//!     first and selects the layout for everything else.
//! *   **Endian Primitives:** [`EndianReader`] and [`EndianWriter`] handle every primitive in
//!     either byte order, plus half floats, 128-bit decimals, GUIDs and three string framings.
//!     Readers can *peek* without moving and open *virtual* sub-readers whose offset zero sits
//!     anywhere in the stream.
//! *   **Compiled Plans:** Resolving a layout for a version is done once per `(type, version)`
//!     and cached process-wide.
//! *   **Zero-Copy Views:** [`DataBuffer`] exposes a byte buffer as a strided array of fixed-size
//!     values without copying it.
//! *   **Chunked Decompression:** [`ChunkedStream`] presents a sequence of independently
//!     compressed chunks as one seekable stream, materializing a single chunk at a time.
//! *   **Transactional Writes:** [`TransactionStream`] buffers writes over any readable stream
//!     until they are explicitly applied or discarded.
//!
//! ## Core Concepts
//!
//! ### Layouts and Versions
//!
//! Version-dependent attributes are stored as half-open ranges `[min, max)`. Ranges registered
//! for the same attribute may never overlap, so a layout that builds can never resolve
//! ambiguously. A range with `min == max` matches exactly one version.
//!
//! ### Population
//!
//! Population reads the present fields of a type in ascending offset order, each at
//! `origin + offset`, then leaves the cursor at `origin + data length` or `origin + fixed size`
//! when the type declares one. See [`engine`] for the full rules.
//!
//! ## Usage Patterns
//!
//! ### Declaring and Reading a Record
//!
//! ```rust
//! use layoutio::{ByteOrder, EndianReader, Structure};
//! use std::io::Cursor;
//!
//! #[derive(Debug, Default, Structure)]
//! #[layout(byte_order = "big")]
//! struct Entry {
//!     #[layout(offset = 0)]
//!     id: u32,
//!     #[layout(offset = 4, fixed_length = 8, trim)]
//!     name: String,
//! }
//!
//! let bytes = [0, 0, 0, 42, b'h', b'e', b'l', b'l', b'o', 0, 0, 0];
//! let mut reader = EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian);
//! let entry: Entry = reader.read_object()?;
//! assert_eq!(entry.id, 42);
//! assert_eq!(entry.name, "hello");
//! # Ok::<(), layoutio::CodecError>(())
//! ```
//!
//! ### Enums and Stored Types
//!
//! ```rust
//! use layoutio::{ByteOrder, EndianWriter, LayoutEnum, Structure};
//! use std::io::Cursor;
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq, LayoutEnum)]
//! #[repr(u8)]
//! enum Kind {
//!     #[default]
//!     Plain = 0,
//!     Packed = 2,
//! }
//!
//! #[derive(Debug, Default, Structure)]
//! struct Record {
//!     #[layout(offset = 0)]
//!     kind: Kind,
//!     #[layout(offset = 1, store = "u16")]
//!     count: u64,
//! }
//!
//! let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
//! writer.write_object(&Record { kind: Kind::Packed, count: 513 })?;
//! assert_eq!(writer.into_inner().into_inner(), [2, 1, 2]);
//! # Ok::<(), layoutio::CodecError>(())
//! ```
//!
//! ### Safety and Error Handling
//!
//! * **No Unsafe:** The crate forbids `unsafe` code; buffer views decode through byte slices.
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`CodecError`]. Layout defects are
//!   reported as [`LayoutError`] the first time a type is used, and again on every later use.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// Lets the derive output name `layoutio::...` from inside this crate's own tests and docs.
extern crate self as layoutio;

// --- PUBLIC API MODULES ---
pub mod buffer;
pub mod chunk;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod inspector;
pub mod layout;
pub mod order;
pub mod reader;
pub mod transaction;
pub mod value;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod io;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
#[doc(hidden)]
pub mod rt;

// --- RE-EXPORTS ---

#[cfg(feature = "lz4_flex")]
pub use compression::Lz4Decompressor;
#[cfg(feature = "flate2")]
pub use compression::ZlibDecompressor;
pub use compression::{Decompressor, NoCompression};

pub use buffer::{Bufferable, BufferedCollection, DataBuffer};
pub use chunk::{ChunkLocator, ChunkTable, ChunkedStream};
pub use config::CodecConfig;
pub use engine::Structure;
pub use error::{CodecError, LayoutError, Result};
pub use field::{FieldSpec, FieldValue};
pub use inspector::LayoutReport;
pub use order::{ByteOrder, TextEncoding};
pub use reader::EndianReader;
pub use transaction::TransactionStream;
pub use value::{Decimal, Half, PrimitiveKind, Value};
pub use writer::EndianWriter;

pub use uuid::Uuid;

// Re-export the derive macros so they are accessible as `layoutio::Structure` and
// `layoutio::LayoutEnum`.
pub use layoutio_derive::{LayoutEnum, Structure};
