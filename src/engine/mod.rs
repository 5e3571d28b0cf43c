//! The object population engine.
//!
//! Populating a [`Structure`] reads each of its present fields at `origin + offset`, in
//! ascending offset order, where `origin` is the reader's position when population starts.
//! Writing mirrors this. Afterwards the cursor is moved to `origin + data length` when the
//! type declares a data-length field for the version, else to `origin + fixed size` when one
//! is declared, and otherwise stays after the last field.
//!
//! ## Versions
//!
//! A type may declare one *version field*. When no version is supplied, that field is read
//! first, at its own offset and with its own byte order, and its value selects the layout for
//! everything else. The same instance is then populated a second time with the version known.
//! Nested structures inherit the version of their parent.
//!
//! ```rust
//! use layoutio::{ByteOrder, EndianReader, EndianWriter, Structure};
//! use std::io::Cursor;
//!
//! #[derive(Debug, Default, PartialEq, Structure)]
//! #[layout(fixed_size = 12)]
//! struct Header {
//!     #[layout(offset = 0, version_field)]
//!     version: u16,
//!     #[layout(offset = 2, until = 2.0)]
//!     legacy_flags: u16,
//!     #[layout(offset = 4, max_version = 2.0)]
//!     #[layout(offset = 8, min_version = 2.0)]
//!     count: u32,
//! }
//!
//! let header = Header { version: 2, legacy_flags: 0, count: 7 };
//! let mut writer = EndianWriter::new(Cursor::new(Vec::new()), ByteOrder::LittleEndian);
//! writer.write_object(&header)?;
//! let bytes = writer.into_inner().into_inner();
//! assert_eq!(bytes.len(), 12);
//! assert_eq!(bytes[8], 7);
//!
//! let mut reader = EndianReader::new(Cursor::new(bytes), ByteOrder::LittleEndian);
//! assert_eq!(reader.read_object::<Header>()?, header);
//! # Ok::<(), layoutio::CodecError>(())
//! ```

pub mod plan;

use crate::error::{CodecError, LayoutError, Result};
use crate::field::FieldSpec;
use crate::layout::{FieldKind, ResolvedLayout, TypeLayout};
use crate::value::{PrimitiveKind, Value};
use crate::reader::EndianReader;
use crate::writer::EndianWriter;
use std::io::{Read, Seek, Write};
use std::sync::Arc;

/// A type with a declared binary layout.
///
/// Usually derived with `#[derive(Structure)]`. Manual implementations build their layout with
/// [`TypeLayout::builder`] and dispatch on the field indices they registered.
pub trait Structure: Default + 'static {
    /// The type's layout, built and validated once.
    ///
    /// # Errors
    /// The layout error found at registration. It is returned again on every call.
    fn layout() -> Result<&'static TypeLayout>;

    /// Reads the field registered under `index` into `self`.
    fn read_field<R: Read + Seek>(
        &mut self,
        index: usize,
        reader: &mut EndianReader<R>,
        spec: &FieldSpec<'_>,
    ) -> Result<()>;

    /// Writes the field registered under `index`.
    fn write_field<W: Write + Seek>(
        &self,
        index: usize,
        writer: &mut EndianWriter<W>,
        spec: &FieldSpec<'_>,
    ) -> Result<()>;

    /// The field registered under `index` as a number, for version and data-length fields.
    fn field_number(&self, index: usize) -> Option<f64>;
}

fn plan_for<T: Structure>(version: Option<f64>, cached: bool) -> Result<Arc<ResolvedLayout>> {
    if cached {
        plan::compiled::<T>(version)
    } else {
        plan::resolve::<T>(version)
    }
}

/// Reads a `T` at the reader's cursor.
///
/// With `version` set, the layout for that version is used directly. Otherwise the version
/// field, if any, decides it.
pub fn populate<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    version: Option<f64>,
) -> Result<T> {
    let mut value = T::default();
    populate_into(reader, &mut value, version)?;
    Ok(value)
}

/// Like [`populate`], but fills an existing instance. Fields absent at the version keep their
/// current values.
pub fn populate_into<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    value: &mut T,
    version: Option<f64>,
) -> Result<()> {
    let cached = reader.plan_cache();
    populate_with(reader, value, version, cached)
}

/// Like [`populate`], but resolves the layout on every call instead of using a cached plan.
pub fn populate_uncached<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    version: Option<f64>,
) -> Result<T> {
    let mut value = T::default();
    populate_with(reader, &mut value, version, false)?;
    Ok(value)
}

fn populate_with<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    value: &mut T,
    version: Option<f64>,
    cached: bool,
) -> Result<()> {
    let layout = T::layout()?;
    let origin = reader.position()?;
    let version = match version {
        Some(v) => Some(v),
        None => read_version(reader, value, layout, origin)?,
    };

    let plan = plan_for::<T>(version, cached)?;
    let ambient = reader.byte_order();
    for step in &plan.steps {
        reader.seek_to(origin + step.offset)?;
        let spec = FieldSpec {
            name: &step.name,
            byte_order: step.byte_order.unwrap_or(ambient),
            stored: step.stored,
            string: step.string,
            version,
        };
        value.read_field(step.index, reader, &spec)?;
    }

    if let Some(end) = end_offset(&plan, value)? {
        reader.seek_to(origin + end)?;
    }
    Ok(())
}

/// Phase one of a two-phase read: the version field alone, at its unconditional offset.
fn read_version<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    value: &mut T,
    layout: &TypeLayout,
    origin: u64,
) -> Result<Option<f64>> {
    let Some(info) = layout.version_field() else {
        return Ok(None);
    };
    let name = layout
        .fields()
        .iter()
        .find(|f| f.index() == info.index)
        .map_or("version", |f| f.name());
    let spec = FieldSpec {
        name,
        byte_order: info.byte_order.unwrap_or(reader.byte_order()),
        stored: info.stored,
        string: None,
        version: None,
    };
    reader.seek_to(origin + info.offset)?;
    value.read_field(info.index, reader, &spec)?;
    Ok(value.field_number(info.index))
}

/// Where the cursor goes once all fields are done, relative to the origin.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn end_offset<T: Structure>(plan: &ResolvedLayout, value: &T) -> Result<Option<u64>> {
    let Some(index) = plan.data_length else {
        return Ok(plan.fixed_size);
    };
    let invalid = || {
        let field = plan
            .steps
            .iter()
            .find(|s| s.index == index)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        CodecError::Layout(LayoutError::InvalidDataLength {
            owner: plan.type_name.clone(),
            field,
        })
    };
    let length = value
        .field_number(index)
        .filter(|n| *n > 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64)
        .ok_or_else(invalid)?;
    Ok(Some(length as u64))
}

/// Writes `value` at the writer's cursor.
///
/// Without `version`, the value's own version field supplies it. Gaps between fields and the
/// tail up to the declared size are zero-filled when they lie past the end of the stream.
pub fn write<T: Structure, W: Write + Seek>(
    writer: &mut EndianWriter<W>,
    value: &T,
    version: Option<f64>,
) -> Result<()> {
    let cached = writer.plan_cache();
    write_with(writer, value, version, cached)
}

/// Like [`write`], but resolves the layout on every call.
pub fn write_uncached<T: Structure, W: Write + Seek>(
    writer: &mut EndianWriter<W>,
    value: &T,
    version: Option<f64>,
) -> Result<()> {
    write_with(writer, value, version, false)
}

fn write_with<T: Structure, W: Write + Seek>(
    writer: &mut EndianWriter<W>,
    value: &T,
    version: Option<f64>,
    cached: bool,
) -> Result<()> {
    let layout = T::layout()?;
    let origin = writer.position()?;
    let version_index = layout.version_field().map(|info| info.index);
    // An explicit version is also what gets stored in the version field.
    let stamped = version;
    let version = version.or_else(|| version_index.and_then(|index| value.field_number(index)));

    let plan = plan_for::<T>(version, cached)?;
    let ambient = writer.byte_order();
    for step in &plan.steps {
        writer.extend_to(origin + step.offset)?;
        let spec = FieldSpec {
            name: &step.name,
            byte_order: step.byte_order.unwrap_or(ambient),
            stored: step.stored,
            string: step.string,
            version,
        };
        match stamped {
            Some(v) if version_index == Some(step.index) => {
                write_version(writer, v, step.kind, &spec)?;
            }
            _ => value.write_field(step.index, writer, &spec)?,
        }
    }

    if let Some(end) = end_offset(&plan, value)? {
        writer.extend_to(origin + end)?;
    }
    Ok(())
}

/// Encodes `version` in the version field's wire type.
fn write_version<W: Write + Seek>(
    writer: &mut EndianWriter<W>,
    version: f64,
    kind: FieldKind,
    spec: &FieldSpec<'_>,
) -> Result<()> {
    let wire = spec
        .stored
        .or(kind.primitive())
        .unwrap_or(PrimitiveKind::F64);
    let raw = Value::F64(version)
        .convert(wire)
        .ok_or_else(|| CodecError::Conversion {
            field: spec.name.to_owned(),
            from: PrimitiveKind::F64.name(),
            to: wire.name(),
        })?;
    writer.write_value(raw, spec.byte_order)
}

/// Reads a nested structure field: a fresh origin at the cursor, the field's byte order as
/// ambient, and the parent's version.
pub fn read_nested<T: Structure, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    spec: &FieldSpec<'_>,
) -> Result<T> {
    let saved = reader.byte_order();
    reader.set_byte_order(spec.byte_order);
    let result = populate(reader, spec.version);
    reader.set_byte_order(saved);
    result
}

/// Writes a nested structure field. See [`read_nested`].
pub fn write_nested<T: Structure, W: Write + Seek>(
    writer: &mut EndianWriter<W>,
    value: &T,
    spec: &FieldSpec<'_>,
) -> Result<()> {
    let saved = writer.byte_order();
    writer.set_byte_order(spec.byte_order);
    let result = write(writer, value, spec.version);
    writer.set_byte_order(saved);
    result
}

impl<R: Read + Seek> EndianReader<R> {
    /// Reads a `T` at the cursor, taking the version from its version field if it has one.
    pub fn read_object<T: Structure>(&mut self) -> Result<T> {
        populate(self, None)
    }

    /// Reads a `T` at the cursor using the layout for `version`.
    pub fn read_object_versioned<T: Structure>(&mut self, version: f64) -> Result<T> {
        populate(self, Some(version))
    }

    /// Reads `count` consecutive `T`s.
    pub fn read_objects<T: Structure>(
        &mut self,
        count: usize,
        version: Option<f64>,
    ) -> Result<Vec<T>> {
        (0..count).map(|_| populate(self, version)).collect()
    }
}

impl<W: Write + Seek> EndianWriter<W> {
    /// Writes `value` at the cursor, versioned by its own version field if it has one.
    pub fn write_object<T: Structure>(&mut self, value: &T) -> Result<()> {
        write(self, value, None)
    }

    /// Writes `value` at the cursor using the layout for `version`.
    pub fn write_object_versioned<T: Structure>(&mut self, value: &T, version: f64) -> Result<()> {
        write(self, value, Some(version))
    }

    /// Writes each value in turn.
    pub fn write_objects<T: Structure>(&mut self, values: &[T], version: Option<f64>) -> Result<()> {
        values.iter().try_for_each(|value| write(self, value, version))
    }
}
