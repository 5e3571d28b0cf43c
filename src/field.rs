//! Per-field codecs.
//!
//! Every type that can appear as a field of a declared structure implements [`FieldValue`].
//! The population engine resolves *where* and *how* a field is stored (offset, byte order,
//! stored type, string framing) into a [`FieldSpec`]; the field type then reads or writes
//! itself according to it.

use crate::error::{CodecError, LayoutError, Result};
use crate::layout::{FieldKind, StringRule};
use crate::order::ByteOrder;
use crate::reader::EndianReader;
use crate::value::{Decimal, Half, PrimitiveKind, Value};
use crate::writer::EndianWriter;
use std::io::{Read, Seek, Write};
use uuid::Uuid;

/// Everything a field codec needs to know about one field at one version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec<'a> {
    /// Field name, for error messages.
    pub name: &'a str,
    /// Effective byte order: field override, else type override, else ambient.
    pub byte_order: ByteOrder,
    /// On-wire representation, when it differs from the field's own type.
    pub stored: Option<PrimitiveKind>,
    /// String framing.
    pub string: Option<StringRule>,
    /// The version being read or written. Nested structures inherit it.
    pub version: Option<f64>,
}

impl<'a> FieldSpec<'a> {
    /// A spec with no overrides.
    pub fn new(name: &'a str, byte_order: ByteOrder) -> Self {
        Self {
            name,
            byte_order,
            stored: None,
            string: None,
            version: None,
        }
    }

    /// Sets the stored type.
    #[must_use]
    pub fn stored(mut self, kind: PrimitiveKind) -> Self {
        self.stored = Some(kind);
        self
    }

    /// Sets the string rule.
    #[must_use]
    pub fn string(mut self, rule: StringRule) -> Self {
        self.string = Some(rule);
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn version(mut self, version: Option<f64>) -> Self {
        self.version = version;
        self
    }
}

/// A type that can be stored in a field of a declared structure.
pub trait FieldValue: Sized {
    /// How the layout model classifies this type.
    const KIND: FieldKind;

    /// Reads the field at the reader's cursor.
    fn read_field<R: Read + Seek>(reader: &mut EndianReader<R>, spec: &FieldSpec<'_>)
    -> Result<Self>;

    /// Writes the field at the writer's cursor.
    fn write_field<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        spec: &FieldSpec<'_>,
    ) -> Result<()>;

    /// The field as a number, for version and data-length fields.
    fn as_number(&self) -> Option<f64> {
        None
    }
}

/// A type with a direct [`Value`] representation.
pub trait Primitive: Copy {
    /// Wire kind of this type.
    const KIND: PrimitiveKind;

    /// Wraps the value.
    fn into_value(self) -> Value;

    /// Unwraps a value of exactly [`Self::KIND`].
    fn from_value(value: Value) -> Option<Self>;
}

/// Reads a primitive, converting from the stored type when one is declared.
///
/// # Errors
/// [`CodecError::Conversion`] if the stored value does not fit `P` exactly.
pub fn read_primitive<P: Primitive, R: Read + Seek>(
    reader: &mut EndianReader<R>,
    spec: &FieldSpec<'_>,
) -> Result<P> {
    let wire = spec.stored.unwrap_or(P::KIND);
    let raw = reader.read_value(wire, spec.byte_order)?;
    raw.convert(P::KIND)
        .and_then(P::from_value)
        .ok_or_else(|| conversion(spec, wire, P::KIND))
}

/// Writes a primitive, converting to the stored type when one is declared.
///
/// # Errors
/// [`CodecError::Conversion`] if the value does not fit the stored type exactly.
pub fn write_primitive<P: Primitive, W: Write + Seek>(
    value: P,
    writer: &mut EndianWriter<W>,
    spec: &FieldSpec<'_>,
) -> Result<()> {
    let wire = spec.stored.unwrap_or(P::KIND);
    let raw = value
        .into_value()
        .convert(wire)
        .ok_or_else(|| conversion(spec, P::KIND, wire))?;
    writer.write_value(raw, spec.byte_order)
}

fn conversion(spec: &FieldSpec<'_>, from: PrimitiveKind, to: PrimitiveKind) -> CodecError {
    CodecError::Conversion {
        field: spec.name.to_owned(),
        from: from.name(),
        to: to.name(),
    }
}

macro_rules! primitive_fields {
    ($($ty:ty => $kind:ident;)*) => {
        $(
            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;

                fn into_value(self) -> Value {
                    Value::$kind(self)
                }

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$kind(v) => Some(v),
                        _ => None,
                    }
                }
            }

            impl FieldValue for $ty {
                const KIND: FieldKind = FieldKind::Primitive(PrimitiveKind::$kind);

                fn read_field<R: Read + Seek>(
                    reader: &mut EndianReader<R>,
                    spec: &FieldSpec<'_>,
                ) -> Result<Self> {
                    read_primitive(reader, spec)
                }

                fn write_field<W: Write + Seek>(
                    &self,
                    writer: &mut EndianWriter<W>,
                    spec: &FieldSpec<'_>,
                ) -> Result<()> {
                    write_primitive(*self, writer, spec)
                }

                fn as_number(&self) -> Option<f64> {
                    self.into_value().as_f64()
                }
            }
        )*
    };
}

primitive_fields! {
    bool => Bool;
    u8 => U8;
    i8 => I8;
    u16 => U16;
    i16 => I16;
    u32 => U32;
    i32 => I32;
    u64 => U64;
    i64 => I64;
    Half => F16;
    f32 => F32;
    f64 => F64;
    Decimal => Decimal;
    Uuid => Guid;
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::String;

    fn read_field<R: Read + Seek>(
        reader: &mut EndianReader<R>,
        spec: &FieldSpec<'_>,
    ) -> Result<Self> {
        reader.read_string(string_rule(spec)?)
    }

    fn write_field<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        spec: &FieldSpec<'_>,
    ) -> Result<()> {
        writer.write_string(self, string_rule(spec)?)
    }
}

fn string_rule(spec: &FieldSpec<'_>) -> Result<StringRule> {
    spec.string.ok_or_else(|| {
        CodecError::Layout(LayoutError::UnsupportedStringRule {
            owner: String::new(),
            field: spec.name.to_owned(),
        })
    })
}

/// Nullable fields. Reading always yields `Some`; writing `None` writes the default value.
impl<T: FieldValue + Default> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;

    fn read_field<R: Read + Seek>(
        reader: &mut EndianReader<R>,
        spec: &FieldSpec<'_>,
    ) -> Result<Self> {
        T::read_field(reader, spec).map(Some)
    }

    fn write_field<W: Write + Seek>(
        &self,
        writer: &mut EndianWriter<W>,
        spec: &FieldSpec<'_>,
    ) -> Result<()> {
        match self {
            Some(value) => value.write_field(writer, spec),
            None => T::default().write_field(writer, spec),
        }
    }

    fn as_number(&self) -> Option<f64> {
        self.as_ref().and_then(FieldValue::as_number)
    }
}
