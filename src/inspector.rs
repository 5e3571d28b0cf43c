//! Tools for inspecting how a declared type is laid out at a given version.
//! Useful for checking version-dependent offsets against a hex dump.

use crate::engine::{Structure, plan};
use crate::error::Result;
use crate::layout::{FieldKind, ResolvedLayout, StringRule};
use crate::order::ByteOrder;
use serde::Serialize;

/// A structural report of one type at one version.
#[derive(Debug, Serialize)]
pub struct LayoutReport {
    /// Declaring type.
    pub type_name: String,
    /// Version the layout was resolved for.
    pub version: Option<f64>,
    /// Type-level byte order, if declared for this version.
    pub byte_order: Option<ByteOrder>,
    /// Declared total size.
    pub fixed_size: Option<u64>,
    /// Name of the field holding the total size.
    pub data_length_field: Option<String>,
    /// Present fields in offset order.
    pub fields: Vec<FieldReport>,
}

/// One field of a [`LayoutReport`].
#[derive(Debug, Serialize)]
pub struct FieldReport {
    /// Field name.
    pub name: String,
    /// Offset from the type origin.
    pub offset: u64,
    /// Bytes occupied on the wire, when fixed.
    pub size: Option<u64>,
    /// Wire representation, e.g. `u16`, `string[32]`, `struct`.
    pub wire_type: String,
    /// Field or type byte order override.
    pub byte_order: Option<ByteOrder>,
}

impl LayoutReport {
    /// Reports `T` at `version` using the same plan population would use.
    pub fn for_type<T: Structure>(version: Option<f64>) -> Result<Self> {
        let plan = plan::compiled::<T>(version)?;
        Ok(Self::from_resolved(&plan))
    }

    /// Reports an already resolved layout.
    pub fn from_resolved(resolved: &ResolvedLayout) -> Self {
        let fields = resolved
            .steps
            .iter()
            .map(|step| {
                let (wire_type, size) = match (step.kind, step.string) {
                    (FieldKind::String, Some(StringRule::FixedLength { len, .. })) => {
                        (format!("string[{len}]"), Some(len as u64))
                    }
                    (
                        FieldKind::String,
                        Some(StringRule::NullTerminated { max_len: Some(cap) }),
                    ) => (format!("cstring[{cap}]"), Some(cap as u64)),
                    (FieldKind::String, Some(StringRule::NullTerminated { max_len: None })) => {
                        ("cstring".to_owned(), None)
                    }
                    (FieldKind::String, _) => ("string".to_owned(), None),
                    (FieldKind::Structure, _) => ("struct".to_owned(), None),
                    (kind, _) => {
                        let wire = step.stored.or(kind.primitive());
                        let name = wire.map_or("?", |w| w.name());
                        let label = match kind {
                            FieldKind::Enum(_) => format!("enum({name})"),
                            _ => name.to_owned(),
                        };
                        (label, wire.map(|w| w.size() as u64))
                    }
                };
                FieldReport {
                    name: step.name.clone(),
                    offset: step.offset,
                    size,
                    wire_type,
                    byte_order: step.byte_order,
                }
            })
            .collect();

        let data_length_field = resolved.data_length.and_then(|index| {
            resolved
                .steps
                .iter()
                .find(|s| s.index == index)
                .map(|s| s.name.clone())
        });

        Self {
            type_name: resolved.type_name.clone(),
            version: resolved.version,
            byte_order: resolved.byte_order,
            fixed_size: resolved.fixed_size,
            data_length_field,
            fields,
        }
    }
}

impl std::fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== LAYOUT REPORT: {} ===", self.type_name)?;
        match self.version {
            Some(v) => writeln!(f, "Version:     {v}")?,
            None => writeln!(f, "Version:     (none)")?,
        }
        if let Some(order) = self.byte_order {
            writeln!(f, "Byte Order:  {order:?}")?;
        }
        if let Some(size) = self.fixed_size {
            writeln!(f, "Fixed Size:  {size}b")?;
        }
        if let Some(field) = &self.data_length_field {
            writeln!(f, "Data Length: {field}")?;
        }
        writeln!(f, "\n[FIELDS]")?;
        for (i, field) in self.fields.iter().enumerate() {
            let connector = if i + 1 == self.fields.len() { "└── " } else { "├── " };
            let size = field
                .size
                .map(|s| format!("{s}b"))
                .unwrap_or_else(|| "var".to_owned());
            let order = field
                .byte_order
                .map(|o| format!(" | {o:?}"))
                .unwrap_or_default();
            writeln!(
                f,
                "{connector}@{:#06x} {} : {} | Size: {size}{order}",
                field.offset, field.name, field.wire_type
            )?;
        }
        Ok(())
    }
}
