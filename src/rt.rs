//! Runtime utilities for generated code (Macros).
//! Do not use directly.

use crate::error::{CodecError, LayoutError, Result};
use crate::layout::TypeLayout;
use crate::value::PrimitiveKind;
use std::sync::OnceLock;
use tracing::debug;

/// Per-type storage for a registered layout, including a failed registration.
pub type LayoutCell = OnceLock<std::result::Result<TypeLayout, LayoutError>>;

/// Builds the layout in `cell` on first use and hands out the stored result afterwards.
pub fn registered(
    cell: &'static LayoutCell,
    build: fn() -> std::result::Result<TypeLayout, LayoutError>,
) -> Result<&'static TypeLayout> {
    cell.get_or_init(|| {
        let layout = build();
        match &layout {
            Ok(l) => debug!(type_name = l.name(), fields = l.fields().len(), "registered layout"),
            Err(e) => debug!(error = %e, "layout registration failed"),
        }
        layout
    })
    .as_ref()
    .map_err(|e| CodecError::Layout(e.clone()))
}

/// Error for a dispatch index that the type never registered.
pub fn unknown_field(type_name: &str, index: usize) -> CodecError {
    CodecError::bounds(format!("{type_name} has no field with index {index}"))
}

/// Error for an enum discriminant with no matching variant.
pub fn unknown_discriminant(field: &str, enum_name: &'static str, repr: PrimitiveKind) -> CodecError {
    CodecError::Conversion {
        field: field.to_owned(),
        from: repr.name(),
        to: enum_name,
    }
}
