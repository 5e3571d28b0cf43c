//! Centralized error handling for layoutio.
//!
//! Every fallible operation in the crate returns [`Result`], and no code path panics on bad
//! input. The library enforces this through `#![deny(clippy::panic)]` and
//! `#![deny(clippy::unwrap_used)]`.
//!
//! ## Error Categories
//!
//! - **Layout Errors** ([`CodecError::Layout`]): the declared schema is inconsistent
//!   (ambiguous version ranges, missing offsets, duplicate version fields, bad string rules).
//!   These are authoring defects and abort the current populate or write call.
//! - **Conversion Errors** ([`CodecError::Conversion`]): a stored value cannot be represented
//!   losslessly as the field's logical type, or the other way around.
//! - **Bounds Errors** ([`CodecError::Bounds`]): buffer views built with inconsistent
//!   geometry, seeks outside a stream, or lengths beyond the configured caps.
//! - **Unsupported Operations** ([`CodecError::Unsupported`]): writes or resizes on a
//!   read-only stream. These are never silent no-ops.
//! - **I/O Errors** ([`CodecError::Io`]): failures of the underlying stream, carried as-is.
//!
//! ## Errors crossing `std::io` boundaries
//!
//! The stream adapters ([`crate::chunk::ChunkedStream`], [`crate::transaction::TransactionStream`])
//! implement `std::io::Read`/`Seek`, whose signatures only allow `io::Error`. They wrap a
//! [`CodecError`] inside the `io::Error`, and the `From<io::Error>` conversion unwraps it again,
//! so a bounds violation raised deep inside a chunked stream still surfaces as
//! [`CodecError::Bounds`] when read through an [`crate::EndianReader`].
//!
//! ```rust
//! use layoutio::{CodecError, EndianReader, ByteOrder};
//! use std::io::Cursor;
//!
//! let mut reader = EndianReader::new(Cursor::new(vec![1u8, 2]), ByteOrder::LittleEndian);
//! match reader.read_u32() {
//!     Err(CodecError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for layoutio operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// The master error enum covering all failure domains.
///
/// This type is `Clone` so that a failed layout registration can be cached and handed out
/// again on every later use of the same type. I/O errors are wrapped in `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum CodecError {
    /// Failure reported by the underlying stream.
    Io(Arc<io::Error>),

    /// The declared layout of a type is inconsistent for the requested version.
    Layout(LayoutError),

    /// A stored value is not losslessly representable as the field's logical type.
    Conversion {
        /// Field being converted.
        field: String,
        /// Source representation.
        from: &'static str,
        /// Target representation.
        to: &'static str,
    },

    /// An offset, length or view geometry falls outside the valid range.
    Bounds(String),

    /// The operation is not supported by this stream.
    Unsupported(String),

    /// A chunk failed to decompress or decompressed to the wrong size.
    Compression(String),

    /// Text could not be encoded or decoded with the active encoding.
    Encoding(String),
}

impl CodecError {
    /// Shorthand for a [`CodecError::Bounds`] error.
    pub fn bounds(msg: impl Into<String>) -> Self {
        Self::Bounds(msg.into())
    }

    /// Shorthand for a [`CodecError::Unsupported`] error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Returns the layout error if this is a schema defect.
    pub fn as_layout(&self) -> Option<&LayoutError> {
        match self {
            Self::Layout(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for [`CodecError::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Layout(e) => write!(f, "Layout Error: {e}"),
            Self::Conversion { field, from, to } => write!(
                f,
                "Conversion Error: field `{field}` cannot be converted from {from} to {to} without loss"
            ),
            Self::Bounds(s) => write!(f, "Bounds Error: {s}"),
            Self::Unsupported(s) => write!(f, "Unsupported Operation: {s}"),
            Self::Compression(s) => write!(f, "Compression Error: {s}"),
            Self::Encoding(s) => write!(f, "Encoding Error: {s}"),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e.as_ref()),
            Self::Layout(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<CodecError>()) {
            let kind = err.kind();
            return match err.into_inner().map(|inner| inner.downcast::<CodecError>()) {
                Some(Ok(codec)) => *codec,
                Some(Err(other)) => Self::Io(Arc::new(io::Error::new(kind, other))),
                None => Self::Io(Arc::new(io::Error::from(kind))),
            };
        }
        Self::Io(Arc::new(err))
    }
}

impl From<LayoutError> for CodecError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        let kind = match &err {
            CodecError::Io(inner) => inner.kind(),
            CodecError::Bounds(_) => io::ErrorKind::InvalidInput,
            CodecError::Unsupported(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::InvalidData,
        };
        match err {
            CodecError::Io(inner) => match Arc::try_unwrap(inner) {
                Ok(original) => original,
                Err(shared) => io::Error::new(kind, CodecError::Io(shared)),
            },
            other => io::Error::new(kind, other),
        }
    }
}

/// Defects in a declared layout.
///
/// `owner` names the declaring type. It is empty when the error was raised by a standalone
/// [`crate::layout::Versioned`] set that is not attached to a type yet.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// More than one version range matches, either at registration (overlapping ranges) or
    /// at resolution.
    AmbiguousLayout {
        /// Declaring type.
        owner: String,
        /// The attribute being resolved, e.g. "field `size` offset".
        subject: String,
        /// The version being resolved, if known.
        version: Option<f64>,
    },
    /// A field is present at this version but no offset applies to it.
    MissingLayout {
        /// Declaring type.
        owner: String,
        /// Field lacking an offset.
        field: String,
        /// The version being resolved.
        version: Option<f64>,
    },
    /// More than one field is marked as the version field.
    MultipleVersionFields {
        /// Declaring type.
        owner: String,
    },
    /// More than one field is marked as the data-length field for a version.
    MultipleDataLengthFields {
        /// Declaring type.
        owner: String,
        /// The version at which the markers collide, if known.
        version: Option<f64>,
    },
    /// A string field declares no string rule.
    UnsupportedStringRule {
        /// Declaring type.
        owner: String,
        /// The string field.
        field: String,
    },
    /// A string field declares more than one string rule.
    ConflictingStringRules {
        /// Declaring type.
        owner: String,
        /// The string field.
        field: String,
    },
    /// The version field is not usable as a version number.
    InvalidVersionField {
        /// Declaring type.
        owner: String,
        /// The version field.
        field: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// A version range with `min > max`.
    InvalidVersionRange {
        /// Inclusive lower bound.
        min: f64,
        /// Exclusive upper bound.
        max: f64,
    },
    /// An attribute that does not fit the field it is attached to.
    InvalidAttribute {
        /// Declaring type.
        owner: String,
        /// The field carrying the attribute.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The data-length field holds a value that is not a positive integer.
    InvalidDataLength {
        /// Declaring type.
        owner: String,
        /// The data-length field.
        field: String,
    },
}

impl LayoutError {
    /// Fills in the declaring type on errors raised before the type was known.
    pub(crate) fn owned_by(mut self, name: &str) -> Self {
        match &mut self {
            Self::AmbiguousLayout { owner, .. }
            | Self::MissingLayout { owner, .. }
            | Self::MultipleVersionFields { owner }
            | Self::MultipleDataLengthFields { owner, .. }
            | Self::UnsupportedStringRule { owner, .. }
            | Self::ConflictingStringRules { owner, .. }
            | Self::InvalidVersionField { owner, .. }
            | Self::InvalidAttribute { owner, .. }
            | Self::InvalidDataLength { owner, .. } => {
                if owner.is_empty() {
                    name.clone_into(owner);
                }
            }
            Self::InvalidVersionRange { .. } => {}
        }
        self
    }
}

struct DisplayVersion(Option<f64>);

impl fmt::Display for DisplayVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "version {v}"),
            None => f.write_str("no version"),
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousLayout {
                owner,
                subject,
                version,
            } => write!(
                f,
                "{owner}: {subject} has more than one matching descriptor at {}",
                DisplayVersion(*version)
            ),
            Self::MissingLayout {
                owner,
                field,
                version,
            } => write!(
                f,
                "{owner}: field `{field}` has no offset at {}",
                DisplayVersion(*version)
            ),
            Self::MultipleVersionFields { owner } => {
                write!(f, "{owner}: more than one version field declared")
            }
            Self::MultipleDataLengthFields { owner, version } => write!(
                f,
                "{owner}: more than one data-length field at {}",
                DisplayVersion(*version)
            ),
            Self::UnsupportedStringRule { owner, field } => {
                write!(f, "{owner}: string field `{field}` declares no string rule")
            }
            Self::ConflictingStringRules { owner, field } => write!(
                f,
                "{owner}: string field `{field}` declares more than one string rule"
            ),
            Self::InvalidVersionField {
                owner,
                field,
                reason,
            } => write!(f, "{owner}: version field `{field}` {reason}"),
            Self::InvalidVersionRange { min, max } => {
                write!(f, "version range [{min}, {max}) has min greater than max")
            }
            Self::InvalidAttribute {
                owner,
                field,
                reason,
            } => write!(f, "{owner}: field `{field}`: {reason}"),
            Self::InvalidDataLength { owner, field } => write!(
                f,
                "{owner}: data-length field `{field}` does not hold a positive integer"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}
