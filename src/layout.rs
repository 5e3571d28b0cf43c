//! The layout descriptor model.
//!
//! A [`TypeLayout`] is the static table describing where each field of a type lives on the
//! wire, for every version the type supports. It is pure data: nothing here touches a stream.
//!
//! Version-dependent attributes (offsets, byte order, stored type, fixed size, the data-length
//! marker) are kept in [`Versioned`] lists of `(range, value)` pairs. Ranges are checked for
//! overlap when they are registered, so a layout that builds successfully can never resolve
//! ambiguously later.
//!
//! ```rust
//! use layoutio::layout::{FieldKind, FieldLayout, TypeLayout, VersionRange};
//! use layoutio::PrimitiveKind;
//!
//! let layout = TypeLayout::builder("Header")
//!     .field(FieldLayout::new("magic", 0, FieldKind::Primitive(PrimitiveKind::U32)).at(0))
//!     .field(
//!         FieldLayout::new("size", 1, FieldKind::Primitive(PrimitiveKind::U32))
//!             .offset(VersionRange::until(10.0), 4)
//!             .offset(VersionRange::since(10.0), 8),
//!     )
//!     .build()?;
//!
//! let resolved = layout.resolve(Some(12.0))?;
//! assert_eq!(resolved.steps[1].offset, 8);
//! # Ok::<(), layoutio::LayoutError>(())
//! ```

use crate::error::LayoutError;
use crate::order::ByteOrder;
use crate::value::PrimitiveKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open interval `[min, max)` of version numbers. Either side may be open.
///
/// A range whose `min` equals its `max` matches exactly that version and nothing else.
/// When no version is known, only a fully unbounded range matches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VersionRange {
    min: Option<f64>,
    max: Option<f64>,
}

impl VersionRange {
    /// Matches every version, including "no version".
    pub const fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Builds `[min, max)`.
    ///
    /// # Errors
    /// [`LayoutError::InvalidVersionRange`] when both bounds are present and `min > max`.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Result<Self, LayoutError> {
        if let (Some(lo), Some(hi)) = (min, max)
            && lo > hi
        {
            return Err(LayoutError::InvalidVersionRange { min: lo, max: hi });
        }
        Ok(Self { min, max })
    }

    /// `[min, ∞)`.
    pub const fn since(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// `(-∞, max)`.
    pub const fn until(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Exactly `version`.
    pub const fn exact(version: f64) -> Self {
        Self {
            min: Some(version),
            max: Some(version),
        }
    }

    /// Inclusive lower bound.
    pub const fn min(&self) -> Option<f64> {
        self.min
    }

    /// Exclusive upper bound.
    pub const fn max(&self) -> Option<f64> {
        self.max
    }

    /// Both sides open.
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// The single version matched by an exact range.
    #[allow(clippy::float_cmp)]
    pub fn exact_version(&self) -> Option<f64> {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    /// Whether `version` falls inside this range.
    #[allow(clippy::float_cmp)]
    pub fn contains(&self, version: Option<f64>) -> bool {
        let Some(v) = version else {
            return self.is_unbounded();
        };
        if let Some(exact) = self.exact_version() {
            return v == exact;
        }
        self.min.is_none_or(|lo| v >= lo) && self.max.is_none_or(|hi| v < hi)
    }

    /// Whether some version is matched by both ranges.
    #[allow(clippy::float_cmp)]
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self.exact_version(), other.exact_version()) {
            (Some(a), Some(b)) => a == b,
            (Some(a), None) => other.contains(Some(a)),
            (None, Some(b)) => self.contains(Some(b)),
            (None, None) => {
                let lo = self
                    .min
                    .unwrap_or(f64::NEG_INFINITY)
                    .max(other.min.unwrap_or(f64::NEG_INFINITY));
                let hi = self
                    .max
                    .unwrap_or(f64::INFINITY)
                    .min(other.max.unwrap_or(f64::INFINITY));
                lo < hi
            }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(v) = self.exact_version() {
            return write!(f, "={v}");
        }
        match self.min {
            Some(lo) => write!(f, "[{lo}, ")?,
            None => f.write_str("(*, ")?,
        }
        match self.max {
            Some(hi) => write!(f, "{hi})"),
            None => f.write_str("*)"),
        }
    }
}

/// An ordered list of `(range, value)` pairs whose ranges never overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    entries: Vec<(VersionRange, T)>,
}

impl<T> Default for Versioned<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Versioned<T> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `range`.
    ///
    /// # Errors
    /// [`LayoutError::AmbiguousLayout`] if `range` overlaps a range already registered.
    pub fn push(&mut self, range: VersionRange, value: T) -> Result<(), LayoutError> {
        if let Some((existing, _)) = self.entries.iter().find(|(r, _)| r.overlaps(&range)) {
            return Err(LayoutError::AmbiguousLayout {
                owner: String::new(),
                subject: format!("ranges {existing} and {range}"),
                version: None,
            });
        }
        self.entries.push((range, value));
        Ok(())
    }

    /// The value whose range contains `version`, if any.
    ///
    /// # Errors
    /// [`LayoutError::AmbiguousLayout`] if more than one range matches.
    pub fn resolve(&self, version: Option<f64>) -> Result<Option<&T>, LayoutError> {
        let mut matches = self
            .entries
            .iter()
            .filter(|(r, _)| r.contains(version))
            .map(|(_, v)| v);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(LayoutError::AmbiguousLayout {
                owner: String::new(),
                subject: "descriptor".to_owned(),
                version,
            });
        }
        Ok(first)
    }

    /// Number of registered ranges.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No ranges registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(range, value)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&VersionRange, &T)> {
        self.entries.iter().map(|(r, v)| (r, v))
    }

    /// The value registered for the unbounded range, if that is the only entry.
    fn unconditional(&self) -> Option<&T> {
        match self.entries.as_slice() {
            [(range, value)] if range.is_unbounded() => Some(value),
            _ => None,
        }
    }
}

/// How a string field is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StringRule {
    /// Exactly `len` bytes. `pad` fills short strings on write. On read, trailing `pad`
    /// characters and NULs are stripped, and `trim` also strips trailing whitespace.
    FixedLength {
        /// Byte length.
        len: usize,
        /// Trim on read.
        trim: bool,
        /// Padding character on write.
        pad: char,
    },
    /// Terminated by a NUL unit. With `max_len`, exactly `max_len` bytes are consumed.
    NullTerminated {
        /// Byte cap.
        max_len: Option<usize>,
    },
    /// An `i32` byte count in the active byte order, then the bytes.
    LengthPrefixed,
}

/// What a field holds, as far as the codec is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A primitive value.
    Primitive(PrimitiveKind),
    /// A C-like enum whose discriminant is stored as the given integer kind.
    Enum(PrimitiveKind),
    /// Text governed by a [`StringRule`].
    String,
    /// Another declared structure, populated recursively.
    Structure,
}

impl FieldKind {
    /// The wire primitive for primitive and enum fields.
    pub const fn primitive(self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) | Self::Enum(kind) => Some(kind),
            Self::String | Self::Structure => None,
        }
    }
}

/// The declared layout of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    name: String,
    index: usize,
    kind: FieldKind,
    presence: VersionRange,
    offsets: Versioned<u64>,
    byte_orders: Versioned<ByteOrder>,
    stored_types: Versioned<PrimitiveKind>,
    data_length: Versioned<()>,
    version_field: bool,
    string_rules: Vec<StringRule>,
    deferred: Option<LayoutError>,
}

impl FieldLayout {
    /// Starts a field declaration. `index` is the number the owning type uses to dispatch
    /// reads and writes to this field.
    pub fn new(name: impl Into<String>, index: usize, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            index,
            kind,
            presence: VersionRange::unbounded(),
            offsets: Versioned::new(),
            byte_orders: Versioned::new(),
            stored_types: Versioned::new(),
            data_length: Versioned::new(),
            version_field: false,
            string_rules: Vec::new(),
            deferred: None,
        }
    }

    fn record(&mut self, result: Result<(), LayoutError>, attribute: &str) {
        if let Err(e) = result
            && self.deferred.is_none()
        {
            let subject = format!("field `{}` {attribute}", self.name);
            self.deferred = Some(match e {
                LayoutError::AmbiguousLayout { owner, subject: detail, version } => {
                    LayoutError::AmbiguousLayout {
                        owner,
                        subject: format!("{subject} ({detail})"),
                        version,
                    }
                }
                other => other,
            });
        }
    }

    /// Places the field at `offset` for versions in `range`.
    pub fn offset(mut self, range: VersionRange, offset: u64) -> Self {
        let result = self.offsets.push(range, offset);
        self.record(result, "offset");
        self
    }

    /// Places the field at `offset` for every version.
    pub fn at(self, offset: u64) -> Self {
        self.offset(VersionRange::unbounded(), offset)
    }

    /// Overrides the byte order for versions in `range`.
    pub fn byte_order(mut self, range: VersionRange, order: ByteOrder) -> Self {
        let result = self.byte_orders.push(range, order);
        self.record(result, "byte order");
        self
    }

    /// Stores the field as `kind` on the wire for versions in `range`.
    pub fn stored_as(mut self, range: VersionRange, kind: PrimitiveKind) -> Self {
        let result = self.stored_types.push(range, kind);
        self.record(result, "stored type");
        self
    }

    /// Marks the field as holding the type's total byte length for versions in `range`.
    pub fn data_length(mut self, range: VersionRange) -> Self {
        let result = self.data_length.push(range, ());
        self.record(result, "data length");
        self
    }

    /// Marks the field as the type's version number.
    pub fn version_field(mut self) -> Self {
        self.version_field = true;
        self
    }

    /// Adds a string rule. String fields need exactly one.
    pub fn string_rule(mut self, rule: StringRule) -> Self {
        self.string_rules.push(rule);
        self
    }

    /// Restricts the versions at which the field exists at all.
    pub fn present(mut self, range: VersionRange) -> Self {
        self.presence = range;
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Field kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Presence range.
    pub fn presence(&self) -> VersionRange {
        self.presence
    }

    /// Declared offsets.
    pub fn offsets(&self) -> &Versioned<u64> {
        &self.offsets
    }

    /// Whether this is the version field.
    pub fn is_version_field(&self) -> bool {
        self.version_field
    }

    fn invalid(&self, reason: impl Into<String>) -> LayoutError {
        LayoutError::InvalidAttribute {
            owner: String::new(),
            field: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if let Some(e) = &self.deferred {
            return Err(e.clone());
        }

        match (self.kind, self.string_rules.len()) {
            (FieldKind::String, 0) => {
                return Err(LayoutError::UnsupportedStringRule {
                    owner: String::new(),
                    field: self.name.clone(),
                });
            }
            (FieldKind::String, 1) => {}
            (FieldKind::String, _) => {
                return Err(LayoutError::ConflictingStringRules {
                    owner: String::new(),
                    field: self.name.clone(),
                });
            }
            (_, 0) => {}
            (_, _) => return Err(self.invalid("string rule on a non-string field")),
        }

        if let Some(StringRule::FixedLength { pad, .. }) = self.string_rules.first()
            && !pad.is_ascii()
        {
            return Err(self.invalid("padding character must be ASCII"));
        }

        if !self.stored_types.is_empty() && self.kind.primitive().is_none() {
            return Err(self.invalid("stored type override requires a primitive or enum field"));
        }

        if !self.data_length.is_empty()
            && !self.kind.primitive().is_some_and(PrimitiveKind::is_integer)
        {
            return Err(LayoutError::InvalidDataLength {
                owner: String::new(),
                field: self.name.clone(),
            });
        }

        if self.version_field {
            let reason = if !matches!(self.kind, FieldKind::Primitive(k) if k.is_numeric()) {
                Some("must be a numeric primitive")
            } else if self.offsets.unconditional().is_none() {
                Some("must have exactly one unconditional offset")
            } else if !self.presence.is_unbounded() {
                Some("must not be version-bound")
            } else if !(self.byte_orders.is_empty() || self.byte_orders.unconditional().is_some())
                || !(self.stored_types.is_empty() || self.stored_types.unconditional().is_some())
            {
                Some("must not have version-dependent byte order or stored type")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(LayoutError::InvalidVersionField {
                    owner: String::new(),
                    field: self.name.clone(),
                    reason,
                });
            }
        }

        Ok(())
    }
}

/// One resolved field of a [`ResolvedLayout`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStep {
    /// Dispatch index of the field.
    pub index: usize,
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
    /// Offset from the type origin.
    pub offset: u64,
    /// Field-level or type-level byte order. `None` means the ambient order.
    pub byte_order: Option<ByteOrder>,
    /// On-wire representation, when it differs from the field type.
    pub stored: Option<PrimitiveKind>,
    /// String framing for string fields.
    pub string: Option<StringRule>,
}

/// A type's layout flattened for one version: the fields to visit, in ascending offset order,
/// and how far the cursor moves afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLayout {
    /// Declaring type.
    pub type_name: String,
    /// The version this layout was resolved for.
    pub version: Option<f64>,
    /// Type-level byte order for this version.
    pub byte_order: Option<ByteOrder>,
    /// Present fields, sorted by offset.
    pub steps: Vec<FieldStep>,
    /// Dispatch index of the data-length field, if one applies.
    pub data_length: Option<usize>,
    /// Declared total size, if one applies.
    pub fixed_size: Option<u64>,
}

/// How to read a type's version field before anything else is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionFieldInfo {
    /// Dispatch index.
    pub index: usize,
    /// Offset from the type origin.
    pub offset: u64,
    /// Field-level order, else the unconditional type-level order.
    pub byte_order: Option<ByteOrder>,
    /// On-wire representation override.
    pub stored: Option<PrimitiveKind>,
    /// Field kind.
    pub kind: FieldKind,
}

/// The complete declared layout of a type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLayout {
    name: String,
    fields: Vec<FieldLayout>,
    fixed_sizes: Versioned<u64>,
    byte_orders: Versioned<ByteOrder>,
}

impl TypeLayout {
    /// Starts a layout for the type called `name`.
    pub fn builder(name: impl Into<String>) -> TypeLayoutBuilder {
        TypeLayoutBuilder {
            name: name.into(),
            fields: Vec::new(),
            fixed_sizes: Versioned::new(),
            byte_orders: Versioned::new(),
            deferred: None,
        }
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Declared fixed sizes.
    pub fn fixed_sizes(&self) -> &Versioned<u64> {
        &self.fixed_sizes
    }

    /// Checks everything that can be checked without a version.
    ///
    /// # Errors
    /// Any [`LayoutError`] describing the first defect found.
    pub fn validate(&self) -> Result<(), LayoutError> {
        self.validate_inner().map_err(|e| e.owned_by(&self.name))
    }

    fn validate_inner(&self) -> Result<(), LayoutError> {
        for field in &self.fields {
            field.validate()?;
        }

        if self.fields.iter().filter(|f| f.version_field).count() > 1 {
            return Err(LayoutError::MultipleVersionFields {
                owner: String::new(),
            });
        }

        let markers: Vec<&FieldLayout> = self
            .fields
            .iter()
            .filter(|f| !f.data_length.is_empty())
            .collect();
        for (i, a) in markers.iter().enumerate() {
            for b in &markers[i + 1..] {
                let collides = a.data_length.iter().any(|(ra, _)| {
                    b.data_length
                        .iter()
                        .any(|(rb, _)| ra.overlaps(rb) && a.presence.overlaps(&b.presence))
                });
                if collides {
                    return Err(LayoutError::MultipleDataLengthFields {
                        owner: String::new(),
                        version: None,
                    });
                }
            }
        }

        Ok(())
    }

    /// Where and how to read the version field, if the type has one.
    pub fn version_field(&self) -> Option<VersionFieldInfo> {
        let field = self.fields.iter().find(|f| f.version_field)?;
        let offset = *field.offsets.unconditional()?;
        let type_order = self.byte_orders.unconditional().copied();
        Some(VersionFieldInfo {
            index: field.index,
            offset,
            byte_order: field.byte_orders.unconditional().copied().or(type_order),
            stored: field.stored_types.unconditional().copied(),
            kind: field.kind,
        })
    }

    /// Flattens the layout for `version`.
    ///
    /// # Errors
    /// - [`LayoutError::AmbiguousLayout`] if an attribute has more than one match.
    /// - [`LayoutError::MissingLayout`] if a present field has no offset.
    /// - [`LayoutError::MultipleDataLengthFields`] if two fields claim the data length.
    pub fn resolve(&self, version: Option<f64>) -> Result<ResolvedLayout, LayoutError> {
        self.resolve_inner(version)
            .map_err(|e| e.owned_by(&self.name))
    }

    fn resolve_inner(&self, version: Option<f64>) -> Result<ResolvedLayout, LayoutError> {
        let ambiguous = |what: String| {
            move |_: LayoutError| LayoutError::AmbiguousLayout {
                owner: String::new(),
                subject: what,
                version,
            }
        };

        let byte_order = self
            .byte_orders
            .resolve(version)
            .map_err(ambiguous("type byte order".to_owned()))?
            .copied();
        let fixed_size = self
            .fixed_sizes
            .resolve(version)
            .map_err(ambiguous("fixed size".to_owned()))?
            .copied();

        let mut steps = Vec::with_capacity(self.fields.len());
        let mut data_length = None;

        for field in &self.fields {
            if !field.presence.contains(version) {
                continue;
            }
            let name = &field.name;
            let offset = *field
                .offsets
                .resolve(version)
                .map_err(ambiguous(format!("field `{name}` offset")))?
                .ok_or_else(|| LayoutError::MissingLayout {
                    owner: String::new(),
                    field: name.clone(),
                    version,
                })?;
            let field_order = field
                .byte_orders
                .resolve(version)
                .map_err(ambiguous(format!("field `{name}` byte order")))?
                .copied();
            let stored = field
                .stored_types
                .resolve(version)
                .map_err(ambiguous(format!("field `{name}` stored type")))?
                .copied();
            let is_length = field
                .data_length
                .resolve(version)
                .map_err(ambiguous(format!("field `{name}` data length")))?
                .is_some();

            if is_length && data_length.replace(field.index).is_some() {
                return Err(LayoutError::MultipleDataLengthFields {
                    owner: String::new(),
                    version,
                });
            }

            steps.push(FieldStep {
                index: field.index,
                name: name.clone(),
                kind: field.kind,
                offset,
                byte_order: field_order.or(byte_order),
                stored,
                string: field.string_rules.first().copied(),
            });
        }

        steps.sort_by_key(|s| s.offset);

        Ok(ResolvedLayout {
            type_name: self.name.clone(),
            version,
            byte_order,
            steps,
            data_length,
            fixed_size,
        })
    }
}

/// Builder for [`TypeLayout`]. Errors from chained calls are reported by [`Self::build`].
#[derive(Debug)]
pub struct TypeLayoutBuilder {
    name: String,
    fields: Vec<FieldLayout>,
    fixed_sizes: Versioned<u64>,
    byte_orders: Versioned<ByteOrder>,
    deferred: Option<LayoutError>,
}

impl TypeLayoutBuilder {
    fn record(&mut self, result: Result<(), LayoutError>, attribute: &str) {
        if let Err(LayoutError::AmbiguousLayout { owner, subject, version }) = result
            && self.deferred.is_none()
        {
            self.deferred = Some(LayoutError::AmbiguousLayout {
                owner,
                subject: format!("{attribute} ({subject})"),
                version,
            });
        }
    }

    /// Declares the total byte size of the type for versions in `range`.
    pub fn fixed_size(mut self, range: VersionRange, size: u64) -> Self {
        let result = self.fixed_sizes.push(range, size);
        self.record(result, "fixed size");
        self
    }

    /// Declares the byte order of the type for versions in `range`.
    pub fn byte_order(mut self, range: VersionRange, order: ByteOrder) -> Self {
        let result = self.byte_orders.push(range, order);
        self.record(result, "type byte order");
        self
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldLayout) -> Self {
        self.fields.push(field);
        self
    }

    /// Validates and finishes the layout.
    ///
    /// # Errors
    /// The first [`LayoutError`] found.
    pub fn build(self) -> Result<TypeLayout, LayoutError> {
        if let Some(e) = self.deferred {
            return Err(e.owned_by(&self.name));
        }
        let layout = TypeLayout {
            name: self.name,
            fields: self.fields,
            fixed_sizes: self.fixed_sizes,
            byte_orders: self.byte_orders,
        };
        layout.validate()?;
        Ok(layout)
    }
}
