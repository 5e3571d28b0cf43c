//! # layoutio Derive Macros
//!
//! This crate provides the procedural macros for `layoutio`:
//!
//! * `#[derive(Structure)]` turns `#[layout(...)]` attributes on a struct and its fields into a
//!   static `TypeLayout` plus per-field read and write dispatch.
//! * `#[derive(LayoutEnum)]` lets a C-like enum with an integer `#[repr]` be used as a field.
//!
//! Compatible with `syn 2.0`.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Data, DeriveInput, Fields, Lit, LitChar, LitInt, LitStr, parse_macro_input};

/// Derives `layoutio::Structure` and `layoutio::FieldValue`.
///
/// Type attributes, each optionally scoped with `min_version`, `max_version` or `version`:
/// `fixed_size = N`, `byte_order = "big" | "little"`.
///
/// Field attributes: `offset = N`, `byte_order = "..."`, `store = "u16"` and `data_length`
/// (each scoped by the versions given in the same attribute), `version_field`,
/// `fixed_length = N`, `trim`, `pad = 'c'` (space by default), `null_terminated`,
/// `max_length = N`, `length_prefixed`, and the presence bounds `since = V`, `until = V`,
/// `only = V`.
///
/// Fields without any `offset` are not part of the layout and keep their default value.
#[proc_macro_derive(Structure, attributes(layout))]
pub fn derive_structure(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_structure(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Derives `layoutio::FieldValue` for a field-less enum with an integer `#[repr]`.
#[proc_macro_derive(LayoutEnum)]
pub fn derive_layout_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_enum(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

// --- Attribute model ---

#[derive(Default, Clone, Copy)]
struct Scope {
    min: Option<f64>,
    max: Option<f64>,
    exact: Option<f64>,
}

impl Scope {
    fn tokens(&self) -> proc_macro2::TokenStream {
        match (self.exact, self.min, self.max) {
            (Some(v), _, _) => quote! { layoutio::layout::VersionRange::exact(#v) },
            (None, None, None) => quote! { layoutio::layout::VersionRange::unbounded() },
            (None, Some(lo), None) => quote! { layoutio::layout::VersionRange::since(#lo) },
            (None, None, Some(hi)) => quote! { layoutio::layout::VersionRange::until(#hi) },
            (None, Some(lo), Some(hi)) => quote! {
                layoutio::layout::VersionRange::new(::core::option::Option::Some(#lo), ::core::option::Option::Some(#hi))?
            },
        }
    }

    /// Tries to consume a version key. Returns `false` if `meta` is something else.
    fn parse(&mut self, meta: &ParseNestedMeta<'_>) -> syn::Result<bool> {
        let slot = if meta.path.is_ident("min_version") {
            &mut self.min
        } else if meta.path.is_ident("max_version") {
            &mut self.max
        } else if meta.path.is_ident("version") {
            &mut self.exact
        } else {
            return Ok(false);
        };
        *slot = Some(parse_version(meta)?);
        Ok(true)
    }

    fn check(&self, span: Span) -> syn::Result<()> {
        if self.exact.is_some() && (self.min.is_some() || self.max.is_some()) {
            return Err(syn::Error::new(
                span,
                "`version` cannot be combined with `min_version` or `max_version`",
            ));
        }
        if let (Some(lo), Some(hi)) = (self.min, self.max)
            && lo > hi
        {
            return Err(syn::Error::new(span, "`min_version` is greater than `max_version`"));
        }
        Ok(())
    }
}

fn parse_version(meta: &ParseNestedMeta<'_>) -> syn::Result<f64> {
    let lit: Lit = meta.value()?.parse()?;
    match lit {
        Lit::Float(f) => f.base10_parse(),
        Lit::Int(i) => i.base10_parse(),
        other => Err(syn::Error::new(other.span(), "expected a numeric version")),
    }
}

fn parse_usize(meta: &ParseNestedMeta<'_>) -> syn::Result<usize> {
    let lit: LitInt = meta.value()?.parse()?;
    lit.base10_parse()
}

fn parse_byte_order(meta: &ParseNestedMeta<'_>) -> syn::Result<proc_macro2::TokenStream> {
    let s: LitStr = meta.value()?.parse()?;
    match s.value().to_lowercase().as_str() {
        "big" | "be" | "big_endian" => Ok(quote! { layoutio::ByteOrder::BigEndian }),
        "little" | "le" | "little_endian" => Ok(quote! { layoutio::ByteOrder::LittleEndian }),
        _ => Err(syn::Error::new(s.span(), "Unknown byte order. Supported: big, little")),
    }
}

fn parse_primitive(meta: &ParseNestedMeta<'_>) -> syn::Result<proc_macro2::TokenStream> {
    let s: LitStr = meta.value()?.parse()?;
    let variant = match s.value().to_lowercase().as_str() {
        "bool" => "Bool",
        "u8" => "U8",
        "i8" => "I8",
        "u16" => "U16",
        "i16" => "I16",
        "u32" => "U32",
        "i32" => "I32",
        "u64" => "U64",
        "i64" => "I64",
        "f16" => "F16",
        "f32" => "F32",
        "f64" => "F64",
        "decimal" => "Decimal",
        "guid" => "Guid",
        _ => return Err(syn::Error::new(s.span(), "Unknown stored type")),
    };
    let ident = syn::Ident::new(variant, s.span());
    Ok(quote! { layoutio::PrimitiveKind::#ident })
}

// --- Type-level attributes ---

fn parse_type_attributes(attrs: &[Attribute]) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut calls = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("layout") {
            continue;
        }
        let mut scope = Scope::default();
        let mut fixed_size: Option<u64> = None;
        let mut byte_order = None;

        attr.parse_nested_meta(|meta| {
            if scope.parse(&meta)? {
                return Ok(());
            }
            if meta.path.is_ident("fixed_size") {
                let lit: LitInt = meta.value()?.parse()?;
                fixed_size = Some(lit.base10_parse()?);
                return Ok(());
            }
            if meta.path.is_ident("byte_order") {
                byte_order = Some(parse_byte_order(&meta)?);
                return Ok(());
            }
            Err(meta.error(
                "Unknown layout attribute key. Supported: fixed_size, byte_order, min_version, max_version, version",
            ))
        })?;

        scope.check(Span::call_site())?;
        let range = scope.tokens();
        if fixed_size.is_none() && byte_order.is_none() {
            return Err(syn::Error::new_spanned(
                attr,
                "expected `fixed_size` or `byte_order`",
            ));
        }
        if let Some(size) = fixed_size {
            calls.push(quote! { .fixed_size(#range, #size) });
        }
        if let Some(order) = byte_order {
            calls.push(quote! { .byte_order(#range, #order) });
        }
    }
    Ok(calls)
}

// --- Field-level attributes ---

struct LayoutField {
    ident: syn::Ident,
    ty: syn::Type,
    calls: Vec<proc_macro2::TokenStream>,
}

#[derive(Default)]
struct StringAttrs {
    fixed_length: Option<usize>,
    trim: bool,
    pad: Option<char>,
    null_terminated: bool,
    max_length: Option<usize>,
    length_prefixed: bool,
}

/// Parses the field's `#[layout]` attributes. Returns `None` for fields with no offset.
fn parse_field(field: &syn::Field) -> syn::Result<Option<LayoutField>> {
    let Some(ident) = field.ident.clone() else {
        return Err(syn::Error::new_spanned(field, "Structure requires named fields"));
    };

    let mut calls = Vec::new();
    let mut has_offset = false;
    let mut has_other = false;
    let mut version_field = false;
    let mut strings = StringAttrs::default();
    let mut presence = Scope::default();

    for attr in &field.attrs {
        if !attr.path().is_ident("layout") {
            continue;
        }
        let mut scope = Scope::default();
        let mut scoped = Vec::new();

        attr.parse_nested_meta(|meta| {
            if scope.parse(&meta)? {
                return Ok(());
            }
            let path = &meta.path;
            if path.is_ident("offset") {
                let lit: LitInt = meta.value()?.parse()?;
                let offset: u64 = lit.base10_parse()?;
                has_offset = true;
                scoped.push(Scoped::Offset(offset));
            } else if path.is_ident("byte_order") {
                scoped.push(Scoped::ByteOrder(parse_byte_order(&meta)?));
            } else if path.is_ident("store") {
                scoped.push(Scoped::Store(parse_primitive(&meta)?));
            } else if path.is_ident("data_length") {
                scoped.push(Scoped::DataLength);
            } else if path.is_ident("version_field") {
                version_field = true;
            } else if path.is_ident("fixed_length") {
                strings.fixed_length = Some(parse_usize(&meta)?);
            } else if path.is_ident("trim") {
                strings.trim = true;
            } else if path.is_ident("pad") {
                let lit: LitChar = meta.value()?.parse()?;
                strings.pad = Some(lit.value());
            } else if path.is_ident("null_terminated") {
                strings.null_terminated = true;
            } else if path.is_ident("max_length") {
                strings.max_length = Some(parse_usize(&meta)?);
            } else if path.is_ident("length_prefixed") {
                strings.length_prefixed = true;
            } else if path.is_ident("since") {
                presence.min = Some(parse_version(&meta)?);
            } else if path.is_ident("until") {
                presence.max = Some(parse_version(&meta)?);
            } else if path.is_ident("only") {
                presence.exact = Some(parse_version(&meta)?);
            } else {
                return Err(meta.error(
                    "Unknown layout attribute key. Supported: offset, byte_order, store, data_length, version_field, fixed_length, trim, pad, null_terminated, max_length, length_prefixed, since, until, only, min_version, max_version, version",
                ));
            }
            has_other |= !path.is_ident("offset");
            Ok(())
        })?;

        scope.check(Span::call_site())?;
        let range = scope.tokens();
        for item in scoped {
            calls.push(match item {
                Scoped::Offset(offset) => quote! { .offset(#range, #offset) },
                Scoped::ByteOrder(order) => quote! { .byte_order(#range, #order) },
                Scoped::Store(kind) => quote! { .stored_as(#range, #kind) },
                Scoped::DataLength => quote! { .data_length(#range) },
            });
        }
    }

    if !has_offset {
        if has_other {
            return Err(syn::Error::new_spanned(
                &ident,
                "layout attributes require at least one `offset`",
            ));
        }
        return Ok(None);
    }

    if version_field {
        calls.push(quote! { .version_field() });
    }
    calls.extend(string_rules(&ident, &strings)?);
    presence.check(ident.span())?;
    if presence.exact.is_some() || presence.min.is_some() || presence.max.is_some() {
        let range = presence.tokens();
        calls.push(quote! { .present(#range) });
    }

    Ok(Some(LayoutField {
        ident,
        ty: field.ty.clone(),
        calls,
    }))
}

enum Scoped {
    Offset(u64),
    ByteOrder(proc_macro2::TokenStream),
    Store(proc_macro2::TokenStream),
    DataLength,
}

fn string_rules(
    ident: &syn::Ident,
    strings: &StringAttrs,
) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let mut rules = Vec::new();
    if let Some(len) = strings.fixed_length {
        let trim = strings.trim;
        let pad = strings.pad.unwrap_or(' ');
        rules.push(quote! {
            .string_rule(layoutio::layout::StringRule::FixedLength { len: #len, trim: #trim, pad: #pad })
        });
    } else if strings.trim || strings.pad.is_some() {
        return Err(syn::Error::new_spanned(
            ident,
            "`trim` and `pad` require `fixed_length`",
        ));
    }

    if strings.null_terminated {
        let max_len = match strings.max_length {
            Some(cap) => quote! { ::core::option::Option::Some(#cap) },
            None => quote! { ::core::option::Option::None },
        };
        rules.push(quote! {
            .string_rule(layoutio::layout::StringRule::NullTerminated { max_len: #max_len })
        });
    } else if strings.max_length.is_some() {
        return Err(syn::Error::new_spanned(
            ident,
            "`max_length` requires `null_terminated`",
        ));
    }

    if strings.length_prefixed {
        rules.push(quote! { .string_rule(layoutio::layout::StringRule::LengthPrefixed) });
    }
    Ok(rules)
}

// --- Generator: Structure ---

fn expand_structure(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Structure cannot be derived for generic types",
        ));
    }
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(name.span(), "Structure only supports structs"));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(
            name.span(),
            "Structure requires a struct with named fields",
        ));
    };

    let type_calls = parse_type_attributes(&input.attrs)?;
    let mut fields = Vec::new();
    for field in &named.named {
        if let Some(f) = parse_field(field)? {
            fields.push(f);
        }
    }

    let type_name = name.to_string();
    let field_decls = fields.iter().enumerate().map(|(index, f)| {
        let fname = f.ident.to_string();
        let ty = &f.ty;
        let calls = &f.calls;
        quote! {
            .field(
                layoutio::layout::FieldLayout::new(#fname, #index, <#ty as layoutio::FieldValue>::KIND)
                    #(#calls)*
            )
        }
    });

    let read_arms = fields.iter().enumerate().map(|(index, f)| {
        let ident = &f.ident;
        let ty = &f.ty;
        quote! {
            #index => {
                self.#ident = <#ty as layoutio::FieldValue>::read_field(reader, spec)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    let write_arms = fields.iter().enumerate().map(|(index, f)| {
        let ident = &f.ident;
        quote! { #index => layoutio::FieldValue::write_field(&self.#ident, writer, spec), }
    });

    let number_arms = fields.iter().enumerate().map(|(index, f)| {
        let ident = &f.ident;
        quote! { #index => layoutio::FieldValue::as_number(&self.#ident), }
    });

    Ok(quote! {
        impl layoutio::Structure for #name {
            fn layout() -> layoutio::Result<&'static layoutio::layout::TypeLayout> {
                static LAYOUT: layoutio::rt::LayoutCell = layoutio::rt::LayoutCell::new();

                fn build() -> ::core::result::Result<layoutio::layout::TypeLayout, layoutio::LayoutError> {
                    layoutio::layout::TypeLayout::builder(#type_name)
                        #(#type_calls)*
                        #(#field_decls)*
                        .build()
                }

                layoutio::rt::registered(&LAYOUT, build)
            }

            fn read_field<R: ::std::io::Read + ::std::io::Seek>(
                &mut self,
                index: usize,
                reader: &mut layoutio::EndianReader<R>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<()> {
                match index {
                    #(#read_arms)*
                    _ => ::core::result::Result::Err(layoutio::rt::unknown_field(#type_name, index)),
                }
            }

            fn write_field<W: ::std::io::Write + ::std::io::Seek>(
                &self,
                index: usize,
                writer: &mut layoutio::EndianWriter<W>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<()> {
                match index {
                    #(#write_arms)*
                    _ => ::core::result::Result::Err(layoutio::rt::unknown_field(#type_name, index)),
                }
            }

            fn field_number(&self, index: usize) -> ::core::option::Option<f64> {
                match index {
                    #(#number_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl layoutio::FieldValue for #name {
            const KIND: layoutio::layout::FieldKind = layoutio::layout::FieldKind::Structure;

            fn read_field<R: ::std::io::Read + ::std::io::Seek>(
                reader: &mut layoutio::EndianReader<R>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<Self> {
                layoutio::engine::read_nested(reader, spec)
            }

            fn write_field<W: ::std::io::Write + ::std::io::Seek>(
                &self,
                writer: &mut layoutio::EndianWriter<W>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<()> {
                layoutio::engine::write_nested(writer, self, spec)
            }
        }
    })
}

// --- Generator: LayoutEnum ---

const INTEGER_REPRS: &[&str] = &["u8", "i8", "u16", "i16", "u32", "i32", "u64", "i64"];

fn expand_enum(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new(name.span(), "LayoutEnum only supports enums"));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new(name.span(), "LayoutEnum requires at least one variant"));
    }

    let mut repr = None;
    for attr in &input.attrs {
        if attr.path().is_ident("repr") {
            attr.parse_nested_meta(|meta| {
                if let Some(ident) = meta.path.get_ident()
                    && INTEGER_REPRS.contains(&ident.to_string().as_str())
                {
                    repr = Some(ident.clone());
                }
                Ok(())
            })?;
        }
    }
    let Some(repr) = repr else {
        return Err(syn::Error::new(
            name.span(),
            "LayoutEnum requires an integer #[repr], e.g. #[repr(u16)]",
        ));
    };

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "LayoutEnum variants cannot have fields",
            ));
        }
        variants.push(&variant.ident);
    }

    let enum_name = name.to_string();
    let decode = variants.iter().map(|v| {
        quote! {
            if raw == #name::#v as #repr {
                return ::core::result::Result::Ok(#name::#v);
            }
        }
    });
    let encode = variants.iter().map(|v| quote! { #name::#v => #name::#v as #repr, });
    let encode_again = encode.clone();

    Ok(quote! {
        impl layoutio::FieldValue for #name {
            const KIND: layoutio::layout::FieldKind = layoutio::layout::FieldKind::Enum(
                <#repr as layoutio::field::Primitive>::KIND,
            );

            fn read_field<R: ::std::io::Read + ::std::io::Seek>(
                reader: &mut layoutio::EndianReader<R>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<Self> {
                let raw = <#repr as layoutio::FieldValue>::read_field(reader, spec)?;
                #(#decode)*
                ::core::result::Result::Err(layoutio::rt::unknown_discriminant(
                    spec.name,
                    #enum_name,
                    <#repr as layoutio::field::Primitive>::KIND,
                ))
            }

            fn write_field<W: ::std::io::Write + ::std::io::Seek>(
                &self,
                writer: &mut layoutio::EndianWriter<W>,
                spec: &layoutio::FieldSpec<'_>,
            ) -> layoutio::Result<()> {
                let raw: #repr = match self { #(#encode)* };
                layoutio::FieldValue::write_field(&raw, writer, spec)
            }

            fn as_number(&self) -> ::core::option::Option<f64> {
                let raw: #repr = match self { #(#encode_again)* };
                layoutio::FieldValue::as_number(&raw)
            }
        }
    })
}
