// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! `#[derive(Protect)]`: the build-time member introspection front-end
//! (C1). Walks a `#[repr(C)]` struct's named fields and emits an `unsafe
//! impl gop::member::ChecksummedLayout`, the member table
//! `generate`/`check`/`repair` plan from.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Fields, Type};

/// FNV-1a, 32-bit: a stable, `const`-evaluable-by-construction hash of the
/// struct's own name, computed once at macro-expansion time and baked in
/// as a literal (§9 supplemented "Per-target `HASHCODE`" — `type_name` is
/// not usable in `const` context on stable Rust, so the derive computes
/// the seed itself instead of deferring it to runtime).
fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[proc_macro_derive(Protect, attributes(gop))]
pub fn derive_protect(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    derive_protect_inner(&ast).unwrap_or_else(|e| e).into()
}

fn derive_protect_inner(
    ast: &DeriveInput,
) -> Result<proc_macro2::TokenStream, proc_macro2::TokenStream> {
    ensure_repr_c(ast)?;

    let Data::Struct(data) = &ast.data else {
        return Err(syn::Error::new(
            ast.span(),
            "#[derive(Protect)] only supports structs",
        )
        .to_compile_error());
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            ast.span(),
            "#[derive(Protect)] requires named fields",
        )
        .to_compile_error());
    };

    reject_trailing_unsized_array(fields)?;

    let ident = &ast.ident;
    let mut members = Vec::new();
    for field in &fields.named {
        if field_skipped(field)? {
            continue;
        }
        members.push(member_entry(ident, field)?);
    }

    let hashcode = fnv1a_32(ident.to_string().as_bytes());

    Ok(quote! {
        #[automatically_derived]
        // SAFETY: every emitted `Member` describes a named field of
        // `#ident`, which `ensure_repr_c` has checked is `#[repr(C)]`, so
        // `offset`/`size` are accurate and the byte range cannot straddle
        // into another field or past `size_of::<#ident>()`.
        unsafe impl ::gop::member::ChecksummedLayout for #ident {
            const MEMBERS: &'static [::gop::member::Member] = &[
                #(#members),*
            ];
            const HASHCODE: u32 = #hashcode;
        }
    })
}

fn ensure_repr_c(ast: &DeriveInput) -> Result<(), proc_macro2::TokenStream> {
    let mut repr_c = false;
    for attr in &ast.attrs {
        if attr.path().is_ident("repr") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("C") {
                    repr_c = true;
                }
                Ok(())
            })
            .map_err(|e| e.to_compile_error())?;
        }
    }
    if repr_c {
        Ok(())
    } else {
        Err(
            syn::Error::new(ast.span(), "#[derive(Protect)] requires #[repr(C)]")
                .to_compile_error(),
        )
    }
}

/// Rejects a trailing unsized array field (§4.1: "REJECTED at build
/// time"). Only the last field can be unsized at all in a well-formed
/// struct, so checking it is sufficient.
fn reject_trailing_unsized_array(fields: &syn::FieldsNamed) -> Result<(), proc_macro2::TokenStream> {
    if let Some(last) = fields.named.last() {
        if matches!(&last.ty, Type::Slice(_)) {
            return Err(syn::Error::new(
                last.span(),
                "#[derive(Protect)] does not support a trailing unsized array member",
            )
            .to_compile_error());
        }
    }
    Ok(())
}

fn field_skipped(field: &syn::Field) -> Result<bool, proc_macro2::TokenStream> {
    for attr in &field.attrs {
        if !attr.path().is_ident("gop") {
            continue;
        }
        let mut skip = false;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
            }
            Ok(())
        })
        .map_err(|e| e.to_compile_error())?;
        if skip {
            return Ok(true);
        }
    }
    Ok(false)
}

fn field_forced_public(field: &syn::Field) -> Result<bool, proc_macro2::TokenStream> {
    for attr in &field.attrs {
        if !attr.path().is_ident("gop") {
            continue;
        }
        let mut public = false;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("public") {
                public = true;
            }
            Ok(())
        })
        .map_err(|e| e.to_compile_error())?;
        if public {
            return Ok(true);
        }
    }
    Ok(false)
}

const SCALAR_IDENTS: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
    "usize", "f32", "f64",
];

fn is_scalar_type(ty: &Type) -> bool {
    match ty {
        Type::Path(p) => p
            .path
            .get_ident()
            .is_some_and(|ident| SCALAR_IDENTS.contains(&ident.to_string().as_str())),
        _ => false,
    }
}

fn member_entry(
    struct_ident: &syn::Ident,
    field: &syn::Field,
) -> Result<proc_macro2::TokenStream, proc_macro2::TokenStream> {
    let field_ident = field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new(field.span(), "tuple fields are not supported").to_compile_error())?;
    let name_lit = syn::LitStr::new(&field_ident.to_string(), Span::call_site());

    let kind = match &field.ty {
        ty if is_scalar_type(ty) => quote! { ::gop::member::Kind::Scalar },
        Type::Array(array) if is_scalar_type(&array.elem) => {
            quote! { ::gop::member::Kind::ScalarArray }
        }
        _ => quote! { ::gop::member::Kind::Record },
    };

    let is_public = matches!(field.vis, syn::Visibility::Public(_)) || field_forced_public(field)?;
    let visibility = if is_public {
        quote! { ::gop::member::Visibility::Public }
    } else {
        quote! { ::gop::member::Visibility::Private }
    };

    let ty = &field.ty;
    Ok(quote! {
        ::gop::member::Member {
            name: #name_lit,
            offset: ::core::mem::offset_of!(#struct_ident, #field_ident),
            size: ::core::mem::size_of::<#ty>(),
            kind: #kind,
            visibility: #visibility,
            variant: ::gop::member::Variant::Instance,
            is_const: false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_is_deterministic_and_name_sensitive() {
        assert_eq!(fnv1a_32(b"Rectangle"), fnv1a_32(b"Rectangle"));
        assert_ne!(fnv1a_32(b"Rectangle"), fnv1a_32(b"Square"));
    }
}
