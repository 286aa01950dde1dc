//! Procedural macros for the `demand` crate.
//!
//! This crate provides `#[derive(Identifiable)]`, which assigns a request
//! kind its registry identity: a zone, an id local to that zone and a
//! display name.
//!
//! # Usage
//!
//! ```ignore
//! use demand::Identifiable;
//!
//! #[derive(Identifiable)]
//! #[request_kind(zone = 10, local_id = 0)]
//! struct SuperclassTypeRequest {
//!     class: demand::Id<ClassDecl>,
//! }
//!
//! #[derive(Identifiable)]
//! #[request_kind(zone = 10, local_id = 1, name = "IsFinal")]
//! struct IsFinalRequest {
//!     class: demand::Id<ClassDecl>,
//! }
//! ```
//!
//! # Restrictions
//!
//! A request kind is one registry entry, so the type can't be generic:
//! lifetime, const and type parameters are all rejected.

use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, Error, Expr, LitStr, Meta, parse_macro_input};

/// Derives the `Identifiable` trait for a request type.
///
/// # Attribute
///
/// `#[request_kind(zone = .., local_id = .., name = "..")]`
///
/// - `zone`: a `u8` expression naming the zone of the component declaring
///   the request
/// - `local_id`: a `u8` expression unique within the zone
/// - `name` (optional): the display name, defaults to the type name
/// - `crate` (optional): the path of the `demand` crate, defaults to
///   `::demand`
///
/// # Generated Implementation
///
/// ```ignore
/// impl ::demand::Identifiable for IsFinalRequest {
///     const REQUEST_KIND: ::demand::RequestKind =
///         ::demand::RequestKind::new::<Self>(
///             ::demand::Zone::new(10),
///             1,
///             "IsFinal",
///         );
/// }
/// ```
///
/// # Error Cases
///
/// ```compile_fail
/// # use demand::Identifiable;
/// #[derive(Identifiable)] // ❌ missing `#[request_kind(..)]`
/// struct Unnamed;
/// ```
///
/// ```compile_fail
/// # use demand::Identifiable;
/// #[derive(Identifiable)]
/// #[request_kind(zone = 1, local_id = 0)]
/// struct Borrowed<'a> {  // ❌ lifetime parameters not allowed
///     name: &'a str,
/// }
/// ```
#[proc_macro_derive(Identifiable, attributes(request_kind))]
pub fn derive_identifiable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_identifiable_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct RequestKindAttribute {
    zone: Expr,
    local_id: Expr,
    name: Option<LitStr>,
    crate_path: syn::Path,
}

fn derive_identifiable_impl(
    input: &DeriveInput,
) -> Result<proc_macro2::TokenStream, Error> {
    let name = &input.ident;

    if let Some(lt_param) = input.generics.lifetimes().next() {
        return Err(Error::new_spanned(
            lt_param,
            "lifetime parameters are not allowed in request kinds",
        ));
    }
    if let Some(const_param) = input.generics.const_params().next() {
        return Err(Error::new_spanned(
            const_param,
            "constant parameters are not allowed in request kinds",
        ));
    }
    if let Some(ty_param) = input.generics.type_params().next() {
        return Err(Error::new_spanned(
            ty_param,
            "type parameters are not allowed in request kinds; every \
             request kind is a single registry entry",
        ));
    }

    let attribute = input
        .attrs
        .iter()
        .find(|attr| attr.path().is_ident("request_kind"))
        .ok_or_else(|| {
            Error::new_spanned(
                name,
                "missing #[request_kind(zone = .., local_id = ..)] attribute \
                 - Identifiable derive requires the registry identity",
            )
        })?;

    let Meta::List(meta_list) = &attribute.meta else {
        return Err(Error::new_spanned(
            attribute,
            "expected #[request_kind(zone = .., local_id = ..)] format",
        ));
    };

    let RequestKindAttribute { zone, local_id, name: display, crate_path } =
        parse_request_kind_attribute(&meta_list.tokens)?;

    let display = display.unwrap_or_else(|| {
        LitStr::new(&name.to_string(), name.span())
    });

    Ok(quote! {
        impl #crate_path::Identifiable for #name {
            const REQUEST_KIND: #crate_path::RequestKind =
                #crate_path::RequestKind::new::<Self>(
                    #crate_path::Zone::new(#zone),
                    #local_id,
                    #display,
                );
        }
    })
}

/// Parse the #[request_kind(...)] attribute
fn parse_request_kind_attribute(
    tokens: &proc_macro2::TokenStream,
) -> Result<RequestKindAttribute, Error> {
    let mut zone: Option<Expr> = None;
    let mut local_id: Option<Expr> = None;
    let mut name: Option<LitStr> = None;
    let mut crate_path: Option<syn::Path> = None;

    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("zone") {
            zone = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("local_id") {
            local_id = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("crate") {
            crate_path = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("expected `zone`, `local_id`, `name` or `crate`"))
        }
    });

    syn::parse::Parser::parse2(parser, tokens.clone())?;

    let zone = zone.ok_or_else(|| {
        Error::new_spanned(tokens, "missing `zone` argument in request_kind")
    })?;
    let local_id = local_id.ok_or_else(|| {
        Error::new_spanned(
            tokens,
            "missing `local_id` argument in request_kind",
        )
    })?;

    Ok(RequestKindAttribute {
        zone,
        local_id,
        name,
        crate_path: crate_path.unwrap_or_else(|| syn::parse_quote!(::demand)),
    })
}
