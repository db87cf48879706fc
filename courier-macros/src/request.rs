//! Request derives.
//!
//! This module contains:
//! - `request_impl` - expansion of `#[derive(Request)]`
//! - `stream_request_impl` - expansion of `#[derive(StreamRequest)]`

use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    Attribute, DeriveInput, Expr, Ident, LitInt, Token, Type,
    parse::{Parse, ParseStream},
};

struct RequestArgs {
    response: Option<Type>,
    cache_key: Option<Expr>,
    ttl_secs: Option<u64>,
}

impl Parse for RequestArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut response = None;
        let mut cache_key = None;
        let mut ttl_secs = None;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;
            input.parse::<Token![=]>()?;

            match ident.to_string().as_str() {
                "response" => response = Some(input.parse()?),
                "cache_key" => cache_key = Some(input.parse()?),
                "ttl_secs" => {
                    let lit: LitInt = input.parse()?;
                    ttl_secs = Some(lit.base10_parse()?);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!("unknown request attribute: {other}"),
                    ));
                }
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(RequestArgs {
            response,
            cache_key,
            ttl_secs,
        })
    }
}

struct StreamArgs {
    item: Type,
}

impl Parse for StreamArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let ident: Ident = input.parse()?;
        if ident != "item" {
            return Err(syn::Error::new(
                ident.span(),
                format!("unknown stream_request attribute: {ident}"),
            ));
        }
        input.parse::<Token![=]>()?;
        let item = input.parse()?;
        if input.peek(Token![,]) {
            input.parse::<Token![,]>()?;
        }
        Ok(StreamArgs { item })
    }
}

fn find_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|attr| attr.path().is_ident(name))
}

pub(crate) fn request_impl(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let args = match find_attr(&input.attrs, "request") {
        Some(attr) => attr.parse_args::<RequestArgs>()?,
        None => RequestArgs {
            response: None,
            cache_key: None,
            ttl_secs: None,
        },
    };

    let response = args
        .response
        .map_or_else(|| quote! { () }, |ty| quote! { #ty });

    let cache_policy = match (args.cache_key, args.ttl_secs) {
        (Some(key), ttl) => {
            let with_ttl = ttl.map(|secs| {
                quote! { .with_ttl(::std::time::Duration::from_secs(#secs)) }
            });
            Some(quote! {
                fn cache_policy(&self) -> ::core::option::Option<::courier::CachePolicy<Self::Response>> {
                    ::core::option::Option::Some(::courier::CachePolicy::new(#key) #with_ttl)
                }
            })
        }
        (None, Some(_)) => {
            return Err(syn::Error::new_spanned(
                name,
                "`ttl_secs` requires `cache_key`",
            ));
        }
        (None, None) => None,
    };

    Ok(quote! {
        impl #impl_generics ::courier::Request for #name #ty_generics #where_clause {
            type Response = #response;

            #cache_policy
        }
    })
}

pub(crate) fn stream_request_impl(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Some(attr) = find_attr(&input.attrs, "stream_request") else {
        return Err(syn::Error::new_spanned(
            name,
            "missing `#[stream_request(item = Type)]`",
        ));
    };
    let StreamArgs { item } = attr.parse_args()?;

    Ok(quote! {
        impl #impl_generics ::courier::StreamRequest for #name #ty_generics #where_clause {
            type Item = #item;
        }
    })
}
