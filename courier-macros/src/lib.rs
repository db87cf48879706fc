//! Derive macros for courier.
//!
//! - `#[derive(Request)]` with `#[request(response = T)]`
//! - `#[derive(StreamRequest)]` with `#[stream_request(item = T)]`

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod request;

/// Derive `courier::Request`.
///
/// # Attributes
///
/// - `response = Type` - the response type (default `()`)
/// - `cache_key = expr` - makes the request cacheable; `expr` may use `self`
///   and must produce something convertible into a `String`
/// - `ttl_secs = N` - cache entry lifetime in seconds; requires `cache_key`
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Request)]
/// #[request(response = Quote, cache_key = format!("quote:{}", self.symbol), ttl_secs = 30)]
/// struct GetQuote {
///     symbol: String,
/// }
/// ```
#[proc_macro_derive(Request, attributes(request))]
pub fn derive_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    request::request_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `courier::StreamRequest`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(StreamRequest)]
/// #[stream_request(item = Price)]
/// struct WatchPrices {
///     symbol: String,
/// }
/// ```
#[proc_macro_derive(StreamRequest, attributes(stream_request))]
pub fn derive_stream_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    request::stream_request_impl(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
