//! # toad-macros
//! Macros used by `toad` for boilerplate reduction

#![forbid(missing_debug_implementations, unreachable_pub)]
#![deny(unsafe_code, missing_copy_implementations)]
#![deny(missing_docs)]

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::parse::Parse;
use syn::{parse_macro_input, LitStr};

struct DocSection(LitStr);

impl Parse for DocSection {
  fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
    Ok(Self(input.parse::<LitStr>()?))
  }
}

/// Give me a section of RFC7252 (e.g. `5.9.1.1`, no trailing dot)
/// and I will yield an inline `#[doc]` attribute linking to that section.
#[proc_macro]
pub fn rfc_7252_doc(input: TokenStream) -> TokenStream {
  rfc_doc(input, 7252)
}

/// Give me a section of RFC7641 (e.g. `3.4`, no trailing dot)
/// and I will yield an inline `#[doc]` attribute linking to that section.
#[proc_macro]
pub fn rfc_7641_doc(input: TokenStream) -> TokenStream {
  rfc_doc(input, 7641)
}

/// Give me a section of RFC7959 (e.g. `2.1`, no trailing dot)
/// and I will yield an inline `#[doc]` attribute linking to that section.
#[proc_macro]
pub fn rfc_7959_doc(input: TokenStream) -> TokenStream {
  rfc_doc(input, 7959)
}

/// Give me a section of RFC8323 (e.g. `5.3`, no trailing dot)
/// and I will yield an inline `#[doc]` attribute linking to that section.
#[proc_macro]
pub fn rfc_8323_doc(input: TokenStream) -> TokenStream {
  rfc_doc(input, 8323)
}

fn rfc_doc(input: TokenStream, rfc: u32) -> TokenStream {
  let DocSection(section_literal) = parse_macro_input!(input as DocSection);
  let sec = section_literal.value();

  let docstring = format!("See [RFC{rfc} section {sec}](https://datatracker.ietf.org/doc/html/rfc{rfc}#section-{sec}).",
                           rfc = rfc,
                           sec = sec);

  LitStr::new(&docstring, section_literal.span()).to_token_stream().into()
}
