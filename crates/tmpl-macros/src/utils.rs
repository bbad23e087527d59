use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};

/// Resolves the path to the `tmpl-core` crate.
///
/// 1. The crate is a dependency, possibly renamed: `proc-macro-crate` finds it.
/// 2. Inside `tmpl-core` itself: `::tmpl_core`, which the crate makes resolvable
///    with `extern crate self as tmpl_core`.
pub fn core_crate_path() -> TokenStream2 {
    use proc_macro_crate::{FoundCrate, crate_name};

    if let Ok(FoundCrate::Name(name)) = crate_name("tmpl-core") {
        let ident = format_ident!("{}", name);
        return quote!(::#ident);
    }

    quote!(::tmpl_core)
}
