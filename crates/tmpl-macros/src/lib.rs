use proc_macro::TokenStream;

mod model;
mod model_cfg;
mod utils;

/// Derives `tmpl_core::Model` for a struct with named fields or a unit struct.
///
/// Type-level options, spread over any number of `#[tmpl(...)]` attributes:
///
/// - `name = "..."`: entry and fragment name (default: the type name)
/// - `text = "..."` / `file = "..."` / `provider`: template source; `provider`
///   calls the type's `TemplateProvider` impl
/// - `watch`: the type implements `Watch`
/// - `rename_all = "PascalCase" | "camelCase" | "lowercase"`
/// - `accessor(name = "...", method = ident, returns = Type)`: a zero-argument
///   method exposed to templates; requires `Clone`
///
/// Field-level options: `name = "..."` (binding name), `embed` (promote the
/// field's members into this type), `skip`.
#[proc_macro_derive(Model, attributes(tmpl))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}
