use syn::{Attribute, Error, Ident, LitStr, Meta, Result, Type};

/// Where the type's template text comes from.
#[derive(Clone, Debug)]
pub enum SourceCfg {
    /// `#[tmpl(text = "...")]`
    Text(LitStr),
    /// `#[tmpl(file = "...")]`
    File(LitStr),
    /// `#[tmpl(provider)]`: the type implements `TemplateProvider`.
    Provider,
}

/// `#[tmpl(rename_all = "...")]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameRule {
    PascalCase,
    CamelCase,
    Lowercase,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> Result<Self> {
        match lit.value().as_str() {
            "PascalCase" => Ok(Self::PascalCase),
            "camelCase" => Ok(Self::CamelCase),
            "lowercase" => Ok(Self::Lowercase),
            _ => Err(Error::new_spanned(
                lit,
                "unknown `rename_all` rule (allowed: \"PascalCase\", \"camelCase\", \"lowercase\")",
            )),
        }
    }

    /// Applies the rule to a snake_case field name.
    pub fn apply(self, field: &str) -> String {
        match self {
            Self::Lowercase => field.to_lowercase(),
            Self::PascalCase | Self::CamelCase => {
                let mut out = String::with_capacity(field.len());
                let mut upper = self == Self::PascalCase;
                for ch in field.chars() {
                    if ch == '_' {
                        upper = !out.is_empty() || self == Self::PascalCase;
                        continue;
                    }
                    if upper {
                        out.extend(ch.to_uppercase());
                        upper = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

/// `#[tmpl(accessor(name = "...", method = ident, returns = Type))]`
#[derive(Clone, Debug)]
pub struct AccessorCfg {
    pub name: LitStr,
    pub method: Ident,
    pub returns: Type,
}

/// Type-level configuration, merged from every `#[tmpl(...)]` on the type.
#[derive(Clone, Debug, Default)]
pub struct TypeCfg {
    pub name: Option<LitStr>,
    pub source: Option<SourceCfg>,
    pub watch: bool,
    pub rename_all: Option<RenameRule>,
    pub accessors: Vec<AccessorCfg>,
}

/// Field-level configuration.
#[derive(Clone, Debug, Default)]
pub struct FieldCfg {
    pub name: Option<LitStr>,
    pub embed: bool,
    pub skip: bool,
}

fn ensure_list_attr(a: &Attribute) -> Result<()> {
    match &a.meta {
        Meta::List(_) => Ok(()),
        _ => Err(Error::new_spanned(
            a,
            "expected `#[tmpl(...)]` (e.g. `#[tmpl(text = \"...\")]`)",
        )),
    }
}

fn tmpl_attrs(attrs: &[Attribute]) -> impl Iterator<Item = &Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("tmpl"))
}

pub fn parse_type_cfg(attrs: &[Attribute]) -> Result<TypeCfg> {
    let mut cfg = TypeCfg::default();

    for a in tmpl_attrs(attrs) {
        ensure_list_attr(a)?;

        a.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                if cfg.name.is_some() {
                    return Err(meta.error("duplicate `name`"));
                }
                cfg.name = Some(meta.value()?.parse()?);
                return Ok(());
            }

            let source = if meta.path.is_ident("text") {
                Some(SourceCfg::Text(meta.value()?.parse()?))
            } else if meta.path.is_ident("file") {
                Some(SourceCfg::File(meta.value()?.parse()?))
            } else if meta.path.is_ident("provider") {
                Some(SourceCfg::Provider)
            } else {
                None
            };
            if let Some(source) = source {
                if cfg.source.is_some() {
                    return Err(meta.error("only one of `text`, `file` and `provider` may be set"));
                }
                cfg.source = Some(source);
                return Ok(());
            }

            if meta.path.is_ident("watch") {
                cfg.watch = true;
                return Ok(());
            }
            if meta.path.is_ident("rename_all") {
                let lit: LitStr = meta.value()?.parse()?;
                cfg.rename_all = Some(RenameRule::parse(&lit)?);
                return Ok(());
            }
            if meta.path.is_ident("accessor") {
                let mut name = None;
                let mut method = None;
                let mut returns = None;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("name") {
                        name = Some(inner.value()?.parse::<LitStr>()?);
                    } else if inner.path.is_ident("method") {
                        method = Some(inner.value()?.parse::<Ident>()?);
                    } else if inner.path.is_ident("returns") {
                        returns = Some(inner.value()?.parse::<Type>()?);
                    } else {
                        return Err(inner.error(
                            "unknown `accessor(...)` option (allowed: name, method, returns)",
                        ));
                    }
                    Ok(())
                })?;
                let (Some(name), Some(method), Some(returns)) = (name, method, returns) else {
                    return Err(meta.error("`accessor(...)` requires `name`, `method` and `returns`"));
                };
                cfg.accessors.push(AccessorCfg {
                    name,
                    method,
                    returns,
                });
                return Ok(());
            }

            Err(Error::new_spanned(
                meta.path,
                "unknown `#[tmpl(...)]` option (allowed: name, text, file, provider, watch, rename_all, accessor)",
            ))
        })?;
    }

    Ok(cfg)
}

pub fn parse_field_cfg(attrs: &[Attribute]) -> Result<FieldCfg> {
    let mut cfg = FieldCfg::default();

    for a in tmpl_attrs(attrs) {
        ensure_list_attr(a)?;

        a.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                cfg.name = Some(meta.value()?.parse()?);
                return Ok(());
            }
            if meta.path.is_ident("embed") {
                cfg.embed = true;
                return Ok(());
            }
            if meta.path.is_ident("skip") {
                cfg.skip = true;
                return Ok(());
            }
            Err(Error::new_spanned(
                meta.path,
                "unknown `#[tmpl(...)]` field option (allowed: name, embed, skip)",
            ))
        })?;

        if cfg.skip && (cfg.embed || cfg.name.is_some()) {
            return Err(Error::new_spanned(
                a,
                "`#[tmpl(skip)]` cannot be combined with other field options",
            ));
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;
    use syn::parse_quote;

    fn parse_attrs(tokens: proc_macro2::TokenStream) -> Vec<Attribute> {
        let input: syn::DeriveInput = parse_quote!( #tokens struct Dummy; );
        input.attrs
    }

    #[test]
    fn test_parse_type_cfg_across_attributes() {
        let attrs = parse_attrs(quote! {
            #[tmpl(name = "Page", text = "{{.Title}}")]
            #[tmpl(rename_all = "PascalCase", watch)]
        });
        let cfg = parse_type_cfg(&attrs).unwrap();
        assert_eq!(cfg.name.unwrap().value(), "Page");
        assert!(matches!(cfg.source, Some(SourceCfg::Text(ref t)) if t.value() == "{{.Title}}"));
        assert_eq!(cfg.rename_all, Some(RenameRule::PascalCase));
        assert!(cfg.watch);
    }

    #[test]
    fn test_parse_accessors() {
        let attrs = parse_attrs(quote! {
            #[tmpl(
                accessor(name = "Greeting", method = greeting, returns = String),
                accessor(name = "Pairs", method = pairs, returns = Vec<(String, i32)>)
            )]
        });
        let cfg = parse_type_cfg(&attrs).unwrap();
        assert_eq!(cfg.accessors.len(), 2);
        assert_eq!(cfg.accessors[0].name.value(), "Greeting");
        assert_eq!(cfg.accessors[0].method, "greeting");
        assert_eq!(cfg.accessors[1].method, "pairs");
    }

    #[test]
    fn test_incomplete_accessor() {
        let attrs = parse_attrs(quote! { #[tmpl(accessor(name = "A", method = a))] });
        let err = parse_type_cfg(&attrs).unwrap_err();
        assert!(err.to_string().contains("requires `name`, `method` and `returns`"));
    }

    #[test]
    fn test_conflicting_sources() {
        let attrs = parse_attrs(quote! {
            #[tmpl(text = "a")]
            #[tmpl(file = "a.html")]
        });
        let err = parse_type_cfg(&attrs).unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn test_unknown_options() {
        let attrs = parse_attrs(quote! { #[tmpl(texts = "a")] });
        assert!(parse_type_cfg(&attrs).is_err());

        let attrs = parse_attrs(quote! { #[tmpl(rename_all = "SCREAMING")] });
        let err = parse_type_cfg(&attrs).unwrap_err();
        assert!(err.to_string().contains("unknown `rename_all` rule"));

        let attrs = parse_attrs(quote! { #[tmpl] });
        assert!(parse_type_cfg(&attrs).is_err());
    }

    #[test]
    fn test_parse_field_cfg() {
        let attrs = parse_attrs(quote! { #[tmpl(name = "Header", embed)] });
        let cfg = parse_field_cfg(&attrs).unwrap();
        assert_eq!(cfg.name.unwrap().value(), "Header");
        assert!(cfg.embed);
        assert!(!cfg.skip);

        let attrs = parse_attrs(quote! { #[tmpl(skip, embed)] });
        let err = parse_field_cfg(&attrs).unwrap_err();
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn test_rename_rules() {
        assert_eq!(RenameRule::PascalCase.apply("by_key"), "ByKey");
        assert_eq!(RenameRule::PascalCase.apply("title"), "Title");
        assert_eq!(RenameRule::CamelCase.apply("by_key_id"), "byKeyId");
        assert_eq!(RenameRule::CamelCase.apply("_private"), "private");
        assert_eq!(RenameRule::Lowercase.apply("Mixed_Case"), "mixed_case");
    }
}
