use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::{
    Data, DeriveInput, Error, Fields, GenericParam, LitStr, parse_macro_input, parse_quote,
    spanned::Spanned,
};

use crate::model_cfg::{FieldCfg, SourceCfg, TypeCfg, parse_field_cfg, parse_type_cfg};
use crate::utils::core_crate_path;

/// One non-skipped member, ready for code generation.
struct Member {
    ident: syn::Ident,
    ty: syn::Type,
    /// Name after `rename_all`.
    declared: LitStr,
    cfg: FieldCfg,
}

impl Member {
    fn binding(&self) -> &LitStr {
        self.cfg.name.as_ref().unwrap_or(&self.declared)
    }
}

/// Entry point for `#[derive(Model)]`.
pub fn derive_model(input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as DeriveInput);
    match expand(&mut input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &mut DeriveInput) -> syn::Result<TokenStream2> {
    let core = core_crate_path();
    let cfg = parse_type_cfg(&input.attrs)?;
    let members = collect_members(input, &cfg)?;

    let params: Vec<syn::Ident> = input
        .generics
        .params
        .iter()
        .filter_map(|p| match p {
            GenericParam::Type(t) => Some(t.ident.clone()),
            _ => None,
        })
        .collect();
    let where_clause = input.generics.make_where_clause();
    for param in &params {
        where_clause
            .predicates
            .push(parse_quote!(#param: #core::Model + 'static));
    }

    let name = &input.ident;
    let display = cfg
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&name.to_string(), name.span()));
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let type_info = gen_type_info(&core, &display, &members, &cfg);
    let to_value = gen_to_value(&core, &display, &members, &cfg);
    let fields = gen_fields(&core, &members);
    let source = gen_source(&core, &cfg);
    let watcher = cfg.watch.then(|| {
        quote! {
            fn watcher(&self) -> ::std::option::Option<&dyn #core::Watch> {
                ::std::option::Option::Some(self as &dyn #core::Watch)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics #core::Model for #name #ty_generics #where_clause {
            fn type_info() -> #core::TypeInfo {
                #type_info
            }

            fn to_value(&self) -> #core::Value {
                #to_value
            }

            fn fields(&self) -> ::std::vec::Vec<#core::FieldRef<'_>> {
                #fields
            }

            #source
            #watcher
        }
    })
}

fn collect_members(input: &DeriveInput, cfg: &TypeCfg) -> syn::Result<Vec<Member>> {
    let data = match &input.data {
        Data::Struct(data) => data,
        Data::Enum(e) => {
            return Err(Error::new(
                e.enum_token.span(),
                "Model derive does not support enums",
            ));
        }
        Data::Union(u) => {
            return Err(Error::new(
                u.union_token.span(),
                "Model derive does not support unions",
            ));
        }
    };

    let named = match &data.fields {
        Fields::Named(fields) => &fields.named,
        Fields::Unit => return Ok(Vec::new()),
        Fields::Unnamed(fields) => {
            return Err(Error::new_spanned(
                fields,
                "Model derive requires named fields (or a unit struct)",
            ));
        }
    };

    let mut members = Vec::new();
    for field in named {
        let field_cfg = parse_field_cfg(&field.attrs)?;
        if field_cfg.skip {
            continue;
        }
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let raw = ident.to_string();
        let raw = raw.trim_start_matches("r#");
        let declared = match cfg.rename_all {
            Some(rule) => rule.apply(raw),
            None => raw.to_string(),
        };
        members.push(Member {
            declared: LitStr::new(&declared, ident.span()),
            ident,
            ty: field.ty.clone(),
            cfg: field_cfg,
        });
    }
    Ok(members)
}

fn gen_type_info(core: &TokenStream2, display: &LitStr, members: &[Member], cfg: &TypeCfg) -> TokenStream2 {
    let members = members.iter().map(|m| {
        let ty = &m.ty;
        let declared = &m.declared;
        let tag = m.cfg.name.as_ref().map(|tag| quote!(.with_tag(#tag)));
        let embedded = m.cfg.embed.then(|| quote!(.embedded()));
        quote_spanned! {ty.span()=>
            .member(
                #core::MemberInfo::new(#declared, <#ty as #core::Model>::type_info)
                    #tag
                    #embedded
            )
        }
    });
    let accessors = cfg.accessors.iter().map(|a| {
        let name = &a.name;
        let returns = &a.returns;
        quote! { .accessor(#name, <#returns as #core::Model>::type_info) }
    });

    quote! {
        #core::TypeInfo::aggregate(#display, ::std::any::type_name::<Self>())
            #( #members )*
            #( #accessors )*
    }
}

fn gen_to_value(core: &TokenStream2, display: &LitStr, members: &[Member], cfg: &TypeCfg) -> TokenStream2 {
    let inserts = members.iter().map(|m| {
        let ident = &m.ident;
        let binding = m.binding();
        quote! {
            object.insert(#binding, #core::Model::to_value(&self.#ident));
        }
    });
    let promotions = members.iter().filter(|m| m.cfg.embed).map(|m| {
        let binding = m.binding();
        quote! { object.promote(#binding); }
    });

    let accessors = if cfg.accessors.is_empty() {
        quote! {}
    } else {
        let calls = cfg.accessors.iter().map(|a| {
            let name = &a.name;
            let method = &a.method;
            quote! {
                {
                    let this = ::std::sync::Arc::clone(&this);
                    object.accessor(#name, move || #core::Model::to_value(&this.#method()));
                }
            }
        });
        quote! {
            let this = ::std::sync::Arc::new(::std::clone::Clone::clone(self));
            #( #calls )*
        }
    };

    quote! {
        let mut object = #core::Object::new(#display, <Self as #core::Model>::type_info);
        #( #inserts )*
        #( #promotions )*
        #accessors
        #core::Value::Object(::std::sync::Arc::new(object))
    }
}

fn gen_fields(core: &TokenStream2, members: &[Member]) -> TokenStream2 {
    let refs = members.iter().map(|m| {
        let ident = &m.ident;
        let declared = &m.declared;
        let tag = match &m.cfg.name {
            Some(tag) => quote!(::std::option::Option::Some(#tag)),
            None => quote!(::std::option::Option::None),
        };
        let embedded = m.cfg.embed;
        quote! {
            #core::FieldRef::new(#declared, #tag, #embedded, &self.#ident)
        }
    });
    quote! { ::std::vec![ #( #refs ),* ] }
}

fn gen_source(core: &TokenStream2, cfg: &TypeCfg) -> Option<TokenStream2> {
    let body = match cfg.source.as_ref()? {
        SourceCfg::Text(text) => {
            quote!(#core::Source::Text(::std::string::String::from(#text)))
        }
        SourceCfg::File(path) => {
            quote!(#core::Source::File(::std::path::PathBuf::from(#path)))
        }
        SourceCfg::Provider => quote!(#core::TemplateProvider::template_source(self)),
    };
    Some(quote! {
        fn source(&self) -> ::std::option::Option<#core::Source> {
            ::std::option::Option::Some(#body)
        }
    })
}
