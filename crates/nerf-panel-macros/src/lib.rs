use proc_macro::TokenStream;

use quote::quote;
use syn::{
    Attribute, Expr, ExprLit, Fields, GenericArgument, Item, ItemStruct, Lit, Meta,
    PathArguments, Token, Type, parse::Parser, punctuated::Punctuated, spanned::Spanned,
};

/// Registers a configuration struct as a launchable method.
///
/// Generates a `crate::schema::ConfigSchema` impl whose `schema()` is built from the
/// struct's declared field types and its `Default` impl. Field attributes understood here:
/// `#[choices(..)]` (closed literal set), `#[skip]` (not exposed in forms). Field doc
/// comments become help text.
#[proc_macro_attribute]
#[allow(non_snake_case)]
pub fn Method(attr: TokenStream, item: TokenStream) -> TokenStream {
    match method_impl(attr, item) {
        Ok(ts) => ts,
        Err(e) => e.to_compile_error().into(),
    }
}

fn lit_str(expr: &Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit {
            lit: Lit::Str(s), ..
        }) => Ok(s.value()),
        _ => Err(syn::Error::new(expr.span(), "expected string literal")),
    }
}

fn doc_text(attrs: &[Attribute]) -> String {
    let mut lines = Vec::new();
    for a in attrs {
        if !a.path().is_ident("doc") {
            continue;
        }
        let Meta::NameValue(nv) = &a.meta else {
            continue;
        };
        if let Ok(s) = lit_str(&nv.value) {
            let s = s.trim();
            if !s.is_empty() {
                lines.push(s.to_string());
            }
        }
    }
    lines.join(" ")
}

fn is_ours(a: &Attribute) -> bool {
    a.path().is_ident("choices") || a.path().is_ident("skip") || a.path().is_ident("Method")
}

#[derive(Clone, Copy)]
enum Scalar {
    Bool,
    Int,
    Float,
    Str,
}

impl Scalar {
    fn tokens(self) -> proc_macro2::TokenStream {
        match self {
            Scalar::Bool => quote!(crate::schema::ScalarKind::Bool),
            Scalar::Int => quote!(crate::schema::ScalarKind::Int),
            Scalar::Float => quote!(crate::schema::ScalarKind::Float),
            Scalar::Str => quote!(crate::schema::ScalarKind::Str),
        }
    }
}

enum Shape {
    Scalar(Scalar),
    Sequence(Scalar, Option<usize>),
    Other(String),
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    let Type::Path(tp) = ty else {
        return None;
    };
    if tp.qself.is_some() {
        return None;
    }
    tp.path.segments.last()
}

fn single_type_arg(seg: &syn::PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first() {
        Some(GenericArgument::Type(t)) => Some(t),
        _ => None,
    }
}

fn scalar_of(ty: &Type) -> Option<Scalar> {
    let seg = last_segment(ty)?;
    if !seg.arguments.is_empty() {
        return None;
    }
    let ident = seg.ident.to_string();
    match ident.as_str() {
        "bool" => Some(Scalar::Bool),
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            Some(Scalar::Int)
        }
        "f32" | "f64" => Some(Scalar::Float),
        "String" => Some(Scalar::Str),
        _ => None,
    }
}

fn type_name(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

fn classify(ty: &Type) -> Shape {
    if let Some(s) = scalar_of(ty) {
        return Shape::Scalar(s);
    }
    if let Type::Array(arr) = ty {
        let len = match &arr.len {
            Expr::Lit(ExprLit {
                lit: Lit::Int(n), ..
            }) => n.base10_parse::<usize>().ok(),
            _ => None,
        };
        return match scalar_of(&arr.elem) {
            Some(elem) => Shape::Sequence(elem, len),
            None => Shape::Other(type_name(ty)),
        };
    }
    if let Some(seg) = last_segment(ty) {
        let ident = seg.ident.to_string();
        if let Some(inner) = single_type_arg(seg) {
            if ident == "Option" {
                return classify(inner);
            }
            if ident == "Vec" {
                if let Some(elem) = scalar_of(inner) {
                    return Shape::Sequence(elem, None);
                }
            }
        }
    }
    Shape::Other(type_name(ty))
}

fn choice_values(attr: &Attribute) -> syn::Result<Vec<proc_macro2::TokenStream>> {
    let Meta::List(list) = &attr.meta else {
        return Err(syn::Error::new(
            attr.span(),
            "expected #[choices(\"a\", \"b\", ...)]",
        ));
    };
    let lits = Punctuated::<Lit, Token![,]>::parse_terminated.parse2(list.tokens.clone())?;
    let mut out = Vec::new();
    for lit in lits {
        match lit {
            Lit::Str(s) => {
                let v = s.value();
                out.push(quote!(crate::schema::FieldValue::Str(#v.to_string())));
            }
            Lit::Int(n) => {
                let v = n.base10_parse::<i64>()?;
                out.push(quote!(crate::schema::FieldValue::Int(#v)));
            }
            other => {
                return Err(syn::Error::new(
                    other.span(),
                    "choices accept string or integer literals",
                ));
            }
        }
    }
    if out.is_empty() {
        return Err(syn::Error::new(attr.span(), "choices must not be empty"));
    }
    Ok(out)
}

fn method_impl(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let parsed: Item = syn::parse(item)?;
    let mut st: ItemStruct = match parsed {
        Item::Struct(s) => s,
        Item::Enum(e) => {
            return Err(syn::Error::new(
                e.enum_token.span(),
                "Method: only structs with named fields describe a schema",
            ));
        }
        Item::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "Method: only structs with named fields describe a schema",
            ));
        }
        other => {
            return Err(syn::Error::new(
                other.span(),
                "Method: expected a struct definition",
            ));
        }
    };
    let struct_ident = st.ident.clone();

    let parser = Punctuated::<Meta, Token![,]>::parse_terminated;
    let metas = parser.parse(attr)?;

    let mut id: Option<String> = None;
    let mut subcommand: Option<String> = None;
    let mut description: Option<String> = None;

    for m in metas {
        let Meta::NameValue(nv) = m else {
            return Err(syn::Error::new(m.span(), "expected key = value"));
        };
        let Some(key) = nv.path.get_ident().map(|i| i.to_string()) else {
            return Err(syn::Error::new(nv.path.span(), "expected ident key"));
        };
        let v = &nv.value;
        match key.as_str() {
            "id" => id = Some(lit_str(v)?),
            "subcommand" => subcommand = Some(lit_str(v)?),
            "description" => description = Some(lit_str(v)?),
            other => {
                return Err(syn::Error::new(
                    nv.path.span(),
                    format!("unknown Method attribute key '{other}'"),
                ));
            }
        }
    }

    let id = id.ok_or_else(|| syn::Error::new(struct_ident.span(), "Method: missing id"))?;
    let subcommand = subcommand.unwrap_or_else(|| id.clone());
    let description = description.unwrap_or_else(|| doc_text(&st.attrs));

    let Fields::Named(named) = &mut st.fields else {
        return Err(syn::Error::new(
            struct_ident.span(),
            "Method: tuple and unit structs have no field names to expose",
        ));
    };

    let mut pushes = Vec::new();
    for field in named.named.iter_mut() {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let skip = field.attrs.iter().any(|a| a.path().is_ident("skip"));
        let choices = match field.attrs.iter().find(|a| a.path().is_ident("choices")) {
            Some(a) => Some(choice_values(a)?),
            None => None,
        };
        let help = doc_text(&field.attrs);
        field.attrs.retain(|a| !is_ours(a));
        if skip {
            continue;
        }

        let name = ident.to_string();
        let push = if let Some(allowed) = choices {
            quote! {
                fields.push(crate::schema::FieldDescriptor::choice(
                    #name,
                    vec![#(#allowed),*],
                    crate::schema::AsFieldValue::as_field_value(&defaults.#ident),
                ).with_help(#help));
            }
        } else {
            match classify(&field.ty) {
                Shape::Scalar(s) => {
                    let kind = match s {
                        Scalar::Bool => quote!(crate::schema::FieldKind::Bool),
                        Scalar::Int => quote!(crate::schema::FieldKind::Int),
                        Scalar::Float => quote!(crate::schema::FieldKind::Float),
                        Scalar::Str => quote!(crate::schema::FieldKind::Str),
                    };
                    quote! {
                        fields.push(crate::schema::FieldDescriptor::new(
                            #name,
                            #kind,
                            crate::schema::AsFieldValue::as_field_value(&defaults.#ident),
                        ).with_help(#help));
                    }
                }
                Shape::Sequence(elem, arity) => {
                    let elem = elem.tokens();
                    let arity = match arity {
                        Some(n) => quote!(::core::option::Option::Some(#n)),
                        None => quote!(::core::option::Option::None),
                    };
                    quote! {
                        fields.push(crate::schema::FieldDescriptor::new(
                            #name,
                            crate::schema::FieldKind::Sequence { elem: #elem, arity: #arity },
                            crate::schema::AsFieldValue::as_field_value(&defaults.#ident),
                        ).with_help(#help));
                    }
                }
                Shape::Other(ty_name) => quote! {
                    fields.push(crate::schema::FieldDescriptor::new(
                        #name,
                        crate::schema::FieldKind::Other(#ty_name.to_string()),
                        crate::schema::debug_default(&defaults.#ident),
                    ).with_help(#help));
                },
            }
        };
        pushes.push(push);
    }

    let expanded = quote! {
        #st

        impl crate::schema::ConfigSchema for #struct_ident {
            const ID: &'static str = #id;
            const SUBCOMMAND: &'static str = #subcommand;
            const DESCRIPTION: &'static str = #description;

            fn schema() -> crate::schema::Schema {
                let defaults = <Self as ::core::default::Default>::default();
                let mut fields: Vec<crate::schema::FieldDescriptor> = Vec::new();
                #(#pushes)*
                crate::schema::Schema::new(#id, fields)
            }
        }
    };

    Ok(expanded.into())
}
