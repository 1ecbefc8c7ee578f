//! `#[service]` attribute macro implementation
//!
//! The macro reads an inherent `impl` block and implements
//! `hrpc_server::Service` for its self type. The original block is emitted
//! unchanged; the generated impl sits next to it.
//!
//! # Method Selection
//!
//! A method becomes an RPC method when it is:
//!
//! 1. `pub` and `async`
//! 2. a `&self` method
//! 3. followed by an optional reference parameter (the HTTP request)
//! 4. followed by exactly one owned argument
//! 5. returning a `Result<_>`
//!
//! Anything else is left alone.
//!
//! # Code Generation Example
//!
//! Input:
//! ```ignore
//! #[service]
//! impl Arith {
//!     pub async fn multiply(&self, args: Operands) -> Result<Product> { .. }
//! }
//! ```
//!
//! Generated output, besides the original block:
//! ```ignore
//! impl ::hrpc_server::Service for Arith {
//!     fn type_name() -> &'static str {
//!         "Arith"
//!     }
//!
//!     fn methods() -> Vec<::hrpc_server::MethodDef<Self>> {
//!         vec![::hrpc_server::MethodDef::new("multiply", |svc: &Self, args: Operands| {
//!             ::hrpc_server::__private::FutureExt::boxed(svc.multiply(args))
//!         })]
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, ReturnType, Type,
    Visibility,
};

pub fn service_impl(attr: TokenStream, input: TokenStream) -> TokenStream {
    let mut name: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported service attribute, expected `name = \"...\"`"))
        }
    });
    parse_macro_input!(attr with parser);

    let item = parse_macro_input!(input as ItemImpl);
    match expand(name, &item) {
        Ok(generated) => quote! {
            #item
            #generated
        }
        .into(),
        Err(err) => {
            let err = err.to_compile_error();
            quote! {
                #item
                #err
            }
            .into()
        }
    }
}

fn expand(name: Option<LitStr>, item: &ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[service] must be placed on an inherent impl block",
        ));
    }

    let self_ty = &item.self_ty;
    let type_name = match name {
        Some(name) => name.value(),
        None => type_ident(self_ty).ok_or_else(|| {
            syn::Error::new_spanned(
                self_ty,
                "cannot infer a service name, use #[service(name = \"...\")]",
            )
        })?,
    };

    let defs: Vec<TokenStream2> = item
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(method) => method_def(method),
            _ => None,
        })
        .collect();

    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::hrpc_server::Service for #self_ty #where_clause {
            fn type_name() -> &'static str {
                #type_name
            }

            fn methods() -> ::std::vec::Vec<::hrpc_server::MethodDef<Self>> {
                ::std::vec![#(#defs),*]
            }
        }
    })
}

fn type_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        Type::Group(group) => type_ident(&group.elem),
        _ => None,
    }
}

/// `MethodDef` constructor for an eligible method, `None` otherwise
fn method_def(method: &ImplItemFn) -> Option<TokenStream2> {
    let sig = &method.sig;
    if !matches!(method.vis, Visibility::Public(_)) || sig.asyncness.is_none() {
        return None;
    }
    if !returns_result(&sig.output) {
        return None;
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next()? {
        FnArg::Receiver(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => return None,
    }

    let typed: Vec<&Type> = inputs
        .map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat.ty.as_ref()),
            FnArg::Receiver(_) => None,
        })
        .collect::<Option<_>>()?;

    let ident = &sig.ident;
    let wire_name = to_lower_camel(&ident.to_string());
    match typed.as_slice() {
        [args] if !is_reference(args) => Some(quote! {
            ::hrpc_server::MethodDef::new(#wire_name, |svc: &Self, args: #args| {
                ::hrpc_server::__private::FutureExt::boxed(svc.#ident(args))
            })
        }),
        [request, args] if is_reference(request) && !is_reference(args) => Some(quote! {
            ::hrpc_server::MethodDef::with_request(
                #wire_name,
                |svc: &Self, request: &::hrpc_server::HttpRequest, args: #args| {
                    ::hrpc_server::__private::FutureExt::boxed(svc.#ident(request, args))
                },
            )
        }),
        _ => None,
    }
}

fn is_reference(ty: &Type) -> bool {
    match ty {
        Type::Reference(_) => true,
        Type::Group(group) => is_reference(&group.elem),
        _ => false,
    }
}

fn returns_result(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.ident == "Result"),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// `response_error` -> `responseError`
fn to_lower_camel(name: &str) -> String {
    let name = name.strip_prefix("r#").unwrap_or(name);
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
