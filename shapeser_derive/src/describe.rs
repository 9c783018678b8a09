use proc_macro2::TokenStream;
use quote::quote;

use crate::{Field, Kind};

/// The body of `Shaped::descriptor`. Shapes are built once and cached,
/// and field types are resolved on first use so that shapes may refer
/// to themselves.
pub(crate) fn descriptor(kind: &Kind, name: &str) -> TokenStream {
    let init = match kind {
        Kind::Record(fields) => {
            let fields = fields.iter().map(field);
            let keys = fields_keys(kind);

            quote! {
                ::shapeser::TypeDescriptor::record(
                    ::shapeser::RecordShape::new(#name)
                        #(#fields)*
                        #keys
                )
            }
        }
        Kind::Enumeration(variants) => {
            let names = variants.iter().map(|v| &v.name);

            quote! {
                ::shapeser::TypeDescriptor::enumeration(
                    ::shapeser::EnumShape::new(#name, [#(#names),*])
                )
            }
        }
        Kind::Polymorphic { tag, variants } => {
            let subtypes = variants.iter().filter_map(|v| {
                let (name, ty) = (&v.name, v.ty?);
                Some(quote! {
                    .deferred_subtype(#name, <#ty as ::shapeser::Shaped>::descriptor)
                })
            });

            quote! {
                ::shapeser::TypeDescriptor::record(
                    ::shapeser::RecordShape::new(#name).discriminator(
                        ::shapeser::Discriminator::new(#tag)
                            #(#subtypes)*
                    )
                )
            }
        }
    };

    quote! {
        static SHAPE: ::std::sync::OnceLock<::shapeser::TypeDescriptor> = ::std::sync::OnceLock::new();

        SHAPE.get_or_init(|| #init).clone()
    }
}

fn fields_keys(kind: &Kind) -> TokenStream {
    let Kind::Record(fields) = kind else {
        return TokenStream::new();
    };

    let keys = fields
        .iter()
        .filter(|f| f.attrs.key)
        .map(|f| &f.name)
        .collect::<Vec<_>>();
    if keys.is_empty() {
        return TokenStream::new();
    }

    quote! { .keys([#(#keys),*]) }
}

fn field(field: &Field) -> TokenStream {
    let name = &field.name;
    let ty = field.ty;

    let policy = field.attrs.policy.as_ref().map(|policy| {
        quote! { .policy(::shapeser::FieldPolicy::#policy) }
    });
    let order = field.attrs.order.map(|order| quote! { .order(#order) });
    let default = field.attrs.default.as_ref().map(|expr| {
        let init = match expr {
            None => quote! { <#ty as ::std::default::Default>::default() },
            Some(expr @ syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(_),
                ..
            })) => quote! { ::std::convert::From::from(#expr) },
            Some(expr) => quote! { #expr },
        };

        quote! {
            .default_value({
                let v: #ty = #init;
                ::shapeser::Shaped::to_value(&v)
            })
        }
    });

    quote! {
        .field(
            ::shapeser::FieldShape::deferred(#name, <#ty as ::shapeser::Shaped>::descriptor)
                #policy
                #order
                #default
        )
    }
}
