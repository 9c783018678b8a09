use proc_macro2::TokenStream;
use quote::quote;

use crate::Kind;

/// The body of `Shaped::to_value`.
pub(crate) fn to_value(kind: &Kind, name: &str) -> TokenStream {
    match kind {
        Kind::Record(fields) => {
            let fields = fields.iter().map(|f| {
                let (ident, name) = (f.ident, &f.name);
                quote! { (#name.to_owned(), ::shapeser::Shaped::to_value(&self.#ident)), }
            });

            quote! {
                ::shapeser::Value::Record(::shapeser::Record {
                    name: #name.to_owned(),
                    tag: ::std::option::Option::None,
                    fields: ::std::vec![#(#fields)*],
                })
            }
        }
        Kind::Enumeration(variants) => {
            let arms = variants.iter().map(|v| {
                let (ident, name) = (v.ident, &v.name);
                quote! { Self::#ident => ::shapeser::Value::String(#name.to_owned()), }
            });

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Kind::Polymorphic { variants, .. } => {
            let arms = variants.iter().map(|v| {
                let (ident, name) = (v.ident, &v.name);
                quote! { Self::#ident(inner) => (::shapeser::Shaped::to_value(inner), #name), }
            });

            quote! {
                let (mut value, tag) = match self {
                    #(#arms)*
                };
                if let ::shapeser::Value::Record(record) = &mut value {
                    record.tag = ::std::option::Option::Some(tag.to_owned());
                }
                value
            }
        }
    }
}
