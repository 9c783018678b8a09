use proc_macro2::TokenStream;
use quote::quote;

use crate::Kind;

/// The body of `Shaped::from_value`.
pub(crate) fn from_value(kind: &Kind, name: &str) -> TokenStream {
    match kind {
        Kind::Record(fields) if fields.is_empty() => quote! {
            ::shapeser::expect_record(value, #name)?;
            ::std::result::Result::Ok(Self {})
        },
        Kind::Record(fields) => {
            let assigns = fields.iter().map(|f| {
                let (ident, name) = (f.ident, &f.name);
                quote! { #ident: ::shapeser::take_field(&mut record, #name)?, }
            });

            quote! {
                let mut record = ::shapeser::expect_record(value, #name)?;

                ::std::result::Result::Ok(Self {
                    #(#assigns)*
                })
            }
        }
        Kind::Enumeration(variants) => {
            let arms = variants.iter().map(|v| {
                let (ident, name) = (v.ident, &v.name);
                quote! { ::std::option::Option::Some(#name) => ::std::result::Result::Ok(Self::#ident), }
            });

            quote! {
                match value.as_str() {
                    #(#arms)*
                    _ => ::std::result::Result::Err(::shapeser::mismatch(#name, &value)),
                }
            }
        }
        Kind::Polymorphic { tag, variants } => {
            let tries = variants.iter().filter_map(|v| {
                let (ident, name, ty) = (v.ident, &v.name, v.ty?);
                Some(quote! {
                    if ::shapeser::is_subtype(&record, #name, &<#ty as ::shapeser::Shaped>::descriptor()) {
                        return <#ty as ::shapeser::Shaped>::from_value(::shapeser::Value::Record(record))
                            .map(Self::#ident);
                    }
                })
            });

            quote! {
                let record = ::shapeser::expect_record(value, #name)?;

                #(#tries)*

                ::std::result::Result::Err(::shapeser::ReadError::new(
                    ::shapeser::ReadErrorKind::UnknownSubtype {
                        property: #tag.to_owned(),
                        tag: record.tag.unwrap_or(record.name),
                    },
                ))
            }
        }
    }
}
