use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Error, Ident, Type};

mod attr;
mod describe;
mod from;
mod into;

use attr::{ContainerAttrs, FieldAttrs, VariantAttrs};

/// Provides the `Shaped` trait for a struct or enum.
///
/// * A struct with named fields becomes a record shape.
/// * An enum with only unit variants becomes an enumeration.
/// * An enum with only newtype variants, and a `#[shape(tag = "...")]`
///   attribute, becomes a polymorphic record shape. Each variant holds
///   the record type of one subtype.
///
/// Field attributes: `rename = "..."`, `policy = "not_null"` (or
/// `always`, `never`, `not_empty`, `not_default`), `order = N`,
/// `default` or `default = EXPR`, and `key`.
#[proc_macro_derive(Shaped, attributes(shape))]
pub fn derive_shaped(tokens: TokenStream) -> TokenStream {
    let input = parse_macro_input!(tokens as DeriveInput);

    match shaped(&input) {
        Ok(output) => output.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

pub(crate) struct Field<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub name: String,
    pub attrs: FieldAttrs,
}

pub(crate) struct Variant<'a> {
    pub ident: &'a Ident,
    pub name: String,
    /// The subtype, for newtype variants.
    pub ty: Option<&'a Type>,
}

pub(crate) enum Kind<'a> {
    Record(Vec<Field<'a>>),
    Enumeration(Vec<Variant<'a>>),
    Polymorphic { tag: String, variants: Vec<Variant<'a>> },
}

impl<'a> Kind<'a> {
    fn of(input: &'a DeriveInput, container: &ContainerAttrs) -> Result<Self, Error> {
        match &input.data {
            syn::Data::Struct(data) => {
                let syn::Fields::Named(fields) = &data.fields else {
                    return Err(Error::new_spanned(
                        input,
                        "only structs with named fields are supported by Shaped",
                    ));
                };

                let fields = fields
                    .named
                    .iter()
                    .map(|field| {
                        let ident = field
                            .ident
                            .as_ref()
                            .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;
                        let attrs = FieldAttrs::parse(&field.attrs)?;

                        Ok(Field {
                            ident,
                            ty: &field.ty,
                            name: attrs.rename.clone().unwrap_or_else(|| ident.to_string()),
                            attrs,
                        })
                    })
                    .collect::<Result<Vec<_>, Error>>()?;

                Ok(Self::Record(fields))
            }
            syn::Data::Enum(data) => {
                if data.variants.is_empty() {
                    return Err(Error::new_spanned(input, "empty enums are not supported by Shaped"));
                }

                let variants = data
                    .variants
                    .iter()
                    .map(|variant| {
                        let attrs = VariantAttrs::parse(&variant.attrs)?;
                        let ty = match (&variant.fields, &container.tag) {
                            (syn::Fields::Unit, None) => None,
                            (syn::Fields::Unnamed(fields), Some(_)) if fields.unnamed.len() == 1 => {
                                Some(&fields.unnamed[0].ty)
                            }
                            (_, None) => {
                                return Err(Error::new_spanned(
                                    variant,
                                    "expected a unit variant; use #[shape(tag = \"...\")] for newtype variants",
                                ))
                            }
                            (_, Some(_)) => {
                                return Err(Error::new_spanned(
                                    variant,
                                    "expected a newtype variant holding the subtype",
                                ))
                            }
                        };

                        Ok(Variant {
                            ident: &variant.ident,
                            name: attrs.rename.unwrap_or_else(|| variant.ident.to_string()),
                            ty,
                        })
                    })
                    .collect::<Result<Vec<_>, Error>>()?;

                Ok(match &container.tag {
                    Some(tag) => Self::Polymorphic {
                        tag: tag.clone(),
                        variants,
                    },
                    None => Self::Enumeration(variants),
                })
            }
            syn::Data::Union(_data) => Err(Error::new_spanned(input, "union is not supported by Shaped")),
        }
    }
}

fn shaped(input: &DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "generic types are not supported by Shaped",
        ));
    }

    let container = ContainerAttrs::parse(&input.attrs)?;
    if container.tag.is_some() && !matches!(input.data, syn::Data::Enum(_)) {
        return Err(Error::new_spanned(input, "`tag` is only supported on enums"));
    }

    let ident = &input.ident;
    let name = container.rename.clone().unwrap_or_else(|| ident.to_string());
    let kind = Kind::of(input, &container)?;

    let descriptor = describe::descriptor(&kind, &name);
    let from_value = from::from_value(&kind, &name);
    let to_value = into::to_value(&kind, &name);

    Ok(quote! {
        impl ::shapeser::Shaped for #ident {
            fn descriptor() -> ::shapeser::TypeDescriptor {
                #descriptor
            }

            fn from_value(value: ::shapeser::Value) -> ::std::result::Result<Self, ::shapeser::ReadError> {
                #from_value
            }

            fn to_value(&self) -> ::shapeser::Value {
                #to_value
            }
        }
    })
}
