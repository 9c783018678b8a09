use syn::meta::ParseNestedMeta;
use syn::{Attribute, Error, Expr, Ident, LitInt, LitStr};

/// Calls `f` for each item inside `#[shape(...)]` attributes.
fn each_shape_attr<F>(attrs: &[Attribute], mut f: F) -> Result<(), Error>
where
    F: FnMut(ParseNestedMeta) -> Result<(), Error>,
{
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("shape")) {
        attr.parse_nested_meta(&mut f)?;
    }

    Ok(())
}

fn parse_string(meta: &ParseNestedMeta) -> Result<String, Error> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// Attributes on the struct or enum.
#[derive(Default)]
pub(crate) struct ContainerAttrs {
    pub rename: Option<String>,
    pub tag: Option<String>,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self, Error> {
        let mut out = Self::default();

        each_shape_attr(attrs, |meta| {
            if meta.path.is_ident("rename") {
                out.rename = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("tag") {
                out.tag = Some(parse_string(&meta)?);
            } else {
                return Err(meta.error("unsupported shape attribute, expected `rename` or `tag`"));
            }
            Ok(())
        })?;

        Ok(out)
    }
}

/// Attributes on a struct field.
#[derive(Default)]
pub(crate) struct FieldAttrs {
    pub rename: Option<String>,
    pub policy: Option<Ident>,
    pub order: Option<i32>,
    /// `Some(None)` is a bare `default`, using [Default].
    pub default: Option<Option<Expr>>,
    pub key: bool,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self, Error> {
        let mut out = Self::default();

        each_shape_attr(attrs, |meta| {
            if meta.path.is_ident("rename") {
                out.rename = Some(parse_string(&meta)?);
            } else if meta.path.is_ident("policy") {
                let lit: LitStr = meta.value()?.parse()?;
                let variant = match lit.value().as_str() {
                    "always" => "Always",
                    "never" => "Never",
                    "not_null" => "NotNull",
                    "not_empty" => "NotEmpty",
                    "not_default" => "NotDefault",
                    _ => {
                        return Err(Error::new_spanned(
                            lit,
                            "expected one of `always`, `never`, `not_null`, `not_empty` or `not_default`",
                        ))
                    }
                };
                out.policy = Some(Ident::new(variant, lit.span()));
            } else if meta.path.is_ident("order") {
                let lit: LitInt = meta.value()?.parse()?;
                out.order = Some(lit.base10_parse()?);
            } else if meta.path.is_ident("default") {
                out.default = Some(if meta.input.peek(syn::Token![=]) {
                    Some(meta.value()?.parse()?)
                } else {
                    None
                });
            } else if meta.path.is_ident("key") {
                out.key = true;
            } else {
                return Err(meta.error("unsupported shape attribute on field"));
            }
            Ok(())
        })?;

        Ok(out)
    }
}

/// Attributes on an enum variant.
#[derive(Default)]
pub(crate) struct VariantAttrs {
    pub rename: Option<String>,
}

impl VariantAttrs {
    pub fn parse(attrs: &[Attribute]) -> Result<Self, Error> {
        let mut out = Self::default();

        each_shape_attr(attrs, |meta| {
            if meta.path.is_ident("rename") {
                out.rename = Some(parse_string(&meta)?);
                Ok(())
            } else {
                Err(meta.error("unsupported shape attribute on variant, expected `rename`"))
            }
        })?;

        Ok(out)
    }
}
