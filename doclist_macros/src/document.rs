use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, FieldsNamed, LitStr, Token, Type};

pub fn derive_document(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = named_fields(input)?;
    let collection = extract_collection(input)?;
    let id_field = extract_marked_field(fields, "id")?
        .or_else(|| field_named(fields, "id"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                name,
                "Document derive: no field marked with #[document(id)] and no field named `id`",
            )
        })?;
    let managed_field = extract_marked_field(fields, "managed")?
        .or_else(|| field_of_type(fields, "ManagedFields"))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                name,
                "Document derive: needs a #[document(managed)] or `ManagedFields` field",
            )
        })?;

    let id = field_ident(id_field)?;
    let managed = field_ident(managed_field)?;
    let id_name = serde_rename(id_field)?.unwrap_or_else(|| id.to_string());

    Ok(quote! {
        impl #impl_generics ::doclist::Document for #name #ty_generics #where_clause {
            const COLLECTION: &'static str = #collection;
            const ID_FIELD: &'static str = #id_name;

            fn id(&self) -> ::core::option::Option<&str> {
                self.#id.as_deref()
            }

            fn set_id(&mut self, id: ::std::string::String) {
                self.#id = ::core::option::Option::Some(id);
            }

            fn managed(&self) -> &::doclist::ManagedFields {
                &self.#managed
            }

            fn managed_mut(&mut self) -> &mut ::doclist::ManagedFields {
                &mut self.#managed
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<&FieldsNamed> {
    if let Data::Struct(data_struct) = &input.data {
        if let Fields::Named(fields) = &data_struct.fields {
            return Ok(fields);
        }
    }
    Err(syn::Error::new_spanned(
        &input.ident,
        "Document derive: only structs with named fields are supported",
    ))
}

fn extract_collection(input: &DeriveInput) -> syn::Result<String> {
    for attr in &input.attrs {
        if !attr.path().is_ident("document") {
            continue;
        }

        let mut collection = None;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                collection = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `collection = \"...\"`"))
            }
        })?;

        if let Some(c) = collection {
            return Ok(c);
        }
    }

    // Default: snake_case struct name + "s"
    let name = input.ident.to_string();
    Ok(format!("{}s", to_snake_case(&name)))
}

/// The field carrying `#[document(<marker>)]`, if any.
fn extract_marked_field<'a>(
    fields: &'a FieldsNamed,
    marker: &str,
) -> syn::Result<Option<&'a Field>> {
    for field in &fields.named {
        for attr in &field.attrs {
            if !attr.path().is_ident("document") {
                continue;
            }

            let mut marked = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") || meta.path.is_ident("managed") {
                    marked |= meta.path.is_ident(marker);
                    Ok(())
                } else {
                    Err(meta.error("expected `id` or `managed`"))
                }
            })?;

            if marked {
                return Ok(Some(field));
            }
        }
    }
    Ok(None)
}

fn field_named<'a>(fields: &'a FieldsNamed, name: &str) -> Option<&'a Field> {
    fields
        .named
        .iter()
        .find(|field| field.ident.as_ref().is_some_and(|ident| ident == name))
}

fn field_of_type<'a>(fields: &'a FieldsNamed, type_name: &str) -> Option<&'a Field> {
    fields.named.iter().find(|field| match &field.ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == type_name),
        _ => false,
    })
}

fn field_ident(field: &Field) -> syn::Result<&syn::Ident> {
    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "Document derive: expected a named field"))
}

/// `#[serde(rename = "...")]` on a field, ignoring every other serde option.
fn serde_rename(field: &Field) -> syn::Result<Option<String>> {
    let mut rename = None;
    for attr in &field.attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                meta.parse_nested_meta(|nested| {
                    if nested.input.peek(Token![=]) {
                        let _: syn::Expr = nested.value()?.parse()?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        })?;
    }
    Ok(rename)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else {
            result.push(ch);
        }
    }
    result
}
