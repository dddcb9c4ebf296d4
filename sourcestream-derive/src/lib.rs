//! Derive macros for the traits of the `sourcestream` crate.
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitInt, LitStr, parse_macro_input};

/// Derives the `Event` trait for an enum.
///
/// `event_type` returns the variant's name. `event_version` defaults to `1`
/// and can be set for the whole enum or per variant with
/// `#[event(version = N)]`.
#[proc_macro_derive(Event, attributes(event))]
pub fn event_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_event(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives the `AggregateTypeProvider` trait.
///
/// On a struct the aggregate type is the struct's fully-qualified type name,
/// or the name given with `#[aggregate_type(name = "...")]`.
///
/// On an enum every variant must wrap exactly one aggregate root, and the
/// enum reports the type of the root it currently holds. This is how a
/// family of aggregates shares one repository.
#[proc_macro_derive(AggregateTypeProvider, attributes(aggregate_type))]
pub fn aggregate_type_provider_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_aggregate_type_provider(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_event(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Event derive macro can only be used on enums",
        ));
    };

    let default_version = event_version(&input.attrs)?.unwrap_or(1);

    let mut type_arms = Vec::new();
    let mut version_arms = Vec::new();
    for variant in &data.variants {
        let variant_name = &variant.ident;
        let fields = match &variant.fields {
            Fields::Named(_) => quote! { { .. } },
            Fields::Unnamed(_) => quote! { (..) },
            Fields::Unit => quote! {},
        };
        let version = event_version(&variant.attrs)?.unwrap_or(default_version);
        type_arms.push(quote! {
            #name::#variant_name #fields => stringify!(#variant_name)
        });
        version_arms.push(quote! {
            #name::#variant_name #fields => #version
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics sourcestream::Event for #name #ty_generics #where_clause {
            fn event_type(&self) -> &'static str {
                match self {
                    #(#type_arms),*
                }
            }

            fn event_version(&self) -> u16 {
                match self {
                    #(#version_arms),*
                }
            }
        }
    })
}

/// Reads `version = N` from `#[event(...)]` attributes.
fn event_version(attrs: &[Attribute]) -> syn::Result<Option<u16>> {
    let mut version = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("version") {
                let lit: LitInt = meta.value()?.parse()?;
                version = Some(lit.base10_parse::<u16>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `version`"))
            }
        })?;
    }
    Ok(version)
}

fn expand_aggregate_type_provider(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Struct(_) => match aggregate_type_name(&input.attrs)? {
            Some(type_name) => quote! {
                sourcestream::AggregateType::from_aggregate_root_class(#type_name)
            },
            None => quote! {
                sourcestream::AggregateType::of::<Self>()
            },
        },
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let variant_name = &variant.ident;
                    match &variant.fields {
                        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => Ok(quote! {
                            #name::#variant_name(root) => {
                                sourcestream::AggregateTypeProvider::aggregate_type(root)
                            }
                        }),
                        _ => Err(syn::Error::new_spanned(
                            variant,
                            "each variant must wrap exactly one aggregate root, e.g. `User(User)`",
                        )),
                    }
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                name,
                "AggregateTypeProvider cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics sourcestream::AggregateTypeProvider for #name #ty_generics #where_clause {
            fn aggregate_type(&self) -> sourcestream::AggregateType {
                #body
            }
        }
    })
}

/// Reads `name = "..."` from `#[aggregate_type(...)]` attributes.
fn aggregate_type_name(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut type_name = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("aggregate_type")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                type_name = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported aggregate_type attribute, expected `name`"))
            }
        })?;
    }
    Ok(type_name)
}
