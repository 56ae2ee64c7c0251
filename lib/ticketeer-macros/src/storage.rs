use proc_macro::TokenStream;
use proc_macro2::Ident;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Attribute, DeriveInput, Error, LitStr, Result, Token, Type};

/// The `#[format(Type)]` attribute.
struct FormatAttribute(Type);

impl Parse for FormatAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        Ok(Self(input.parse()?))
    }
}

/// The `#[location("path/{}", Type, ...)]` attribute.
struct LocationAttribute {
    template: LitStr,
    arguments: Vec<Type>,
}

impl Parse for LocationAttribute {
    fn parse(input: ParseStream) -> Result<Self> {
        let template = input.parse::<LitStr>()?;

        if input.is_empty() {
            return Ok(Self { template, arguments: vec![] });
        }

        input.parse::<Token![,]>()?;

        let arguments = Punctuated::<Type, Token![,]>::parse_terminated(input)?;

        Ok(Self { template, arguments: arguments.into_iter().collect() })
    }
}

/// Finds and parses the attribute with the given name.
fn attribute<T: Parse>(attributes: &[Attribute], ident: &Ident, name: &str) -> Result<T> {
    let Some(attribute) = attributes.iter().find(|a| a.path().is_ident(name)) else {
        let message = format!("the `{name}` attribute must be configured");

        return Err(Error::new(ident.span(), message));
    };

    attribute.parse_args()
}

fn expand(input: DeriveInput) -> Result<proc_macro2::TokenStream> {
    let DeriveInput { attrs, ident, generics, .. } = input;
    let FormatAttribute(format) = self::attribute(&attrs, &ident, "format")?;
    let LocationAttribute { template, arguments } = self::attribute(&attrs, &ident, "location")?;

    let placeholders = template.value().matches("{}").count();

    if placeholders != arguments.len() {
        let message = format!("expected {placeholders} location argument type(s)");

        return Err(Error::new(template.span(), message));
    }

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let names = (0 .. arguments.len()).map(|n| format_ident!("_{n}")).collect::<Vec<_>>();

    Ok(quote! {
        impl #impl_generics ::ticketeer_storage::Stored for #ident #ty_generics #where_clause {
            type Arguments = (#(#arguments),*);
            type Format = #format;

            fn stored((#(#names),*): Self::Arguments) -> ::ticketeer_storage::Key<Self, Self::Format> {
                let format = <#format as ::std::default::Default>::default();
                let extension = ::ticketeer_storage::Format::extension(&format);
                let path = ::std::format!(::std::concat!(#template, ".{}"), #(#names,)* extension);

                ::ticketeer_storage::Key::new(path, format)
            }
        }
    })
}

pub fn procedure(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    self::expand(input).unwrap_or_else(Error::into_compile_error).into()
}
