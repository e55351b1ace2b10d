//! `rule!` macro implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{Ident, Lit, LitBool, LitInt, LitStr, Result, Token};

/// The rule! macro input.
pub struct RuleInput {
    /// The regex pattern.
    pub pattern: LitStr,
    /// The response, a string or byte string literal.
    pub response: Lit,
    /// Explicitly set options.
    pub options: RuleOptions,
}

/// Options given as `key = value`.
#[derive(Default)]
pub struct RuleOptions {
    pub name: Option<LitStr>,
    pub once: Option<LitBool>,
    pub case_sensitive: Option<LitBool>,
    pub delay_ms: Option<LitInt>,
    pub active: Option<LitBool>,
}

fn set_once<T>(slot: &mut Option<T>, key: &Ident, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(syn::Error::new(key.span(), format!("duplicate option `{key}`")));
    }
    *slot = Some(value);
    Ok(())
}

impl Parse for RuleInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let pattern: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;

        let response: Lit = input.parse()?;
        if !matches!(response, Lit::Str(_) | Lit::ByteStr(_)) {
            return Err(syn::Error::new(
                response.span(),
                "response must be a string or byte string literal",
            ));
        }

        let mut options = RuleOptions::default();
        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }

            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            match key.to_string().as_str() {
                "name" => set_once(&mut options.name, &key, input.parse()?)?,
                "once" => set_once(&mut options.once, &key, input.parse()?)?,
                "case_sensitive" => set_once(&mut options.case_sensitive, &key, input.parse()?)?,
                "delay_ms" => {
                    let value: LitInt = input.parse()?;
                    value.base10_parse::<u64>()?;
                    set_once(&mut options.delay_ms, &key, value)?;
                }
                "active" => set_once(&mut options.active, &key, input.parse()?)?,
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!(
                            "unknown option `{other}` (expected name, once, case_sensitive, delay_ms or active)"
                        ),
                    ));
                }
            }
        }

        Ok(Self {
            pattern,
            response,
            options,
        })
    }
}

/// Generate code for the rule! macro.
pub fn expand(input: RuleInput) -> TokenStream {
    let case_sensitive = input
        .options
        .case_sensitive
        .as_ref()
        .is_some_and(LitBool::value);

    if let Err(e) = regex::RegexBuilder::new(&input.pattern.value())
        .case_insensitive(!case_sensitive)
        .build()
    {
        return syn::Error::new(input.pattern.span(), format!("invalid regex: {e}"))
            .to_compile_error();
    }

    let pattern = &input.pattern;
    let response = match &input.response {
        Lit::ByteStr(bytes) => quote! { &#bytes[..] },
        other => quote! { #other },
    };

    let mut calls = Vec::new();
    let RuleOptions {
        name,
        once,
        case_sensitive,
        delay_ms,
        active,
    } = &input.options;
    if let Some(name) = name {
        calls.push(quote! { .name(#name) });
    }
    if let Some(once) = once {
        calls.push(quote! { .once(#once) });
    }
    if let Some(case_sensitive) = case_sensitive {
        calls.push(quote! { .case_sensitive(#case_sensitive) });
    }
    if let Some(delay_ms) = delay_ms {
        calls.push(quote! { .delay(::std::time::Duration::from_millis(#delay_ms)) });
    }
    if let Some(active) = active {
        calls.push(quote! { .active(#active) });
    }

    quote! {
        ::autoprompt::AutomationRule::builder(#pattern, #response)
            #(#calls)*
            .build()
            .expect("pattern was validated at compile time")
    }
}
