use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Lit, Meta};

/// Balance role of a flux field, taken from `#[fluxes(source)]` or `#[fluxes(sink)]`.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Source,
    Sink,
    Neutral,
}

/// Derive macro for daily water flux records.
///
/// All fields in the source struct must be `f64`. The derive generates:
///
/// - a companion `{StructName}Timeseries` struct holding one `Vec<f64>` per
///   field, with `with_capacity`, `push`, `len` and `is_empty`;
/// - `field_names()` on the record itself;
/// - `total_sources()` / `total_sinks()`, summing the fields tagged
///   `#[fluxes(source)]` (water entering the column) and `#[fluxes(sink)]`
///   (water leaving it), plus `source_names()` / `sink_names()`.
///
/// Use `#[fluxes(timeseries_name = "CustomName")]` on the struct to override
/// the timeseries struct name.
#[proc_macro_derive(Fluxes, attributes(fluxes))]
pub fn derive_fluxes(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let name = &input.ident;

    let ts_name = extract_timeseries_name(&input)
        .unwrap_or_else(|| format_ident!("{}Timeseries", name));

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "Fluxes can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "Fluxes can only be derived for structs")
                .to_compile_error()
                .into();
        }
    };

    if fields.is_empty() {
        return syn::Error::new_spanned(name, "Fluxes struct must have at least one field")
            .to_compile_error()
            .into();
    }

    let mut field_names = Vec::new();
    let mut field_idents = Vec::new();
    let mut sources = Vec::new();
    let mut sinks = Vec::new();
    for field in fields {
        let ident = field.ident.as_ref().unwrap();
        if !is_f64_type(&field.ty) {
            return syn::Error::new_spanned(&field.ty, "Fluxes derive: all fields must be f64")
                .to_compile_error()
                .into();
        }
        match field_role(field) {
            Ok(Role::Source) => sources.push(ident),
            Ok(Role::Sink) => sinks.push(ident),
            Ok(Role::Neutral) => {}
            Err(err) => return err.to_compile_error().into(),
        }
        field_names.push(ident.to_string());
        field_idents.push(ident);
    }

    let first_field = &field_idents[0];

    let field_name_strs: Vec<&str> = field_names.iter().map(|s| s.as_str()).collect();
    let source_strs: Vec<String> = sources.iter().map(|i| i.to_string()).collect();
    let sink_strs: Vec<String> = sinks.iter().map(|i| i.to_string()).collect();

    let ts_fields = field_idents.iter().map(|f| {
        quote! { pub #f: Vec<f64> }
    });

    let with_cap_fields = field_idents.iter().map(|f| {
        quote! { #f: Vec::with_capacity(n) }
    });

    let push_fields = field_idents.iter().map(|f| {
        quote! { self.#f.push(f.#f); }
    });

    let expanded = quote! {
        /// Auto-generated timeseries struct for collecting daily fluxes.
        #[derive(Debug, Clone, Default)]
        pub struct #ts_name {
            #(#ts_fields,)*
        }

        impl #ts_name {
            /// Pre-allocate all vectors for `n` days.
            pub fn with_capacity(n: usize) -> Self {
                Self {
                    #(#with_cap_fields,)*
                }
            }

            /// Push a single day's fluxes.
            pub fn push(&mut self, f: &#name) {
                #(#push_fields)*
            }

            /// Number of days stored.
            pub fn len(&self) -> usize {
                self.#first_field.len()
            }

            /// Returns `true` if no days have been stored.
            pub fn is_empty(&self) -> bool {
                self.#first_field.is_empty()
            }
        }

        impl #name {
            /// Returns the field names of this flux struct.
            pub fn field_names() -> &'static [&'static str] {
                &[#(#field_name_strs),*]
            }

            /// Names of the fields that bring water into the column.
            pub fn source_names() -> &'static [&'static str] {
                &[#(#source_strs),*]
            }

            /// Names of the fields that remove water from the column.
            pub fn sink_names() -> &'static [&'static str] {
                &[#(#sink_strs),*]
            }

            /// Sum of all `#[fluxes(source)]` fields.
            pub fn total_sources(&self) -> f64 {
                0.0 #(+ self.#sources)*
            }

            /// Sum of all `#[fluxes(sink)]` fields.
            pub fn total_sinks(&self) -> f64 {
                0.0 #(+ self.#sinks)*
            }
        }
    };

    expanded.into()
}

fn extract_timeseries_name(input: &DeriveInput) -> Option<proc_macro2::Ident> {
    for attr in &input.attrs {
        if attr.path().is_ident("fluxes") {
            let nested = attr
                .parse_args_with(
                    syn::punctuated::Punctuated::<syn::Meta, syn::Token![,]>::parse_terminated,
                )
                .ok()?;
            for meta in nested {
                if let Meta::NameValue(nv) = meta {
                    if nv.path.is_ident("timeseries_name") {
                        if let syn::Expr::Lit(expr_lit) = &nv.value {
                            if let Lit::Str(lit_str) = &expr_lit.lit {
                                return Some(format_ident!("{}", lit_str.value()));
                            }
                        }
                    }
                }
            }
        }
    }
    None
}

fn field_role(field: &Field) -> syn::Result<Role> {
    let mut role = Role::Neutral;
    for attr in &field.attrs {
        if !attr.path().is_ident("fluxes") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let next = if meta.path.is_ident("source") {
                Role::Source
            } else if meta.path.is_ident("sink") {
                Role::Sink
            } else {
                return Err(meta.error("expected `source` or `sink`"));
            };
            if role != Role::Neutral && role != next {
                return Err(meta.error("a flux cannot be both a source and a sink"));
            }
            role = next;
            Ok(())
        })?;
    }
    Ok(role)
}

fn is_f64_type(ty: &syn::Type) -> bool {
    if let syn::Type::Path(type_path) = ty {
        type_path.path.is_ident("f64")
    } else {
        false
    }
}
