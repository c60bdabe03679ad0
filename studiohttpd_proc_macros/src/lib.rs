use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Implements `crate::fields::Patch` for a payload struct.
///
/// Every `Option<_>` field that is `Some` ends up in the change set under the field name,
/// `Option<Option<_>>` fields carry an explicit null as `Some(None)`.
/// Non-optional fields (record id, ...) are never part of the change set.
#[proc_macro_derive(Patch)]
pub fn derive_patch(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let struct_name = input.ident;

    let fields = if let syn::Data::Struct(syn::DataStruct {
                                              fields: syn::Fields::Named(ref fields),
                                              ..
                                          }) = input.data {
        fields
    } else {
        return syn::Error::new_spanned(struct_name, "Patch can be derived for structs with named fields only")
            .to_compile_error()
            .into();
    };

    let setters = fields.named.iter().filter_map(|field| {
        let field_name = field.ident.as_ref()?;
        let field_ty = &field.ty;

        if let syn::Type::Path(type_path) = field_ty {
            if type_path.path.segments.last()?.ident == "Option" {
                Some(quote! {
                    if let Some(value) = &self.#field_name {
                        changes.set(stringify!(#field_name), value.clone());
                    }
                })
            } else {
                None
            }
        } else {
            None
        }
    });

    let expanded = quote! {
        impl crate::fields::Patch for #struct_name {
            fn changes(&self) -> crate::fields::ChangeSet {
                let mut changes = crate::fields::ChangeSet::new();
                #(#setters)*
                changes
            }
        }
    };

    TokenStream::from(expanded)
}
