use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// Every test gets a fresh in-memory store and outbox behind its own Rocket
/// instance. Injectable dependencies are
/// [`rocket::local::asynchronous::Client`], `Arc<MemoryStore>` and
/// `Arc<Outbox>`. Use `#[backend_test(admin)]` to log the client in as the
/// example admin first.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as admin if needed.
    let maybe_login = parse_macro_input!(args as Option<Ident>)
        .and_then(|arg| {
            if arg == "admin" {
                Some(quote! {
                    crate::model::store::AdminStore::insert_admin(
                        &*store,
                        &crate::model::db::Admin::example(),
                    )
                    .await
                    .unwrap();

                    // The response borrows the client, so drop it before returning.
                    {
                        let response = rocket_client
                            .post("/auth/admin")
                            .header(rocket::http::ContentType::JSON)
                            .body(rocket::serde::json::json!(crate::model::api::auth::AdminCredentials::example()).to_string())
                            .dispatch()
                            .await;
                        assert_eq!(rocket::http::Status::Ok, response.status());
                    }
                })
            } else {
                None
            }
        })
        .unwrap_or_default();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["uni_elections_backend"],
                None,
                None,
            );

            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                std::sync::Arc<crate::model::store::MemoryStore>,
                std::sync::Arc<crate::notifier::Outbox>,
            ) {
                let store = std::sync::Arc::new(crate::model::store::MemoryStore::default());
                let outbox = std::sync::Arc::new(crate::notifier::Outbox::default());
                let rocket = crate::rocket_for_store_and_notifier(
                    crate::test_figment(),
                    store.clone(),
                    outbox.clone(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                #maybe_login

                (rocket_client, store, outbox)
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                #[allow(unused_variables)]
                let (rocket_client, store, outbox) = setup().await;
                #new_name(#(#test_args),*).await
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen = vec![];
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                let last = type_path.path.segments.last().unwrap();
                let injected = if last.ident == "Client" {
                    Some(("Client", quote! { rocket_client }))
                } else if last.ident == "Arc" {
                    match &last.arguments {
                        PathArguments::AngleBracketed(generics) => match generics.args.first() {
                            Some(GenericArgument::Type(Type::Path(inner))) => {
                                match inner.path.segments.last() {
                                    Some(inner) if inner.ident == "MemoryStore" => {
                                        Some(("Arc<MemoryStore>", quote! { store }))
                                    }
                                    Some(inner) if inner.ident == "Outbox" => {
                                        Some(("Arc<Outbox>", quote! { outbox }))
                                    }
                                    _ => None,
                                }
                            }
                            _ => None,
                        },
                        _ => None,
                    }
                } else {
                    None
                };

                if let Some((kind, arg)) = injected {
                    if seen.contains(&kind) {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{kind}`"),
                        ));
                    }
                    seen.push(kind);
                    args.push(arg);
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client: Client`, `store: Arc<MemoryStore>` or `outbox: Arc<Outbox>`",
        ));
    }

    Ok(args)
}
