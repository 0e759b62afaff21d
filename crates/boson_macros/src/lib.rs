use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, FnArg, Ident, ItemFn, LitInt, Pat, Type};

/// Time a simulation or render function when the `perf_stats` feature is enabled.
///
/// The body is wrapped with a drop guard that logs `[PERF] name: duration`
/// through `bevy::prelude::info!` once the elapsed time exceeds the threshold
/// (milliseconds, default 1). Without `perf_stats` the guard is compiled out.
///
/// If one of the parameters is a `Res<SimTick>` (any binding name), the guard
/// also logs every 100 ticks so slow-but-steady systems show up in the logs.
///
/// # Example
/// ```ignore
/// #[profile(2)]
/// pub fn update_sights(mut world: ResMut<GameWorld>, tick: Res<SimTick>) {
///     // ...
/// }
/// ```
#[proc_macro_attribute]
pub fn profile(attr: TokenStream, item: TokenStream) -> TokenStream {
    let threshold_ms: u128 = if attr.is_empty() {
        1
    } else {
        match syn::parse::<LitInt>(attr).and_then(|lit| lit.base10_parse::<u128>()) {
            Ok(ms) => ms,
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let input = parse_macro_input!(item as ItemFn);
    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let name = sig.ident.to_string();

    let guard = guard_tokens(&name, threshold_ms, find_tick_param(&input));

    let output = quote! {
        #(#attrs)*
        #vis #sig {
            #[cfg(feature = "perf_stats")]
            let _profile_guard = { #guard };

            #block
        }
    };

    output.into()
}

/// Returns the binding name of a `Res<SimTick>` parameter, if any.
fn find_tick_param(func: &ItemFn) -> Option<Ident> {
    func.sig.inputs.iter().find_map(|arg| {
        let FnArg::Typed(pat_type) = arg else {
            return None;
        };
        let Pat::Ident(binding) = &*pat_type.pat else {
            return None;
        };
        is_sim_tick_resource(&pat_type.ty).then(|| binding.ident.clone())
    })
}

fn is_sim_tick_resource(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    let Some(last) = path.path.segments.last() else {
        return false;
    };
    last.ident == "Res" && quote!(#last).to_string().contains("SimTick")
}

fn guard_tokens(name: &str, threshold_ms: u128, tick: Option<Ident>) -> TokenStream2 {
    let (tick_field, tick_init, tick_check) = match tick {
        Some(tick) => (
            quote! { tick: u64, },
            quote! { tick: (#tick).0, },
            quote! { || self.tick % 100 == 0 },
        ),
        None => (quote! {}, quote! {}, quote! {}),
    };

    quote! {
        struct PerfGuard {
            name: &'static str,
            start: std::time::Instant,
            #tick_field
        }

        impl Drop for PerfGuard {
            fn drop(&mut self) {
                let elapsed = self.start.elapsed();
                if elapsed.as_millis() > #threshold_ms #tick_check {
                    bevy::prelude::info!("[PERF] {}: {:?}", self.name, elapsed);
                }
            }
        }

        PerfGuard {
            name: #name,
            start: std::time::Instant::now(),
            #tick_init
        }
    }
}
