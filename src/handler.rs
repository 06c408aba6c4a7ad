//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers of different types, taking different arguments,
//! in one table. Each is wrapped in an `FnHandler` and stored behind a
//! `dyn ErasedHandler`, so every route looks the same at dispatch time:
//!
//! ```text
//! async fn signup(form: Form<Signup>) -> Response { … }   ← user writes this
//!        ↓ router.post("/signup", signup)
//! Arc::new(FnHandler(signup, PhantomData))                ← Handler<Form<Signup>>
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time
//!        ↓
//! Form::<Signup>::from_request(req)                       ← gate runs here
//!    Ok(form)   → signup(form).await.into_response()
//!    Err(abort) → translate(abort), recovery handler on Err
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::gate::{FromRequest, translate};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Pin<Box<…>>` because the runtime polls the future in place and must not
/// move it after the first poll. `Send + 'static` so tokio can move it
/// between worker threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the return type of the public
/// `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
///
/// `#[doc(hidden)] pub` for the same reason as `ErasedHandler`. One atomic
/// increment per request; the handler itself is never copied.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn`
/// taking one argument that implements [`FromRequest`]:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// async fn name(form: Form<T>) -> impl IntoResponse
/// ```
///
/// `E` is the argument type. It only exists so the blanket impl below can
/// name it; callers never spell it out.
pub trait Handler<E>: private::Sealed<E> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. `Sealed` is unnameable outside this crate, so only
/// the blanket impl below can satisfy `Handler`.
mod private {
    pub trait Sealed<E> {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

/// `Fn(E) -> Fut` covers named `async fn` items, closures returning futures,
/// and any type implementing `Fn`.
impl<F, Fut, R, E> private::Sealed<E> for F
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: FromRequest,
{
}

impl<F, Fut, R, E> Handler<E> for F
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: FromRequest,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self, PhantomData))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Holds a concrete handler `F` and implements [`ErasedHandler`] for it.
///
/// `PhantomData<fn() -> E>` records the argument type without owning one, so
/// the wrapper stays `Send + Sync` whatever `E` is.
struct FnHandler<F, E>(F, PhantomData<fn() -> E>);

impl<F, Fut, R, E> ErasedHandler for FnHandler<F, E>
where
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
    E: FromRequest,
{
    fn call(&self, req: Request) -> BoxFuture {
        // Extraction consumes the request; keep the recovery handler around
        // for the failure path.
        let services = req.services.clone();

        match E::from_request(req) {
            Ok(arg) => {
                // The wrapped function returns its concrete `Fut`; map it to
                // `Response` and box it to match the trait signature.
                let fut = (self.0)(arg);
                Box::pin(async move { fut.await.into_response() })
            }
            Err(abort) => {
                // Validation failures carry their response. Everything else
                // (denied authorization included) goes to recovery.
                let response = translate(abort).unwrap_or_else(|e| services.recover(e));
                Box::pin(async move { response })
            }
        }
    }
}
