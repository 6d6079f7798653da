//! Handler trait, type erasure, and the registry handlers are looked up in.
//!
//! # How async handlers are stored
//!
//! A route table holds handlers of *different* types, so each one is hidden
//! behind a trait object (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn details(req: Request) -> View { … }       ← user writes this
//!        ↓ registry.register("dashboard.details", details)
//! details.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(details))                       ← stored as BoxedHandler
//!        ↓ Router::from_table resolves "dashboard.details" once, at start-up
//! handler.call(req)  at request time                 ← one vtable dispatch
//!        ↓
//! Box::pin(async { details(req).await.into_outcome() })
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::outcome::{IntoOutcome, Outcome};
use crate::request::Request;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a handler outcome.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Result<Outcome, Error>> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared by every request that hits its route.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure returning a future)
/// with the shape:
///
/// ```text
/// async fn name(req: Request) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Maps stable keys such as `"dashboard.details"` to handlers.
///
/// Route tables refer to handlers by key; [`Router::from_table`](crate::Router::from_table)
/// resolves every key against the registry at start-up, so a typo fails the
/// boot rather than the first request that hits the route.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, BoxedHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `key`, replacing any previous one.
    pub fn register(mut self, key: &str, handler: impl Handler) -> Self {
        self.handlers.insert(key.to_owned(), handler.into_boxed_handler());
        self
    }

    pub fn resolve(&self, key: &str) -> Option<BoxedHandler> {
        self.handlers.get(key).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
