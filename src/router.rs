//! Ordered request router.
//!
//! Routes are scanned in declaration order and the first one whose method
//! and compiled pattern fit the request wins. Route tables are small and
//! built once at start-up, so a linear scan is all the index it needs.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::handler::{ErasedHandler, Handler, HandlerRegistry};
use crate::method::Method;
use crate::outcome::{Outcome, Target};
use crate::pattern::Pattern;
use crate::request::Request;
use crate::route::{Route, RouteCollection};

/// One line of a static route table.
///
/// ```rust
/// use trellis::{Method, RouteDecl};
///
/// const ROUTES: &[RouteDecl] = &[
///     RouteDecl::new(Method::Get,  "/",            "dashboard.index").named("dashboard"),
///     RouteDecl::new(Method::Get,  "/domain/add",  "dashboard.add"),
///     RouteDecl::new(Method::Get,  "/domain/{id}", "dashboard.details"),
///     RouteDecl::new(Method::Post, "/domain",      "dashboard.create"),
/// ];
/// ```
#[derive(Clone, Copy, Debug)]
pub struct RouteDecl {
    pub method: Method,
    pub uri: &'static str,
    pub handler: &'static str,
    pub name: Option<&'static str>,
}

impl RouteDecl {
    pub const fn new(method: Method, uri: &'static str, handler: &'static str) -> Self {
        Self { method, uri, handler, name: None }
    }

    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

/// The application router. Build it once; share it read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: RouteCollection,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a router from a static table, resolving every handler key
    /// against `registry`. Fails on the first unknown key or bad template.
    pub fn from_table(table: &[RouteDecl], registry: &HandlerRegistry) -> Result<Self, Error> {
        let mut routes = RouteCollection::new();
        for decl in table {
            let handler = registry.resolve(decl.handler).ok_or_else(|| Error::UnresolvedHandler {
                method: decl.method.to_string(),
                uri: decl.uri.to_owned(),
                key: decl.handler.to_owned(),
            })?;
            let mut route = Route::from_boxed(decl.method, decl.uri, decl.handler, handler)?;
            if let Some(name) = decl.name {
                route = route.named(name);
            }
            routes.add(route);
        }
        debug!(routes = routes.len(), "route table loaded");
        Ok(Self { routes })
    }

    /// Registers a handler for a method + URI template. Returns `self` for chaining.
    ///
    /// ```rust
    /// # use trellis::{Method, Request, Router, View, view};
    /// # async fn details(_: Request) -> View { view("domain.details") }
    /// # async fn add(_: Request) -> View { view("domain.add") }
    /// # fn main() -> Result<(), trellis::Error> {
    /// let router = Router::new()
    ///     .on(Method::Get, "/domain/add",  add)?
    ///     .on(Method::Get, "/domain/{id}", details)?;
    /// # Ok(()) }
    /// ```
    pub fn on(self, method: Method, uri: &str, handler: impl Handler) -> Result<Self, Error> {
        let key = format!("{method} {uri}");
        Ok(self.route(Route::new(method, uri, &key, handler)?))
    }

    /// Appends a prebuilt route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.add(route);
        self
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    /// Compiles a URI template into its anchored matching pattern.
    pub fn get_pattern(uri: &str) -> Result<Pattern, Error> {
        Pattern::compile(uri)
    }

    /// Runs the handler of the first route matching `req`.
    ///
    /// `Ok(None)` means no route matched. A handler fault comes back as
    /// `Err` and is not retried.
    pub async fn dispatch(&self, mut req: Request) -> Result<Option<Outcome>, Error> {
        let Some(route) = self.routes.match_request(&req) else {
            debug!(method = %req.method(), path = req.path(), "no route matched");
            return Ok(None);
        };

        debug!(
            method = %req.method(),
            path = req.path(),
            handler = route.handler_key(),
            "route matched"
        );

        let params = route.pattern().captures(req.path()).unwrap_or_default();
        let handler = Arc::clone(route.handler());
        req.set_params(params);

        handler.call(req).await.map(Some)
    }

    /// Reverse lookup: the path of the route named `name` with `params`
    /// filled in.
    pub fn url(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        self.routes.get(name)?.pattern().fill(params)
    }

    pub(crate) fn resolve(&self, target: &Target) -> Result<String, Error> {
        match target {
            Target::Path(path) => Ok(path.clone()),
            Target::Route { name, params } => self
                .url(name, params)
                .ok_or_else(|| Error::UnknownRoute(name.clone())),
        }
    }
}
