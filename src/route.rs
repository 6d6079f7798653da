//! Routes and the ordered collection they live in.
//!
//! Matching is a linear scan in declaration order and the first route that
//! fits wins. Declare specific routes before general ones: `/domain/add`
//! must come before `/domain/{id}` or the placeholder swallows it.

use std::fmt;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::pattern::Pattern;
use crate::request::Request;

/// One endpoint: method, URI template, optional name, and its handler.
///
/// Immutable once built. The template is compiled on construction, so a
/// malformed one is rejected before the route can be registered.
#[derive(Clone)]
pub struct Route {
    method: Method,
    uri: String,
    name: Option<String>,
    handler_key: String,
    handler: BoxedHandler,
    pattern: Pattern,
}

impl Route {
    /// Builds a route whose handler is known as `handler_key` in logs and errors.
    pub fn new(method: Method, uri: &str, handler_key: &str, handler: impl Handler) -> Result<Self, Error> {
        Self::from_boxed(method, uri, handler_key, handler.into_boxed_handler())
    }

    pub(crate) fn from_boxed(
        method: Method,
        uri: &str,
        handler_key: &str,
        handler: BoxedHandler,
    ) -> Result<Self, Error> {
        Ok(Self {
            method,
            uri: uri.to_owned(),
            name: None,
            handler_key: handler_key.to_owned(),
            handler,
            pattern: Pattern::compile(uri)?,
        })
    }

    /// Names the route for reverse lookup.
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &str { &self.uri }
    pub fn name(&self) -> Option<&str> { self.name.as_deref() }
    pub fn handler_key(&self) -> &str { &self.handler_key }
    pub fn pattern(&self) -> &Pattern { &self.pattern }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }

    /// Method equality and a full-path pattern match.
    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.method == method && self.pattern.is_match(path)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("handler", &self.handler_key)
            .finish()
    }
}

// ── RouteCollection ───────────────────────────────────────────────────────────

/// Routes in declaration order.
///
/// Names are not checked for uniqueness; [`get`](RouteCollection::get)
/// returns the first route carrying the name.
#[derive(Clone, Debug, Default)]
pub struct RouteCollection {
    routes: Vec<Route>,
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `route`. Returns `self` for chaining.
    pub fn add(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// First route named `name`.
    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name() == Some(name))
    }

    pub fn all(&self) -> &[Route] {
        &self.routes
    }

    /// First route, in declaration order, whose method equals the request's
    /// and whose pattern matches the request path.
    pub fn match_request(&self, req: &Request) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(req.method(), req.path()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
