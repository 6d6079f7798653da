//! What a handler returns.
//!
//! Every handler produces one [`Outcome`]. The set is closed: a rendered
//! [`View`], a [`Redirect`] directive, a [`Json`] payload, or
//! [`Outcome::NotFound`]. The kernel maps each variant to an HTTP response
//! with one exhaustive `match`.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::status::Status;

/// The domain value a handler hands back to the kernel.
#[derive(Clone, Debug)]
pub enum Outcome {
    View(View),
    Redirect(Redirect),
    Json(Json),
    NotFound,
}

// ── View ──────────────────────────────────────────────────────────────────────

/// A template to render, the values bound into it, and extra headers.
///
/// ```rust
/// use trellis::view;
///
/// view("domain.details").with("domain", serde_json::json!({ "name": "example.com" }));
/// ```
#[derive(Clone, Debug)]
pub struct View {
    template: String,
    bindings: Map<String, Value>,
    headers: Vec<(String, String)>,
}

/// Shorthand for [`View::new`].
pub fn view(template: &str) -> View {
    View::new(template)
}

impl View {
    /// A view for a dotted template name such as `"dashboard.index"`.
    pub fn new(template: &str) -> Self {
        Self { template: template.to_owned(), bindings: Map::new(), headers: Vec::new() }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.bindings.insert(key.to_owned(), value.into());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn template(&self) -> &str { &self.template }
    pub fn bindings(&self) -> &Map<String, Value> { &self.bindings }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
}

// ── Redirect ──────────────────────────────────────────────────────────────────

/// Where a redirect points.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// A literal path or URL.
    Path(String),
    /// A named route, resolved by the router when the redirect is emitted.
    Route { name: String, params: HashMap<String, String> },
}

/// A redirect directive plus the flash data the next request should see.
///
/// Failed form submissions redirect back with [`with_error`](Redirect::with_error)
/// entries instead of rendering a page.
///
/// ```rust
/// use trellis::Redirect;
///
/// Redirect::route("dashboard")
///     .with("message_header", "Updated site")
///     .with("message_type", "success");
/// ```
#[derive(Clone, Debug)]
pub struct Redirect {
    target: Target,
    flash: Map<String, Value>,
    errors: Map<String, Value>,
}

impl Redirect {
    pub fn to(path: &str) -> Self {
        Self::new(Target::Path(path.to_owned()))
    }

    pub fn route(name: &str) -> Self {
        Self::new(Target::Route { name: name.to_owned(), params: HashMap::new() })
    }

    fn new(target: Target) -> Self {
        Self { target, flash: Map::new(), errors: Map::new() }
    }

    /// Fills a placeholder of the named route. Ignored for path targets.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        if let Target::Route { params, .. } = &mut self.target {
            params.insert(key.to_owned(), value.to_owned());
        }
        self
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flash.insert(key.to_owned(), value.into());
        self
    }

    pub fn with_error(mut self, field: &str, message: impl Into<Value>) -> Self {
        self.errors.insert(field.to_owned(), message.into());
        self
    }

    pub fn target(&self) -> &Target { &self.target }
    pub fn flash(&self) -> &Map<String, Value> { &self.flash }
    pub fn errors(&self) -> &Map<String, Value> { &self.errors }

    pub(crate) fn into_parts(self) -> (Target, Map<String, Value>, Map<String, Value>) {
        (self.target, self.flash, self.errors)
    }
}

// ── Json ──────────────────────────────────────────────────────────────────────

/// A JSON payload. The kernel passes its status and headers through as-is.
#[derive(Clone, Debug)]
pub struct Json {
    status: u16,
    body: Value,
    headers: Vec<(String, String)>,
}

impl Json {
    /// `200 OK` with `body`.
    pub fn new(body: impl Into<Value>) -> Self {
        Self { status: Status::Ok.into(), body: body.into(), headers: Vec::new() }
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn body(&self) -> &Value { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    pub(crate) fn into_parts(self) -> (u16, Value, Vec<(String, String)>) {
        (self.status, self.body, self.headers)
    }
}

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// Conversion from a handler's return value into an [`Outcome`].
///
/// `Result<T, E>` is accepted so handlers can use `?`; the error becomes a
/// handler fault that the server answers with a 500. `Option<T>` maps `None`
/// to [`Outcome::NotFound`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Result<Outcome, Error>;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(self) }
}

impl IntoOutcome for View {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::View(self)) }
}

impl IntoOutcome for Redirect {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Redirect(self)) }
}

impl IntoOutcome for Json {
    fn into_outcome(self) -> Result<Outcome, Error> { Ok(Outcome::Json(self)) }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Result<Outcome, Error> {
        match self {
            Some(v) => v.into_outcome(),
            None => Ok(Outcome::NotFound),
        }
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<Error>,
{
    fn into_outcome(self) -> Result<Outcome, Error> {
        self.map_err(Into::into)?.into_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redirect_collects_flash_errors_and_params() {
        let r = Redirect::route("domain.edit")
            .param("id", "7")
            .with("message_type", "error")
            .with_error("domain", "The domain field is required");

        assert_eq!(
            r.target(),
            &Target::Route {
                name: "domain.edit".into(),
                params: HashMap::from([("id".to_owned(), "7".to_owned())]),
            }
        );
        assert_eq!(r.flash().get("message_type"), Some(&json!("error")));
        assert_eq!(r.errors().get("domain"), Some(&json!("The domain field is required")));
    }

    #[test]
    fn param_is_ignored_for_path_targets() {
        let r = Redirect::to("/dashboard").param("id", "7");
        assert_eq!(r.target(), &Target::Path("/dashboard".into()));
    }

    #[test]
    fn none_becomes_not_found() {
        let missing: Option<View> = None;
        assert!(matches!(missing.into_outcome(), Ok(Outcome::NotFound)));
    }

    #[test]
    fn errors_become_handler_faults() {
        let failed: Result<View, Error> = Err(Error::UnknownRoute("x".into()));
        assert!(failed.into_outcome().is_err());
    }
}
