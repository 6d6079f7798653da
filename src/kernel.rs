//! The request kernel.
//!
//! One pass per request, always in the same order:
//!
//! ```text
//! Received → Dispatched {matched | unmatched}
//!          → Mapped {200 | redirect | json | 404}
//!          → Emitted → Terminated
//! ```
//!
//! The kernel owns the only place where a handler's [`Outcome`] becomes an
//! HTTP [`Response`]. A redirect emits no body: its flash data is staged in
//! the session for the next request and the transport only learns the
//! location.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;
use crate::outcome::{Outcome, View, view};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::Router;
use crate::session::{ERRORS, FLASH, OLD, Session};
use crate::status::Status;
use crate::view::{NOT_FOUND_TEMPLATE, Render};

/// Where the kernel emits its result.
pub trait Transport {
    /// A full response: status, headers and body.
    fn send(&mut self, response: &Response);

    /// A redirect directive. No body is emitted this cycle.
    fn redirect(&mut self, location: &str);
}

/// Top-level request handler.
pub struct Kernel {
    router: Router,
    views: Arc<dyn Render>,
}

impl Kernel {
    pub fn new(router: Router, views: impl Render) -> Self {
        Self { router, views: Arc::new(views) }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatches `req`, maps the outcome, emits it to `transport` and
    /// terminates the request.
    ///
    /// Returns the emitted response, or `None` for a redirect. A redirect
    /// also stages the request's form input under `old`. Handler faults are
    /// returned as `Err` before anything is emitted; the session is left as
    /// it was.
    pub async fn handle(
        &self,
        req: Request,
        session: &mut Session,
        transport: &mut impl Transport,
    ) -> Result<Option<Response>, Error> {
        let input = req.form();
        let outcome = self.router.dispatch(req).await?;
        self.complete(outcome, input, session, transport)
    }

    /// Finishes a request whose method no route can be declared with.
    /// It is answered like any other unmatched request.
    pub fn handle_unroutable(
        &self,
        session: &mut Session,
        transport: &mut impl Transport,
    ) -> Result<Option<Response>, Error> {
        self.complete(None, Map::new(), session, transport)
    }

    fn complete(
        &self,
        outcome: Option<Outcome>,
        input: Map<String, Value>,
        session: &mut Session,
        transport: &mut impl Transport,
    ) -> Result<Option<Response>, Error> {
        let location = match &outcome {
            Some(Outcome::Redirect(r)) => Some(self.router.resolve(r.target())?),
            _ => None,
        };

        let response = self.prepare_response(session, outcome)?;

        match (&response, location) {
            (Some(resp), _) => transport.send(resp),
            (None, Some(location)) => {
                session.stage(OLD, input);
                transport.redirect(&location);
            }
            (None, None) => {}
        }

        self.terminate(session, response.as_ref());
        Ok(response)
    }

    /// Maps a handler outcome to a response.
    ///
    /// - `Redirect` stages its flash data and errors for the next request and
    ///   yields `None`.
    /// - `Json` passes through with its own status and headers.
    /// - `View` renders to a 200 with the view's headers.
    /// - `NotFound`, or no outcome at all, renders `errors.404` with a 404.
    pub fn prepare_response(
        &self,
        session: &mut Session,
        outcome: Option<Outcome>,
    ) -> Result<Option<Response>, Error> {
        match outcome {
            Some(Outcome::Redirect(redirect)) => {
                let (_, flash, errors) = redirect.into_parts();
                session.stage(FLASH, flash);
                session.stage(ERRORS, errors);
                Ok(None)
            }
            Some(Outcome::Json(json)) => {
                let (status, body, headers) = json.into_parts();
                let headers = with_content_type(headers, ContentType::Json);
                Ok(Some(Response::new(status, headers, serde_json::to_vec(&body)?)))
            }
            Some(Outcome::View(view)) => self.render(&view, session, Status::Ok).map(Some),
            Some(Outcome::NotFound) | None => {
                warn!("responding 404");
                self.render(&view(NOT_FOUND_TEMPLATE), session, Status::NotFound).map(Some)
            }
        }
    }

    /// Forgets the current cycle's flash data, validation errors and old
    /// input. Safe to call any number of times.
    pub fn terminate(&self, session: &mut Session, response: Option<&Response>) {
        session.forget(&[FLASH, ERRORS, OLD]);
        debug!(status = ?response.map(Response::status), "request terminated");
    }

    fn render(&self, view: &View, session: &Session, status: Status) -> Result<Response, Error> {
        let body = self.views.render(view, session)?;
        let headers = with_content_type(view.headers().to_vec(), ContentType::Html);
        Ok(Response::new(status, headers, body))
    }
}

fn with_content_type(mut headers: Vec<(String, String)>, default: ContentType) -> Vec<(String, String)> {
    if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
        headers.insert(0, ("content-type".to_owned(), default.as_str().to_owned()));
    }
    headers
}
