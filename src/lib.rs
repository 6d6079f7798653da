//! # trellis
//!
//! A small MVC-style HTTP framework. Ordered routes, handlers that return a
//! typed outcome, and a kernel that turns the outcome into a response.
//!
//! ## The contract
//!
//! Handlers never build HTTP responses. They return one of four outcomes:
//!
//! | Outcome | Response |
//! |---|---|
//! | [`View`] | `200`, body rendered from a template |
//! | [`Json`] | its own status, headers and serialized body |
//! | [`Redirect`] | `302` to the target, no body; flash data staged for the next request |
//! | [`Outcome::NotFound`] / no route | `404`, body rendered from `errors.404` |
//!
//! Routes are matched in declaration order; the first whose method and
//! anchored pattern fit wins. Put `/domain/add` before `/domain/{id}`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use trellis::{
//!     App, Config, HandlerRegistry, Method, Redirect, Request, RouteDecl, Router, Server, View,
//!     view,
//! };
//!
//! const ROUTES: &[RouteDecl] = &[
//!     RouteDecl::new(Method::Get,  "/",            "dashboard.index").named("dashboard"),
//!     RouteDecl::new(Method::Get,  "/domain/{id}", "dashboard.details"),
//!     RouteDecl::new(Method::Post, "/domain/{id}", "dashboard.update"),
//! ];
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trellis::Error> {
//!     let handlers = HandlerRegistry::new()
//!         .register("dashboard.index",   index)
//!         .register("dashboard.details", details)
//!         .register("dashboard.update",  update);
//!
//!     let config = Config::default();
//!     let router = Router::from_table(ROUTES, &handlers)?;
//!     let app = App::from_config(&config, router)?;
//!
//!     Server::bind(&config.server.addr)?.serve(app).await
//! }
//!
//! async fn index(_req: Request) -> View {
//!     view("dashboard.index")
//! }
//!
//! async fn details(req: Request) -> View {
//!     view("domain.details").with("id", req.param("id").unwrap_or_default())
//! }
//!
//! async fn update(req: Request) -> Redirect {
//!     match req.input("root_cname_target") {
//!         Some(_) => Redirect::route("dashboard").with("message_type", "success"),
//!         None => Redirect::route("dashboard")
//!             .with("message_type", "error")
//!             .with_error("root_cname_target", "required"),
//!     }
//! }
//! ```

mod config;
mod error;
mod handler;
mod kernel;
mod method;
mod outcome;
mod pattern;
mod request;
mod response;
mod route;
mod router;
mod server;
mod status;

pub mod session;
pub mod view;

pub use config::{Config, ServerConfig, SessionConfig, ViewsConfig};
pub use error::Error;
pub use handler::{Handler, HandlerRegistry};
pub use kernel::{Kernel, Transport};
pub use method::Method;
pub use outcome::{IntoOutcome, Json, Outcome, Redirect, Target, View, view};
pub use pattern::Pattern;
pub use request::Request;
pub use response::{ContentType, Response};
pub use route::{Route, RouteCollection};
pub use router::{RouteDecl, Router};
pub use server::{App, Server};
pub use session::{MemoryStore, Session, SessionStore};
pub use status::Status;
pub use view::{Render, Templates};
