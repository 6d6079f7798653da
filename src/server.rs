//! HTTP server, the application context, and graceful shutdown.
//!
//! [`App`] is everything a request needs: the kernel (router + views), the
//! session store and the session cookie name. It is built once at start-up
//! and shared by every connection task behind an `Arc`.
//!
//! On SIGTERM or Ctrl-C the server stops accepting connections, lets every
//! in-flight connection finish, and returns from [`Server::serve`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Error;
use crate::kernel::{Kernel, Transport};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::session::{MemoryStore, Session, SessionStore};
use crate::status::Status;
use crate::view::Templates;

// ── App ───────────────────────────────────────────────────────────────────────

/// The application context handed to [`Server::serve`].
pub struct App {
    kernel: Kernel,
    sessions: Arc<dyn SessionStore>,
    cookie: String,
}

impl App {
    pub fn new(kernel: Kernel, sessions: impl SessionStore) -> Self {
        Self {
            kernel,
            sessions: Arc::new(sessions),
            cookie: crate::config::SessionConfig::default().cookie,
        }
    }

    /// Builds an app from configuration: templates from `views.dir` (if
    /// set), in-memory sessions, and the configured cookie name.
    pub fn from_config(config: &Config, router: Router) -> Result<Self, Error> {
        let templates = match &config.views.dir {
            Some(dir) => Templates::from_dir(dir)?,
            None => Templates::new(),
        };
        Ok(Self::new(Kernel::new(router, templates), MemoryStore::new())
            .cookie(&config.session.cookie))
    }

    pub fn cookie(mut self, name: &str) -> Self {
        self.cookie = name.to_owned();
        self
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Runs one buffered request through the kernel.
    ///
    /// Loads the visitor's session from the cookie, hands the request to the
    /// kernel, saves the session and converts what the kernel emitted into an
    /// HTTP response. A handler fault becomes a plain 500 and the session is
    /// left untouched.
    pub async fn call(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();

        // Only ids the store issued are adopted; anything else starts over.
        let known = session_cookie(&parts.headers, &self.cookie)
            .and_then(|id| self.sessions.load(&id).map(|session| (id, session)));
        let (session_id, mut session, fresh) = match known {
            Some((id, session)) => (id, session, false),
            None => (Uuid::new_v4().to_string(), Session::new(), true),
        };
        let mut emitted = Emitted::default();

        let result = match Method::try_from(&parts.method) {
            Ok(method) => {
                let uri = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
                let mut request = Request::new(method, uri)
                    .with_body(body)
                    .with_session(session.clone());
                for (name, value) in &parts.headers {
                    if let Ok(value) = value.to_str() {
                        request = request.with_header(name.as_str(), value);
                    }
                }
                self.kernel.handle(request, &mut session, &mut emitted).await
            }
            Err(()) => self.kernel.handle_unroutable(&mut session, &mut emitted),
        };

        if let Err(e) = result {
            error!(method = %parts.method, path = parts.uri.path(), "handler fault: {e}");
            return Response::text(Status::InternalServerError, "Internal Server Error").into_inner();
        }

        let set_cookie = fresh && !session.is_empty();
        self.sessions.save(&session_id, session);

        let mut response = emitted.into_response();
        debug!(
            method = %parts.method,
            path = parts.uri.path(),
            status = response.status().as_u16(),
            "request handled"
        );
        if set_cookie {
            let cookie = format!("{}={session_id}; Path=/; HttpOnly; SameSite=Lax", self.cookie);
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!("invalid session cookie: {e}"),
            }
        }
        response
    }
}

fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_owned())
}

/// Collects what the kernel emitted for one request.
#[derive(Default)]
struct Emitted {
    response: Option<Response>,
    location: Option<String>,
}

impl Transport for Emitted {
    fn send(&mut self, response: &Response) {
        self.response = Some(response.clone());
    }

    fn redirect(&mut self, location: &str) {
        self.location = Some(location.to_owned());
    }
}

impl Emitted {
    fn into_response(self) -> http::Response<Full<Bytes>> {
        match (self.response, self.location) {
            (Some(response), _) => response.into_inner(),
            (None, Some(location)) => {
                Response::new(Status::Found, vec![("location".to_owned(), location)], Bytes::new())
                    .into_inner()
            }
            (None, None) => {
                error!("kernel emitted nothing");
                Response::text(Status::InternalServerError, "Internal Server Error").into_inner()
            }
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use trellis::Server;
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr.parse().map_err(|_| Error::Addr(addr.to_owned()))?;
        Ok(Self { addr })
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(
            addr = %self.addr,
            routes = app.kernel().router().routes().len(),
            "trellis listening"
        );

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting at once.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("trellis stopped");
        Ok(())
    }
}

/// Buffers the request body and runs the request through the app.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = parts.uri.path(), "failed to read request body: {e}");
            return Ok(Response::text(Status::BadRequest, "Bad Request").into_inner());
        }
    };
    Ok(app.call(http::Request::from_parts(parts, body)).await)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
