//! Unified error type.

/// The error type returned by trellis's fallible operations.
///
/// "No route matched" is not an error: it is an ordinary `None` from
/// [`Router::dispatch`](crate::Router::dispatch) that the kernel turns into a
/// 404 page. This type surfaces start-up faults (bad route templates,
/// unresolved handler keys, bad configuration) and faults raised while a
/// handler runs, which travel up to the [`Server`](crate::Server) untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    Addr(String),

    #[error("invalid route template `{uri}`: {reason}")]
    InvalidPattern { uri: String, reason: String },

    #[error("route `{method} {uri}` refers to unknown handler `{key}`")]
    UnresolvedHandler { method: String, uri: String, key: String },

    #[error("no route named `{0}` or missing parameters for it")]
    UnknownRoute(String),

    #[error("render: {0}")]
    Render(#[from] minijinja::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("handler: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wraps any error raised inside a handler.
    pub fn handler(e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self::Handler(e.into())
    }
}
