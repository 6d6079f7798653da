//! View rendering.
//!
//! The kernel only needs something that turns a [`View`] into a body string;
//! that is the [`Render`] trait. [`Templates`] is the stock implementation on
//! minijinja, with templates addressed by dotted names: `domain.details`
//! is `domain/details.html` when loaded from a directory.

use std::fs;
use std::path::Path;

use minijinja::Environment;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;
use crate::outcome::View;
use crate::session::{ERRORS, FLASH, OLD, Session};

/// Template rendered for unmatched requests.
pub const NOT_FOUND_TEMPLATE: &str = "errors.404";

const DEFAULT_NOT_FOUND: &str = "<!doctype html>\n<title>404 Not Found</title>\n<h1>404 Not Found</h1>\n";

/// Turns a view into a response body.
pub trait Render: Send + Sync + 'static {
    /// Renders `view`. `session` is the visitor's session for this request,
    /// so templates can show flash messages and validation errors.
    fn render(&self, view: &View, session: &Session) -> Result<String, Error>;
}

/// minijinja-backed template set.
///
/// Every template sees the view's bindings plus `flash`, `errors` and `old`
/// from the session, unless the view binds those names itself. A plain
/// `errors.404` page is registered up front; add your own to replace it.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // A literal template always parses.
        let _ = env.add_template_owned(NOT_FOUND_TEMPLATE, DEFAULT_NOT_FOUND);
        Self { env }
    }

    /// Registers `source` under a dotted `name`.
    pub fn add(mut self, name: &str, source: &str) -> Result<Self, Error> {
        self.env.add_template_owned(name.to_owned(), source.to_owned())?;
        Ok(self)
    }

    /// Loads every `.html` file below `dir`; `dir/domain/edit.html` is
    /// registered as `domain.edit`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let root = dir.as_ref();
        let mut templates = Self::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                let Some(name) = template_name(root, &path) else { continue };
                let source = fs::read_to_string(&path)?;
                debug!(template = %name, path = %path.display(), "template loaded");
                templates = templates.add(&name, &source)?;
            }
        }
        Ok(templates)
    }
}

impl Default for Templates {
    fn default() -> Self { Self::new() }
}

impl Render for Templates {
    fn render(&self, view: &View, session: &Session) -> Result<String, Error> {
        let mut ctx = Map::new();
        ctx.insert(FLASH.to_owned(), session.get(FLASH).cloned().unwrap_or(Value::Null));
        ctx.insert(ERRORS.to_owned(), session.get(ERRORS).cloned().unwrap_or(Value::Null));
        ctx.insert(OLD.to_owned(), session.get(OLD).cloned().unwrap_or(Value::Null));
        ctx.extend(view.bindings().clone());

        let template = self.env.get_template(view.template())?;
        Ok(template.render(&ctx)?)
    }
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("."))
}
