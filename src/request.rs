//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::method::Method;
use crate::session::{ERRORS, FLASH, OLD, Session};

/// An incoming HTTP request, as seen by a handler.
///
/// Besides the wire data it carries the path parameters extracted by the
/// router and a read-only copy of the visitor's session, so handlers can show
/// the flash message staged by the previous request.
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    session: Session,
}

impl Request {
    /// Creates a request for `uri`; anything after `?` becomes the query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (uri, None),
        };
        Self {
            method,
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            session: Session::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn session(&self) -> &Session { &self.session }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/domain/{id}`, `req.param("id")` on `/domain/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a form field, looking in a urlencoded body first and then in
    /// the query string.
    pub fn input(&self, key: &str) -> Option<String> {
        std::str::from_utf8(&self.body)
            .ok()
            .and_then(|body| form_value(body, key))
            .or_else(|| self.query.as_deref().and_then(|q| form_value(q, key)))
    }

    /// Every urlencoded body field, the last occurrence of a name winning.
    /// Empty when the body is declared as anything other than a form.
    pub fn form(&self) -> Map<String, Value> {
        if self
            .header("content-type")
            .is_some_and(|ct| !ct.starts_with("application/x-www-form-urlencoded"))
        {
            return Map::new();
        }
        let Ok(body) = std::str::from_utf8(&self.body) else {
            return Map::new();
        };
        body.split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                Some((decode(k)?, Value::String(decode(v)?)))
            })
            .collect()
    }

    /// A form field submitted by the request that redirected here.
    pub fn old(&self, key: &str) -> Option<&Value> {
        self.session.get(OLD)?.get(key)
    }

    /// Returns a flash entry staged by the previous request.
    pub fn flash(&self, key: &str) -> Option<&Value> {
        self.session.get(FLASH)?.get(key)
    }

    /// Validation errors staged by the previous request, if any.
    pub fn errors(&self) -> Option<&Map<String, Value>> {
        self.session.get(ERRORS)?.as_object()
    }
}

fn form_value(raw: &str, key: &str) -> Option<String> {
    raw.split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode(k)?, v))
        })
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| decode(v))
}

fn decode(s: &str) -> Option<String> {
    urlencoding::decode(&s.replace('+', " ")).ok().map(|c| c.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_query_from_path() {
        let req = Request::new(Method::Get, "/domain/7?tab=dns");
        assert_eq!(req.path(), "/domain/7");
        assert_eq!(req.query(), Some("tab=dns"));
        assert_eq!(req.input("tab").as_deref(), Some("dns"));
    }

    #[test]
    fn reads_urlencoded_form_fields() {
        let req = Request::new(Method::Post, "/domain")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("domain=example.com&pagerule_url=example.com%2F*&note=two+words");

        assert_eq!(req.input("domain").as_deref(), Some("example.com"));
        assert_eq!(req.input("pagerule_url").as_deref(), Some("example.com/*"));
        assert_eq!(req.input("note").as_deref(), Some("two words"));
        assert_eq!(req.input("missing"), None);
        assert_eq!(req.header("content-type"), Some("application/x-www-form-urlencoded"));
    }

    #[test]
    fn exposes_previous_flash_and_errors() {
        let mut session = Session::new();
        session.put(FLASH, json!({ "message_type": "success" }));
        session.put(ERRORS, json!({ "domain": "required" }));

        let req = Request::new(Method::Get, "/dashboard").with_session(session);
        assert_eq!(req.flash("message_type"), Some(&json!("success")));
        assert_eq!(req.errors().and_then(|e| e.get("domain")), Some(&json!("required")));
    }

    #[test]
    fn collects_form_fields() {
        let req = Request::new(Method::Post, "/domain?ignored=1")
            .with_body("domain=example.com&note=two+words&domain=example.org&flag");
        assert_eq!(
            Value::Object(req.form()),
            json!({ "domain": "example.org", "note": "two words", "flag": "" })
        );

        let json_body = Request::new(Method::Post, "/api/zones")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"domain":"example.com"}"#);
        assert!(json_body.form().is_empty());
    }

    #[test]
    fn exposes_previous_input() {
        let mut session = Session::new();
        session.put(OLD, json!({ "domain": "example.com" }));

        let req = Request::new(Method::Get, "/domain/add").with_session(session);
        assert_eq!(req.old("domain"), Some(&json!("example.com")));
        assert_eq!(req.old("root_cname_target"), None);
    }
}
