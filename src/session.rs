//! Per-visitor session state and the store that keeps it between requests.
//!
//! A [`Session`] holds two maps: the values visible during the current
//! request, and the entries *staged* for the next one. Flash data is always
//! staged; [`Session::age`] promotes it when the session is saved, so it is
//! readable on exactly one subsequent request before the kernel forgets it.
//!
//! ```text
//! request 1: handler → Redirect::with("message_type", "success")
//!            kernel  → session.stage("flash", …)      staged
//!            store   → save → age()                  values["flash"]
//! request 2: req.flash("message_type") == "success"
//!            kernel  → terminate → forget(["flash", "errors"])
//! request 3: req.flash("message_type") == None
//! ```

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Session key holding one-shot flash messages.
pub const FLASH: &str = "flash";

/// Session key holding one-shot validation errors.
pub const ERRORS: &str = "errors";

/// Session key holding the form input of a request that redirected, so the
/// next page can refill its fields.
pub const OLD: &str = "old";

/// Session state for one visitor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    values: Map<String, Value>,
    staged: Map<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Removes every listed key. Absent keys are ignored.
    pub fn forget(&mut self, keys: &[&str]) {
        for key in keys {
            self.values.remove(*key);
        }
    }

    /// Merges `entries` into the `bucket` object staged for the next request.
    pub fn stage(&mut self, bucket: &str, entries: Map<String, Value>) {
        if entries.is_empty() {
            return;
        }
        match self.staged.get_mut(bucket) {
            Some(Value::Object(existing)) => existing.extend(entries),
            _ => {
                self.staged.insert(bucket.to_owned(), Value::Object(entries));
            }
        }
    }

    /// Stages a single flash entry for the next request.
    pub fn flash(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let mut entry = Map::new();
        entry.insert(key.into(), value.into());
        self.stage(FLASH, entry);
    }

    pub fn staged(&self, bucket: &str) -> Option<&Value> {
        self.staged.get(bucket)
    }

    /// Promotes staged entries into the current values, replacing any
    /// bucket of the same name.
    pub fn age(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        self.values.extend(staged);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.staged.is_empty()
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Where sessions live between requests.
///
/// The server loads the session at the start of a request and saves it once
/// the kernel has terminated; nothing else touches the store.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the session stored under `id`, or `None` for an id this store
    /// does not hold. The server never adopts an id that loads as `None`.
    fn load(&self, id: &str) -> Option<Session>;

    /// Persists `session` under `id`. Implementations must [`age`](Session::age)
    /// the session so staged flash data becomes visible on the next load.
    fn save(&self, id: &str, session: Session);
}

/// In-process session store. Sessions vanish on restart.
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    fn save(&self, id: &str, mut session: Session) {
        session.age();
        if session.is_empty() {
            self.sessions.remove(id);
        } else {
            self.sessions.insert(id.to_owned(), session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn staged_entries_are_invisible_until_aged() {
        let mut s = Session::new();
        s.flash("message_type", "success");

        assert!(s.get(FLASH).is_none());
        assert_eq!(s.staged(FLASH), Some(&json!({ "message_type": "success" })));

        s.age();
        assert_eq!(s.get(FLASH), Some(&json!({ "message_type": "success" })));
        assert!(s.staged(FLASH).is_none());
    }

    #[test]
    fn stage_merges_into_existing_bucket() {
        let mut s = Session::new();
        s.flash("message_header", "Added site");
        s.flash("message_type", "success");
        s.age();

        assert_eq!(
            s.get(FLASH),
            Some(&json!({ "message_header": "Added site", "message_type": "success" }))
        );
    }

    #[test]
    fn forget_is_idempotent() {
        let mut s = Session::new();
        s.put("user", "alice");
        s.put(FLASH, json!({ "a": 1 }));

        s.forget(&[FLASH, ERRORS]);
        s.forget(&[FLASH, ERRORS]);

        assert!(s.get(FLASH).is_none());
        assert_eq!(s.get("user"), Some(&json!("alice")));
    }

    #[test]
    fn flash_survives_exactly_one_round_trip_through_store() {
        let store = MemoryStore::new();

        assert!(store.load("abc").is_none());

        let mut first = Session::new();
        first.flash("message_type", "error");
        store.save("abc", first);

        let mut second = store.load("abc").unwrap();
        assert_eq!(second.get(FLASH), Some(&json!({ "message_type": "error" })));
        second.forget(&[FLASH, ERRORS]);
        store.save("abc", second);

        assert!(store.load("abc").is_none());
        assert!(store.is_empty());
    }
}
