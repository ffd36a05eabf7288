//! Cookie-backed in-memory session store.
//!
//! Sessions are keyed by a client-presented token and expire after a
//! fixed idle timeout. Matching the original's `saveUninitialized:
//! false` behavior, a cookie is only sent once a handler actually
//! writes to the session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use super::ServerEnv;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "mocklite.sid";

struct SessionEntry {
    values: HashMap<String, Value>,
    touched: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            touched: Instant::now(),
        }
    }
}

/// Shared store of all live sessions.
///
/// Backed by a `DashMap`; each request only ever touches its own entry,
/// so per-key access is the only locking needed.
#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<DashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store with the given idle timeout.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// The configured idle timeout.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolve a client token into a session handle.
    ///
    /// A known, unexpired token resumes its session and refreshes the
    /// idle clock. Anything else gets a fresh session that is only
    /// persisted (and its cookie only set) once a handler writes to it.
    pub fn open(&self, token: Option<&str>) -> Session {
        if let Some(token) = token {
            let resumed = match self.entries.get_mut(token) {
                Some(mut entry) if entry.touched.elapsed() < self.ttl => {
                    entry.touched = Instant::now();
                    true
                }
                _ => false,
            };
            if resumed {
                return Session {
                    id: Arc::from(token),
                    fresh: false,
                    dirty: Arc::new(AtomicBool::new(false)),
                    store: self.clone(),
                };
            }
            // expired or unknown token: drop the stale entry if any
            self.entries.remove(token);
        }

        Session {
            id: Arc::from(Uuid::new_v4().to_string().as_str()),
            fresh: true,
            dirty: Arc::new(AtomicBool::new(false)),
            store: self.clone(),
        }
    }

    /// Remove every entry past its idle timeout.
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| entry.touched.elapsed() < self.ttl);
    }

    /// Number of stored sessions, including not-yet-expired stale ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to one client's session, valid for a single request.
#[derive(Clone)]
pub struct Session {
    id: Arc<str>,
    fresh: bool,
    dirty: Arc<AtomicBool>,
    store: SessionStore,
}

impl Session {
    /// The session token.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read a value from the session.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.store
            .entries
            .get(self.id.as_ref())
            .and_then(|entry| entry.values.get(key).cloned())
    }

    /// Write a value into the session, creating the entry if needed.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut entry = self
            .store
            .entries
            .entry(self.id.to_string())
            .or_insert_with(SessionEntry::new);
        entry.values.insert(key.into(), value);
        entry.touched = Instant::now();
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Remove a value from the session.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self
            .store
            .entries
            .get_mut(self.id.as_ref())
            .and_then(|mut entry| entry.values.remove(key));
        if removed.is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        removed
    }

    /// Whether a Set-Cookie header is owed to the client.
    pub fn needs_cookie(&self) -> bool {
        self.fresh && self.dirty.load(Ordering::SeqCst)
    }
}

/// Extract the session token from a Cookie header value.
pub fn token_from_cookie_header(raw: &str) -> Option<String> {
    Cookie::split_parse(raw)
        .filter_map(std::result::Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Middleware: attach a session to the request, set the cookie on the
/// way out when the handler started one.
pub async fn session_middleware(
    State(env): State<ServerEnv>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(token_from_cookie_header);

    let session = env.sessions.open(token.as_deref());
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;

    if session.needs_cookie() {
        let max_age = cookie::time::Duration::seconds(env.sessions.ttl().as_secs() as i64);
        let cookie = Cookie::build((SESSION_COOKIE, session.id().to_string()))
            .path("/")
            .http_only(true)
            .max_age(max_age)
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_session_has_no_cookie_until_written() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.open(None);

        assert!(!session.needs_cookie());
        assert!(store.is_empty());

        session.insert("loggedin", json!(true));
        assert!(session.needs_cookie());
        assert_eq!(store.len(), 1);
        assert_eq!(session.get("loggedin"), Some(json!(true)));
    }

    #[test]
    fn known_token_resumes_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.open(None);
        first.insert("name", json!("ada"));

        let resumed = store.open(Some(first.id()));
        assert_eq!(resumed.id(), first.id());
        assert_eq!(resumed.get("name"), Some(json!("ada")));
        assert!(!resumed.needs_cookie());
    }

    #[test]
    fn unknown_token_gets_fresh_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.open(Some("not-a-real-token"));
        assert_ne!(session.id(), "not-a-real-token");
        assert!(session.get("anything").is_none());
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::from_millis(20));
        let session = store.open(None);
        session.insert("k", json!(1));
        let token = session.id().to_string();

        std::thread::sleep(Duration::from_millis(50));

        let reopened = store.open(Some(&token));
        assert_ne!(reopened.id(), token);
        assert!(reopened.get("k").is_none());

        store.purge_expired();
        // the expired entry was dropped on reopen, nothing new persisted
        assert!(store.is_empty());
    }

    #[test]
    fn remove_marks_session_dirty() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.open(None);
        first.insert("k", json!(1));

        let resumed = store.open(Some(first.id()));
        assert_eq!(resumed.remove("k"), Some(json!(1)));
        assert_eq!(resumed.get("k"), None);
    }

    #[test]
    fn token_parsing_picks_our_cookie() {
        let raw = format!("other=1; {SESSION_COOKIE}=abc123; more=2");
        assert_eq!(token_from_cookie_header(&raw), Some("abc123".to_string()));
        assert_eq!(token_from_cookie_header("other=1"), None);
    }
}
