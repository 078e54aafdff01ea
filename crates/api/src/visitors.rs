use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use raithu_core::llm::SpeechAudio;
use raithu_core::session::Session;

pub const COOKIE_NAME: &str = "raithu_session";
pub const MAX_VISITORS: usize = 1024;

/// Per-browser state: the conversation plus audio waiting for the next page load.
#[derive(Debug, Default)]
pub struct Visitor {
    pub session: Session,
    pub pending_audio: Option<SpeechAudio>,
}

struct Slot {
    visitor: Arc<Mutex<Visitor>>,
    last_used: u64,
}

/// Sessions keyed by cookie id. Holds at most `capacity` visitors and evicts the
/// least recently used one to make room.
pub struct VisitorStore {
    capacity: usize,
    inner: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<Uuid, Slot>,
    clock: u64,
}

impl VisitorStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Slots::default()),
        }
    }

    /// Looks up `id`, or starts a fresh session under a new id when it is unknown.
    pub async fn visitor(&self, id: Option<Uuid>) -> (Uuid, Arc<Mutex<Visitor>>) {
        let mut slots = self.inner.lock().await;
        slots.clock += 1;
        let now = slots.clock;

        if let Some(id) = id {
            if let Some(slot) = slots.by_id.get_mut(&id) {
                slot.last_used = now;
                return (id, slot.visitor.clone());
            }
        }

        if slots.by_id.len() >= self.capacity {
            let oldest = slots
                .by_id
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                slots.by_id.remove(&oldest);
                tracing::debug!(visitor = %oldest, "evicted idle session");
            }
        }

        let id = Uuid::new_v4();
        let visitor = Arc::new(Mutex::new(Visitor::default()));
        slots.by_id.insert(
            id,
            Slot {
                visitor: visitor.clone(),
                last_used: now,
            },
        );
        (id, visitor)
    }

    pub async fn visitor_count(&self) -> usize {
        self.inner.lock().await.by_id.len()
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(COOKIE_NAME)?.strip_prefix('='))
        .find_map(|value| Uuid::parse_str(value.trim()).ok())
}

pub fn set_cookie(id: Uuid) -> String {
    format!("{COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use raithu_core::session::{ChatMessage, Sender};

    #[tokio::test]
    async fn same_cookie_gets_same_session() {
        let store = VisitorStore::new(8);
        let (id, visitor) = store.visitor(None).await;
        visitor
            .lock()
            .await
            .session
            .push(ChatMessage::text(Sender::User, "hello"));

        let (again, visitor) = store.visitor(Some(id)).await;
        assert_eq!(again, id);
        assert_eq!(visitor.lock().await.session.messages.len(), 2);

        let (other, visitor) = store.visitor(None).await;
        assert_ne!(other, id);
        assert_eq!(visitor.lock().await.session.messages.len(), 1);
    }

    #[tokio::test]
    async fn unknown_cookie_starts_fresh_session() {
        let store = VisitorStore::new(8);
        let stale = Uuid::new_v4();
        let (id, _) = store.visitor(Some(stale)).await;
        assert_ne!(id, stale);
        assert_eq!(store.visitor_count().await, 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let store = VisitorStore::new(2);
        let (a, _) = store.visitor(None).await;
        let (b, _) = store.visitor(None).await;
        store.visitor(Some(a)).await;
        store.visitor(None).await;

        assert_eq!(store.visitor_count().await, 2);
        assert_eq!(store.visitor(Some(a)).await.0, a);
        assert_ne!(store.visitor(Some(b)).await.0, b);
    }

    #[test]
    fn reads_session_cookie() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {COOKIE_NAME}={id}")).unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("raithu_session=not-a-uuid"),
        );
        assert_eq!(session_id(&headers), None);
        assert_eq!(session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_is_http_only() {
        let id = Uuid::new_v4();
        let cookie = set_cookie(id);
        assert!(cookie.starts_with(&format!("raithu_session={id};")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
    }
}
