//! Stream registry: named broadcast sets of session ids, the primitive
//! underlying channels, spectators and matches.

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::session::SessionRegistry;

/// One broadcast stream: an ordered, distinct list of subscriber token ids.
/// Holds no reference to sessions themselves — only ids, so a session can
/// die while a stream still names it (caller-side operations reconcile).
#[derive(Debug, Default)]
struct Stream {
    subscribers: Vec<Uuid>,
}

impl Stream {
    fn join(&mut self, token: Uuid) {
        if !self.subscribers.contains(&token) {
            self.subscribers.push(token);
        }
    }

    fn leave(&mut self, token: Uuid) {
        self.subscribers.retain(|t| t != &token);
    }
}

#[derive(Default)]
pub struct StreamRegistry {
    streams: DashMap<String, Mutex<Stream>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent create.
    pub fn add(&self, name: &str) {
        self.streams.entry(name.to_string()).or_default();
    }

    pub fn exists(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.streams.get(name).map(|s| s.lock().subscribers.len()).unwrap_or(0)
    }

    /// No-op if `name` is absent.
    pub fn join(&self, name: &str, token: Uuid) {
        if let Some(stream) = self.streams.get(name) {
            stream.lock().join(token);
        }
    }

    /// No-op if `name` is absent.
    pub fn leave(&self, name: &str, token: Uuid) {
        if let Some(stream) = self.streams.get(name) {
            stream.lock().leave(token);
        }
    }

    /// Appends `bytes` to every non-excluded subscriber's outbound queue.
    /// For a single subscriber, broadcast order on a given stream equals
    /// the order these calls were made in.
    pub fn broadcast(&self, name: &str, bytes: &[u8], exclude: &[Uuid], sessions: &SessionRegistry) {
        let Some(stream) = self.streams.get(name) else { return };
        let subscribers = stream.lock().subscribers.clone();
        drop(stream);
        for token in subscribers {
            if exclude.contains(&token) {
                continue;
            }
            sessions.enqueue(token, bytes);
        }
    }

    /// Instructs every subscriber to leave the stream (via the session's
    /// leave-stream hook) but keeps the (now empty) stream registered.
    pub fn dispose(&self, name: &str, sessions: &SessionRegistry) {
        let Some(stream) = self.streams.get(name) else { return };
        let subscribers = std::mem::take(&mut stream.lock().subscribers);
        drop(stream);
        for token in subscribers {
            sessions.leave_stream_hook(token, name);
        }
    }

    /// Evicts every subscriber (leave-stream hook) then deletes the stream
    /// entirely. Returns whether a stream was actually removed.
    pub fn remove(&self, name: &str, sessions: &SessionRegistry) -> bool {
        let Some((_, stream)) = self.streams.remove(name) else { return false };
        for token in stream.into_inner().subscribers {
            sessions.leave_stream_hook(token, name);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent_and_ordered() {
        let registry = StreamRegistry::new();
        registry.add("lobby");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.join("lobby", a);
        registry.join("lobby", b);
        registry.join("lobby", a);
        assert_eq!(registry.subscriber_count("lobby"), 2);
    }

    #[test]
    fn join_on_missing_stream_is_noop() {
        let registry = StreamRegistry::new();
        registry.join("ghost", Uuid::new_v4());
        assert!(!registry.exists("ghost"));
    }
}
