//! Channel registry.
//!
//! A channel is bound 1:1 with a stream named `chat/<name>`; the registry
//! owns that invariant (add creates the stream, remove disposes it).

use dashmap::DashMap;

use super::stream::StreamRegistry;

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub description: String,
    pub public_read: bool,
    pub public_write: bool,
    pub temp: bool,
    pub hidden: bool,
    pub moderated: bool,
}

impl Channel {
    pub fn stream_name(&self) -> String {
        format!("chat/{}", self.name)
    }
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Channel> {
        self.channels.get(name).map(|c| c.clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn list_public(&self) -> Vec<Channel> {
        self.channels.iter().filter(|c| !c.hidden).map(|c| c.value().clone()).collect()
    }

    pub fn add(&self, streams: &StreamRegistry, name: &str, description: &str, public_read: bool, public_write: bool, temp: bool, hidden: bool) {
        streams.add(&format!("chat/{name}"));
        self.channels.insert(
            name.to_string(),
            Channel {
                name: name.to_string(),
                description: description.to_string(),
                public_read,
                public_write,
                temp,
                hidden,
                moderated: false,
            },
        );
    }

    /// Temp + hidden, e.g. `#spect_<id>`/`#multi_<id>`. No-op (returns
    /// false) if the channel already exists.
    pub fn add_temp_channel(&self, streams: &StreamRegistry, name: &str) -> bool {
        if self.exists(name) {
            return false;
        }
        self.add(streams, name, "Chat", true, true, true, true);
        true
    }

    pub fn add_hidden_channel(&self, streams: &StreamRegistry, name: &str) -> bool {
        if self.exists(name) {
            return false;
        }
        self.add(streams, name, "Chat", true, true, false, true);
        true
    }

    /// Broadcasts a channel-kicked packet to each subscriber of the bound
    /// stream (so the client closes the matching tab), then disposes and
    /// removes the stream.
    pub fn remove(&self, streams: &StreamRegistry, sessions: &super::session::SessionRegistry, name: &str) {
        if !self.channels.contains_key(name) {
            return;
        }
        let client_name = if name.starts_with("#spect_") {
            "#spectator"
        } else if name.starts_with("#multi_") {
            "#multiplayer"
        } else {
            name
        };
        let stream_name = format!("chat/{name}");
        streams.broadcast(&stream_name, &bancho_proto::packets::channel_kicked(client_name), &[], sessions);
        streams.dispose(&stream_name, sessions);
        streams.remove(&stream_name, sessions);
        self.channels.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::SessionRegistry;

    #[test]
    fn add_temp_channel_is_idempotent() {
        let channels = ChannelRegistry::new();
        let streams = StreamRegistry::new();
        assert!(channels.add_temp_channel(&streams, "#spect_1"));
        assert!(!channels.add_temp_channel(&streams, "#spect_1"));
    }

    #[test]
    fn remove_disposes_bound_stream() {
        let channels = ChannelRegistry::new();
        let streams = StreamRegistry::new();
        let sessions = SessionRegistry::new();
        channels.add(&streams, "#osu", "General", true, true, false, false);
        assert!(streams.exists("chat/#osu"));
        channels.remove(&streams, &sessions, "#osu");
        assert!(!channels.exists("#osu"));
        assert!(!streams.exists("chat/#osu"));
    }
}
