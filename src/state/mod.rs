//! In-memory runtime state: sessions, streams, channels, matches, and the
//! [`ServerContext`] that ties them together.

pub mod channel;
pub mod context;
pub mod match_state;
pub mod periodic;
pub mod session;
pub mod stream;

pub use channel::{Channel, ChannelRegistry};
pub use context::ServerContext;
pub use match_state::{Match, MatchRegistry, Slot, SlotStatus, Team};
pub use session::{Session, SessionRegistry};
pub use stream::StreamRegistry;
