//! Integration test common infrastructure.
//!
//! Spawns a real `banchod` process against a scratch sqlite database and
//! drives it over HTTP, the way the reference client does.

pub mod seed;
pub mod server;

pub use seed::{seed_channel, seed_user};
pub use server::TestServer;
