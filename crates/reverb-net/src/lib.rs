//! reverb-net — the networking layer: server listener, per-connection
//! session state machine, and the client transfer driver.

pub mod client;
pub mod server;
pub mod session;

pub use server::Listener;
pub use session::{new_session_table, SessionMeta, SessionTable};
