//! reverb-core — wire format, chunk model, and configuration.
//! Both the daemon and the client depend on this one.

pub mod chunk;
pub mod config;
pub mod wire;
