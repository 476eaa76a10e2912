//! Types shared by the recordings server and the player client.

pub mod config;
pub mod format;
pub mod protocol;
pub mod recording;
