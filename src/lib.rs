// Public API for integration tests and potential library usage

pub mod game;
pub mod messenger;
pub mod protocol;
pub mod server;
pub mod types;
pub mod wiki;
pub mod ws;
