//! WebSocket connection handling.

pub mod audio;
pub mod commands;
pub mod handler;
pub mod messages;

pub use handler::websocket_handler;
