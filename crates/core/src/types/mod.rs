//! Domain types for the send-text protocol

mod connect;
mod data;
mod message;
mod request;

pub use connect::{ConnectInfo, CONNECT_ENV, WINDOW_ID_ENV};
pub use data::{SendData, SessionControl};
pub use message::NetworkMessage;
pub use request::SendTextRequest;
