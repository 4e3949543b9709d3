//! Wire framing

pub mod codec;

pub use codec::{FrameBuffer, MessageCodec, MAX_MESSAGE_SIZE};
