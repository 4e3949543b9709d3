//! Deliver decoded payloads to target windows

use textcast_core::{CoreError, SendData};
use tracing::{trace, warn};

use crate::keys::KeyEvent;
use crate::registry::{TargetId, TargetRegistry};

/// Payload ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Same bytes for every target
    Bytes(Vec<u8>),
    /// Encoded per target, depends on its keyboard mode
    Key(KeyEvent),
    /// Session control, nothing to write
    Nothing,
}

/// Decode once per request, before any write or session change
pub fn decode(data: &SendData) -> Result<Decoded, CoreError> {
    Ok(match data {
        SendData::Text(text) => Decoded::Bytes(text.as_bytes().to_vec()),
        SendData::Binary(bytes) => Decoded::Bytes(bytes.clone()),
        SendData::KeyEvent(spec) => Decoded::Key(spec.parse()?),
        SendData::Session(_) => Decoded::Nothing,
    })
}

/// Write to each target in order. Returns how many targets were written.
///
/// A failed write to one window does not stop delivery to the rest.
pub fn deliver<R>(reg: &mut R, targets: &[TargetId], payload: &Decoded) -> usize
where
    R: TargetRegistry + ?Sized,
{
    let mut written = 0;
    for &target in targets {
        let bytes = match payload {
            Decoded::Bytes(bytes) => bytes.clone(),
            Decoded::Key(key) => reg.encode_key(target, key),
            Decoded::Nothing => return 0,
        };
        if bytes.is_empty() {
            continue;
        }
        match reg.write(target, &bytes) {
            Ok(()) => {
                trace!("Wrote {} bytes to window {}", bytes.len(), target);
                written += 1;
            }
            Err(e) => warn!("Write to window {} failed: {}", target, e),
        }
    }
    written
}
