//! Raw mode for interactive input
//!
//! Typing into `textcast --stdin` on a terminal goes out key by key, so the
//! terminal must not buffer lines or turn Ctrl+C into a signal. Ctrl+D is
//! read as a plain 0x04 byte and ends the input.

use anyhow::{Context, Result};
use crossterm::terminal;
use crossterm::tty::IsTty;

/// Guard that enables raw mode and restores normal mode on drop.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }

    /// Enable raw mode only when stdin is a terminal
    pub fn for_stdin() -> Result<Option<Self>> {
        if !std::io::stdin().is_tty() {
            return Ok(None);
        }
        Self::enable().map(Some)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // Best-effort restore - ignore errors during cleanup
        let _ = terminal::disable_raw_mode();
    }
}
