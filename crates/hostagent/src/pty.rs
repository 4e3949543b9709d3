//! PTY-backed windows using portable-pty
//!
//! Each window runs one command in its own PTY. A blocking reader drains the
//! output, tracks the cursor-key mode the application asked for, and reports
//! the window id once the PTY hits EOF.

use anyhow::{Context, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::WindowConfig;
use crate::registry::TargetId;

const ROWS: u16 = 24;
const COLS: u16 = 80;

/// DECCKM set/reset
const APP_CURSOR_ON: &[u8] = b"\x1b[?1h";
const APP_CURSOR_OFF: &[u8] = b"\x1b[?1l";

/// Finds cursor-key mode switches in PTY output, across read boundaries
#[derive(Debug, Default)]
pub struct CursorModeTracker {
    tail: Vec<u8>,
}

impl CursorModeTracker {
    /// Last mode switch seen in `data`, if any
    pub fn feed(&mut self, data: &[u8]) -> Option<bool> {
        let mut buf = std::mem::take(&mut self.tail);
        buf.extend_from_slice(data);

        let mut mode = None;
        for (i, window) in buf.windows(APP_CURSOR_ON.len()).enumerate() {
            if window == APP_CURSOR_ON {
                mode = Some((i, true));
            } else if window == APP_CURSOR_OFF {
                mode = Some((i, false));
            }
        }

        let keep = APP_CURSOR_ON.len() - 1;
        let start = buf.len().saturating_sub(keep);
        let start = match mode {
            // Never rescan a sequence already counted
            Some((i, _)) => start.max(i + APP_CURSOR_ON.len()),
            None => start,
        };
        self.tail = buf[start.min(buf.len())..].to_vec();
        mode.map(|(_, on)| on)
    }
}

/// One running window
pub struct PtyWindow {
    _master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    app_cursor: Arc<AtomicBool>,
}

impl PtyWindow {
    /// Spawn `spec` in a new PTY with `env` added to its environment
    pub fn spawn(
        id: TargetId,
        spec: &WindowConfig,
        env: &[(String, String)],
        exited: mpsc::UnboundedSender<TargetId>,
    ) -> Result<Self> {
        let pty_system = native_pty_system();

        let pty_pair = pty_system
            .openpty(PtySize {
                rows: ROWS,
                cols: COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&spec.command);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pty_pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {}", spec.command))?;

        let writer = pty_pair.master.take_writer()?;
        let reader = pty_pair.master.try_clone_reader()?;
        let app_cursor = Arc::new(AtomicBool::new(false));
        let mode = Arc::clone(&app_cursor);

        // portable-pty reads block, keep them off the runtime threads
        tokio::task::spawn_blocking(move || {
            let mut reader = reader;
            let mut tracker = CursorModeTracker::default();
            let mut buf = [0u8; 8192];

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        tracing::debug!("PTY reader EOF for window {}", id);
                        break;
                    }
                    Ok(n) => {
                        tracing::trace!("PTY output: {} bytes for window {}", n, id);
                        if let Some(on) = tracker.feed(&buf[..n]) {
                            mode.store(on, Ordering::Relaxed);
                        }
                    }
                    Err(e) => {
                        tracing::debug!("PTY read error for window {}: {}", id, e);
                        break;
                    }
                }
            }
            let _ = exited.send(id);
        });

        tracing::info!("Window {} spawned: {}", id, spec.command);
        Ok(Self {
            _master: pty_pair.master,
            child,
            writer,
            app_cursor,
        })
    }

    /// Write data to PTY input
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer
            .write_all(data)
            .context("Failed to write to PTY")?;
        self.writer
            .flush()
            .context("Failed to flush PTY writer")?;
        Ok(())
    }

    /// Whether the application switched cursor keys to application mode
    pub fn application_cursor(&self) -> bool {
        self.app_cursor.load(Ordering::Relaxed)
    }

    /// Kill child process explicitly
    pub fn kill(&mut self) -> Result<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| anyhow::anyhow!("Failed to kill process: {}", e))?;
        Ok(())
    }
}

impl Drop for PtyWindow {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            tracing::debug!("{}", e);
        }
    }
}
