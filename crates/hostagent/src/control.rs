//! Host event loop
//!
//! One task owns the window registry, the session table and the expiry
//! timers. Connection tasks talk to it through [`HostHandle`]; PTY reader
//! threads report exited shells over an unbounded channel.

use std::collections::HashMap;
use std::time::Duration;

use textcast_core::{CoreError, SendTextRequest, SessionControl};
use tokio::sync::{mpsc, oneshot};
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info};

use crate::broadcast::{ExpiryTimers, SessionManager, TimerHandle};
use crate::dispatch;
use crate::registry::{TargetId, TargetRegistry};
use crate::resolver::resolve_targets;

const COMMAND_CAPACITY: usize = 64;

/// Commands accepted by the host loop
#[derive(Debug)]
pub enum HostCommand {
    SendText {
        request: SendTextRequest,
        respond_to: oneshot::Sender<Result<(), CoreError>>,
    },
}

/// Handle to the host loop
#[derive(Clone)]
pub struct HostHandle {
    sender: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    /// Apply one send-text chunk
    pub async fn send_text(&self, request: SendTextRequest) -> Result<(), CoreError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HostCommand::SendText {
                request,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoreError::Connection("Host loop is gone".to_string()))?;
        rx.await
            .map_err(|_| CoreError::Connection("Host loop didn't respond".to_string()))?
    }
}

/// Session expiry timers on a tokio [`DelayQueue`]
#[derive(Default)]
pub struct DelayQueueTimers {
    queue: DelayQueue<(String, TimerHandle)>,
    keys: HashMap<TimerHandle, delay_queue::Key>,
    next: u64,
}

impl DelayQueueTimers {
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Wait for the next timer. Resolves to `None` right away when empty.
    pub async fn next_expired(&mut self) -> Option<(String, TimerHandle)> {
        let expired = std::future::poll_fn(|cx| self.queue.poll_expired(cx)).await?;
        let (session_id, handle) = expired.into_inner();
        self.keys.remove(&handle);
        Some((session_id, handle))
    }
}

impl ExpiryTimers for DelayQueueTimers {
    fn schedule(&mut self, session_id: &str, delay: Duration) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        let key = self.queue.insert((session_id.to_string(), handle), delay);
        self.keys.insert(handle, key);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(key) = self.keys.remove(&handle) {
            self.queue.try_remove(&key);
        }
    }
}

/// The host event loop
pub struct HostLoop<R> {
    registry: R,
    sessions: SessionManager,
    timers: DelayQueueTimers,
    commands: mpsc::Receiver<HostCommand>,
    closed: mpsc::UnboundedReceiver<TargetId>,
}

impl<R: TargetRegistry> HostLoop<R> {
    pub fn new(
        registry: R,
        expiry: Duration,
        closed: mpsc::UnboundedReceiver<TargetId>,
    ) -> (Self, HostHandle) {
        let (sender, commands) = mpsc::channel(COMMAND_CAPACITY);
        let host = Self {
            registry,
            sessions: SessionManager::new(expiry),
            timers: DelayQueueTimers::default(),
            commands,
            closed,
        };
        (host, HostHandle { sender })
    }

    /// Resolve, decode, update sessions, then deliver
    ///
    /// Nothing is written and no session changes when resolution or
    /// decoding fails.
    pub fn process(&mut self, request: &SendTextRequest) -> Result<(), CoreError> {
        let targets = resolve_targets(&self.registry, request)?;
        let data = request.decode_data()?;
        let payload = dispatch::decode(&data)?;
        let session_id = request.session_id.as_str();

        match data.session_control() {
            Some(SessionControl::Start) => {
                self.sessions
                    .start(&mut self.registry, &mut self.timers, session_id, &targets, request.origin);
            }
            Some(SessionControl::End) => {
                self.sessions
                    .end(&mut self.registry, &mut self.timers, session_id, &targets);
                debug!("{} live session(s)", self.sessions.live_count());
            }
            None => {
                self.sessions
                    .refresh(&mut self.registry, &mut self.timers, session_id, &targets);
                let written = dispatch::deliver(&mut self.registry, &targets, &payload);
                debug!("Delivered {} unit(s) to {} window(s)", data.source_len(), written);
            }
        }
        Ok(())
    }

    fn window_closed(&mut self, target: TargetId) {
        if !self.registry.contains(target) {
            return;
        }
        let fired = self.registry.close(target);
        self.sessions
            .target_closed(&mut self.registry, &mut self.timers, target, fired);
        info!("Window {} closed", target);
    }

    /// Run until every [`HostHandle`] is dropped, then hand back the registry
    pub async fn run(mut self) -> R {
        loop {
            tokio::select! {
                biased;

                Some(target) = self.closed.recv() => self.window_closed(target),

                Some((session_id, handle)) = self.timers.next_expired(), if !self.timers.is_empty() => {
                    self.sessions.expire(&mut self.registry, &session_id, handle);
                }

                command = self.commands.recv() => match command {
                    Some(HostCommand::SendText { request, respond_to }) => {
                        let result = self.process(&request);
                        if let Err(e) = &result {
                            debug!("send-text failed: {}", e);
                        }
                        let _ = respond_to.send(result);
                    }
                    None => break,
                },
            }
        }
        debug!("Host loop stopped");
        self.registry
    }
}
