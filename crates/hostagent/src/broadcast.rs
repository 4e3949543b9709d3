//! Broadcast sessions
//!
//! A session groups the windows that received input under one session id and
//! keeps their broadcast indicator on until the session ends, expires, or the
//! window it was started from closes. The table is owned by the host event
//! loop; nothing here is shared across tasks.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, warn};

use crate::registry::{CloseHook, HookId, TargetId, TargetRegistry};

/// Expiry used when no blink duration is configured
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(15);

/// Shortest allowed expiry
pub const MIN_EXPIRY: Duration = Duration::from_secs(3);

/// Session expiry from the configured cursor blink duration in seconds
pub fn expiry_from_config(stop_blinking_after: Option<f64>) -> Duration {
    match stop_blinking_after {
        Some(secs) if secs > 0.0 && secs.is_finite() => {
            Duration::from_secs_f64(secs).max(MIN_EXPIRY)
        }
        _ => DEFAULT_EXPIRY,
    }
}

/// Reference to one scheduled expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

/// One-shot timers keyed by session id
pub trait ExpiryTimers {
    fn schedule(&mut self, session_id: &str, delay: Duration) -> TimerHandle;

    /// Cancel a pending timer; already fired or unknown handles are ignored
    fn cancel(&mut self, handle: TimerHandle);
}

#[derive(Debug, Default)]
struct Session {
    members: HashSet<TargetId>,
    expiry: Option<TimerHandle>,
    hooks: HashMap<TargetId, HookId>,
}

/// Live session table
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    expiry: Duration,
}

impl SessionManager {
    pub fn new(expiry: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            expiry,
        }
    }

    #[cfg(test)]
    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }

    /// Members of a live session, sorted
    #[cfg(test)]
    pub fn members(&self, session_id: &str) -> Vec<TargetId> {
        let mut members: Vec<_> = self
            .sessions
            .get(session_id)
            .map(|s| s.members.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// `session:start`: light up `targets` and arm the expiry. If `origin` is
    /// an open window, closing it ends the session.
    pub fn start<R, T>(
        &mut self,
        reg: &mut R,
        timers: &mut T,
        session_id: &str,
        targets: &[TargetId],
        origin: Option<TargetId>,
    ) where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        if session_id.is_empty() {
            warn!("Ignoring session start without a session id");
            return;
        }
        self.touch(reg, timers, session_id, targets);

        let Some(origin) = origin.filter(|id| reg.contains(*id)) else {
            return;
        };
        let Some(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        if session.hooks.contains_key(&origin) {
            return;
        }
        if let Some(hook) = reg.add_close_hook(origin, CloseHook::EndSession(session_id.to_string())) {
            session.hooks.insert(origin, hook);
        }
    }

    /// Data sent under a session id keeps the session alive
    pub fn refresh<R, T>(&mut self, reg: &mut R, timers: &mut T, session_id: &str, targets: &[TargetId])
    where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        if session_id.is_empty() {
            return;
        }
        self.touch(reg, timers, session_id, targets);
    }

    fn touch<R, T>(&mut self, reg: &mut R, timers: &mut T, session_id: &str, targets: &[TargetId])
    where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        let created = !self.sessions.contains_key(session_id);
        let session = self.sessions.entry(session_id.to_string()).or_default();
        for &target in targets {
            reg.set_indicator(target, true);
            session.members.insert(target);
        }
        if let Some(old) = session.expiry.take() {
            timers.cancel(old);
        }
        session.expiry = Some(timers.schedule(session_id, self.expiry));
        if created {
            debug!("Session {} started with {} target(s)", session_id, targets.len());
        } else {
            debug!("Session {} refreshed", session_id);
        }
    }

    /// `session:end`: clear `targets`, then drop the session whatever is left
    pub fn end<R, T>(&mut self, reg: &mut R, timers: &mut T, session_id: &str, targets: &[TargetId])
    where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        for &target in targets {
            reg.set_indicator(target, false);
            if let Some(session) = self.sessions.get_mut(session_id) {
                session.members.remove(&target);
            }
        }
        if self.purge(reg, timers, session_id) {
            debug!("Session {} ended", session_id);
        }
    }

    /// Expiry timer fired. Stale handles from a rescheduled timer are ignored.
    pub fn expire<R>(&mut self, reg: &mut R, session_id: &str, handle: TimerHandle) -> bool
    where
        R: TargetRegistry + ?Sized,
    {
        if self.sessions.get(session_id).and_then(|s| s.expiry) != Some(handle) {
            return false;
        }
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };
        release(reg, session);
        debug!("Session {} expired", session_id);
        true
    }

    /// A window went away; `fired` are the hooks it was still carrying
    pub fn target_closed<R, T>(&mut self, reg: &mut R, timers: &mut T, target: TargetId, fired: Vec<CloseHook>)
    where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        for hook in fired {
            match hook {
                CloseHook::EndSession(session_id) => {
                    if self.purge(reg, timers, &session_id) {
                        debug!("Session {} ended: origin window {} closed", session_id, target);
                    }
                }
            }
        }

        let mut emptied = Vec::new();
        for (session_id, session) in self.sessions.iter_mut() {
            session.hooks.remove(&target);
            if session.members.remove(&target) && session.members.is_empty() {
                emptied.push(session_id.clone());
            }
        }
        for session_id in emptied {
            debug!("Session {} has no windows left", session_id);
            self.purge(reg, timers, &session_id);
        }
    }

    /// Remove a session: cancel its timer, clear its indicators, release its
    /// hooks. Unknown ids are a no-op.
    pub fn purge<R, T>(&mut self, reg: &mut R, timers: &mut T, session_id: &str) -> bool
    where
        R: TargetRegistry + ?Sized,
        T: ExpiryTimers + ?Sized,
    {
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };
        if let Some(handle) = session.expiry {
            timers.cancel(handle);
        }
        release(reg, session);
        true
    }
}

fn release<R: TargetRegistry + ?Sized>(reg: &mut R, session: Session) {
    for target in session.members {
        reg.set_indicator(target, false);
    }
    for (target, hook) in session.hooks {
        reg.remove_close_hook(target, hook);
    }
}
