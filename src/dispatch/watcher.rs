use std::time::{Duration, Instant};

use log::debug;

/// How long to wait for a focus or visibility signal before assuming the
/// user is back anyway.
pub const DEFAULT_RETURN_TIMEOUT: Duration = Duration::from_secs(60);

/// Window-level transitions reported by the host toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    VisibilityChanged { visible: bool },
    FocusGained,
    FocusLost,
}

/// Why the return callback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnSignal {
    Visible,
    Focused,
    Timeout,
}

/// Identifies one arming so a late fallback timer cannot fire a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmToken(u64);

struct Armed {
    token: ArmToken,
    deadline: Instant,
    on_return: Box<dyn FnOnce(ReturnSignal)>,
}

/// One-shot detector for the user coming back from an external app.
///
/// The host forwards its window events through [`handle_event`] and runs the
/// fallback timer itself, calling [`handle_timeout`] with the token from
/// [`arm`]. Nothing here blocks.
///
/// [`handle_event`]: ReturnWatcher::handle_event
/// [`handle_timeout`]: ReturnWatcher::handle_timeout
/// [`arm`]: ReturnWatcher::arm
pub struct ReturnWatcher {
    timeout: Duration,
    next_token: u64,
    armed: Option<Armed>,
}

impl Default for ReturnWatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RETURN_TIMEOUT)
    }
}

impl ReturnWatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, next_token: 0, armed: None }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Arm the watcher, replacing any earlier arming without firing it.
    pub fn arm(&mut self, on_return: impl FnOnce(ReturnSignal) + 'static) -> ArmToken {
        self.next_token += 1;
        let token = ArmToken(self.next_token);
        self.armed = Some(Armed {
            token,
            deadline: Instant::now() + self.timeout,
            on_return: Box::new(on_return),
        });
        debug!("return watcher armed ({token:?})");
        token
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Returns `true` if the event fired the callback.
    pub fn handle_event(&mut self, event: HostEvent) -> bool {
        let signal = match event {
            HostEvent::VisibilityChanged { visible: true } => ReturnSignal::Visible,
            HostEvent::FocusGained => ReturnSignal::Focused,
            HostEvent::VisibilityChanged { visible: false } | HostEvent::FocusLost => return false,
        };
        self.fire(signal)
    }

    /// Fallback timer expiry. Ignored unless `token` is the current arming.
    pub fn handle_timeout(&mut self, token: ArmToken) -> bool {
        let current = matches!(&self.armed, Some(armed) if armed.token == token);
        current && self.fire(ReturnSignal::Timeout)
    }

    /// For hosts without timers: fire the fallback if its deadline passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = matches!(&self.armed, Some(armed) if now >= armed.deadline);
        due && self.fire(ReturnSignal::Timeout)
    }

    fn fire(&mut self, signal: ReturnSignal) -> bool {
        // Disarm before calling out so the callback may arm again.
        let Some(armed) = self.armed.take() else {
            return false;
        };
        debug!("user returned ({signal:?})");
        (armed.on_return)(signal);
        true
    }
}
