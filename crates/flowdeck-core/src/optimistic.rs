//! Optimistic boolean toggle with debounced server mutation.
//!
//! The UI flips immediately; the network send is coalesced so rapid toggles
//! produce a single call carrying only the final value. Authorization and
//! validation failures roll the override back and raise a transient notice;
//! other failures are assumed transient and left for the next poll to
//! correct. Time is injected so the machine is testable without sleeping.

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);
pub const NOTICE_TTL: Duration = Duration::from_secs(2);

/// Lifecycle of the local override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    /// No override; the server value is rendered.
    Clean,
    /// Override applied locally; a send may or may not be scheduled.
    PendingLocal { value: bool },
    /// The mutation is on the wire.
    InFlight { value: bool },
    /// A 400/401 rolled the override back; the notice is still showing.
    Reverting,
}

/// Effect the caller must perform after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleEffect {
    None,
    /// Issue the mutation with this target value.
    Send(bool),
}

#[derive(Debug, Clone)]
pub struct OptimisticToggle {
    state: ToggleState,
    server_value: bool,
    last_sent: Option<bool>,
    debounce: Duration,
    deadline: Option<Instant>,
    notice_until: Option<Instant>,
}

impl OptimisticToggle {
    pub fn new(server_value: bool) -> Self {
        Self::with_debounce(server_value, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(server_value: bool, debounce: Duration) -> Self {
        Self {
            state: ToggleState::Clean,
            server_value,
            last_sent: None,
            debounce,
            deadline: None,
            notice_until: None,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    /// The value the UI should render right now.
    pub fn resolved(&self) -> bool {
        match self.state {
            ToggleState::PendingLocal { value } | ToggleState::InFlight { value } => value,
            ToggleState::Clean | ToggleState::Reverting => self.server_value,
        }
    }

    /// Whether the rollback notice should still be visible.
    pub fn notice_active(&self, now: Instant) -> bool {
        self.notice_until.is_some_and(|until| now < until)
    }

    /// User action: flip the rendered value and (re)arm the debounce window.
    pub fn toggle(&mut self, now: Instant) {
        let next = !self.resolved();
        self.state = ToggleState::PendingLocal { value: next };
        self.deadline = Some(now + self.debounce);
        self.notice_until = None;
    }

    /// Advance timers. Returns the mutation to issue, if the debounce window
    /// just closed on a value that still needs sending.
    pub fn poll(&mut self, now: Instant) -> ToggleEffect {
        if self.notice_until.is_some_and(|until| now >= until) {
            self.notice_until = None;
            if self.state == ToggleState::Reverting {
                self.state = ToggleState::Clean;
            }
        }

        let due = match self.deadline {
            Some(deadline) if now >= deadline => true,
            _ => return ToggleEffect::None,
        };
        debug_assert!(due);
        self.deadline = None;

        if let ToggleState::PendingLocal { value } = self.state {
            // Identical to the last value actually sent: idempotent no-op.
            // The override itself stays until the server catches up.
            if self.last_sent == Some(value) {
                return ToggleEffect::None;
            }
            self.state = ToggleState::InFlight { value };
            return ToggleEffect::Send(value);
        }
        ToggleEffect::None
    }

    /// The mutation succeeded; remember what the server last accepted.
    pub fn on_send_ok(&mut self) {
        if let ToggleState::InFlight { value } = self.state {
            self.last_sent = Some(value);
            self.state = ToggleState::PendingLocal { value };
        }
    }

    /// The mutation failed. 400/401 reverts and raises the notice; anything
    /// else keeps the override in place for the next poll to reconcile.
    /// Returns whether a rollback happened.
    pub fn on_send_err(&mut self, http_status: Option<u16>, now: Instant) -> bool {
        let value = match self.state {
            ToggleState::InFlight { value } => value,
            _ => return false,
        };
        match http_status {
            Some(400) | Some(401) => {
                self.state = ToggleState::Reverting;
                self.deadline = None;
                self.notice_until = Some(now + NOTICE_TTL);
                true
            }
            _ => {
                self.state = ToggleState::PendingLocal { value };
                false
            }
        }
    }

    /// A fresh server snapshot arrived. Once it agrees with a settled
    /// override, the override is dropped so it can never pin a stale value.
    pub fn on_server(&mut self, value: bool) {
        self.server_value = value;
        if let ToggleState::PendingLocal { value: pending } = self.state {
            if pending == value && self.deadline.is_none() {
                self.state = ToggleState::Clean;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn rapid_toggles_coalesce_into_one_send() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        toggle.toggle(start + Duration::from_millis(50));
        // Final requested state equals the starting value.
        assert!(!toggle.resolved());
        assert_eq!(toggle.poll(start + Duration::from_millis(100)), ToggleEffect::None);
        assert_eq!(
            toggle.poll(start + Duration::from_millis(260)),
            ToggleEffect::Send(false)
        );
        // The window is closed; nothing further to send.
        assert_eq!(toggle.poll(start + Duration::from_millis(500)), ToggleEffect::None);
    }

    #[test]
    fn resend_of_last_sent_value_is_skipped() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        assert_eq!(
            toggle.poll(start + Duration::from_millis(250)),
            ToggleEffect::Send(true)
        );
        toggle.on_send_ok();

        // Flip away and back before the window closes.
        toggle.toggle(start + Duration::from_millis(300));
        toggle.toggle(start + Duration::from_millis(350));
        assert_eq!(toggle.poll(start + Duration::from_millis(600)), ToggleEffect::None);
        // Override still rendered while the server lags behind.
        assert!(toggle.resolved());
    }

    #[test]
    fn auth_failure_reverts_and_raises_notice() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        assert_eq!(
            toggle.poll(start + Duration::from_millis(250)),
            ToggleEffect::Send(true)
        );
        let reverted = toggle.on_send_err(Some(401), start + Duration::from_millis(300));
        assert!(reverted);
        assert!(!toggle.resolved());
        assert!(toggle.notice_active(start + Duration::from_millis(400)));

        // Notice auto-dismisses and the machine settles Clean.
        toggle.poll(start + Duration::from_secs(3));
        assert!(!toggle.notice_active(start + Duration::from_secs(3)));
        assert_eq!(toggle.state(), ToggleState::Clean);
    }

    #[test]
    fn transient_failure_keeps_the_override() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        toggle.poll(start + Duration::from_millis(250));
        let reverted = toggle.on_send_err(Some(503), start + Duration::from_millis(300));
        assert!(!reverted);
        assert!(toggle.resolved());
        assert_eq!(toggle.state(), ToggleState::PendingLocal { value: true });
    }

    #[test]
    fn server_agreement_clears_the_override() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        toggle.poll(start + Duration::from_millis(250));
        toggle.on_send_ok();
        toggle.on_server(true);
        assert_eq!(toggle.state(), ToggleState::Clean);
        assert!(toggle.resolved());
    }

    #[test]
    fn server_disagreement_keeps_the_override() {
        let start = t0();
        let mut toggle = OptimisticToggle::new(false);
        toggle.toggle(start);
        toggle.poll(start + Duration::from_millis(250));
        toggle.on_send_ok();
        toggle.on_server(false);
        assert!(toggle.resolved(), "override must stay until the server agrees");
    }
}
