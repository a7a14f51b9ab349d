//! Reconnect state machine.
//!
//! Pure transition table with no timers or sockets of its own: the driver
//! feeds it [`Input`]s and executes the [`Action`]s it returns. This keeps
//! the reconnect policy testable step by step and portable to any runtime.
//!
//! ```text
//!                 Connect / RetryElapsed
//!   Disconnected ───────────────────────► Connecting ──Opened──► Connected
//!        ▲   ▲                               │                     │
//!        │   └──────────── Closed ───────────┼─────────────────────┘
//!        │                                   │ Failed
//!        └──── no retry left ──── Error ◄────┘ (from any active state)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    /// A transport error occurred and a retry is pending.
    Error,
}

/// Reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Whether to reconnect at all after an unexpected close or error.
    pub should_reconnect: bool,
    /// Reconnect attempts allowed between two successful opens.
    pub max_attempts: u32,
    /// Delay before each reconnect attempt, in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            should_reconnect: true,
            max_attempts: 5,
            retry_interval_ms: 3_000,
        }
    }
}

impl ReconnectPolicy {
    /// Never reconnect.
    pub fn never() -> Self {
        Self {
            should_reconnect: false,
            max_attempts: 0,
            retry_interval_ms: 0,
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Things that happen to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Caller asked to connect.
    Connect,
    /// Transport finished its handshake.
    Opened,
    /// Transport closed cleanly (close frame or end of stream).
    Closed,
    /// Transport failed to open or failed mid-session.
    Failed,
    /// Scheduled retry delay has passed.
    RetryElapsed,
    /// Caller tore the channel down.
    Teardown,
}

/// Side effects the driver must perform, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    OpenTransport,
    CloseTransport,
    ScheduleRetry { attempt: u32, delay: Duration },
    CancelRetry,
    NotifyOpen,
    NotifyClose,
    NotifyError,
}

/// Reconnect state machine.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    state: ChannelState,
    policy: ReconnectPolicy,
    /// Reconnect attempts since the last successful open.
    attempts: u32,
    retry_pending: bool,
    torn_down: bool,
}

impl ReconnectMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ChannelState::Disconnected,
            policy,
            attempts: 0,
            retry_pending: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Apply one input and return the actions to execute.
    pub fn handle(&mut self, input: Input) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.torn_down {
            // An in-flight connect that lands after teardown is closed at once.
            if input == Input::Opened {
                actions.push(Action::CloseTransport);
            }
            return actions;
        }

        match input {
            Input::Connect => {
                if matches!(self.state, ChannelState::Connecting | ChannelState::Connected) {
                    return actions;
                }
                if self.retry_pending {
                    self.retry_pending = false;
                    actions.push(Action::CancelRetry);
                }
                self.state = ChannelState::Connecting;
                actions.push(Action::OpenTransport);
            }

            Input::Opened => {
                if self.state == ChannelState::Connecting {
                    self.state = ChannelState::Connected;
                    self.attempts = 0;
                    actions.push(Action::NotifyOpen);
                }
            }

            Input::Closed => {
                if !self.is_active() {
                    return actions;
                }
                let was_connected = self.state == ChannelState::Connected;
                self.state = ChannelState::Disconnected;
                if was_connected {
                    actions.push(Action::NotifyClose);
                }
                self.evaluate_retry(&mut actions);
            }

            Input::Failed => {
                if !self.is_active() {
                    return actions;
                }
                let was_connected = self.state == ChannelState::Connected;
                self.state = ChannelState::Error;
                actions.push(Action::NotifyError);
                if was_connected {
                    actions.push(Action::NotifyClose);
                }
                if !self.evaluate_retry(&mut actions) {
                    self.state = ChannelState::Disconnected;
                }
            }

            Input::RetryElapsed => {
                if !self.retry_pending {
                    return actions;
                }
                self.retry_pending = false;
                self.state = ChannelState::Connecting;
                actions.push(Action::OpenTransport);
            }

            Input::Teardown => {
                self.torn_down = true;
                if self.retry_pending {
                    self.retry_pending = false;
                    actions.push(Action::CancelRetry);
                }
                if self.is_active() {
                    actions.push(Action::CloseTransport);
                }
                if self.state == ChannelState::Connected {
                    actions.push(Action::NotifyClose);
                }
                self.state = ChannelState::Disconnected;
            }
        }

        actions
    }

    /// Connecting or connected.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ChannelState::Connecting | ChannelState::Connected)
    }

    /// Schedule a retry if the policy allows one. Returns whether it did.
    fn evaluate_retry(&mut self, actions: &mut Vec<Action>) -> bool {
        if !self.policy.should_reconnect || self.attempts >= self.policy.max_attempts {
            return false;
        }
        self.attempts += 1;
        self.retry_pending = true;
        actions.push(Action::ScheduleRetry {
            attempt: self.attempts,
            delay: self.policy.retry_interval(),
        });
        true
    }
}
