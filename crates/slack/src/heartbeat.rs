use std::{sync::Arc, time::Duration};

use k9_core::config::{ReconnectConfig, ReconnectStrategy};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HeartbeatPhase {
    /// Connected, no ping outstanding.
    Idle,
    /// Ping `id` sent, ack not yet seen.
    Pending { id: u64 },
    /// Handshake in flight; further triggers short-circuit.
    Reconnecting,
    /// No usable socket; the next tick reconnects.
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickAction {
    SendPing { id: u64 },
    Reconnect { missed: u32 },
    Wait,
}

/// Liveness state machine for one logical session.
///
/// Ping ids increase monotonically for the lifetime of the value and are never reused across
/// reconnects, so an ack that arrives from an abandoned socket can never match.
#[derive(Clone, Debug)]
pub struct Heartbeat {
    phase: HeartbeatPhase,
    last_id: u64,
    missed: u32,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self { phase: HeartbeatPhase::Disconnected, last_id: 0, missed: 0 }
    }
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> HeartbeatPhase {
        self.phase
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Consecutive reconnect triggers since the last matching ack.
    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn tick(&mut self) -> TickAction {
        match self.phase {
            HeartbeatPhase::Idle => {
                self.last_id += 1;
                self.phase = HeartbeatPhase::Pending { id: self.last_id };
                TickAction::SendPing { id: self.last_id }
            }
            HeartbeatPhase::Pending { .. } | HeartbeatPhase::Disconnected => {
                self.missed = self.missed.saturating_add(1);
                self.phase = HeartbeatPhase::Reconnecting;
                TickAction::Reconnect { missed: self.missed }
            }
            HeartbeatPhase::Reconnecting => TickAction::Wait,
        }
    }

    /// Returns `true` when `reply_to` acknowledges the outstanding ping.
    pub fn acknowledge(&mut self, reply_to: u64) -> bool {
        match self.phase {
            HeartbeatPhase::Pending { id } if id == reply_to => {
                self.phase = HeartbeatPhase::Idle;
                self.missed = 0;
                true
            }
            _ => false,
        }
    }

    /// Enters `Reconnecting` unless a reconnect is already in flight.
    pub fn begin_reconnect(&mut self) -> bool {
        if self.phase == HeartbeatPhase::Reconnecting {
            return false;
        }
        self.phase = HeartbeatPhase::Reconnecting;
        true
    }

    pub fn established(&mut self) {
        self.phase = HeartbeatPhase::Idle;
    }

    pub fn handshake_failed(&mut self) {
        self.phase = HeartbeatPhase::Disconnected;
    }

    pub fn connection_lost(&mut self) {
        if self.phase != HeartbeatPhase::Reconnecting {
            self.phase = HeartbeatPhase::Disconnected;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    Now,
    After(Duration),
    GiveUp,
}

pub trait ReconnectPolicy: Send + Sync {
    fn decide(&self, missed: u32) -> ReconnectDecision;
}

/// Reconnects on every trigger without delay or limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImmediateReconnect;

impl ReconnectPolicy for ImmediateReconnect {
    fn decide(&self, _missed: u32) -> ReconnectDecision {
        ReconnectDecision::Now
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffReconnect {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffReconnect {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl BackoffReconnect {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

impl ReconnectPolicy for BackoffReconnect {
    fn decide(&self, missed: u32) -> ReconnectDecision {
        if missed > self.max_retries {
            return ReconnectDecision::GiveUp;
        }
        let delay = self.backoff(missed.saturating_sub(1));
        if delay.is_zero() {
            ReconnectDecision::Now
        } else {
            ReconnectDecision::After(delay)
        }
    }
}

pub fn policy_from_config(config: &ReconnectConfig) -> Arc<dyn ReconnectPolicy> {
    match config.strategy {
        ReconnectStrategy::Immediate => Arc::new(ImmediateReconnect),
        ReconnectStrategy::Backoff => Arc::new(BackoffReconnect {
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }),
    }
}
