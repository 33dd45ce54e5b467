use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::{
    frames::{classify, InboundEvent, MalformedFrameError},
    heartbeat::Heartbeat,
    router::{ChatMessage, MessageRouter, RouteDecision, SuppressReason},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Stopped,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    /// Number of successful handshakes so far.
    pub generation: u64,
    pub self_identity: Option<String>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self { phase: SessionPhase::Disconnected, generation: 0, self_identity: None }
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub frames_received: AtomicU64,
    pub malformed_frames: AtomicU64,
    pub ignored_frames: AtomicU64,
    pub chat_dispatched: AtomicU64,
    pub chat_suppressed: AtomicU64,
    pub heartbeats_sent: AtomicU64,
    pub acks_matched: AtomicU64,
    pub stale_acks: AtomicU64,
    pub reconnects: AtomicU64,
    pub handshake_failures: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatsSnapshot {
    pub frames_received: u64,
    pub malformed_frames: u64,
    pub ignored_frames: u64,
    pub chat_dispatched: u64,
    pub chat_suppressed: u64,
    pub heartbeats_sent: u64,
    pub acks_matched: u64,
    pub stale_acks: u64,
    pub reconnects: u64,
    pub handshake_failures: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            ignored_frames: self.ignored_frames.load(Ordering::Relaxed),
            chat_dispatched: self.chat_dispatched.load(Ordering::Relaxed),
            chat_suppressed: self.chat_suppressed.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            acks_matched: self.acks_matched.load(Ordering::Relaxed),
            stale_acks: self.stale_acks.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            handshake_failures: self.handshake_failures.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, outcome: &FrameOutcome) {
        Self::bump(&self.frames_received);
        let counter = match outcome {
            FrameOutcome::HeartbeatAcked { .. } => &self.acks_matched,
            FrameOutcome::StaleAck { .. } => &self.stale_acks,
            FrameOutcome::Dispatch(_) => return,
            FrameOutcome::Suppressed(_) => &self.chat_suppressed,
            FrameOutcome::Ignored => &self.ignored_frames,
            FrameOutcome::Malformed(_) => &self.malformed_frames,
        };
        Self::bump(counter);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    HeartbeatAcked { reply_to: u64 },
    StaleAck { reply_to: u64 },
    Dispatch(ChatMessage),
    Suppressed(SuppressReason),
    Ignored,
    Malformed(MalformedFrameError),
}

/// Logical session state that survives socket replacement.
#[derive(Clone, Debug, Default)]
pub struct Session {
    heartbeat: Heartbeat,
    router: MessageRouter,
    generation: u64,
    self_identity: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn heartbeat_mut(&mut self) -> &mut Heartbeat {
        &mut self.heartbeat
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn self_identity(&self) -> Option<&str> {
        self.self_identity.as_deref()
    }

    /// Records a completed handshake; the identity may differ from the previous one.
    pub fn established(&mut self, self_identity: String) {
        self.generation += 1;
        self.self_identity = Some(self_identity);
        self.heartbeat.established();
    }

    pub fn handle_frame(&mut self, raw: &str) -> FrameOutcome {
        let event = match classify(raw) {
            Ok(Some(event)) => event,
            Ok(None) => return FrameOutcome::Ignored,
            Err(error) => return FrameOutcome::Malformed(error),
        };

        match event {
            InboundEvent::HeartbeatAck { reply_to } => {
                if self.heartbeat.acknowledge(reply_to) {
                    FrameOutcome::HeartbeatAcked { reply_to }
                } else {
                    FrameOutcome::StaleAck { reply_to }
                }
            }
            InboundEvent::ChatMessage(event) => {
                let Some(self_identity) = self.self_identity.as_deref() else {
                    return FrameOutcome::Ignored;
                };
                match self.router.route(&event, self_identity) {
                    RouteDecision::Forward(message) => FrameOutcome::Dispatch(message),
                    RouteDecision::Suppress(reason) => FrameOutcome::Suppressed(reason),
                }
            }
        }
    }

    pub fn snapshot(&self, phase: SessionPhase) -> SessionSnapshot {
        SessionSnapshot {
            phase,
            generation: self.generation,
            self_identity: self.self_identity.clone(),
        }
    }
}
