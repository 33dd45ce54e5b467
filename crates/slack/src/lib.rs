//! Slack Integration - real-time messaging session for k9
//!
//! This crate keeps the bot present on Slack and turns inbound traffic into chat messages:
//! - **Web API** (`web`) - `rtm.connect` handshake and `chat.postMessage`
//! - **Transport** (`transport`) - websocket connector and socket handle
//! - **Frames** (`frames`) - inbound frame classification, outbound ping frames
//! - **Heartbeat** (`heartbeat`) - ping/pong liveness state machine and reconnect policies
//! - **Router** (`router`) - addressing rules and mention stripping
//! - **Events** (`events`) - single-slot chat message handler registry
//! - **Session** (`session`) - per-connection state and counters
//! - **Socket** (`socket`) - `RtmClient`, the driver task tying it all together
//!
//! # Architecture
//!
//! ```text
//! rtm.connect → WebSocket → frames::classify → Session → MessageRouter → EventDispatcher
//!                   ↑                             ↓
//!             heartbeat tick ──── ping / reconnect decision
//! ```
//!
//! # Key Types
//!
//! - `RtmClient` - connect, register handlers, say, stop
//! - `Heartbeat` - `Idle → Pending → Idle | Reconnecting` transitions
//! - `MessageRouter` - decides whether a chat event is addressed to the bot
//! - `ReconnectPolicy` - pluggable decision on missed heartbeats

pub mod events;
pub mod frames;
pub mod heartbeat;
pub mod router;
pub mod session;
pub mod socket;
pub mod transport;
pub mod web;

pub use events::{
    handler_fn, ChatMessageHandler, DispatchOutcome, EventDispatcher, EventHandlerError,
    SessionEventKind,
};
pub use heartbeat::{BackoffReconnect, ImmediateReconnect, ReconnectDecision, ReconnectPolicy};
pub use router::{ChatMessage, MessageRouter};
pub use session::{SessionPhase, SessionSnapshot, SessionStats, SessionStatsSnapshot};
pub use socket::RtmClient;
pub use transport::{SocketConnector, TransportError, WebSocketConnector};
pub use web::{HandshakeError, PostedMessage, RtmHandshake, SayError, SlackApi, WebApiClient};
