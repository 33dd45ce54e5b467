use std::{future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use k9_core::config::SlackConfig;
use tokio::{
    sync::{mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    events::{
        handler_fn, ChatMessageHandler, DispatchOutcome, EventDispatcher, EventHandlerError,
        SessionEventKind,
    },
    frames::OutboundFrame,
    heartbeat::{
        policy_from_config, ImmediateReconnect, ReconnectDecision, ReconnectPolicy, TickAction,
    },
    router::ChatMessage,
    session::{FrameOutcome, Session, SessionPhase, SessionSnapshot, SessionStats},
    transport::{SocketConnector, SocketEvent, SocketHandle, WebSocketConnector},
    web::{HandshakeError, PostedMessage, RtmHandshake, SayError, SlackApi, WebApiClient},
};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);
const COMMAND_CAPACITY: usize = 8;

type HandshakeResult = Result<(RtmHandshake, SocketHandle), HandshakeError>;
type PendingHandshake = BoxFuture<'static, HandshakeResult>;
type ConnectWaiter = oneshot::Sender<Result<(), HandshakeError>>;

enum DriverCommand {
    Reconnect(ConnectWaiter),
    Stop,
}

struct DriverControl {
    commands: mpsc::Sender<DriverCommand>,
    task: JoinHandle<()>,
}

/// Real-time messaging client: one live socket, a heartbeat, and a chat message handler slot.
///
/// All session state is owned by a single driver task; the client talks to it over a command
/// channel and observes it through a `watch` snapshot.
pub struct RtmClient {
    api: Arc<dyn SlackApi>,
    connector: Arc<dyn SocketConnector>,
    policy: Arc<dyn ReconnectPolicy>,
    dispatcher: Arc<EventDispatcher>,
    heartbeat_interval: Duration,
    stats: Arc<SessionStats>,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
    control: Mutex<Option<DriverControl>>,
}

impl RtmClient {
    pub fn new(api: Arc<dyn SlackApi>, connector: Arc<dyn SocketConnector>) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            connector,
            policy: Arc::new(ImmediateReconnect),
            dispatcher: Arc::new(EventDispatcher::new()),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            stats: Arc::new(SessionStats::default()),
            snapshot: Arc::new(snapshot),
            control: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, reqwest::Error> {
        let api = WebApiClient::from_config(config)?;
        Ok(Self::new(Arc::new(api), Arc::new(WebSocketConnector))
            .with_policy(policy_from_config(&config.reconnect))
            .with_heartbeat_interval(Duration::from_secs(config.heartbeat_interval_secs)))
    }

    pub fn with_policy(mut self, policy: Arc<dyn ReconnectPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Performs the handshake and opens the socket.
    ///
    /// The first call runs inline and starts the driver. While the driver is running, further
    /// calls replace the socket through it and join any reconnect already in flight.
    pub async fn connect(&self) -> Result<(), HandshakeError> {
        let mut control = self.control.lock().await;

        if let Some(running) = control.as_ref().filter(|running| !running.task.is_finished()) {
            let commands = running.commands.clone();
            drop(control);
            let (waiter, done) = oneshot::channel();
            commands
                .send(DriverCommand::Reconnect(waiter))
                .await
                .map_err(|_| HandshakeError::SessionStopped)?;
            return done.await.unwrap_or(Err(HandshakeError::SessionStopped));
        }

        let mut session = Session::new();
        session.heartbeat_mut().begin_reconnect();
        self.snapshot.send_replace(session.snapshot(SessionPhase::Connecting));
        info!(event_name = "slack.session.connecting", "starting slack rtm session");

        let (handshake, socket) =
            match handshake_and_open(self.api.clone(), self.connector.clone()).await {
                Ok(opened) => opened,
                Err(error) => {
                    SessionStats::bump(&self.stats.handshake_failures);
                    session.heartbeat_mut().handshake_failed();
                    self.snapshot.send_replace(session.snapshot(SessionPhase::Disconnected));
                    warn!(
                        event_name = "slack.session.handshake_failed",
                        error = %error,
                        "initial slack rtm handshake failed"
                    );
                    return Err(error);
                }
            };

        session.established(handshake.self_identity.clone());
        self.snapshot.send_replace(session.snapshot(SessionPhase::Connected));
        info!(
            event_name = "slack.session.handshake_completed",
            generation = session.generation(),
            self_identity = %handshake.self_identity,
            team = handshake.team.as_deref().unwrap_or("unknown"),
            "slack rtm session established"
        );

        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let driver = Driver {
            api: self.api.clone(),
            connector: self.connector.clone(),
            policy: self.policy.clone(),
            dispatcher: self.dispatcher.clone(),
            stats: self.stats.clone(),
            snapshot: self.snapshot.clone(),
            interval: self.heartbeat_interval,
            session,
            socket: Some(socket),
            commands: command_rx,
            waiters: Vec::new(),
        };
        let task = tokio::spawn(driver.run());
        *control = Some(DriverControl { commands, task });

        Ok(())
    }

    /// Registers the handler for `kind`, replacing any earlier one.
    pub fn on(
        &self,
        kind: SessionEventKind,
        handler: Arc<dyn ChatMessageHandler>,
    ) -> Option<Arc<dyn ChatMessageHandler>> {
        self.dispatcher.register(kind, handler)
    }

    pub fn on_chat_message<F, Fut>(&self, handler: F) -> Option<Arc<dyn ChatMessageHandler>>
    where
        F: Fn(ChatMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventHandlerError>> + Send + 'static,
    {
        self.on(SessionEventKind::ChatMessage, handler_fn(handler))
    }

    /// Posts `text` to `channel_id` through the web API. Failures are returned, never retried.
    pub async fn say(&self, channel_id: &str, text: &str) -> Result<PostedMessage, SayError> {
        self.api.post_message(channel_id, text).await
    }

    /// Cancels the heartbeat, closes the socket and waits for the driver to finish.
    pub async fn stop(&self) {
        let Some(running) = self.control.lock().await.take() else {
            return;
        };
        let _ = running.commands.send(DriverCommand::Stop).await;
        if let Err(error) = running.task.await {
            warn!(
                event_name = "slack.session.driver_panicked",
                error = %error,
                "driver task failed"
            );
        }
        self.snapshot.send_modify(|snapshot| snapshot.phase = SessionPhase::Stopped);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        self.stats.clone()
    }
}

async fn handshake_and_open(
    api: Arc<dyn SlackApi>,
    connector: Arc<dyn SocketConnector>,
) -> HandshakeResult {
    let handshake = api.rtm_connect().await?;
    let socket = connector.open(&handshake.url).await?;
    Ok((handshake, socket))
}

async fn next_socket_event(socket: &mut Option<SocketHandle>) -> SocketEvent {
    match socket {
        Some(socket) => socket.next_event().await,
        None => std::future::pending().await,
    }
}

async fn poll_handshake(pending: &mut Option<PendingHandshake>) -> HandshakeResult {
    match pending {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Driver {
    api: Arc<dyn SlackApi>,
    connector: Arc<dyn SocketConnector>,
    policy: Arc<dyn ReconnectPolicy>,
    dispatcher: Arc<EventDispatcher>,
    stats: Arc<SessionStats>,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
    interval: Duration,
    session: Session,
    socket: Option<SocketHandle>,
    commands: mpsc::Receiver<DriverCommand>,
    waiters: Vec<ConnectWaiter>,
}

impl Driver {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pending: Option<PendingHandshake> = None;

        loop {
            let flow = tokio::select! {
                _ = ticker.tick() => self.on_tick(&mut pending).await,
                result = poll_handshake(&mut pending), if pending.is_some() => {
                    pending = None;
                    self.on_handshake(result);
                    Flow::Continue
                }
                event = next_socket_event(&mut self.socket), if self.socket.is_some() => {
                    self.on_socket_event(event).await;
                    Flow::Continue
                }
                command = self.commands.recv() => match command {
                    Some(DriverCommand::Reconnect(waiter)) => {
                        self.on_reconnect_request(waiter, &mut pending);
                        Flow::Continue
                    }
                    Some(DriverCommand::Stop) | None => Flow::Stop,
                },
            };

            if flow == Flow::Stop {
                break;
            }
        }

        if let Some(socket) = self.socket.take() {
            let _ = socket.close().await;
        }
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(HandshakeError::SessionStopped));
        }
        self.publish(SessionPhase::Stopped);
        info!(
            event_name = "slack.session.stopped",
            generation = self.session.generation(),
            "slack rtm session stopped"
        );
    }

    fn publish(&self, phase: SessionPhase) {
        self.snapshot.send_replace(self.session.snapshot(phase));
    }

    async fn on_tick(&mut self, pending: &mut Option<PendingHandshake>) -> Flow {
        match self.session.heartbeat_mut().tick() {
            TickAction::SendPing { id } => {
                self.send_ping(id).await;
                Flow::Continue
            }
            TickAction::Reconnect { missed } => self.schedule_reconnect(missed, pending),
            TickAction::Wait => {
                debug!(
                    event_name = "slack.session.tick_skipped",
                    "reconnect in flight; skipping heartbeat tick"
                );
                Flow::Continue
            }
        }
    }

    async fn send_ping(&mut self, id: u64) {
        let frame = match (OutboundFrame::Ping { id }).encode() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(
                    event_name = "slack.heartbeat.encode_failed",
                    error = %error,
                    "ping encode failed"
                );
                return;
            }
        };
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        match socket.send(frame).await {
            Ok(()) => {
                SessionStats::bump(&self.stats.heartbeats_sent);
                debug!(event_name = "slack.heartbeat.ping_sent", heartbeat_id = id, "sent ping");
            }
            // Left pending: the next tick treats the socket as dead.
            Err(error) => warn!(
                event_name = "slack.heartbeat.ping_failed",
                heartbeat_id = id,
                error = %error,
                "failed to send ping"
            ),
        }
    }

    fn schedule_reconnect(&mut self, missed: u32, pending: &mut Option<PendingHandshake>) -> Flow {
        let delay = match self.policy.decide(missed) {
            ReconnectDecision::Now => Duration::ZERO,
            ReconnectDecision::After(delay) => delay,
            ReconnectDecision::GiveUp => {
                warn!(
                    event_name = "slack.session.reconnect_abandoned",
                    missed,
                    generation = self.session.generation(),
                    "reconnect policy gave up; stopping session"
                );
                return Flow::Stop;
            }
        };

        warn!(
            event_name = "slack.session.reconnect_scheduled",
            missed,
            delay_ms = delay.as_millis() as u64,
            generation = self.session.generation(),
            "heartbeat missed; replacing socket"
        );
        self.start_handshake(delay, pending);
        Flow::Continue
    }

    fn on_reconnect_request(
        &mut self,
        waiter: ConnectWaiter,
        pending: &mut Option<PendingHandshake>,
    ) {
        self.waiters.push(waiter);
        if !self.session.heartbeat_mut().begin_reconnect() {
            debug!(
                event_name = "slack.session.reconnect_joined",
                "connect requested while reconnecting; joining in-flight handshake"
            );
            return;
        }
        info!(
            event_name = "slack.session.reconnect_requested",
            "connect requested; replacing socket"
        );
        self.start_handshake(Duration::ZERO, pending);
    }

    fn start_handshake(&mut self, delay: Duration, pending: &mut Option<PendingHandshake>) {
        // Frames still queued on the superseded socket are dropped with it.
        self.socket = None;
        SessionStats::bump(&self.stats.reconnects);
        self.publish(SessionPhase::Reconnecting);

        let api = self.api.clone();
        let connector = self.connector.clone();
        *pending = Some(Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            handshake_and_open(api, connector).await
        }));
    }

    fn on_handshake(&mut self, result: HandshakeResult) {
        let outcome = match result {
            Ok((handshake, socket)) => {
                self.session.established(handshake.self_identity.clone());
                self.socket = Some(socket);
                self.publish(SessionPhase::Connected);
                info!(
                    event_name = "slack.session.handshake_completed",
                    generation = self.session.generation(),
                    self_identity = %handshake.self_identity,
                    "slack rtm session re-established"
                );
                Ok(())
            }
            Err(error) => {
                SessionStats::bump(&self.stats.handshake_failures);
                self.session.heartbeat_mut().handshake_failed();
                self.publish(SessionPhase::Disconnected);
                warn!(
                    event_name = "slack.session.handshake_failed",
                    error = %error,
                    "reconnect handshake failed; retrying on next tick"
                );
                Err(error)
            }
        };

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Frame(raw) => self.on_frame(&raw).await,
            SocketEvent::Closed { reason } => {
                self.socket = None;
                self.session.heartbeat_mut().connection_lost();
                self.publish(SessionPhase::Disconnected);
                warn!(
                    event_name = "slack.transport.closed",
                    generation = self.session.generation(),
                    reason = reason.as_deref().unwrap_or("none"),
                    "slack socket closed; reconnecting on next tick"
                );
            }
        }
    }

    async fn on_frame(&mut self, raw: &str) {
        let outcome = self.session.handle_frame(raw);
        self.stats.record(&outcome);

        match outcome {
            FrameOutcome::HeartbeatAcked { reply_to } => {
                debug!(event_name = "slack.heartbeat.ack", heartbeat_id = reply_to, "pong matched");
            }
            FrameOutcome::StaleAck { reply_to } => {
                debug!(
                    event_name = "slack.heartbeat.stale_ack",
                    heartbeat_id = reply_to,
                    "ignoring pong for a ping that is not outstanding"
                );
            }
            FrameOutcome::Malformed(error) => {
                debug!(event_name = "slack.frame.malformed", error = %error, "dropping frame");
            }
            FrameOutcome::Ignored => {}
            FrameOutcome::Suppressed(reason) => {
                debug!(
                    event_name = "slack.router.suppressed",
                    reason = reason.as_str(),
                    "chat message not addressed to the bot"
                );
            }
            FrameOutcome::Dispatch(message) => {
                let channel_id = message.channel_id.clone();
                match self.dispatcher.dispatch(message).await {
                    Ok(DispatchOutcome::Handled) => {
                        SessionStats::bump(&self.stats.chat_dispatched);
                        debug!(
                            event_name = "slack.router.dispatched",
                            channel_id = %channel_id,
                            "chat message handled"
                        );
                    }
                    Ok(DispatchOutcome::NoHandler) => {
                        debug!(
                            event_name = "slack.router.no_handler",
                            channel_id = %channel_id,
                            "no chat message handler registered"
                        );
                    }
                    Err(error) => warn!(
                        event_name = "slack.router.handler_failed",
                        channel_id = %channel_id,
                        error = %error,
                        "chat message handler failed"
                    ),
                }
            }
        }
    }
}
