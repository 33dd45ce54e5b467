use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::debug;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport close failed: {0}")]
    Close(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEvent {
    Frame(String),
    Closed { reason: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Close,
}

/// The session's end of one open socket. Dropping it discards the socket.
#[derive(Debug)]
pub struct SocketHandle {
    outbound: mpsc::Sender<OutboundMessage>,
    inbound: mpsc::Receiver<SocketEvent>,
}

/// The far end of a `SocketHandle`: whatever pumps frames to and from the wire.
#[derive(Debug)]
pub struct SocketPeer {
    pub outbound: mpsc::Receiver<OutboundMessage>,
    pub inbound: mpsc::Sender<SocketEvent>,
}

impl SocketHandle {
    pub fn pair(capacity: usize) -> (SocketHandle, SocketPeer) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        (
            SocketHandle { outbound: outbound_tx, inbound: inbound_rx },
            SocketPeer { outbound: outbound_rx, inbound: inbound_tx },
        )
    }

    pub async fn send(&self, text: String) -> Result<(), TransportError> {
        self.outbound
            .send(OutboundMessage::Text(text))
            .await
            .map_err(|_| TransportError::Send("socket writer has shut down".to_owned()))
    }

    /// Next inbound event; a peer that went away reads as `Closed`.
    pub async fn next_event(&mut self) -> SocketEvent {
        self.inbound.recv().await.unwrap_or(SocketEvent::Closed { reason: None })
    }

    pub async fn close(self) -> Result<(), TransportError> {
        self.outbound
            .send(OutboundMessage::Close)
            .await
            .map_err(|_| TransportError::Close("socket writer has shut down".to_owned()))
    }
}

#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<SocketHandle, TransportError>;
}

/// Opens real websockets and pumps them through a reader and a writer task.
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl SocketConnector for WebSocketConnector {
    async fn open(&self, url: &str) -> Result<SocketHandle, TransportError> {
        let (stream, _response) =
            connect_async(url).await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let (mut sink, mut source) = stream.split();
        let (handle, peer) = SocketHandle::pair(CHANNEL_CAPACITY);
        let SocketPeer { outbound: mut outbound_rx, inbound: inbound_tx } = peer;

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let result = match message {
                    OutboundMessage::Text(text) => sink.send(WsMessage::Text(text.into())).await,
                    OutboundMessage::Close => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                };
                if let Err(error) = result {
                    debug!(
                        event_name = "slack.transport.write_failed",
                        error = %error,
                        "websocket write failed"
                    );
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let closed = loop {
                let item = tokio::select! {
                    _ = inbound_tx.closed() => return,
                    item = source.next() => item,
                };
                let event = match item {
                    Some(Ok(WsMessage::Text(text))) => SocketEvent::Frame(text.as_str().to_owned()),
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => SocketEvent::Frame(text),
                        Err(_) => continue,
                    },
                    Some(Ok(WsMessage::Close(frame))) => SocketEvent::Closed {
                        reason: frame.map(|frame| frame.reason.as_str().to_owned()),
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => SocketEvent::Closed { reason: Some(error.to_string()) },
                    None => SocketEvent::Closed { reason: None },
                };
                if matches!(event, SocketEvent::Closed { .. }) {
                    break event;
                }
                if inbound_tx.send(event).await.is_err() {
                    return;
                }
            };
            let _ = inbound_tx.send(closed).await;
        });

        Ok(handle)
    }
}
