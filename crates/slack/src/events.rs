use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::router::ChatMessage;

/// Names under which a handler can be registered with `RtmClient::on`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    ChatMessage,
}

impl SessionEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessage => "chatMessage",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "chatMessage" | "chat_message" => Some(Self::ChatMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("chat message handler failure: {0}")]
    ChatMessage(String),
}

#[async_trait]
pub trait ChatMessageHandler: Send + Sync {
    async fn handle_chat_message(&self, message: ChatMessage) -> Result<(), EventHandlerError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    NoHandler,
}

/// Single-slot handler registry keyed by event kind.
///
/// Registration takes `&self` so a running session can swap its handler; the slot lock is
/// released before the handler is awaited.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: RwLock<HashMap<SessionEventKind, Arc<dyn ChatMessageHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler`, returning whichever handler it replaced.
    pub fn register(
        &self,
        kind: SessionEventKind,
        handler: Arc<dyn ChatMessageHandler>,
    ) -> Option<Arc<dyn ChatMessageHandler>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner).insert(kind, handler)
    }

    pub fn handler(&self, kind: SessionEventKind) -> Option<Arc<dyn ChatMessageHandler>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).get(&kind).cloned()
    }

    pub async fn dispatch(
        &self,
        message: ChatMessage,
    ) -> Result<DispatchOutcome, EventHandlerError> {
        let Some(handler) = self.handler(SessionEventKind::ChatMessage) else {
            return Ok(DispatchOutcome::NoHandler);
        };

        handler.handle_chat_message(message).await?;
        Ok(DispatchOutcome::Handled)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

type BoxedHandlerFn =
    dyn Fn(ChatMessage) -> BoxFuture<'static, Result<(), EventHandlerError>> + Send + Sync;

/// Adapts an async closure into a `ChatMessageHandler`.
pub struct FnHandler {
    inner: Box<BoxedHandlerFn>,
}

#[async_trait]
impl ChatMessageHandler for FnHandler {
    async fn handle_chat_message(&self, message: ChatMessage) -> Result<(), EventHandlerError> {
        (self.inner)(message).await
    }
}

pub fn handler_fn<F, Fut>(handler: F) -> Arc<dyn ChatMessageHandler>
where
    F: Fn(ChatMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EventHandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { inner: Box::new(move |message| Box::pin(handler(message))) })
}
