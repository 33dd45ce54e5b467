use std::sync::Arc;

use async_trait::async_trait;
use k9_core::{domain::knowledge::parse_teach_command, ApplicationError};
use k9_qna::KnowledgeBaseGateway;
use k9_slack::{ChatMessage, ChatMessageHandler, EventHandlerError, RtmClient};
use html_escape::decode_html_entities;
use tracing::{debug, info, warn};

use crate::knowledge::ActiveKnowledgeBase;

pub const TAUGHT_REPLY: &str = "Got it! :dog:";
pub const NO_MATCH_REPLY: &str = "Woof? :dog:";

/// Where replies go. Implemented by the RTM client; tests record instead.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ApplicationError>;
}

#[async_trait]
impl ReplySink for RtmClient {
    async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ApplicationError> {
        self.say(channel_id, text).await.map(|_| ()).map_err(ApplicationError::delivery)
    }
}

pub struct Responder {
    gateway: Arc<dyn KnowledgeBaseGateway>,
    replies: Arc<dyn ReplySink>,
    active: ActiveKnowledgeBase,
}

impl Responder {
    pub fn new(
        gateway: Arc<dyn KnowledgeBaseGateway>,
        replies: Arc<dyn ReplySink>,
        active: ActiveKnowledgeBase,
    ) -> Self {
        Self { gateway, replies, active }
    }

    /// Answers or learns from one message. Returns the reply sent, if any.
    pub async fn respond(&self, message: &ChatMessage) -> Result<Option<String>, ApplicationError> {
        let Some(knowledge_base) = self.active.current() else {
            debug!(
                event_name = "responder.ignored",
                channel_id = %message.channel_id,
                "knowledge base not ready; ignoring chat message"
            );
            return Ok(None);
        };

        let reply = match parse_teach_command(&message.text) {
            Some(pair) => {
                self.gateway
                    .add_answer(&knowledge_base, &pair)
                    .await
                    .map_err(ApplicationError::gateway)?;
                self.gateway.publish(&knowledge_base).await.map_err(ApplicationError::gateway)?;
                info!(
                    event_name = "responder.taught",
                    channel_id = %message.channel_id,
                    knowledge_base_id = %knowledge_base,
                    "added question/answer pair"
                );
                TAUGHT_REPLY.to_owned()
            }
            None => {
                let answer = self
                    .gateway
                    .get_answer(&knowledge_base, &message.text)
                    .await
                    .map_err(ApplicationError::gateway)?;
                if answer.is_match() {
                    decode_html_entities(&answer.answer).into_owned()
                } else {
                    NO_MATCH_REPLY.to_owned()
                }
            }
        };

        self.replies.reply(&message.channel_id, &reply).await?;
        Ok(Some(reply))
    }
}

/// Chat handler that answers each message on its own task so the socket keeps reading.
pub struct ResponderHandler {
    responder: Arc<Responder>,
}

impl ResponderHandler {
    pub fn new(responder: Arc<Responder>) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl ChatMessageHandler for ResponderHandler {
    async fn handle_chat_message(&self, message: ChatMessage) -> Result<(), EventHandlerError> {
        let responder = self.responder.clone();
        tokio::spawn(async move {
            if let Err(error) = responder.respond(&message).await {
                warn!(
                    event_name = "responder.failed",
                    channel_id = %message.channel_id,
                    error_class = error.class(),
                    error = %error,
                    "could not answer chat message"
                );
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use k9_core::{Answer, ApplicationError, KnowledgeBaseId, QnaPair};
    use k9_qna::{GatewayError, KnowledgeBaseGateway};
    use k9_slack::{ChatMessage, ChatMessageHandler};

    use super::{ReplySink, Responder, ResponderHandler, NO_MATCH_REPLY, TAUGHT_REPLY};
    use crate::knowledge::ActiveKnowledgeBase;

    struct ScriptedGateway {
        answer: Result<Answer, GatewayError>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn answering(answer: &str, score: f64) -> Self {
            Self {
                answer: Ok(Answer { answer: answer.to_owned(), score }),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    #[async_trait]
    impl KnowledgeBaseGateway for ScriptedGateway {
        async fn create_knowledge_base(
            &self,
            _name: &str,
            _pairs: &[QnaPair],
        ) -> Result<KnowledgeBaseId, GatewayError> {
            Ok(KnowledgeBaseId("unused".to_owned()))
        }

        async fn delete_knowledge_base(&self, _id: &KnowledgeBaseId) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn get_answer(
            &self,
            id: &KnowledgeBaseId,
            question: &str,
        ) -> Result<Answer, GatewayError> {
            self.calls.lock().expect("calls lock").push(format!("answer:{id}:{question}"));
            self.answer.clone()
        }

        async fn add_answer(
            &self,
            id: &KnowledgeBaseId,
            pair: &QnaPair,
        ) -> Result<(), GatewayError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push(format!("add:{id}:{}|{}", pair.question, pair.answer));
            Ok(())
        }

        async fn publish(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError> {
            self.calls.lock().expect("calls lock").push(format!("publish:{id}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingReplies {
        sent: Mutex<Vec<(String, String)>>,
        notify: Option<tokio::sync::mpsc::UnboundedSender<()>>,
    }

    #[async_trait]
    impl ReplySink for RecordingReplies {
        async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ApplicationError> {
            self.sent.lock().expect("sent lock").push((channel_id.to_owned(), text.to_owned()));
            if let Some(notify) = &self.notify {
                let _ = notify.send(());
            }
            Ok(())
        }
    }

    fn message(text: &str) -> ChatMessage {
        ChatMessage { text: text.to_owned(), channel_id: "C1".to_owned() }
    }

    fn ready() -> ActiveKnowledgeBase {
        let active = ActiveKnowledgeBase::default();
        active.set(KnowledgeBaseId("kb-1".to_owned()));
        active
    }

    #[tokio::test]
    async fn matched_answer_is_decoded_and_sent() {
        let gateway = Arc::new(ScriptedGateway::answering("Tom &amp; Jerry&#39;s", 42.0));
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway.clone(), replies.clone(), ready());

        let reply = responder.respond(&message("who?")).await.expect("respond");

        assert_eq!(reply.as_deref(), Some("Tom & Jerry's"));
        assert_eq!(gateway.calls(), vec!["answer:kb-1:who?".to_owned()]);
        assert_eq!(
            *replies.sent.lock().expect("sent lock"),
            vec![("C1".to_owned(), "Tom & Jerry's".to_owned())]
        );
    }

    #[tokio::test]
    async fn zero_score_replies_with_woof() {
        let gateway = Arc::new(ScriptedGateway::answering("No good match found in the KB", 0.0));
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway, replies, ready());

        let reply = responder.respond(&message("???")).await.expect("respond");
        assert_eq!(reply.as_deref(), Some(NO_MATCH_REPLY));
    }

    #[tokio::test]
    async fn teach_command_adds_publishes_and_acknowledges() {
        let gateway = Arc::new(ScriptedGateway::answering("unused", 0.0));
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway.clone(), replies, ready());

        let teach = message("Q: where is the ball? A: under the couch");
        let reply = responder.respond(&teach).await.expect("respond");

        assert_eq!(reply.as_deref(), Some(TAUGHT_REPLY));
        assert_eq!(
            gateway.calls(),
            vec![
                "add:kb-1:where is the ball?|under the couch".to_owned(),
                "publish:kb-1".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn messages_before_knowledge_base_is_ready_are_ignored() {
        let gateway = Arc::new(ScriptedGateway::answering("a dog", 90.0));
        let replies = Arc::new(RecordingReplies::default());
        let responder =
            Responder::new(gateway.clone(), replies.clone(), ActiveKnowledgeBase::default());

        assert_eq!(responder.respond(&message("who?")).await, Ok(None));
        assert!(gateway.calls().is_empty());
        assert!(replies.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_sends_no_reply() {
        let gateway = Arc::new(ScriptedGateway {
            answer: Err(GatewayError::Status { operation: "generate_answer", status: 500 }),
            calls: Mutex::new(Vec::new()),
        });
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway, replies.clone(), ready());

        let error = responder.respond(&message("who?")).await.expect_err("fails");

        assert_eq!(error.class(), "gateway");
        assert!(replies.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn handler_returns_before_the_reply_is_sent() {
        let (notify, mut sent) = tokio::sync::mpsc::unbounded_channel();
        let replies =
            Arc::new(RecordingReplies { sent: Mutex::new(Vec::new()), notify: Some(notify) });
        let gateway = Arc::new(ScriptedGateway::answering("a dog", 90.0));
        let responder = Responder::new(gateway, replies.clone(), ready());
        let handler = ResponderHandler::new(Arc::new(responder));

        handler.handle_chat_message(message("who?")).await.expect("handled");
        sent.recv().await.expect("reply sent by spawned task");

        assert_eq!(
            *replies.sent.lock().expect("sent lock"),
            vec![("C1".to_owned(), "a dog".to_owned())]
        );
    }

    #[tokio::test]
    async fn answers_are_entity_decoded_before_replying() {
        let gateway = Arc::new(ScriptedGateway::answering(
            "caf&eacute; &euro;5 &trade; 2&times;3 &lt;b&gt; &#x1F436;",
            42.0,
        ));
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway, replies.clone(), ready());

        responder.respond(&message("menu?")).await.expect("respond");

        assert_eq!(
            *replies.sent.lock().expect("sent lock"),
            vec![("C1".to_owned(), "café €5 ™ 2×3 <b> 🐶".to_owned())]
        );
    }

    #[tokio::test]
    async fn double_escaped_answers_are_decoded_once() {
        let gateway = Arc::new(ScriptedGateway::answering("fish &amp;amp; chips, R&D", 9.0));
        let replies = Arc::new(RecordingReplies::default());
        let responder = Responder::new(gateway, replies.clone(), ready());

        responder.respond(&message("lunch?")).await.expect("respond");

        assert_eq!(
            *replies.sent.lock().expect("sent lock"),
            vec![("C1".to_owned(), "fish &amp; chips, R&D".to_owned())]
        );
    }
}
