use std::sync::LazyLock;

use regex::Regex;

use crate::frames::ChatEvent;

/// Channel ids of one-to-one conversations start with this character.
pub const DIRECT_MESSAGE_PREFIX: char = 'D';

// Greedy on purpose: any bracketed markup between the first `<` and the last `>` goes.
static MENTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.+>").expect("mention token pattern is valid"));

/// Application-facing payload for one chat message addressed to the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub channel_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuppressReason {
    EmptyText,
    Subtype(String),
    SelfAuthored,
    MissingChannel,
    NotAddressed,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyText => "empty_text",
            Self::Subtype(_) => "subtype",
            Self::SelfAuthored => "self_authored",
            Self::MissingChannel => "missing_channel",
            Self::NotAddressed => "not_addressed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Forward(ChatMessage),
    Suppress(SuppressReason),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    /// Applies the addressing rules in order; the first failing rule suppresses the event.
    pub fn route(&self, event: &ChatEvent, self_identity: &str) -> RouteDecision {
        if event.text.is_empty() {
            return RouteDecision::Suppress(SuppressReason::EmptyText);
        }
        if let Some(subtype) = &event.subtype {
            return RouteDecision::Suppress(SuppressReason::Subtype(subtype.clone()));
        }
        if event.sender_id.as_deref() == Some(self_identity) {
            return RouteDecision::Suppress(SuppressReason::SelfAuthored);
        }
        if event.channel_id.is_empty() {
            return RouteDecision::Suppress(SuppressReason::MissingChannel);
        }

        let text = if is_direct_channel(&event.channel_id) {
            event.text.trim().to_owned()
        } else if mentions(&event.text, self_identity) {
            strip_mentions(&event.text)
        } else {
            return RouteDecision::Suppress(SuppressReason::NotAddressed);
        };

        RouteDecision::Forward(ChatMessage { text, channel_id: event.channel_id.clone() })
    }
}

pub fn is_direct_channel(channel_id: &str) -> bool {
    channel_id.starts_with(DIRECT_MESSAGE_PREFIX)
}

fn mentions(text: &str, self_identity: &str) -> bool {
    !self_identity.is_empty() && text.contains(&format!("<@{self_identity}>"))
}

pub fn strip_mentions(text: &str) -> String {
    MENTION_TOKEN.replace_all(text, "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::{strip_mentions, ChatMessage, MessageRouter, RouteDecision, SuppressReason};
    use crate::frames::ChatEvent;

    fn event(user: &str, channel: &str, text: &str) -> ChatEvent {
        ChatEvent {
            sender_id: Some(user.to_owned()),
            channel_id: channel.to_owned(),
            text: text.to_owned(),
            subtype: None,
        }
    }

    fn forwarded(text: &str, channel: &str) -> RouteDecision {
        let message = ChatMessage { text: text.to_owned(), channel_id: channel.to_owned() };
        RouteDecision::Forward(message)
    }

    #[test]
    fn strips_mention_from_shared_channel_message() {
        let event = event("U2", "C9", "<@U123> what time is it");
        let decision = MessageRouter::new().route(&event, "U123");
        assert_eq!(decision, forwarded("what time is it", "C9"));
    }

    #[test]
    fn direct_message_bypasses_mention_rule_and_is_only_trimmed() {
        let decision = MessageRouter::new().route(&event("U2", "D42", "  hi <there>  "), "U1");
        assert_eq!(decision, forwarded("hi <there>", "D42"));
    }

    #[test]
    fn self_authored_messages_never_forward() {
        let router = MessageRouter::new();
        for (channel, text) in [("D1", "hello"), ("C1", "<@U1> hello"), ("C1", "plain")] {
            assert_eq!(
                router.route(&event("U1", channel, text), "U1"),
                RouteDecision::Suppress(SuppressReason::SelfAuthored)
            );
        }
    }

    #[test]
    fn shared_channel_without_mention_is_suppressed() {
        let decision = MessageRouter::new().route(&event("U2", "C1", "<@U7> hello"), "U1");
        assert_eq!(decision, RouteDecision::Suppress(SuppressReason::NotAddressed));
    }

    #[test]
    fn mention_only_message_forwards_empty_text() {
        let decision = MessageRouter::new().route(&event("U2", "C1", "  <@U1>  "), "U1");
        assert_eq!(decision, forwarded("", "C1"));
    }

    #[test]
    fn subtype_messages_are_suppressed() {
        let mut bot_echo = event("U2", "D1", "hello");
        bot_echo.subtype = Some("bot_message".to_owned());

        assert_eq!(
            MessageRouter::new().route(&bot_echo, "U1"),
            RouteDecision::Suppress(SuppressReason::Subtype("bot_message".to_owned()))
        );
    }

    #[test]
    fn empty_text_and_missing_channel_are_suppressed() {
        let router = MessageRouter::new();
        assert_eq!(
            router.route(&event("U2", "D1", ""), "U1"),
            RouteDecision::Suppress(SuppressReason::EmptyText)
        );
        assert_eq!(
            router.route(&event("U2", "", "<@U1> hi"), "U1"),
            RouteDecision::Suppress(SuppressReason::MissingChannel)
        );
    }

    #[test]
    fn messages_without_sender_are_not_self_authored() {
        let mut anonymous = event("U2", "D1", "hi");
        anonymous.sender_id = None;
        assert_eq!(MessageRouter::new().route(&anonymous, "U1"), forwarded("hi", "D1"));
    }

    #[test]
    fn stripping_is_greedy_across_bracketed_tokens() {
        assert_eq!(strip_mentions("<@U1> compare <a> and b"), "and b");
        assert_eq!(strip_mentions("ask <@U1> about <#C2|general>"), "ask");
        assert_eq!(strip_mentions("no markup here "), "no markup here");
    }
}
