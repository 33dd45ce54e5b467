use std::time::Duration;

use async_trait::async_trait;
use k9_core::config::SlackConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("handshake request failed: {0}")]
    Http(String),
    #[error("handshake endpoint returned status {status}")]
    Status { status: u16 },
    #[error("handshake rejected by slack: {0}")]
    Rejected(String),
    #[error("handshake response was malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session was stopped before the handshake completed")]
    SessionStopped,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SayError {
    #[error("chat.postMessage request failed: {0}")]
    Http(String),
    #[error("chat.postMessage returned status {status}")]
    Status { status: u16 },
    #[error("chat.postMessage rejected by slack: {0}")]
    Rejected(String),
    #[error("chat.postMessage response was malformed: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtmHandshake {
    pub self_identity: String,
    pub self_name: Option<String>,
    pub url: String,
    pub team: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: Option<String>,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn rtm_connect(&self) -> Result<RtmHandshake, HandshakeError>;
    async fn post_message(&self, channel_id: &str, text: &str) -> Result<PostedMessage, SayError>;
}

#[derive(Deserialize)]
struct RtmConnectResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "self", default)]
    identity: Option<RtmSelf>,
    #[serde(default)]
    team: Option<RtmTeam>,
}

#[derive(Deserialize)]
struct RtmSelf {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct RtmTeam {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    as_user: bool,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Slack Web API client for the two calls the session needs.
#[derive(Clone)]
pub struct WebApiClient {
    http: Client,
    api_base: String,
    bot_token: SecretString,
}

impl WebApiClient {
    pub fn new(http: Client, api_base: impl Into<String>, bot_token: SecretString) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        Self { http, api_base, bot_token }
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, reqwest::Error> {
        let http =
            Client::builder().timeout(Duration::from_secs(config.request_timeout_secs)).build()?;
        Ok(Self::new(http, config.api_base_url.clone(), config.bot_token.clone()))
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn rtm_connect(&self) -> Result<RtmHandshake, HandshakeError> {
        let response = self
            .http
            .post(self.endpoint("rtm.connect"))
            .bearer_auth(self.bot_token.expose_secret())
            .send()
            .await
            .map_err(|error| HandshakeError::Http(error.to_string()))?;

        if !response.status().is_success() {
            return Err(HandshakeError::Status { status: response.status().as_u16() });
        }

        let payload: RtmConnectResponse =
            response.json().await.map_err(|error| HandshakeError::Malformed(error.to_string()))?;
        if !payload.ok {
            return Err(HandshakeError::Rejected(
                payload.error.unwrap_or_else(|| "unknown_error".to_owned()),
            ));
        }

        let url = payload
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| HandshakeError::Malformed("missing url".to_owned()))?;
        let identity = payload
            .identity
            .filter(|identity| !identity.id.is_empty())
            .ok_or_else(|| HandshakeError::Malformed("missing self.id".to_owned()))?;

        Ok(RtmHandshake {
            self_identity: identity.id,
            self_name: identity.name,
            url,
            team: payload.team.and_then(|team| team.domain.or(team.id)),
        })
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> Result<PostedMessage, SayError> {
        let response = self
            .http
            .post(self.endpoint("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&PostMessageRequest { channel: channel_id, text, as_user: true })
            .send()
            .await
            .map_err(|error| SayError::Http(error.to_string()))?;

        if !response.status().is_success() {
            return Err(SayError::Status { status: response.status().as_u16() });
        }

        let payload: PostMessageResponse =
            response.json().await.map_err(|error| SayError::Malformed(error.to_string()))?;
        if !payload.ok {
            let reason = payload.error.unwrap_or_else(|| "unknown_error".to_owned());
            return Err(SayError::Rejected(reason));
        }

        Ok(PostedMessage {
            channel: payload.channel.unwrap_or_else(|| channel_id.to_owned()),
            ts: payload.ts,
        })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{HandshakeError, SayError, SlackApi, WebApiClient};

    fn client(server: &MockServer) -> WebApiClient {
        WebApiClient::new(Client::new(), server.uri(), SecretString::from("xoxb-test".to_owned()))
    }

    #[tokio::test]
    async fn rtm_connect_returns_url_and_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rtm.connect"))
            .and(header("authorization", "Bearer xoxb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "url": "wss://x",
                "self": { "id": "U1", "name": "k9" },
                "team": { "id": "T1", "domain": "dogs" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let handshake = client(&server).rtm_connect().await.expect("handshake");

        assert_eq!(handshake.self_identity, "U1");
        assert_eq!(handshake.url, "wss://x");
        assert_eq!(handshake.self_name.as_deref(), Some("k9"));
        assert_eq!(handshake.team.as_deref(), Some("dogs"));
    }

    #[tokio::test]
    async fn rejected_credential_is_a_handshake_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rtm.connect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "invalid_auth" })),
            )
            .mount(&server)
            .await;

        let error = client(&server).rtm_connect().await.expect_err("must fail");
        assert_eq!(error, HandshakeError::Rejected("invalid_auth".to_owned()));
    }

    #[tokio::test]
    async fn non_success_status_and_missing_fields_fail_handshake() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rtm.connect"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rtm.connect"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        let api = client(&server);
        assert_eq!(api.rtm_connect().await, Err(HandshakeError::Status { status: 503 }));
        assert!(matches!(api.rtm_connect().await, Err(HandshakeError::Malformed(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_http_error() {
        let api = WebApiClient::new(
            Client::new(),
            "http://127.0.0.1:9",
            SecretString::from("xoxb-test".to_owned()),
        );
        assert!(matches!(api.rtm_connect().await, Err(HandshakeError::Http(_))));
    }

    #[tokio::test]
    async fn post_message_sends_as_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_json(json!({ "channel": "C1", "text": "Woof? :dog:", "as_user": true })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "channel": "C1",
                "ts": "1700000000.000100"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let posted = client(&server).post_message("C1", "Woof? :dog:").await.expect("posted");
        assert_eq!(posted.channel, "C1");
        assert_eq!(posted.ts.as_deref(), Some("1700000000.000100"));
    }

    #[tokio::test]
    async fn post_message_surfaces_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "ok": false, "error": "channel_not_found" })),
            )
            .mount(&server)
            .await;

        let error = client(&server).post_message("C404", "hi").await.expect_err("rejected");
        assert_eq!(error, SayError::Rejected("channel_not_found".to_owned()));
    }
}
