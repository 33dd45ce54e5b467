use std::time::Duration;

use async_trait::async_trait;
use k9_core::{config::QnaConfig, Answer, KnowledgeBaseId, QnaPair};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("knowledge base request `{operation}` failed: {reason}")]
    Http { operation: &'static str, reason: String },
    #[error("knowledge base request `{operation}` returned status {status}")]
    Status { operation: &'static str, status: u16 },
    #[error("knowledge base response for `{operation}` was malformed: {reason}")]
    Malformed { operation: &'static str, reason: String },
}

#[async_trait]
pub trait KnowledgeBaseGateway: Send + Sync {
    async fn create_knowledge_base(
        &self,
        name: &str,
        pairs: &[QnaPair],
    ) -> Result<KnowledgeBaseId, GatewayError>;
    async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError>;
    async fn get_answer(
        &self,
        id: &KnowledgeBaseId,
        question: &str,
    ) -> Result<Answer, GatewayError>;
    async fn add_answer(&self, id: &KnowledgeBaseId, pair: &QnaPair) -> Result<(), GatewayError>;
    /// Makes pending edits live.
    async fn publish(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError>;
}

#[derive(Serialize)]
struct WirePair<'a> {
    question: &'a str,
    answer: &'a str,
}

impl<'a> From<&'a QnaPair> for WirePair<'a> {
    fn from(pair: &'a QnaPair) -> Self {
        Self { question: &pair.question, answer: &pair.answer }
    }
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    #[serde(rename = "qnaPairs")]
    qna_pairs: Vec<WirePair<'a>>,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(rename = "kbId")]
    kb_id: String,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct AnswerResponse {
    #[serde(default)]
    answers: Vec<WireAnswer>,
}

#[derive(Deserialize)]
struct WireAnswer {
    answer: String,
    score: f64,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    add: UpdateAdd<'a>,
}

#[derive(Serialize)]
struct UpdateAdd<'a> {
    #[serde(rename = "qnaPairs")]
    qna_pairs: Vec<WirePair<'a>>,
}

/// QnA Maker v2 REST client.
#[derive(Clone)]
pub struct QnaMakerClient {
    http: Client,
    base_url: String,
    subscription_key: SecretString,
}

impl QnaMakerClient {
    pub fn new(http: Client, base_url: impl Into<String>, subscription_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, subscription_key }
    }

    pub fn from_config(config: &QnaConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self::new(http, config.base_url.clone(), config.subscription_key.clone()))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.base_url))
            .header(SUBSCRIPTION_KEY_HEADER, self.subscription_key.expose_secret())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::Http { operation, reason: error.to_string() })?;
        if !response.status().is_success() {
            return Err(GatewayError::Status { operation, status: response.status().as_u16() });
        }
        debug!(
            event_name = "qna.request.completed",
            operation,
            status = %response.status(),
            "knowledge base request completed"
        );
        Ok(response)
    }
}

fn malformed(operation: &'static str) -> impl FnOnce(reqwest::Error) -> GatewayError {
    move |error| GatewayError::Malformed { operation, reason: error.to_string() }
}

#[async_trait]
impl KnowledgeBaseGateway for QnaMakerClient {
    async fn create_knowledge_base(
        &self,
        name: &str,
        pairs: &[QnaPair],
    ) -> Result<KnowledgeBaseId, GatewayError> {
        const OPERATION: &str = "create";
        let body = CreateRequest { name, qna_pairs: pairs.iter().map(WirePair::from).collect() };
        let request = self.request(Method::POST, "knowledgebases/create").json(&body);
        let response = self.send(OPERATION, request).await?;
        let created: CreateResponse = response.json().await.map_err(malformed(OPERATION))?;
        if created.kb_id.trim().is_empty() {
            return Err(GatewayError::Malformed {
                operation: OPERATION,
                reason: "empty kbId".to_owned(),
            });
        }
        Ok(KnowledgeBaseId(created.kb_id))
    }

    async fn delete_knowledge_base(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError> {
        self.send("delete", self.request(Method::DELETE, &format!("knowledgebases/{id}"))).await?;
        Ok(())
    }

    async fn get_answer(
        &self,
        id: &KnowledgeBaseId,
        question: &str,
    ) -> Result<Answer, GatewayError> {
        const OPERATION: &str = "generate_answer";
        let request = self
            .request(Method::POST, &format!("knowledgebases/{id}/generateAnswer"))
            .json(&AnswerRequest { question });
        let response = self.send(OPERATION, request).await?;
        let payload: AnswerResponse = response.json().await.map_err(malformed(OPERATION))?;

        Ok(payload
            .answers
            .into_iter()
            .next()
            .map(|best| Answer { answer: best.answer, score: best.score })
            .unwrap_or_else(Answer::no_match))
    }

    async fn add_answer(&self, id: &KnowledgeBaseId, pair: &QnaPair) -> Result<(), GatewayError> {
        let body = UpdateRequest { add: UpdateAdd { qna_pairs: vec![WirePair::from(pair)] } };
        let request = self.request(Method::PATCH, &format!("knowledgebases/{id}")).json(&body);
        self.send("update", request).await?;
        Ok(())
    }

    async fn publish(&self, id: &KnowledgeBaseId) -> Result<(), GatewayError> {
        self.send("publish", self.request(Method::PUT, &format!("knowledgebases/{id}"))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use k9_core::{KnowledgeBaseId, QnaPair};
    use reqwest::Client;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{GatewayError, KnowledgeBaseGateway, QnaMakerClient};

    fn gateway(server: &MockServer) -> QnaMakerClient {
        QnaMakerClient::new(Client::new(), server.uri(), SecretString::from("qna-key".to_owned()))
    }

    fn kb() -> KnowledgeBaseId {
        KnowledgeBaseId("kb-1".to_owned())
    }

    #[tokio::test]
    async fn create_posts_pairs_and_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/knowledgebases/create"))
            .and(header("Ocp-Apim-Subscription-Key", "qna-key"))
            .and(body_json(json!({
                "name": "k9",
                "qnaPairs": [{ "question": "who?", "answer": "a dog" }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "kbId": "kb-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = gateway(&server)
            .create_knowledge_base("k9", &[QnaPair::new("who?", "a dog")])
            .await
            .expect("created");
        assert_eq!(id, kb());
    }

    #[tokio::test]
    async fn get_answer_takes_the_first_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/knowledgebases/kb-1/generateAnswer"))
            .and(body_json(json!({ "question": "who?" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answers": [
                    { "answer": "a dog &amp; friend", "questions": ["who?"], "score": 87.5 },
                    { "answer": "a cat", "questions": ["what?"], "score": 12.0 }
                ]
            })))
            .mount(&server)
            .await;

        let answer = gateway(&server).get_answer(&kb(), "who?").await.expect("answer");
        assert_eq!(answer.answer, "a dog &amp; friend");
        assert!(answer.is_match());
    }

    #[tokio::test]
    async fn empty_answer_list_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/knowledgebases/kb-1/generateAnswer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answers": [] })))
            .mount(&server)
            .await;

        let answer = gateway(&server).get_answer(&kb(), "unknown").await.expect("answer");
        assert!(!answer.is_match());
    }

    #[tokio::test]
    async fn add_answer_patches_then_publish_puts() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/knowledgebases/kb-1"))
            .and(body_json(json!({
                "add": { "qnaPairs": [{ "question": "where?", "answer": "outside" }] }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/knowledgebases/kb-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = gateway(&server);
        gateway.add_answer(&kb(), &QnaPair::new("where?", "outside")).await.expect("added");
        gateway.publish(&kb()).await.expect("published");
    }

    #[tokio::test]
    async fn delete_failure_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/knowledgebases/kb-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let error = gateway(&server).delete_knowledge_base(&kb()).await.expect_err("fails");
        assert_eq!(error, GatewayError::Status { operation: "delete", status: 404 });
    }

    #[tokio::test]
    async fn create_without_kb_id_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/knowledgebases/create"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "kbId": "" })))
            .mount(&server)
            .await;

        let error = gateway(&server).create_knowledge_base("k9", &[]).await.expect_err("fails");
        assert!(matches!(error, GatewayError::Malformed { operation: "create", .. }));
    }
}
