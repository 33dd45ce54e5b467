use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier the QA backend assigns to a knowledge base.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeBaseId(pub String);

impl fmt::Display for KnowledgeBaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaPair {
    pub question: String,
    pub answer: String,
}

impl QnaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }

    /// Builds a pair from a spreadsheet row, skipping rows that lack either cell.
    pub fn from_row(row: &[String]) -> Option<Self> {
        let question = row.first()?.trim();
        let answer = row.get(1)?.trim();
        if question.is_empty() || answer.is_empty() {
            return None;
        }
        Some(Self::new(question, answer))
    }
}

/// Best answer the backend found for a question. A score of zero means no match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub score: f64,
}

impl Answer {
    pub fn no_match() -> Self {
        Self { answer: String::new(), score: 0.0 }
    }

    pub fn is_match(&self) -> bool {
        self.score > 0.0
    }
}

/// A `Q: ... A: ...` message teaching the bot a new pair.
pub fn parse_teach_command(text: &str) -> Option<QnaPair> {
    if !text.starts_with("Q:") {
        return None;
    }
    let answer_index = text.find("A:").filter(|index| *index > 0)?;
    let question = text[2..answer_index].trim();
    let answer = text[answer_index + 2..].trim();
    Some(QnaPair::new(question, answer))
}
