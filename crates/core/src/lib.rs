pub mod config;
pub mod domain;
pub mod errors;

pub use domain::knowledge::{Answer, KnowledgeBaseId, QnaPair};
pub use errors::ApplicationError;
