//! External collaborators of the k9 bot: the QnA Maker knowledge base and the Google Sheets
//! question/answer source.

pub mod gateway;
pub mod sheets;

pub use gateway::{GatewayError, KnowledgeBaseGateway, QnaMakerClient};
pub use sheets::{GoogleSheetsReader, SheetsError, SpreadsheetReader};
