use thiserror::Error;

/// Failures surfaced by application-level operations (answering, teaching, knowledge-base boot).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("knowledge base gateway failure: {0}")]
    Gateway(String),
    #[error("spreadsheet failure: {0}")]
    Spreadsheet(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("chat delivery failure: {0}")]
    Delivery(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label used as the `error_class` log field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Gateway(_) => "gateway",
            Self::Spreadsheet(_) => "spreadsheet",
            Self::Persistence(_) => "persistence",
            Self::Delivery(_) => "delivery",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn gateway(error: impl ToString) -> Self {
        Self::Gateway(error.to_string())
    }

    pub fn spreadsheet(error: impl ToString) -> Self {
        Self::Spreadsheet(error.to_string())
    }

    pub fn persistence(error: impl ToString) -> Self {
        Self::Persistence(error.to_string())
    }

    pub fn delivery(error: impl ToString) -> Self {
        Self::Delivery(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ApplicationError;

    #[test]
    fn error_class_is_stable_per_variant() {
        assert_eq!(ApplicationError::gateway("timeout").class(), "gateway");
        assert_eq!(ApplicationError::spreadsheet("403").class(), "spreadsheet");
        assert_eq!(ApplicationError::persistence("locked").class(), "persistence");
        assert_eq!(ApplicationError::delivery("channel_not_found").class(), "delivery");
        assert_eq!(
            ApplicationError::Configuration("missing key".to_owned()).class(),
            "configuration"
        );
    }

    #[test]
    fn display_includes_source_message() {
        let error = ApplicationError::gateway("qna maker returned 401");
        assert_eq!(error.to_string(), "knowledge base gateway failure: qna maker returned 401");
    }
}
