use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedactionError {
    #[error("unexpected value at '{pointer}': expected {expected}")]
    UnexpectedShape {
        pointer: String,
        expected: &'static str,
    },

    #[error("redaction target '{0}' is no longer present")]
    MissingTarget(String),

    #[error("failed to read redaction properties '{path}'")]
    PropertiesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
