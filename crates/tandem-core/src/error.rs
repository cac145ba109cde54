use thiserror::Error;

/// Shared lightweight error type for core primitive operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Value kind that a user-info record cannot carry.
    #[error("unsupported value: {0}")]
    UnsupportedValue(&'static str),
    /// Top-level input was not a key/value mapping.
    #[error("invalid record: {0}")]
    InvalidRecord(&'static str),
    /// Malformed transfer identity text.
    #[error("invalid transfer id: {0}")]
    InvalidTransferId(String),
    /// Transfer class text other than `standard` or `complication`.
    #[error("invalid transfer class: {0}")]
    InvalidTransferClass(String),
}

#[cfg(test)]
mod tests {
    use super::CoreError;

    #[test]
    fn error_messages_are_stable() {
        assert_eq!(
            CoreError::UnsupportedValue("null").to_string(),
            "unsupported value: null"
        );
        assert_eq!(
            CoreError::InvalidRecord("expected object").to_string(),
            "invalid record: expected object"
        );
        assert_eq!(
            CoreError::InvalidTransferId("nope".to_string()).to_string(),
            "invalid transfer id: nope"
        );
        assert_eq!(
            CoreError::InvalidTransferClass("bulk".to_string()).to_string(),
            "invalid transfer class: bulk"
        );
    }
}
