use thiserror::Error;

/// Substrings that mark a primary-transport failure as "unreachable" rather
/// than a rejection of the request itself.
const UNREACHABLE_MARKERS: [&str; 2] = ["Edge Function", "Failed to send"];

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Invalid payment response: {0}")]
    InvalidResponse(String),
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("A payment is already being processed")]
    PaymentInProgress,
    #[error("{0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}

impl PaymentError {
    /// Whether this failure means the transport itself could not be reached,
    /// in which case the caller should switch to the fallback transport.
    pub fn is_unreachable(&self) -> bool {
        let message = self.to_string();
        UNREACHABLE_MARKERS
            .iter()
            .any(|marker| message.contains(marker))
    }
}

pub type Result<T, E = PaymentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_markers() {
        assert!(PaymentError::Transport("Failed to send request".into()).is_unreachable());
        assert!(
            PaymentError::Transport("Edge Function returned a non-2xx status code".into())
                .is_unreachable()
        );
        assert!(!PaymentError::Rejected("Card declined".into()).is_unreachable());
        assert!(!PaymentError::ValidationError("bad".into()).is_unreachable());
    }
}
