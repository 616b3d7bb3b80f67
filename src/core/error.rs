use thiserror::Error;

/// Connector-level failures. Always isolated to the source that raised them;
/// the aggregation cycle records them in the per-source report and moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A raw record that cannot become a valid canonical Property. Dropped and
/// counted by the normalizer, or returned to the caller when a structurally
/// invalid record reaches the underwriting engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing mandatory field: {0}")]
    MissingField(&'static str),

    #[error("price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("monthly rent must be non-negative, got {0}")]
    NegativeRent(f64),

    #[error("tokenization info {0} for tokenized property type")]
    TokenizationMismatch(&'static str),
}
