use thiserror::Error;

/// Result type for header construction.
pub type SmtpApiResult<T> = Result<T, SmtpApiError>;

/// Errors raised while building the `X-SMTPAPI` header.
#[derive(Debug, Error)]
pub enum SmtpApiError {
    /// A substitution list does not have one value per recipient.
    #[error(
        "Array for {placeholder} is not the same size as the recipient array \
         ({actual} values for {expected} recipients)"
    )]
    SubstitutionLengthMismatch {
        placeholder: String,
        expected: usize,
        actual: usize,
    },

    /// The header document could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
