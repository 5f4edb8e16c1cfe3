use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

/// All different error types this crate uses.
#[derive(Error, Debug)]
pub enum KioskError {
    /// An operation that needs a search keyword was invoked before `search`.
    ///
    /// Always raised, regardless of the session's strict/lenient setting.
    #[error("{} invoked before search(): a search keyword must be set first", operation)]
    InvalidState {
        /// The operation that was invoked too early.
        operation: &'static str,
    },
    /// Received a good non success Http response.
    #[error("Expected a 2xx Success but got: {}", status)]
    NoHttpSuccessResponse {
        /// Status code of the response.
        status: StatusCode,
    },
    /// Failed to get a response.
    #[error("Request failed: {}", error)]
    HttpRequestFailure {
        /// The reqwest error.
        error: reqwest::Error,
    },
    /// Failed to read a document.
    #[error("Failed to read document")]
    ReadDocumentError {
        /// The content that resulted in the error.
        body: Bytes,
    },
    /// A single article fragment could not be resolved into a record.
    ///
    /// Individual field misses fall back to the field's default instead;
    /// this is only returned when the whole fragment is unusable.
    #[error("Failed to resolve {} for article fragment", field)]
    FragmentExtraction {
        /// The field whose resolution sank the fragment.
        field: &'static str,
    },
}
