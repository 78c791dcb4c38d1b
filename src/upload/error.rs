//! Upload error types.

use thiserror::Error;

/// Why a submission ended in the error state (or was not accepted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The selected file does not carry the `.csv` suffix.
    #[error("Please upload a CSV file")]
    InvalidFile,

    /// Another submission is still loading; the new one was ignored.
    #[error("An upload is already in progress")]
    Busy,

    /// The selected file could not be read from disk.
    #[error("Could not read the selected file")]
    Unreadable,

    /// Transport failure or non-success status from the service.
    #[error("Failed to connect to backend. Is the server running?")]
    Connectivity,

    /// The service answered, but not with a usable payload.
    #[error("The analysis service returned an unexpected response")]
    MalformedResponse,

    /// The submission was abandoned, or superseded by a reset or newer
    /// submission, before its payload was handed over.
    #[error("Upload was interrupted")]
    Interrupted,
}

impl UploadError {
    /// User-facing message stored in the session.
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    /// Whether submitting the same file again could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UploadError::InvalidFile | UploadError::Busy)
    }
}
