use thiserror::Error;

/// Errors surfaced by the backend collaborator and the streaming channels.
///
/// Panel-scoped: each panel stores at most one of these (as its display
/// string) and a failure in one call never blanks out another panel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached at all (refused, DNS, timeout).
    #[error("cannot reach backend")]
    NetworkUnreachable,

    /// 404 — nothing is listening on the expected routes.
    #[error("backend not running")]
    BackendUnavailable,

    /// 500 from the backend.
    #[error("backend internal error")]
    BackendInternal,

    /// 500 whose error body names the missing API credential.
    #[error("backend is missing its API credential (OPENAI_API_KEY)")]
    MissingCredential,

    /// Any other non-2xx status.
    #[error("server error: {0}")]
    Server(u16),

    /// 2xx but the payload was not what the contract promises.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// A channel closed or errored mid-session.
    #[error("channel error: {0}")]
    Channel(String),

    /// The capture device could not be opened or read.
    #[error("audio device error: {0}")]
    Device(String),

    /// Local input validation. Resolved locally (skip + log), never shown.
    #[error("{0}")]
    Validation(&'static str),
}

impl BackendError {
    /// Map a non-2xx HTTP status (and its error body) onto the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            404 => BackendError::BackendUnavailable,
            500 if body.contains("OPENAI_API_KEY") => BackendError::MissingCredential,
            500 => BackendError::BackendInternal,
            other => BackendError::Server(other),
        }
    }

    /// Validation errors are skipped silently instead of being surfaced.
    pub fn is_validation(&self) -> bool {
        matches!(self, BackendError::Validation(_))
    }
}
