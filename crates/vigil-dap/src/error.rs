use thiserror::Error;

pub type DebugResult<T> = Result<T, DebugError>;

#[derive(Error, Debug)]
pub enum DebugError {
    #[error("cdp: {0}")]
    Cdp(#[from] vigil_cdp::CdpError),

    // `source` is a reserved field name in thiserror (a chained cause),
    // hence `source_key`.
    #[error("setting breakpoints for {source_key} timed out after {timeout_ms}ms")]
    Timeout { source_key: String, timeout_ms: u64 },

    /// An invariant inside the adapter was violated. These are bugs, not
    /// user-recoverable conditions; `code` is stable so telemetry and tests
    /// can key on it.
    #[error("internal error [{code}]: {message}")]
    Internal { code: &'static str, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A location in a loaded source could not be mapped into any script.
    /// Callers only attempt this conversion once a script is known to be
    /// present, so hitting it is a genuine failure.
    #[error("no loaded script maps to {0}")]
    NoScriptForSource(String),
}

impl DebugError {
    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        DebugError::Internal {
            code,
            message: message.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, DebugError::Internal { .. })
    }
}
