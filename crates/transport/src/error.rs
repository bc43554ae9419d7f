//! Transport error taxonomy and HTTP status classification.

/// Errors from a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP 401. Token refresh is the caller's concern.
    #[error("Unauthorized")]
    Unauthorized,

    /// HTTP 409: the server already holds content for this target.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-2xx status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The caller's cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    /// A 2xx response whose body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be assembled (bad URL, bad part).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Map a non-2xx status and its body to an error.
pub fn error_for_status(status: u16, body: &str) -> TransportError {
    let message = extract_message(body);
    match status {
        401 => TransportError::Unauthorized,
        409 => TransportError::Conflict(
            message.unwrap_or_else(|| "Content already exists on the server".to_string()),
        ),
        400..=499 => TransportError::Server {
            status,
            message: message.unwrap_or_else(|| format!("Request rejected (HTTP {status})")),
        },
        _ => TransportError::Server {
            status,
            message: message.unwrap_or_else(|| format!("Server error (HTTP {status})")),
        },
    }
}

/// Pull a human-readable message out of a structured error body.
///
/// Recognises `{"error": "..."}`, `{"message": "..."}`, `{"detail": "..."}`
/// and `{"error": {"message": "..."}}`.
pub fn extract_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["error", "message", "detail"] {
        match json.get(key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Object(inner)) => {
                if let Some(serde_json::Value::String(s)) = inner.get("message") {
                    return Some(s.clone());
                }
            }
            _ => {}
        }
    }
    None
}
