use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these —
// never on the human-readable message string.

/// Stable error code constants.
///
/// The request layer matches on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
/// Codes never change; messages may be reworded.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INVARIANT_VIOLATION: &str = "INVARIANT_VIOLATION";
    pub const STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified service error type used across all modules.
///
/// Each variant maps to a stable error code (see [`error_code`]) and an HTTP
/// status hint. This crate does not speak HTTP itself; the request layer
/// picks its response from `error_code()` / `status_hint()`:
///
/// ```json
/// {"code": "NOT_FOUND", "message": "products 'abc' not found"}
/// ```
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced record does not exist. Hint 404.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / resource already exists. Hint 409.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid. Hint 400.
    #[error("{0}")]
    Validation(String),

    /// Stored state contradicts a derived value it must stay in lockstep
    /// with. Always an internal defect. Hint 500.
    #[error("{0}")]
    Invariant(String),

    /// Storage backend failed or is unreachable. Hint 503.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error. Hint 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::ALREADY_EXISTS,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Invariant(_) => error_code::INVARIANT_VIOLATION,
            ServiceError::Storage(_) => error_code::STORAGE_UNAVAILABLE,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Suggested HTTP status code for this error.
    pub fn status_hint(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Validation(_) => 400,
            ServiceError::Invariant(_) => 500,
            ServiceError::Storage(_) => 503,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Serializable response body in the shape the request layer emits.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_hint_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).status_hint(), 404);
        assert_eq!(ServiceError::Conflict("x".into()).status_hint(), 409);
        assert_eq!(ServiceError::Validation("x".into()).status_hint(), 400);
        assert_eq!(ServiceError::Invariant("x".into()).status_hint(), 500);
        assert_eq!(ServiceError::Storage("x".into()).status_hint(), 503);
        assert_eq!(ServiceError::Internal("x".into()).status_hint(), 500);
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "ALREADY_EXISTS");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::Invariant("x".into()).error_code(), "INVARIANT_VIOLATION");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_UNAVAILABLE");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("products/123".into()).to_string(), "products/123");
        assert_eq!(ServiceError::Conflict("dup barcode".into()).to_string(), "dup barcode");
    }

    #[test]
    fn body_shape() {
        let body = ServiceError::NotFound("products/abc".into()).to_body();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "products/abc");
    }
}
