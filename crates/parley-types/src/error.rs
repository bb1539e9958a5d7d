use thiserror::Error;

/// Errors from store operations (implemented in parley-infra).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query error: {0}")]
    Query(String),
}

/// Errors from resolving the effective backend configuration for a turn.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The override's options blob does not decode for the configured
    /// provider's option shape.
    #[error("override options do not match provider '{provider}': {detail}")]
    TypeMismatch { provider: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_overlay_error_display() {
        let err = OverlayError::TypeMismatch {
            provider: "openai".to_string(),
            detail: "unknown field `num_ctx`".to_string(),
        };
        assert!(err.to_string().contains("openai"));
        assert!(err.to_string().contains("num_ctx"));
    }
}
