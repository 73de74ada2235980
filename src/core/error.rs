use thiserror::Error;

// ---------------------------------------------------------------------------
// Object-store errors
// ---------------------------------------------------------------------------

/// Errors from the object-store backends.
///
/// Simple absence is not an error for GET (that path returns `Ok(None)`);
/// HEAD reports it as `NotFound` so metadata lookups can map to 404.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("LIST failed for prefix '{prefix}': {reason}")]
    ListFailed { prefix: String, reason: String },

    #[error("PUT failed for key {key}: {reason}")]
    PutFailed { key: String, reason: String },

    #[error("GET failed for key {key}: {reason}")]
    GetFailed { key: String, reason: String },

    #[error("DELETE failed for key {key}: {reason}")]
    DeleteFailed { key: String, reason: String },

    #[error("COPY failed from {from} to {to}: {reason}")]
    CopyFailed {
        from: String,
        to: String,
        reason: String,
    },

    #[error("storage configuration error: {reason}")]
    Config { reason: String },
}

impl ObjectStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound { .. })
    }
}

// ---------------------------------------------------------------------------
// Link-store errors
// ---------------------------------------------------------------------------

/// Errors from the link-table backends.
#[derive(Debug, Error)]
pub enum LinkStoreError {
    #[error("short code already exists: {code}")]
    AlreadyExists { code: String },

    #[error("link query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("link store configuration error: {reason}")]
    Config { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_predicate() {
        let err = ObjectStoreError::NotFound {
            key: "a/b".to_string(),
        };
        assert!(err.is_not_found());
        let err = ObjectStoreError::GetFailed {
            key: "a/b".to_string(),
            reason: "boom".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ObjectStoreError::CopyFailed {
            from: "old".to_string(),
            to: "new".to_string(),
            reason: "denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("old") && msg.contains("new") && msg.contains("denied"));
    }
}
