#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("host window is closed")]
    WindowClosed,

    #[error("surface creation failed: {0}")]
    SurfaceCreation(String),

    #[error("content load failed: {0}")]
    LoadFailed(String),

    #[error("script execution failed: {0}")]
    ScriptFailed(String),

    #[error("request blocked by filter: {0}")]
    Blocked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("no free dialog surface and allocation failed")]
    SurfacePoolExhausted,

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("no such dialog: {0}")]
    NoSuchDialog(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_display() {
        let err = HostError::LoadFailed("dns failure".into());
        assert_eq!(err.to_string(), "content load failed: dns failure");

        let err = HostError::Blocked("https://ads.example".into());
        assert_eq!(
            err.to_string(),
            "request blocked by filter: https://ads.example"
        );

        assert_eq!(HostError::WindowClosed.to_string(), "host window is closed");
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::InvalidQuery("query must be an object".into());
        assert_eq!(err.to_string(), "invalid query: query must be an object");
    }

    #[test]
    fn shell_error_from_host() {
        let err: ShellError = HostError::WindowClosed.into();
        assert!(matches!(err, ShellError::Host(_)));
        assert_eq!(err.to_string(), "host window is closed");
    }

    #[test]
    fn shell_error_from_storage() {
        let err: ShellError = StorageError::Backend("poisoned".into()).into();
        assert!(matches!(err, ShellError::Storage(_)));
        assert!(err.to_string().contains("poisoned"));
    }

    #[test]
    fn pool_exhausted_display() {
        assert_eq!(
            ShellError::SurfacePoolExhausted.to_string(),
            "no free dialog surface and allocation failed"
        );
    }
}
