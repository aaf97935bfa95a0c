use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures reported by a catalog store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("store io error: {0}")]
    Io(String),

    #[error("store serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CanopyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("ai error: {0}")]
    Ai(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("completion.max_iterations".into());
        assert_eq!(
            err.to_string(),
            "config validation error: completion.max_iterations"
        );
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::NotFound("session abc".into());
        assert_eq!(err.to_string(), "not found: session abc");

        let err = StoreError::Conflict("session abc".into());
        assert_eq!(err.to_string(), "already exists: session abc");
    }

    #[test]
    fn store_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn store_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn canopy_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: CanopyError = config_err.into();
        assert!(matches!(err, CanopyError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn canopy_error_from_store() {
        let err: CanopyError = StoreError::NotFound("s1".into()).into();
        assert!(matches!(err, CanopyError::Store(_)));
        assert_eq!(err.to_string(), "not found: s1");
    }

    #[test]
    fn canopy_error_other_variants() {
        let err = CanopyError::Ai("unknown tool".into());
        assert_eq!(err.to_string(), "ai error: unknown tool");

        let err = CanopyError::Protocol("no session".into());
        assert_eq!(err.to_string(), "protocol error: no session");

        let err = CanopyError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
