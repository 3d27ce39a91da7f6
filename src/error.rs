pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The pool was shut down before or while the submission was made.
    #[error("pool `{0}` has been destroyed")]
    PoolDestroyed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn destroyed<S: Into<String>>(pool: S) -> Self {
        Error::PoolDestroyed(pool.into())
    }

    /// Whether this error came from validating pool or registry settings.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::config("max_threads must be > 0").to_string(),
            "config error: max_threads must be > 0"
        );
        assert_eq!(
            Error::destroyed("io").to_string(),
            "pool `io` has been destroyed"
        );
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "no threads").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_config());
    }
}
