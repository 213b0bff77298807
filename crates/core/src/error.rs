use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The protocol session could not be attached, or the socket went away.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    /// A command reached the engine and came back with an error object.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Failures of the protocol session itself, as opposed to bad input or local IO.
    pub fn is_session_failure(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Timeout(_) | Error::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_failure_kinds() {
        assert!(Error::Timeout("Network.getResponseBody".into()).is_session_failure());
        assert!(Error::Connection("closed".into()).is_session_failure());
        assert!(!Error::NotFound("window-3".into()).is_session_failure());
        let io: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(!io.is_session_failure());
        assert_eq!(io.to_string(), "IO error: disk full");
    }
}
