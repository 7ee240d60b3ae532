use std::fmt;

/// Why a snapshot fetch failed. Every variant is recoverable.
#[derive(Debug)]
pub enum FetchError {
    Transport(String),
    Status(u16),
    Decode(serde_json::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchError::Status(code) => write!(f, "unexpected status {code}"),
            FetchError::Decode(err) => write!(f, "decode error: {err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Decode(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err)
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}
