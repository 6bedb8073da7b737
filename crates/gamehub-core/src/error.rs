use thiserror::Error;

/// Errors produced by the relay protocol and session layer.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("missing game id")]
    MissingGameId,

    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("no player with id {0}")]
    UnknownTarget(u64),

    #[error("connection {0} is not the bound game server")]
    NotGameServer(u64),

    #[error("connection {0} is already bound")]
    AlreadyBound(u64),

    #[error("descriptor error: {0}")]
    Descriptor(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Codec(e.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
