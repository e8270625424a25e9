//! Error types for SetuIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SetuIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Listening socket could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address the server tried to bind
        address: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The waiting worker was interrupted (normal shutdown signal)
    #[error("Interrupted")]
    Interrupted,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker thread could not be spawned
    #[error("Failed to spawn thread {0}")]
    ThreadSpawn(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a bind error for the given address
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Error::Bind {
            address: address.into(),
            source,
        }
    }

    /// True for errors that only mean the peer went away
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            Error::Interrupted => true,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
