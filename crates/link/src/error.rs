use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("Connect task ended abnormally: {source}")]
    ConnectTask {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Device link is not open")]
    NotOpen,

    #[error("Failed to encode command: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },

    #[error("Failed to send frame to device: {source}")]
    Send {
        #[source]
        source: tungstenite::Error,
    },
}
