use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImgsrvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame encoding failed: {0}")]
    EncodeFailed(String),

    #[error("Publisher is closed")]
    Closed,

    #[error("Delivery to viewer {viewer} failed: {reason}")]
    ViewerSendFailed { viewer: String, reason: String },

    #[error("Failed to listen on {addr}: {reason}")]
    ListenFailed { addr: String, reason: String },

    #[error("Could not resolve local address: {0}")]
    PortResolutionFailed(String),

    #[error("Illegal transition: {event} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("No frame has been published yet")]
    NoFrame,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImgsrvError {
    /// Short error code string, used in logs and the health payload.
    pub fn code(&self) -> &'static str {
        match self {
            ImgsrvError::Config(_) => "CONFIG_ERROR",
            ImgsrvError::EncodeFailed(_) => "ENCODE_FAILED",
            ImgsrvError::Closed => "CLOSED",
            ImgsrvError::ViewerSendFailed { .. } => "VIEWER_SEND_FAILED",
            ImgsrvError::ListenFailed { .. } => "LISTEN_FAILED",
            ImgsrvError::PortResolutionFailed(_) => "PORT_RESOLUTION_FAILED",
            ImgsrvError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ImgsrvError::NoFrame => "NO_FRAME",
            ImgsrvError::Serialization(_) => "SERIALIZATION_ERROR",
            ImgsrvError::Io(_) => "IO_ERROR",
        }
    }

    /// Startup failures end the process; everything else is scoped to one call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImgsrvError::ListenFailed { .. } | ImgsrvError::PortResolutionFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ImgsrvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_startup_errors_are_fatal() {
        let listen = ImgsrvError::ListenFailed {
            addr: "0.0.0.0:80".into(),
            reason: "permission denied".into(),
        };
        assert!(listen.is_fatal());
        assert!(ImgsrvError::PortResolutionFailed("no route".into()).is_fatal());

        assert!(!ImgsrvError::Closed.is_fatal());
        assert!(!ImgsrvError::EncodeFailed("bad".into()).is_fatal());
        assert!(!ImgsrvError::ViewerSendFailed {
            viewer: "v".into(),
            reason: "timeout".into(),
        }
        .is_fatal());
    }
}
