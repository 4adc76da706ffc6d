//! Error taxonomy for the bridge.
//!
//! Engine calls fail with an [`EngineError`] carrying the engine's own result
//! code. The registry wraps those into a [`BridgeError`] that names which step
//! of the operation failed.

use thiserror::Error;

/// A failure reported by the underlying audio engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct EngineError {
    /// Engine-specific result code (FMOD_RESULT for the FMOD binding).
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("engine initialization failed: {0}")]
    EngineInit(#[source] EngineError),

    #[error("failed to load bank {bank}: {source}")]
    BankLoad { bank: String, source: EngineError },

    #[error("unknown event {key}: {source}")]
    EventLookup { key: String, source: EngineError },

    #[error("failed to create instance of {key}: {source}")]
    InstanceCreate { key: String, source: EngineError },

    #[error("failed to start {key}: {source}")]
    InstanceStart { key: String, source: EngineError },

    /// Nothing registered under the key. Callers treat this as
    /// "already stopped / never started".
    #[error("no instance found for {0}")]
    NoInstanceFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("audio engine not initialized")]
    NotInitialized,

    /// A forwarded call (stop, parameter, pause, volume, bus) was rejected.
    #[error("{operation} failed: {source}")]
    Engine {
        operation: &'static str,
        source: EngineError,
    },
}

impl BridgeError {
    /// `true` for outcomes that are a "nothing to do" signal rather than a fault.
    pub fn is_soft(&self) -> bool {
        matches!(self, BridgeError::NoInstanceFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_instance_is_soft() {
        assert!(BridgeError::NoInstanceFound("event:/A".into()).is_soft());
        assert!(!BridgeError::NotInitialized.is_soft());
        assert!(!BridgeError::InvalidArguments("path".into()).is_soft());
    }

    #[test]
    fn test_messages_name_the_event() {
        let err = BridgeError::InstanceStart {
            key: "event:/Music/Theme".into(),
            source: EngineError::new(30, "instance invalid"),
        };
        assert_eq!(
            err.to_string(),
            "failed to start event:/Music/Theme: instance invalid (code 30)"
        );
    }
}
