use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Encoder resource is already active. Programmer invariant violation:
    /// the controller must prevent this by construction.
    ResourceBusy(String),
    CaptureError(String),
    InferenceError(String),
    EncodingError(String),
    IoError(String),
    ConfigError(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AgentError::ResourceBusy(msg) => write!(f, "Resource busy: {}", msg),
            AgentError::CaptureError(msg) => write!(f, "Capture error: {}", msg),
            AgentError::InferenceError(msg) => write!(f, "Inference error: {}", msg),
            AgentError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            AgentError::IoError(msg) => write!(f, "IO error: {}", msg),
            AgentError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {}

impl AgentError {
    pub fn io(err: std::io::Error, context: &str) -> Self {
        AgentError::IoError(format!("{}: {}", context, err))
    }
}
