use std::fmt;

/// Error types for dirprobe operations
#[derive(Debug)]
pub enum DirProbeError {
    /// Target base URL is missing a scheme/host or is not http(s)
    InvalidBase(String),

    /// Candidate segment cannot be turned into a safe request URL
    InvalidCandidate(String),

    /// Configuration error
    Config(String),

    /// HTTP client error
    Http(reqwest::Error),

    /// IO error (wordlist and config file operations)
    Io(std::io::Error),

    /// Regex compilation error
    Regex(regex::Error),

    /// TOML parsing error
    TomlParsing(toml::de::Error),

    /// JSON serialization error
    Serialization(serde_json::Error),

    /// File not found error
    FileNotFound(String),

    /// Result sink is permanently closed and refuses emission
    SinkClosed,
}

impl fmt::Display for DirProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirProbeError::InvalidBase(msg) => write!(f, "Invalid base URL: {msg}"),
            DirProbeError::InvalidCandidate(msg) => write!(f, "Invalid candidate: {msg}"),
            DirProbeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            DirProbeError::Http(err) => write!(f, "HTTP error: {err}"),
            DirProbeError::Io(err) => write!(f, "IO error: {err}"),
            DirProbeError::Regex(err) => write!(f, "Regex error: {err}"),
            DirProbeError::TomlParsing(err) => write!(f, "TOML parsing error: {err}"),
            DirProbeError::Serialization(err) => write!(f, "Serialization error: {err}"),
            DirProbeError::FileNotFound(path) => write!(f, "File not found: {path}"),
            DirProbeError::SinkClosed => write!(f, "Result sink closed"),
        }
    }
}

impl std::error::Error for DirProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirProbeError::Http(err) => Some(err),
            DirProbeError::Io(err) => Some(err),
            DirProbeError::Regex(err) => Some(err),
            DirProbeError::TomlParsing(err) => Some(err),
            DirProbeError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DirProbeError {
    fn from(err: std::io::Error) -> Self {
        DirProbeError::Io(err)
    }
}

impl From<reqwest::Error> for DirProbeError {
    fn from(err: reqwest::Error) -> Self {
        DirProbeError::Http(err)
    }
}

impl From<regex::Error> for DirProbeError {
    fn from(err: regex::Error) -> Self {
        DirProbeError::Regex(err)
    }
}

impl From<toml::de::Error> for DirProbeError {
    fn from(err: toml::de::Error) -> Self {
        DirProbeError::TomlParsing(err)
    }
}

impl From<serde_json::Error> for DirProbeError {
    fn from(err: serde_json::Error) -> Self {
        DirProbeError::Serialization(err)
    }
}

/// Type alias for Results using DirProbeError
pub type Result<T> = std::result::Result<T, DirProbeError>;
